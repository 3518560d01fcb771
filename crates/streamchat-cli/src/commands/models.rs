use anyhow::Result;
use colored::Colorize;
use comfy_table::Cell;
use serde_json::json;
use streamchat_core::{CatalogSource, Command, ModelListing, NullObserver, StreamingChatSession};

use crate::cli::ModelCommands;
use crate::output::table::{new_table, print_table};
use crate::output::{OutputFormat, json::print_json};

pub async fn run(
    chat: &mut StreamingChatSession,
    command: ModelCommands,
    format: OutputFormat,
) -> Result<()> {
    match command {
        ModelCommands::List { refresh } => {
            let listing = if refresh {
                chat.refresh_models().await?
            } else {
                chat.models().await?
            };
            print_models(chat, &listing, format)
        }
        ModelCommands::Select { id } => {
            let outcome = chat
                .dispatch(Command::SelectModel(id.clone()), &mut NullObserver)
                .await?;
            if format.is_json() {
                return print_json(&outcome);
            }
            println!("Selected model: {id}");
            Ok(())
        }
    }
}

pub fn print_models(
    chat: &StreamingChatSession,
    listing: &ModelListing,
    format: OutputFormat,
) -> Result<()> {
    let selected = chat.selected_model();

    if format.is_json() {
        return print_json(&json!({
            "source": listing.source,
            "selected": selected,
            "models": listing.models,
        }));
    }

    let mut table = new_table(vec!["", "ID", "Name", "Description"]);
    for model in &listing.models {
        let marker = if selected.as_deref() == Some(model.id.as_str()) {
            "*"
        } else {
            ""
        };
        table.add_row(vec![
            Cell::new(marker),
            Cell::new(&model.id),
            Cell::new(&model.name),
            Cell::new(model.description.as_deref().unwrap_or("-")),
        ]);
    }
    print_table(table);

    match listing.source {
        CatalogSource::StaleCache => {
            println!("{}", "Models endpoint unreachable; showing the last cached list.".yellow())
        }
        CatalogSource::Defaults => {
            println!("{}", "Models endpoint unreachable; showing built-in defaults.".yellow())
        }
        CatalogSource::Fresh | CatalogSource::Cache => {}
    }
    Ok(())
}
