use colored::Colorize;

pub fn handle_error(err: anyhow::Error) -> ! {
    eprintln!("{} {:#}", "Error:".red().bold(), err);

    let msg = format!("{err:#}").to_lowercase();

    if msg.contains("unknown session") || msg.contains("session not found") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  List sessions with:");
        eprintln!("  {} streamchat session list", "$".dimmed());
    }

    if msg.contains("unknown model") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  List available models with:");
        eprintln!("  {} streamchat models list --refresh", "$".dimmed());
    }

    if msg.contains("connection refused") || msg.contains("network") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Check that the chat API is running, or point to it with:");
        eprintln!("  {} streamchat --api-url http://host:port ...", "$".dimmed());
    }

    if msg.contains("database already open") || msg.contains("failed to open database") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Another streamchat process may be running; close it and retry.");
    }

    std::process::exit(1);
}
