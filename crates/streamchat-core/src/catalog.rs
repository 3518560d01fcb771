//! Available models and the user's selection.
//!
//! The models endpoint is cached for [`MODEL_CACHE_TTL`]. When it cannot be
//! reached the last cached list is used regardless of age, and failing that a
//! built-in list.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use streamchat_ai::{ChatTransport, ModelInfo};
use streamchat_storage::{PreferenceStorage, Stamped, time_utils};
use tracing::{debug, warn};

use crate::error::{Result, SessionError};

pub const MODEL_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

const MODEL_CACHE_KEY: &str = "model_list_cache";
const SELECTED_MODEL_KEY: &str = "selected_model";

/// Models offered when the endpoint has never answered.
pub fn default_models() -> Vec<ModelInfo> {
    vec![
        ModelInfo::new(
            "deepseek-ai/deepseek-coder-33b-instruct",
            "DeepSeek Coder",
            Some("Code assistant"),
        ),
        ModelInfo::new(
            "deepseek-ai/deepseek-math-7b-instruct",
            "DeepSeek Math",
            Some("Math assistant"),
        ),
        ModelInfo::new(
            "deepseek-ai/deepseek-moe-16b-chat",
            "DeepSeek Chat",
            Some("General chat"),
        ),
    ]
}

/// Where a model list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogSource {
    Fresh,
    Cache,
    StaleCache,
    Defaults,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelListing {
    pub models: Vec<ModelInfo>,
    pub source: CatalogSource,
}

pub struct ModelCatalog {
    transport: Arc<dyn ChatTransport>,
    preferences: Option<PreferenceStorage>,
    ttl: Duration,
    cached: Option<Stamped<Vec<ModelInfo>>>,
    selected: Option<String>,
}

impl ModelCatalog {
    /// Catalog that keeps its cache and selection in memory only.
    pub fn new(transport: Arc<dyn ChatTransport>) -> Self {
        Self {
            transport,
            preferences: None,
            ttl: MODEL_CACHE_TTL,
            cached: None,
            selected: None,
        }
    }

    /// Persist the cache and the selection in `preferences`.
    pub fn with_storage(mut self, preferences: PreferenceStorage) -> Self {
        self.preferences = Some(preferences);
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Cached list while fresh, otherwise a refresh.
    pub async fn models(&mut self) -> ModelListing {
        if let Some(cached) = self.read_cache() {
            let age = cached.age_ms(time_utils::now_ms());
            if u128::try_from(age).unwrap_or(0) < self.ttl.as_millis() {
                return ModelListing {
                    models: cached.value,
                    source: CatalogSource::Cache,
                };
            }
        }
        self.refresh().await
    }

    /// Fetch from the endpoint, falling back to the stale cache or defaults.
    pub async fn refresh(&mut self) -> ModelListing {
        match self.transport.list_models().await {
            Ok(models) if !models.is_empty() => {
                debug!(count = models.len(), "Fetched model list");
                self.write_cache(&models);
                ModelListing {
                    models,
                    source: CatalogSource::Fresh,
                }
            }
            Ok(_) => self.fallback("models endpoint returned an empty list"),
            Err(error) => self.fallback(&error.to_string()),
        }
    }

    /// The saved selection, which may not be in the current list.
    pub fn selected_model(&self) -> Option<String> {
        match &self.preferences {
            Some(preferences) => preferences
                .get::<String>(SELECTED_MODEL_KEY)
                .unwrap_or_else(|error| {
                    warn!(%error, "Failed to read selected model");
                    None
                }),
            None => self.selected.clone(),
        }
    }

    /// Save `model_id` as the selection; it must be one of `available`.
    pub fn select_model(&mut self, model_id: &str, available: &[ModelInfo]) -> Result<()> {
        if !available.iter().any(|model| model.id == model_id) {
            return Err(SessionError::UnknownModel(model_id.to_string()));
        }
        self.save_selection(model_id)
    }

    /// Keep the saved selection when it is listed, otherwise select and save
    /// the first listed model.
    pub fn reconcile_selection(&mut self, available: &[ModelInfo]) -> Result<Option<String>> {
        let saved = self.selected_model();
        if let Some(saved) = saved.filter(|id| available.iter().any(|model| &model.id == id)) {
            return Ok(Some(saved));
        }
        let Some(first) = available.first() else {
            return Ok(None);
        };
        debug!(model = %first.id, "Selecting first available model");
        self.save_selection(&first.id)?;
        Ok(Some(first.id.clone()))
    }

    fn save_selection(&mut self, model_id: &str) -> Result<()> {
        match &self.preferences {
            Some(preferences) => preferences.set(SELECTED_MODEL_KEY, &model_id)?,
            None => self.selected = Some(model_id.to_string()),
        }
        Ok(())
    }

    fn fallback(&self, reason: &str) -> ModelListing {
        if let Some(cached) = self.read_cache() {
            warn!(reason, "Model list unavailable, using cached list");
            return ModelListing {
                models: cached.value,
                source: CatalogSource::StaleCache,
            };
        }
        warn!(reason, "Model list unavailable, using built-in defaults");
        ModelListing {
            models: default_models(),
            source: CatalogSource::Defaults,
        }
    }

    fn read_cache(&self) -> Option<Stamped<Vec<ModelInfo>>> {
        match &self.preferences {
            Some(preferences) => preferences
                .get_stamped(MODEL_CACHE_KEY)
                .unwrap_or_else(|error| {
                    warn!(%error, "Ignoring unreadable model cache");
                    None
                }),
            None => self.cached.clone(),
        }
    }

    fn write_cache(&mut self, models: &[ModelInfo]) {
        match &self.preferences {
            Some(preferences) => {
                if let Err(error) = preferences.set_stamped(MODEL_CACHE_KEY, &models) {
                    warn!(%error, "Failed to cache model list");
                }
            }
            None => {
                self.cached = Some(Stamped {
                    value: models.to_vec(),
                    stored_at: time_utils::now_ms(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamchat_ai::mock::ScriptedTransport;
    use streamchat_storage::Storage;
    use tempfile::tempdir;

    fn served() -> Vec<ModelInfo> {
        vec![
            ModelInfo::new("qwen", "Qwen", None),
            ModelInfo::new("llama", "Llama", Some("Meta")),
        ]
    }

    fn online() -> Arc<dyn ChatTransport> {
        Arc::new(ScriptedTransport::new(vec![]).with_models(served()))
    }

    fn offline() -> Arc<dyn ChatTransport> {
        Arc::new(ScriptedTransport::new(vec![]))
    }

    #[tokio::test]
    async fn test_fresh_then_cached() {
        let mut catalog = ModelCatalog::new(online());

        let first = catalog.models().await;
        assert_eq!(first.source, CatalogSource::Fresh);
        assert_eq!(first.models, served());

        let second = catalog.models().await;
        assert_eq!(second.source, CatalogSource::Cache);
        assert_eq!(second.models, served());
    }

    #[tokio::test]
    async fn test_expired_cache_is_refetched() {
        let mut catalog = ModelCatalog::new(online()).with_ttl(Duration::ZERO);
        catalog.models().await;
        assert_eq!(catalog.models().await.source, CatalogSource::Fresh);
    }

    #[tokio::test]
    async fn test_offline_without_cache_uses_defaults() {
        let mut catalog = ModelCatalog::new(offline());
        let listing = catalog.models().await;
        assert_eq!(listing.source, CatalogSource::Defaults);
        assert_eq!(listing.models.len(), 3);
        assert_eq!(listing.models[0].id, "deepseek-ai/deepseek-coder-33b-instruct");
    }

    #[tokio::test]
    async fn test_offline_uses_stale_persisted_cache() {
        let temp_dir = tempdir().unwrap();
        let storage = Storage::new(temp_dir.path().join("db")).unwrap();

        let mut warm = ModelCatalog::new(online()).with_storage(storage.preferences.clone());
        assert_eq!(warm.refresh().await.source, CatalogSource::Fresh);

        let mut cold = ModelCatalog::new(offline())
            .with_storage(storage.preferences.clone())
            .with_ttl(Duration::ZERO);
        let listing = cold.models().await;
        assert_eq!(listing.source, CatalogSource::StaleCache);
        assert_eq!(listing.models, served());
    }

    #[test]
    fn test_reconcile_replaces_missing_selection() {
        let temp_dir = tempdir().unwrap();
        let storage = Storage::new(temp_dir.path().join("db")).unwrap();
        storage
            .preferences
            .set(SELECTED_MODEL_KEY, &"retired-model")
            .unwrap();

        let mut catalog = ModelCatalog::new(offline()).with_storage(storage.preferences.clone());
        let selected = catalog.reconcile_selection(&served()).unwrap();
        assert_eq!(selected.as_deref(), Some("qwen"));

        let saved: Option<String> = storage.preferences.get(SELECTED_MODEL_KEY).unwrap();
        assert_eq!(saved.as_deref(), Some("qwen"));
    }

    #[test]
    fn test_select_model_validates_against_list() {
        let mut catalog = ModelCatalog::new(offline());
        catalog.select_model("llama", &served()).unwrap();
        assert_eq!(catalog.selected_model().as_deref(), Some("llama"));
        assert_eq!(
            catalog.reconcile_selection(&served()).unwrap().as_deref(),
            Some("llama")
        );

        assert!(matches!(
            catalog.select_model("gpt", &served()),
            Err(SessionError::UnknownModel(id)) if id == "gpt"
        ));
        assert!(catalog.reconcile_selection(&[]).unwrap().is_none());
    }
}
