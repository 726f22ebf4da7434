use std::sync::Arc;

use crate::core::config::AppConfig;
use crate::core::shared::CompanyProfile;
use crate::documents::assets::DocumentAssets;
use crate::store::QuotationStore;

/// Shared, read-only context handed to every request or CLI command.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn QuotationStore>,
    pub assets: DocumentAssets,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn QuotationStore>) -> Self {
        let assets = DocumentAssets::load(config.documents.logo_path.as_deref());
        Self {
            config,
            store,
            assets,
        }
    }

    pub fn with_assets(mut self, assets: DocumentAssets) -> Self {
        self.assets = assets;
        self
    }

    pub fn fallback_company(&self) -> CompanyProfile {
        self.config.fallback_company()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("assets", &self.assets)
            .finish_non_exhaustive()
    }
}
