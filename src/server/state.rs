//! Application state management

use crate::scoring::ScoringModel;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::ServerConfig;

/// Application state shared across handlers
pub struct AppState {
    pub config: ServerConfig,
    pub model: RwLock<Option<Arc<ScoringModel>>>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: ServerConfig, model: Option<ScoringModel>) -> Self {
        Self {
            config,
            model: RwLock::new(model.map(Arc::new)),
            started_at: Utc::now(),
        }
    }

    /// Currently loaded scoring model, if any
    pub async fn current_model(&self) -> Option<Arc<ScoringModel>> {
        self.model.read().await.clone()
    }

    pub async fn replace_model(&self, model: ScoringModel) {
        *self.model.write().await = Some(Arc::new(model));
    }
}
