use std::sync::Arc;

use crate::application::RagSystem;
use crate::infrastructure::Config;

#[derive(Clone)]
pub struct AppState {
    pub rag: Arc<RagSystem>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(rag: Arc<RagSystem>, config: Config) -> Self {
        Self {
            rag,
            config: Arc::new(config),
        }
    }
}
