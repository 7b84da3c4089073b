use std::sync::Arc;

use crate::oracle::DocumentSource;

#[derive(Clone)]
pub struct AppState {
    pub source: Arc<dyn DocumentSource>,
}

impl AppState {
    pub fn new(source: Arc<dyn DocumentSource>) -> Self {
        Self { source }
    }
}
