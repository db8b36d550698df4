use crate::config::Config;
use crate::db::Repository;
use crate::storage::FileStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repository>,
    pub files: Arc<dyn FileStore>,
    pub config: Arc<Config>,
}
