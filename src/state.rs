use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Config;
use crate::db::Pool;
use crate::plex::DirectoryConnector;

/// Everything a reconciliation cycle needs, shared by the HTTP router and the
/// daily scheduler.
#[derive(Clone)]
pub struct AppContext {
    pub pool: Pool,
    pub connector: Arc<dyn DirectoryConnector>,
    pub secrets_path: PathBuf,
    pub target_tag_id: u32,
}

impl AppContext {
    pub fn new(
        pool: Pool,
        connector: Arc<dyn DirectoryConnector>,
        secrets_path: PathBuf,
        target_tag_id: u32,
    ) -> Self {
        Self {
            pool,
            connector,
            secrets_path,
            target_tag_id,
        }
    }

    pub fn from_config(cfg: &Config, pool: Pool, connector: Arc<dyn DirectoryConnector>) -> Self {
        Self::new(pool, connector, cfg.secrets_path(), cfg.plex.target_tag_id)
    }
}
