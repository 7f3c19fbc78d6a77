use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::services::mailer::Mailer;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            pool,
            config: Arc::new(config),
            mailer,
        }
    }
}
