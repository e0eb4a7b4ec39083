use crate::config::AppConfig;
use crate::db::connection::DbPool;
use crate::stock::StockPriceClient;
use crate::users::UserStore;
use anyhow::anyhow;
use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use std::sync::Arc;

/// Everything a request handler needs, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub prices: StockPriceClient,
    pub users: UserStore,
    pub cookie_key: Key,
}

impl AppState {
    pub fn new(config: AppConfig, pool: DbPool) -> anyhow::Result<Self> {
        let prices = StockPriceClient::new(
            config.source_url.clone(),
            config.table_marker.clone(),
            config.request_timeout,
        )?;

        let cookie_key = match &config.secret_key {
            Some(secret) => Key::try_from(secret.as_bytes()).map_err(|e| anyhow!("invalid SECRET_KEY: {e}"))?,
            None => {
                tracing::warn!("SECRET_KEY not set; flash cookies will not survive a restart");
                Key::generate()
            }
        };

        Ok(Self {
            config: Arc::new(config),
            prices,
            users: UserStore::new(pool),
            cookie_key,
        })
    }
}

impl FromRef<AppState> for Arc<AppConfig> {
    fn from_ref(app_state: &AppState) -> Arc<AppConfig> {
        app_state.config.clone()
    }
}

impl FromRef<AppState> for StockPriceClient {
    fn from_ref(app_state: &AppState) -> StockPriceClient {
        app_state.prices.clone()
    }
}

impl FromRef<AppState> for UserStore {
    fn from_ref(app_state: &AppState) -> UserStore {
        app_state.users.clone()
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(app_state: &AppState) -> Key {
        app_state.cookie_key.clone()
    }
}
