use std::{sync::Arc, time::Duration};

use meilisearch_sdk::client::Client;
use redis::aio::ConnectionManager;

use super::{
    config::Config,
    database::init_redis,
    mail::{Mailer, init_mailer},
    search::init_meilisearch,
};

pub struct AppState {
    pub config: Config,
    pub redis_connection: ConnectionManager,
    pub meili_client: Option<Arc<Client>>,
    pub http_client: reqwest::Client,
    pub mailer: Option<Mailer>,
}

impl AppState {
    pub async fn new() -> Arc<Self> {
        let config = Config::load();

        let redis_connection = init_redis(&config.redis_url).await;

        let meili_client = match &config.meili_key {
            Some(key) => Some(init_meilisearch(&config.meili_url, key).await),
            None => None,
        };

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");

        let mailer = init_mailer(&config);

        Arc::new(Self {
            config,
            redis_connection,
            meili_client,
            http_client,
            mailer,
        })
    }
}
