//! Backend for Nidhi, a blockchain-based crowdfunding platform.
//!
//! The server owns all persisted state: campaigns, the per-campaign forum,
//! contribution records, one-time passcodes, and the campaign-id counter,
//! all in Redis. Campaign search is proxied through Meilisearch, proposal
//! moderation through the Gemini API, and OTP email through an SMTP relay.
//!
//! Money never moves through this process. Clients sign `createListing`,
//! `fundListing`, and `closeListing` transactions with their own wallet
//! against the fixed contract address and report the receipt hash here; the
//! server records the off-chain side. If a store write fails after a
//! confirmed transaction the two systems diverge and no reconciliation
//! exists; the divergence surfaces only as the failing side's error.

use std::time::Duration;

use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    routing::{delete, get, post},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod mail;
pub mod models;
pub mod moderation;
pub mod otp;
pub mod routes;
pub mod search;
pub mod state;

use routes::{
    campaign_handler, comments_handler, contract_handler, contribute_handler,
    contributions_handler, close_campaign_handler, create_campaign_handler, generate_otp_handler,
    list_campaigns_handler, post_comment_handler, post_reply_handler, profile_campaigns_handler,
    search_campaigns_handler, set_token_handler, signout_handler, validate_handler,
    verify_otp_handler, verify_token_handler,
};
use state::AppState;

pub async fn start_server() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::new().await;

    info!("Starting server...");

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    let app = Router::new()
        .route("/api/otp/generate-otp", post(generate_otp_handler))
        .route("/api/otp/verify-otp", post(verify_otp_handler))
        .route("/api/validate", post(validate_handler))
        .route("/api/auth/setToken", post(set_token_handler))
        .route("/api/auth/signout", delete(signout_handler))
        .route("/api/auth/verify-token", post(verify_token_handler))
        .route("/api/contract", get(contract_handler))
        .route(
            "/api/campaigns",
            get(list_campaigns_handler).post(create_campaign_handler),
        )
        .route("/api/campaigns/search", get(search_campaigns_handler))
        .route("/api/campaigns/:campaign_id", get(campaign_handler))
        .route("/api/campaigns/:campaign_id/close", post(close_campaign_handler))
        .route(
            "/api/campaigns/:campaign_id/contributions",
            get(contributions_handler).post(contribute_handler),
        )
        .route(
            "/api/campaigns/:campaign_id/comments",
            get(comments_handler).post(post_comment_handler),
        )
        .route(
            "/api/campaigns/:campaign_id/comments/:comment_id/replies",
            post(post_reply_handler),
        )
        .route("/api/profile/campaigns", get(profile_campaigns_handler))
        .layer(cors)
        .with_state(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await.unwrap();
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    println!("Server shutting down...");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
