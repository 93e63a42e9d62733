use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::IntoResponse,
};
use chrono::Utc;
use rand::thread_rng;
use redis::aio::ConnectionManager;
use serde::Deserialize;
use serde_json::json;

use crate::{
    auth::{self, Claims, authenticate},
    database,
    error::AppError,
    mail, moderation,
    models::{Campaign, Contribution, Reply},
    otp::{self, Verification},
    search,
    state::AppState,
};

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

fn auth_claims(state: &AppState, headers: &HeaderMap) -> Result<Claims, AppError> {
    authenticate(
        state.config.auth_secret.as_deref(),
        headers,
        Utc::now().timestamp(),
    )
}

fn require(value: &str, name: &'static str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::MissingField(name));
    }

    Ok(())
}

/// Runs the full OTP verification state machine against the store: the
/// record is taken atomically, restored only on a mismatch, and gone for
/// good on success or expiry.
async fn consume_otp(
    conn: &mut ConnectionManager,
    email: &str,
    submitted: &str,
) -> Result<(), AppError> {
    let record = database::take_otp(conn, email).await?;

    match otp::check(record.as_ref(), submitted, Utc::now().timestamp_millis()) {
        Verification::Missing => Err(AppError::OtpNotFound),
        Verification::Expired => Err(AppError::OtpExpired),
        Verification::Mismatch => {
            let record = record.expect("mismatch implies a record");
            database::restore_otp(conn, email, &record).await?;
            Err(AppError::OtpMismatch)
        }
        Verification::Accepted => Ok(()),
    }
}

#[derive(Deserialize)]
pub struct EmailPayload {
    #[serde(default)]
    email: String,
}

pub async fn generate_otp_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<EmailPayload>,
) -> Result<impl IntoResponse, AppError> {
    require(&payload.email, "email")?;

    let mailer = state.mailer.as_ref().ok_or(AppError::FeatureDisabled("Mail"))?;
    let sender = state
        .config
        .email_user
        .as_deref()
        .ok_or(AppError::FeatureDisabled("Mail"))?;

    let record = {
        let mut rng = thread_rng();
        otp::new_record(&mut rng, Utc::now().timestamp_millis())
    };

    let mut conn = state.redis_connection.clone();
    database::store_otp(&mut conn, &payload.email, &record).await?;

    mail::send_otp(mailer, sender, &payload.email, &record.otp).await?;

    Ok(Json(json!({ "message": "OTP sent successfully" })))
}

#[derive(Deserialize)]
pub struct VerifyOtpPayload {
    #[serde(default)]
    email: String,
    #[serde(default)]
    otp: String,
}

pub async fn verify_otp_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<VerifyOtpPayload>,
) -> Result<impl IntoResponse, AppError> {
    require(&payload.email, "email")?;
    require(&payload.otp, "otp")?;

    let mut conn = state.redis_connection.clone();
    consume_otp(&mut conn, &payload.email, &payload.otp).await?;

    Ok(Json(json!({ "message": "OTP verified successfully" })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalPayload {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    target_amount: String,
}

pub async fn validate_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ProposalPayload>,
) -> Result<impl IntoResponse, AppError> {
    require(&payload.title, "title")?;
    require(&payload.description, "description")?;
    require(&payload.target_amount, "targetAmount")?;

    let api_key = state
        .config
        .gemini_api_key
        .as_deref()
        .ok_or(AppError::FeatureDisabled("Moderation"))?;

    let verdict = moderation::evaluate(
        &state.http_client,
        api_key,
        &payload.title,
        &payload.description,
        &payload.target_amount,
    )
    .await?;

    Ok(Json(json!({
        "isValid": verdict.is_valid,
        "explanation": verdict.explanation,
    })))
}

#[derive(Deserialize)]
pub struct TokenPayload {
    #[serde(default)]
    token: String,
}

pub async fn set_token_handler(
    Json(payload): Json<TokenPayload>,
) -> Result<impl IntoResponse, AppError> {
    require(&payload.token, "token")?;

    Ok((
        [(SET_COOKIE, auth::session_cookie(&payload.token))],
        Json(json!({ "message": "Token set successfully" })),
    ))
}

pub async fn signout_handler() -> impl IntoResponse {
    (
        [(SET_COOKIE, auth::clear_session_cookie())],
        Json(json!({ "message": "Logged out successfully" })),
    )
}

pub async fn verify_token_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<TokenPayload>,
) -> Result<impl IntoResponse, AppError> {
    let secret = state
        .config
        .auth_secret
        .as_deref()
        .ok_or(AppError::FeatureDisabled("Authentication"))?;

    let claims = auth::verify_token(secret, &payload.token, Utc::now().timestamp())
        .map_err(|_| AppError::Unauthorized)?;

    Ok(Json(json!({ "decodedToken": claims })))
}

pub async fn contract_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let address = state
        .config
        .contract_address
        .as_deref()
        .ok_or(AppError::FeatureDisabled("Contract"))?;

    Ok(Json(json!({ "address": address })))
}

pub async fn list_campaigns_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = state.redis_connection.clone();
    let campaigns = database::list_campaigns(&mut conn).await?;

    Ok(Json(campaigns))
}

pub async fn campaign_handler(
    State(state): State<Arc<AppState>>,
    Path(campaign_id): Path<u64>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = state.redis_connection.clone();
    let campaign = database::require_campaign(&mut conn, campaign_id).await?;

    Ok(Json(campaign))
}

pub async fn profile_campaigns_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let claims = auth_claims(&state, &headers)?;

    let mut conn = state.redis_connection.clone();
    let campaigns: Vec<Campaign> = database::list_campaigns(&mut conn)
        .await?
        .into_iter()
        .filter(|campaign| campaign.user_id == claims.sub)
        .collect();

    Ok(Json(campaigns))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCampaignPayload {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    target_amount: String,
    transaction_hash: Option<String>,
}

/// The client has already confirmed the `createListing` transaction through
/// the wallet; this records the campaign with the next atomically-allocated
/// id. A missing counter aborts creation even though the on-chain listing
/// exists (seed it with `nidhi-admin init-counter`).
pub async fn create_campaign_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CreateCampaignPayload>,
) -> Result<impl IntoResponse, AppError> {
    let claims = auth_claims(&state, &headers)?;

    require(&payload.title, "title")?;
    require(&payload.description, "description")?;
    require(&payload.target_amount, "targetAmount")?;

    let target: f64 = payload
        .target_amount
        .trim()
        .parse()
        .map_err(|_| AppError::InvalidField("target amount"))?;
    if !target.is_finite() || target <= 0.0 {
        return Err(AppError::InvalidField("target amount"));
    }

    let mut conn = state.redis_connection.clone();
    let campaign_id = database::allocate_campaign_id(&mut conn).await?;

    let campaign = Campaign {
        campaign_id,
        title: payload.title,
        description: payload.description,
        target_amount: payload.target_amount.trim().to_string(),
        amount_raised: 0.0,
        user_id: claims.sub,
        is_active: true,
        created_at: now_rfc3339(),
        transaction_hash: payload.transaction_hash,
    };

    database::put_campaign(&mut conn, &campaign).await?;
    search::sync_campaign(state.meili_client.as_ref(), &campaign).await;

    Ok((StatusCode::CREATED, Json(campaign)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributePayload {
    #[serde(default)]
    amount: f64,
    contributor_name: Option<String>,
}

fn contributor_name(submitted: Option<String>, claims: &Claims) -> String {
    match submitted {
        Some(name) if !name.trim().is_empty() => name,
        _ => claims.display_name(&claims.sub),
    }
}

/// Records a confirmed `fundListing` transaction: atomic raise-total
/// increment plus an immutable contribution record.
pub async fn contribute_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(campaign_id): Path<u64>,
    Json(payload): Json<ContributePayload>,
) -> Result<impl IntoResponse, AppError> {
    let claims = auth_claims(&state, &headers)?;

    if !payload.amount.is_finite() || payload.amount <= 0.0 {
        return Err(AppError::InvalidField("contribution amount"));
    }

    let mut conn = state.redis_connection.clone();
    let mut campaign = database::require_campaign(&mut conn, campaign_id).await?;

    let contribution = Contribution {
        campaign_id,
        contributor_name: contributor_name(payload.contributor_name, &claims),
        amount: payload.amount,
        timestamp: now_rfc3339(),
    };

    let total = database::add_contribution(&mut conn, &contribution).await?;

    campaign.amount_raised = total;
    search::sync_campaign(state.meili_client.as_ref(), &campaign).await;

    Ok(Json(json!({
        "message": "Contribution successful! Amount updated.",
        "amountRaised": total,
    })))
}

pub async fn contributions_handler(
    State(state): State<Arc<AppState>>,
    Path(campaign_id): Path<u64>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = state.redis_connection.clone();
    let contributions = database::list_contributions(&mut conn, campaign_id).await?;

    Ok(Json(contributions))
}

#[derive(Deserialize)]
pub struct ClosePayload {
    #[serde(default)]
    email: String,
    #[serde(default)]
    otp: String,
}

/// Closing is step-up authenticated: the caller re-verifies by OTP before
/// anything else runs. Only the owner may close. The client has already
/// confirmed `closeListing` on-chain; a store failure after that leaves the
/// two sides divergent, surfaced as the store error.
pub async fn close_campaign_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(campaign_id): Path<u64>,
    Json(payload): Json<ClosePayload>,
) -> Result<impl IntoResponse, AppError> {
    let claims = auth_claims(&state, &headers)?;

    require(&payload.email, "email")?;
    require(&payload.otp, "otp")?;

    let mut conn = state.redis_connection.clone();
    consume_otp(&mut conn, &payload.email, &payload.otp).await?;

    let mut campaign = database::require_campaign(&mut conn, campaign_id).await?;
    if campaign.user_id != claims.sub {
        return Err(AppError::Forbidden);
    }

    database::set_campaign_inactive(&mut conn, campaign_id).await?;

    campaign.is_active = false;
    search::sync_campaign(state.meili_client.as_ref(), &campaign).await;

    Ok(Json(json!({ "message": "Campaign closed successfully." })))
}

#[derive(Deserialize)]
pub struct TextPayload {
    #[serde(default)]
    text: String,
}

pub async fn post_comment_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(campaign_id): Path<u64>,
    Json(payload): Json<TextPayload>,
) -> Result<impl IntoResponse, AppError> {
    let claims = auth_claims(&state, &headers)?;
    require(&payload.text, "text")?;

    let mut conn = state.redis_connection.clone();
    database::require_campaign(&mut conn, campaign_id).await?;

    let comment = database::add_comment(
        &mut conn,
        campaign_id,
        claims.sub.clone(),
        claims.display_name("Anonymous"),
        payload.text,
        now_rfc3339(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn comments_handler(
    State(state): State<Arc<AppState>>,
    Path(campaign_id): Path<u64>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = state.redis_connection.clone();
    let comments = database::list_comments(&mut conn, campaign_id).await?;

    Ok(Json(comments))
}

pub async fn post_reply_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((campaign_id, comment_id)): Path<(u64, String)>,
    Json(payload): Json<TextPayload>,
) -> Result<impl IntoResponse, AppError> {
    let claims = auth_claims(&state, &headers)?;
    require(&payload.text, "text")?;

    let reply = Reply {
        author_id: claims.sub.clone(),
        author_name: claims.display_name("Creator"),
        text: payload.text,
        created_at: now_rfc3339(),
    };

    let mut conn = state.redis_connection.clone();
    let comment = database::append_reply(&mut conn, campaign_id, &comment_id, reply).await?;

    Ok(Json(comment))
}

#[derive(Deserialize)]
pub struct SearchParams {
    q: Option<String>,
    sort: Option<String>,
}

pub async fn search_campaigns_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, AppError> {
    let meili_client = state
        .meili_client
        .as_ref()
        .ok_or(AppError::FeatureDisabled("Search"))?;

    let campaigns = search::search_campaigns(
        meili_client,
        params.q.as_deref().unwrap_or(""),
        params.sort.as_deref().unwrap_or("newest"),
    )
    .await?;

    Ok(Json(campaigns))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(name: Option<&str>) -> Claims {
        Claims {
            sub: "user-1".to_string(),
            email: None,
            name: name.map(|n| n.to_string()),
            exp: i64::MAX,
        }
    }

    #[test]
    fn test_contributor_name_fallbacks() {
        assert_eq!(
            contributor_name(Some("Asha".to_string()), &claims(None)),
            "Asha"
        );
        assert_eq!(
            contributor_name(Some("  ".to_string()), &claims(Some("Ravi"))),
            "Ravi"
        );
        // No submitted name and no display name falls back to the user id.
        assert_eq!(contributor_name(None, &claims(None)), "user-1");
    }

    #[test]
    fn test_payload_defaults() {
        let payload: EmailPayload = serde_json::from_str("{}").unwrap();
        assert!(payload.email.is_empty());

        let payload: CreateCampaignPayload =
            serde_json::from_str(r#"{"title":"t","description":"d","targetAmount":"1.5"}"#)
                .unwrap();
        assert_eq!(payload.target_amount, "1.5");
        assert!(payload.transaction_hash.is_none());
    }

    #[test]
    fn test_require() {
        assert!(require("value", "field").is_ok());
        assert!(matches!(
            require("  ", "field"),
            Err(AppError::MissingField("field"))
        ));
    }
}
