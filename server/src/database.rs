//! # Redis
//!
//! The document store. The server owns all persisted state; clients never
//! talk to the store directly.
//!
//! ## Key schema
//!
//! - `campaign_counter`: string int, last-assigned campaign id. Incremented
//!   atomically per creation, never auto-initialized (seed it with
//!   `nidhi-admin init-counter`).
//! - `campaign:{id}`: hash of campaign fields. `amount_raised` is mutated
//!   only through `HINCRBYFLOAT` so concurrent contributions always sum.
//! - `campaign:{id}:comment_counter`: string int, per-campaign comment ids.
//! - `campaign:{id}:comments`: hash of comment id to comment JSON, replies
//!   embedded.
//! - `campaign:{id}:contributions`: list of contribution JSON, newest first.
//! - `otp:{email}`: OTP JSON. Taken with `GETDEL` during verification so a
//!   code can be accepted at most once; a mismatch puts it back with
//!   `SET NX` to never clobber a newer code.

use std::{collections::HashMap, time::Duration};

use redis::{
    Client,
    aio::{ConnectionManager, ConnectionManagerConfig},
    AsyncCommands,
};

use crate::{
    error::AppError,
    models::{Campaign, Comment, Contribution, OtpRecord, Reply},
};

pub const COUNTER_KEY: &str = "campaign_counter";

pub fn campaign_key(campaign_id: u64) -> String {
    format!("campaign:{campaign_id}")
}

pub fn comment_counter_key(campaign_id: u64) -> String {
    format!("campaign:{campaign_id}:comment_counter")
}

pub fn comments_key(campaign_id: u64) -> String {
    format!("campaign:{campaign_id}:comments")
}

pub fn contributions_key(campaign_id: u64) -> String {
    format!("campaign:{campaign_id}:contributions")
}

pub fn otp_key(email: &str) -> String {
    format!("otp:{email}")
}

pub async fn init_redis(redis_url: &str) -> ConnectionManager {
    let config = ConnectionManagerConfig::new()
        .set_number_of_retries(1)
        .set_connection_timeout(Duration::from_millis(500));

    let client = Client::open(redis_url).unwrap();
    let connection_manager = client
        .get_connection_manager_with_config(config)
        .await
        .unwrap();

    connection_manager
}

/// Seeds the campaign counter. Refuses to clobber an existing counter;
/// returns whether the seed was written.
pub async fn seed_counter(conn: &mut ConnectionManager, value: u64) -> Result<bool, AppError> {
    Ok(conn.set_nx(COUNTER_KEY, value).await?)
}

/// Allocates the next campaign id. The counter must already exist; creation
/// aborts outright when it does not.
pub async fn allocate_campaign_id(conn: &mut ConnectionManager) -> Result<u64, AppError> {
    let exists: bool = conn.exists(COUNTER_KEY).await?;
    if !exists {
        return Err(AppError::CounterMissing);
    }

    Ok(conn.incr(COUNTER_KEY, 1u64).await?)
}

pub async fn last_campaign_id(conn: &mut ConnectionManager) -> Result<u64, AppError> {
    let last: Option<u64> = conn.get(COUNTER_KEY).await?;

    Ok(last.unwrap_or(0))
}

pub async fn put_campaign(
    conn: &mut ConnectionManager,
    campaign: &Campaign,
) -> Result<(), AppError> {
    let _: () = conn
        .hset_multiple(campaign_key(campaign.campaign_id), &campaign.to_fields())
        .await?;

    Ok(())
}

pub async fn fetch_campaign(
    conn: &mut ConnectionManager,
    campaign_id: u64,
) -> Result<Option<Campaign>, AppError> {
    let fields: HashMap<String, String> = conn.hgetall(campaign_key(campaign_id)).await?;

    if fields.is_empty() {
        return Ok(None);
    }

    Campaign::from_fields(&fields).map(Some)
}

pub async fn require_campaign(
    conn: &mut ConnectionManager,
    campaign_id: u64,
) -> Result<Campaign, AppError> {
    fetch_campaign(conn, campaign_id)
        .await?
        .ok_or(AppError::CampaignNotFound)
}

/// All campaigns, newest id first. Ids are dense, so walking the counter
/// range is a full scan of the collection.
pub async fn list_campaigns(conn: &mut ConnectionManager) -> Result<Vec<Campaign>, AppError> {
    let last = last_campaign_id(conn).await?;
    let mut campaigns = Vec::new();

    for campaign_id in (1..=last).rev() {
        if let Some(campaign) = fetch_campaign(conn, campaign_id).await? {
            campaigns.push(campaign);
        }
    }

    Ok(campaigns)
}

pub async fn set_campaign_inactive(
    conn: &mut ConnectionManager,
    campaign_id: u64,
) -> Result<(), AppError> {
    let _: () = conn
        .hset(campaign_key(campaign_id), "is_active", "false")
        .await?;

    Ok(())
}

/// Applies a contribution: atomic raise-total increment, then an immutable
/// contribution record. Returns the post-increment total.
pub async fn add_contribution(
    conn: &mut ConnectionManager,
    contribution: &Contribution,
) -> Result<f64, AppError> {
    let total: f64 = conn
        .hincr(
            campaign_key(contribution.campaign_id),
            "amount_raised",
            contribution.amount,
        )
        .await?;

    let _: () = conn
        .lpush(
            contributions_key(contribution.campaign_id),
            serde_json::to_string(contribution)?,
        )
        .await?;

    Ok(total)
}

pub async fn list_contributions(
    conn: &mut ConnectionManager,
    campaign_id: u64,
) -> Result<Vec<Contribution>, AppError> {
    let raw: Vec<String> = conn.lrange(contributions_key(campaign_id), 0, -1).await?;

    raw.iter()
        .map(|entry| {
            serde_json::from_str(entry).map_err(|_| AppError::MalformedRecord("contribution"))
        })
        .collect()
}

pub async fn add_comment(
    conn: &mut ConnectionManager,
    campaign_id: u64,
    author_id: String,
    author_name: String,
    text: String,
    created_at: String,
) -> Result<Comment, AppError> {
    let id: u64 = conn.incr(comment_counter_key(campaign_id), 1u64).await?;

    let comment = Comment {
        id: id.to_string(),
        author_id,
        author_name,
        text,
        created_at,
        replies: Vec::new(),
    };

    let _: () = conn
        .hset(
            comments_key(campaign_id),
            &comment.id,
            serde_json::to_string(&comment)?,
        )
        .await?;

    Ok(comment)
}

/// Comments ordered oldest first, replies embedded.
pub async fn list_comments(
    conn: &mut ConnectionManager,
    campaign_id: u64,
) -> Result<Vec<Comment>, AppError> {
    let raw: HashMap<String, String> = conn.hgetall(comments_key(campaign_id)).await?;

    let mut comments = raw
        .values()
        .map(|entry| {
            serde_json::from_str::<Comment>(entry)
                .map_err(|_| AppError::MalformedRecord("comment"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    comments.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    Ok(comments)
}

/// Appends a reply to a comment. Single-document read-modify-write, matching
/// the update granularity the store offers for embedded arrays.
pub async fn append_reply(
    conn: &mut ConnectionManager,
    campaign_id: u64,
    comment_id: &str,
    reply: Reply,
) -> Result<Comment, AppError> {
    let raw: Option<String> = conn.hget(comments_key(campaign_id), comment_id).await?;
    let raw = raw.ok_or(AppError::CommentNotFound)?;

    let mut comment: Comment =
        serde_json::from_str(&raw).map_err(|_| AppError::MalformedRecord("comment"))?;
    comment.replies.push(reply);

    let _: () = conn
        .hset(
            comments_key(campaign_id),
            comment_id,
            serde_json::to_string(&comment)?,
        )
        .await?;

    Ok(comment)
}

/// Upserts the live OTP for an email, replacing any prior code.
pub async fn store_otp(
    conn: &mut ConnectionManager,
    email: &str,
    record: &OtpRecord,
) -> Result<(), AppError> {
    let _: () = conn
        .set(otp_key(email), serde_json::to_string(record)?)
        .await?;

    Ok(())
}

/// Atomically removes and returns the live OTP. Of two concurrent
/// verifications only one can observe the record.
pub async fn take_otp(
    conn: &mut ConnectionManager,
    email: &str,
) -> Result<Option<OtpRecord>, AppError> {
    let raw: Option<String> = conn.get_del(otp_key(email)).await?;

    raw.map(|entry| {
        serde_json::from_str(&entry).map_err(|_| AppError::MalformedRecord("otp"))
    })
    .transpose()
}

/// Puts a taken OTP back after a mismatched attempt. `SET NX` keeps any code
/// generated in the meantime.
pub async fn restore_otp(
    conn: &mut ConnectionManager,
    email: &str,
    record: &OtpRecord,
) -> Result<(), AppError> {
    let _: bool = conn
        .set_nx(otp_key(email), serde_json::to_string(record)?)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_schema() {
        assert_eq!(campaign_key(12), "campaign:12");
        assert_eq!(comments_key(12), "campaign:12:comments");
        assert_eq!(comment_counter_key(12), "campaign:12:comment_counter");
        assert_eq!(contributions_key(12), "campaign:12:contributions");
        assert_eq!(otp_key("a@b.com"), "otp:a@b.com");
    }
}
