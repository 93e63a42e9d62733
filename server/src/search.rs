//! # Meilisearch
//!
//! Search engine behind campaign browsing.
//!
//! ## Schema
//! - One index for all campaigns, primary key `campaignId`
//! - Searchable: `title`, `description`
//! - Sortable: `createdAt`, `amountRaised` (the newest/oldest and
//!   most/least-funded orderings the campaign list offers)
//!
//! ## Sync
//! Redis stays the source of truth. Handlers upsert the changed campaign
//! document after each successful store write; a failed upsert only logs,
//! and `nidhi-admin reindex` repairs any drift.

use std::sync::Arc;

use meilisearch_sdk::{
    client::Client,
    settings::{MinWordSizeForTypos, Settings, TypoToleranceSettings},
};
use tracing::warn;

use crate::{error::AppError, models::Campaign};

pub const CAMPAIGN_INDEX: &str = "campaigns";
pub const CAMPAIGN_ID: &str = "campaignId";
pub const CAMPAIGN_TITLE: &str = "title";
pub const CAMPAIGN_DESCRIPTION: &str = "description";
pub const CAMPAIGN_CREATED_AT: &str = "createdAt";
pub const CAMPAIGN_AMOUNT_RAISED: &str = "amountRaised";

pub async fn init_meilisearch(meili_url: &str, meili_admin_key: &str) -> Arc<Client> {
    let meili_client = Arc::new(Client::new(meili_url, Some(meili_admin_key)).unwrap());

    if let Err(e) = meili_client
        .index(CAMPAIGN_INDEX)
        .set_settings(&init_settings())
        .await
    {
        warn!("Failed to push search settings, continuing: {e}");
    }

    meili_client
}

fn init_settings() -> Settings {
    Settings::new()
        .with_ranking_rules([
            "words",
            "typo",
            "proximity",
            "exactness",
            "attribute",
            "sort",
        ])
        .with_searchable_attributes([CAMPAIGN_TITLE, CAMPAIGN_DESCRIPTION])
        .with_sortable_attributes([CAMPAIGN_CREATED_AT, CAMPAIGN_AMOUNT_RAISED])
        .with_typo_tolerance(TypoToleranceSettings {
            enabled: Some(true),
            disable_on_attributes: None,
            disable_on_words: None,
            min_word_size_for_typos: Some(MinWordSizeForTypos {
                one_typo: Some(5),
                two_typos: Some(9),
            }),
        })
}

/// Sort expression for a campaign-list ordering option. Unknown options fall
/// back to newest first.
pub fn sort_expr(option: &str) -> &'static str {
    match option {
        "oldest" => "createdAt:asc",
        "mostFunded" => "amountRaised:desc",
        "leastFunded" => "amountRaised:asc",
        _ => "createdAt:desc",
    }
}

pub async fn search_campaigns(
    meili_client: &Client,
    query: &str,
    sort: &str,
) -> Result<Vec<Campaign>, AppError> {
    let results = meili_client
        .index(CAMPAIGN_INDEX)
        .search()
        .with_query(query)
        .with_sort(&[sort_expr(sort)])
        .execute::<Campaign>()
        .await?;

    Ok(results.hits.into_iter().map(|hit| hit.result).collect())
}

/// Queues an index update for one campaign without waiting for the task.
pub async fn upsert_campaign(meili_client: &Client, campaign: &Campaign) -> Result<(), AppError> {
    meili_client
        .index(CAMPAIGN_INDEX)
        .add_or_update(&[campaign.clone()], Some(CAMPAIGN_ID))
        .await?;

    Ok(())
}

/// Batch upsert that waits for completion; used by the reindex tool.
pub async fn upsert_campaigns(
    meili_client: &Arc<Client>,
    campaigns: &[Campaign],
) -> Result<(), AppError> {
    meili_client
        .index(CAMPAIGN_INDEX)
        .add_or_update(campaigns, Some(CAMPAIGN_ID))
        .await?
        .wait_for_completion(meili_client, None, None)
        .await?;

    Ok(())
}

/// Best-effort sync after a store write. The store is already committed, so
/// an index failure is logged rather than surfaced.
pub async fn sync_campaign(meili_client: Option<&Arc<Client>>, campaign: &Campaign) {
    let Some(meili_client) = meili_client else {
        return;
    };

    if let Err(e) = upsert_campaign(meili_client, campaign).await {
        warn!(
            "Search sync failed for campaign {}: {e}",
            campaign.campaign_id
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_options() {
        assert_eq!(sort_expr("newest"), "createdAt:desc");
        assert_eq!(sort_expr("oldest"), "createdAt:asc");
        assert_eq!(sort_expr("mostFunded"), "amountRaised:desc");
        assert_eq!(sort_expr("leastFunded"), "amountRaised:asc");
        assert_eq!(sort_expr("bogus"), "createdAt:desc");
    }
}
