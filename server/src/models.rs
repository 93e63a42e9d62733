//! Persisted document shapes.
//!
//! External JSON uses camelCase field names, the shapes the web client
//! reads and writes. Campaigns live in Redis hashes and are decoded
//! through [`Campaign::from_fields`] rather than trusted casts; a document
//! that fails to parse is an error, not a default.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub campaign_id: u64,
    pub title: String,
    pub description: String,
    /// Target in ledger-currency units, kept as the decimal string the
    /// creator submitted.
    pub target_amount: String,
    pub amount_raised: f64,
    pub user_id: String,
    pub is_active: bool,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
}

impl Campaign {
    /// Decodes a campaign from its Redis hash fields.
    pub fn from_fields(fields: &HashMap<String, String>) -> Result<Self, AppError> {
        let get = |name: &str| {
            fields
                .get(name)
                .cloned()
                .ok_or(AppError::MalformedRecord("campaign"))
        };

        Ok(Self {
            campaign_id: get("campaign_id")?
                .parse()
                .map_err(|_| AppError::MalformedRecord("campaign"))?,
            title: get("title")?,
            description: get("description")?,
            target_amount: get("target_amount")?,
            amount_raised: get("amount_raised")?
                .parse()
                .map_err(|_| AppError::MalformedRecord("campaign"))?,
            user_id: get("user_id")?,
            is_active: get("is_active")?
                .parse()
                .map_err(|_| AppError::MalformedRecord("campaign"))?,
            created_at: get("created_at")?,
            transaction_hash: fields.get("transaction_hash").cloned(),
        })
    }

    /// Encodes the campaign as Redis hash fields.
    pub fn to_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("campaign_id", self.campaign_id.to_string()),
            ("title", self.title.clone()),
            ("description", self.description.clone()),
            ("target_amount", self.target_amount.clone()),
            ("amount_raised", self.amount_raised.to_string()),
            ("user_id", self.user_id.clone()),
            ("is_active", self.is_active.to_string()),
            ("created_at", self.created_at.clone()),
        ];

        if let Some(hash) = &self.transaction_hash {
            fields.push(("transaction_hash", hash.clone()));
        }

        fields
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub author_id: String,
    pub author_name: String,
    pub text: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub author_id: String,
    pub author_name: String,
    pub text: String,
    pub created_at: String,
    #[serde(default)]
    pub replies: Vec<Reply>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contribution {
    pub campaign_id: u64,
    pub contributor_name: String,
    pub amount: f64,
    pub timestamp: String,
}

/// One live OTP per email; `expires_at` is epoch milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OtpRecord {
    pub otp: String,
    pub expires_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> HashMap<String, String> {
        [
            ("campaign_id", "7"),
            ("title", "Solar Well"),
            ("description", "A well powered by solar pumps"),
            ("target_amount", "2.5"),
            ("amount_raised", "0.75"),
            ("user_id", "user-1"),
            ("is_active", "true"),
            ("created_at", "2026-01-01T00:00:00+00:00"),
            ("transaction_hash", "0xabc"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_campaign_round_trip() {
        let campaign = Campaign::from_fields(&fields()).unwrap();

        assert_eq!(campaign.campaign_id, 7);
        assert_eq!(campaign.amount_raised, 0.75);
        assert!(campaign.is_active);
        assert_eq!(campaign.transaction_hash.as_deref(), Some("0xabc"));

        let encoded: HashMap<String, String> = campaign
            .to_fields()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        assert_eq!(Campaign::from_fields(&encoded).unwrap(), campaign);
    }

    #[test]
    fn test_campaign_missing_field() {
        let mut bad = fields();
        bad.remove("title");

        assert!(matches!(
            Campaign::from_fields(&bad),
            Err(AppError::MalformedRecord("campaign"))
        ));
    }

    #[test]
    fn test_campaign_unparseable_amount() {
        let mut bad = fields();
        bad.insert("amount_raised".to_string(), "lots".to_string());

        assert!(Campaign::from_fields(&bad).is_err());
    }

    #[test]
    fn test_campaign_without_hash() {
        let mut minimal = fields();
        minimal.remove("transaction_hash");

        let campaign = Campaign::from_fields(&minimal).unwrap();
        assert_eq!(campaign.transaction_hash, None);

        let json = serde_json::to_value(&campaign).unwrap();
        assert!(json.get("transactionHash").is_none());
        assert!(json.get("campaignId").is_some());
    }

    #[test]
    fn test_comment_wire_shape() {
        let json = r#"{
            "id": "3",
            "authorId": "user-2",
            "authorName": "Asha",
            "text": "When does this ship?",
            "createdAt": "2026-01-02T00:00:00+00:00"
        }"#;

        let comment: Comment = serde_json::from_str(json).unwrap();
        assert!(comment.replies.is_empty());
        assert_eq!(comment.author_name, "Asha");
    }
}
