//! Campaign-proposal moderation.
//!
//! New proposals are screened by a generative model with a fixed,
//! deliberately lenient prompt. The verdict is the leading token of the
//! response: "YES" (any case, surrounding whitespace ignored) passes,
//! anything else fails. The raw explanation is returned either way.

use reqwest::Client;
use serde_json::{Value, json};
use tracing::error;

use crate::error::AppError;

pub const GEMINI_MODEL: &str = "gemini-2.0-flash";

pub struct Verdict {
    pub is_valid: bool,
    pub explanation: String,
}

pub fn build_prompt(title: &str, description: &str, target_amount: &str) -> String {
    format!(
        r#"Evaluate the following crowdfunding campaign proposal to be listed on Project Nidhi, a blockchain-based crowdfunding platform. Consider the title and description based on these extremely lenient criteria:

    Relevance: Does the title and description vaguely hint at a possible purpose? Assume the creator is extremely limited in communication skills.
    Clarity: Does the description, however minimal, not entirely contradict the possibility of a problem, solution, and execution? Assume further details are forthcoming.
    Feasibility: Is the project not obviously impossible given current technology and the funding amount? Assume the creator has a secret plan.
    Potential Impact: Is it not inconceivable that the project could have some positive impact, however broadly defined?

    Respond with "YES" if, by the most generous interpretation possible, the proposal might be viable. Respond with "NO" only if the proposal is demonstrably nonsensical or impossible. Assume maximum good faith.

    Campaign Details:
    Title: {title}
    Description: {description}
    Expected Funding: {target_amount} Ether
    Explain your answer too."#
    )
}

pub fn parse_verdict(response_text: &str) -> bool {
    response_text.trim().to_uppercase().starts_with("YES")
}

/// One round trip to the model; any transport or response-shape failure is a
/// hard error with no retry.
pub async fn evaluate(
    client: &Client,
    api_key: &str,
    title: &str,
    description: &str,
    target_amount: &str,
) -> Result<Verdict, AppError> {
    let url = format!(
        "https://generativelanguage.googleapis.com/v1beta/models/{GEMINI_MODEL}:generateContent"
    );

    let body = json!({
        "contents": [{
            "parts": [{ "text": build_prompt(title, description, target_amount) }]
        }]
    });

    let response = client
        .post(&url)
        .header("content-type", "application/json")
        .header("x-goog-api-key", api_key)
        .json(&body)
        .send()
        .await
        .map_err(|e| {
            error!("Gemini request failed: {e}");
            AppError::ModerationFailed
        })?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        error!("Gemini API validation failed: {status} {text}");
        return Err(AppError::ModerationFailed);
    }

    let body: Value = response.json().await.map_err(|e| {
        error!("Gemini response decode failed: {e}");
        AppError::ModerationFailed
    })?;

    let explanation = body["candidates"]
        .as_array()
        .and_then(|candidates| candidates.first())
        .and_then(|candidate| candidate["content"]["parts"].as_array())
        .and_then(|parts| parts.first())
        .and_then(|part| part["text"].as_str())
        .ok_or_else(|| {
            error!("Gemini response missing content");
            AppError::ModerationFailed
        })?
        .to_string();

    Ok(Verdict {
        is_valid: parse_verdict(&explanation),
        explanation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_leading_yes() {
        assert!(parse_verdict("YES"));
        assert!(parse_verdict("yes, this could work"));
        assert!(parse_verdict("  \n Yes. The proposal is vague but viable."));
    }

    #[test]
    fn test_verdict_anything_else() {
        assert!(!parse_verdict("NO"));
        assert!(!parse_verdict("No, but YES in spirit"));
        assert!(!parse_verdict("maybe YES"));
        assert!(!parse_verdict(""));
    }

    #[test]
    fn test_prompt_carries_proposal() {
        let prompt = build_prompt("Solar Well", "Pump water with sunlight", "2.5");

        assert!(prompt.contains("Title: Solar Well"));
        assert!(prompt.contains("Description: Pump water with sunlight"));
        assert!(prompt.contains("Expected Funding: 2.5 Ether"));
        assert!(prompt.contains("maximum good faith"));
    }
}
