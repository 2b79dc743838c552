//! Parsing reflection output into an identity snapshot.
//!
//! Providers are asked for `{"summary", "traits", "relationships"}` JSON but
//! often wrap it in a markdown fence or answer in prose. Fenced JSON is
//! unwrapped; anything that still is not the expected object becomes a plain
//! summary.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use kore_core::types::{IdentitySnapshot, truncate_chars};
use serde::Deserialize;
use tracing::debug;

/// Characters of raw output kept when it is not usable JSON.
pub const RAW_SUMMARY_LIMIT: usize = 500;

#[derive(Debug, Deserialize)]
struct ReflectionPayload {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    traits: BTreeMap<String, f32>,
    #[serde(default)]
    relationships: BTreeMap<String, String>,
}

/// Body of the first fenced block, minus a `json` language tag. Unfenced
/// input is returned as is.
fn unfence(raw: &str) -> &str {
    let Some(start) = raw.find("```") else {
        return raw;
    };
    let rest = &raw[start + 3..];
    let body = rest.find("```").map_or(rest, |end| &rest[..end]);
    body.strip_prefix("json").unwrap_or(body)
}

/// Parse provider output into a snapshot for `user`.
#[must_use]
pub fn parse_identity(raw: &str, user: Option<&str>, derived_at: DateTime<Utc>) -> IdentitySnapshot {
    let user = user.map(str::to_string);
    match serde_json::from_str::<ReflectionPayload>(unfence(raw).trim()) {
        Ok(payload) => IdentitySnapshot {
            summary: payload.summary,
            traits: payload
                .traits
                .into_iter()
                .map(|(name, score)| (name, score.clamp(0.0, 1.0)))
                .collect(),
            relationships: payload.relationships,
            user,
            derived_at,
        },
        Err(e) => {
            debug!(error = %e, "reflection output is not identity JSON, keeping raw text");
            IdentitySnapshot {
                summary: truncate_chars(raw.trim(), RAW_SUMMARY_LIMIT),
                traits: BTreeMap::new(),
                relationships: BTreeMap::new(),
                user,
                derived_at,
            }
        }
    }
}
