//! Pulls structured values out of free-text model responses.
//!
//! These rules match literal headers and prefixes that the prompts ask the
//! model to emit. They are exact on purpose: a response that drifts from the
//! requested format falls through to the fallback paths below.

use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

use crate::episode::{KeyItem, KeyItems};

pub const UPDATE_MARKER: &str = "**Updated Key Items and Their Statuses:**";
pub const SUMMARY_HEADER: &str = "**Updated Summary:**";

const NAME_PREFIX: &str = "Item Name:";
const STATUS_PREFIX: &str = "- Current Status:";
const LOCATION_PREFIX: &str = "- Last Known Location/Owner:";
const IMPORTANCE_PREFIX: &str = "- Current Importance:";

static SCORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Score\s*[:：]\s*(\d+)").unwrap());

/// First `Score: N` in the text (either colon width, any case).
pub fn extract_score(text: &str) -> Option<u64> {
    let digits = SCORE.captures(text)?.get(1)?.as_str();
    match digits.parse() {
        Ok(score) => Some(score),
        Err(e) => {
            warn!(digits, error = %e, "score out of range");
            None
        }
    }
}

/// Split an update response into the new summary and key items.
///
/// Without the marker the whole response becomes the summary and the
/// previous items carry over untouched.
pub fn split_update_response(content: &str, previous: &KeyItems) -> (String, KeyItems) {
    match content.split_once(UPDATE_MARKER) {
        Some((summary_part, items_part)) => {
            let summary = summary_part.replace(SUMMARY_HEADER, "").trim().to_string();
            (summary, parse_key_items(items_part.trim()))
        }
        None => (content.to_string(), previous.clone()),
    }
}

/// Parse blank-line separated four-line item blocks.
///
/// Blocks shorter than four lines are skipped; lines past the fourth are ignored.
pub fn parse_key_items(text: &str) -> KeyItems {
    let mut items = KeyItems::new();
    for block in text.split("\n\n") {
        let lines: Vec<&str> = block.trim().split('\n').collect();
        if lines.len() < 4 {
            continue;
        }
        items.insert(KeyItem {
            name: strip_field(lines[0], NAME_PREFIX),
            status: strip_field(lines[1], STATUS_PREFIX),
            location: strip_field(lines[2], LOCATION_PREFIX),
            importance: strip_field(lines[3], IMPORTANCE_PREFIX),
        });
    }
    items
}

fn strip_field(line: &str, prefix: &str) -> String {
    line.replace(prefix, "").trim().to_string()
}
