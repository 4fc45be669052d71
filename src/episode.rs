//! Episode records and the key-item state threaded between them.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::warn;

static EPISODE_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Episode\s+(\d+)$").unwrap());

/// Episode number from an `Episode <N>` key, `None` for anything else.
pub fn parse_episode_number(key: &str) -> Option<u64> {
    let digits = EPISODE_KEY.captures(key)?.get(1)?.as_str();
    match digits.parse() {
        Ok(n) => Some(n),
        Err(e) => {
            warn!(key, error = %e, "episode number out of range");
            None
        }
    }
}

/// One episode pulled out of the input document.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub storyline: String,
    pub key: String,
    pub number: u64,
    pub records: Vec<String>,
}

impl Scene {
    /// Narrative lines joined the way they are shown to the model.
    pub fn text(&self) -> String {
        self.records.join("\n")
    }
}

/// Every `Episode <N>` record across all storylines, ordered by N.
///
/// The sort is stable, so equal numbers keep document order.
pub fn collect_scenes(doc: &Value) -> Vec<Scene> {
    let Some(storylines) = doc.as_object() else { return vec![] };

    let mut scenes = Vec::new();
    for (storyline, episodes) in storylines {
        let Some(episodes) = episodes.as_object() else { continue };
        for (key, episode) in episodes {
            let Some(number) = parse_episode_number(key) else { continue };
            let records: Vec<String> = episode
                .get("initialRecords")
                .and_then(Value::as_array)
                .map(|lines| {
                    lines.iter().filter_map(Value::as_str).map(str::to_string).collect()
                })
                .unwrap_or_default();
            scenes.push(Scene {
                storyline: storyline.clone(),
                key: key.clone(),
                number,
                records,
            });
        }
    }
    scenes.sort_by_key(|s| s.number);
    scenes
}

/// A plot-relevant object and where it stands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyItem {
    pub name: String,
    pub status: String,
    pub location: String,
    pub importance: String,
}

/// Key items in the order the model listed them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyItems {
    items: Vec<KeyItem>,
}

impl KeyItems {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace by name. A replaced item keeps its original position.
    pub fn insert(&mut self, item: KeyItem) {
        match self.items.iter_mut().find(|i| i.name == item.name) {
            Some(existing) => *existing = item,
            None => self.items.push(item),
        }
    }

    pub fn get(&self, name: &str) -> Option<&KeyItem> {
        self.items.iter().find(|i| i.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// One bullet line per item, as fed back into the next prompt.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for item in &self.items {
            out.push_str(&format!(
                "- {}: [Status: {}, Last Known Location/Owner: {}, Current Importance: {}]\n",
                item.name, item.status, item.location, item.importance
            ));
        }
        out
    }
}

impl FromIterator<KeyItem> for KeyItems {
    fn from_iter<I: IntoIterator<Item = KeyItem>>(iter: I) -> Self {
        let mut items = KeyItems::new();
        for item in iter {
            items.insert(item);
        }
        items
    }
}
