use crate::domain::ranking::RankEntry;
use serde::Deserialize;
use serde_json::Value;

/// Stored `data` payloads exist in two historical shapes: the canonical
/// `{"ranking": [...]}` object and a bare array. Both deserialize here and
/// nothing downstream sees the difference.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RankingDocument {
    Wrapped { ranking: Vec<Value> },
    Bare(Vec<Value>),
}

impl RankingDocument {
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }

    fn into_raw_entries(self) -> Vec<Value> {
        match self {
            RankingDocument::Wrapped { ranking } => ranking,
            RankingDocument::Bare(entries) => entries,
        }
    }

    /// One canonical shape out: entries with a non-numeric (or missing) rank
    /// are dropped, the rest come back sorted ascending by rank. The result
    /// is not guaranteed to be a contiguous 1..N run.
    pub fn normalize(self) -> Vec<RankEntry> {
        let mut entries: Vec<RankEntry> = self
            .into_raw_entries()
            .into_iter()
            .filter_map(|v| raw_entry(&v))
            .collect();
        entries.sort_by_key(|e| e.rank);
        entries
    }
}

fn raw_entry(value: &Value) -> Option<RankEntry> {
    let rank = value.get("rank")?.as_i64()?;
    let rank = i32::try_from(rank).ok()?;
    Some(RankEntry {
        rank,
        sign: field(value, "sign"),
        content: field(value, "content"),
        lucky_item: field(value, "lucky_item"),
        lucky_color: field(value, "lucky_color"),
    })
}

fn field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Canonical stored shape for new writes. Readers still accept the bare
/// array left behind by older writers.
pub fn wrapped(entries: &[RankEntry]) -> Value {
    serde_json::json!({ "ranking": entries })
}
