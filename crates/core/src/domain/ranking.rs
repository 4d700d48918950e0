use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One sign's slot in a day's ranking. `sign` stays a display label here
/// because stored rows may predate the current label set; validation against
/// the closed enum happens at the generation boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankEntry {
    pub rank: i32,
    pub sign: String,
    pub content: String,
    pub lucky_item: String,
    pub lucky_color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyRanking {
    pub date: NaiveDate,
    pub entries: Vec<RankEntry>,
}
