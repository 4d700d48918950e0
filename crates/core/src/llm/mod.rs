pub mod error;
pub mod json;
pub mod openai;
pub mod prompt;

use crate::domain::ranking::{DailyRanking, RankEntry};
use chrono::NaiveDate;

#[derive(Debug, Clone)]
pub struct GenerateInput {
    pub date: NaiveDate,
    pub weekday_label: &'static str,
    /// Trailing-window rankings used for the novelty constraints. Empty when
    /// no history exists yet; the run proceeds without the constraints.
    pub history: Vec<DailyRanking>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
        }
    }
}

#[async_trait::async_trait]
pub trait HoroscopeModel: Send + Sync {
    fn provider(&self) -> Provider;

    /// Generate the full 12-entry ranking for one day. The returned entries
    /// already passed contract validation and are sorted by rank.
    async fn generate_ranking(&self, input: &GenerateInput) -> anyhow::Result<Vec<RankEntry>>;
}
