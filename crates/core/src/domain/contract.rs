use crate::domain::ranking::RankEntry;
use crate::domain::zodiac::{Zodiac, SIGN_COUNT};
use anyhow::{bail, ensure};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Exact shape the model is asked to emit. Validation is strict: a run that
/// fails any of these checks stores nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRanking {
    pub ranking: Vec<LlmRankEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRankEntry {
    pub rank: i32,
    pub sign: String,
    pub content: String,
    pub lucky_item: String,
    pub lucky_color: String,
}

impl LlmRanking {
    pub fn validate_and_into_entries(self) -> anyhow::Result<Vec<RankEntry>> {
        ensure!(
            self.ranking.len() == SIGN_COUNT,
            "model output must contain exactly {SIGN_COUNT} entries (got {})",
            self.ranking.len()
        );

        let mut seen_ranks = BTreeSet::<i32>::new();
        let mut seen_signs = BTreeSet::<Zodiac>::new();
        let mut entries = Vec::with_capacity(self.ranking.len());
        for entry in self.ranking {
            entries.push(entry.validate_and_into_entry(&mut seen_ranks, &mut seen_signs)?);
        }

        // Ranks must form a permutation of 1..=12.
        for rank in 1..=SIGN_COUNT as i32 {
            if !seen_ranks.contains(&rank) {
                bail!("missing rank {rank} in model output");
            }
        }

        entries.sort_by_key(|e| e.rank);
        Ok(entries)
    }
}

impl LlmRankEntry {
    fn validate_and_into_entry(
        self,
        seen_ranks: &mut BTreeSet<i32>,
        seen_signs: &mut BTreeSet<Zodiac>,
    ) -> anyhow::Result<RankEntry> {
        ensure!(
            (1..=SIGN_COUNT as i32).contains(&self.rank),
            "rank out of range: {}",
            self.rank
        );
        ensure!(
            seen_ranks.insert(self.rank),
            "duplicate rank: {}",
            self.rank
        );

        let sign = Zodiac::from_label_ko(&self.sign)?;
        ensure!(
            seen_signs.insert(sign),
            "duplicate sign: {}",
            sign.label_ko()
        );

        let content = self.content.trim().to_string();
        ensure!(!content.is_empty(), "content must be non-empty");

        let lucky_item = self.lucky_item.trim().to_string();
        ensure!(!lucky_item.is_empty(), "lucky_item must be non-empty");

        let lucky_color = self.lucky_color.trim().to_string();
        ensure!(!lucky_color.is_empty(), "lucky_color must be non-empty");

        Ok(RankEntry {
            rank: self.rank,
            sign: sign.label_ko().to_string(),
            content,
            lucky_item,
            lucky_color,
        })
    }
}
