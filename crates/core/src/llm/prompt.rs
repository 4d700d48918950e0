use crate::domain::ranking::DailyRanking;
use crate::domain::zodiac::{ALL_SIGNS, SIGN_COUNT};
use crate::llm::GenerateInput;
use chrono::{Duration, NaiveDate};
use std::collections::{BTreeMap, BTreeSet};

/// System prompt for the daily generation call. Content is requested in
/// Korean (base locale); the instructions themselves stay provider-agnostic:
/// JSON only, exact entry count, ranks as a permutation.
pub fn build_system_prompt(input: &GenerateInput) -> String {
    let sign_list = ALL_SIGNS
        .iter()
        .map(|s| s.label_ko())
        .collect::<Vec<_>>()
        .join(", ");

    let mut out = format!(
        "You are a cheerful morning-TV astrologer writing in Korean.\n\
         Today is {date} ({weekday}).\n\
         Produce today's zodiac fortune ranking.\n\
         Return ONLY valid JSON. Do not wrap in markdown. Do not include any extra keys.\n\
         Output schema:\n\
         {{\n\
         \x20 \"ranking\": [\n\
         \x20   {{\n\
         \x20     \"rank\": 1,\n\
         \x20     \"sign\": \"양자리\",\n\
         \x20     \"content\": \"2~3문장의 방송 톤 운세\",\n\
         \x20     \"lucky_item\": \"연필\",\n\
         \x20     \"lucky_color\": \"라벤더\"\n\
         \x20   }}\n\
         \x20 ]\n\
         }}\n\
         Rules:\n\
         - ranking must have exactly {count} entries, one per sign: {signs}\n\
         - rank values must use 1..{count} with no duplicates\n\
         - content: 2-3 Korean sentences, a small concrete everyday situation, \
           ending with an actionable tip; vary tone and rhythm across signs\n\
         - lucky_item and lucky_color: short real-world nouns, one or two words, \
           nothing fantastical\n\
         - no text outside the JSON object\n",
        date = input.date,
        weekday = input.weekday_label,
        count = SIGN_COUNT,
        signs = sign_list,
    );

    if !input.history.is_empty() {
        out.push_str(&novelty_section(input.date, &input.history));
    }

    out
}

/// Re-prompt after an invalid response. The previous output is echoed back
/// for reference only.
pub fn build_repair_prompt(previous_output: &str) -> String {
    format!(
        "Your previous message was NOT a valid ranking.\n\n\
         TASK: Output ONLY a single JSON object matching the schema from the system prompt.\n\
         - Do NOT include any markdown, prose, or code fences.\n\
         - The JSON MUST have exactly {count} ranking entries with ranks 1..{count}, no duplicates.\n\
         - Each entry MUST include keys: rank, sign, content, lucky_item, lucky_color.\n\n\
         INVALID OUTPUT (for reference only; DO NOT copy verbatim):\n{previous_output}",
        count = SIGN_COUNT,
    )
}

fn novelty_section(date: NaiveDate, history: &[DailyRanking]) -> String {
    let mut out = String::from("Novelty constraints (based on recent days):\n");

    let yesterday_pairs = previous_day_pairs(date, history);
    if !yesterday_pairs.is_empty() {
        out.push_str("- do NOT repeat yesterday's (sign, rank) placements: ");
        out.push_str(
            &yesterday_pairs
                .iter()
                .map(|(sign, rank)| format!("{sign}={rank}"))
                .collect::<Vec<_>>()
                .join(", "),
        );
        out.push('\n');
    }

    let item_color = recent_item_color_pairs(history);
    if !item_color.is_empty() {
        out.push_str("- do NOT reuse these (lucky_item, lucky_color) pairs: ");
        out.push_str(
            &item_color
                .iter()
                .map(|(item, color)| format!("({item}, {color})"))
                .collect::<Vec<_>>()
                .join(", "),
        );
        out.push('\n');
    }

    let tags = overused_tags(date, history, 3);
    if !tags.is_empty() {
        out.push_str("- these themes appeared on several recent days, avoid them entirely: ");
        out.push_str(&tags.into_iter().collect::<Vec<_>>().join(", "));
        out.push('\n');
    }

    out
}

/// (sign, rank) placements from the day immediately before `date`, if that
/// day is present in the history window.
fn previous_day_pairs(date: NaiveDate, history: &[DailyRanking]) -> Vec<(String, i32)> {
    let yesterday = date - Duration::days(1);
    history
        .iter()
        .find(|r| r.date == yesterday)
        .map(|r| {
            r.entries
                .iter()
                .map(|e| (e.sign.clone(), e.rank))
                .collect()
        })
        .unwrap_or_default()
}

/// Distinct (lucky_item, lucky_color) pairs seen anywhere in the window.
fn recent_item_color_pairs(history: &[DailyRanking]) -> Vec<(String, String)> {
    let mut seen = BTreeSet::new();
    for ranking in history {
        for entry in &ranking.entries {
            let item = entry.lucky_item.trim();
            let color = entry.lucky_color.trim();
            if !item.is_empty() && !color.is_empty() {
                seen.insert((item.to_string(), color.to_string()));
            }
        }
    }
    seen.into_iter().collect()
}

/// Lucky-item themes used on two or more of the `window` days immediately
/// before `date`. The lucky item doubles as the day's thematic tag; nothing
/// richer is stored.
fn overused_tags(date: NaiveDate, history: &[DailyRanking], window: i64) -> BTreeSet<String> {
    let cutoff = date - Duration::days(window);
    let mut days_per_tag: BTreeMap<String, BTreeSet<NaiveDate>> = BTreeMap::new();
    for ranking in history {
        if ranking.date < cutoff || ranking.date >= date {
            continue;
        }
        for entry in &ranking.entries {
            let tag = entry.lucky_item.trim().to_lowercase();
            if !tag.is_empty() {
                days_per_tag.entry(tag).or_default().insert(ranking.date);
            }
        }
    }
    days_per_tag
        .into_iter()
        .filter(|(_, days)| days.len() >= 2)
        .map(|(tag, _)| tag)
        .collect()
}
