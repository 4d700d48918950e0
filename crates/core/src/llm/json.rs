use crate::domain::contract::LlmRanking;
use crate::domain::ranking::RankEntry;
use anyhow::Context;

pub fn extract_json(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.starts_with("```") {
        // Remove Markdown fences (```json ... ``` or ``` ... ```).
        let mut inner = trimmed;
        if let Some(after_first) = inner.splitn(2, '\n').nth(1) {
            inner = after_first;
        }
        if let Some(end) = inner.rfind("```") {
            inner = &inner[..end];
        }
        return Some(inner.trim().to_string());
    }

    // Best-effort extraction: first '{' to last '}'.
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(trimmed[start..=end].trim().to_string())
}

pub fn parse_ranking(text: &str) -> anyhow::Result<Vec<RankEntry>> {
    let json_str = extract_json(text).unwrap_or_else(|| text.trim().to_string());
    let parsed = serde_json::from_str::<LlmRanking>(&json_str)
        .with_context(|| format!("model output is not valid JSON for the ranking schema: {json_str}"))?;
    parsed.validate_and_into_entries()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::zodiac::ALL_SIGNS;
    use serde_json::json;

    fn valid_ranking_json() -> String {
        let ranking: Vec<_> = ALL_SIGNS
            .iter()
            .enumerate()
            .map(|(i, sign)| {
                json!({
                    "rank": i + 1,
                    "sign": sign.label_ko(),
                    "content": "오늘은 작은 행운이 있어요. 지갑을 한 번 더 챙겨보세요.",
                    "lucky_item": "연필",
                    "lucky_color": "라벤더",
                })
            })
            .collect();
        json!({ "ranking": ranking }).to_string()
    }

    #[test]
    fn extract_json_handles_fenced_blocks() {
        let body = "{\"a\":1}";
        let fenced = format!("```json\n{body}\n```\n");
        assert_eq!(extract_json(&fenced), Some(body.to_string()));
    }

    #[test]
    fn extract_json_falls_back_to_braces() {
        let s = "prefix {\"a\":1} suffix";
        assert_eq!(extract_json(s), Some("{\"a\":1}".to_string()));
    }

    #[test]
    fn parse_ranking_accepts_valid_json() {
        let entries = parse_ranking(&valid_ranking_json()).unwrap();
        assert_eq!(entries.len(), 12);
        assert_eq!(entries[0].rank, 1);
    }

    #[test]
    fn parse_ranking_accepts_prose_wrapped_json() {
        let wrapped = format!("물론이죠! 오늘의 운세입니다.\n{}", valid_ranking_json());
        let entries = parse_ranking(&wrapped).unwrap();
        assert_eq!(entries.len(), 12);
    }

    #[test]
    fn parse_ranking_rejects_wrong_entry_count() {
        let json = json!({ "ranking": [] }).to_string();
        assert!(parse_ranking(&json).is_err());
    }

    #[test]
    fn parse_ranking_rejects_non_json() {
        assert!(parse_ranking("오늘은 운세를 알 수 없어요").is_err());
    }
}
