pub mod contract;
pub mod document;
pub mod ranking;
pub mod zodiac;

/// Backing locale for a day's ranking. `Ko` is the base locale written by the
/// generator; `En` is derived from it by the translation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Locale {
    Ko,
    En,
}

impl Locale {
    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::Ko => "ko",
            Locale::En => "en",
        }
    }

    pub fn from_lang_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "ko" | "ko-kr" => Some(Locale::Ko),
            "en" | "en-us" => Some(Locale::En),
            _ => None,
        }
    }
}
