use anyhow::bail;

/// The closed set of 12 signs. The generator emits Korean labels; the
/// English names are looked up here for the secondary locale (never sent
/// through the translation service) and for asset file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Zodiac {
    Aries,
    Taurus,
    Gemini,
    Cancer,
    Leo,
    Virgo,
    Libra,
    Scorpio,
    Sagittarius,
    Capricorn,
    Aquarius,
    Pisces,
}

pub const SIGN_COUNT: usize = 12;

pub const ALL_SIGNS: [Zodiac; SIGN_COUNT] = [
    Zodiac::Aries,
    Zodiac::Taurus,
    Zodiac::Gemini,
    Zodiac::Cancer,
    Zodiac::Leo,
    Zodiac::Virgo,
    Zodiac::Libra,
    Zodiac::Scorpio,
    Zodiac::Sagittarius,
    Zodiac::Capricorn,
    Zodiac::Aquarius,
    Zodiac::Pisces,
];

impl Zodiac {
    pub fn label_ko(&self) -> &'static str {
        match self {
            Zodiac::Aries => "양자리",
            Zodiac::Taurus => "황소자리",
            Zodiac::Gemini => "쌍둥이자리",
            Zodiac::Cancer => "게자리",
            Zodiac::Leo => "사자자리",
            Zodiac::Virgo => "처녀자리",
            Zodiac::Libra => "천칭자리",
            Zodiac::Scorpio => "전갈자리",
            Zodiac::Sagittarius => "사수자리",
            Zodiac::Capricorn => "염소자리",
            Zodiac::Aquarius => "물병자리",
            Zodiac::Pisces => "물고기자리",
        }
    }

    pub fn label_en(&self) -> &'static str {
        match self {
            Zodiac::Aries => "Aries",
            Zodiac::Taurus => "Taurus",
            Zodiac::Gemini => "Gemini",
            Zodiac::Cancer => "Cancer",
            Zodiac::Leo => "Leo",
            Zodiac::Virgo => "Virgo",
            Zodiac::Libra => "Libra",
            Zodiac::Scorpio => "Scorpio",
            Zodiac::Sagittarius => "Sagittarius",
            Zodiac::Capricorn => "Capricorn",
            Zodiac::Aquarius => "Aquarius",
            Zodiac::Pisces => "Pisces",
        }
    }

    pub fn from_label_ko(label: &str) -> anyhow::Result<Self> {
        let label = label.trim();
        for sign in ALL_SIGNS {
            if sign.label_ko() == label {
                return Ok(sign);
            }
        }
        bail!("unknown sign label: {label}")
    }

    pub fn from_label_en(label: &str) -> anyhow::Result<Self> {
        let label = label.trim();
        for sign in ALL_SIGNS {
            if sign.label_en().eq_ignore_ascii_case(label) {
                return Ok(sign);
            }
        }
        bail!("unknown sign label: {label}")
    }
}
