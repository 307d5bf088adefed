//! Message cleanup, sentiment and health-term normalisation.

use std::collections::BTreeSet;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref STRAY_CHARS: Regex =
        Regex::new(r"[^\w\s.!?,:;()\-]+").expect("Stray char pattern should be valid");
    static ref SPACES: Regex = Regex::new(r"\s+").expect("Whitespace pattern should be valid");
    static ref REPEATED_PUNCT: Regex =
        Regex::new(r"([.!?,])[.!?,]+").expect("Punctuation pattern should be valid");
    static ref PUNCT_SPACING: Regex =
        Regex::new(r"\s*([.!?,:;])\s*").expect("Punctuation spacing pattern should be valid");
}

/// Misspellings seen in real user messages.
const TYPOS: &[(&str, &str)] = &[
    ("посоветую", "посоветуй"),
    ("подскажу", "подскажи"),
    ("солбери", "солберри"),
    ("солберий", "солберри"),
    ("салберри", "солберри"),
    ("биторон", "битерон"),
    ("бетерон", "битерон"),
    ("грип", "грипп"),
    ("чтонибудь", "что-нибудь"),
    ("чтонибуть", "что-нибудь"),
    ("что-нибуть", "что-нибудь"),
    ("чтото", "что-то"),
    ("зарегестрироваться", "зарегистрироваться"),
    ("зарегистрация", "регистрация"),
    ("регестрация", "регистрация"),
];

/// Lowercase, drop decorative symbols, normalise spacing and fix common typos.
pub fn clean_text(text: &str) -> String {
    let lower = text.trim().to_lowercase();
    let stripped = STRAY_CHARS.replace_all(&lower, "");
    let collapsed = SPACES.replace_all(&stripped, " ");
    let deduped = REPEATED_PUNCT.replace_all(&collapsed, "$1");
    let spaced = PUNCT_SPACING.replace_all(&deduped, "$1 ");

    spaced
        .split_whitespace()
        .map(fix_typo)
        .collect::<Vec<_>>()
        .join(" ")
}

fn fix_typo(word: &str) -> String {
    let core = word.trim_matches(|c: char| ".,!?:;()-".contains(c));
    match TYPOS.iter().find(|(typo, _)| *typo == core) {
        Some((_, fixed)) if !core.is_empty() => word.replacen(core, fixed, 1),
        _ => word.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Neutral => "neutral",
        }
    }
}

const POSITIVE_WORDS: &[&str] = &[
    "помогает", "хорошо", "отлично", "эффективно", "результат", "улучшение",
    "рекомендую", "довольна", "доволен", "спасибо", "благодарна", "классно",
    "супер", "замечательно", "прекрасно", "работает", "действует",
];

const NEGATIVE_WORDS: &[&str] = &[
    "не помогает", "плохо", "ужасно", "неэффективно", "бесполезно", "зря",
    "разочарован", "разочарована", "не советую", "не рекомендую", "обман",
    "развод", "некачественно", "не действует", "не работает", "пустышка",
];

pub fn analyze_sentiment(text: &str) -> Sentiment {
    let lower = text.to_lowercase();
    let positive = POSITIVE_WORDS.iter().filter(|w| lower.contains(*w)).count();
    let negative = NEGATIVE_WORDS.iter().filter(|w| lower.contains(*w)).count();

    match negative.cmp(&positive) {
        std::cmp::Ordering::Greater => Sentiment::Negative,
        std::cmp::Ordering::Less => Sentiment::Positive,
        std::cmp::Ordering::Equal => Sentiment::Neutral,
    }
}

// ── Health term synonyms ───────────────────────────────────────────

const HEALTH_SYNONYMS: &[(&str, &[&str])] = &[
    ("простуда", &[
        "орви", "грипп", "насморк", "кашель", "температура", "простудился",
        "заболел", "ангина", "фарингит", "ларингит", "бронхит", "трахеит",
    ]),
    ("усталость", &[
        "вялость", "апатия", "истощение", "слабость", "утомляемость",
        "недомогание", "переутомление", "астения",
    ]),
    ("иммунитет", &["сопротивляемость", "резистентность"]),
    ("пищеварение", &["жкт", "желудок", "кишечник", "переваривание", "метаболизм"]),
    ("энергия", &["бодрость", "тонус", "активность", "работоспособность", "выносливость"]),
    ("стресс", &["нервозность", "тревожность", "волнение", "перенапряжение"]),
    ("печень", &["печеночный", "печёночный", "гепатопротектор", "гепато", "гепатит"]),
];

fn bare_word(word: &str) -> String {
    word.chars()
        .filter(|c| c.is_alphanumeric() || *c == '-')
        .collect::<String>()
        .to_lowercase()
}

fn main_term(word: &str) -> Option<&'static str> {
    HEALTH_SYNONYMS
        .iter()
        .find(|(main, synonyms)| *main == word || synonyms.contains(&word))
        .map(|(main, _)| *main)
}

/// Replace known health synonyms with their main term.
pub fn normalize_text(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .map(|w| match main_term(&bare_word(w)) {
            Some(main) => main.to_string(),
            None => w.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Words of the query plus the whole synonym family of each health term.
pub fn expand_health_terms(text: &str) -> String {
    let mut terms = BTreeSet::new();
    for word in text.to_lowercase().split_whitespace() {
        terms.insert(word.to_string());
        if let Some(main) = main_term(&bare_word(word)) {
            terms.insert(main.to_string());
            if let Some((_, synonyms)) = HEALTH_SYNONYMS.iter().find(|(m, _)| *m == main) {
                terms.extend(synonyms.iter().map(|s| s.to_string()));
            }
        }
    }
    terms.into_iter().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_normalises_noise() {
        assert_eq!(clean_text("  Что  от ПРОСТУДЫ??? 🤒 "), "что от простуды?");
        assert_eq!(clean_text("Посоветую что-нибуть,от грип"), "посоветуй что-нибудь, от грипп");
    }

    #[test]
    fn sentiment_counts_phrases() {
        assert_eq!(analyze_sentiment("Не помогает, зря купила"), Sentiment::Negative);
        assert_eq!(analyze_sentiment("Спасибо, отлично"), Sentiment::Positive);
        assert_eq!(analyze_sentiment("Сколько стоит?"), Sentiment::Neutral);
    }

    #[test]
    fn health_terms() {
        assert_eq!(normalize_text("Сильный кашель"), "сильный простуда");
        let expanded = expand_health_terms("гепатит");
        assert!(expanded.contains("печень"));
        assert!(expanded.contains("гепатопротектор"));
    }
}
