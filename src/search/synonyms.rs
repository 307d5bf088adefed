//! Synonym groups used to widen keyword queries before matching.

use std::collections::HashSet;

const OMEGA: &[&str] = &[
    "омега-3", "омега 3", "омега3", "omega", "omega-3", "omega 3", "omega3",
    "рыбий жир", "рыбьего жира", "рыбьим жиром", "рыбьему жиру",
    "пнжк", "полиненасыщенные жирные кислоты", "жирные кислоты",
    "эпк", "дгк", "epa", "dha",
];

const MAGNESIUM: &[&str] = &[
    "магний", "магния", "магнием", "магнию", "magnesium", "mg",
    "продукты с магнием", "содержащие магний", "с содержанием магния",
];

const VITAMIN_C: &[&str] = &[
    "витамин c", "витамин с", "vitamin c", "аскорбинка",
    "аскорбиновая кислота", "аскорбиновой кислоты",
];

const COLLAGEN: &[&str] = &[
    "коллаген", "коллагена", "коллагеном", "collagen",
    "для кожи", "для волос", "для ногтей", "для суставов",
    "гидролизованный коллаген", "морской коллаген",
];

const PROBIOTICS: &[&str] = &[
    "пробиотик", "пробиотики", "пробиотиков", "пробиотикам",
    "для кишечника", "для микрофлоры", "бактерии", "лактобактерии",
    "бифидобактерии", "для пищеварения",
];

const IMMUNITY: &[&str] = &[
    "иммунитет", "иммунитета", "иммунной системы",
    "противовирусное", "от вирусов", "защита", "для защиты",
    "укрепление иммунитета", "повышение иммунитета",
];

/// Groups in match priority order.
pub const SYNONYM_GROUPS: &[(&str, &[&str])] = &[
    ("omega", OMEGA),
    ("magnesium", MAGNESIUM),
    ("vitamin_c", VITAMIN_C),
    ("collagen", COLLAGEN),
    ("probiotics", PROBIOTICS),
    ("immunity", IMMUNITY),
];

/// Append every synonym of each group the query touches.
/// The query's own wording stays first so exact terms still score.
pub fn expand_query_with_synonyms(query: &str) -> String {
    let lower = query.to_lowercase();
    let mut seen = HashSet::new();
    let mut extra = Vec::new();

    for (_, synonyms) in SYNONYM_GROUPS {
        if synonyms.iter().any(|s| lower.contains(s)) {
            for s in synonyms.iter() {
                if seen.insert(*s) {
                    extra.push(*s);
                }
            }
        }
    }

    if extra.is_empty() {
        query.to_string()
    } else {
        format!("{} {}", query, extra.join(" "))
    }
}

pub fn detect_category(query: &str) -> Option<&'static str> {
    let lower = query.to_lowercase();
    SYNONYM_GROUPS
        .iter()
        .find(|(_, synonyms)| synonyms.iter().any(|s| lower.contains(s)))
        .map(|(name, _)| *name)
}

pub fn category_synonyms(category: &str) -> &'static [&'static str] {
    SYNONYM_GROUPS
        .iter()
        .find(|(name, _)| *name == category)
        .map(|(_, s)| *s)
        .unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_fish_oil_to_omega_terms() {
        let expanded = expand_query_with_synonyms("Нужен рыбий жир");
        assert!(expanded.starts_with("Нужен рыбий жир "));
        assert!(expanded.contains("омега-3"));
        assert!(expanded.contains("dha"));
        assert_eq!(expanded.matches("рыбьего жира").count(), 1);
    }

    #[test]
    fn unrelated_query_is_untouched() {
        assert_eq!(expand_query_with_synonyms("Как доехать"), "Как доехать");
    }

    #[test]
    fn detects_first_matching_group() {
        assert_eq!(detect_category("коллаген для суставов"), Some("collagen"));
        assert_eq!(detect_category("MAGNESIUM"), Some("magnesium"));
        assert_eq!(detect_category("погода"), None);
        assert!(category_synonyms("vitamin_c").contains(&"аскорбинка"));
        assert!(category_synonyms("nope").is_empty());
    }
}
