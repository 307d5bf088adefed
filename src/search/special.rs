//! Canned replies and extra LLM instructions for recognisable request types.

const IMMUNITY_KEYWORDS: &[&str] = &[
    "иммунитет", "имунитет", "иммунной", "защита от вирусов",
    "противовирусное", "для иммунитета", "укрепление иммунитета",
    "повышение иммунитета", "поддержка иммунитета",
];

const GREETINGS: &[&str] = &[
    "привет", "здравствуйте", "добрый день", "добрый вечер",
    "доброе утро", "здравствуй", "hi", "hello",
];

const HOW_ARE_YOU: &[&str] = &["как дела?", "как дела", "как ты?", "как ты", "how are you"];

const ALL_OPTIONS_KEYWORDS: &[&str] = &[
    "какой еще", "еще есть", "помимо этого", "что еще",
    "все варианты", "все продукты", "что еще есть",
    "какие еще", "другие варианты", "еще варианты",
    "полный обзор", "весь ассортимент", "все что есть",
];

pub const GREETING_REPLY: &str = "Привет! Я помогу с подбором продуктов Авроры. \
     Спроси, например: 'От простуды', 'Для печени', \
     'Состав Солберри-H', 'Как принимать Битерон-H'.";

pub const HOW_ARE_YOU_REPLY: &str =
    "Спасибо, все отлично и я готова помочь! Опиши проблему или спроси про продукт.";

const ALL_OPTIONS_INSTRUCTION: &str = "\n\nВНИМАНИЕ: Пользователь просит ВСЕ варианты продуктов. \
     РЕКОМЕНДУЙ ВСЕ НАЙДЕННЫЕ ПРОДУКТЫ!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialCategory {
    Antiviral,
    Collagen,
    Magnesium,
    Sorbent,
    Probiotics,
    Antiparasitic,
    Liver,
    Calcium,
    ColdBronchitis,
}

impl SpecialCategory {
    /// Checked in order; the first hit wins.
    const RULES: &'static [(SpecialCategory, &'static [&'static str])] = &[
        (SpecialCategory::Antiviral, &["противовирусное", "от вирусов", "против вирусов"]),
        (SpecialCategory::Collagen, &["коллаген", "для кожи", "для волос"]),
        (SpecialCategory::Magnesium, &["магний"]),
        (SpecialCategory::Sorbent, &["сорбент", "очищение", "детокс"]),
        (SpecialCategory::Probiotics, &["пробиотик", "для кишечника", "микрофлора"]),
        (SpecialCategory::Antiparasitic, &["паразит", "глист", "антипаразит"]),
        (SpecialCategory::Liver, &["печень", "печени", "гепато"]),
        (SpecialCategory::Calcium, &["кальций", "кости", "костей"]),
        (SpecialCategory::ColdBronchitis, &["простуда", "бронхит", "кашель"]),
    ];

    pub fn detect(query: &str) -> Option<Self> {
        let lower = query.to_lowercase();
        Self::RULES
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
            .map(|(category, _)| *category)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Antiviral => "antiviral",
            Self::Collagen => "collagen",
            Self::Magnesium => "magnesium",
            Self::Sorbent => "sorbent",
            Self::Probiotics => "probiotics",
            Self::Antiparasitic => "antiparasitic",
            Self::Liver => "liver",
            Self::Calcium => "calcium",
            Self::ColdBronchitis => "cold_bronchitis",
        }
    }

    pub fn instructions(&self) -> Option<&'static str> {
        let text = match self {
            Self::Antiviral => {
                "\n\nВНИМАНИЕ: Противовирусный запрос! \
                 ОБЯЗАТЕЛЬНО рекомендуй ВСЕ ТРИ продукта: \
                 1) Аргент-Макс, 2) БАРС-2, 3) Ин-Аурин. НЕ рекомендуй Гелластин!"
            }
            Self::Collagen => {
                "\n\nВНИМАНИЕ: Запрос о коллагене! \
                 ОБЯЗАТЕЛЬНО рекомендуй ВСЕ продукты с коллагеном: \
                 Коллаген Пюр, Коллаген Табс Апельсин, Коллаген Табс Вишня, Гелластин."
            }
            Self::Magnesium => {
                "\n\nВНИМАНИЕ: Запрос о магнии! \
                 ОБЯЗАТЕЛЬНО рекомендуй ВСЕ продукты: \
                 Магний Плюс (Mg Plus), Магний Табс (Mg Tabs), Магний-Вечер (Mg-Evening). \
                 ИГНОРИРУЙ продукты БЕЗ слова 'магний' в названии!"
            }
            Self::Sorbent => {
                "\n\nВНИМАНИЕ: Запрос о сорбентах! \
                 Рекомендуй ТОЛЬКО сорбенты: Сиалон-Микс манго, ПроФайбекс. \
                 НЕ рекомендуй Коралл-Аккорд!"
            }
            Self::Antiparasitic => {
                "\n\nВНИМАНИЕ: Запрос об антипаразитарных! \
                 Рекомендуй ВСЕ продукты: Еломил, Гепосин, Лист Черного Ореха Экстра Капс, \
                 Лист Черного Ореха Экстра Табс, Осина Экстра, Кошачий Коготь, Сиалон-Микс манго."
            }
            Self::Liver => {
                "\n\nВНИМАНИЕ: Запрос о печени! \
                 В первую очередь рекомендуй Силицитин - гепатопротектор."
            }
            Self::Calcium => {
                "\n\nВНИМАНИЕ: Запрос о кальции! \
                 Рекомендуй: Румарин Кальций, Кальций Банан, Кальций-Утро."
            }
            Self::ColdBronchitis => {
                "\n\nВНИМАНИЕ: Запрос о простуде/бронхите! \
                 Рекомендуй КОМПЛЕКС: Аргент Макс + Солберри + Битерон, \
                 плюс для иммунитета (Витамин С, Ин-Аурин, БАРС-2)."
            }
            // Probiotics are detected but carry no extra rule.
            Self::Probiotics => return None,
        };
        Some(text)
    }
}

pub fn is_immunity_query(query: &str) -> bool {
    let lower = query.to_lowercase();
    IMMUNITY_KEYWORDS.iter().any(|k| lower.contains(k))
}

pub fn is_all_options_request(query: &str) -> bool {
    let lower = query.to_lowercase();
    ALL_OPTIONS_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Canned answer for greetings and "how are you", matched on the whole message.
pub fn small_talk_reply(query: &str) -> Option<&'static str> {
    let lower = query.trim().to_lowercase();
    if GREETINGS.contains(&lower.as_str()) {
        Some(GREETING_REPLY)
    } else if HOW_ARE_YOU.contains(&lower.as_str()) {
        Some(HOW_ARE_YOU_REPLY)
    } else {
        None
    }
}

pub fn enhance_context(context: &str, query: &str) -> String {
    let mut enhanced = context.to_string();
    if let Some(text) = SpecialCategory::detect(query).and_then(|c| c.instructions()) {
        enhanced.push_str(text);
    }
    if is_all_options_request(query) {
        enhanced.push_str(ALL_OPTIONS_INSTRUCTION);
    }
    enhanced
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_talk_requires_whole_message() {
        assert_eq!(small_talk_reply("  Привет "), Some(GREETING_REPLY));
        assert_eq!(small_talk_reply("Как дела?"), Some(HOW_ARE_YOU_REPLY));
        assert_eq!(small_talk_reply("привет, что от простуды?"), None);
    }

    #[test]
    fn special_category_uses_rule_order() {
        assert_eq!(SpecialCategory::detect("коллаген и магний"), Some(SpecialCategory::Collagen));
        assert_eq!(SpecialCategory::detect("для печени"), Some(SpecialCategory::Liver));
        assert_eq!(SpecialCategory::detect("погода"), None);
        assert_eq!(SpecialCategory::ColdBronchitis.as_str(), "cold_bronchitis");
    }

    #[test]
    fn enhance_context_appends_rules() {
        let ctx = enhance_context("CTX", "бронхит, что еще есть");
        assert!(ctx.starts_with("CTX"));
        assert!(ctx.contains("Аргент Макс + Солберри"));
        assert!(ctx.ends_with(ALL_OPTIONS_INSTRUCTION));

        assert_eq!(enhance_context("CTX", "пробиотик"), "CTX");
    }

    #[test]
    fn immunity_keywords_tolerate_typo() {
        assert!(is_immunity_query("что-то для имунитета"));
        assert!(!is_immunity_query("для сна"));
    }
}
