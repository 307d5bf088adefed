use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    ProductSelection,
    ProductInquiry,
    CompositionInquiry,
    DosageInquiry,
    Contraindications,
    Complaint,
    StoreLocation,
    Registration,
    ProductLink,
    GeneralQuestion,
    Unknown,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProductSelection => "product_selection",
            Self::ProductInquiry => "product_inquiry",
            Self::CompositionInquiry => "composition_inquiry",
            Self::DosageInquiry => "dosage_inquiry",
            Self::Contraindications => "contraindications",
            Self::Complaint => "complaint",
            Self::StoreLocation => "store_location",
            Self::Registration => "registration",
            Self::ProductLink => "product_link",
            Self::GeneralQuestion => "general_question",
            Self::Unknown => "unknown",
        }
    }
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("Intent pattern should be valid"))
        .collect()
}

const SELECTION: &[&str] = &[
    r"что.*принимать.*при", r"что.*помогает.*от", r"посоветуйте.*при",
    r"подберите.*продукт", r"подбери.*[а-я]+", r"какой.*продукт.*для",
    r"что.*пить.*при", r"чем.*лечить", r"какие.*средства.*от",
    r"помогите.*выбрать", r"рекомендуете.*при", r"посоветуй.*что.*от",
    r"посоветуй.*что.*нибудь.*от", r"посоветуй.*что.*для", r"посоветуй.*[а-я]+",
    r"подскажи.*что.*от", r"подскажи.*что.*нибудь.*от", r"подскажи.*что.*для",
    r"подскажи.*[а-я]+", r"весь.*[а-я]+", r"все.*[а-я]+",
    r"весь.*ассортимент.*[а-я]+", r"все.*продукты.*[а-я]+", r"что.*есть.*от",
    r"что.*есть.*для", r"от.*[а-я]+.*что", r"для.*[а-я]+.*что",
    r"что.*лучше.*пить", r"что.*лучше.*принимать", r"что.*лучше.*употреблять",
    r"что.*рекомендуете.*пить", r"что.*посоветуете.*пить", r"что.*посоветуете.*принимать",
    r"что.*рекомендуете.*принимать", r"что.*пить.*по.*утрам", r"что.*принимать.*по.*утрам",
    r"что.*пить.*утром", r"что.*принимать.*утром", r"утренние.*напитки",
    r"что.*пить.*на.*завтрак", r"что.*принимать.*на.*завтрак", r"напитки.*для.*утра",
    r"продукты.*для.*утра", r"что.*пить.*для.*энергии", r"что.*принимать.*для.*энергии",
    r"что.*пить.*для.*бодрости", r"что.*принимать.*для.*бодрости", r"посоветуй.*от",
    r"подскажи.*от", r"что.*от", r"что.*при", r"что.*для",
    r"от.*простуды", r"от.*гриппа", r"от.*кашля", r"от.*насморка",
    r"от.*температуры", r"от.*ангины", r"для.*печени", r"для.*иммунитета",
    r"для.*энергии", r"для.*бодрости", r"для.*здоровья", r"при.*простуде",
    r"при.*гриппе", r"при.*кашле", r"при.*насморке", r"при.*температуре",
    r"при.*ангине",
];

const INQUIRY: &[&str] = &[
    r"как.*принимать", r"как.*пить", r"как.*использовать", r"способ.*применения",
    r"инструкция.*по.*применению", r"правила.*приема", r"схема.*приема",
    r"когда.*принимать", r"для.*чего.*применяют.*[а-я]", r"зачем.*нужен.*[а-я]",
    r"что.*лечит.*[а-я]", r"от.*чего.*помогает.*[а-я]", r"показания.*[а-я]",
    r"при.*каких.*заболеваниях.*[а-я]",
];

const COMPOSITION: &[&str] = &[
    r"состав.*продукта", r"что.*входит.*в.*состав", r"из.*чего.*состоит",
    r"какие.*компоненты", r"ингредиенты", r"активные.*вещества",
];

const DOSAGE: &[&str] = &[
    r"сколько.*принимать", r"какая.*дозировка", r"дозы",
    r"количество.*капсул", r"по.*сколько.*штук", r"норма.*приема",
];

const CONTRAINDICATIONS: &[&str] = &[
    r"противопоказания", r"можно.*ли.*принимать", r"есть.*ли.*ограничения",
    r"побочные.*эффекты", r"вредно.*ли", r"безопасно.*ли",
];

const COMPLAINT: &[&str] = &[
    r"не.*помогает", r"не.*действует", r"результата.*нет", r"бесполезно",
    r"зря.*потратил", r"разочарован", r"плохой.*продукт", r"некачественный",
];

const STORE_LOCATION: &[&str] = &[
    r"адрес.*магазина", r"точки.*продаж", r"где.*продается.*[а-я]+.*в.*городе",
    r"магазины.*в.*городе", r"магазины.*в.*[а-я]+", r"найти.*в.*продаже.*в.*городе",
];

const REGISTRATION: &[&str] = &[
    r"как.*зарегистрироваться", r"регистрация.*на.*сайте", r"как.*стать.*представителем",
    r"хочу.*зарегистрироваться", r"регистрация.*в.*компании", r"как.*присоединиться",
    r"стать.*дилером", r"стать.*партнером", r"регистрация.*аврора",
    r"как.*получить.*скидку", r"личный.*кабинет.*регистрация",
];

const PRODUCT_LINK: &[&str] = &[
    r"ссылка.*на.*продукт", r"ссылка.*на.*[а-я]+", r"дай.*ссылку", r"дайте.*ссылку",
    r"отправь.*ссылку", r"отправьте.*ссылку", r"где.*купить.*[а-я]+",
    r"как.*заказать.*[а-я]+", r"хочу.*купить.*[а-я]+", r"покажи.*[а-я]+",
    r"покажите.*[а-я]+", r"фото.*[а-я]+", r"картинку.*[а-я]+",
    r"изображение.*[а-я]+", r"пришли.*[а-я]+", r"пришлите.*[а-я]+",
    r"url.*[а-я]+", r"линк.*[а-я]+", r"ссылку.*[а-я]+", r"нужна.*ссылка",
    r"нужна.*ссылка.*на.*[а-я]+", r"пришли.*ссылку.*на.*[а-я]+",
];

const SHORT_FORMS: &[&str] = &[
    r"от\s+\w+$", r"при\s+\w+$", r"для\s+\w+$",
    r"посоветуй\s+от\s+\w+", r"подскажи\s+от\s+\w+",
    r"что\s+от\s+\w+", r"что\s+при\s+\w+", r"что\s+для\s+\w+",
];

const ALL_OPTIONS: &[&str] = &[
    r"какой.*еще", r"еще.*есть", r"помимо.*этого", r"что.*еще",
    r"все.*варианты", r"все.*продукты", r"что.*еще.*есть", r"какие.*еще",
    r"другие.*варианты", r"еще.*варианты", r"полный.*обзор", r"весь.*ассортимент",
];

const HEALTH: &[&str] = &[
    r"что.*лучше.*пить", r"что.*лучше.*принимать", r"что.*рекомендуете",
    r"что.*посоветуете", r"подскажи.*что", r"посоветуй.*что", r"что.*пить",
    r"что.*принимать", r"какие.*продукты", r"какие.*напитки",
    r"что.*для.*здоровья", r"что.*для.*иммунитета", r"что.*для.*энергии",
    r"что.*для.*бодрости",
];

lazy_static! {
    static ref BARE_PREPOSITION: Regex =
        Regex::new(r"^\s*(от|при)\s+\w+\s*$").expect("Preposition pattern should be valid");
    static ref SHORT_FORM_RES: Vec<Regex> = compile(SHORT_FORMS);
    static ref ALL_OPTIONS_RES: Vec<Regex> = compile(ALL_OPTIONS);
    static ref HEALTH_RES: Vec<Regex> = compile(HEALTH);
    /// Scored in this order; on equal scores the earlier intent wins.
    static ref INTENT_TABLE: Vec<(Intent, Vec<Regex>)> = vec![
        (Intent::ProductSelection, compile(SELECTION)),
        (Intent::ProductInquiry, compile(INQUIRY)),
        (Intent::CompositionInquiry, compile(COMPOSITION)),
        (Intent::DosageInquiry, compile(DOSAGE)),
        (Intent::Contraindications, compile(CONTRAINDICATIONS)),
        (Intent::Complaint, compile(COMPLAINT)),
        (Intent::StoreLocation, compile(STORE_LOCATION)),
        (Intent::Registration, compile(REGISTRATION)),
        (Intent::ProductLink, compile(PRODUCT_LINK)),
    ];
}

fn any_match(patterns: &[Regex], text: &str) -> bool {
    patterns.iter().any(|re| re.is_match(text))
}

/// Classify a message. The confidence of a table match is the share of the
/// intent's patterns that fired, so short tables win over long ones.
pub fn classify(text: &str) -> (Intent, f64) {
    let lower = text.to_lowercase();

    if BARE_PREPOSITION.is_match(&lower) {
        return (Intent::ProductSelection, 0.8);
    }
    if any_match(&SHORT_FORM_RES, &lower) {
        return (Intent::ProductSelection, 0.9);
    }

    let mut best = (Intent::Unknown, 0.0);
    for (intent, patterns) in INTENT_TABLE.iter() {
        let matches = patterns.iter().filter(|re| re.is_match(&lower)).count();
        if matches == 0 {
            continue;
        }
        let score = matches as f64 / patterns.len() as f64;
        if score > best.1 {
            best = (*intent, score);
        }
    }

    if best.0 == Intent::Unknown {
        if any_match(&HEALTH_RES, &lower) {
            best = (Intent::ProductSelection, 0.7);
        } else if any_match(&ALL_OPTIONS_RES, &lower) {
            best = (Intent::ProductSelection, 0.9);
        } else if text.trim().chars().count() > 10 {
            best = (Intent::GeneralQuestion, 0.5);
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_preposition_phrases_are_selection() {
        assert_eq!(classify("От простуды"), (Intent::ProductSelection, 0.8));
        assert_eq!(classify("что есть для печени"), (Intent::ProductSelection, 0.9));
    }

    #[test]
    fn table_intents() {
        assert_eq!(classify("Дай ссылку на солберри").0, Intent::ProductLink);
        assert_eq!(classify("какие противопоказания у битерона?").0, Intent::Contraindications);
        assert_eq!(classify("Как зарегистрироваться на сайте?").0, Intent::Registration);
        assert_eq!(classify("этот продукт бесполезно покупать").0, Intent::Complaint);
    }

    #[test]
    fn fallbacks() {
        assert_eq!(classify("расскажите про компанию аврора").0, Intent::GeneralQuestion);
        assert_eq!(classify("ок"), (Intent::Unknown, 0.0));
    }
}
