//! Inline keyboards shared by commands, callbacks and message handlers.

use reqwest::Url;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::config::AppConfig;

pub const WRITE_TO_CONSULTANT: &str = "write_to_consultant";
pub const CANCEL_CONSULTANT: &str = "cancel_consultant";
pub const BACK_TO_MAIN: &str = "back_to_main";
pub const CHECK_CITY: &str = "check_city";
pub const CITY_PREFIX: &str = "city_";
pub const READ_MORE_PREFIX: &str = "read_more_";
pub const REPLY_PREFIX: &str = "reply_";
pub const CONFIRM_BROADCAST: &str = "confirm_broadcast";
pub const CANCEL_BROADCAST: &str = "cancel_broadcast";

/// Button that opens `url`, skipped when the link is malformed.
fn url_button(text: &str, url: &str) -> Option<InlineKeyboardButton> {
    match Url::parse(url) {
        Ok(url) => Some(InlineKeyboardButton::url(text.to_string(), url)),
        Err(e) => {
            tracing::warn!("Skipping button '{}' with bad url '{}': {}", text, url, e);
            None
        }
    }
}

fn callback(text: &str, data: impl Into<String>) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(text.to_string(), data.into())
}

pub fn main_menu(config: &AppConfig) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = Vec::new();
    if let Some(b) = url_button("Регистрация 💚", &config.registration_url) {
        rows.push(vec![b]);
    }
    if let Some(b) = url_button("📋 Каталог всех продуктов", &config.catalog_url) {
        rows.push(vec![b]);
    }
    rows.push(vec![callback("📍 Адреса магазинов", CHECK_CITY)]);
    rows.push(vec![callback("✉️ Написать консультанту", WRITE_TO_CONSULTANT)]);
    InlineKeyboardMarkup::new(rows)
}

pub fn back_to_main() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![callback("◀️ Главное меню", BACK_TO_MAIN)]])
}

pub fn consultant_prompt() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![callback("❌ Отменить", CANCEL_CONSULTANT)],
        vec![callback("◀️ Главное меню", BACK_TO_MAIN)],
    ])
}

/// Shown to a user after the consultant answered.
pub fn after_consultant_reply() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![callback("✉️ Написать ещё", WRITE_TO_CONSULTANT)],
        vec![callback("◀️ Главное меню", BACK_TO_MAIN)],
    ])
}

pub fn consultant_or_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![callback("✉️ Написать консультанту", WRITE_TO_CONSULTANT)],
        vec![callback("◀️ Главное меню", BACK_TO_MAIN)],
    ])
}

pub fn city_picker() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            callback("Москва", format!("{}moscow", CITY_PREFIX)),
            callback("СПб", format!("{}spb", CITY_PREFIX)),
        ],
        vec![callback("Другой город", format!("{}other", CITY_PREFIX))],
        vec![callback("◀️ Назад", BACK_TO_MAIN)],
    ])
}

pub fn registration(config: &AppConfig) -> InlineKeyboardMarkup {
    let mut rows = Vec::new();
    if let Some(b) = url_button("🔗 Регистрация на сайте", &config.registration_url) {
        rows.push(vec![b]);
    }
    rows.push(vec![callback("◀️ Главное меню", BACK_TO_MAIN)]);
    InlineKeyboardMarkup::new(rows)
}

pub fn product_link(url: &str) -> Option<InlineKeyboardMarkup> {
    url_button("📖 Подробнее на сайте", url).map(|b| InlineKeyboardMarkup::new(vec![vec![b]]))
}

/// Buttons under an assistant answer; `None` when there are none.
pub fn answer_actions(
    user_id: i64,
    truncated: bool,
    offer_consultant: bool,
) -> Option<InlineKeyboardMarkup> {
    let mut rows = Vec::new();
    if truncated {
        rows.push(vec![callback(
            "📖 Читать дальше",
            format!("{}{}", READ_MORE_PREFIX, user_id),
        )]);
    }
    if offer_consultant {
        rows.push(vec![callback("✉️ Написать консультанту", WRITE_TO_CONSULTANT)]);
    }
    if rows.is_empty() {
        None
    } else {
        Some(InlineKeyboardMarkup::new(rows))
    }
}

// ── Admin ──────────────────────────────────────────────────────────

pub const ADMIN_STATS: &str = "admin_stats";
pub const ADMIN_BROADCAST: &str = "admin_broadcast";
pub const ADMIN_USERS: &str = "admin_users";
pub const ADMIN_INFO: &str = "admin_info";
pub const ADMIN_BACK: &str = "admin_back";

pub fn admin_panel() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![callback("📊 Статистика", ADMIN_STATS)],
        vec![callback("📤 Создать рассылку", ADMIN_BROADCAST)],
        vec![callback("👥 Список пользователей", ADMIN_USERS)],
        vec![callback("ℹ️ Инфо", ADMIN_INFO)],
    ])
}

pub fn admin_back(label: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![callback(label, ADMIN_BACK)]])
}

pub fn broadcast_confirm() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        callback("✅ Да, отправить", CONFIRM_BROADCAST),
        callback("❌ Отмена", CANCEL_BROADCAST),
    ]])
}

/// One reply button per user, plus "back".
pub fn user_picker(users: &[(i64, String)]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = users
        .iter()
        .map(|(id, label)| vec![callback(label, format!("{}{}", REPLY_PREFIX, id))])
        .collect();
    rows.push(vec![callback("◀️ Назад", ADMIN_BACK)]);
    InlineKeyboardMarkup::new(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::InlineKeyboardButtonKind;

    fn callback_data(markup: &InlineKeyboardMarkup) -> Vec<String> {
        markup
            .inline_keyboard
            .iter()
            .flatten()
            .filter_map(|b| match &b.kind {
                InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn answer_actions_only_when_needed() {
        assert!(answer_actions(5, false, false).is_none());
        let markup = answer_actions(5, true, true).unwrap();
        assert_eq!(callback_data(&markup), vec!["read_more_5", WRITE_TO_CONSULTANT]);
    }

    #[test]
    fn bad_urls_drop_the_button() {
        assert!(product_link("not a url").is_none());
        assert!(product_link("https://aur-ora.com/catalog/omega").is_some());
    }

    #[test]
    fn user_picker_ends_with_back() {
        let markup = user_picker(&[(10, "Anna".into()), (11, "Boris".into())]);
        assert_eq!(callback_data(&markup), vec!["reply_10", "reply_11", ADMIN_BACK]);
    }
}
