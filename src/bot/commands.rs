use std::collections::BTreeMap;
use std::sync::Arc;

use teloxide::macros::BotCommands;
use teloxide::utils::command::BotCommands as _;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, ParseMode};

use crate::bot::{admin, keyboards, AppState, HandlerResult};

pub const WELCOME_TEXT: &str = "Привет! Меня зовут Наталья Кумасинская. Я являюсь консультантом \
    компании Аврора и давно использую продукцию Авроры. Хочу поделиться опытом и помочь выбрать \
    самые лучшие продукты этой фирмы.\n\n\
    Просто напишите, что вас интересует, например:\n\n\
    • Витамины для иммунитета\n\
    • Омега-3 для сердца\n\
    • Магний для сна\n\
    • Пробиотики для пищеварения\n\
    • Коллаген для кожи и волос\n\n\
    💡 Используйте /help для получения подробной справки";

pub const MENU_TEXT: &str = "Выбери, что тебе подходит 👇";

pub const HELP_TEXT: &str = "🔍 Как пользоваться ботом:\n\n\
    1️⃣ Напишите ваш вопрос или потребность\n\
    2️⃣ Я найду подходящие продукты\n\
    3️⃣ Расскажу подробности о каждом\n\n\
    Примеры запросов:\n\
    • 'Нужны витамины для иммунитета'\n\
    • 'Что поможет с бессонницей?'\n\
    • 'Омега-3 для сердца'\n\
    • 'Дай ссылку на Солберри'\n\
    • 'Для печени'\n\n";

/// Products shown by /products, and per category.
const PRODUCTS_LIMIT: usize = 20;
const PER_CATEGORY_LIMIT: usize = 10;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Доступные команды:")]
pub enum BotCommand {
    #[command(description = "Начать работу с ботом")]
    Start,
    #[command(description = "Главное меню")]
    Menu,
    #[command(description = "Показать справку")]
    Help,
    #[command(description = "Показать продукты")]
    Products,
    #[command(description = "Показать категории")]
    Categories,
    #[command(description = "Статистика использования")]
    Stats,
    #[command(description = "Очистить историю разговора")]
    Clear,
    #[command(description = "Админ-панель")]
    Admin,
}

/// Usage notes followed by the generated command list.
pub fn help_text() -> String {
    format!("{}{}", HELP_TEXT, BotCommand::descriptions())
}

pub async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: BotCommand,
    state: Arc<AppState>,
) -> HandlerResult {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let user_id = user.id.0 as i64;

    match cmd {
        BotCommand::Start => {
            let full_name = user.full_name();
            let (_, created) = state
                .db
                .upsert_user(user_id, user.username.as_deref(), Some(full_name.as_str()))
                .await?;
            if created {
                tracing::info!("New user {} ({})", user_id, full_name);
                admin::notify_new_user(&bot, &state.config.admin_ids, user).await;
            }
            state.db.log_user_action(user_id, "start", None).await?;
            state.conversations.clear(user_id).await;
            state.sessions.set_mode(user_id, Default::default()).await;

            bot.send_message(msg.chat.id, WELCOME_TEXT).await?;
            bot.send_message(msg.chat.id, MENU_TEXT)
                .reply_markup(keyboards::main_menu(&state.config))
                .await?;
        }

        BotCommand::Menu => {
            state.db.log_user_action(user_id, "open_menu", None).await?;
            bot.send_message(msg.chat.id, MENU_TEXT)
                .reply_markup(keyboards::main_menu(&state.config))
                .await?;
        }

        BotCommand::Help => {
            bot.send_message(msg.chat.id, help_text()).await?;
        }

        BotCommand::Products => {
            bot.send_chat_action(msg.chat.id, ChatAction::Typing).await?;
            let kb = state.search.knowledge_base();
            if kb.is_empty() {
                bot.send_message(
                    msg.chat.id,
                    "📦 Список продуктов временно недоступен.\n\
                     Попробуйте задать конкретный вопрос о продуктах.",
                )
                .await?;
                return Ok(());
            }

            let mut by_category: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
            for product in kb.all().iter().take(PRODUCTS_LIMIT) {
                let category = if product.category.is_empty() {
                    "Разное"
                } else {
                    product.category.as_str()
                };
                by_category.entry(category).or_default().push(&product.name);
            }

            let mut text = String::from("📦 Наши продукты:\n");
            for (category, names) in &by_category {
                text.push_str(&format!("\n{}:\n", category));
                for name in names.iter().take(PER_CATEGORY_LIMIT) {
                    text.push_str(&format!("  • {}\n", name));
                }
            }
            text.push_str("\n💡 Напишите название продукта для подробной информации");
            bot.send_message(msg.chat.id, text).await?;
        }

        BotCommand::Categories => {
            bot.send_chat_action(msg.chat.id, ChatAction::Typing).await?;
            let categories = state.search.categories().await;
            if categories.is_empty() {
                bot.send_message(
                    msg.chat.id,
                    "📂 Список категорий временно недоступен.\n\
                     Попробуйте задать вопрос о конкретной потребности.",
                )
                .await?;
                return Ok(());
            }
            let mut text = String::from(
                "📂 Категории продуктов:\n\nВыберите интересующую категорию или напишите свой запрос:\n\n",
            );
            for (i, category) in categories.iter().enumerate() {
                text.push_str(&format!("{}. {}\n", i + 1, category));
            }
            text.push_str("\n💡 Напишите название категории или свой вопрос");
            bot.send_message(msg.chat.id, text).await?;
        }

        BotCommand::Stats => {
            let conversations = state.conversations.stats().await;
            let mut text = String::from("📊 Статистика:\n\n");
            if let Some(cache) = state.responder.cache_stats().await {
                text.push_str(&format!(
                    "Кэш LLM:\n• Размер: {}/{}\n• Попаданий: {}\n• Среднее: {:.1}\n\n",
                    cache.size, cache.max_size, cache.total_hits, cache.avg_hits
                ));
            }
            text.push_str(&format!(
                "Разговоры:\n• Активных: {}\n• Сообщений: {}\n",
                conversations.total_conversations, conversations.total_messages
            ));
            let top = state.responder.top_queries(3).await;
            if !top.is_empty() {
                text.push_str("\nЧастые вопросы:\n");
                for (query, hits) in top {
                    text.push_str(&format!("• {} ({})\n", query, hits));
                }
            }
            bot.send_message(msg.chat.id, text).await?;
        }

        BotCommand::Clear => {
            if let Ok(dump) = state.conversations.export_json(user_id).await {
                tracing::debug!("Conversation of {} before clearing: {}", user_id, dump);
            }
            state.conversations.clear(user_id).await;
            let mut text =
                String::from("🗑️ История разговора очищена!\n\nМожете начать новый разговор.");
            if state.config.is_admin(user_id) {
                state.responder.clear_cache().await;
                text.push_str("\n\n🧠 Кэш ответов тоже очищен.");
            }
            bot.send_message(msg.chat.id, text).await?;
        }

        BotCommand::Admin => {
            if !state.config.is_admin(user_id) {
                bot.send_message(msg.chat.id, "❌ У вас нет прав администратора")
                    .await?;
                return Ok(());
            }
            bot.send_message(msg.chat.id, "🔐 <b>Админ-панель</b>")
                .parse_mode(ParseMode::Html)
                .reply_markup(keyboards::admin_panel())
                .await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::utils::command::BotCommands as _;

    #[test]
    fn help_lists_every_command() {
        let text = help_text();
        assert!(text.starts_with("🔍 Как пользоваться ботом"));
        let commands = [
            "/start", "/menu", "/help", "/products", "/categories", "/stats", "/clear", "/admin",
        ];
        for command in commands {
            assert!(text.contains(command), "missing {}", command);
        }
    }

    #[test]
    fn commands_parse_lowercase() {
        assert!(matches!(
            BotCommand::parse("/help", "aurora_bot"),
            Ok(BotCommand::Help)
        ));
        assert!(BotCommand::parse("/unknown", "aurora_bot").is_err());
    }
}
