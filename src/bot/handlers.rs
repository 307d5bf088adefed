use std::sync::Arc;

use serde_json::json;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, InputFile, ParseMode, User};
use teloxide::utils::html;

use crate::agent::conversation::Role;
use crate::agent::session::UserMode;
use crate::ai::responder::is_no_info_answer;
use crate::api::analytics::QUESTION_ACTION;
use crate::bot::{admin, formatting, keyboards, AppState, HandlerResult};
use crate::catalog::{truncate_chars, Product};
use crate::nlp::{Intent, Sentiment};
use crate::search::synonyms::detect_category;
use crate::search::{mentions, special};

/// Hits fed to the model per question.
const SEARCH_LIMIT: usize = 8;
/// Messages shorter than this (in chars) may be a pick from the last list.
const SELECTION_MAX_CHARS: usize = 50;
const MIN_QUESTION_CHARS: usize = 3;
/// Longer messages with a question word start a new topic.
const NEW_TOPIC_MIN_CHARS: usize = 20;

const LINK_CONFIRMATIONS: &[&str] = &["да", "да нужна", "нужна", "да, нужна"];
const QUESTION_INDICATORS: &[&str] = &[
    "что", "какие", "как", "где", "когда", "почему", "зачем", "расскажи", "покажи", "есть ли",
];

const REGISTRATION_TEXT: &str = "📝 Регистрация в компании АВРОРА\n\n\
    Для регистрации на сайте и получения персональных скидок \
    воспользуйтесь кнопкой ниже.\n\n\
    После регистрации вам будут доступны:\n\
    • 💰 Персональные скидки\n\
    • 📦 Отслеживание заказов\n\
    • 👤 Личный кабинет\n\
    • 🎯 Возможности представителя\n\n\
    Если нужна помощь с регистрацией, обратитесь к Наталье.";

const PRODUCT_NOT_FOUND_TEXT: &str = "😔 К сожалению, я не смог найти продукт, о котором вы спрашиваете.\n\n\
    💡 Попробуйте:\n\
    • Уточнить название продукта\n\
    • Написать консультанту Наталье\n\n\
    ✉️ Наталья поможет найти нужный продукт и отправит ссылку!";

pub fn is_link_confirmation(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    LINK_CONFIRMATIONS.contains(&lower.as_str())
}

pub fn has_question_indicator(text: &str) -> bool {
    let lower = text.to_lowercase();
    QUESTION_INDICATORS.iter().any(|w| lower.contains(w))
}

/// A short reply that is either a list number or names one of `shown`.
pub fn looks_like_selection(text: &str, shown: &[Product]) -> bool {
    let text = text.trim();
    if shown.is_empty() || text.chars().count() >= SELECTION_MAX_CHARS {
        return false;
    }
    let numeric = !text.is_empty() && text.chars().all(|c| c.is_ascii_digit());
    numeric || mentions::select_product(text, shown).is_some()
}

pub fn product_caption(product: &Product) -> String {
    format!(
        "🌿 <b>{}</b>\n\n📝 {}",
        html::escape(&product.name),
        html::escape(&product.summary(300))
    )
}

/// Product card with its photo when the catalog has one; falls back to text.
pub async fn send_product_card(bot: &Bot, chat_id: ChatId, product: &Product) -> HandlerResult {
    let caption = product_caption(product);
    let markup = keyboards::product_link(&product.url);

    if let Some(image_id) = product.image_id.as_deref().filter(|id| !id.trim().is_empty()) {
        let mut req = bot
            .send_photo(chat_id, InputFile::file_id(image_id.to_string()))
            .caption(caption.clone())
            .parse_mode(ParseMode::Html);
        if let Some(markup) = markup.clone() {
            req = req.reply_markup(markup);
        }
        match req.await {
            Ok(_) => return Ok(()),
            Err(e) => tracing::warn!("Photo {} for '{}' failed: {}", image_id, product.name, e),
        }
    }

    let mut req = bot.send_message(chat_id, caption).parse_mode(ParseMode::Html);
    if let Some(markup) = markup {
        req = req.reply_markup(markup);
    }
    req.await?;
    Ok(())
}

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> HandlerResult {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let user_id = user.id.0 as i64;
    let is_admin = state.config.is_admin(user_id);

    // ── Admin modes take any kind of message ───────────────────────
    if is_admin {
        match state.sessions.mode(user_id).await {
            UserMode::AwaitingBroadcast => {
                return admin::stage_broadcast(&bot, &state, &msg, user_id).await;
            }
            UserMode::ReplyingTo { user_id: target } => {
                return admin::send_direct_reply(&bot, &state, &msg, user_id, target).await;
            }
            _ => {}
        }

        if let Some(largest) = msg.photo().and_then(|sizes| sizes.last()) {
            bot.send_message(
                msg.chat.id,
                format!(
                    "🆔 file_id этого фото:\n<code>{}</code>",
                    html::escape(&largest.file.id.to_string())
                ),
            )
            .parse_mode(ParseMode::Html)
            .await?;
            return Ok(());
        }
    }

    let Some(raw) = msg.text() else {
        return Ok(());
    };
    let text = raw.trim();

    if let Err(e) = state
        .db
        .upsert_user(user_id, user.username.as_deref(), Some(user.full_name().as_str()))
        .await
    {
        tracing::warn!("Failed to refresh user {}: {}", user_id, e);
    }

    // ── Consultant relay ───────────────────────────────────────────
    if state.sessions.mode(user_id).await == UserMode::WritingToConsultant {
        state.sessions.take_mode(user_id).await;
        return admin::relay_to_consultant(&bot, &state, &msg, user, text).await;
    }

    if is_admin {
        if let Some(replied) = msg.reply_to_message() {
            if let Some(target) = state
                .sessions
                .relay_target(msg.chat.id.0, replied.id.0)
                .await
            {
                return admin::deliver_consultant_reply(&bot, &state, &msg, target, text).await;
            }
        }
    }

    // ── Follow-ups on the last answer ──────────────────────────────
    if is_link_confirmation(text) {
        return confirm_link_request(&bot, &msg, &state, user_id).await;
    }

    let shown = state.conversations.last_products(user_id).await;
    if looks_like_selection(text, &shown) {
        return handle_selection(&bot, &msg, &state, user_id, text, &shown).await;
    }

    if text.chars().count() < MIN_QUESTION_CHARS {
        return Ok(());
    }

    if !shown.is_empty()
        && text.chars().count() > NEW_TOPIC_MIN_CHARS
        && has_question_indicator(text)
    {
        state.conversations.clear_last_products(user_id).await;
    }

    if let Some(reply) = special::small_talk_reply(text) {
        bot.send_chat_action(msg.chat.id, ChatAction::Typing).await?;
        bot.send_message(msg.chat.id, reply).await?;
        return Ok(());
    }

    // ── Question ───────────────────────────────────────────────────
    let processed = state.nlp.process(text);
    let analysis = processed.summary();
    tracing::info!("User {}: {}", user_id, analysis);

    let action = format!("{}{}", QUESTION_ACTION, truncate_chars(text, 50));
    let metadata = json!({
        "intent": processed.intent.as_str(),
        "confidence": processed.confidence,
        "sentiment": processed.sentiment.as_str(),
        "products": processed.products,
    });
    if let Err(e) = state.db.log_user_action(user_id, &action, Some(metadata)).await {
        tracing::warn!("Failed to log question for {}: {}", user_id, e);
    }

    match processed.intent {
        Intent::Registration => {
            bot.send_chat_action(msg.chat.id, ChatAction::Typing).await?;
            bot.send_message(msg.chat.id, REGISTRATION_TEXT)
                .reply_markup(keyboards::registration(&state.config))
                .await?;
            return Ok(());
        }
        Intent::ProductLink => {
            bot.send_chat_action(msg.chat.id, ChatAction::Typing).await?;
            let found = mentions::find_products_for_link(text, state.search.knowledge_base());
            match found.first() {
                Some(product) => send_product_card(&bot, msg.chat.id, product).await?,
                None => {
                    bot.send_message(msg.chat.id, PRODUCT_NOT_FOUND_TEXT)
                        .reply_markup(keyboards::consultant_or_menu())
                        .await?;
                }
            }
            return Ok(());
        }
        _ => {}
    }

    answer_question(&bot, &msg, &state, user, text, processed.intent, processed.sentiment, &analysis)
        .await
}

#[allow(clippy::too_many_arguments)]
async fn answer_question(
    bot: &Bot,
    msg: &Message,
    state: &Arc<AppState>,
    user: &User,
    text: &str,
    intent: Intent,
    sentiment: Sentiment,
    analysis: &str,
) -> HandlerResult {
    let user_id = user.id.0 as i64;
    bot.send_chat_action(msg.chat.id, ChatAction::Typing).await?;

    let products: Vec<Product> = state
        .search
        .search_products(text, None, SEARCH_LIMIT)
        .await
        .into_iter()
        .map(|hit| hit.product)
        .collect();
    tracing::info!("Found {} products for user {}", products.len(), user_id);

    let reply = state.responder.answer(text, &products, Some(intent)).await;

    state
        .conversations
        .add_message(user_id, Role::User, text, Some(json!({ "intent": intent.as_str() })))
        .await;
    state
        .conversations
        .add_message(
            user_id,
            Role::Assistant,
            &reply.text,
            Some(json!({ "intent": reply.intent, "cached": reply.cached })),
        )
        .await;

    if let Some(topic) = detect_category(text) {
        state.conversations.set_topic(user_id, topic).await;
    }
    let mut preferences = serde_json::Map::new();
    preferences.insert("last_intent".into(), json!(intent.as_str()));
    state.conversations.update_preferences(user_id, preferences).await;

    let mentioned = mentions::extract_mentioned_products(&reply.text, state.search.knowledge_base());
    if mentioned.is_empty() {
        state.conversations.clear_last_products(user_id).await;
    } else {
        state.conversations.set_last_products(user_id, mentioned).await;
    }

    let truncated = formatting::cut_point(&reply.text).is_some();
    if truncated {
        state.conversations.store_full_answer(user_id, &reply.text).await;
    }
    let first = formatting::first_part(&reply.text);
    let markup = keyboards::answer_actions(user_id, truncated, is_no_info_answer(&reply.text));

    let mut req = bot.send_message(msg.chat.id, first.as_str());
    if let Some(markup) = markup {
        req = req.reply_markup(markup);
    }
    req.await?;

    if intent == Intent::Complaint || sentiment == Sentiment::Negative {
        let context = state.conversations.summary(user_id).await;
        let analysis = format!("{}\n\nКонтекст:\n{}", analysis, context);
        admin::notify_complaint(bot, &state.config.admin_ids, user, text, &analysis, &first).await;
    }
    Ok(())
}

async fn confirm_link_request(
    bot: &Bot,
    msg: &Message,
    state: &Arc<AppState>,
    user_id: i64,
) -> HandlerResult {
    let shown = state.conversations.last_products(user_id).await;
    match shown.as_slice() {
        [] => {
            bot.send_message(
                msg.chat.id,
                "🤔 Я не помню, о каких продуктах мы говорили. Задайте вопрос заново.",
            )
            .await?;
        }
        [only] => {
            send_product_card(bot, msg.chat.id, only).await?;
            state.conversations.clear_last_products(user_id).await;
        }
        many => {
            bot.send_message(
                msg.chat.id,
                format!(
                    "📋 На какой продукт нужна ссылка?\n\n{}\n\
                     💬 Напишите номер (например: 1) или название продукта",
                    formatting::numbered_names(many.iter().map(|p| p.name.as_str()))
                ),
            )
            .await?;
        }
    }
    Ok(())
}

async fn handle_selection(
    bot: &Bot,
    msg: &Message,
    state: &Arc<AppState>,
    user_id: i64,
    text: &str,
    shown: &[Product],
) -> HandlerResult {
    match mentions::select_product(text, shown) {
        Some(product) => {
            send_product_card(bot, msg.chat.id, product).await?;
            state.conversations.clear_last_products(user_id).await;
        }
        None => {
            bot.send_message(
                msg.chat.id,
                format!(
                    "🤔 Не могу понять, какой продукт вы выбрали.\n\n\
                     📋 Доступные варианты:\n{}\n\
                     💬 Напишите номер или точное название",
                    formatting::numbered_names(shown.iter().map(|p| p.name.as_str()))
                ),
            )
            .await?;
        }
    }
    Ok(())
}
