use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::{ChatId, MessageId, ParseMode};

use crate::agent::session::UserMode;
use crate::bot::commands::MENU_TEXT;
use crate::bot::keyboards::{self, *};
use crate::bot::{admin, formatting, AppState, HandlerResult};

pub async fn handle_callback(bot: Bot, q: CallbackQuery, state: Arc<AppState>) -> HandlerResult {
    let data = match q.data.as_deref() {
        Some(d) => d,
        None => return Ok(()),
    };

    let user_id = q.from.id.0 as i64;
    let origin: Option<(ChatId, MessageId)> = q.message.as_ref().map(|m| (m.chat().id, m.id()));

    // ── Read More ──────────────────────────────────────────────────
    if let Some(owner) = data.strip_prefix(READ_MORE_PREFIX) {
        if owner.parse::<i64>().ok() != Some(user_id) {
            bot.answer_callback_query(&q.id)
                .text("Это не ваше сообщение")
                .show_alert(true)
                .await?;
            return Ok(());
        }
        let Some(full) = state.conversations.take_full_answer(user_id).await else {
            bot.answer_callback_query(&q.id)
                .text("Полный ответ не найден")
                .show_alert(true)
                .await?;
            return Ok(());
        };
        let rest = formatting::remainder(&full);
        if rest.is_empty() {
            bot.answer_callback_query(&q.id)
                .text("Нет дополнительного текста")
                .show_alert(true)
                .await?;
            return Ok(());
        }
        if let Some((chat_id, _)) = origin {
            for part in formatting::split_message(&rest, formatting::MESSAGE_LIMIT) {
                bot.send_message(chat_id, part).await?;
            }
        }
        bot.answer_callback_query(&q.id)
            .text("Продолжение отправлено!")
            .await?;
        return Ok(());
    }

    // ── Consultant ─────────────────────────────────────────────────
    if data == WRITE_TO_CONSULTANT {
        state
            .sessions
            .set_mode(user_id, UserMode::WritingToConsultant)
            .await;
        if let Err(e) = state.db.log_user_action(user_id, "write_to_consultant", None).await {
            tracing::warn!("Failed to log action for {}: {}", user_id, e);
        }
        if let Some((chat_id, message_id)) = origin {
            delete_quietly(&bot, chat_id, message_id).await;
            bot.send_message(
                chat_id,
                "✉️ Написать консультанту\n\n\
                 Напишите ваше сообщение, и я передам его Наталье.\n\
                 Она лично ответит вам в ближайшее время!\n\n\
                 💬 Ожидаю ваше сообщение...",
            )
            .reply_markup(keyboards::consultant_prompt())
            .await?;
        }
        bot.answer_callback_query(&q.id).await?;
        return Ok(());
    }

    if data == CANCEL_CONSULTANT || data == BACK_TO_MAIN {
        state.sessions.set_mode(user_id, UserMode::Idle).await;
        if let Some((chat_id, message_id)) = origin {
            delete_quietly(&bot, chat_id, message_id).await;
            let text = if data == CANCEL_CONSULTANT {
                format!(
                    "❌ Отправка сообщения Наталье отменена.\n\nВыберите, что вас интересует:\n\n{}",
                    MENU_TEXT
                )
            } else {
                MENU_TEXT.to_string()
            };
            bot.send_message(chat_id, text)
                .reply_markup(keyboards::main_menu(&state.config))
                .await?;
        }
        bot.answer_callback_query(&q.id).await?;
        return Ok(());
    }

    // ── Stores ─────────────────────────────────────────────────────
    if data == CHECK_CITY {
        if let Err(e) = state.db.log_user_action(user_id, "check_city", None).await {
            tracing::warn!("Failed to log action for {}: {}", user_id, e);
        }
        if let Some((chat_id, message_id)) = origin {
            delete_quietly(&bot, chat_id, message_id).await;
            bot.send_message(chat_id, "🏪 Выберите город для поиска магазинов:")
                .reply_markup(keyboards::city_picker())
                .await?;
        }
        bot.answer_callback_query(&q.id).await?;
        return Ok(());
    }

    if let Some(city) = data.strip_prefix(CITY_PREFIX) {
        let city_name = match city {
            "moscow" => "Москве",
            "spb" => "Санкт-Петербурге",
            _ => "вашем городе",
        };
        if let Some((chat_id, _)) = origin {
            bot.send_message(
                chat_id,
                format!(
                    "🏪 Адреса магазинов Авроры в {} уточняйте у консультанта.\n\n\
                     Напишите Наталье, и она подскажет ближайший пункт выдачи \
                     или поможет оформить заказ на сайте.",
                    city_name
                ),
            )
            .reply_markup(keyboards::consultant_or_menu())
            .await?;
        }
        bot.answer_callback_query(&q.id).await?;
        return Ok(());
    }

    // ── Admin ──────────────────────────────────────────────────────
    if data.starts_with("admin_")
        || data.starts_with(REPLY_PREFIX)
        || data == CONFIRM_BROADCAST
        || data == CANCEL_BROADCAST
    {
        if !state.config.is_admin(user_id) {
            bot.answer_callback_query(&q.id)
                .text("❌ Нет прав")
                .show_alert(true)
                .await?;
            return Ok(());
        }
        return handle_admin_callback(&bot, &q, data, user_id, origin, &state).await;
    }

    bot.answer_callback_query(&q.id).await?;
    Ok(())
}

async fn handle_admin_callback(
    bot: &Bot,
    q: &CallbackQuery,
    data: &str,
    admin_id: i64,
    origin: Option<(ChatId, MessageId)>,
    state: &Arc<AppState>,
) -> HandlerResult {
    let Some((chat_id, message_id)) = origin else {
        bot.answer_callback_query(&q.id).await?;
        return Ok(());
    };

    if let Some(target) = data.strip_prefix(REPLY_PREFIX) {
        let known = match target.parse::<i64>() {
            Ok(id) => state.db.get_user(id).await?.map(|u| u.user_id),
            Err(_) => None,
        };
        let Some(target) = known else {
            bot.answer_callback_query(&q.id)
                .text("❌ Пользователь не найден.")
                .show_alert(true)
                .await?;
            return Ok(());
        };
        state
            .sessions
            .set_mode(admin_id, UserMode::ReplyingTo { user_id: target })
            .await;
        bot.send_message(
            chat_id,
            format!(
                "✉️ Введите сообщение для пользователя {}.\n\
                 Можно отправить текст, фото, видео и т.д.",
                target
            ),
        )
        .await?;
        bot.answer_callback_query(&q.id).await?;
        return Ok(());
    }

    match data {
        ADMIN_STATS => {
            let text = admin::stats_text(state).await?;
            bot.edit_message_text(chat_id, message_id, text)
                .parse_mode(ParseMode::Html)
                .reply_markup(keyboards::admin_back("◀️ Назад"))
                .await?;
        }
        ADMIN_BROADCAST => {
            state
                .sessions
                .set_mode(admin_id, UserMode::AwaitingBroadcast)
                .await;
            bot.edit_message_text(
                chat_id,
                message_id,
                "✉️ Введите сообщение для рассылки.\n\
                 Можно отправить текст, фото, видео, файл или голосовое.",
            )
            .reply_markup(keyboards::admin_back("◀️ Отмена"))
            .await?;
        }
        ADMIN_USERS => {
            let users = admin::user_choices(&state.db, 20).await?;
            if users.is_empty() {
                bot.edit_message_text(chat_id, message_id, "👥 Нет активных пользователей.")
                    .reply_markup(keyboards::admin_back("◀️ Назад"))
                    .await?;
            } else {
                bot.edit_message_text(chat_id, message_id, "Выберите пользователя для ответа:")
                    .reply_markup(keyboards::user_picker(&users))
                    .await?;
            }
        }
        ADMIN_INFO => {
            bot.edit_message_text(chat_id, message_id, admin::ADMIN_INFO_TEXT)
                .parse_mode(ParseMode::Html)
                .reply_markup(keyboards::admin_back("◀️ Назад"))
                .await?;
        }
        ADMIN_BACK => {
            // Leaving a sub-screen abandons any pending broadcast or reply.
            state.sessions.set_mode(admin_id, UserMode::Idle).await;
            bot.edit_message_text(chat_id, message_id, "🔐 <b>Админ-панель</b>")
                .parse_mode(ParseMode::Html)
                .reply_markup(keyboards::admin_panel())
                .await?;
        }
        CANCEL_BROADCAST => {
            state.sessions.set_mode(admin_id, UserMode::Idle).await;
            bot.edit_message_text(chat_id, message_id, "❌ Рассылка отменена.")
                .await?;
        }
        CONFIRM_BROADCAST => {
            let UserMode::ConfirmBroadcast {
                from_chat,
                message_id: draft,
            } = state.sessions.take_mode(admin_id).await
            else {
                bot.answer_callback_query(&q.id)
                    .text("Нет сообщения для рассылки")
                    .show_alert(true)
                    .await?;
                return Ok(());
            };
            bot.edit_message_text(chat_id, message_id, "📤 Рассылка начата...")
                .await?;

            let worker = bot.clone();
            let db = state.db.clone();
            tokio::spawn(async move {
                if let Err(e) =
                    admin::run_broadcast(worker, db, chat_id, ChatId(from_chat), MessageId(draft))
                        .await
                {
                    tracing::error!("Broadcast failed: {}", e);
                }
            });
        }
        _ => {}
    }

    bot.answer_callback_query(&q.id).await?;
    Ok(())
}

/// Deleting can fail for messages older than 48h; that is harmless.
async fn delete_quietly(bot: &Bot, chat_id: ChatId, message_id: MessageId) {
    if let Err(e) = bot.delete_message(chat_id, message_id).await {
        tracing::debug!("Could not delete message: {}", e);
    }
}
