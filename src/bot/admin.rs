use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::{MessageId, ParseMode, User};
use teloxide::utils::html;

use crate::agent::session::UserMode;
use crate::bot::{keyboards, AppState, HandlerResult};
use crate::catalog::truncate_chars;
use crate::db::Database;

/// Progress is edited after this many deliveries.
const PROGRESS_EVERY: usize = 10;

pub const ADMIN_INFO_TEXT: &str = "ℹ️ <b>Админ-панель</b>\n\n\
    Доступные функции:\n\
    • Рассылка всем пользователям\n\
    • Ответ пользователю\n\
    • Просмотр статистики\n\n\
    Разработано для поддержки бота Аврора.";

/// "@username" when set, otherwise the full name.
pub fn display_name(user: &User) -> String {
    match &user.username {
        Some(username) => format!("@{}", username),
        None => user.full_name(),
    }
}

/// Send `text` to every admin; failures are logged, not returned.
pub async fn notify_admins(bot: &Bot, admin_ids: &[i64], text: &str) {
    for admin in admin_ids {
        if let Err(e) = bot.send_message(ChatId(*admin), text).await {
            tracing::error!("Failed to notify admin {}: {}", admin, e);
        }
    }
}

pub async fn notify_new_user(bot: &Bot, admin_ids: &[i64], user: &User) {
    let text = format!(
        "✅ Новый пользователь: {} (ID: {})\nИмя: {}\nЗапустил бота: /start",
        display_name(user),
        user.id.0,
        user.full_name()
    );
    notify_admins(bot, admin_ids, &text).await;
}

pub async fn notify_complaint(
    bot: &Bot,
    admin_ids: &[i64],
    user: &User,
    text: &str,
    analysis: &str,
    answer: &str,
) {
    let alert = format!(
        "🚨 ПРИОРИТЕТ - Жалоба от {} (ID: {}):\n\nОригинал: {}\n\nАнализ: {}\n\nОтвет бота: {}",
        display_name(user),
        user.id.0,
        text,
        analysis,
        truncate_chars(answer, 200)
    );
    notify_admins(bot, admin_ids, &alert).await;
}

// ── Consultant Relay ───────────────────────────────────────────────

/// Forward a user's message to the admins and remember where each copy
/// landed so a reply can be routed back.
pub async fn relay_to_consultant(
    bot: &Bot,
    state: &Arc<AppState>,
    msg: &Message,
    user: &User,
    text: &str,
) -> HandlerResult {
    let user_id = user.id.0 as i64;

    if text.is_empty() {
        bot.send_message(msg.chat.id, "❌ Пустое сообщение не может быть отправлено.")
            .await?;
        return Ok(());
    }
    if state.config.admin_ids.is_empty() {
        bot.send_message(
            msg.chat.id,
            "❌ Наталья временно недоступна.\nПопробуйте задать вопрос боту или обратитесь позже.",
        )
        .await?;
        return Ok(());
    }

    let mut user_info = html::escape(&user.full_name());
    if let Some(username) = &user.username {
        user_info.push_str(&format!(" (@{})", html::escape(username)));
    }
    let relay = format!(
        "💌 <b>Сообщение от пользователя</b>\n\n\
         👤 <b>От:</b> {}\n\
         🆔 <b>ID:</b> <code>{}</code>\n\n\
         📝 <b>Сообщение:</b>\n{}\n\n\
         💡 <i>Ответьте на это сообщение (Reply), чтобы отправить ответ пользователю</i>",
        user_info,
        user_id,
        html::escape(text)
    );

    let mut delivered = 0;
    for admin in &state.config.admin_ids {
        match bot
            .send_message(ChatId(*admin), relay.as_str())
            .parse_mode(ParseMode::Html)
            .await
        {
            Ok(sent) => {
                state.sessions.remember_relay(*admin, sent.id.0, user_id).await;
                delivered += 1;
            }
            Err(e) => tracing::error!("Relay to admin {} failed: {}", admin, e),
        }
    }

    if delivered == 0 {
        bot.send_message(
            msg.chat.id,
            "❌ Произошла ошибка при отправке сообщения.\n\
             Попробуйте позже или обратитесь через главное меню.",
        )
        .await?;
        return Ok(());
    }

    bot.send_message(
        msg.chat.id,
        "✅ <b>Сообщение отправлено консультанту!</b>\n\n\
         Она получила ваш вопрос и ответит в ближайшее время.\n\
         Ответ придет вам в этот чат.",
    )
    .parse_mode(ParseMode::Html)
    .reply_markup(keyboards::back_to_main())
    .await?;

    let action = format!("sent_to_consultant: {}", truncate_chars(text, 50));
    if let Err(e) = state.db.log_user_action(user_id, &action, None).await {
        tracing::warn!("Failed to log relay for {}: {}", user_id, e);
    }
    Ok(())
}

/// Deliver an admin's reply to the user behind a relayed message.
pub async fn deliver_consultant_reply(
    bot: &Bot,
    state: &Arc<AppState>,
    msg: &Message,
    target: i64,
    text: &str,
) -> HandlerResult {
    if text.is_empty() {
        bot.send_message(msg.chat.id, "❌ Пустой ответ не может быть отправлен.")
            .await?;
        return Ok(());
    }

    let reply = format!("💬 <b>Ответ от Наталии:</b>\n\n{}", html::escape(text));
    match bot
        .send_message(ChatId(target), reply)
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboards::after_consultant_reply())
        .await
    {
        Ok(_) => {
            bot.send_message(msg.chat.id, "✅ Ответ отправлен пользователю!")
                .await?;
            state.sessions.forget_relays_for(target).await;
            let action = format!("received_consultant_reply: {}", truncate_chars(text, 50));
            if let Err(e) = state.db.log_user_action(target, &action, None).await {
                tracing::warn!("Failed to log reply for {}: {}", target, e);
            }
        }
        Err(e) => {
            tracing::error!("Reply to user {} failed: {}", target, e);
            bot.send_message(
                msg.chat.id,
                format!("❌ Ошибка отправки ответа пользователю {}", target),
            )
            .await?;
        }
    }
    Ok(())
}

/// Copy any admin message straight to a chosen user.
pub async fn send_direct_reply(
    bot: &Bot,
    state: &Arc<AppState>,
    msg: &Message,
    admin_id: i64,
    target: i64,
) -> HandlerResult {
    state.sessions.set_mode(admin_id, UserMode::Idle).await;
    match bot.copy_message(ChatId(target), msg.chat.id, msg.id).await {
        Ok(_) => {
            bot.send_message(
                msg.chat.id,
                format!("✅ Сообщение отправлено пользователю {}.", target),
            )
            .await?;
        }
        Err(e) => {
            tracing::error!("Direct reply to {} failed: {}", target, e);
            bot.send_message(msg.chat.id, format!("❌ Не удалось отправить сообщение: {}", e))
                .await?;
        }
    }
    Ok(())
}

// ── Broadcast ──────────────────────────────────────────────────────

/// Keep the admin's message as the broadcast draft and ask to confirm.
pub async fn stage_broadcast(
    bot: &Bot,
    state: &Arc<AppState>,
    msg: &Message,
    admin_id: i64,
) -> HandlerResult {
    let audience = state.db.all_user_ids().await?.len();
    state
        .sessions
        .set_mode(
            admin_id,
            UserMode::ConfirmBroadcast {
                from_chat: msg.chat.id.0,
                message_id: msg.id.0,
            },
        )
        .await;

    bot.send_message(
        msg.chat.id,
        format!(
            "📬 Вы собираетесь отправить это сообщение {} пользователям.\n\nПодтвердите отправку:",
            audience
        ),
    )
    .reply_markup(keyboards::broadcast_confirm())
    .await?;
    Ok(())
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    pub sent: usize,
    pub failed: usize,
}

impl BroadcastReport {
    pub fn summary(&self) -> String {
        format!(
            "✅ Рассылка завершена!\n📬 Отправлено: {}\n❌ Ошибок: {}",
            self.sent, self.failed
        )
    }
}

pub fn progress_text(done: usize, total: usize) -> String {
    format!("📤 Рассылка... ({} из {})", done, total)
}

/// Copy the draft to every active user, editing a progress message as it
/// goes. Individual delivery failures are counted, not fatal.
pub async fn run_broadcast(
    bot: Bot,
    db: Database,
    admin_chat: ChatId,
    from_chat: ChatId,
    message_id: MessageId,
) -> anyhow::Result<BroadcastReport> {
    let recipients = db.all_user_ids().await?;
    let total = recipients.len();
    let progress = bot
        .send_message(admin_chat, progress_text(0, total))
        .await?;

    let mut report = BroadcastReport::default();
    for (i, user_id) in recipients.into_iter().enumerate() {
        if i > 0 && i % PROGRESS_EVERY == 0 {
            if let Err(e) = bot
                .edit_message_text(admin_chat, progress.id, progress_text(i, total))
                .await
            {
                tracing::debug!("Progress update failed: {}", e);
            }
        }
        match bot.copy_message(ChatId(user_id), from_chat, message_id).await {
            Ok(_) => report.sent += 1,
            Err(e) => {
                tracing::warn!("Broadcast to {} failed: {}", user_id, e);
                report.failed += 1;
            }
        }
    }

    bot.edit_message_text(admin_chat, progress.id, report.summary())
        .await?;
    tracing::info!(
        "Broadcast finished: sent={} failed={}",
        report.sent,
        report.failed
    );
    Ok(report)
}

// ── Panel ──────────────────────────────────────────────────────────

pub async fn stats_text(state: &AppState) -> anyhow::Result<String> {
    let total = state.db.count_users().await?;
    let active = state.db.active_users(24).await?.len();
    let conversations = state.conversations.stats().await;
    let mut text = format!(
        "📊 <b>Статистика</b>\n\n\
         👥 Всего пользователей: <b>{}</b>\n\
         🕒 Активны за 24 часа: <b>{}</b>\n\
         💬 Разговоров в памяти: <b>{}</b>",
        total, active, conversations.total_conversations
    );
    if let Some(cache) = state.responder.cache_stats().await {
        text.push_str(&format!(
            "\n🧠 Кэш ответов: <b>{}/{}</b>",
            cache.size, cache.max_size
        ));
    }
    Ok(text)
}

/// Recent users as (id, button label).
pub async fn user_choices(db: &Database, limit: i64) -> anyhow::Result<Vec<(i64, String)>> {
    Ok(db
        .recent_users(limit)
        .await?
        .into_iter()
        .map(|u| {
            let label = match (u.username, u.full_name) {
                (Some(username), _) => format!("@{}", username),
                (None, Some(name)) if !name.is_empty() => name,
                _ => format!("Пользователь {}", u.user_id),
            };
            (u.user_id, label)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_summary_counts() {
        let report = BroadcastReport { sent: 8, failed: 2 };
        assert_eq!(
            report.summary(),
            "✅ Рассылка завершена!\n📬 Отправлено: 8\n❌ Ошибок: 2"
        );
        assert_eq!(progress_text(10, 25), "📤 Рассылка... (10 из 25)");
    }

    #[tokio::test]
    async fn user_choices_prefer_username() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.run_migrations().await.unwrap();
        db.upsert_user(1, Some("anna"), Some("Anna")).await.unwrap();
        db.upsert_user(2, None, Some("Boris")).await.unwrap();
        db.upsert_user(3, None, None).await.unwrap();

        let mut choices = user_choices(&db, 10).await.unwrap();
        choices.sort();
        assert_eq!(
            choices,
            vec![
                (1, "@anna".to_string()),
                (2, "Boris".to_string()),
                (3, "Пользователь 3".to_string()),
            ]
        );
    }
}
