pub mod admin;
pub mod callbacks;
pub mod commands;
pub mod formatting;
pub mod handlers;
pub mod keyboards;

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::dptree;
use teloxide::prelude::*;

use crate::agent::conversation::ConversationStore;
use crate::agent::session::SessionStore;
use crate::ai::responder::Responder;
use crate::config::AppConfig;
use crate::db::Database;
use crate::nlp::NlpProcessor;
use crate::search::SearchService;

pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;
pub type HandlerResult = Result<(), HandlerError>;

/// Shared application state, accessible from all handlers.
pub struct AppState {
    pub config: AppConfig,
    pub db: Database,
    pub search: SearchService,
    pub nlp: NlpProcessor,
    pub responder: Responder,
    pub conversations: ConversationStore,
    pub sessions: SessionStore,
}

/// Build the teloxide update handler tree.
pub fn build_handler() -> UpdateHandler<HandlerError> {
    let command_handler = Update::filter_message()
        .filter_command::<commands::BotCommand>()
        .endpoint(commands::handle_command);

    let callback_handler = Update::filter_callback_query().endpoint(callbacks::handle_callback);

    let message_handler = Update::filter_message().endpoint(handlers::handle_message);

    dptree::entry()
        .branch(command_handler)
        .branch(callback_handler)
        .branch(message_handler)
}
