pub mod conversation;
pub mod session;
