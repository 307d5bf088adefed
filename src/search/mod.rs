pub mod engine;
pub mod mentions;
pub mod service;
pub mod special;
pub mod synonyms;

pub use engine::{search_local, Relevance, SearchHit};
pub use service::SearchService;
