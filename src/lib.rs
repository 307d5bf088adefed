pub mod agent;
pub mod ai;
pub mod api;
pub mod bot;
pub mod catalog;
pub mod config;
pub mod db;
pub mod nlp;
pub mod search;
