//! Core library for a kanban board stored as a folder of lane directories,
//! each holding one markdown file per card.

pub mod board;
pub mod config;
pub mod parser;
pub mod refresh;
pub mod search;
pub mod service;
pub mod storage;
pub mod store;
pub mod tag_color;
pub mod types;
pub mod watcher;
