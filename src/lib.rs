//! dayfeed: a personal RSS reader.
//!
//! Subscriptions are fetched concurrently and merged into one newest-first
//! board of recent articles. A language model writes article summaries,
//! free-text analyses and a daily briefing over the top stories. The same
//! [`app::App`] backs the CLI and the JSON HTTP API in [`web`].

pub mod app;
pub mod config;
pub mod content;
pub mod feed;
pub mod insight;
pub mod llm;
pub mod storage;
pub mod ui;
pub mod util;
pub mod web;
