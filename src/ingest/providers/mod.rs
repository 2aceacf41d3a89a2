// src/ingest/providers/mod.rs
pub mod run_news;
