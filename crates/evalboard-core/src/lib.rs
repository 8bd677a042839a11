//! # evalboard core
//!
//! Storage-agnostic logic for evalboard: feedback data models, the
//! confidence-weighted review scorer, and the [`store::FeedbackStore`]
//! abstraction with an in-memory backend.
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem I/O. The
//! `evalboard` crate layers SQLite persistence, the HTTP API, and the CLI
//! on top of it.

pub mod models;
pub mod reviews;
pub mod store;
