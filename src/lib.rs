//! # evalboard
//!
//! Feedback collection and confidence-weighted model reviews for a
//! self-hosted LLM chat gateway.
//!
//! Users give thumbs up / down on model responses; evalboard stores that
//! feedback in SQLite and ranks models by a smoothed, sample-size-aware
//! score so that a model with one lucky rating does not top the board.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  Chat UI /   │──▶│  HTTP API    │──▶│   SQLite     │
//! │  admin panel │   │  (axum)      │   │  feedback    │
//! └──────────────┘   └──────┬───────┘   └──────┬───────┘
//!                           │                  │
//!                           ▼                  ▼
//!                    ┌──────────────┐   ┌──────────────┐
//!                    │ ReviewScorer │◀──│  CLI         │
//!                    │  (core)      │   │ (evalboard)  │
//!                    └──────────────┘   └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! evalboard hash-token "s3cret"     # digest for [[auth.tokens]]
//! evalboard init                    # create database
//! evalboard serve                   # start HTTP server
//! evalboard reviews                 # print leaderboard
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`auth`] | Bearer token hashing and roles |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite feedback store |
//! | [`server`] | HTTP API |
//! | [`reviews`] | Leaderboard CLI |
//! | [`stats`] | Feedback statistics |
//! | [`export`] | JSON export and import |
//!
//! Data models, the review scorer, and the store trait live in the
//! `evalboard-core` crate and are re-exported as [`core`].

pub use evalboard_core as core;

pub mod auth;
pub mod config;
pub mod db;
pub mod export;
pub mod migrate;
pub mod reviews;
pub mod server;
pub mod sqlite_store;
pub mod stats;
