//! # chatlens-core
//!
//! Core library for chatlens - a question-answering layer over group chat
//! logs stored in SQLite.
//!
//! This library provides:
//! - Schema detection for the two supported log layouts
//! - Normalization of raw rows into canonical messages
//! - Context selection, statistics, and the fallback analyzer
//! - An optional Gemini-backed answer generator
//!
//! ## Architecture
//!
//! Data flows through one pipeline per question:
//! raw rows -> normalizer -> context window -> generator, with the
//! statistics-based analyzer answering whenever the generator is absent or
//! fails. Nothing derived is ever written back to the log; the backing file
//! is opened read-only.
//!
//! ## Example
//!
//! ```rust,no_run
//! use chatlens_core::{ChatLens, Config};
//!
//! // Load configuration
//! let config = Config::load().expect("failed to load config");
//!
//! // Open the log and answer a question
//! let lens = ChatLens::open(&config).expect("failed to open chat log");
//! let response = lens.ask("誰が一番話してる？", "recent").expect("ask failed");
//! println!("{}", response.answer);
//! ```

// Re-export commonly used items at the crate root
pub use ask::ChatLens;
pub use config::Config;
pub use db::{ChatLog, RawRow, RowOrder};
pub use error::{Error, Result};
pub use types::*;

// Public modules
pub mod analyze;
pub mod ask;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod generate;
pub mod logging;
pub mod normalize;
pub mod stats;
pub mod types;
