//! Live Common - Shared configuration, errors, and logging for the live-stream
//! analysis bot.
//!
//! This crate provides:
//! - Configuration types and loading (file + environment overrides)
//! - The shared error type
//! - Logging setup
//! - Formatting helpers used by reports and cards

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;
pub mod util;

pub use config::{
    AnalysisConfig, Config, DiagnosticConfig, FeishuConfig, ObservabilityConfig, Priority,
    RecommendationConfig, ScoringConfig, ServerConfig,
};
pub use error::{Error, Result};
