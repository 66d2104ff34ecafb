//! Custodian - Governance Risk Scoring for Open Source Dependencies
//!
//! Mines commit history and maintainer metadata to score the risk of
//! abandonment, single-maintainer burnout, and hostile takeover, and replays
//! that score over past months to show how governance health evolved.

pub mod cache;
pub mod cli;
pub mod collectors;
pub mod config;
pub mod error;
pub mod history;
pub mod replay;
pub mod scoring;
pub mod sentiment;

pub use error::{CustodianError, Result};
