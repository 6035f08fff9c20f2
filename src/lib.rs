#![doc(hidden)]

//! Core library for contrib-rank
//!
//! This library discovers repositories matching a GitHub search query, collects
//! their contributors, enriches each contributor with profile statistics, and
//! produces a deduplicated, ranked report.
//!
//! # Module Organization
//!
//! - [`commands`]: Command-line interface and orchestration
//! - [`engine`]: Transport, caching, pagination, and aggregation
//! - [`reports`]: Report rendering

pub type Result<T, E = ohno::AppError> = core::result::Result<T, E>;

pub mod commands;
pub mod engine;
pub mod reports;

pub use crate::commands::run;
