// src/lib.rs

//! listwatch: keyword watch log for listing detail pages.
//!
//! Each run crawls the cataloged seed URLs, tests every discovered
//! detail page for the configured keyword, and reconciles the results
//! into a persisted row/column log: one row per tracked detail page,
//! one timestamped column per run.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
