//! Client-side monitor for asynchronous document and report generation.
//!
//! [`orchestrator::GenerationMonitor`] starts a PDF job, polls it until it
//! settles and resolves a download link. [`report_run::ReportRunMonitor`]
//! does the same for the single regulatory report run.

pub mod artifact;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod graphql;
pub mod job;
pub mod notify;
pub mod orchestrator;
pub mod poll;
pub mod report_run;
pub mod ui;
