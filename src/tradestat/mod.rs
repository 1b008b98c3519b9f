// src/tradestat/mod.rs
pub mod client;
pub mod models;

// Re-export the portal surface used by the rest of the crate
pub use client::{HttpReportSession, ReportSession};
pub use models::{Flow, Period, ReportQuery, SubmitOutcome};
