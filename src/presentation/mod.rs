//! Presentation layer rendering validation reports.

/// Report rendering.
pub mod report;

pub use report::{ReportFormat, render};
