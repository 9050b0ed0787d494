//
// lib.rs
// Seg-Audit
//
// Exposes the crate's modules and re-exports the CLI entry point for both binary and library consumers.
//
// Thales Matheus Mendonça Santos - November 2025

// Volume access and label handling.
pub mod dicom_access;
pub mod labels;
pub mod sequences;
pub mod spacing;
pub mod volume;

// Segmentation metrics.
pub mod error_matrix;
pub mod improvement;
pub mod one_hot;
pub mod segmentation_metrics;

// Feature extractors.
pub mod spatial;
pub mod statistical;
pub mod texture;
pub mod tumor;

pub mod hypothesis;

// Pipelines and shared plumbing.
pub mod cli;
pub mod compare;
pub mod config;
pub mod error;
pub mod feature_extractor;
pub mod logging;
pub mod metric_extractor;
pub mod models;
pub mod report;

pub use cli::{run as run_cli, Cli, Commands};
pub use error::{AuditError, AuditResult};
