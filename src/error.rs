//
// error.rs
// Seg-Audit
//
// Typed failures shared by the configuration layer, the volume loaders and the statistical tests.
//
// Thales Matheus Mendonça Santos - November 2025

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced to callers as validation failures.
///
/// Numerically undefined results are never reported here; they travel as `f64::NAN`.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{test} requires at least {required} observations per sample, got {actual}")]
    SampleTooSmall {
        test: &'static str,
        required: usize,
        actual: usize,
    },

    #[error("{test} requires paired samples of equal length, got {left} and {right}")]
    UnpairedSamples {
        test: &'static str,
        left: usize,
        right: usize,
    },

    #[error("shape mismatch: {left:?} vs {right:?}")]
    ShapeMismatch { left: Vec<usize>, right: Vec<usize> },

    #[error("label lists must have the same length, got {original} and {replacement}")]
    LabelLengthMismatch { original: usize, replacement: usize },

    #[error("series must have the same length, got {left} and {right}")]
    LengthMismatch { left: usize, right: usize },

    #[error("not a directory: {0}")]
    MissingDirectory(PathBuf),

    #[error("unsupported volume format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("volume must be three-dimensional, got shape {0:?}")]
    NotVolumetric(Vec<usize>),

    #[error("{0}")]
    Invalid(String),
}

pub type AuditResult<T> = Result<T, AuditError>;
