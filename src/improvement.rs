use std::str::FromStr;

use crate::error::{AuditError, AuditResult};

/// Ways of comparing a final value against an initial one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Improvement {
    Relative,
    Absolute,
    Ratio,
}

impl Improvement {
    pub const ALL: [Improvement; 3] = [Improvement::Relative, Improvement::Absolute, Improvement::Ratio];

    pub fn name(self) -> &'static str {
        match self {
            Improvement::Relative => "relative",
            Improvement::Absolute => "absolute",
            Improvement::Ratio => "ratio",
        }
    }

    pub fn apply(self, init: f64, end: f64) -> f64 {
        match self {
            Improvement::Relative => relative_error(init, end),
            Improvement::Absolute => absolute_error(init, end),
            Improvement::Ratio => ratio_improvement(init, end),
        }
    }
}

impl FromStr for Improvement {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Improvement::ALL
            .into_iter()
            .find(|i| i.name() == s)
            .ok_or_else(|| AuditError::Invalid(format!("unknown improvement: {s}")))
    }
}

/// Percentage change from `init` to `end`.
pub fn relative_error(init: f64, end: f64) -> f64 {
    (end - init) / init * 100.0
}

pub fn absolute_error(init: f64, end: f64) -> f64 {
    end - init
}

pub fn ratio_improvement(init: f64, end: f64) -> f64 {
    end / init
}

/// Applies each requested comparison (all three by default) elementwise to paired series.
pub fn calculate_improvements(
    init: &[f64],
    end: &[f64],
    kinds: Option<&[Improvement]>,
) -> AuditResult<Vec<(Improvement, Vec<f64>)>> {
    if init.len() != end.len() {
        return Err(AuditError::LengthMismatch {
            left: init.len(),
            right: end.len(),
        });
    }
    let kinds = kinds.unwrap_or(&Improvement::ALL);
    Ok(kinds
        .iter()
        .map(|&kind| {
            let values = init
                .iter()
                .zip(end)
                .map(|(&a, &b)| kind.apply(a, b))
                .collect();
            (kind, values)
        })
        .collect())
}
