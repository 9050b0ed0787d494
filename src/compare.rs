//
// compare.rs
// Seg-Audit
//
// Compares one metric between two models of a metric table with the hypothesis tests.
//
// Thales Matheus Mendonça Santos - November 2025

use std::collections::BTreeMap;
use std::fmt;

use anyhow::Result;
use tracing::{info, warn};

use crate::error::AuditError;
use crate::hypothesis::{
    mann_whitney_test, paired_ttest, shapiro_wilk_test, wilcoxon_test, NormalityResult, TestResult,
};
use crate::report::MetricRow;

/// Which paired test was chosen after the normality checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairedTest {
    TTest,
    Wilcoxon,
}

impl PairedTest {
    pub fn name(self) -> &'static str {
        match self {
            PairedTest::TTest => "paired t-test",
            PairedTest::Wilcoxon => "Wilcoxon signed-rank test",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub metric: String,
    pub baseline: String,
    pub candidate: String,
    pub region: Option<String>,
    /// Number of (subject, region) pairs present for both models.
    pub pairs: usize,
    pub baseline_normality: Option<NormalityResult>,
    pub candidate_normality: Option<NormalityResult>,
    pub paired_test: PairedTest,
    pub paired: TestResult,
    pub unpaired: TestResult,
}

fn model_values<'a>(
    rows: &'a [MetricRow],
    model: &str,
    metric: &str,
    region: Option<&str>,
) -> BTreeMap<(&'a str, &'a str), f64> {
    rows.iter()
        .filter(|row| row.model == model)
        .filter(|row| region.map_or(true, |r| row.region.eq_ignore_ascii_case(r)))
        .filter_map(|row| {
            row.value(metric)
                .map(|v| ((row.id.as_str(), row.region.as_str()), v))
        })
        .collect()
}

fn normality(values: &[f64]) -> Option<NormalityResult> {
    let finite = values.iter().filter(|v| !v.is_nan()).count();
    if finite < 3 {
        return None;
    }
    match shapiro_wilk_test(values) {
        Ok(result) => Some(result),
        Err(e) => {
            warn!("Normality check skipped: {e}");
            None
        }
    }
}

/// Runs the paired and unpaired comparison of `metric` between `baseline` and `candidate`.
pub fn compare_models(
    rows: &[MetricRow],
    metric: &str,
    baseline: &str,
    candidate: &str,
    region: Option<&str>,
) -> Result<Comparison> {
    if !rows.iter().any(|row| row.values.contains_key(metric)) {
        return Err(AuditError::Invalid(format!("metric column {metric} not found")).into());
    }
    for model in [baseline, candidate] {
        if !rows.iter().any(|row| row.model == model) {
            return Err(AuditError::Invalid(format!("model {model} not found")).into());
        }
    }

    let baseline_values = model_values(rows, baseline, metric, region);
    let candidate_values = model_values(rows, candidate, metric, region);

    let (paired_baseline, paired_candidate): (Vec<f64>, Vec<f64>) = baseline_values
        .iter()
        .filter_map(|(key, &b)| candidate_values.get(key).map(|&c| (b, c)))
        .unzip();
    info!(
        "Comparing {metric}: {} {baseline} rows, {} {candidate} rows, {} pairs",
        baseline_values.len(),
        candidate_values.len(),
        paired_baseline.len()
    );

    let baseline_normality = normality(&paired_baseline);
    let candidate_normality = normality(&paired_candidate);
    let both_normal = matches!(
        (&baseline_normality, &candidate_normality),
        (Some(b), Some(c)) if b.normally_distributed && c.normally_distributed
    );

    let (paired_test, paired) = if both_normal {
        (PairedTest::TTest, paired_ttest(&paired_baseline, &paired_candidate)?)
    } else {
        (PairedTest::Wilcoxon, wilcoxon_test(&paired_baseline, &paired_candidate)?)
    };

    let all_baseline: Vec<f64> = baseline_values.values().copied().collect();
    let all_candidate: Vec<f64> = candidate_values.values().copied().collect();
    let unpaired = mann_whitney_test(&all_baseline, &all_candidate)?;

    Ok(Comparison {
        metric: metric.to_string(),
        baseline: baseline.to_string(),
        candidate: candidate.to_string(),
        region: region.map(str::to_owned),
        pairs: paired_baseline.len(),
        baseline_normality,
        candidate_normality,
        paired_test,
        paired,
        unpaired,
    })
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Metric {} | {} vs {} | region: {} | pairs: {}",
            self.metric,
            self.baseline,
            self.candidate,
            self.region.as_deref().unwrap_or("all"),
            self.pairs
        )?;
        for (model, result) in [
            (&self.baseline, &self.baseline_normality),
            (&self.candidate, &self.candidate_normality),
        ] {
            match result {
                Some(r) => writeln!(
                    f,
                    "  Shapiro-Wilk ({model}): W = {:.4}, p = {:.4}",
                    r.statistic, r.p_value
                )?,
                None => writeln!(f, "  Shapiro-Wilk ({model}): not enough values")?,
            }
        }
        writeln!(
            f,
            "  {}: p = {:.4} ({})",
            self.paired_test.name(),
            self.paired.p_value,
            self.paired.decision
        )?;
        writeln!(f, "    {}", self.paired.interpretation)?;
        writeln!(
            f,
            "  Mann-Whitney U test: p = {:.4} ({})",
            self.unpaired.p_value, self.unpaired.decision
        )
    }
}
