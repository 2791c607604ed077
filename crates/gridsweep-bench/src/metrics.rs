use std::collections::BTreeMap;

use gridsweep_core::{
    AggregatedRow, Axis, ConfigKey, GridSweepError, ImprovementSample, MetricFraming,
    PairSelection, Result, RowFilter, VariantSelector,
};
use serde::Serialize;

// =============================================================================
// Pairing
// =============================================================================

/// Optimized-vs-baseline comparison for one sub-configuration.
///
/// A failed ratio only invalidates the groups this sample falls into.
#[derive(Debug)]
pub struct PairedSample {
    pub key: ConfigKey,
    pub ratio: Result<f64>,
}

impl PairedSample {
    pub fn sample(&self) -> Option<ImprovementSample> {
        self.ratio.as_ref().ok().map(|ratio| ImprovementSample {
            key: self.key.clone(),
            ratio: *ratio,
        })
    }
}

pub fn apply_filter(rows: &[AggregatedRow], filter: &RowFilter) -> Vec<AggregatedRow> {
    let kept: Vec<AggregatedRow> = rows
        .iter()
        .filter(|row| filter.keeps(&row.identity))
        .cloned()
        .collect();
    if kept.len() != rows.len() {
        tracing::info!("Filter dropped {} of {} rows", rows.len() - kept.len(), rows.len());
    }
    kept
}

/// One sample per sub-configuration present in `rows`, in key order.
pub fn pair_samples(
    rows: &[AggregatedRow],
    selection: &PairSelection,
    framing: MetricFraming,
) -> Vec<PairedSample> {
    let mut groups: BTreeMap<ConfigKey, Vec<&AggregatedRow>> = BTreeMap::new();
    for row in rows {
        groups.entry(row.identity.config_key()).or_default().push(row);
    }

    groups
        .into_iter()
        .map(|(key, group)| {
            let ratio = pair_ratio(&key, &group, selection, framing);
            if let Err(e) = &ratio {
                tracing::debug!(
                    "No ratio for node {} domain {}x{}: {}",
                    key.node_count,
                    key.domain_x,
                    key.domain_y,
                    e
                );
            }
            PairedSample { key, ratio }
        })
        .collect()
}

fn pair_ratio(
    key: &ConfigKey,
    group: &[&AggregatedRow],
    selection: &PairSelection,
    framing: MetricFraming,
) -> Result<f64> {
    let optimized = select(group, &selection.optimized, key)?;
    let baseline = select(group, &selection.baseline, key)?;
    let t_opt = positive("optimized time", optimized.representative_time)?;
    let t_base = positive("baseline time", baseline.representative_time)?;

    let ratio = match framing {
        MetricFraming::Runtime => t_opt / t_base,
        MetricFraming::Throughput => {
            let area = key.grid_area();
            let opt = positive("optimized throughput", area / t_opt)?;
            let base = positive("baseline throughput", area / t_base)?;
            opt / base
        }
    };
    positive("ratio", ratio)
}

/// First row matching the selector, trying its dimensionalities in order.
fn select<'a>(
    group: &[&'a AggregatedRow],
    selector: &VariantSelector,
    key: &ConfigKey,
) -> Result<&'a AggregatedRow> {
    selector
        .candidates()
        .find_map(|dim| {
            group
                .iter()
                .find(|row| {
                    row.identity.variant == selector.variant && row.identity.dimensionality == dim
                })
                .copied()
        })
        .ok_or_else(|| {
            GridSweepError::IncompletePair(format!(
                "no {} {} row for node {} domain {}x{}",
                selector.variant.label(),
                selector.preferred.label(),
                key.node_count,
                key.domain_x,
                key.domain_y
            ))
        })
}

fn positive(what: &str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(GridSweepError::InvalidMeasurement(format!("{} is {}", what, value)))
    }
}

// =============================================================================
// Grouped geometric means
// =============================================================================

/// Geometric mean of the improvement ratios, grouped by `axis`.
///
/// A group containing an invalid or incomplete sample maps to that error;
/// other groups are unaffected. A row without an `axis` value fails the call.
pub fn compute_geomean(
    rows: &[AggregatedRow],
    axis: Axis,
    selection: &PairSelection,
    framing: MetricFraming,
) -> Result<BTreeMap<u64, Result<f64>>> {
    let samples = pair_samples(rows, selection, framing);

    let mut groups: BTreeMap<u64, Result<Vec<f64>>> = BTreeMap::new();
    for sample in samples {
        let value = axis.value(&sample.key).ok_or_else(|| {
            GridSweepError::InvalidArgument(format!(
                "row for node {} has no {} value",
                sample.key.node_count,
                axis.label()
            ))
        })?;
        let group = groups.entry(value).or_insert_with(|| Ok(Vec::new()));
        match sample.ratio {
            Ok(ratio) => {
                if let Ok(ratios) = group {
                    ratios.push(ratio);
                }
            }
            Err(e) => {
                if group.is_ok() {
                    *group = Err(e);
                }
            }
        }
    }

    let means: BTreeMap<u64, Result<f64>> = groups
        .into_iter()
        .filter_map(|(value, ratios)| match ratios {
            Ok(ratios) => geometric_mean(&ratios).map(|g| (value, Ok(g))),
            Err(e) => Some((value, Err(e))),
        })
        .collect();

    let failed = means.values().filter(|m| m.is_err()).count();
    tracing::info!(
        "Computed {} {} groups ({} failed, {})",
        means.len(),
        axis.label(),
        failed,
        framing.label()
    );
    Ok(means)
}

/// `exp(mean(ln x))`; `None` for an empty slice.
pub fn geometric_mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let log_sum: f64 = values.iter().map(|v| v.ln()).sum();
    Some((log_sum / values.len() as f64).exp())
}

// =============================================================================
// Summary
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImprovementSummary {
    pub count: usize,
    pub geomean: f64,
    pub min: f64,
    pub max: f64,
}

pub fn summarize(samples: &[ImprovementSample]) -> Option<ImprovementSummary> {
    let ratios: Vec<f64> = samples.iter().map(|s| s.ratio).collect();
    let geomean = geometric_mean(&ratios)?;
    Some(ImprovementSummary {
        count: ratios.len(),
        geomean,
        min: ratios.iter().copied().fold(f64::INFINITY, f64::min),
        max: ratios.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    })
}

/// Percentage change expressed by a ratio: 1.25 → 25.
pub fn improvement_percent(ratio: f64) -> f64 {
    (ratio - 1.0) * 100.0
}

/// [`improvement_percent`] signed so that positive always means the optimized
/// variant did better: runtime ratios below 1 become gains.
pub fn framed_improvement_percent(ratio: f64, framing: MetricFraming) -> f64 {
    match framing {
        MetricFraming::Throughput => improvement_percent(ratio),
        MetricFraming::Runtime => -improvement_percent(ratio),
    }
}
