use std::collections::BTreeMap;

use gridsweep_core::{AggregatedRow, LogRecord, Reducer, RunIdentity};

/// An identity whose repetition count differs from the expected one.
#[derive(Debug, Clone, PartialEq)]
pub struct CountMismatch {
    pub identity: RunIdentity,
    pub expected: usize,
    pub found: usize,
}

#[derive(Debug, Default)]
pub struct Aggregation {
    pub rows: Vec<AggregatedRow>,
    pub mismatches: Vec<CountMismatch>,
}

/// Reduces repeated trials to one row per identity, sorted by identity.
///
/// The result does not depend on the order of `records`.
pub fn aggregate(
    records: &[LogRecord],
    reducer: Reducer,
    expected_repeat_count: usize,
) -> Aggregation {
    let mut groups: BTreeMap<&RunIdentity, Vec<f64>> = BTreeMap::new();
    for record in records {
        groups
            .entry(&record.identity)
            .or_default()
            .push(record.elapsed_seconds);
    }

    let mut aggregation = Aggregation::default();
    for (identity, mut times) in groups {
        if times.len() != expected_repeat_count {
            tracing::warn!(
                "{} repetitions for node {} domain {}x{} {} {} grid {}x{} (expected {})",
                times.len(),
                identity.node_count,
                identity.domain_x,
                identity.domain_y,
                identity.variant.label(),
                identity.dimensionality.label(),
                identity.grid_x,
                identity.grid_y,
                expected_repeat_count
            );
            aggregation.mismatches.push(CountMismatch {
                identity: identity.clone(),
                expected: expected_repeat_count,
                found: times.len(),
            });
        }

        aggregation.rows.push(AggregatedRow {
            identity: identity.clone(),
            representative_time: reduce(&mut times, reducer),
            sample_count: times.len(),
        });
    }

    tracing::info!(
        "Aggregated {} records into {} rows ({})",
        records.len(),
        aggregation.rows.len(),
        reducer.label()
    );
    aggregation
}

/// Median or mean of a non-empty sample. Sorts `times` in place, so the sum
/// behind the mean is taken in a fixed order.
pub fn reduce(times: &mut [f64], reducer: Reducer) -> f64 {
    let n = times.len();
    if n == 0 {
        return f64::NAN;
    }
    times.sort_by(f64::total_cmp);
    match reducer {
        Reducer::Mean => times.iter().sum::<f64>() / n as f64,
        Reducer::Median => {
            if n % 2 == 1 {
                times[n / 2]
            } else {
                (times[n / 2 - 1] + times[n / 2]) / 2.0
            }
        }
    }
}
