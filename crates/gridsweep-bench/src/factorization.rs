use gridsweep_core::{GridShape, GridSweepError, Result};

/// All `(f, total / f)` pairs for `f = 1, 2, 4, …` up to `total`.
///
/// Every power of two in range must divide `total`; a total that is not a
/// power of two is rejected rather than partially enumerated.
pub fn power_of_two_pairs(total: u32) -> Result<Vec<GridShape>> {
    if total == 0 {
        return Err(GridSweepError::InvalidArgument(
            "total GPU count must be at least 1".to_string(),
        ));
    }

    let mut pairs = Vec::new();
    let mut factor: u32 = 1;
    while factor <= total {
        if total % factor != 0 {
            return Err(GridSweepError::InvalidArgument(format!(
                "{} is not divisible by {}",
                total, factor
            )));
        }
        pairs.push(GridShape::new(factor, total / factor));
        factor = match factor.checked_mul(2) {
            Some(next) => next,
            None => break,
        };
    }
    Ok(pairs)
}

/// Grid shape whose `x / y` is closest to `target_ratio`, with `x·y == total`.
///
/// Ties go to the first pair in increasing-`x` order, which keeps generated
/// sweeps reproducible.
pub fn compute_best_factor_pair(target_ratio: f64, total: u32) -> Result<GridShape> {
    if !(target_ratio > 0.0) || !target_ratio.is_finite() {
        return Err(GridSweepError::InvalidArgument(format!(
            "target ratio must be positive and finite, got {}",
            target_ratio
        )));
    }

    let mut best: Option<(GridShape, f64)> = None;
    for pair in power_of_two_pairs(total)? {
        let diff = (pair.x as f64 / pair.y as f64 - target_ratio).abs();
        match best {
            Some((_, best_diff)) if diff >= best_diff => {}
            _ => best = Some((pair, diff)),
        }
    }

    best.map(|(pair, _)| pair).ok_or_else(|| {
        GridSweepError::InvalidArgument(format!("no factorization of {}", total))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_grid() {
        assert_eq!(compute_best_factor_pair(1.0, 16).unwrap(), GridShape::new(4, 4));
    }

    #[test]
    fn test_enumeration() {
        let pairs = power_of_two_pairs(8).unwrap();
        assert_eq!(
            pairs,
            vec![
                GridShape::new(1, 8),
                GridShape::new(2, 4),
                GridShape::new(4, 2),
                GridShape::new(8, 1)
            ]
        );
        assert_eq!(power_of_two_pairs(1).unwrap(), vec![GridShape::new(1, 1)]);
    }

    #[test]
    fn test_tall_domains_get_tall_grids() {
        // 8 GPUs, domain_y : domain_x = 4: 1/8 is closer to 1/4 than 1/2 is
        assert_eq!(compute_best_factor_pair(0.25, 8).unwrap(), GridShape::new(1, 8));
        assert_eq!(compute_best_factor_pair(1.0 / 512.0, 4).unwrap(), GridShape::new(1, 4));
        assert_eq!(compute_best_factor_pair(1.0, 8).unwrap(), GridShape::new(2, 4));
    }

    #[test]
    fn test_tie_goes_to_first_found() {
        // 16 GPUs: 2.5 is exactly 1.5 away from both 4x4 and 8x2
        assert_eq!(compute_best_factor_pair(2.5, 16).unwrap(), GridShape::new(4, 4));
    }

    #[test]
    fn test_invalid_arguments() {
        assert!(matches!(
            compute_best_factor_pair(0.0, 16),
            Err(GridSweepError::InvalidArgument(_))
        ));
        assert!(matches!(
            compute_best_factor_pair(-1.0, 16),
            Err(GridSweepError::InvalidArgument(_))
        ));
        assert!(matches!(
            compute_best_factor_pair(f64::NAN, 16),
            Err(GridSweepError::InvalidArgument(_))
        ));
        assert!(matches!(
            compute_best_factor_pair(1.0, 0),
            Err(GridSweepError::InvalidArgument(_))
        ));
        assert!(matches!(
            compute_best_factor_pair(1.0, 12),
            Err(GridSweepError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_matches_brute_force() {
        let ratios = [
            1.0 / 1024.0,
            1.0 / 300.0,
            1.0 / 7.0,
            0.3,
            0.5,
            0.75,
            1.0,
            1.5,
            3.0,
            10.0,
            100.0,
            5000.0,
        ];
        for exp in 0..=12 {
            let total = 1u32 << exp;
            for &ratio in &ratios {
                let chosen = compute_best_factor_pair(ratio, total).unwrap();
                assert!(chosen.x.is_power_of_two());
                assert!(chosen.x <= total);
                assert_eq!(chosen.area(), total as u64);

                let chosen_diff = (chosen.x as f64 / chosen.y as f64 - ratio).abs();
                for x in (0..=exp).map(|e| 1u32 << e) {
                    let y = total / x;
                    let diff = (x as f64 / y as f64 - ratio).abs();
                    assert!(
                        diff >= chosen_diff,
                        "({}, {}) beats ({}, {}) for ratio {}",
                        x,
                        y,
                        chosen.x,
                        chosen.y,
                        ratio
                    );
                }
            }
        }
    }
}
