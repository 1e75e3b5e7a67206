//! Largest-remainder allocation
//!
//! Proportional apportionment of a total across weighted buckets.
//! Each bucket gets the floor of its proportional share, then the
//! buckets with the largest fractional remainders each receive one
//! extra unit until the total is reached. Ties break by original
//! index, so the result is deterministic and stable under repeated
//! application.

/// Round to 3 decimal places (the precision carried by override values).
#[inline]
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Allocate an integer `total` across buckets proportionally to `weights`.
///
/// - `total == 0` yields all zeros
/// - all-zero weights distribute the total evenly (floor-then-remainder
///   on index order)
/// - the result always sums to exactly `total`
pub fn allocate_integer(total: u32, weights: &[f64]) -> Vec<u32> {
    let n = weights.len();
    if n == 0 {
        return Vec::new();
    }
    if total == 0 {
        return vec![0; n];
    }

    let weight_sum: f64 = weights.iter().map(|w| w.max(0.0)).sum();
    let even = vec![1.0; n];
    let effective: &[f64] = if weight_sum > 0.0 { weights } else { &even };
    let effective_sum: f64 = if weight_sum > 0.0 {
        weight_sum
    } else {
        n as f64
    };

    let mut allocations = vec![0u32; n];
    let mut remainders: Vec<(usize, f64)> = Vec::with_capacity(n);
    let mut assigned: u32 = 0;

    for (i, w) in effective.iter().enumerate() {
        let share = total as f64 * w.max(0.0) / effective_sum;
        let floor = share.floor();
        allocations[i] = floor as u32;
        assigned += floor as u32;
        remainders.push((i, share - floor));
    }

    // Hand out the remaining units to the largest fractional remainders,
    // ties resolved by original index.
    let mut leftover = total.saturating_sub(assigned) as usize;
    remainders.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    for (index, _) in remainders {
        if leftover == 0 {
            break;
        }
        allocations[index] += 1;
        leftover -= 1;
    }

    allocations
}

/// Allocate a real `total` across buckets proportionally to `weights`,
/// rounding each share to 3 decimals and folding the residual drift
/// into the last bucket so the parts reconcile exactly.
pub fn allocate_fractional(total: f64, weights: &[f64]) -> Vec<f64> {
    let n = weights.len();
    if n == 0 {
        return Vec::new();
    }
    if total <= 0.0 {
        return vec![0.0; n];
    }

    let weight_sum: f64 = weights.iter().map(|w| w.max(0.0)).sum();
    let even = vec![1.0; n];
    let effective: &[f64] = if weight_sum > 0.0 { weights } else { &even };
    let effective_sum: f64 = if weight_sum > 0.0 {
        weight_sum
    } else {
        n as f64
    };

    let mut allocations: Vec<f64> = effective
        .iter()
        .map(|w| round3(total * w.max(0.0) / effective_sum))
        .collect();

    let head: f64 = allocations[..n - 1].iter().sum();
    allocations[n - 1] = round3(total - head);
    allocations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_allocation_sums_to_total() {
        for total in 0..=100u32 {
            let result = allocate_integer(total, &[70.0, 20.0, 10.0]);
            assert_eq!(result.iter().sum::<u32>(), total);
        }
    }

    #[test]
    fn integer_allocation_exact_proportions() {
        assert_eq!(allocate_integer(100, &[70.0, 20.0, 10.0]), vec![70, 20, 10]);
    }

    #[test]
    fn integer_allocation_largest_remainder_wins() {
        // Shares: 33.33.., 33.33.., 33.33.. -> floors 33 each, one unit
        // left over, first index takes it.
        assert_eq!(allocate_integer(100, &[1.0, 1.0, 1.0]), vec![34, 33, 33]);
    }

    #[test]
    fn integer_allocation_zero_total() {
        assert_eq!(allocate_integer(0, &[5.0, 5.0]), vec![0, 0]);
    }

    #[test]
    fn integer_allocation_zero_weights_distributes_evenly() {
        assert_eq!(allocate_integer(10, &[0.0, 0.0, 0.0]), vec![4, 3, 3]);
    }

    #[test]
    fn integer_allocation_single_bucket() {
        assert_eq!(allocate_integer(7, &[3.0]), vec![7]);
    }

    #[test]
    fn fractional_allocation_reconciles_exactly() {
        let parts = allocate_fractional(5.0, &[70.0, 20.0, 10.0]);
        let total: f64 = parts.iter().sum();
        assert!((total - 5.0).abs() < 1e-9);
        assert_eq!(parts, vec![3.5, 1.0, 0.5]);
    }

    #[test]
    fn fractional_allocation_folds_drift_into_last_bucket() {
        // 1/3 splits do not round cleanly at 3 decimals; the last bucket
        // absorbs the residual.
        let parts = allocate_fractional(1.0, &[1.0, 1.0, 1.0]);
        assert_eq!(parts[0], 0.333);
        assert_eq!(parts[1], 0.333);
        assert_eq!(parts[2], 0.334);
    }

    #[test]
    fn fractional_allocation_zero_total() {
        assert_eq!(allocate_fractional(0.0, &[1.0, 2.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn fractional_allocation_zero_weights() {
        let parts = allocate_fractional(6.0, &[0.0, 0.0, 0.0]);
        assert_eq!(parts, vec![2.0, 2.0, 2.0]);
    }

    #[test]
    fn round3_behaves() {
        assert_eq!(round3(0.33349), 0.333);
        assert_eq!(round3(0.3335), 0.334);
        assert_eq!(round3(14.0), 14.0);
    }
}
