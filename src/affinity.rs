//! # Locally scaled Gaussian affinities from pairwise distances
//!
//! ## Algorithm Overview
//!
//! 1. **Symmetrisation**: `Dsym = 0.5 (D + Dᵀ)` with a zeroed diagonal
//! 2. **Local scale**: for every item, the mean of its K+1 smallest distances
//!    (the zero self-distance included), rescaled by (K+1)/K so the diagonal
//!    does not drag the mean down
//! 3. **Pairwise bandwidth**: `eps_ij = (scale_i + scale_j + Dsym_ij) / 3`
//! 4. **Kernel**: `W_ij = exp(-Dsym_ij² / (2 (mu eps_ij)²))`, with the
//!    denominator replaced by 1 when it is exactly zero
//!
//! The result is symmetric with a unit diagonal and values in (0, 1].
//!
//! ## Complexity
//!
//! `O(N²)` time and memory; the per-row neighbour selection is a linear-time
//! partition rather than a sort.

use smartcore::linalg::basic::arrays::Array;
use smartcore::linalg::basic::matrix::DenseMatrix;

use log::{debug, info, trace};
use rayon::prelude::*;

use crate::error::{FusionError, FusionResult};
use crate::matrix::{check_square, from_row_major, MatrixStats};

/// Default kernel width multiplier.
pub const DEFAULT_MU: f64 = 0.5;

/// Validate the neighbour count against the number of items.
///
/// The affinity step inspects K+1 values per row, so `1 <= k` and `k + 1 <= n`.
pub fn check_neighbours(k: usize, n: usize) -> FusionResult<()> {
    if k == 0 {
        return Err(FusionError::invalid_parameter("k must be at least 1"));
    }
    if k >= n {
        return Err(FusionError::invalid_parameter(format!(
            "k must be smaller than the number of items: k={}, n={}",
            k, n
        )));
    }
    Ok(())
}

/// Symmetrised distances with a zero diagonal, row-major.
fn symmetric_distances(d: &DenseMatrix<f64>, n: usize) -> FusionResult<Vec<f64>> {
    let mut dsym = vec![0.0f64; n * n];
    for i in 0..n {
        for j in 0..n {
            let (a, b) = (*d.get((i, j)), *d.get((j, i)));
            if !a.is_finite() {
                return Err(FusionError::invalid_parameter(format!(
                    "distance at ({}, {}) is not finite: {}",
                    i, j, a
                )));
            }
            if i != j {
                dsym[i * n + j] = 0.5 * (a + b);
            }
        }
    }
    Ok(dsym)
}

/// Mean of the k+1 smallest entries of a row, rescaled by (k+1)/k.
fn local_scale(row: &[f64], k: usize) -> f64 {
    let mut buf = row.to_vec();
    buf.select_nth_unstable_by(k, |a, b| {
        a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal)
    });
    let mean = buf[..=k].iter().sum::<f64>() / (k + 1) as f64;
    mean * (k + 1) as f64 / k as f64
}

/// Build the locally scaled affinity matrix `W` for one feature.
///
/// # Parameters
///
/// * `d` - N×N distance matrix, not necessarily symmetric
/// * `k` - neighbour count for the local scale, `1 <= k < N`
/// * `mu` - kernel width multiplier, `mu > 0` (see [`DEFAULT_MU`])
///
/// # Errors
///
/// * `ShapeMismatch` if `d` is not square
/// * `InvalidParameter` if `k` or `mu` are out of range or `d` holds
///   non-finite values
///
/// # Examples
///
/// ```
/// use simfusion::affinity::build_affinity;
/// use smartcore::linalg::basic::arrays::Array;
/// use smartcore::linalg::basic::matrix::DenseMatrix;
///
/// let d = DenseMatrix::from_2d_vec(&vec![
///     vec![0.0, 1.0, 2.0],
///     vec![1.0, 0.0, 1.0],
///     vec![2.0, 1.0, 0.0],
/// ]).unwrap();
/// let w = build_affinity(&d, 1, 0.5).unwrap();
/// assert_eq!(*w.get((1, 1)), 1.0);
/// ```
pub fn build_affinity(d: &DenseMatrix<f64>, k: usize, mu: f64) -> FusionResult<DenseMatrix<f64>> {
    let n = check_square(d)?;
    check_neighbours(k, n)?;
    if !(mu.is_finite() && mu > 0.0) {
        return Err(FusionError::invalid_parameter(format!(
            "mu must be a positive finite number, got {}",
            mu
        )));
    }

    info!("Building affinity matrix for {} items (k={}, mu={})", n, k, mu);
    let dsym = symmetric_distances(d, n)?;

    let scales: Vec<f64> = dsym
        .par_chunks(n)
        .map(|row| local_scale(row, k))
        .collect();
    trace!("Local scales: {:?}", &scales[..n.min(8)]);

    let data: Vec<f64> = dsym
        .par_chunks(n)
        .enumerate()
        .flat_map_iter(|(i, row)| {
            let scales = &scales;
            row.iter().enumerate().map(move |(j, &dij)| {
                let eps = (scales[i] + scales[j] + dij) / 3.0;
                let mut denom = 2.0 * (mu * eps).powi(2);
                if denom == 0.0 {
                    denom = 1.0;
                }
                (-dij * dij / denom).exp()
            })
        })
        .collect();

    let w = from_row_major(data, n, n);
    debug!("Affinity matrix: {}", MatrixStats::of(&w));
    Ok(w)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_scale_excludes_diagonal_weight() {
        // row with zero self-distance: the two smallest are 0 and 1
        let row = [0.0, 1.0, 3.0, 5.0];
        // mean(0, 1) * 2 / 1 = 1
        assert!((local_scale(&row, 1) - 1.0).abs() < 1e-12);
        // mean(0, 1, 3) * 3 / 2 = 2
        assert!((local_scale(&row, 2) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_check_neighbours_bounds() {
        assert!(check_neighbours(0, 4).is_err());
        assert!(check_neighbours(4, 4).is_err());
        assert!(check_neighbours(3, 4).is_ok());
    }
}
