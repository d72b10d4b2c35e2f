//! Dense diffusion operators: row-stochastic normalisation of affinities.
//!
//! - Plain: every row divided by its sum
//! - Diagonal-regularised: self-affinity pinned to 0.5, the other half of the
//!   mass spread over the off-diagonal entries proportionally to `W`
//! - Rows summing to exactly zero are divided by 1 and stay all-zero

use smartcore::linalg::basic::arrays::Array;
use smartcore::linalg::basic::matrix::DenseMatrix;

use log::{debug, trace, warn};

use crate::error::FusionResult;
use crate::matrix::{check_square, from_row_major, to_row_major};

/// Turn an affinity matrix into a row-stochastic transition matrix `P`.
///
/// With `diag_regularize = false` each row is divided by its sum.
/// With `diag_regularize = true` the diagonal of `W` is ignored,
/// `P[i][i] = 0.5` and `P[i][j] = 0.5 * W[i][j] / Σ_{j≠i} W[i][j]`.
///
/// # Errors
///
/// `ShapeMismatch` if `w` is not square.
pub fn to_dense_operator(
    w: &DenseMatrix<f64>,
    diag_regularize: bool,
) -> FusionResult<DenseMatrix<f64>> {
    let n = check_square(w)?;
    let mut data = to_row_major(w);

    if diag_regularize {
        for i in 0..n {
            data[i * n + i] = 0.0;
        }
    }

    let mut degenerate = 0usize;
    for (i, row) in data.chunks_mut(n).enumerate() {
        let mut sum: f64 = row.iter().sum();
        if sum == 0.0 {
            degenerate += 1;
            sum = 1.0;
        }
        let scale = if diag_regularize { 0.5 / sum } else { 1.0 / sum };
        row.iter_mut().for_each(|v| *v *= scale);
        if diag_regularize {
            row[i] = 0.5;
        }
    }

    if degenerate > 0 {
        warn!(
            "{} of {} rows have zero affinity and are left at zero",
            degenerate, n
        );
    }
    debug!(
        "Dense operator built for {} items (diag_regularize={})",
        n, diag_regularize
    );
    trace!("First row: {:?}", &data[..n.min(8)]);

    Ok(from_row_major(data, n, n))
}

/// True if every row sums to 1 within `tolerance`, all-zero rows excepted.
pub fn is_row_stochastic(p: &DenseMatrix<f64>, tolerance: f64) -> bool {
    let (r, c) = p.shape();
    (0..r).all(|i| {
        let row: Vec<f64> = (0..c).map(|j| *p.get((i, j))).collect();
        let sum: f64 = row.iter().sum();
        row.iter().all(|&v| v == 0.0) || (sum - 1.0).abs() <= tolerance
    })
}
