//! Dense matrix helpers shared by the fusion stages.
//!
//! All stages exchange `DenseMatrix<f64>`; internally they work on flat
//! row-major buffers (`Vec<f64>` of length `nrows * ncols`) and convert at
//! the boundaries with [`to_row_major`] and [`from_row_major`].

use std::fmt;

use smartcore::linalg::basic::arrays::{Array, Array2};
use smartcore::linalg::basic::matrix::DenseMatrix;

use log::{debug, trace};

use crate::error::{FusionError, FusionResult};

/// Entries with magnitude below this are counted as zero in statistics.
pub const ZERO_TOL: f64 = 1e-15;

/// Return N if `m` is N×N, `ShapeMismatch` otherwise.
pub fn check_square(m: &DenseMatrix<f64>) -> FusionResult<usize> {
    let (r, c) = m.shape();
    if r != c {
        return Err(FusionError::shape_mismatch((r, r), (r, c)));
    }
    Ok(r)
}

/// Check that every matrix is square and shares the shape of the first one.
pub fn check_same_square(ms: &[DenseMatrix<f64>]) -> FusionResult<usize> {
    let first = match ms.first() {
        Some(m) => m,
        None => return Err(FusionError::invalid_parameter("no matrices supplied")),
    };
    let n = check_square(first)?;
    for m in ms.iter().skip(1) {
        let shape = m.shape();
        if shape != (n, n) {
            return Err(FusionError::shape_mismatch((n, n), shape));
        }
    }
    Ok(n)
}

/// Copy a dense matrix into a flat row-major buffer.
pub fn to_row_major(m: &DenseMatrix<f64>) -> Vec<f64> {
    let (r, c) = m.shape();
    let mut out = Vec::with_capacity(r * c);
    for i in 0..r {
        for j in 0..c {
            out.push(*m.get((i, j)));
        }
    }
    out
}

/// Build a dense matrix from a flat row-major buffer.
pub fn from_row_major(data: Vec<f64>, nrows: usize, ncols: usize) -> DenseMatrix<f64> {
    assert_eq!(
        data.len(),
        nrows * ncols,
        "buffer of length {} cannot hold a {}x{} matrix",
        data.len(),
        nrows,
        ncols
    );
    DenseMatrix::from_iterator(data.into_iter(), nrows, ncols, 0)
}

/// Sum of every row.
pub fn row_sums(m: &DenseMatrix<f64>) -> Vec<f64> {
    let (r, c) = m.shape();
    (0..r)
        .map(|i| (0..c).map(|j| *m.get((i, j))).sum())
        .collect()
}

/// Elementwise mean of equally shaped square matrices.
pub fn mean_of(ms: &[DenseMatrix<f64>]) -> FusionResult<DenseMatrix<f64>> {
    let n = check_same_square(ms)?;
    let mut acc = vec![0.0f64; n * n];
    for m in ms {
        for (slot, v) in acc.iter_mut().zip(to_row_major(m)) {
            *slot += v;
        }
    }
    let scale = 1.0 / ms.len() as f64;
    acc.iter_mut().for_each(|v| *v *= scale);
    trace!("Averaged {} matrices of size {}x{}", ms.len(), n, n);
    Ok(from_row_major(acc, n, n))
}

/// Return `0.5 * (M + Mᵀ)`.
pub fn symmetrize(m: &DenseMatrix<f64>) -> FusionResult<DenseMatrix<f64>> {
    let n = check_square(m)?;
    let data: Vec<f64> = (0..n)
        .flat_map(|i| (0..n).map(move |j| (i, j)))
        .map(|(i, j)| 0.5 * (m.get((i, j)) + m.get((j, i))))
        .collect();
    Ok(from_row_major(data, n, n))
}

/// Check if a square matrix is symmetric within tolerance.
pub fn is_symmetric(m: &DenseMatrix<f64>, tolerance: f64) -> bool {
    let (r, c) = m.shape();
    if r != c {
        return false;
    }
    let mut max_asymmetry: f64 = 0.0;
    for i in 0..r {
        for j in (i + 1)..r {
            max_asymmetry = max_asymmetry.max((m.get((i, j)) - m.get((j, i))).abs());
        }
    }
    trace!("Max asymmetry {:.2e} (tolerance {:.2e})", max_asymmetry, tolerance);
    max_asymmetry <= tolerance
}

/// Zero-pad a square matrix to `size`×`size`, keeping it in the top-left
/// corner. Matrices already at least `size` wide are returned unchanged.
pub fn zero_pad(m: &DenseMatrix<f64>, size: usize) -> FusionResult<DenseMatrix<f64>> {
    let n = check_square(m)?;
    if n >= size {
        return Ok(m.clone());
    }
    debug!("Zero-padding {}x{} matrix to {}x{}", n, n, size, size);
    let mut data = vec![0.0f64; size * size];
    for i in 0..n {
        for j in 0..n {
            data[i * size + j] = *m.get((i, j));
        }
    }
    Ok(from_row_major(data, size, size))
}

/// Summary statistics of a dense matrix, used for logging.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixStats {
    pub nrows: usize,
    pub ncols: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub nnz: usize,
}

impl MatrixStats {
    pub fn of(m: &DenseMatrix<f64>) -> Self {
        let (nrows, ncols) = m.shape();
        let data = to_row_major(m);
        let (min, max) = data
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let mean = if data.is_empty() {
            0.0
        } else {
            data.iter().sum::<f64>() / data.len() as f64
        };
        let nnz = data.iter().filter(|v| v.abs() > ZERO_TOL).count();
        Self {
            nrows,
            ncols,
            min,
            max,
            mean,
            nnz,
        }
    }

    /// Fraction of entries that are zero.
    pub fn sparsity(&self) -> f64 {
        let total = self.nrows * self.ncols;
        if total == 0 {
            return 0.0;
        }
        (total - self.nnz) as f64 / total as f64
    }
}

impl fmt::Display for MatrixStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} range [{:.6}, {:.6}], mean {:.6}, {} non-zeros ({:.2}% sparse)",
            self.nrows,
            self.ncols,
            self.min,
            self.max,
            self.mean,
            self.nnz,
            self.sparsity() * 100.0
        )
    }
}
