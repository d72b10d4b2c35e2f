//! # Sparse K-nearest-neighbour diffusion operators
//!
//! For each row only the K strongest affinities are kept and L1-normalised,
//! so the operator carries the most confident local edges and discards the
//! tail. Stored as CSR with exactly `N * K` entries (explicit zeros allowed).
//!
//! **Key properties:**
//! 1. Selection is a partition (`select_nth_unstable_by`), not a full sort;
//!    ties are broken by column index so the result is deterministic
//! 2. Rows whose selected weights sum to zero are divided by 1 and stay zero
//! 3. Products with dense matrices never densify the sparse factor:
//!    `S · X` and `X · Sᵀ` are both `O(N × K × N)`

use smartcore::linalg::basic::matrix::DenseMatrix;
use sprs::CsMat;

use log::{debug, info, trace};
use rayon::prelude::*;

use crate::error::{FusionError, FusionResult};
use crate::matrix::{check_square, from_row_major, to_row_major};

/// Row-normalised K-nearest-neighbour operator.
#[derive(Clone, Debug)]
pub struct SparseOperator {
    pub matrix: CsMat<f64>,
    pub k: usize,
}

/// Indices of the `k` largest entries of `row`, ascending by column.
fn top_k_columns(row: &[f64], k: usize) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..row.len()).collect();
    if k < row.len() {
        idx.select_nth_unstable_by(k - 1, |&a, &b| {
            row[b]
                .partial_cmp(&row[a])
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.cmp(&b))
        });
        idx.truncate(k);
    }
    idx.sort_unstable();
    idx
}

/// Build the sparse operator `S` from an affinity matrix.
///
/// # Errors
///
/// * `ShapeMismatch` if `w` is not square
/// * `InvalidParameter` if `k == 0` or `k > N`
pub fn to_sparse_operator(w: &DenseMatrix<f64>, k: usize) -> FusionResult<SparseOperator> {
    let n = check_square(w)?;
    if k == 0 || k > n {
        return Err(FusionError::invalid_parameter(format!(
            "k must be in [1, {}], got {}",
            n, k
        )));
    }
    info!("Building sparse {}-NN operator for {} items", k, n);
    let data = to_row_major(w);

    let rows: Vec<(Vec<usize>, Vec<f64>)> = data
        .par_chunks(n)
        .map(|row| {
            let cols = top_k_columns(row, k);
            let mut vals: Vec<f64> = cols.iter().map(|&j| row[j]).collect();
            let mut norm: f64 = vals.iter().sum();
            if norm == 0.0 {
                norm = 1.0;
            }
            vals.iter_mut().for_each(|v| *v /= norm);
            (cols, vals)
        })
        .collect();

    let mut indptr = Vec::with_capacity(n + 1);
    let mut indices = Vec::with_capacity(n * k);
    let mut values = Vec::with_capacity(n * k);
    indptr.push(0);
    for (cols, vals) in rows {
        indices.extend(cols);
        values.extend(vals);
        indptr.push(indices.len());
    }

    let matrix = CsMat::new((n, n), indptr, indices, values);
    debug!(
        "Sparse operator: {} stored entries ({} per row)",
        matrix.nnz(),
        k
    );
    Ok(SparseOperator { matrix, k })
}

impl SparseOperator {
    /// Number of rows (and columns).
    pub fn nnodes(&self) -> usize {
        self.matrix.rows()
    }

    /// Number of stored entries, always `N * K`.
    pub fn nnz(&self) -> usize {
        self.matrix.nnz()
    }

    /// Stored entries as `(row, col, value)` triples in row order.
    pub fn triplets(&self) -> Vec<(usize, usize, f64)> {
        self.matrix
            .outer_iterator()
            .enumerate()
            .flat_map(|(i, row)| {
                row.iter()
                    .map(|(j, &v)| (i, j, v))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Sum of the stored values of every row.
    pub fn row_sums(&self) -> Vec<f64> {
        self.matrix
            .outer_iterator()
            .map(|row| row.iter().map(|(_, &v)| v).sum())
            .collect()
    }

    /// `S · X` for a row-major N×N buffer `x`.
    pub fn mul_dense(&self, x: &[f64]) -> Vec<f64> {
        let n = self.nnodes();
        assert_eq!(x.len(), n * n, "dense operand must be {}x{}", n, n);
        let mut out = vec![0.0f64; n * n];
        for (i, row) in self.matrix.outer_iterator().enumerate() {
            let target = &mut out[i * n..(i + 1) * n];
            for (j, &s) in row.iter() {
                let source = &x[j * n..(j + 1) * n];
                target
                    .iter_mut()
                    .zip(source)
                    .for_each(|(t, &v)| *t += s * v);
            }
        }
        trace!("S·X computed for {} rows", n);
        out
    }

    /// `X · Sᵀ` for a row-major N×N buffer `x`.
    pub fn dense_mul_transpose(&self, x: &[f64]) -> Vec<f64> {
        let n = self.nnodes();
        assert_eq!(x.len(), n * n, "dense operand must be {}x{}", n, n);
        let mut out = vec![0.0f64; n * n];
        for (p, target) in out.chunks_mut(n).enumerate() {
            let xrow = &x[p * n..(p + 1) * n];
            for (q, srow) in self.matrix.outer_iterator().enumerate() {
                target[q] = srow.iter().map(|(j, &s)| xrow[j] * s).sum();
            }
        }
        trace!("X·Sᵀ computed for {} rows", n);
        out
    }

    /// Densify, for inspection and tests.
    pub fn to_dense(&self) -> DenseMatrix<f64> {
        let n = self.nnodes();
        let mut data = vec![0.0f64; n * n];
        for (i, j, v) in self.triplets() {
            data[i * n + j] = v;
        }
        from_row_major(data, n, n)
    }
}
