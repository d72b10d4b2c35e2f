//! Cross-diffusion of per-feature diffusion operators.
//!
//! Each feature `i` carries a dense state `P_i` (initially its row-stochastic
//! operator) and a fixed sparse K-NN operator `S_i`. One iteration replaces
//! every state with
//!
//! ```text
//! P_i ← S_i · mean_{k≠i}(P_k) · S_iᵀ + reg_diag · I + reg_neighbs · A_seq
//! ```
//!
//! where `A_seq` has ones on the first super- and sub-diagonal (the
//! sequential-adjacency prior, only applied when enabled). All features are
//! updated from the same frozen snapshot: states are double-buffered and the
//! buffers are swapped once per iteration. Per-feature updates run on rayon's
//! pool. The fused result is the mean of the final states.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;

use log::{debug, info, trace};
use rayon::prelude::*;

use crate::error::{FusionError, FusionResult};
use crate::matrix::{check_same_square, from_row_major, to_row_major, MatrixStats};
use crate::sparsification::SparseOperator;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffusionParams {
    /// Fixed number of iterations, no convergence check.
    pub niters: usize,
    /// Added to the diagonal after every projection (self-similarity boost).
    pub reg_diag: f64,
    /// Added to entries with `|p - q| == 1` when `sequential_prior` is on.
    pub reg_neighbs: f64,
    /// Items are ordered along a sequence axis (e.g. time frames).
    pub sequential_prior: bool,
}

impl Default for DiffusionParams {
    fn default() -> Self {
        Self {
            niters: 20,
            reg_diag: 1.0,
            reg_neighbs: 0.5,
            sequential_prior: true,
        }
    }
}

impl PartialEq for DiffusionParams {
    fn eq(&self, other: &Self) -> bool {
        self.niters == other.niters
            && approx::relative_eq!(self.reg_diag, other.reg_diag)
            && approx::relative_eq!(self.reg_neighbs, other.reg_neighbs)
            && self.sequential_prior == other.sequential_prior
    }
}

/// Cross-diffusion engine.
#[derive(Debug, Clone, Default)]
pub struct CrossDiffusion {
    pub params: DiffusionParams,
}

impl CrossDiffusion {
    pub fn new(params: DiffusionParams) -> Self {
        Self { params }
    }

    /// Run the fusion and return the mean of the final states.
    ///
    /// # Errors
    ///
    /// * `InsufficientFeatures` if fewer than two features are supplied
    /// * `InvalidParameter` if dense and sparse operator counts differ or a
    ///   regulariser is not finite
    /// * `ShapeMismatch` if operators disagree on N
    pub fn fuse(
        &self,
        dense_ops: &[DenseMatrix<f64>],
        sparse_ops: &[SparseOperator],
    ) -> FusionResult<DenseMatrix<f64>> {
        self.fuse_with_observer(dense_ops, sparse_ops, |_, _| {})
    }

    /// Same as [`CrossDiffusion::fuse`], calling `observer(iteration, states)`
    /// before every iteration and once more after the last one
    /// (`iteration == niters`). States are row-major N×N buffers.
    pub fn fuse_with_observer<F>(
        &self,
        dense_ops: &[DenseMatrix<f64>],
        sparse_ops: &[SparseOperator],
        mut observer: F,
    ) -> FusionResult<DenseMatrix<f64>>
    where
        F: FnMut(usize, &[Vec<f64>]),
    {
        let n = self.validate(dense_ops, sparse_ops)?;
        let m = dense_ops.len();
        let p = &self.params;

        info!(
            "Cross-diffusion of {} features over {} items for {} iterations",
            m, n, p.niters
        );
        debug!("Diffusion parameters: {:?}", p);

        let mut state: Vec<Vec<f64>> = dense_ops.iter().map(to_row_major).collect();
        let total = Instant::now();

        for it in 0..p.niters {
            observer(it, &state);
            let tic = Instant::now();

            let next: Vec<Vec<f64>> = (0..m)
                .into_par_iter()
                .map(|i| self.update_feature(i, &state, &sparse_ops[i], n))
                .collect();
            state = next;

            debug!(
                "Iteration {} of {}: {:.3?}",
                it + 1,
                p.niters,
                tic.elapsed()
            );
        }
        observer(p.niters, &state);

        let mut fused = vec![0.0f64; n * n];
        for s in &state {
            fused.iter_mut().zip(s).for_each(|(f, &v)| *f += v);
        }
        let scale = 1.0 / m as f64;
        fused.iter_mut().for_each(|v| *v *= scale);

        let fused = from_row_major(fused, n, n);
        info!("Cross-diffusion finished in {:.3?}", total.elapsed());
        debug!("Fused matrix: {}", MatrixStats::of(&fused));
        Ok(fused)
    }

    fn validate(
        &self,
        dense_ops: &[DenseMatrix<f64>],
        sparse_ops: &[SparseOperator],
    ) -> FusionResult<usize> {
        let m = dense_ops.len();
        if m < 2 {
            return Err(FusionError::insufficient_features(2, m));
        }
        if sparse_ops.len() != m {
            return Err(FusionError::invalid_parameter(format!(
                "{} dense operators but {} sparse operators",
                m,
                sparse_ops.len()
            )));
        }
        let n = check_same_square(dense_ops)?;
        for s in sparse_ops {
            let shape = s.matrix.shape();
            if shape != (n, n) {
                return Err(FusionError::shape_mismatch((n, n), shape));
            }
        }
        let p = &self.params;
        if !(p.reg_diag.is_finite() && p.reg_neighbs.is_finite()) {
            return Err(FusionError::invalid_parameter(
                "regularisation weights must be finite",
            ));
        }
        Ok(n)
    }

    /// One feature's update from the frozen snapshot `state`.
    fn update_feature(
        &self,
        i: usize,
        state: &[Vec<f64>],
        s: &SparseOperator,
        n: usize,
    ) -> Vec<f64> {
        let others = (state.len() - 1) as f64;
        let mut cross = vec![0.0f64; n * n];
        for (k, sk) in state.iter().enumerate() {
            if k == i {
                continue;
            }
            cross.iter_mut().zip(sk).for_each(|(c, &v)| *c += v);
        }
        cross.iter_mut().for_each(|v| *v /= others);

        let mut restricted = s.dense_mul_transpose(&s.mul_dense(&cross));

        let p = &self.params;
        if p.reg_diag > 0.0 {
            for d in 0..n {
                restricted[d * n + d] += p.reg_diag;
            }
        }
        if p.sequential_prior && p.reg_neighbs > 0.0 {
            for d in 0..n.saturating_sub(1) {
                restricted[d * n + d + 1] += p.reg_neighbs;
                restricted[(d + 1) * n + d] += p.reg_neighbs;
            }
        }
        trace!("Feature {} updated", i);
        restricted
    }
}
