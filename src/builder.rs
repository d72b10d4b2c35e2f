use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;

use log::{debug, info, trace};

use crate::affinity::{build_affinity, check_neighbours, DEFAULT_MU};
use crate::diffusion::{CrossDiffusion, DiffusionParams};
use crate::error::{FusionError, FusionResult};
use crate::matrix::{check_same_square, symmetrize, zero_pad};
use crate::operators::to_dense_operator;
use crate::sparsification::{to_sparse_operator, SparseOperator};

/// How the neighbour count K is chosen.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum KSelection {
    Fixed(usize),
    /// `round(2 log2 N)`, clamped to `[1, N - 1]`.
    Auto,
}

impl Default for KSelection {
    fn default() -> Self {
        KSelection::Fixed(5)
    }
}

impl KSelection {
    /// Resolve to a concrete K for `n` items.
    pub fn resolve(&self, n: usize) -> usize {
        match *self {
            KSelection::Fixed(k) => k,
            KSelection::Auto => {
                let k = (2.0 * (n.max(1) as f64).log2()).round() as usize;
                k.clamp(1, n.saturating_sub(1).max(1))
            }
        }
    }
}

/// Full configuration of a fusion run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FusionParams {
    pub k: KSelection,
    pub mu: f64,
    pub diffusion: DiffusionParams,
    /// Symmetrise the fused output as `0.5 (F + Fᵀ)`.
    pub symmetrize: bool,
    /// Zero-pad inputs smaller than `2K` up to `2K × 2K`.
    pub pad_small: bool,
}

impl Default for FusionParams {
    fn default() -> Self {
        Self {
            k: KSelection::default(),
            mu: DEFAULT_MU,
            diffusion: DiffusionParams::default(),
            symmetrize: false,
            pad_small: false,
        }
    }
}

impl PartialEq for FusionParams {
    fn eq(&self, other: &Self) -> bool {
        self.k == other.k
            && approx::relative_eq!(self.mu, other.mu)
            && self.diffusion == other.diffusion
            && self.symmetrize == other.symmetrize
            && self.pad_small == other.pad_small
    }
}

/// Result of a fusion run.
#[derive(Clone, Debug)]
pub struct FusionOutput {
    /// Per-feature affinity matrices, in input order.
    pub affinities: Vec<DenseMatrix<f64>>,
    /// Consensus similarity matrix.
    pub fused: DenseMatrix<f64>,
    /// Neighbour count actually used.
    pub k: usize,
}

#[derive(Clone, Debug, Default)]
pub struct FusionBuilder {
    params: FusionParams,
}

impl FusionBuilder {
    pub fn new() -> Self {
        info!("Initializing new FusionBuilder");
        Self::default()
    }

    pub fn with_params(mut self, params: FusionParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_neighbours(mut self, k: KSelection) -> Self {
        info!("Setting neighbour selection: {:?}", k);
        self.params.k = k;
        self
    }

    pub fn with_iterations(mut self, niters: usize) -> Self {
        info!("Setting iterations: {}", niters);
        self.params.diffusion.niters = niters;
        self
    }

    /// Kernel width multiplier for the affinity step.
    pub fn with_mu(mut self, mu: f64) -> Self {
        info!("Setting mu: {}", mu);
        self.params.mu = mu;
        self
    }

    pub fn with_regularisation(mut self, reg_diag: f64, reg_neighbs: f64) -> Self {
        info!(
            "Setting regularisation: reg_diag={}, reg_neighbs={}",
            reg_diag, reg_neighbs
        );
        self.params.diffusion.reg_diag = reg_diag;
        self.params.diffusion.reg_neighbs = reg_neighbs;
        self
    }

    /// Disable for item sets with no meaningful ordering.
    pub fn with_sequential_prior(mut self, enabled: bool) -> Self {
        info!("Setting sequential prior: {}", enabled);
        self.params.diffusion.sequential_prior = enabled;
        self
    }

    pub fn with_symmetrize(mut self, symmetrize: bool) -> Self {
        info!("Setting output symmetrisation: {}", symmetrize);
        self.params.symmetrize = symmetrize;
        self
    }

    pub fn with_padding(mut self, pad_small: bool) -> Self {
        info!("Setting zero-padding of small inputs: {}", pad_small);
        self.params.pad_small = pad_small;
        self
    }

    pub fn params(&self) -> &FusionParams {
        &self.params
    }

    /// Fuse a set of distance matrices describing the same ordered items.
    ///
    /// Affinities are built per feature, then plain dense operators and sparse
    /// K-NN operators, then cross-diffusion runs on those.
    pub fn build(&self, distances: Vec<DenseMatrix<f64>>) -> FusionResult<FusionOutput> {
        if distances.len() < 2 {
            return Err(FusionError::insufficient_features(2, distances.len()));
        }
        let n = check_same_square(&distances)?;
        let k = self.params.k.resolve(n);
        info!(
            "Fusing {} distance matrices of {} items (k={})",
            distances.len(),
            n,
            k
        );

        let distances = if self.params.pad_small && n < 2 * k {
            distances
                .iter()
                .map(|d| zero_pad(d, 2 * k))
                .collect::<FusionResult<Vec<_>>>()?
        } else {
            distances
        };

        let affinities = distances
            .iter()
            .map(|d| build_affinity(d, k, self.params.mu))
            .collect::<FusionResult<Vec<_>>>()?;
        debug!("Built {} affinity matrices", affinities.len());

        let fused = self.fuse_affinities(&affinities, k)?;
        info!("Fusion completed");
        Ok(FusionOutput {
            affinities,
            fused,
            k,
        })
    }

    /// Fuse already built affinity matrices.
    pub fn build_from_affinities(
        &self,
        affinities: Vec<DenseMatrix<f64>>,
    ) -> FusionResult<FusionOutput> {
        let n = check_same_square(&affinities)?;
        let k = self.params.k.resolve(n);
        let fused = self.fuse_affinities(&affinities, k)?;
        Ok(FusionOutput {
            affinities,
            fused,
            k,
        })
    }

    fn fuse_affinities(&self, affinities: &[DenseMatrix<f64>], k: usize) -> FusionResult<DenseMatrix<f64>> {
        let n = check_same_square(affinities)?;
        check_neighbours(k, n)?;

        trace!("Building dense and sparse operators");
        let dense_ops = affinities
            .iter()
            .map(|w| to_dense_operator(w, false))
            .collect::<FusionResult<Vec<_>>>()?;
        let sparse_ops = affinities
            .iter()
            .map(|w| to_sparse_operator(w, k))
            .collect::<FusionResult<Vec<SparseOperator>>>()?;

        let engine = CrossDiffusion::new(self.params.diffusion.clone());
        let fused = engine.fuse(&dense_ops, &sparse_ops)?;

        if self.params.symmetrize {
            debug!("Symmetrising fused matrix");
            symmetrize(&fused)
        } else {
            Ok(fused)
        }
    }
}

/// Fuse distance matrices with a fixed K, default `mu` and the sequential
/// prior enabled. Returns the per-feature affinities and the fused matrix.
pub fn fuse_distances(
    distances: Vec<DenseMatrix<f64>>,
    k: usize,
    niters: usize,
    reg_diag: f64,
    reg_neighbs: f64,
) -> FusionResult<(Vec<DenseMatrix<f64>>, DenseMatrix<f64>)> {
    let out = FusionBuilder::new()
        .with_neighbours(KSelection::Fixed(k))
        .with_iterations(niters)
        .with_regularisation(reg_diag, reg_neighbs)
        .build(distances)?;
    Ok((out.affinities, out.fused))
}
