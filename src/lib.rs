//! # simfusion
//!
//! Similarity network fusion by cross-diffusion.
//!
//! Several N×N distance matrices describing the same ordered items (e.g. time
//! frames compared under different feature types) are fused into one
//! consensus similarity matrix:
//!
//! 1. [`affinity`]: locally scaled Gaussian affinities per feature
//! 2. [`operators`]: dense row-stochastic diffusion operators
//! 3. [`sparsification`]: sparse K-nearest-neighbour operators
//! 4. [`diffusion`]: cross-diffusion iterations over all features
//! 5. [`builder`]: the driver tying the stages together
//!
//! [`graph`] exports any similarity matrix as a node-link neighbour graph.
//!
//! ```
//! use simfusion::builder::{FusionBuilder, KSelection};
//! use smartcore::linalg::basic::arrays::Array;
//! use smartcore::linalg::basic::matrix::DenseMatrix;
//!
//! let d = DenseMatrix::from_2d_vec(&vec![
//!     vec![0.0, 1.0, 2.0, 3.0],
//!     vec![1.0, 0.0, 1.0, 2.0],
//!     vec![2.0, 1.0, 0.0, 1.0],
//!     vec![3.0, 2.0, 1.0, 0.0],
//! ]).unwrap();
//!
//! let out = FusionBuilder::new()
//!     .with_neighbours(KSelection::Fixed(2))
//!     .with_iterations(3)
//!     .build(vec![d.clone(), d])
//!     .unwrap();
//! assert_eq!(out.fused.shape(), (4, 4));
//! ```

pub mod affinity;
pub mod builder;
pub mod diffusion;
pub mod error;
pub mod graph;
pub mod matrix;
pub mod operators;
pub mod sparsification;

pub use builder::{fuse_distances, FusionBuilder, FusionOutput, FusionParams, KSelection};
pub use error::{FusionError, FusionResult};

#[cfg(test)]
mod tests;
