//! Node-link export of a similarity matrix.
//!
//! Turns any N×N similarity matrix (fused or per-feature) into a sparse
//! nearest-neighbour graph for external layout and rendering:
//! - optional block-average down-sampling to a target resolution
//! - self-loops removed, sequential neighbours tied at the strongest weight
//! - edges from the sparse K-NN operator, weights scaled by [`LINK_SCALE`]

use std::fmt;

use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;

use log::{debug, info};

use crate::error::{FusionError, FusionResult};
use crate::matrix::{check_square, from_row_major, to_row_major};
use crate::sparsification::to_sparse_operator;

/// Multiplier applied to normalised edge weights in the export.
pub const LINK_SCALE: f64 = 10.0;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Link {
    pub source: String,
    pub target: String,
    pub value: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NeighbourGraph {
    pub nodes: Vec<Node>,
    pub links: Vec<Link>,
    /// Down-sampling factor: every node stands for `fac` consecutive items.
    pub fac: usize,
}

/// Average non-overlapping `fac`×`fac` blocks; trailing items that do not
/// fill a block are dropped.
fn block_average(data: &[f64], n: usize, fac: usize) -> (Vec<f64>, usize) {
    let res = n / fac;
    let norm = (fac * fac) as f64;
    let mut out = vec![0.0f64; res * res];
    for a in 0..res {
        for b in 0..res {
            let mut sum = 0.0;
            for i in a * fac..(a + 1) * fac {
                for j in b * fac..(b + 1) * fac {
                    sum += data[i * n + j];
                }
            }
            out[a * res + b] = sum / norm;
        }
    }
    (out, res)
}

impl NeighbourGraph {
    /// Build the export graph.
    ///
    /// * `w` - N×N similarity matrix, items in sequence order
    /// * `k` - base neighbour count; `round(2k / fac)` edges are kept per
    ///   node, capped at the node count
    /// * `resolution` - target node count; `None` keeps one node per item
    pub fn from_similarity(
        w: &DenseMatrix<f64>,
        k: usize,
        resolution: Option<usize>,
    ) -> FusionResult<Self> {
        let n = check_square(w)?;
        if n == 0 {
            return Err(FusionError::invalid_parameter("empty similarity matrix"));
        }
        if k == 0 {
            return Err(FusionError::invalid_parameter("k must be at least 1"));
        }

        let data = to_row_major(w);
        let (mut data, res, fac) = match resolution {
            Some(0) => {
                return Err(FusionError::invalid_parameter("resolution must be at least 1"))
            }
            Some(target) => {
                let fac = ((n as f64 / target as f64).round() as usize).max(1);
                let (resized, res) = block_average(&data, n, fac);
                (resized, res, fac)
            }
            None => (data, n, 1),
        };
        info!("Exporting neighbour graph: {} items -> {} nodes (fac={})", n, res, fac);

        for i in 0..res {
            data[i * res + i] = 0.0;
        }
        let max = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        for i in 0..res.saturating_sub(1) {
            data[i * res + i + 1] = max;
            data[(i + 1) * res + i] = max;
        }

        let k_used = ((k as f64 * 2.0 / fac as f64).round() as usize).clamp(1, res);
        debug!("Using {} neighbours per node", k_used);
        let s = to_sparse_operator(&from_row_major(data, res, res), k_used)?;

        let nodes = (0..res).map(|i| Node { id: i.to_string() }).collect();
        let links = s
            .triplets()
            .into_iter()
            .map(|(i, j, v)| Link {
                source: i.to_string(),
                target: j.to_string(),
                value: v * LINK_SCALE,
            })
            .collect();

        Ok(Self { nodes, links, fac })
    }
}

impl fmt::Display for NeighbourGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "NeighbourGraph: {} nodes, {} links (fac={})",
            self.nodes.len(),
            self.links.len(),
            self.fac
        )
    }
}
