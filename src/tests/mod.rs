mod test_graph;
mod test_operators;

use rand::prelude::*;
use smartcore::linalg::basic::matrix::DenseMatrix;

use crate::matrix::from_row_major;

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Distances `|i - j|` between items laid out on a line.
pub fn chain_distances(n: usize) -> DenseMatrix<f64> {
    let data = (0..n)
        .flat_map(|i| (0..n).map(move |j| (i as f64 - j as f64).abs()))
        .collect();
    from_row_major(data, n, n)
}

/// Euclidean distances between `n` random points in `dim` dimensions.
pub fn random_distances(n: usize, dim: usize, seed: u64) -> DenseMatrix<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let points: Vec<Vec<f64>> = (0..n)
        .map(|_| (0..dim).map(|_| rng.random_range(-1.0..1.0)).collect())
        .collect();
    let data = (0..n)
        .flat_map(|i| {
            let points = &points;
            (0..n).map(move |j| {
                points[i]
                    .iter()
                    .zip(&points[j])
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum::<f64>()
                    .sqrt()
            })
        })
        .collect();
    from_row_major(data, n, n)
}

/// Dense `S · X · Sᵀ` on row-major buffers, used as a reference.
pub fn dense_sandwich(s: &[f64], x: &[f64], n: usize) -> Vec<f64> {
    let mut sx = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..n {
            sx[i * n + j] = (0..n).map(|l| s[i * n + l] * x[l * n + j]).sum();
        }
    }
    let mut out = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..n {
            out[i * n + j] = (0..n).map(|l| sx[i * n + l] * s[j * n + l]).sum();
        }
    }
    out
}
