use approx::assert_abs_diff_eq;
use std::collections::HashMap;

use crate::error::FusionError;
use crate::graph::*;
use crate::matrix::from_row_major;
use crate::tests::init;

use log::info;

/// Similarity decaying with index distance, `exp(-|i - j|)`.
fn decaying_similarity(n: usize) -> smartcore::linalg::basic::matrix::DenseMatrix<f64> {
    let data = (0..n)
        .flat_map(|i| (0..n).map(move |j| (-(i as f64 - j as f64).abs()).exp()))
        .collect();
    from_row_major(data, n, n)
}

fn link_sums(g: &NeighbourGraph) -> HashMap<String, f64> {
    let mut sums = HashMap::new();
    for l in &g.links {
        *sums.entry(l.source.clone()).or_insert(0.0) += l.value;
    }
    sums
}

#[test]
fn test_export_full_resolution() {
    init();
    let g = NeighbourGraph::from_similarity(&decaying_similarity(8), 2, None).unwrap();
    info!("{}", g);

    assert_eq!(g.fac, 1);
    assert_eq!(g.nodes.len(), 8);
    assert_eq!(g.nodes[3].id, "3");
    // round(2k / fac) = 4 links per node
    assert_eq!(g.links.len(), 8 * 4);
    for sum in link_sums(&g).values() {
        assert_abs_diff_eq!(*sum, LINK_SCALE, epsilon = 1e-12);
    }
}

#[test]
fn test_export_links_sequential_neighbours() {
    init();
    let g = NeighbourGraph::from_similarity(&decaying_similarity(8), 1, None).unwrap();
    let from_three: Vec<&Link> = g.links.iter().filter(|l| l.source == "3").collect();

    assert_eq!(from_three.len(), 2);
    let mut targets: Vec<&str> = from_three.iter().map(|l| l.target.as_str()).collect();
    targets.sort();
    assert_eq!(targets, vec!["2", "4"]);
    for l in from_three {
        assert_abs_diff_eq!(l.value, LINK_SCALE / 2.0, epsilon = 1e-12);
    }
    // no self loops survive
    assert!(g.links.iter().all(|l| l.value == 0.0 || l.source != l.target));
}

#[test]
fn test_export_downsampled() {
    init();
    let g = NeighbourGraph::from_similarity(&decaying_similarity(8), 2, Some(4)).unwrap();

    assert_eq!(g.fac, 2);
    assert_eq!(g.nodes.len(), 4);
    // round(2 * 2 / 2) = 2 links per node
    assert_eq!(g.links.len(), 4 * 2);
}

#[test]
fn test_export_caps_neighbours_at_node_count() {
    init();
    let g = NeighbourGraph::from_similarity(&decaying_similarity(3), 10, None).unwrap();
    assert_eq!(g.links.len(), 3 * 3);
}

#[test]
fn test_export_rejects_bad_input() {
    init();
    let w = decaying_similarity(4);
    assert!(matches!(
        NeighbourGraph::from_similarity(&w, 2, Some(0)),
        Err(FusionError::InvalidParameter { .. })
    ));
    assert!(matches!(
        NeighbourGraph::from_similarity(&w, 0, None),
        Err(FusionError::InvalidParameter { .. })
    ));
    let rect = from_row_major(vec![0.0; 6], 2, 3);
    assert!(matches!(
        NeighbourGraph::from_similarity(&rect, 1, None),
        Err(FusionError::ShapeMismatch { .. })
    ));
}
