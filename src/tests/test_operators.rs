use approx::assert_abs_diff_eq;
use smartcore::linalg::basic::arrays::Array;

use crate::affinity::{build_affinity, DEFAULT_MU};
use crate::error::FusionError;
use crate::matrix::{from_row_major, row_sums, to_row_major};
use crate::operators::*;
use crate::tests::{init, random_distances};

#[test]
fn test_dense_operator_rows_sum_to_one() {
    init();
    let w = build_affinity(&random_distances(25, 4, 11), 4, DEFAULT_MU).unwrap();
    let p = to_dense_operator(&w, false).unwrap();

    for (i, s) in row_sums(&p).iter().enumerate() {
        assert_abs_diff_eq!(*s, 1.0, epsilon = 1e-12);
        assert!(*p.get((i, i)) > 0.0);
    }
    assert!(is_row_stochastic(&p, 1e-12));
}

#[test]
fn test_dense_operator_keeps_zero_rows_zero() {
    init();
    let w = from_row_major(
        vec![
            0.0, 0.0, 0.0, //
            0.5, 1.0, 0.5, //
            0.2, 0.3, 1.0,
        ],
        3,
        3,
    );
    let p = to_dense_operator(&w, false).unwrap();
    let sums = row_sums(&p);

    assert_eq!(sums[0], 0.0);
    assert!((0..3).all(|j| *p.get((0, j)) == 0.0));
    assert_abs_diff_eq!(sums[1], 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(*p.get((1, 1)), 0.5, epsilon = 1e-12);
    assert_abs_diff_eq!(*p.get((2, 0)), 0.2 / 1.5, epsilon = 1e-12);
    assert!(is_row_stochastic(&p, 1e-12));
}

#[test]
fn test_dense_operator_diag_regularised() {
    init();
    let w = build_affinity(&random_distances(12, 3, 5), 3, DEFAULT_MU).unwrap();
    let p = to_dense_operator(&w, true).unwrap();

    for i in 0..12 {
        assert_eq!(*p.get((i, i)), 0.5);
        let off: f64 = (0..12).filter(|&j| j != i).map(|j| *p.get((i, j))).sum();
        assert_abs_diff_eq!(off, 0.5, epsilon = 1e-12);
    }
}

#[test]
fn test_dense_operator_diag_regularised_isolated_item() {
    init();
    // item 0 has no off-diagonal affinity
    let w = from_row_major(vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.4, 0.0, 0.4, 1.0], 3, 3);
    let p = to_dense_operator(&w, true).unwrap();

    assert_eq!(*p.get((0, 0)), 0.5);
    assert_eq!(*p.get((0, 1)), 0.0);
    assert_eq!(*p.get((0, 2)), 0.0);
    assert_abs_diff_eq!(*p.get((1, 2)), 0.5, epsilon = 1e-12);
}

#[test]
fn test_dense_operator_idempotent() {
    init();
    let w = build_affinity(&random_distances(20, 5, 3), 3, DEFAULT_MU).unwrap();
    let once = to_dense_operator(&w, false).unwrap();
    let twice = to_dense_operator(&once, false).unwrap();

    for (a, b) in to_row_major(&once).iter().zip(to_row_major(&twice).iter()) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
    }
}

#[test]
fn test_dense_operator_requires_square() {
    init();
    let w = from_row_major(vec![1.0; 6], 3, 2);
    assert!(matches!(
        to_dense_operator(&w, false),
        Err(FusionError::ShapeMismatch { .. })
    ));
}
