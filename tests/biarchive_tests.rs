//! Integration tests for the bi-objective archive.

use moarchive::{BiArchive, Error};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn assert_close(a: f64, b: f64) {
    assert!((a - b).abs() < 1e-9, "{a} vs {b}");
}

// ---------------------------------------------------------------------------
// End-to-end scenarios
// ---------------------------------------------------------------------------

#[test]
fn test_construction_scenario() {
    let arch: BiArchive = BiArchive::from_points(
        &[
            [-0.749, -1.188],
            [-0.557, 1.1076],
            [0.2454, 0.4724],
            [-1.146, -0.110],
        ],
        Some([10.0, 10.0]),
    );
    assert_eq!(arch.points(), &[[-1.146, -0.110], [-0.749, -1.188]]);
    let contributions = arch.contributing_hypervolumes().unwrap();
    assert_close(contributions[0], 4.01367);
    assert_close(contributions[1], 11.587422);
}

#[test]
fn test_add_scenario() {
    let mut arch: BiArchive = BiArchive::from_points(
        &[
            [-0.749, -1.188],
            [-0.557, 1.1076],
            [0.2454, 0.4724],
            [-1.146, -0.110],
        ],
        Some([10.0, 10.0]),
    );
    assert_eq!(arch.add([-1.0, -3.0], None), Some(1));
    assert_eq!(arch.points(), &[[-1.146, -0.110], [-1.0, -3.0]]);

    // Out of domain: a silent no-op.
    let hv = arch.hypervolume().unwrap();
    assert_eq!(arch.add([-1.5, 44.0], None), None);
    assert_eq!(arch.points(), &[[-1.146, -0.110], [-1.0, -3.0]]);
    assert_eq!(arch.hypervolume().unwrap(), hv);
}

// ---------------------------------------------------------------------------
// Boundary behaviour
// ---------------------------------------------------------------------------

#[test]
fn test_empty_archive() {
    let arch: BiArchive = BiArchive::new(Some([2.0, 2.0]));
    assert!(arch.is_empty());
    assert_eq!(arch.hypervolume().unwrap(), 0.0);
    assert_eq!(arch.hypervolume_plus().unwrap(), f64::NEG_INFINITY);
    assert!(!arch.dominates(&[0.0, 0.0]));
    assert!(arch.dominators(&[0.0, 0.0]).is_empty());
}

#[test]
fn test_no_reference_point_errors() {
    let arch: BiArchive = BiArchive::from_points(&[[1.0, 2.0], [0.0, 3.0]], None);
    assert!(matches!(
        arch.hypervolume(),
        Err(Error::MissingReferencePoint)
    ));
    assert!(matches!(
        arch.hypervolume_plus(),
        Err(Error::MissingReferencePoint)
    ));
    assert!(matches!(
        arch.hypervolume_improvement(&[0.5, 0.5]),
        Err(Error::MissingReferencePoint)
    ));
    // Dominance works without a reference point.
    assert!(arch.dominates(&[1.0, 2.5]));
}

#[test]
fn test_dominating_insert_collapses_archive() {
    let mut arch: BiArchive =
        BiArchive::from_points(&[[6.0, 6.0], [5.0, 7.0], [4.0, 8.0], [3.0, 9.0]], None);
    assert_eq!(arch.len(), 4);
    assert_eq!(arch.add([0.0, 0.0], None), Some(0));
    assert_eq!(arch.points(), &[[0.0, 0.0]]);
    assert_eq!(arch.discarded().len(), 4);
}

#[test]
fn test_equal_insert_is_noop() {
    let mut arch: BiArchive = BiArchive::from_points(&[[1.0, 2.0], [0.0, 3.0]], Some([5.0, 5.0]));
    let hv = arch.hypervolume().unwrap();
    assert_eq!(arch.add([1.0, 2.0], None), None);
    assert_eq!(arch.len(), 2);
    assert_eq!(arch.hypervolume().unwrap(), hv);
    assert!(arch.discarded().is_empty());
}

#[test]
fn test_equal_f1_smaller_f2_evicts() {
    let mut arch: BiArchive = BiArchive::from_points(&[[1.0, 2.0], [0.0, 3.0]], Some([5.0, 5.0]));
    assert_eq!(arch.add([1.0, 1.5], None), Some(1));
    assert_eq!(arch.points(), &[[0.0, 3.0], [1.0, 1.5]]);
    assert_eq!(arch.discarded(), &[[1.0, 2.0]]);
}

// ---------------------------------------------------------------------------
// Invariants
// ---------------------------------------------------------------------------

fn random_points(rng: &mut StdRng, n: usize) -> Vec<[f64; 2]> {
    (0..n)
        .map(|i| {
            let spread: f64 = rng.gen();
            let noise0: f64 = 0.01 * rng.gen::<f64>();
            let noise1: f64 = 0.01 * rng.gen::<f64>();
            [
                spread * i as f64 + noise0,
                -spread * i as f64 + noise1,
            ]
        })
        .collect()
}

#[test]
fn test_randomized_consistency() {
    let mut rng = StdRng::seed_from_u64(0xA1C);
    for _ in 0..40 {
        let n = rng.gen_range(0..60);
        let reference = [rng.gen::<f64>() * 20.0, rng.gen::<f64>() * 20.0];
        let mut arch: BiArchive = BiArchive::new(Some(reference));
        for pair in random_points(&mut rng, n) {
            let len_before = arch.len();
            let hv_before = arch.hypervolume().unwrap();
            let result = arch.add(pair, None);
            arch.check_invariants().unwrap();
            assert_eq!(arch.infos().len(), arch.len());
            match result {
                // A rejected pair changes neither the archive nor H.
                None => {
                    assert_eq!(arch.len(), len_before);
                    assert_eq!(arch.hypervolume().unwrap(), hv_before);
                }
                // An accepted pair sits at its index and dominates
                // everything it evicted.
                Some(idx) => {
                    assert_eq!(arch[idx], pair);
                    for dropped in arch.discarded() {
                        assert!(pair[0] <= dropped[0] && pair[1] <= dropped[1]);
                    }
                }
            }
            let fresh = arch.compute_hypervolume(reference);
            assert!((arch.hypervolume().unwrap() - fresh).abs() < 1e-9);
        }
        let total: f64 = arch.contributing_hypervolumes().unwrap().iter().sum();
        assert!(total <= arch.hypervolume().unwrap() + 1e-9);
    }
}

#[test]
fn test_readding_residents_is_noop() {
    let mut rng = StdRng::seed_from_u64(7);
    let points = random_points(&mut rng, 30);
    let mut arch: BiArchive = BiArchive::from_points(&points, Some([20.0, 20.0]));
    let snapshot = arch.points().to_vec();
    let hv = arch.hypervolume().unwrap();
    for pair in snapshot.clone() {
        assert_eq!(arch.add(pair, None), None);
    }
    assert_eq!(arch.points(), &snapshot[..]);
    assert_eq!(arch.hypervolume().unwrap(), hv);
}

// ---------------------------------------------------------------------------
// Algebraic laws
// ---------------------------------------------------------------------------

#[test]
fn test_merge_equals_add_list_on_sorted_input() {
    let mut rng = StdRng::seed_from_u64(99);
    for _ in 0..20 {
        let base = random_points(&mut rng, 25);
        let mut batch = random_points(&mut rng, 25);
        batch.sort_by(|a, b| a[0].total_cmp(&b[0]).then(a[1].total_cmp(&b[1])));

        let mut by_add: BiArchive = BiArchive::from_points(&base, Some([20.0, 20.0]));
        let mut by_merge = by_add.clone();
        let n_add = by_add.add_list(&batch);
        let n_merge = by_merge.merge(&batch);

        assert_eq!(n_add, n_merge);
        assert_eq!(by_add.points(), by_merge.points());
        assert_eq!(
            by_add.hypervolume().unwrap(),
            by_merge.hypervolume().unwrap()
        );
        by_merge.check_invariants().unwrap();
    }
}

#[test]
fn test_improvement_equals_hypervolume_delta() {
    let mut rng = StdRng::seed_from_u64(5);
    let points = random_points(&mut rng, 40);
    let reference = [20.0, 20.0];
    let arch: BiArchive = BiArchive::from_points(&points, Some(reference));
    for _ in 0..50 {
        let pair = [rng.gen::<f64>() * 25.0 - 5.0, rng.gen::<f64>() * 25.0 - 5.0];
        if arch.dominates(&pair) || !arch.in_domain(&pair) {
            continue;
        }
        let predicted = arch.hypervolume_improvement(&pair).unwrap();
        let mut extended = arch.clone();
        let _ = extended.add(pair, None);
        let actual = extended.hypervolume().unwrap() - arch.hypervolume().unwrap();
        assert!((predicted - actual).abs() < 1e-9, "{predicted} vs {actual}");
    }
}

#[test]
fn test_improvement_is_negative_squared_distance_when_dominated() {
    let mut rng = StdRng::seed_from_u64(11);
    let points = random_points(&mut rng, 40);
    let arch: BiArchive = BiArchive::from_points(&points, Some([20.0, 20.0]));
    let mut checked = 0;
    for _ in 0..200 {
        let pair = [rng.gen::<f64>() * 25.0, rng.gen::<f64>() * 25.0];
        if !arch.dominates(&pair) {
            continue;
        }
        let improvement = arch.hypervolume_improvement(&pair).unwrap();
        let distance = arch.distance_to_pareto_front(&pair);
        assert!(improvement <= 0.0);
        assert!((improvement + distance * distance).abs() < 1e-9);
        checked += 1;
    }
    assert!(checked > 0, "no dominated query pairs were generated");
}

#[test]
fn test_distance_is_zero_iff_non_dominated_in_domain() {
    let arch: BiArchive =
        BiArchive::from_points(&[[1.0, 3.0], [2.0, 2.0], [3.0, 1.0]], Some([4.0, 4.0]));
    assert_eq!(arch.distance_to_pareto_front(&[0.0, 0.0]), 0.0);
    assert_eq!(arch.distance_to_pareto_front(&[1.5, 2.5]), 0.0);
    assert!(arch.distance_to_pareto_front(&[2.0, 2.0]) == 0.0);
    assert!(arch.distance_to_pareto_front(&[2.1, 2.1]) > 0.0);
    assert!(arch.distance_to_pareto_front(&[0.0, 4.5]) > 0.0);
}

// ---------------------------------------------------------------------------
// Infos and removal
// ---------------------------------------------------------------------------

#[test]
fn test_infos_follow_membership() {
    let mut arch: BiArchive<f64, f64, String> = BiArchive::new(Some([10.0, 10.0]));
    assert_eq!(arch.add([2.0, 2.0], None), Some(0));
    assert_eq!(arch.add([3.0, 1.0], Some("rocks".to_string())), Some(1));
    assert_eq!(arch.infos().len(), 2);
    assert_eq!(arch.infos()[0], None);
    assert_eq!(arch.infos()[1].as_deref(), Some("rocks"));

    // Evicting an element drops its info with it.
    assert_eq!(arch.add([1.0, 1.5], None), Some(0));
    assert_eq!(arch.points(), &[[1.0, 1.5], [3.0, 1.0]]);
    assert_eq!(arch.infos()[0], None);
    assert_eq!(arch.infos()[1].as_deref(), Some("rocks"));
}

#[test]
fn test_remove_by_index_keeps_hypervolume_exact() {
    let mut arch: BiArchive =
        BiArchive::from_points(&[[1.0, 3.0], [2.0, 2.0], [3.0, 1.0]], Some([4.0, 4.0]));
    arch.remove_at(1).unwrap();
    assert_eq!(arch.points(), &[[1.0, 3.0], [3.0, 1.0]]);
    assert_close(arch.hypervolume().unwrap(), 5.0);
    arch.check_invariants().unwrap();
}

#[test]
fn test_remove_then_readd_roundtrip() {
    let mut rng = StdRng::seed_from_u64(13);
    let points = random_points(&mut rng, 25);
    let mut arch: BiArchive = BiArchive::from_points(&points, Some([20.0, 20.0]));
    for pair in arch.points().to_vec() {
        let len = arch.len();
        let hv = arch.hypervolume().unwrap();
        let _ = arch.remove(&pair).unwrap();
        assert_eq!(arch.len(), len - 1);
        assert_eq!(arch.add(pair, None).is_some(), true);
        assert!((arch.hypervolume().unwrap() - hv).abs() < 1e-9);
        arch.check_invariants().unwrap();
    }
}

// ---------------------------------------------------------------------------
// Bulk operations
// ---------------------------------------------------------------------------

#[test]
fn test_add_list_counts_and_discards() {
    let mut arch: BiArchive = BiArchive::new(Some([3.0, 4.0]));
    let inserted = arch.add_list(&[[1.0, 2.0], [0.0, 3.0], [1.0, 2.0], [5.0, 5.0]]);
    assert_eq!(inserted, 2);
    assert_eq!(arch.points(), &[[0.0, 3.0], [1.0, 2.0]]);
    assert_eq!(arch.compute_hypervolume([3.0, 4.0]), 5.0);
    // The duplicate was a no-op; the out-of-domain pair is discarded.
    assert!(arch.discarded().contains(&[5.0, 5.0]));
}

#[test]
fn test_clear_resets_indicators() {
    let mut arch: BiArchive = BiArchive::from_points(&[[1.0, 2.0], [0.0, 3.0]], Some([5.0, 5.0]));
    arch.clear();
    assert!(arch.is_empty());
    assert_eq!(arch.hypervolume().unwrap(), 0.0);
    assert_eq!(arch.hypervolume_plus().unwrap(), f64::NEG_INFINITY);
    assert_eq!(arch.discarded().len(), 2);
}
