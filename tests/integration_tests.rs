//! Integration tests for the high-level API.
//!
//! These tests run the full pipeline on synthetic scenes contaminated with
//! outliers and check that the automatic threshold separates them.

use acransac::samplers::uniform_sample;
use acransac::*;
use approx::assert_relative_eq;
use nalgebra::{DMatrix, Matrix3, Rotation3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn similarity_with_outliers(inliers: usize, outliers: usize, seed: u64) -> (DMatrix<f64>, DMatrix<f64>, Similarity) {
    let mut rng = StdRng::seed_from_u64(seed);
    let rotation = *Rotation3::from_euler_angles(-0.3, 0.8, 0.25).matrix();
    let truth = Similarity::from_parts(0.6, &Vector3::new(2.0, 1.0, -4.0), &rotation);

    let n = inliers + outliers;
    let mut x1 = DMatrix::zeros(3, n);
    let mut x2 = DMatrix::zeros(3, n);
    for i in 0..n {
        let p = Vector3::new(
            rng.gen_range(-10.0..10.0),
            rng.gen_range(-10.0..10.0),
            rng.gen_range(-10.0..10.0),
        );
        let q = if i < inliers {
            truth.transform_point(&p)
        } else {
            Vector3::new(
                rng.gen_range(-10.0..10.0),
                rng.gen_range(-10.0..10.0),
                rng.gen_range(-10.0..10.0),
            )
        };
        x1.column_mut(i).copy_from(&p);
        x2.column_mut(i).copy_from(&q);
    }
    (x1, x2, truth)
}

fn skew(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}

/// Two 640x480 views of a random scene, inliers with up to `noise` pixels
/// of uniform noise, outliers uniform over the image.
fn two_views_with_outliers(
    inliers: usize,
    outliers: usize,
    noise: f64,
    seed: u64,
) -> (DMatrix<f64>, DMatrix<f64>, Matrix3<f64>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let k = Matrix3::new(500.0, 0.0, 320.0, 0.0, 500.0, 240.0, 0.0, 0.0, 1.0);
    let rotation = *Rotation3::from_euler_angles(0.02, 0.15, -0.05).matrix();
    let translation = Vector3::new(-1.0, 0.2, 0.1);

    let n = inliers + outliers;
    let mut x1 = DMatrix::zeros(2, n);
    let mut x2 = DMatrix::zeros(2, n);
    for i in 0..n {
        if i < inliers {
            let p = Vector3::new(
                rng.gen_range(-2.0..2.0),
                rng.gen_range(-1.5..1.5),
                rng.gen_range(5.0..10.0),
            );
            let a = k * p;
            let b = k * (rotation * p + translation);
            x1[(0, i)] = a.x / a.z + rng.gen_range(-noise..=noise);
            x1[(1, i)] = a.y / a.z + rng.gen_range(-noise..=noise);
            x2[(0, i)] = b.x / b.z + rng.gen_range(-noise..=noise);
            x2[(1, i)] = b.y / b.z + rng.gen_range(-noise..=noise);
        } else {
            x1[(0, i)] = rng.gen_range(0.0..640.0);
            x1[(1, i)] = rng.gen_range(0.0..480.0);
            x2[(0, i)] = rng.gen_range(0.0..640.0);
            x2[(1, i)] = rng.gen_range(0.0..480.0);
        }
    }

    let k_inv = k.try_inverse().unwrap();
    let f = k_inv.transpose() * skew(&translation) * rotation * k_inv;
    (x1, x2, f)
}

fn epipolar_distance(f: &Matrix3<f64>, x1: &DMatrix<f64>, x2: &DMatrix<f64>, i: usize) -> f64 {
    let p1 = Vector3::new(x1[(0, i)], x1[(1, i)], 1.0);
    let p2 = Vector3::new(x2[(0, i)], x2[(1, i)], 1.0);
    let line = f * p1;
    p2.dot(&line).abs() / line.x.hypot(line.y)
}

#[test]
fn test_similarity_separates_outliers() {
    let (x1, x2, truth) = similarity_with_outliers(70, 30, 2024);
    let result = estimate_similarity(&x1, &x2, false, Some(AcRansacSettings::seeded(5))).unwrap();

    assert_eq!(result.inliers, (0..70).collect::<Vec<_>>());
    assert!(result.nfa < 0.0);
    assert!(result.threshold < 1e-6, "threshold {}", result.threshold);
    assert_eq!(result.refinement, RefinementStatus::NotRequested);

    let (s, t, r) = result.model.parts().unwrap();
    let (s0, t0, r0) = truth.parts().unwrap();
    assert_relative_eq!(s, s0, epsilon = 1e-8);
    assert_relative_eq!(t, t0, epsilon = 1e-8);
    assert_relative_eq!(r, r0, epsilon = 1e-8);
}

#[test]
fn test_similarity_with_refinement() {
    let (x1, x2, truth) = similarity_with_outliers(50, 20, 7);
    let result = estimate_similarity(&x1, &x2, true, Some(AcRansacSettings::seeded(11))).unwrap();

    assert_eq!(result.refinement, RefinementStatus::Converged);
    assert_eq!(result.inliers.len(), 50);
    assert_relative_eq!(result.model.matrix, truth.matrix, epsilon = 1e-8);
}

#[test]
fn test_similarity_is_reproducible_with_seed() {
    let (x1, x2, _) = similarity_with_outliers(40, 40, 99);
    let a = estimate_similarity(&x1, &x2, false, Some(AcRansacSettings::seeded(3))).unwrap();
    let b = estimate_similarity(&x1, &x2, false, Some(AcRansacSettings::seeded(3))).unwrap();

    assert_eq!(a.inliers, b.inliers);
    assert_eq!(a.iterations, b.iterations);
    assert_eq!(a.model, b.model);
}

#[test]
fn test_sequential_engine_matches_parallel() {
    let (x1, x2, _) = similarity_with_outliers(40, 20, 31);
    let parallel = AcRansacSettings::seeded(8);
    let sequential = AcRansacSettings {
        parallel: false,
        ..parallel.clone()
    };

    let a = estimate_similarity(&x1, &x2, false, Some(parallel)).unwrap();
    let b = estimate_similarity(&x1, &x2, false, Some(sequential)).unwrap();
    assert_eq!(a.inliers, b.inliers);
    assert_eq!(a.model, b.model);
}

fn check_fundamental(method: FundamentalMethod) {
    let (inliers, outliers) = (120, 40);
    let (x1, x2, f_true) = two_views_with_outliers(inliers, outliers, 0.5, 42);
    let size = ImageSize::new(640.0, 480.0);

    let result = estimate_fundamental_matrix(
        &x1,
        size,
        &x2,
        size,
        method,
        Some(AcRansacSettings::seeded(17)),
    )
    .unwrap();

    let found_inliers = result.inliers.iter().filter(|&&i| i < inliers).count();
    let found_outliers = result.inliers.len() - found_inliers;
    assert!(found_inliers >= 108, "{method:?}: only {found_inliers} true inliers");
    assert!(found_outliers <= 3, "{method:?}: {found_outliers} outliers accepted");
    assert!(result.nfa < 0.0);
    assert!(result.threshold > 0.0 && result.threshold < 5.0, "threshold {}", result.threshold);

    // The estimate explains the true inliers about as well as the ground truth.
    let mean = |f: &Matrix3<f64>| {
        (0..inliers).map(|i| epipolar_distance(f, &x1, &x2, i)).sum::<f64>() / inliers as f64
    };
    let estimated = mean(&result.model.f);
    assert!(estimated < 2.0 * mean(&f_true) + 1.0, "mean epipolar distance {estimated}");
}

#[test]
fn test_fundamental_seven_point_with_outliers() {
    check_fundamental(FundamentalMethod::SevenPoint);
}

#[test]
fn test_fundamental_eight_point_with_outliers() {
    check_fundamental(FundamentalMethod::EightPoint);
}

#[test]
fn test_insufficient_data_is_reported() {
    let x = DMatrix::zeros(3, 2);
    let err = estimate_similarity(&x, &x, false, None).unwrap_err();
    assert_eq!(
        err,
        EstimationError::InsufficientData {
            required: 3,
            available: 2
        }
    );

    let p = DMatrix::zeros(2, 6);
    let size = ImageSize::new(640.0, 480.0);
    let err = estimate_fundamental_matrix(&p, size, &p, size, FundamentalMethod::SevenPoint, None)
        .unwrap_err();
    assert_eq!(
        err,
        EstimationError::InsufficientData {
            required: 7,
            available: 6
        }
    );
}

#[test]
fn test_repeated_point_has_no_consensus() {
    let x = DMatrix::from_fn(3, 10, |r, _| r as f64 + 1.0);
    let err = estimate_similarity(&x, &x, false, Some(AcRansacSettings::seeded(0))).unwrap_err();
    assert!(matches!(err, EstimationError::NoConsensus { .. }));
}

#[test]
fn test_uniform_sampler_through_public_api() {
    let mut rng = StdRng::seed_from_u64(1);
    for upper in [1usize, 2, 4, 8, 16, 32, 64, 128, 256, 512] {
        let count = upper / 2 + 1;
        let mut drawn = uniform_sample(&mut rng, count, upper);
        drawn.sort_unstable();
        drawn.dedup();
        assert_eq!(drawn.len(), count);
        assert!(drawn.iter().all(|&i| i < upper));
    }
}
