//! Numerical helpers consumed by the minimal solvers: real roots of low-degree
//! polynomials and right null-space extraction of homogeneous linear systems.

use nalgebra::{DMatrix, DVector, SVD};

/// Real roots of `p[3] x^3 + p[2] x^2 + p[1] x + p[0] = 0`.
///
/// Coefficients are given in ascending powers. Returns between 0 and 3
/// roots in ascending order; repeated roots are reported with multiplicity.
/// A vanishing leading coefficient falls back to the quadratic (or linear)
/// case instead of dividing by zero.
pub fn solve_cubic(p: &[f64; 4]) -> Vec<f64> {
    let scale = p.iter().fold(0.0_f64, |m, c| m.max(c.abs()));
    if scale == 0.0 || !scale.is_finite() {
        return Vec::new();
    }
    if p[3].abs() <= f64::EPSILON * scale {
        return solve_quadratic(p[0], p[1], p[2]);
    }

    let a = p[2] / p[3];
    let b = p[1] / p[3];
    let c = p[0] / p[3];

    let q = a * a - 3.0 * b;
    let r = 2.0 * a * a * a - 9.0 * a * b + 27.0 * c;
    let big_q = q / 9.0;
    let big_r = r / 54.0;
    let q3 = big_q * big_q * big_q;
    let r2 = big_r * big_r;
    let shift = a / 3.0;

    let mut roots = if big_r == 0.0 && big_q == 0.0 {
        vec![-shift; 3]
    } else if r2 == q3 {
        let sqrt_q = big_q.sqrt();
        if big_r > 0.0 {
            vec![-2.0 * sqrt_q - shift, sqrt_q - shift, sqrt_q - shift]
        } else {
            vec![-sqrt_q - shift, -sqrt_q - shift, 2.0 * sqrt_q - shift]
        }
    } else if r2 < q3 {
        let sqrt_q = big_q.sqrt();
        let theta = (big_r / (sqrt_q * sqrt_q * sqrt_q)).clamp(-1.0, 1.0).acos();
        let norm = -2.0 * sqrt_q;
        let two_pi = 2.0 * std::f64::consts::PI;
        vec![
            norm * (theta / 3.0).cos() - shift,
            norm * ((theta + two_pi) / 3.0).cos() - shift,
            norm * ((theta - two_pi) / 3.0).cos() - shift,
        ]
    } else {
        let sgn_r = if big_r >= 0.0 { 1.0 } else { -1.0 };
        let big_a = -sgn_r * (big_r.abs() + (r2 - q3).sqrt()).cbrt();
        let big_b = if big_a != 0.0 { big_q / big_a } else { 0.0 };
        vec![big_a + big_b - shift]
    };

    // One Newton step on the monic polynomial tightens the closed-form roots.
    for x in roots.iter_mut() {
        let f = ((*x + a) * *x + b) * *x + c;
        let df = (3.0 * *x + 2.0 * a) * *x + b;
        if df.abs() > f64::EPSILON {
            let step = f / df;
            if step.is_finite() {
                *x -= step;
            }
        }
    }

    roots.retain(|x| x.is_finite());
    roots.sort_by(|l, r| l.total_cmp(r));
    roots
}

/// Real roots of `c2 x^2 + c1 x + c0 = 0`, ascending.
pub fn solve_quadratic(c0: f64, c1: f64, c2: f64) -> Vec<f64> {
    let scale = c0.abs().max(c1.abs()).max(c2.abs());
    if scale == 0.0 {
        return Vec::new();
    }
    if c2.abs() <= f64::EPSILON * scale {
        if c1.abs() <= f64::EPSILON * scale {
            return Vec::new();
        }
        return vec![-c0 / c1];
    }

    let disc = c1 * c1 - 4.0 * c2 * c0;
    if disc < 0.0 {
        return Vec::new();
    }
    let q = -0.5 * (c1 + c1.signum() * disc.sqrt());
    let mut roots = if q == 0.0 {
        vec![0.0, 0.0]
    } else {
        vec![q / c2, c0 / q]
    };
    roots.sort_by(|l, r| l.total_cmp(r));
    roots
}

/// Right singular vectors of a matrix together with their singular values,
/// ordered from the smallest singular value to the largest.
#[derive(Debug, Clone)]
pub struct RightSingularBasis {
    pub singular_values: Vec<f64>,
    pub vectors: Vec<DVector<f64>>,
}

/// Decompose `a` and return its full right singular basis.
///
/// Systems with fewer rows than columns are padded with zero rows first so
/// the basis always has `a.ncols()` vectors and the null directions are not
/// truncated away by a thin decomposition.
pub fn right_singular_basis(a: &DMatrix<f64>) -> Option<RightSingularBasis> {
    if a.ncols() == 0 || a.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let padded = if a.nrows() < a.ncols() {
        let mut m = DMatrix::<f64>::zeros(a.ncols(), a.ncols());
        m.rows_mut(0, a.nrows()).copy_from(a);
        m
    } else {
        a.clone()
    };

    let svd = SVD::new(padded, false, true);
    let v_t = svd.v_t?;

    let mut order: Vec<usize> = (0..svd.singular_values.len()).collect();
    order.sort_by(|&l, &r| svd.singular_values[l].total_cmp(&svd.singular_values[r]));

    let singular_values = order.iter().map(|&i| svd.singular_values[i]).collect();
    let vectors = order
        .iter()
        .map(|&i| v_t.row(i).transpose())
        .collect::<Vec<DVector<f64>>>();

    if vectors.iter().any(|v| v.iter().any(|x| !x.is_finite())) {
        return None;
    }

    Some(RightSingularBasis {
        singular_values,
        vectors,
    })
}

/// Unit vector spanning the (approximate) one-dimensional null space of `a`.
pub fn nullspace(a: &DMatrix<f64>) -> Option<DVector<f64>> {
    right_singular_basis(a).and_then(|basis| basis.vectors.into_iter().next())
}

/// Two unit vectors spanning the (approximate) two-dimensional null space of
/// `a`: the first for the smallest singular value, the second for the next.
pub fn nullspace2(a: &DMatrix<f64>) -> Option<(DVector<f64>, DVector<f64>)> {
    let basis = right_singular_basis(a)?;
    let mut it = basis.vectors.into_iter();
    Some((it.next()?, it.next()?))
}
