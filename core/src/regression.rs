//! Ordinary least squares with an intercept.
//!
//! Inputs and target are centred, then the normal equations are solved with
//! a symmetric pseudo-inverse. Collinear or constant inputs (a history that
//! spans a single year, a single row) get the minimum-norm coefficients
//! instead of failing.

use crate::error::{EngineError, EngineResult};
use ndarray::{Array1, Array2, ArrayView1, Axis};

#[derive(Debug, Clone, PartialEq)]
pub struct LinearRegression {
    pub coefficients: Array1<f64>,
    pub intercept: f64,
}

impl LinearRegression {
    pub fn fit(x: &Array2<f64>, y: &Array1<f64>) -> EngineResult<Self> {
        if x.nrows() != y.len() {
            return Err(EngineError::computation(format!(
                "regression inputs differ in length: {} rows vs {} targets",
                x.nrows(),
                y.len()
            )));
        }
        let (Some(x_means), Some(y_mean)) = (x.mean_axis(Axis(0)), y.mean()) else {
            return Err(EngineError::computation("cannot fit a regression on zero rows"));
        };

        let xc = x - &x_means;
        let yc = y - y_mean;
        let xtx = xc.t().dot(&xc);
        let xty = xc.t().dot(&yc);

        let coefficients = solve_symmetric_pinv(&xtx, &xty);
        if coefficients.iter().any(|c| !c.is_finite()) {
            return Err(EngineError::computation("regression produced non-finite coefficients"));
        }
        let intercept = y_mean - coefficients.dot(&x_means);

        Ok(Self {
            coefficients,
            intercept,
        })
    }

    pub fn predict_one(&self, features: ArrayView1<f64>) -> f64 {
        self.intercept + self.coefficients.dot(&features)
    }
}

/// Solve A·x = b for symmetric A via its eigen-decomposition, dropping
/// eigenvalues that are numerically zero.
fn solve_symmetric_pinv(a: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let n = b.len();
    let (eigenvalues, eigenvectors) = jacobi_eigen(a);
    let largest = eigenvalues.iter().fold(0.0f64, |m, v| m.max(v.abs()));
    let cutoff = largest * 1e-10 * n as f64;

    let mut x = Array1::zeros(n);
    for (k, &lambda) in eigenvalues.iter().enumerate() {
        if lambda.abs() <= cutoff || lambda == 0.0 {
            continue;
        }
        let v = eigenvectors.column(k);
        // Component of b along eigenvector k.
        let proj = v.dot(b);
        x.scaled_add(proj / lambda, &v);
    }
    x
}

/// Cyclic Jacobi rotations. Returns eigenvalues and a matrix whose columns
/// are the matching eigenvectors.
fn jacobi_eigen(a: &Array2<f64>) -> (Array1<f64>, Array2<f64>) {
    let n = a.nrows();
    let mut m = a.clone();
    let mut v = Array2::<f64>::eye(n);

    for _sweep in 0..100 {
        let off = m.mapv(|x| x * x).sum() - m.diag().mapv(|x| x * x).sum();
        if off < 1e-30 {
            break;
        }
        for p in 0..n {
            for q in (p + 1)..n {
                if m[[p, q]].abs() < 1e-300 {
                    continue;
                }
                let theta = (m[[q, q]] - m[[p, p]]) / (2.0 * m[[p, q]]);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let (mkp, mkq) = (m[[k, p]], m[[k, q]]);
                    m[[k, p]] = c * mkp - s * mkq;
                    m[[k, q]] = s * mkp + c * mkq;
                }
                for k in 0..n {
                    let (mpk, mqk) = (m[[p, k]], m[[q, k]]);
                    m[[p, k]] = c * mpk - s * mqk;
                    m[[q, k]] = s * mpk + c * mqk;
                }
                for k in 0..n {
                    let (vkp, vkq) = (v[[k, p]], v[[k, q]]);
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }

    (m.diag().to_owned(), v)
}
