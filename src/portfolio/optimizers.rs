//! # Portfolio Optimizers
//!
//! $$
//! \min_{\mathbf{w}} \ \mathbf{w}^\top \Sigma \mathbf{w}
//! \quad \text{s.t.} \quad \mathbf{1}^\top \mathbf{w} = 1
//! $$
//!
//! Minimum-variance and volatility-scaled allocators over a covariance matrix.

use argmin::core::CostFunction;
use argmin::core::Executor;
use argmin::solver::neldermead::NelderMead;
use nalgebra::DMatrix;
use nalgebra::DVector;

use super::types::PortfolioResult;
use super::types::empty_result;

fn dot(a: &[f64], b: &[f64]) -> f64 {
  a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn mat_vec_mul(mat: &[Vec<f64>], v: &[f64]) -> Vec<f64> {
  mat
    .iter()
    .map(|row| row.iter().zip(v.iter()).map(|(a, b)| a * b).sum())
    .collect()
}

fn softmax(x: &[f64]) -> Vec<f64> {
  if x.is_empty() {
    return Vec::new();
  }

  let max_x = x.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
  let exps: Vec<f64> = x.iter().map(|&v| (v - max_x).exp()).collect();
  let sum: f64 = exps.iter().sum();

  if sum < 1e-15 {
    vec![1.0 / x.len() as f64; x.len()]
  } else {
    exps.iter().map(|&e| e / sum).collect()
  }
}

/// Volatility `sqrt(w' Σ w)` of a weight vector.
pub fn portfolio_volatility(w: &[f64], cov: &[Vec<f64>]) -> f64 {
  dot(w, &mat_vec_mul(cov, w)).max(0.0).sqrt()
}

fn finish(weights: Vec<f64>, cov: &[Vec<f64>]) -> PortfolioResult {
  let volatility = portfolio_volatility(&weights, cov);
  PortfolioResult {
    weights,
    volatility,
  }
}

/// Long-only minimum-variance weights on the simplex.
///
/// Weights are parametrised through a softmax and the variance is minimised
/// with Nelder-Mead; the optimizer falls back to inverse-variance weights if
/// the solver cannot be built or fails.
pub fn optimize_min_variance(cov: &[Vec<f64>]) -> PortfolioResult {
  let n = cov.len();
  if n == 0 {
    return empty_result();
  }
  if n == 1 {
    return finish(vec![1.0], cov);
  }

  struct VarianceCost {
    cov: Vec<Vec<f64>>,
  }

  impl CostFunction for VarianceCost {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, x: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
      let w = softmax(x);
      let sigma_w = mat_vec_mul(&self.cov, &w);
      Ok(dot(&w, &sigma_w))
    }
  }

  let cost = VarianceCost { cov: cov.to_vec() };

  let x0 = vec![0.0; n];
  let mut simplex = Vec::with_capacity(n + 1);
  simplex.push(x0.clone());
  for i in 0..n {
    let mut point = x0.clone();
    point[i] = 1.0;
    simplex.push(point);
  }

  let w = match NelderMead::new(simplex).with_sd_tolerance(1e-12) {
    Ok(solver) => {
      match Executor::new(cost, solver)
        .configure(|state| state.max_iters(5000))
        .run()
      {
        Ok(res) => {
          let best_x = res.state.best_param.unwrap_or(x0);
          softmax(&best_x)
        }
        Err(_) => inverse_variance_weights(cov),
      }
    }
    Err(_) => inverse_variance_weights(cov),
  };

  finish(w, cov)
}

/// Unconstrained (long-short) minimum-variance weights
/// `Σ⁻¹1 / 1'Σ⁻¹1`, solved through a Cholesky factorisation.
///
/// Returns `None` when the covariance is not positive definite.
pub fn min_variance_closed_form(cov: &[Vec<f64>]) -> Option<PortfolioResult> {
  let n = cov.len();
  if n == 0 {
    return Some(empty_result());
  }

  let sigma = DMatrix::from_fn(n, n, |i, j| {
    cov
      .get(i)
      .and_then(|row| row.get(j))
      .copied()
      .unwrap_or(0.0)
  });
  let chol = sigma.cholesky()?;
  let x = chol.solve(&DVector::from_element(n, 1.0));
  let total = x.sum();
  if !total.is_finite() || total.abs() < 1e-15 {
    return None;
  }

  let w: Vec<f64> = x.iter().map(|v| v / total).collect();
  Some(finish(w, cov))
}

fn inverse_variance_weights(cov: &[Vec<f64>]) -> Vec<f64> {
  scaled_inverse(cov, |var| var)
}

fn scaled_inverse(cov: &[Vec<f64>], scale: impl Fn(f64) -> f64) -> Vec<f64> {
  let n = cov.len();
  let inv: Vec<f64> = (0..n)
    .map(|i| {
      let s = scale(cov[i].get(i).copied().unwrap_or(0.0).max(0.0));
      if s > 1e-15 { 1.0 / s } else { 0.0 }
    })
    .collect();
  let sum: f64 = inv.iter().sum();

  if sum < 1e-15 {
    vec![1.0 / n as f64; n]
  } else {
    inv.iter().map(|v| v / sum).collect()
  }
}

/// Weights proportional to inverse asset volatility.
pub fn optimize_inverse_vol(cov: &[Vec<f64>]) -> PortfolioResult {
  if cov.is_empty() {
    return empty_result();
  }
  finish(scaled_inverse(cov, f64::sqrt), cov)
}

#[cfg(test)]
mod tests {
  use approx::assert_relative_eq;

  use super::*;

  fn diagonal() -> Vec<Vec<f64>> {
    vec![vec![0.04, 0.0], vec![0.0, 0.01]]
  }

  #[test]
  fn closed_form_on_diagonal_is_inverse_variance() {
    let result = min_variance_closed_form(&diagonal()).unwrap();
    assert_relative_eq!(result.weights[0], 0.2, epsilon = 1e-12);
    assert_relative_eq!(result.weights[1], 0.8, epsilon = 1e-12);
    assert_relative_eq!(result.volatility, (0.04f64 * 0.01 / 0.05).sqrt(), epsilon = 1e-12);
  }

  #[test]
  fn closed_form_rejects_singular_covariance() {
    let singular = vec![vec![1.0, 1.0], vec![1.0, 1.0]];
    assert!(min_variance_closed_form(&singular).is_none());
  }

  #[test]
  fn long_only_min_variance_sums_to_one() {
    let cov = vec![
      vec![0.04, 0.01, 0.0],
      vec![0.01, 0.09, 0.02],
      vec![0.0, 0.02, 0.16],
    ];
    let result = optimize_min_variance(&cov);

    let sum_w: f64 = result.weights.iter().sum();
    assert!((sum_w - 1.0).abs() < 1e-9);
    assert!(result.weights.iter().all(|w| *w >= 0.0));
    assert!(result.weights[0] > result.weights[2]);
  }

  #[test]
  fn long_only_matches_closed_form_when_interior() {
    let long_only = optimize_min_variance(&diagonal());
    assert_relative_eq!(long_only.weights[0], 0.2, epsilon = 1e-3);
    assert_relative_eq!(long_only.weights[1], 0.8, epsilon = 1e-3);
  }

  #[test]
  fn inverse_vol_weights() {
    let result = optimize_inverse_vol(&diagonal());
    assert_relative_eq!(result.weights[0], 1.0 / 3.0, epsilon = 1e-12);
    assert_relative_eq!(result.weights[1], 2.0 / 3.0, epsilon = 1e-12);
  }

  #[test]
  fn optimizers_handle_empty_inputs() {
    assert!(optimize_min_variance(&[]).weights.is_empty());
    assert!(optimize_inverse_vol(&[]).weights.is_empty());
    assert_eq!(min_variance_closed_form(&[]).unwrap().volatility, 0.0);
  }
}
