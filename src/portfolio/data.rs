//! # Portfolio Data Utilities
//!
//! $$
//! \Sigma_{ij} = \sigma_i \sigma_j \rho_{ij}
//! $$
//!
//! Helpers for return preprocessing and correlation/covariance construction.

use ndarray::ArrayView1;

pub(crate) fn sample_mean(xs: &[f64]) -> f64 {
  if xs.is_empty() {
    0.0
  } else {
    xs.iter().sum::<f64>() / xs.len() as f64
  }
}

/// Unbiased sample standard deviation.
pub fn sample_std(xs: &[f64]) -> f64 {
  if xs.len() < 2 {
    return 0.0;
  }

  let mean = sample_mean(xs);
  let acc: f64 = xs.iter().map(|x| (x - mean).powi(2)).sum();
  (acc / (xs.len() - 1) as f64).sqrt()
}

fn pearson(x: &[f64], y: &[f64]) -> f64 {
  let n = x.len().min(y.len());
  if n < 2 {
    return 0.0;
  }

  let mx = sample_mean(x);
  let my = sample_mean(y);

  let mut cov = 0.0;
  let mut sx = 0.0;
  let mut sy = 0.0;

  for i in 0..n {
    let dx = x[i] - mx;
    let dy = y[i] - my;
    cov += dx * dy;
    sx += dx * dx;
    sy += dy * dy;
  }

  let denom = (sx * sy).sqrt();
  if denom < 1e-15 {
    0.0
  } else {
    (cov / denom).clamp(-1.0, 1.0)
  }
}

/// Simple returns `p_i / p_{i-1} - 1` of a price path. `None` as soon as a
/// price is missing or non-positive.
pub fn simple_returns_series(prices: ArrayView1<'_, f64>) -> Option<Vec<f64>> {
  if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
    return None;
  }

  Some(
    prices
      .windows(2)
      .into_iter()
      .map(|w| w[1] / w[0] - 1.0)
      .collect(),
  )
}

/// Build a Pearson correlation matrix from aligned return series.
pub fn correlation_matrix(aligned_returns: &[Vec<f64>]) -> Vec<Vec<f64>> {
  let n = aligned_returns.len();
  let mut corr = vec![vec![1.0; n]; n];

  for i in 0..n {
    for j in (i + 1)..n {
      let r = pearson(&aligned_returns[i], &aligned_returns[j]);
      corr[i][j] = r;
      corr[j][i] = r;
    }
  }

  corr
}

/// Build covariance matrix from per-asset volatilities and a correlation matrix.
pub fn covariance_matrix(sigmas: &[f64], corr: &[Vec<f64>]) -> Vec<Vec<f64>> {
  let n = sigmas.len();
  let mut cov = vec![vec![0.0; n]; n];

  for i in 0..n {
    for j in 0..n {
      let c_ij = corr
        .get(i)
        .and_then(|row| row.get(j))
        .copied()
        .unwrap_or(if i == j { 1.0 } else { 0.0 });
      cov[i][j] = sigmas[i] * sigmas[j] * c_ij;
    }
  }

  cov
}

/// Sample covariance of aligned return series, via volatilities and
/// correlations.
pub fn sample_covariance(aligned_returns: &[Vec<f64>]) -> Vec<Vec<f64>> {
  let sigmas: Vec<f64> = aligned_returns.iter().map(|r| sample_std(r)).collect();
  let corr = correlation_matrix(aligned_returns);
  covariance_matrix(&sigmas, &corr)
}

#[cfg(test)]
mod tests {
  use approx::assert_relative_eq;
  use ndarray::array;

  use super::*;

  #[test]
  fn covariance_matrix_handles_missing_corr_entries() {
    let sigmas = vec![0.2, 0.3];
    let corr = vec![vec![1.0]];
    let cov = covariance_matrix(&sigmas, &corr);

    assert_eq!(cov.len(), 2);
    assert!((cov[0][0] - 0.04).abs() < 1e-12);
    assert!((cov[1][1] - 0.09).abs() < 1e-12);
    assert!(cov[0][1].abs() < 1e-12);
  }

  #[test]
  fn simple_returns_reject_gaps() {
    let path = array![100.0, 110.0, 99.0];
    let r = simple_returns_series(path.view()).unwrap();
    assert_relative_eq!(r[0], 0.1, epsilon = 1e-12);
    assert_relative_eq!(r[1], -0.1, epsilon = 1e-12);

    let gap = array![100.0, f64::NAN, 99.0];
    assert!(simple_returns_series(gap.view()).is_none());
  }

  #[test]
  fn sample_covariance_matches_direct_formula() {
    let x = vec![0.01, -0.02, 0.03, 0.0];
    let y = vec![0.02, -0.01, 0.01, 0.01];
    let cov = sample_covariance(&[x.clone(), y.clone()]);

    let mx = sample_mean(&x);
    let my = sample_mean(&y);
    let direct: f64 = x
      .iter()
      .zip(y.iter())
      .map(|(a, b)| (a - mx) * (b - my))
      .sum::<f64>()
      / 3.0;

    assert_relative_eq!(cov[0][1], direct, epsilon = 1e-12);
    assert_relative_eq!(cov[1][0], direct, epsilon = 1e-12);
    assert_relative_eq!(cov[0][0], sample_std(&x).powi(2), epsilon = 1e-12);
  }
}
