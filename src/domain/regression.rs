//! Ordinary least squares with an intercept term.

use crate::domain::error::MlstockError;
use nalgebra::{DMatrix, DVector};

#[derive(Debug, Clone, PartialEq)]
pub struct OlsFit {
    /// `params[0]` is the intercept, followed by one coefficient per regressor.
    pub params: Vec<f64>,
    pub residuals: Vec<f64>,
}

impl OlsFit {
    pub fn intercept(&self) -> f64 {
        self.params[0]
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.params[1..]
    }
}

/// Fits `y = b0 + b1*x1 + ... + bm*xm`. Each element of `x` is one observation
/// holding `m` regressors.
pub fn ols(x: &[Vec<f64>], y: &[f64]) -> Result<OlsFit, MlstockError> {
    let n = y.len();
    if x.len() != n {
        return Err(MlstockError::invalid_input(format!(
            "OLS: {} observations in X but {} in y",
            x.len(),
            n
        )));
    }
    let m = x.first().map(|row| row.len()).unwrap_or(0);
    if x.iter().any(|row| row.len() != m) {
        return Err(MlstockError::invalid_input("OLS: ragged regressor rows"));
    }
    if x.iter().flatten().any(|v| v.is_nan()) {
        return Err(MlstockError::invalid_input("OLS: X contains NaN"));
    }
    if y.iter().any(|v| v.is_nan()) {
        return Err(MlstockError::invalid_input("OLS: y contains NaN"));
    }
    let k = m + 1;
    if n < k {
        return Err(MlstockError::invalid_input(format!(
            "OLS: need at least {} observations, have {}",
            k, n
        )));
    }

    let design = DMatrix::from_fn(n, k, |i, j| if j == 0 { 1.0 } else { x[i][j - 1] });
    let target = DVector::from_column_slice(y);

    let xtx = design.transpose() * &design;
    let xty = design.transpose() * &target;
    let xtx_inv = xtx
        .try_inverse()
        .ok_or_else(|| MlstockError::invalid_input("OLS: singular design matrix"))?;
    let beta = xtx_inv * xty;

    let fitted = &design * &beta;
    let residuals = (&target - fitted).iter().copied().collect();

    Ok(OlsFit {
        params: beta.iter().copied().collect(),
        residuals,
    })
}

/// Single-regressor convenience over [`ols`].
pub fn ols_simple(x: &[f64], y: &[f64]) -> Result<OlsFit, MlstockError> {
    let rows: Vec<Vec<f64>> = x.iter().map(|&v| vec![v]).collect();
    ols(&rows, y)
}
