//! Factorization settings.

use std::env;

use crate::error::{MatrixError, Result};

/// Parameters shared by the factorization layer.
#[derive(Debug, Clone)]
pub struct LinalgSettings {
    /// Log a summary of each factorization at info level
    pub verbose: bool,

    /// Static regularization added to the diagonal of the copied matrix
    /// before a sparse factorization
    pub static_reg: f64,

    /// Pivots with magnitude at or below this value are treated as zero
    pub pivot_tol: f64,
}

impl Default for LinalgSettings {
    fn default() -> Self {
        Self {
            verbose: false,
            static_reg: 0.0,
            pivot_tol: 1e-14,
        }
    }
}

impl LinalgSettings {
    /// Defaults overlaid with `FORBES_VERBOSE`, `FORBES_STATIC_REG` and
    /// `FORBES_PIVOT_TOL`. Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut settings = Self::default();

        if let Ok(v) = env::var("FORBES_VERBOSE") {
            settings.verbose = match v.parse::<u8>() {
                Ok(level) => level >= 1,
                Err(_) => v.eq_ignore_ascii_case("true"),
            };
        }
        if let Some(reg) = env::var("FORBES_STATIC_REG")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|v| v.is_finite() && *v >= 0.0)
        {
            settings.static_reg = reg;
        }
        if let Some(tol) = env::var("FORBES_PIVOT_TOL")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|v| v.is_finite() && *v >= 0.0)
        {
            settings.pivot_tol = tol;
        }

        settings
    }

    pub fn validate(&self) -> Result<()> {
        if !self.static_reg.is_finite() || self.static_reg < 0.0 {
            return Err(MatrixError::invalid(format!(
                "static_reg must be finite and non-negative, got {}",
                self.static_reg
            )));
        }
        if !self.pivot_tol.is_finite() || self.pivot_tol < 0.0 {
            return Err(MatrixError::invalid(format!(
                "pivot_tol must be finite and non-negative, got {}",
                self.pivot_tol
            )));
        }
        Ok(())
    }
}
