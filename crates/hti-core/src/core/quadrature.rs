use thiserror::Error;

/// Trapezoidal-rule error coefficient, `h^3 f'' / 12` per panel.
const TRAPEZOID_ERROR_COEFFICIENT: f64 = 1.0 / 12.0;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum QuadratureError {
    #[error("At least 2 lambda points are required for integration, got {points}")]
    InsufficientPoints { points: usize },

    #[error(
        "Integration inputs are not aligned: {lambdas} lambdas, {means} means, {errors} errors"
    )]
    LengthMismatch {
        lambdas: usize,
        means: usize,
        errors: usize,
    },

    #[error("Lambda {lambda} at position {index} is not strictly greater than its predecessor")]
    NotAscending { index: usize, lambda: f64 },

    #[error("Standard error at position {index} is negative or not finite")]
    InvalidError { index: usize },
}

/// Free-energy difference of one path with its two error components.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct IntegrationResult {
    pub value: f64,
    pub statistical_error: f64,
    pub systematic_error: f64,
}

/// Per-lambda mean observable curve of one stage, index aligned.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StageResult {
    lambdas: Vec<f64>,
    means: Vec<f64>,
    errors: Vec<f64>,
}

impl StageResult {
    pub fn new(
        lambdas: Vec<f64>,
        means: Vec<f64>,
        errors: Vec<f64>,
    ) -> Result<Self, QuadratureError> {
        check_lengths(&lambdas, &means, &errors)?;
        let mut result = Self {
            lambdas,
            means,
            errors,
        };
        result.sort_by_lambda();
        Ok(result)
    }

    fn sort_by_lambda(&mut self) {
        if self.lambdas.windows(2).all(|w| w[0] <= w[1]) {
            return;
        }
        let mut order: Vec<usize> = (0..self.lambdas.len()).collect();
        order.sort_by(|&a, &b| self.lambdas[a].total_cmp(&self.lambdas[b]));
        self.lambdas = order.iter().map(|&i| self.lambdas[i]).collect();
        self.means = order.iter().map(|&i| self.means[i]).collect();
        self.errors = order.iter().map(|&i| self.errors[i]).collect();
    }

    pub fn lambdas(&self) -> &[f64] {
        &self.lambdas
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    pub fn errors(&self) -> &[f64] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.lambdas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lambdas.is_empty()
    }

    /// `(lambda, mean, error)` rows in ascending lambda order.
    pub fn rows(&self) -> impl Iterator<Item = (f64, f64, f64)> + '_ {
        self.lambdas
            .iter()
            .zip(&self.means)
            .zip(&self.errors)
            .map(|((&l, &m), &e)| (l, m, e))
    }

    pub fn integrate(&self) -> Result<IntegrationResult, QuadratureError> {
        integrate(&self.lambdas, &self.means, &self.errors)
    }
}

fn check_lengths(lambdas: &[f64], means: &[f64], errors: &[f64]) -> Result<(), QuadratureError> {
    if lambdas.len() != means.len() || lambdas.len() != errors.len() {
        return Err(QuadratureError::LengthMismatch {
            lambdas: lambdas.len(),
            means: means.len(),
            errors: errors.len(),
        });
    }
    Ok(())
}

/// Integrates `means` over `lambdas` with the composite trapezoidal rule.
///
/// `lambdas` must be strictly ascending. The statistical error propagates the per-point
/// standard errors through the quadrature weights. The systematic error is a curvature
/// based estimate of the trapezoidal discretization error; it is a diagnostic, not a
/// guaranteed bound, and is zero when only two points are available.
pub fn integrate(
    lambdas: &[f64],
    means: &[f64],
    errors: &[f64],
) -> Result<IntegrationResult, QuadratureError> {
    check_lengths(lambdas, means, errors)?;
    if lambdas.len() < 2 {
        return Err(QuadratureError::InsufficientPoints {
            points: lambdas.len(),
        });
    }
    for (i, w) in lambdas.windows(2).enumerate() {
        if w[1] <= w[0] {
            return Err(QuadratureError::NotAscending {
                index: i + 1,
                lambda: w[1],
            });
        }
    }
    if let Some(index) = errors.iter().position(|e| !e.is_finite() || *e < 0.0) {
        return Err(QuadratureError::InvalidError { index });
    }

    Ok(IntegrationResult {
        value: trapezoid(lambdas, means),
        statistical_error: propagated_error(lambdas, errors),
        systematic_error: discretization_error(lambdas, means),
    })
}

fn trapezoid(x: &[f64], y: &[f64]) -> f64 {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xw, yw)| 0.5 * (yw[0] + yw[1]) * (xw[1] - xw[0]))
        .sum()
}

/// Quadrature weight of each point: half of each adjacent gap, so an interior point
/// shared by two panels is counted once.
fn trapezoid_weights(x: &[f64]) -> Vec<f64> {
    let n = x.len();
    (0..n)
        .map(|i| {
            let left = if i > 0 { x[i] - x[i - 1] } else { 0.0 };
            let right = if i + 1 < n { x[i + 1] - x[i] } else { 0.0 };
            0.5 * (left + right)
        })
        .collect()
}

fn propagated_error(x: &[f64], err: &[f64]) -> f64 {
    trapezoid_weights(x)
        .iter()
        .zip(err)
        .map(|(w, e)| (w * e).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// Non-uniform three-point second difference at each interior point.
fn second_differences(x: &[f64], y: &[f64]) -> Vec<f64> {
    (1..x.len().saturating_sub(1))
        .map(|i| {
            let h1 = x[i] - x[i - 1];
            let h2 = x[i + 1] - x[i];
            2.0 * ((y[i + 1] - y[i]) / h2 - (y[i] - y[i - 1]) / h1) / (h1 + h2)
        })
        .collect()
}

fn discretization_error(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len();
    if n < 3 {
        return 0.0;
    }
    // curvature[k] belongs to point k + 1
    let curvature = second_differences(x, y);

    (0..n - 1)
        .map(|panel| {
            let ends = [panel, panel + 1];
            let known: Vec<f64> = ends
                .iter()
                .filter(|&&p| p >= 1 && p <= n - 2)
                .map(|&p| curvature[p - 1].abs())
                .collect();
            let h = x[panel + 1] - x[panel];
            let f2 = known.iter().sum::<f64>() / known.len() as f64;
            TRAPEZOID_ERROR_COEFFICIENT * h.powi(3) * f2
        })
        .sum()
}
