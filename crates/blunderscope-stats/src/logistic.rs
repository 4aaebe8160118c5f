//! L1-penalized, class-balanced logistic regression.
//!
//! Minimizes
//!
//! ```text
//! ||w||_1 + C * Σ_i s_i * log(1 + exp(-y_i * (x_i · w + b)))
//! ```
//!
//! where `y_i ∈ {-1, +1}`, the intercept `b` is not penalized and
//! `s_i = n / (2 * n_class(y_i))` gives both classes equal total weight.
//!
//! The problem is solved with FISTA (accelerated proximal gradient) using a
//! constant step `1 / L`, where `L` bounds the Lipschitz constant of the
//! smooth part, plus an adaptive momentum restart. The solver is fully
//! deterministic and starts from zero.

/// Solver settings.
#[derive(Debug, Clone, PartialEq)]
pub struct LogisticParams {
    /// Inverse regularization strength.
    pub c: f64,
    pub max_iter: usize,
    /// Convergence threshold on the largest parameter change per iteration.
    pub tol: f64,
}

impl Default for LogisticParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 10_000,
            tol: 1e-7,
        }
    }
}

/// A fitted binary classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct LogisticModel {
    /// One coefficient per input column.
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    pub iterations: usize,
    pub converged: bool,
}

impl LogisticModel {
    /// Probability of the positive class for one row.
    #[must_use]
    pub fn predict_proba(&self, row: &[f64]) -> f64 {
        sigmoid(dot(&self.coefficients, row) + self.intercept)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum LogisticError {
    #[display("cannot fit a classifier on an empty sample")]
    Empty,
    #[display("training labels contain a single class")]
    SingleClass,
    #[display("row {row} has {actual} columns, expected {expected}")]
    DimensionMismatch {
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[display("{len} rows but {labels} labels")]
    LabelMismatch { len: usize, labels: usize },
}

/// Fits an L1-penalized, class-balanced logistic regression.
///
/// # Arguments
///
/// * `x` - Row-major feature matrix
/// * `y` - `true` for the positive class
/// * `params` - Regularization strength and stopping criteria
///
/// # Errors
///
/// Fails when the sample is empty, the shapes disagree, or only one class is
/// present.
#[expect(clippy::cast_precision_loss)]
pub fn fit_l1_balanced(
    x: &[Vec<f64>],
    y: &[bool],
    params: &LogisticParams,
) -> Result<LogisticModel, LogisticError> {
    if x.is_empty() {
        return Err(LogisticError::Empty);
    }
    if x.len() != y.len() {
        return Err(LogisticError::LabelMismatch {
            len: x.len(),
            labels: y.len(),
        });
    }
    let width = x[0].len();
    if let Some((row, r)) = x.iter().enumerate().find(|(_, r)| r.len() != width) {
        return Err(LogisticError::DimensionMismatch {
            row,
            expected: width,
            actual: r.len(),
        });
    }
    let positives = y.iter().filter(|&&label| label).count();
    let negatives = y.len() - positives;
    if positives == 0 || negatives == 0 {
        return Err(LogisticError::SingleClass);
    }

    let n = y.len() as f64;
    let weights = y
        .iter()
        .map(|&label| {
            let class_size = if label { positives } else { negatives };
            params.c * n / (2.0 * class_size as f64)
        })
        .collect::<Vec<_>>();
    let targets = y.iter().map(|&label| f64::from(u8::from(label))).collect::<Vec<_>>();

    let step = 1.0 / lipschitz_bound(x, &weights);
    let objective = Smooth {
        x,
        weights: &weights,
        targets: &targets,
    };

    // parameters are laid out as [w_0, ..., w_{d-1}, b]
    let mut current = vec![0.0; width + 1];
    let mut momentum_point = current.clone();
    let mut t = 1.0_f64;
    let mut iterations = 0;
    let mut converged = false;

    while iterations < params.max_iter {
        iterations += 1;
        let gradient = objective.gradient(&momentum_point);
        let mut next = momentum_point
            .iter()
            .zip(&gradient)
            .map(|(p, g)| p - step * g)
            .collect::<Vec<_>>();
        for w in &mut next[..width] {
            *w = soft_threshold(*w, step);
        }

        let change = next
            .iter()
            .zip(&current)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);

        // restart momentum when it points against the last step
        let restart = momentum_point
            .iter()
            .zip(&next)
            .zip(&current)
            .map(|((y, n), c)| (y - n) * (n - c))
            .sum::<f64>()
            > 0.0;
        let t_next = if restart {
            1.0
        } else {
            f64::midpoint(1.0, (1.0 + 4.0 * t * t).sqrt())
        };
        let beta = if restart { 0.0 } else { (t - 1.0) / t_next };
        momentum_point = next
            .iter()
            .zip(&current)
            .map(|(n, c)| n + beta * (n - c))
            .collect();
        current = next;
        t = t_next;

        if change < params.tol {
            converged = true;
            break;
        }
    }

    let intercept = current.pop().unwrap_or(0.0);
    Ok(LogisticModel {
        coefficients: current,
        intercept,
        iterations,
        converged,
    })
}

struct Smooth<'a> {
    x: &'a [Vec<f64>],
    weights: &'a [f64],
    targets: &'a [f64],
}

impl Smooth<'_> {
    /// Gradient of the weighted log-loss with respect to `[w, b]`.
    fn gradient(&self, params: &[f64]) -> Vec<f64> {
        let (w, b) = params.split_at(params.len() - 1);
        let mut gradient = vec![0.0; params.len()];
        for ((row, weight), target) in self.x.iter().zip(self.weights).zip(self.targets) {
            let residual = weight * (sigmoid(dot(w, row) + b[0]) - target);
            for (g, v) in gradient.iter_mut().zip(row) {
                *g += residual * v;
            }
            gradient[params.len() - 1] += residual;
        }
        gradient
    }
}

/// Upper bound on the Lipschitz constant of the smooth part's gradient.
///
/// The Hessian is bounded by `Aᵀ S A / 4` with `A = [X, 1]`; its largest
/// eigenvalue is estimated by power iteration, padded, and capped by the trace.
fn lipschitz_bound(x: &[Vec<f64>], weights: &[f64]) -> f64 {
    const POWER_ITERATIONS: usize = 50;
    const PADDING: f64 = 1.1;

    let width = x[0].len() + 1;
    let augmented = |row: &[f64], i: usize| if i + 1 == width { 1.0 } else { row[i] };
    let apply = |v: &[f64]| {
        let mut out = vec![0.0; width];
        for (row, weight) in x.iter().zip(weights) {
            let projection = (0..width).map(|i| augmented(row, i) * v[i]).sum::<f64>();
            for (i, o) in out.iter_mut().enumerate() {
                *o += weight * projection * augmented(row, i);
            }
        }
        out
    };

    let trace = x
        .iter()
        .zip(weights)
        .map(|(row, weight)| weight * (1.0 + row.iter().map(|v| v * v).sum::<f64>()))
        .sum::<f64>();

    let mut v = vec![1.0; width];
    let mut eigenvalue = 0.0;
    for _ in 0..POWER_ITERATIONS {
        let next = apply(&v);
        let norm = dot(&next, &next).sqrt();
        if norm == 0.0 {
            break;
        }
        eigenvalue = norm / dot(&v, &v).sqrt();
        v = next.into_iter().map(|value| value / norm).collect();
    }

    let bound = (eigenvalue * PADDING).min(trace).max(f64::MIN_POSITIVE);
    bound / 4.0
}

fn soft_threshold(value: f64, threshold: f64) -> f64 {
    value.signum() * (value.abs() - threshold).max(0.0)
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
