//! Limited-memory quasi-Newton minimizer with L1 (OWL-QN) or L2 regularization.
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::errors::{KeitaiError, Result};

/// Number of correction pairs kept.
const MEMORY_SIZE: usize = 10;
/// Maximum number of step halvings in a line search.
const MAX_LINESEARCH: usize = 30;
/// Sufficient decrease constant of the Armijo condition.
const ARMIJO_GAMMA: f64 = 1e-4;
/// Number of consecutive small improvements regarded as convergence.
const NUM_SMALL_IMPROVEMENTS: usize = 3;

/// Kind of regularization.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Regularization {
    /// L1 regularization, which leads to a sparse model.
    L1,
    /// L2 regularization.
    L2,
}

/// Handle to request the trainer to stop.
///
/// A request is honored between iterations, and the current weights are kept.
#[derive(Clone, Debug, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Creates a new handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests to stop.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Checks if stopping has been requested.
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub(crate) struct Optimizer {
    pub regularization: Regularization,
    pub cost: f64,
    pub tolerance: f64,
    pub max_iter: u64,
    pub divergence_patience: usize,
    pub stop_handle: StopHandle,
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn norm(a: &[f64]) -> f64 {
    dot(a, a).sqrt()
}

impl Optimizer {
    /// Adds the regularization term to the objective and the smooth part of the gradient.
    fn regularize(&self, x: &[f64], loss: f64, grad: &mut [f64]) -> f64 {
        match self.regularization {
            Regularization::L1 => loss + self.cost * x.iter().map(|w| w.abs()).sum::<f64>(),
            Regularization::L2 => {
                for (g, w) in grad.iter_mut().zip(x) {
                    *g += self.cost * w;
                }
                loss + 0.5 * self.cost * dot(x, x)
            }
        }
    }

    /// Computes the pseudo-gradient, which is the steepest descent direction
    /// of the objective with the non-differentiable L1 term.
    fn pseudo_gradient(&self, x: &[f64], grad: &[f64], pg: &mut [f64]) {
        if self.regularization != Regularization::L1 || self.cost == 0.0 {
            pg.copy_from_slice(grad);
            return;
        }
        let c = self.cost;
        for ((p, &w), &g) in pg.iter_mut().zip(x).zip(grad) {
            *p = if w < 0.0 {
                g - c
            } else if w > 0.0 {
                g + c
            } else if g + c < 0.0 {
                g + c
            } else if g - c > 0.0 {
                g - c
            } else {
                0.0
            };
        }
    }

    /// Minimizes `f` from `x`.
    ///
    /// `f` returns the unregularized loss at the given point and writes its gradient.
    pub fn minimize<F>(&self, mut x: Vec<f64>, mut f: F) -> Result<Vec<f64>>
    where
        F: FnMut(&[f64], &mut [f64]) -> f64,
    {
        let dim = x.len();
        let l1 = self.regularization == Regularization::L1 && self.cost > 0.0;

        let mut grad = vec![0.0; dim];
        let loss = f(&x, &mut grad);
        let mut obj = self.regularize(&x, loss, &mut grad);
        if !obj.is_finite() {
            return Err(KeitaiError::Divergence(format!(
                "The initial objective is not finite: {obj}"
            )));
        }

        let mut pg = vec![0.0; dim];
        let mut dir = vec![0.0; dim];
        let mut x_new = vec![0.0; dim];
        let mut grad_new = vec![0.0; dim];
        let mut history: VecDeque<(Vec<f64>, Vec<f64>, f64)> = VecDeque::new();
        let mut num_small = 0;
        let mut num_failures = 0;
        // Step to resume from after a failed steepest descent search.
        let mut retry_step = None;

        for iter in 1..=self.max_iter {
            if self.stop_handle.is_stopped() {
                tracing::info!(iter, obj, "stopped by request");
                return Ok(x);
            }

            self.pseudo_gradient(&x, &grad, &mut pg);
            let pg_norm = norm(&pg);
            if pg_norm <= self.tolerance * norm(&x).max(1.0) {
                tracing::info!(iter, obj, pg_norm, "converged");
                return Ok(x);
            }

            // Two-loop recursion.
            for (d, p) in dir.iter_mut().zip(&pg) {
                *d = -p;
            }
            let mut alphas = Vec::with_capacity(history.len());
            for (s, y, rho) in history.iter().rev() {
                let a = rho * dot(s, &dir);
                for (d, yi) in dir.iter_mut().zip(y) {
                    *d -= a * yi;
                }
                alphas.push(a);
            }
            if let Some((s, y, _)) = history.back() {
                let gamma = dot(s, y) / dot(y, y);
                for d in dir.iter_mut() {
                    *d *= gamma;
                }
            }
            for ((s, y, rho), a) in history.iter().zip(alphas.iter().rev()) {
                let b = rho * dot(y, &dir);
                for (d, si) in dir.iter_mut().zip(s) {
                    *d += (a - b) * si;
                }
            }
            if l1 {
                for (d, p) in dir.iter_mut().zip(&pg) {
                    if *d * p >= 0.0 {
                        *d = 0.0;
                    }
                }
            }
            if dot(&dir, &pg) >= 0.0 {
                history.clear();
                for (d, p) in dir.iter_mut().zip(&pg) {
                    *d = -p;
                }
            }

            // Backtracking line search.
            let mut step = match retry_step.take() {
                Some(step) if history.is_empty() => step,
                _ if history.is_empty() => 1.0 / pg_norm,
                _ => 1.0,
            };
            let mut accepted = None;
            for _ in 0..MAX_LINESEARCH {
                for i in 0..dim {
                    let mut v = x[i] + step * dir[i];
                    if l1 {
                        let orthant = if x[i] != 0.0 { x[i] } else { -pg[i] };
                        if v * orthant <= 0.0 {
                            v = 0.0;
                        }
                    }
                    x_new[i] = v;
                }
                let loss = f(&x_new, &mut grad_new);
                let obj_new = self.regularize(&x_new, loss, &mut grad_new);
                let decrease: f64 = pg
                    .iter()
                    .zip(&x_new)
                    .zip(&x)
                    .map(|((p, xn), xo)| p * (xn - xo))
                    .sum();
                if obj_new <= obj + ARMIJO_GAMMA * decrease {
                    accepted = Some(obj_new);
                    break;
                }
                step *= 0.5;
            }

            let Some(obj_new) = accepted else {
                // Rounding errors dominate around a flat optimum.
                if num_small > 0 {
                    tracing::info!(iter, obj, "converged");
                    return Ok(x);
                }
                num_failures += 1;
                tracing::warn!(iter, obj, num_failures, "line search failed");
                if num_failures >= self.divergence_patience {
                    return Err(KeitaiError::Divergence(format!(
                        "No decrease of the objective in {num_failures} consecutive iterations"
                    )));
                }
                if history.is_empty() {
                    retry_step = Some(step);
                }
                history.clear();
                continue;
            };
            num_failures = 0;

            let s: Vec<f64> = x_new.iter().zip(&x).map(|(a, b)| a - b).collect();
            let y: Vec<f64> = grad_new.iter().zip(&grad).map(|(a, b)| a - b).collect();
            let sy = dot(&s, &y);
            if sy > 0.0 {
                if history.len() == MEMORY_SIZE {
                    history.pop_front();
                }
                history.push_back((s, y, 1.0 / sy));
            }

            let improvement = (obj - obj_new) / obj.abs().max(1.0);
            std::mem::swap(&mut x, &mut x_new);
            std::mem::swap(&mut grad, &mut grad_new);
            obj = obj_new;

            let num_active = x.iter().filter(|&&w| w != 0.0).count();
            tracing::info!(iter, obj, improvement, num_active, "iteration");

            if improvement < self.tolerance {
                num_small += 1;
                if num_small >= NUM_SMALL_IMPROVEMENTS {
                    tracing::info!(iter, obj, "converged");
                    return Ok(x);
                }
            } else {
                num_small = 0;
            }
        }

        tracing::warn!(
            max_iter = self.max_iter,
            obj,
            "reached the maximum number of iterations without convergence"
        );
        Ok(x)
    }
}
