//! Annualized money-weighted rate of return (XIRR).
//!
//! Solves for `r` in
//!
//! ```text
//! Σ a_i / (1 + r)^t_i = 0,    t_i = days(flow_i − flow_0) / 365
//! ```
//!
//! with Newton-Raphson from a 10% seed:
//!
//! ```text
//! f(r)  = Σ a_i / (1 + r)^t_i
//! f'(r) = Σ −t_i · a_i / (1 + r)^(t_i + 1)
//! r'    = r − f(r) / f'(r)
//! ```
//!
//! There is no bracketing fallback. Series with several sign changes or extreme
//! value ratios can stall or wander; `XirrOutcome::termination` tells callers
//! whether the returned rate is a converged root or a best-effort value.

use crate::domain::CashFlow;
use serde::Serialize;
use tracing::debug;

const SEED_RATE: f64 = 0.10;
const MAX_ITERATIONS: usize = 100;
const PRECISION: f64 = 1e-6;
const FLAT_DERIVATIVE: f64 = 1e-12;
const DAYS_PER_YEAR: f64 = 365.0;

/// Why the solver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Successive iterates differ by less than the precision.
    Converged,
    /// `|f'(r)|` fell below the flatness threshold; the pre-step rate is returned.
    FlatDerivative,
    /// Iteration budget exhausted; the last iterate is returned.
    IterationLimit,
    /// An iterate left the finite domain; the last finite rate is returned.
    Diverged,
    /// Fewer than two flows; nothing to solve.
    InsufficientFlows,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct XirrOutcome {
    /// Annualized rate as a percentage (10.0 means 10%).
    pub rate_pct: f64,
    pub iterations: usize,
    pub termination: Termination,
}

impl XirrOutcome {
    fn stop(rate: f64, iterations: usize, termination: Termination) -> Self {
        if termination != Termination::Converged {
            debug!(
                "XIRR stopped without converging: {:?} after {} iterations at {:.6}",
                termination, iterations, rate
            );
        }
        Self {
            rate_pct: rate * 100.0,
            iterations,
            termination,
        }
    }

    pub fn converged(&self) -> bool {
        self.termination == Termination::Converged
    }
}

/// Rate as a percentage. Shorthand for `solve(flows).rate_pct`.
pub fn solve_rate(flows: &[CashFlow]) -> f64 {
    solve(flows).rate_pct
}

/// Run the solver. The first flow in `flows` is the elapsed-time origin, so
/// callers pass series sorted ascending by time.
pub fn solve(flows: &[CashFlow]) -> XirrOutcome {
    if flows.len() < 2 {
        return XirrOutcome {
            rate_pct: 0.0,
            iterations: 0,
            termination: Termination::InsufficientFlows,
        };
    }

    let terms = year_fractions(flows);
    let mut rate = SEED_RATE;

    for iteration in 0..MAX_ITERATIONS {
        let (f, df) = npv_and_derivative(&terms, rate);

        if !f.is_finite() || !df.is_finite() {
            return XirrOutcome::stop(rate, iteration, Termination::Diverged);
        }
        if df.abs() < FLAT_DERIVATIVE {
            return XirrOutcome::stop(rate, iteration, Termination::FlatDerivative);
        }

        let next = rate - f / df;
        if !next.is_finite() {
            return XirrOutcome::stop(rate, iteration, Termination::Diverged);
        }
        if (next - rate).abs() < PRECISION {
            return XirrOutcome::stop(next, iteration + 1, Termination::Converged);
        }
        rate = next;
    }

    XirrOutcome::stop(rate, MAX_ITERATIONS, Termination::IterationLimit)
}

/// Net present value of `flows` at `rate` (a fraction, not a percentage).
pub fn npv(flows: &[CashFlow], rate: f64) -> f64 {
    if flows.is_empty() {
        return 0.0;
    }
    npv_and_derivative(&year_fractions(flows), rate).0
}

fn year_fractions(flows: &[CashFlow]) -> Vec<(f64, f64)> {
    let origin = flows[0].time_ms;
    flows
        .iter()
        .map(|flow| (flow.amount, flow.time_ms.days_since(origin) / DAYS_PER_YEAR))
        .collect()
}

fn npv_and_derivative(terms: &[(f64, f64)], rate: f64) -> (f64, f64) {
    let mut f = 0.0;
    let mut df = 0.0;
    for &(amount, years) in terms {
        let factor = (1.0 + rate).powf(years);
        f += amount / factor;
        df -= amount * years / (factor * (1.0 + rate));
    }
    (f, df)
}
