//! Stopping test for the Jacobi loop.
//!
//! `Running` moves to the terminal `Converged` state once the squared distance
//! between successive iterates is below `accuracy²`. Exhausting the budget is
//! a loop exit, not a state: the monitor stays `Running` and reports
//! [`Termination::BudgetExhausted`].

use log::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceState {
    Running,
    Converged,
}

/// Why the iteration loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The last sweep moved the iterate by less than the accuracy.
    Converged,
    /// The iteration budget ran out first. The returned vector is the last
    /// iterate and carries no accuracy guarantee.
    BudgetExhausted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JacobiMetadata {
    /// Number of sweeps performed.
    pub iterations: usize,
    /// Squared norm of the last update, `None` when no sweep ran.
    pub residual_norm_sq: Option<f32>,
    pub termination: Termination,
    /// Per-sweep squared norms, filled when history recording is enabled.
    pub history: Vec<f32>,
}

impl JacobiMetadata {
    pub fn converged(&self) -> bool {
        self.termination == Termination::Converged
    }
}

#[derive(Debug, Clone)]
pub struct ConvergenceMonitor {
    threshold_sq: f32,
    max_iterations: usize,
    iterations: usize,
    state: ConvergenceState,
    last_norm_sq: Option<f32>,
    history: Option<Vec<f32>>,
}

impl ConvergenceMonitor {
    pub fn new(accuracy: f32, max_iterations: usize, record_history: bool) -> Self {
        Self {
            threshold_sq: accuracy * accuracy,
            max_iterations,
            iterations: 0,
            state: ConvergenceState::Running,
            last_norm_sq: None,
            history: record_history.then(Vec::new),
        }
    }

    pub fn state(&self) -> ConvergenceState {
        self.state
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// True while another sweep is allowed.
    pub fn should_continue(&self) -> bool {
        self.state == ConvergenceState::Running && self.iterations < self.max_iterations
    }

    /// Records the squared update norm of one sweep.
    pub fn record(&mut self, norm_sq: f32) -> ConvergenceState {
        self.iterations += 1;
        self.last_norm_sq = Some(norm_sq);
        if let Some(history) = self.history.as_mut() {
            history.push(norm_sq);
        }
        debug!("Iteration {}: |x_next - x_curr|^2 = {:e}", self.iterations, norm_sq);

        // NaN never compares below the threshold, so a diverged iterate keeps running.
        if norm_sq < self.threshold_sq {
            self.state = ConvergenceState::Converged;
        }
        self.state
    }

    pub fn termination(&self) -> Termination {
        match self.state {
            ConvergenceState::Converged => Termination::Converged,
            ConvergenceState::Running => Termination::BudgetExhausted,
        }
    }

    /// Logs the outcome and turns the monitor into solve metadata.
    pub fn finish(self) -> JacobiMetadata {
        let termination = self.termination();
        match termination {
            Termination::Converged => info!(
                "Jacobi converged in {} iterations (|dx|^2 = {:e})",
                self.iterations,
                self.last_norm_sq.unwrap_or_default()
            ),
            Termination::BudgetExhausted => warn!(
                "Jacobi reached maximum iterations ({}) without converging (last |dx|^2 = {:?})",
                self.max_iterations, self.last_norm_sq
            ),
        }
        JacobiMetadata {
            iterations: self.iterations,
            residual_norm_sq: self.last_norm_sq,
            termination,
            history: self.history.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converges_below_threshold_squared() {
        let mut monitor = ConvergenceMonitor::new(0.1, 10, false);
        assert!(monitor.should_continue());
        assert_eq!(monitor.record(0.5), ConvergenceState::Running);
        // 0.01 is not strictly below 0.1^2.
        assert_eq!(monitor.record(0.1 * 0.1), ConvergenceState::Running);
        assert_eq!(monitor.record(0.009), ConvergenceState::Converged);
        assert!(!monitor.should_continue());

        let metadata = monitor.finish();
        assert!(metadata.converged());
        assert_eq!(metadata.iterations, 3);
        assert_eq!(metadata.residual_norm_sq, Some(0.009));
        assert!(metadata.history.is_empty());
    }

    #[test]
    fn test_budget_exhaustion_is_not_a_state() {
        let mut monitor = ConvergenceMonitor::new(1e-6, 2, true);
        monitor.record(1.0);
        monitor.record(0.5);
        assert!(!monitor.should_continue());
        assert_eq!(monitor.state(), ConvergenceState::Running);
        assert_eq!(monitor.termination(), Termination::BudgetExhausted);

        let metadata = monitor.finish();
        assert!(!metadata.converged());
        assert_eq!(metadata.history, vec![1.0, 0.5]);
    }

    #[test]
    fn test_nan_norm_keeps_running() {
        let mut monitor = ConvergenceMonitor::new(1.0, 5, false);
        assert_eq!(monitor.record(f32::NAN), ConvergenceState::Running);
        assert!(monitor.should_continue());
    }

    #[test]
    fn test_zero_budget_never_runs() {
        let monitor = ConvergenceMonitor::new(1.0, 0, false);
        assert!(!monitor.should_continue());
        let metadata = monitor.finish();
        assert_eq!(metadata.iterations, 0);
        assert_eq!(metadata.residual_norm_sq, None);
        assert_eq!(metadata.termination, Termination::BudgetExhausted);
    }
}
