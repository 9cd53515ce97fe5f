use jacobi_core::{device::Device, JacobiCoreError, Matrix};
use num_traits::Float;

pub mod convergence;
pub mod cpu_dense_jacobi; // Rayon Jacobi on the host
pub mod gpu_dense_jacobi; // WGPU Jacobi with device-resident iterates

pub use convergence::{ConvergenceMonitor, ConvergenceState, JacobiMetadata, Termination};

/// Iteration budget of a Jacobi solve unless configured otherwise.
pub const MAX_ITERATIONS: usize = 1024;

pub struct SolveResult<V: Float, M> {
    pub x: Vec<V>,   // Solution vector
    pub metadata: M, // Metadata about the solve process
}

// --- Algorithm Trait Definition ---
/// Trait representing a specific linear system solving algorithm.
/// Generic over the Device (CPU/GPU) and Matrix type it supports.
pub trait SolveAlgorithm<D: Device, M: Matrix> {
    /// The numeric type the algorithm operates on. Must match `Matrix::Value`.
    type Value: Float + Copy + Send + Sync + std::fmt::Debug + Default + bytemuck::Pod;
    type Metadata: std::fmt::Debug;

    /// Solves the linear system Ax = b for x.
    ///
    /// # Arguments
    ///
    /// * `device` - The execution device (CPU or GPU).
    /// * `a` - The coefficient matrix A.
    /// * `b` - The right-hand side vector b.
    fn solve(
        &self,
        device: &D,
        a: &M,
        b: &[Self::Value],
    ) -> impl std::future::Future<
        Output = Result<SolveResult<Self::Value, Self::Metadata>, JacobiCoreError>,
    > + Send;

    /// Shape checks shared by every implementation.
    fn validate_inputs(&self, a: &M, b: &[Self::Value]) -> Result<(), JacobiCoreError> {
        let (rows, cols) = a.dims();
        if !a.is_square() {
            return Err(JacobiCoreError::InvalidDimensions(format!(
                "Matrix A must be square (dims: {}x{})",
                rows, cols
            )));
        }
        if rows != b.len() {
            return Err(JacobiCoreError::InvalidDimensions(format!(
                "Matrix A rows ({}) must match RHS vector b length ({})",
                rows,
                b.len()
            )));
        }
        if rows == 0 {
            return Err(JacobiCoreError::InvalidDimensions(
                "System must have at least one unknown".to_string(),
            ));
        }
        Ok(())
    }
}

/// Jacobi iteration for diagonally dominant dense systems.
///
/// Runs until the squared distance between successive iterates drops below
/// `accuracy²` or `max_iterations` sweeps have been made. Running out of
/// iterations is not an error; [`JacobiMetadata::termination`] tells the two
/// outcomes apart.
#[derive(Debug, Clone)]
pub struct Jacobi {
    pub accuracy: f32,
    pub max_iterations: usize,
    /// Keep the squared residual norm of every sweep in the metadata.
    pub record_history: bool,
}

impl Default for Jacobi {
    fn default() -> Self {
        Self {
            accuracy: 1e-6,
            max_iterations: MAX_ITERATIONS,
            record_history: false,
        }
    }
}

impl Jacobi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default budget with the given stopping accuracy.
    pub fn with_accuracy(accuracy: f32) -> Self {
        Self {
            accuracy,
            ..Self::default()
        }
    }

    pub fn with_params(accuracy: f32, max_iterations: usize) -> Self {
        Self {
            accuracy,
            max_iterations,
            ..Self::default()
        }
    }

    pub fn record_history(mut self, record: bool) -> Self {
        self.record_history = record;
        self
    }

    /// Accuracy must be a finite, non-negative number. Zero is accepted and
    /// simply never satisfies the stopping test.
    pub fn validate_params(&self) -> Result<(), JacobiCoreError> {
        if !self.accuracy.is_finite() || self.accuracy < 0.0 {
            return Err(JacobiCoreError::InvalidParameter(format!(
                "accuracy must be finite and non-negative, got {}",
                self.accuracy
            )));
        }
        Ok(())
    }

    pub(crate) fn monitor(&self) -> ConvergenceMonitor {
        ConvergenceMonitor::new(self.accuracy, self.max_iterations, self.record_history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_budget() {
        let jacobi = Jacobi::default();
        assert_eq!(jacobi.max_iterations, 1024);
        assert!(!jacobi.record_history);
        assert!(jacobi.validate_params().is_ok());
    }

    #[test]
    fn test_builders() {
        let jacobi = Jacobi::with_params(1e-3, 10).record_history(true);
        assert_eq!(jacobi.accuracy, 1e-3);
        assert_eq!(jacobi.max_iterations, 10);
        assert!(jacobi.record_history);
        assert_eq!(Jacobi::with_accuracy(0.5).max_iterations, MAX_ITERATIONS);
    }

    #[test]
    fn test_rejects_bad_accuracy() {
        for accuracy in [-1.0, f32::NAN, f32::INFINITY] {
            assert!(matches!(
                Jacobi::with_accuracy(accuracy).validate_params(),
                Err(JacobiCoreError::InvalidParameter(_))
            ));
        }
        assert!(Jacobi::with_accuracy(0.0).validate_params().is_ok());
    }
}
