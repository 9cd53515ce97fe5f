//! `jacobi-solver`: Jacobi iteration for dense, diagonally dominant linear
//! systems `Ax = b`, offloaded to the GPU through WGPU or run on a rayon pool.
//!
//! ```
//! use jacobi_solver::{jacobi_solve_blocking, CpuDevice, DenseMatrix};
//!
//! # fn main() -> Result<(), jacobi_solver::JacobiCoreError> {
//! let a = DenseMatrix::from_rows(&[vec![4.0, 1.0], vec![2.0, 3.0]])?;
//! let x = jacobi_solve_blocking(&a, &[1.0, 2.0], 1e-4, &CpuDevice::new())?;
//! assert!((x[0] - 0.1).abs() < 1e-3);
//! assert!((x[1] - 0.6).abs() < 1e-3);
//! # Ok(())
//! # }
//! ```

pub mod algorithms;
pub mod systems;

pub use algorithms::{
    ConvergenceMonitor, ConvergenceState, Jacobi, JacobiMetadata, SolveAlgorithm, SolveResult,
    Termination, MAX_ITERATIONS,
};
pub use jacobi_core::{
    device::{CpuDevice, Device, GpuDevice, TransferStats},
    DenseMatrix, DoubleBuffer, GpuDeviceOptions, GpuVector, JacobiCoreError, JacobiKernel, Matrix,
    Vector,
};

/// Solves `a x = b` with the default iteration budget and returns the last
/// iterate.
///
/// The result is only guaranteed to meet `accuracy` when the loop stopped by
/// converging; use [`Jacobi`] with [`SolveAlgorithm::solve`] to see
/// [`JacobiMetadata::termination`].
pub async fn jacobi_solve<D>(
    a: &DenseMatrix,
    b: &[f32],
    accuracy: f32,
    device: &D,
) -> Result<Vec<f32>, JacobiCoreError>
where
    D: Device,
    Jacobi: SolveAlgorithm<D, DenseMatrix, Value = f32>,
{
    let result = Jacobi::with_accuracy(accuracy).solve(device, a, b).await?;
    Ok(result.x)
}

/// Blocking wrapper around [`jacobi_solve`] for synchronous callers.
#[cfg(feature = "native")]
pub fn jacobi_solve_blocking<D>(
    a: &DenseMatrix,
    b: &[f32],
    accuracy: f32,
    device: &D,
) -> Result<Vec<f32>, JacobiCoreError>
where
    D: Device,
    Jacobi: SolveAlgorithm<D, DenseMatrix, Value = f32>,
{
    pollster::block_on(jacobi_solve(a, b, accuracy, device))
}
