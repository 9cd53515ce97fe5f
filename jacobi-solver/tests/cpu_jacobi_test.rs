mod common;

use common::{assert_approx_eq_vec, init_logging};
use jacobi_solver::systems::{diagonally_dominant, residual_inf_norm, symmetric_diagonally_dominant};
use jacobi_solver::{
    jacobi_solve, jacobi_solve_blocking, CpuDevice, DenseMatrix, Jacobi, JacobiCoreError,
    SolveAlgorithm, Termination,
};
use pollster::block_on;

#[test]
fn test_cpu_jacobi_two_by_two() -> Result<(), JacobiCoreError> {
    init_logging();
    block_on(async {
        let device = CpuDevice::new();
        let a: DenseMatrix = DenseMatrix::from_rows(&[vec![4.0, 1.0], vec![2.0, 3.0]])?;
        let b = [1.0, 2.0];

        let result = Jacobi::with_accuracy(1e-4).solve(&device, &a, &b).await?;
        assert_eq!(result.metadata.termination, Termination::Converged);
        assert!(result.metadata.iterations < 100);
        assert_approx_eq_vec(&result.x, &[0.1, 0.6], 1e-3);
        Ok(())
    })
}

#[test]
fn test_cpu_diagonal_system_single_sweep_is_exact() -> Result<(), JacobiCoreError> {
    block_on(async {
        let device = CpuDevice::new();
        let a: DenseMatrix = DenseMatrix::from_diagonal(&[2.0, 4.0, 8.0, 0.5]);
        let b = [1.0, 2.0, -4.0, 3.0];

        let result = Jacobi::with_params(1e-6, 1).solve(&device, &a, &b).await?;
        assert_eq!(result.metadata.iterations, 1);
        assert_eq!(result.metadata.termination, Termination::BudgetExhausted);
        assert_eq!(result.x, vec![0.5, 0.5, -0.5, 6.0]);

        // The second sweep reproduces the first and stops.
        let result = Jacobi::with_accuracy(1e-6).solve(&device, &a, &b).await?;
        assert_eq!(result.metadata.iterations, 2);
        assert_eq!(result.metadata.residual_norm_sq, Some(0.0));
        assert_eq!(result.x, vec![0.5, 0.5, -0.5, 6.0]);
        Ok(())
    })
}

#[test]
fn test_cpu_single_unknown() -> Result<(), JacobiCoreError> {
    let device = CpuDevice::new();
    let a: DenseMatrix = DenseMatrix::from_rows(&[vec![5.0]])?;
    let x = jacobi_solve_blocking(&a, &[10.0], 1e-6, &device)?;
    assert_approx_eq_vec(&x, &[2.0], 1e-6);
    Ok(())
}

#[test]
fn test_cpu_symmetric_dominant_converges() -> Result<(), JacobiCoreError> {
    block_on(async {
        let device = CpuDevice::new();
        let (a, b) = symmetric_diagonally_dominant(64, 1.0, 2024);
        let accuracy = 1e-5;

        let result = Jacobi::with_accuracy(accuracy)
            .record_history(true)
            .solve(&device, &a, &b)
            .await?;
        let metadata = &result.metadata;
        assert!(metadata.converged());
        assert_eq!(metadata.history.len(), metadata.iterations);
        let first = metadata.history[0];
        let last = *metadata.history.last().unwrap();
        assert!(last < first, "history did not trend down: {} -> {}", first, last);
        assert!(last < accuracy * accuracy);
        assert!(residual_inf_norm(&a, &result.x, &b) < 1e-2);
        Ok(())
    })
}

#[test]
fn test_cpu_solve_is_idempotent_across_pools() -> Result<(), JacobiCoreError> {
    block_on(async {
        let (a, b) = diagonally_dominant(200, 2.0, 11);
        let global = CpuDevice::new();

        let first = jacobi_solve(&a, &b, 1e-5, &global).await?;
        let second = jacobi_solve(&a, &b, 1e-5, &global).await?;
        assert_approx_eq_vec(&first, &second, 1e-6);

        // Reduction order differs with the pool size; results agree to rounding.
        let single = jacobi_solve(&a, &b, 1e-5, &CpuDevice::with_threads(1)?).await?;
        let quad = jacobi_solve(&a, &b, 1e-5, &CpuDevice::with_threads(4)?).await?;
        assert_approx_eq_vec(&single, &quad, 1e-5);
        assert_approx_eq_vec(&single, &first, 1e-5);
        Ok(())
    })
}

#[test]
fn test_cpu_non_dominant_system_exhausts_budget() -> Result<(), JacobiCoreError> {
    block_on(async {
        let device = CpuDevice::new();
        // The sweep matrix squares to -I: iterates cycle around the fixed
        // point (-0.5, 0.75) without ever reaching it.
        let a: DenseMatrix = DenseMatrix::from_rows(&[vec![1.0, 2.0], vec![-0.5, 1.0]])?;
        assert!(!a.is_diagonally_dominant());

        let result = Jacobi::default().solve(&device, &a, &[1.0, 1.0]).await?;
        assert_eq!(result.metadata.termination, Termination::BudgetExhausted);
        assert_eq!(result.metadata.iterations, 1024);
        assert!(result.x.iter().all(|v| v.is_finite()));
        Ok(())
    })
}

#[test]
fn test_cpu_zero_diagonal_is_not_rejected() -> Result<(), JacobiCoreError> {
    block_on(async {
        let device = CpuDevice::new();
        let a: DenseMatrix = DenseMatrix::from_rows(&[vec![0.0, 1.0], vec![1.0, 2.0]])?;
        let result = Jacobi::with_params(1e-6, 3).solve(&device, &a, &[1.0, 1.0]).await?;
        assert!(result.x.iter().any(|v| !v.is_finite()));
        assert!(!result.metadata.converged());
        Ok(())
    })
}

#[test]
fn test_cpu_zero_accuracy_runs_full_budget() -> Result<(), JacobiCoreError> {
    block_on(async {
        let device = CpuDevice::new();
        let a: DenseMatrix = DenseMatrix::from_diagonal(&[2.0, 2.0]);
        let result = Jacobi::with_params(0.0, 7).solve(&device, &a, &[2.0, 4.0]).await?;
        assert_eq!(result.metadata.iterations, 7);
        assert_eq!(result.metadata.termination, Termination::BudgetExhausted);
        assert_eq!(result.x, vec![1.0, 2.0]);
        Ok(())
    })
}

#[test]
fn test_cpu_rejects_invalid_inputs() {
    let device = CpuDevice::new();
    let square: DenseMatrix = DenseMatrix::from_diagonal(&[1.0, 1.0]);

    let err = block_on(jacobi_solve(&square, &[1.0, 2.0, 3.0], 1e-6, &device));
    assert!(matches!(err, Err(JacobiCoreError::InvalidDimensions(_))));

    let wide: DenseMatrix = DenseMatrix::new(2, 3, vec![1.0; 6]).unwrap();
    let err = block_on(jacobi_solve(&wide, &[1.0, 2.0], 1e-6, &device));
    assert!(matches!(err, Err(JacobiCoreError::InvalidDimensions(_))));

    let empty: DenseMatrix = DenseMatrix::zeros(0, 0);
    let err = block_on(jacobi_solve(&empty, &[], 1e-6, &device));
    assert!(matches!(err, Err(JacobiCoreError::InvalidDimensions(_))));

    let err = block_on(jacobi_solve(&square, &[1.0, 2.0], -1.0, &device));
    assert!(matches!(err, Err(JacobiCoreError::InvalidParameter(_))));
}
