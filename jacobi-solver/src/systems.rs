//! Seeded generators for test and benchmark systems.

use jacobi_core::DenseMatrix;

/// Random right-hand side with entries in `[-1, 1)`.
pub fn random_rhs(n: usize, seed: u64) -> Vec<f32> {
    let mut rng = fastrand::Rng::with_seed(seed);
    (0..n).map(|_| rng.f32() * 2.0 - 1.0).collect()
}

/// Strictly row-diagonally-dominant `n x n` system `(A, b)`.
///
/// Off-diagonal entries are uniform in `[-1, 1)`; each diagonal entry is the
/// row's absolute off-diagonal sum plus `margin`.
pub fn diagonally_dominant(n: usize, margin: f32, seed: u64) -> (DenseMatrix, Vec<f32>) {
    let mut rng = fastrand::Rng::with_seed(seed);
    let mut matrix = DenseMatrix::zeros(n, n);
    let data = matrix.data_mut();
    for i in 0..n {
        let mut off_diagonal = 0.0f32;
        for j in (0..n).filter(|&j| j != i) {
            let value = rng.f32() * 2.0 - 1.0;
            data[i * n + j] = value;
            off_diagonal += value.abs();
        }
        data[i * n + i] = off_diagonal + margin;
    }
    (matrix, random_rhs(n, seed.wrapping_add(1)))
}

/// Symmetric, strictly diagonally dominant system with a positive diagonal,
/// hence symmetric positive definite.
pub fn symmetric_diagonally_dominant(n: usize, margin: f32, seed: u64) -> (DenseMatrix, Vec<f32>) {
    let mut rng = fastrand::Rng::with_seed(seed);
    let mut matrix = DenseMatrix::zeros(n, n);
    let data = matrix.data_mut();
    for i in 0..n {
        for j in (i + 1)..n {
            let value = rng.f32() * 2.0 - 1.0;
            data[i * n + j] = value;
            data[j * n + i] = value;
        }
    }
    for i in 0..n {
        let off_diagonal: f32 = (0..n)
            .filter(|&j| j != i)
            .map(|j| data[i * n + j].abs())
            .sum();
        data[i * n + i] = off_diagonal + margin;
    }
    (matrix, random_rhs(n, seed.wrapping_add(1)))
}

/// Max-norm of `A x - b`.
pub fn residual_inf_norm(a: &DenseMatrix, x: &[f32], b: &[f32]) -> f32 {
    match a.mul_vec(x) {
        Ok(ax) => ax
            .iter()
            .zip(b)
            .map(|(lhs, rhs)| (lhs - rhs).abs())
            .fold(0.0, f32::max),
        Err(_) => f32::INFINITY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jacobi_core::Matrix;

    #[test]
    fn test_generated_systems_are_dominant() {
        let (a, b) = diagonally_dominant(16, 1.0, 7);
        assert_eq!(a.dims(), (16, 16));
        assert_eq!(b.len(), 16);
        assert!(a.is_diagonally_dominant());

        let (s, _) = symmetric_diagonally_dominant(16, 0.5, 7);
        assert!(s.is_diagonally_dominant());
        for i in 0..16 {
            for j in 0..16 {
                assert_eq!(s.get(i, j), s.get(j, i));
            }
        }
    }

    #[test]
    fn test_generators_are_deterministic() {
        assert_eq!(diagonally_dominant(8, 1.0, 42), diagonally_dominant(8, 1.0, 42));
        assert_ne!(random_rhs(8, 1), random_rhs(8, 2));
    }

    #[test]
    fn test_residual_of_exact_solution() {
        let a = DenseMatrix::from_diagonal(&[2.0, 4.0]);
        assert_eq!(residual_inf_norm(&a, &[1.0, 0.5], &[2.0, 2.0]), 0.0);
        assert_eq!(residual_inf_norm(&a, &[1.0], &[2.0, 2.0]), f32::INFINITY);
    }
}
