//! Host-side data-parallel kernels backing `CpuDevice`.
//!
//! Rows are distributed over the rayon pool; the residual contribution of
//! every row is combined with rayon's parallel `sum`, so partial sums may be
//! added in any order.

use crate::error::JacobiCoreError;
use rayon::prelude::*;

/// One Jacobi sweep over a dense row-major `n x n` matrix.
///
/// Writes `x_next[i] = inv_diag[i] * (b[i] - sum_{j != i} a[i][j] * x_curr[j])`
/// and returns `sum_i (x_next[i] - x_curr[i])^2`.
pub fn jacobi_update_and_reduce(
    a: &[f32],
    b: &[f32],
    inv_diag: &[f32],
    x_curr: &[f32],
    x_next: &mut [f32],
) -> Result<f32, JacobiCoreError> {
    let n = x_curr.len();
    if a.len() != n * n {
        return Err(JacobiCoreError::InvalidDimensions(format!(
            "Matrix has {} elements, expected {}x{}",
            a.len(),
            n,
            n
        )));
    }
    let mismatched = [("b", b.len()), ("inv_diag", inv_diag.len()), ("x_next", x_next.len())]
        .into_iter()
        .find(|&(_, len)| len != n);
    if let Some((label, len)) = mismatched {
        return Err(JacobiCoreError::InvalidDimensions(format!(
            "Vector '{}' has {} elements, iterate has {}",
            label, len, n
        )));
    }
    if n == 0 {
        return Ok(0.0);
    }

    let norm_sq = x_next
        .par_iter_mut()
        .zip(a.par_chunks_exact(n))
        .enumerate()
        .map(|(i, (out, row))| {
            let sum: f32 = row
                .iter()
                .zip(x_curr)
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(_, (a_ij, x_j))| a_ij * x_j)
                .sum();
            let x_new = inv_diag[i] * (b[i] - sum);
            *out = x_new;
            let diff = x_new - x_curr[i];
            diff * diff
        })
        .sum();
    Ok(norm_sq)
}

/// `sum_i (x[i] - y[i])^2`, split into chunks of at least `min_chunk` elements.
pub fn squared_distance(x: &[f32], y: &[f32], min_chunk: usize) -> f32 {
    x.par_iter()
        .zip(y)
        .with_min_len(min_chunk.max(1))
        .map(|(a, b)| {
            let diff = a - b;
            diff * diff
        })
        .sum()
}
