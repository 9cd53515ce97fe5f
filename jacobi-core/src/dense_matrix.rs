use crate::context::GpuContext;
use crate::error::JacobiCoreError;
use crate::traits::Matrix;
use num_traits::Float;
use std::{mem, sync::Arc};

/// Represents a dense matrix stored in row-major order on the CPU.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrix<T: Copy + Send + Sync + std::fmt::Debug + Default + bytemuck::Pod = f32> {
    rows: usize,
    cols: usize,
    data: Vec<T>, // data[row * cols + col]
}

impl<T: Copy + Send + Sync + std::fmt::Debug + Default + bytemuck::Pod> DenseMatrix<T> {
    /// Creates a new DenseMatrix from raw row-major data.
    pub fn new(rows: usize, cols: usize, data: Vec<T>) -> Result<Self, JacobiCoreError> {
        if data.len() != rows * cols {
            return Err(JacobiCoreError::InvalidDimensions(format!(
                "Data length ({}) does not match dimensions ({}x{})",
                data.len(),
                rows,
                cols
            )));
        }
        Ok(Self { rows, cols, data })
    }

    /// Builds a square matrix from `n*n` row-major values, the layout most
    /// callers hold their systems in.
    pub fn square(data: Vec<T>) -> Result<Self, JacobiCoreError> {
        let n = (data.len() as f64).sqrt().round() as usize;
        Self::new(n, n, data)
    }

    /// Builds a matrix from nested rows. All rows must have the same length.
    pub fn from_rows(rows: &[Vec<T>]) -> Result<Self, JacobiCoreError> {
        let cols = rows.first().map_or(0, Vec::len);
        if let Some((index, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != cols) {
            return Err(JacobiCoreError::InvalidDimensions(format!(
                "Row {} has {} entries, expected {}",
                index,
                row.len(),
                cols
            )));
        }
        let data = rows.iter().flat_map(|r| r.iter().copied()).collect();
        Self::new(rows.len(), cols, data)
    }

    /// Creates a new DenseMatrix filled with zeros.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![T::default(); rows * cols],
        }
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Returns row `row` as a slice. Panics if out of bounds.
    pub fn row(&self, row: usize) -> &[T] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// Returns None if indices are out of bounds.
    pub fn get(&self, row: usize, col: usize) -> Option<&T> {
        if row < self.rows && col < self.cols {
            self.data.get(row * self.cols + col)
        } else {
            None
        }
    }
}

impl<T: Float + Send + Sync + std::fmt::Debug + Default + bytemuck::Pod> DenseMatrix<T> {
    /// Diagonal matrix with `diagonal` on the main diagonal.
    pub fn from_diagonal(diagonal: &[T]) -> Self {
        let n = diagonal.len();
        let mut matrix = Self {
            rows: n,
            cols: n,
            data: vec![T::zero(); n * n],
        };
        for (i, &d) in diagonal.iter().enumerate() {
            matrix.data[i * n + i] = d;
        }
        matrix
    }

    /// Main diagonal entries.
    pub fn diagonal(&self) -> Vec<T> {
        (0..self.rows.min(self.cols))
            .map(|i| self.data[i * self.cols + i])
            .collect()
    }

    /// `1 / A[i][i]` for every row. A zero diagonal yields an infinite entry.
    pub fn inverse_diagonal(&self) -> Vec<T> {
        self.diagonal().into_iter().map(|d| T::one() / d).collect()
    }

    /// `|A[i][i]| >= sum_{j != i} |A[i][j]|` for every row.
    pub fn is_diagonally_dominant(&self) -> bool {
        (0..self.rows).all(|i| {
            let row = self.row(i);
            let off_diagonal = row
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .fold(T::zero(), |acc, (_, v)| acc + v.abs());
            row.get(i).is_some_and(|d| d.abs() >= off_diagonal)
        })
    }

    /// Host-side `A * x`.
    pub fn mul_vec(&self, x: &[T]) -> Result<Vec<T>, JacobiCoreError> {
        if x.len() != self.cols {
            return Err(JacobiCoreError::InvalidDimensions(format!(
                "Matrix cols ({}) do not match vector size ({})",
                self.cols,
                x.len()
            )));
        }
        Ok((0..self.rows)
            .map(|i| {
                self.row(i)
                    .iter()
                    .zip(x)
                    .fold(T::zero(), |acc, (&a, &v)| acc + a * v)
            })
            .collect())
    }
}

impl<T: Copy + Send + Sync + std::fmt::Debug + Default + bytemuck::Pod> Matrix for DenseMatrix<T> {
    type Value = T;

    fn dims(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }
}

/// Device-resident copy of a dense row-major `f32` matrix. Read-only for kernels.
#[derive(Debug)]
pub struct GpuDenseMatrix {
    rows: usize,
    cols: usize,
    values_buffer: wgpu::Buffer,
    pub(crate) context: Arc<GpuContext>,
}

impl GpuDenseMatrix {
    pub(crate) fn new_internal(
        rows: usize,
        cols: usize,
        values_buffer: wgpu::Buffer,
        context: Arc<GpuContext>,
    ) -> Self {
        Self {
            rows,
            cols,
            values_buffer,
            context,
        }
    }

    pub(crate) fn values_buffer(&self) -> &wgpu::Buffer {
        &self.values_buffer
    }

    pub fn size_bytes(&self) -> u64 {
        (self.rows * self.cols * mem::size_of::<f32>()) as u64
    }

    /// Reads the matrix back to the host. Slow, meant for diagnostics.
    pub async fn read_back(&self) -> Result<DenseMatrix<f32>, JacobiCoreError> {
        let data = self
            .context
            .read_buffer_to_cpu::<f32>(&self.values_buffer, self.rows * self.cols)
            .await?;
        DenseMatrix::new(self.rows, self.cols, data)
    }
}

impl Drop for GpuDenseMatrix {
    fn drop(&mut self) {
        log::trace!("Releasing GPU dense matrix {}x{}", self.rows, self.cols);
        self.values_buffer.destroy();
    }
}

impl Matrix for GpuDenseMatrix {
    type Value = f32;

    fn dims(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }
}
