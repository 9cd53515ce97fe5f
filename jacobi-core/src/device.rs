use crate::context::{GpuContext, GpuDeviceOptions};
use crate::cpu_ops;
use crate::dense_matrix::{DenseMatrix, GpuDenseMatrix};
use crate::double_buffer::DoubleBuffer;
use crate::error::JacobiCoreError;
use crate::ops::{self, JacobiKernel};
use crate::traits::Matrix;
use crate::vector::GpuVector;
use std::{mem, sync::Arc};

/// Marker trait for execution targets (CPU, GPU).
pub trait Device: std::fmt::Debug + Send + Sync {
    /// Human readable description used in logs.
    fn name(&self) -> String;
}

/// Host execution target running kernels on a rayon thread pool.
#[derive(Debug, Clone, Default)]
pub struct CpuDevice {
    /// Dedicated pool; `None` uses rayon's global pool.
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl CpuDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a device backed by its own pool of `threads` workers.
    pub fn with_threads(threads: usize) -> Result<Self, JacobiCoreError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("jacobi-cpu-{}", i))
            .build()
            .map_err(|e| JacobiCoreError::Internal(format!("Failed to build thread pool: {}", e)))?;
        Ok(Self {
            pool: Some(Arc::new(pool)),
        })
    }

    pub fn num_threads(&self) -> usize {
        self.pool
            .as_ref()
            .map_or_else(rayon::current_num_threads, |pool| pool.current_num_threads())
    }

    /// Runs `op` inside this device's pool.
    pub fn install<R, F>(&self, op: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }

    /// One Jacobi sweep, see [`cpu_ops::jacobi_update_and_reduce`].
    pub fn jacobi_update_and_reduce(
        &self,
        a: &DenseMatrix<f32>,
        b: &[f32],
        inv_diag: &[f32],
        x_curr: &[f32],
        x_next: &mut [f32],
    ) -> Result<f32, JacobiCoreError> {
        if !a.is_square() {
            return Err(JacobiCoreError::InvalidDimensions(format!(
                "Matrix must be square (dims: {}x{})",
                a.rows(),
                a.cols()
            )));
        }
        self.install(|| cpu_ops::jacobi_update_and_reduce(a.data(), b, inv_diag, x_curr, x_next))
    }

    /// `sum_i (x[i] - y[i])^2` reduced in parallel.
    pub fn squared_distance(&self, x: &[f32], y: &[f32]) -> Result<f32, JacobiCoreError> {
        if x.len() != y.len() {
            return Err(JacobiCoreError::InvalidDimensions(format!(
                "Vector sizes for squared distance mismatch: {} != {}",
                x.len(),
                y.len()
            )));
        }
        Ok(self.install(|| cpu_ops::squared_distance(x, y, 1)))
    }
}

impl Device for CpuDevice {
    fn name(&self) -> String {
        format!("cpu ({} threads)", self.num_threads())
    }
}

/// Represents a GPU execution device, holding the WGPU context.
#[derive(Debug, Clone)]
pub struct GpuDevice {
    pub(crate) context: Arc<GpuContext>,
}

impl GpuDevice {
    /// Creates a GpuDevice on the default (high performance) adapter.
    pub async fn new() -> Result<Self, JacobiCoreError> {
        Self::with_options(GpuDeviceOptions::default()).await
    }

    pub async fn with_options(options: GpuDeviceOptions) -> Result<Self, JacobiCoreError> {
        let context = GpuContext::new(&options).await?;
        log::info!("GpuDevice created on '{}'", context.adapter_info.name);
        Ok(Self {
            context: Arc::new(context),
        })
    }

    /// Like [`GpuDevice::new`] but yields `Ok(None)` when the machine has no
    /// usable adapter, so callers can fall back to [`CpuDevice`].
    pub async fn try_new() -> Result<Option<Self>, JacobiCoreError> {
        Self::try_with_options(GpuDeviceOptions::default()).await
    }

    pub async fn try_with_options(
        options: GpuDeviceOptions,
    ) -> Result<Option<Self>, JacobiCoreError> {
        match Self::with_options(options).await {
            Ok(device) => Ok(Some(device)),
            Err(JacobiCoreError::AdapterUnavailable) => {
                log::warn!("No GPU adapter available");
                Ok(None)
            }
            Err(JacobiCoreError::WgpuInitError(reason)) => {
                log::warn!("GPU adapter unusable: {}", reason);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    #[cfg(feature = "native")]
    pub fn try_new_blocking() -> Result<Option<Self>, JacobiCoreError> {
        pollster::block_on(Self::try_new())
    }

    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.context.adapter_info
    }

    /// Work-group size every kernel on this device is launched with.
    pub fn workgroup_size(&self) -> u32 {
        self.context.workgroup_size
    }

    // --- Resource Creation ---

    /// Uploads `data` into a new device vector.
    pub async fn create_vector(&self, label: &str, data: &[f32]) -> Result<GpuVector, JacobiCoreError> {
        if data.is_empty() {
            return Err(JacobiCoreError::InvalidDimensions(
                "Cannot create GPU vector from empty slice".to_string(),
            ));
        }
        let byte_size = mem::size_of_val(data) as u64;
        self.context.check_storage_size(label, byte_size)?;
        let buffer = self
            .context
            .scoped_allocation(|| {
                self.context.create_gpu_buffer_with_data(
                    label,
                    bytemuck::cast_slice(data),
                    wgpu::BufferUsages::STORAGE
                        | wgpu::BufferUsages::COPY_DST
                        | wgpu::BufferUsages::COPY_SRC,
                )
            })
            .await?;
        Ok(GpuVector::new_internal(
            buffer,
            data.len(),
            String::from(label),
            Arc::clone(&self.context),
        ))
    }

    /// Allocates a device vector of `size` zeros without a host transfer
    /// (wgpu zero-initialises new buffers).
    pub async fn create_zeroed_vector(
        &self,
        label: &str,
        size: usize,
    ) -> Result<GpuVector, JacobiCoreError> {
        if size == 0 {
            return Err(JacobiCoreError::InvalidDimensions(
                "Cannot create GPU vector with size 0".to_string(),
            ));
        }
        let byte_size = (size * mem::size_of::<f32>()) as u64;
        self.context.check_storage_size(label, byte_size)?;
        let buffer = self
            .context
            .scoped_allocation(|| {
                self.context.create_empty_buffer(
                    label,
                    byte_size,
                    wgpu::BufferUsages::STORAGE
                        | wgpu::BufferUsages::COPY_SRC
                        | wgpu::BufferUsages::COPY_DST,
                )
            })
            .await?;
        Ok(GpuVector::new_internal(
            buffer,
            size,
            String::from(label),
            Arc::clone(&self.context),
        ))
    }

    /// Uploads a host dense matrix. Fails with `OutOfDeviceMemory` when the
    /// matrix exceeds what a single storage binding can address.
    pub async fn create_dense_matrix(
        &self,
        cpu_matrix: &DenseMatrix<f32>,
    ) -> Result<GpuDenseMatrix, JacobiCoreError> {
        let (rows, cols) = cpu_matrix.dims();
        if rows == 0 || cols == 0 {
            return Err(JacobiCoreError::InvalidDimensions(format!(
                "Cannot upload an empty matrix ({}x{})",
                rows, cols
            )));
        }
        let label = "GPU Dense Matrix Values Buffer";
        self.context
            .check_storage_size(label, mem::size_of_val(cpu_matrix.data()) as u64)?;
        let values_buffer = self
            .context
            .scoped_allocation(|| {
                self.context.create_gpu_buffer_with_data(
                    label,
                    bytemuck::cast_slice(cpu_matrix.data()),
                    wgpu::BufferUsages::STORAGE
                        | wgpu::BufferUsages::COPY_DST
                        | wgpu::BufferUsages::COPY_SRC,
                )
            })
            .await?;
        Ok(GpuDenseMatrix::new_internal(
            rows,
            cols,
            values_buffer,
            Arc::clone(&self.context),
        ))
    }

    // --- Operations ---

    /// Compiles the Jacobi sweep for these operands. Slot `p` of `iterates`
    /// is read when the kernel runs with parity `p`, the other slot is written.
    pub async fn jacobi_kernel(
        &self,
        a: &GpuDenseMatrix,
        b: &GpuVector,
        inv_diag: &GpuVector,
        iterates: &DoubleBuffer<GpuVector>,
    ) -> Result<JacobiKernel, JacobiCoreError> {
        JacobiKernel::new(&self.context, a, b, inv_diag, iterates).await
    }

    /// `sum_i (x[i] - y[i])^2` on the GPU.
    pub async fn squared_distance(
        &self,
        x: &GpuVector,
        y: &GpuVector,
    ) -> Result<f32, JacobiCoreError> {
        ops::internal_squared_distance(&self.context, x, y).await
    }

    // --- Utility ---

    /// Returns the current GPU transfer statistics.
    pub fn get_transfer_stats(&self) -> TransferStats {
        let (bytes_to_gpu, bytes_from_gpu) = self.context.get_transfer_stats();
        TransferStats {
            bytes_to_gpu,
            bytes_from_gpu,
        }
    }

    pub fn reset_transfer_stats(&self) {
        self.context.reset_transfer_stats();
    }
}

impl Device for GpuDevice {
    fn name(&self) -> String {
        let info = &self.context.adapter_info;
        format!("{} ({:?}, {:?})", info.name, info.backend, info.device_type)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferStats {
    pub bytes_to_gpu: u64,
    pub bytes_from_gpu: u64,
}
