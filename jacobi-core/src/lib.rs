//! # Jacobi Core Library
//!
//! Execution targets (wgpu GPU, rayon CPU), device-resident buffers and the
//! data-parallel kernels used by the Jacobi solver.

pub mod context;
pub mod cpu_ops;
pub mod dense_matrix;
pub mod device;
pub mod double_buffer;
pub mod error;
pub mod ops;
pub mod traits;
pub mod vector;

pub use context::{GpuDeviceOptions, CPU_WORKGROUP_SIZE, GPU_WORKGROUP_SIZE};
pub use dense_matrix::{DenseMatrix, GpuDenseMatrix};
pub use device::{CpuDevice, Device, GpuDevice, TransferStats};
pub use double_buffer::DoubleBuffer;
pub use error::JacobiCoreError;
pub use ops::JacobiKernel;
pub use vector::GpuVector;

pub use traits::{Matrix, Vector};
