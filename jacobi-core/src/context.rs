use crate::error::JacobiCoreError;
use bytemuck::{Pod, Zeroable};
use cfg_if::cfg_if;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use wgpu::{util::DeviceExt, PollType};

/// Storage buffers bound by the Jacobi update kernel (A, b, inv_diag, x_curr, x_next, partials).
pub(crate) const REQUIRED_STORAGE_BUFFERS: u32 = 6;

/// Work-group size used on discrete and integrated GPUs.
pub const GPU_WORKGROUP_SIZE: u32 = 128;
/// Work-group size used on CPU adapters (software rasterizers, llvmpipe, WARP).
pub const CPU_WORKGROUP_SIZE: u32 = 256;

/// Options controlling adapter selection and kernel launch geometry.
#[derive(Debug, Clone)]
pub struct GpuDeviceOptions {
    pub power_preference: wgpu::PowerPreference,
    pub force_fallback_adapter: bool,
    /// Overrides the work-group size derived from the adapter type.
    /// Clamped to the device limit and rounded down to a power of two.
    pub workgroup_size: Option<u32>,
}

impl Default for GpuDeviceOptions {
    fn default() -> Self {
        Self {
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            workgroup_size: None,
        }
    }
}

/// Picks the work-group size for a launch: 128 on GPUs, 256 on CPU adapters,
/// never above what the device can run, always a power of two.
pub(crate) fn select_workgroup_size(
    device_type: wgpu::DeviceType,
    requested: Option<u32>,
    max_invocations: u32,
    max_size_x: u32,
) -> u32 {
    let preferred = requested.unwrap_or(match device_type {
        wgpu::DeviceType::Cpu => CPU_WORKGROUP_SIZE,
        _ => GPU_WORKGROUP_SIZE,
    });
    let size = preferred.min(max_invocations).min(max_size_x).max(1);
    // Largest power of two not above `size`.
    1 << (31 - size.leading_zeros())
}

/// Wrapper for WGPU device and queue, including transfer counters.
#[derive(Debug, Clone)]
pub(crate) struct GpuContext {
    pub(crate) device: Arc<wgpu::Device>,
    pub(crate) queue: Arc<wgpu::Queue>,
    pub(crate) adapter_info: wgpu::AdapterInfo,
    pub(crate) limits: wgpu::Limits,
    pub(crate) workgroup_size: u32,
    /// Tracks bytes transferred from CPU to GPU via instrumented methods.
    pub(crate) bytes_to_gpu: Arc<AtomicU64>,
    /// Tracks bytes transferred from GPU to CPU via instrumented methods.
    pub(crate) bytes_from_gpu: Arc<AtomicU64>,
}

impl GpuContext {
    pub(crate) async fn new(options: &GpuDeviceOptions) -> Result<Self, JacobiCoreError> {
        log::info!("Initializing WGPU context");

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        log::debug!("Requesting adapter with {:?}", options);
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: options.power_preference,
                compatible_surface: None,
                force_fallback_adapter: options.force_fallback_adapter,
            })
            .await
            .map_err(|_| JacobiCoreError::AdapterUnavailable)?;

        let adapter_info = adapter.get_info();
        log::info!("Selected adapter: {:?}", adapter_info);

        // Ask for everything the adapter offers so large dense matrices fit in one binding.
        let limits = adapter.limits();
        if limits.max_storage_buffers_per_shader_stage < REQUIRED_STORAGE_BUFFERS {
            return Err(JacobiCoreError::WgpuInitError(format!(
                "Adapter supports {} storage buffers per stage, {} required",
                limits.max_storage_buffers_per_shader_stage, REQUIRED_STORAGE_BUFFERS
            )));
        }
        log::debug!("Requested limits: {:?}", limits);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("jacobi_core device"),
                trace: wgpu::Trace::Off,
                memory_hints: wgpu::MemoryHints::Performance,
                required_features: wgpu::Features::empty(),
                required_limits: limits.clone(),
            })
            .await
            .map_err(|e| {
                JacobiCoreError::WgpuInitError(format!("Failed to request device: {}", e))
            })?;

        let workgroup_size = select_workgroup_size(
            adapter_info.device_type,
            options.workgroup_size,
            limits.max_compute_invocations_per_workgroup,
            limits.max_compute_workgroup_size_x,
        );
        log::info!(
            "Device and queue obtained, work-group size {} for {:?}",
            workgroup_size,
            adapter_info.device_type
        );

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            adapter_info,
            limits,
            workgroup_size,
            bytes_to_gpu: Arc::new(AtomicU64::new(0)),
            bytes_from_gpu: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Rejects a storage allocation the device cannot bind as a single buffer.
    pub(crate) fn check_storage_size(&self, label: &str, bytes: u64) -> Result<(), JacobiCoreError> {
        let max_binding = u64::from(self.limits.max_storage_buffer_binding_size);
        let max_buffer = self.limits.max_buffer_size;
        if bytes > max_binding || bytes > max_buffer {
            return Err(JacobiCoreError::OutOfDeviceMemory(format!(
                "'{}' needs {} bytes, device allows {} per storage binding ({} per buffer)",
                label, bytes, max_binding, max_buffer
            )));
        }
        Ok(())
    }

    /// Runs `allocate` inside out-of-memory and validation error scopes and
    /// surfaces whatever the device reported.
    pub(crate) async fn scoped_allocation<T>(
        &self,
        allocate: impl FnOnce() -> T,
    ) -> Result<T, JacobiCoreError> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let resource = allocate();
        let validation = self.device.pop_error_scope().await;
        let out_of_memory = self.device.pop_error_scope().await;

        if let Some(err) = out_of_memory.or(validation) {
            log::error!("Device allocation failed: {}", err);
            return Err(err.into());
        }
        Ok(resource)
    }

    /// Creates a GPU buffer with initial data and tracks the transfer size.
    pub(crate) fn create_gpu_buffer_with_data(
        &self,
        label: &str,
        contents: &[u8],
        usage: wgpu::BufferUsages,
    ) -> wgpu::Buffer {
        let byte_len = contents.len() as u64;
        log::debug!("Creating GPU buffer '{}' with {} bytes", label, byte_len);
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage,
            });
        self.bytes_to_gpu.fetch_add(byte_len, Ordering::Relaxed);
        log::trace!(
            "bytes_to_gpu incremented by {}, now: {}",
            byte_len,
            self.bytes_to_gpu.load(Ordering::Relaxed)
        );
        buffer
    }

    /// Creates a zero-filled GPU buffer. No data crosses the bus, so the
    /// transfer counters are untouched.
    pub(crate) fn create_empty_buffer(
        &self,
        label: &str,
        size: u64,
        usage: wgpu::BufferUsages,
    ) -> wgpu::Buffer {
        log::debug!("Creating empty GPU buffer '{}' of size {}", label, size);
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage,
            mapped_at_creation: false,
        })
    }

    /// Writes `data` into an existing buffer through the queue.
    pub(crate) fn write_buffer<T: Pod>(
        &self,
        buffer: &wgpu::Buffer,
        data: &[T],
    ) -> Result<(), JacobiCoreError> {
        let byte_len = std::mem::size_of_val(data) as u64;
        if byte_len == 0 {
            return Ok(());
        }
        if buffer.size() < byte_len {
            return Err(JacobiCoreError::Internal(format!(
                "Target buffer size ({}) is smaller than data size ({})",
                buffer.size(),
                byte_len
            )));
        }
        if !buffer.usage().contains(wgpu::BufferUsages::COPY_DST) {
            return Err(JacobiCoreError::Internal(
                "Target buffer must have COPY_DST usage".to_string(),
            ));
        }

        log::debug!("Writing {} bytes to buffer", byte_len);
        self.queue.write_buffer(buffer, 0, bytemuck::cast_slice(data));
        self.bytes_to_gpu.fetch_add(byte_len, Ordering::Relaxed);
        Ok(())
    }

    /// Blocks until every submitted command has finished (native), no-op on wasm.
    pub(crate) fn wait_idle(&self) -> Result<(), JacobiCoreError> {
        cfg_if! {
            if #[cfg(not(target_arch = "wasm32"))] {
                self.device
                    .poll(PollType::Wait)
                    .map_err(|e| JacobiCoreError::WgpuError(format!("Device poll failed: {}", e)))?;
            }
        }
        Ok(())
    }

    /// Reads `element_count` elements of `buffer` back to the CPU.
    /// The buffer must have `COPY_SRC` usage.
    pub(crate) async fn read_buffer_to_cpu<T: Pod + Zeroable>(
        &self,
        buffer: &wgpu::Buffer,
        element_count: usize,
    ) -> Result<Vec<T>, JacobiCoreError> {
        let element_size = std::mem::size_of::<T>();
        if element_size == 0 {
            return Err(JacobiCoreError::Internal(
                "Cannot read zero-sized types".to_string(),
            ));
        }
        let size_bytes = (element_count * element_size) as u64;
        if size_bytes == 0 {
            return Ok(Vec::new());
        }
        if buffer.size() < size_bytes {
            return Err(JacobiCoreError::Internal(format!(
                "GPU buffer size ({}) is smaller than requested readback ({})",
                buffer.size(),
                size_bytes
            )));
        }

        let staging_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("staging_buffer_for_readback"),
            size: size_bytes,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("read_buffer_encoder"),
            });
        encoder.copy_buffer_to_buffer(buffer, 0, &staging_buffer, 0, size_bytes);
        self.queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = staging_buffer.slice(..);
        let (sender, receiver) = futures::channel::oneshot::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            if let Err(e) = sender.send(result) {
                log::error!("Failed to send map result back: {:?}", e);
            }
        });

        self.bytes_from_gpu.fetch_add(size_bytes, Ordering::Relaxed);
        log::trace!(
            "bytes_from_gpu incremented by {}, now: {}",
            size_bytes,
            self.bytes_from_gpu.load(Ordering::Relaxed)
        );

        // Waits for the copy and the map on native; wasm resolves the receiver from the event loop.
        self.wait_idle()?;

        match receiver.await {
            Ok(Ok(())) => {
                let result: Vec<T> = {
                    let data = buffer_slice.get_mapped_range();
                    bytemuck::cast_slice(&data).to_vec()
                };
                staging_buffer.unmap();
                log::trace!("Readback of {} bytes complete", size_bytes);
                Ok(result)
            }
            Ok(Err(e)) => {
                log::error!("Failed to map buffer: {:?}", e);
                Err(JacobiCoreError::WgpuError(format!(
                    "Buffer mapping failed: {}",
                    e
                )))
            }
            Err(_) => Err(JacobiCoreError::Internal(
                "Channel receive error during buffer mapping".to_string(),
            )),
        }
    }

    /// Returns the current transfer statistics.
    pub(crate) fn get_transfer_stats(&self) -> (u64, u64) {
        (
            self.bytes_to_gpu.load(Ordering::Relaxed),
            self.bytes_from_gpu.load(Ordering::Relaxed),
        )
    }

    /// Resets the transfer statistics counters to zero.
    pub(crate) fn reset_transfer_stats(&self) {
        self.bytes_to_gpu.store(0, Ordering::Relaxed);
        self.bytes_from_gpu.store(0, Ordering::Relaxed);
        log::info!("GPU transfer counters reset.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workgroup_size_follows_device_type() {
        let gpu = select_workgroup_size(wgpu::DeviceType::DiscreteGpu, None, 1024, 1024);
        let integrated = select_workgroup_size(wgpu::DeviceType::IntegratedGpu, None, 1024, 1024);
        let cpu = select_workgroup_size(wgpu::DeviceType::Cpu, None, 1024, 1024);
        assert_eq!(gpu, 128);
        assert_eq!(integrated, 128);
        assert_eq!(cpu, 256);
    }

    #[test]
    fn test_workgroup_size_clamped_to_device_limit() {
        assert_eq!(
            select_workgroup_size(wgpu::DeviceType::Cpu, None, 64, 1024),
            64
        );
        assert_eq!(
            select_workgroup_size(wgpu::DeviceType::DiscreteGpu, None, 256, 32),
            32
        );
    }

    #[test]
    fn test_workgroup_size_rounded_to_power_of_two() {
        assert_eq!(
            select_workgroup_size(wgpu::DeviceType::DiscreteGpu, Some(100), 256, 256),
            64
        );
        assert_eq!(
            select_workgroup_size(wgpu::DeviceType::DiscreteGpu, Some(0), 256, 256),
            1
        );
        assert_eq!(
            select_workgroup_size(wgpu::DeviceType::Other, Some(192), 160, 256),
            128
        );
    }
}
