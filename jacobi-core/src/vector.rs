use crate::context::GpuContext;
use crate::error::JacobiCoreError;
use crate::traits::Vector;
use std::{mem, sync::Arc};

/// Owning handle over a device-resident `f32` vector.
///
/// The buffer is destroyed when the handle is dropped, so a solve that bails
/// out half way never leaves device memory behind.
#[derive(Debug)]
pub struct GpuVector {
    buffer: wgpu::Buffer,
    size: usize,
    label: String,
    pub(crate) context: Arc<GpuContext>,
}

impl GpuVector {
    /// Internal constructor used by GpuDevice.
    pub(crate) fn new_internal(
        buffer: wgpu::Buffer,
        size: usize,
        label: String,
        context: Arc<GpuContext>,
    ) -> Self {
        Self {
            buffer,
            size,
            label,
            context,
        }
    }

    pub(crate) fn inner(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    /// Returns the number of elements the vector holds.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the size of the vector's buffer in bytes.
    pub fn size_bytes(&self) -> u64 {
        (self.size * mem::size_of::<f32>()) as u64
    }

    pub fn label(&self) -> &str {
        self.label.as_str()
    }

    pub fn as_entire_binding(&self) -> wgpu::BindingResource {
        self.buffer.as_entire_binding()
    }

    /// Reads the vector's contents back to the CPU. Blocks on the device
    /// until all previously submitted work touching the buffer is done.
    pub async fn read_contents(&self) -> Result<Vec<f32>, JacobiCoreError> {
        self.context
            .read_buffer_to_cpu(self.inner(), self.size())
            .await
    }

    /// Overwrites the vector with `data`. Lengths must match.
    pub fn write_contents(&self, data: &[f32]) -> Result<(), JacobiCoreError> {
        if data.len() != self.size {
            return Err(JacobiCoreError::InvalidDimensions(format!(
                "Data length ({}) does not match GpuVector '{}' size ({})",
                data.len(),
                self.label,
                self.size
            )));
        }
        self.context.write_buffer(self.inner(), data)
    }
}

impl Drop for GpuVector {
    fn drop(&mut self) {
        log::trace!("Releasing GPU vector '{}' ({} bytes)", self.label, self.size_bytes());
        self.buffer.destroy();
    }
}

impl Vector for GpuVector {
    type Value = f32;

    fn len(&self) -> usize {
        self.size()
    }
}
