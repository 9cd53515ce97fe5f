use thiserror::Error;

#[derive(Error, Debug)]
pub enum JacobiCoreError {
    #[error("WGPU initialization failed: {0}")]
    WgpuInitError(String),

    #[error("No compatible GPU adapter available")]
    AdapterUnavailable,

    #[error("WGPU error: {0}")]
    WgpuError(String),

    #[error("Shader compilation error: {0}")]
    ShaderError(String),

    #[error("Invalid matrix dimensions: {0}")]
    InvalidDimensions(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Out of device memory: {0}")]
    OutOfDeviceMemory(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<wgpu::Error> for JacobiCoreError {
    fn from(err: wgpu::Error) -> Self {
        match err {
            wgpu::Error::OutOfMemory { .. } => Self::OutOfDeviceMemory(err.to_string()),
            wgpu::Error::Validation { description, .. } => Self::WgpuError(description),
            other => Self::WgpuError(other.to_string()),
        }
    }
}
