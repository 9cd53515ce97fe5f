// GPU compute kernels. Device-facing entry points live on `GpuDevice`; this
// module owns shader specialisation, pipeline construction and dispatch.

use crate::{
    context::GpuContext, dense_matrix::GpuDenseMatrix, double_buffer::DoubleBuffer,
    error::JacobiCoreError, traits::Matrix, vector::GpuVector,
};
use bytemuck::{Pod, Zeroable};
use std::{mem, sync::Arc};

const JACOBI_UPDATE_SHADER: &str = include_str!("./shaders/jacobi_update.wgsl");
const SQUARED_DISTANCE_SHADER: &str = include_str!("./shaders/squared_distance.wgsl");
const REDUCE_SUM_SHADER: &str = include_str!("./shaders/reduce_sum.wgsl");

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct SizeParams {
    size: u32,
    _padding: [u32; 3],
}

impl SizeParams {
    fn new(size: u32) -> Self {
        Self {
            size,
            _padding: [0; 3],
        }
    }
}

/// Bakes the work-group size into a shader template.
fn specialize(template: &str, workgroup_size: u32) -> String {
    template.replace("{WORKGROUP_SIZE}", &workgroup_size.to_string())
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: wgpu::BufferSize::new(mem::size_of::<SizeParams>() as u64),
        },
        count: None,
    }
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn bind_entries<'a>(resources: &[wgpu::BindingResource<'a>]) -> Vec<wgpu::BindGroupEntry<'a>> {
    resources
        .iter()
        .enumerate()
        .map(|(binding, resource)| wgpu::BindGroupEntry {
            binding: binding as u32,
            resource: resource.clone(),
        })
        .collect()
}

/// Compiles `source` and builds a compute pipeline over a single bind group layout.
/// Naga validation failures surface as `ShaderError`.
async fn create_compute_pipeline(
    context: &GpuContext,
    label: &str,
    source: String,
    layout: &wgpu::BindGroupLayout,
) -> Result<wgpu::ComputePipeline, JacobiCoreError> {
    let device = &context.device;
    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[layout],
        push_constant_ranges: &[],
    });
    let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout),
        module: &module,
        entry_point: Some("main"),
        cache: None,
        compilation_options: Default::default(),
    });

    if let Some(err) = device.pop_error_scope().await {
        log::error!("Pipeline '{}' failed validation: {}", label, err);
        return Err(JacobiCoreError::ShaderError(format!("{}: {}", label, err)));
    }
    Ok(pipeline)
}

/// Number of work-groups covering `n` rows; the last group is padded.
fn dispatch_count(context: &GpuContext, n: usize) -> Result<u32, JacobiCoreError> {
    let workgroup_size = context.workgroup_size as usize;
    let groups = n.div_ceil(workgroup_size);
    let max_groups = context.limits.max_compute_workgroups_per_dimension as usize;
    if groups > max_groups {
        return Err(JacobiCoreError::UnsupportedOperation(format!(
            "{} rows need {} work-groups of {}, device allows {}",
            n, groups, workgroup_size, max_groups
        )));
    }
    Ok(groups as u32)
}

/// Second reduction stage folding per-work-group partials into a scalar accumulator.
#[derive(Debug)]
struct ReduceStage {
    pipeline: wgpu::ComputePipeline,
    bind_group: wgpu::BindGroup,
    params_buffer: wgpu::Buffer,
}

impl ReduceStage {
    async fn new(
        context: &GpuContext,
        partials: &wgpu::Buffer,
        partial_count: u32,
        accumulator: &wgpu::Buffer,
    ) -> Result<Self, JacobiCoreError> {
        let device = &context.device;
        let params_buffer = context
            .scoped_allocation(|| {
                context.create_gpu_buffer_with_data(
                    "Reduce Sum Params Buffer",
                    bytemuck::bytes_of(&SizeParams::new(partial_count)),
                    wgpu::BufferUsages::UNIFORM,
                )
            })
            .await?;
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Reduce Sum Bind Group Layout"),
            entries: &[
                uniform_entry(0),
                storage_entry(1, true),
                storage_entry(2, false),
            ],
        });
        let pipeline = create_compute_pipeline(
            context,
            "Reduce Sum Pipeline",
            specialize(REDUCE_SUM_SHADER, context.workgroup_size),
            &layout,
        )
        .await?;
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Reduce Sum Bind Group"),
            layout: &layout,
            entries: &bind_entries(&[
                params_buffer.as_entire_binding(),
                partials.as_entire_binding(),
                accumulator.as_entire_binding(),
            ]),
        });
        Ok(Self {
            pipeline,
            bind_group,
            params_buffer,
        })
    }

    fn encode(&self, encoder: &mut wgpu::CommandEncoder) {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Reduce Sum Pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.dispatch_workgroups(1, 1, 1);
    }
}

impl Drop for ReduceStage {
    fn drop(&mut self) {
        self.params_buffer.destroy();
    }
}

/// Device state for one Jacobi solve: compiled pipelines, one update bind
/// group per iterate parity, the partial-sum scratch and the scalar residual
/// accumulator. Built once before the iteration loop and reused every sweep.
#[derive(Debug)]
pub struct JacobiKernel {
    context: Arc<GpuContext>,
    rows: usize,
    workgroups: u32,
    update_pipeline: wgpu::ComputePipeline,
    /// `update_bind_groups[p]` reads slot `p` and writes slot `1 - p`.
    update_bind_groups: [wgpu::BindGroup; 2],
    reduce: ReduceStage,
    params_buffer: wgpu::Buffer,
    partials: wgpu::Buffer,
    accumulator: wgpu::Buffer,
}

impl JacobiKernel {
    pub(crate) async fn new(
        context: &Arc<GpuContext>,
        a: &GpuDenseMatrix,
        b: &GpuVector,
        inv_diag: &GpuVector,
        iterates: &DoubleBuffer<GpuVector>,
    ) -> Result<Self, JacobiCoreError> {
        let n = a.rows();
        if !a.is_square() {
            return Err(JacobiCoreError::InvalidDimensions(format!(
                "Matrix must be square (dims: {}x{})",
                a.rows(),
                a.cols()
            )));
        }
        let mismatched = [b, inv_diag, &iterates.slots()[0], &iterates.slots()[1]]
            .into_iter()
            .find(|v| v.size() != n);
        if let Some(vector) = mismatched {
            return Err(JacobiCoreError::InvalidDimensions(format!(
                "Vector '{}' has {} elements, matrix has {} rows",
                vector.label(),
                vector.size(),
                n
            )));
        }

        let device = &context.device;
        let workgroups = dispatch_count(context, n)?;

        let (params_buffer, partials, accumulator) = context
            .scoped_allocation(|| {
                let params = context.create_gpu_buffer_with_data(
                    "Jacobi Update Params Buffer",
                    bytemuck::bytes_of(&SizeParams::new(n as u32)),
                    wgpu::BufferUsages::UNIFORM,
                );
                let partials = context.create_empty_buffer(
                    "Jacobi Partial Sums Buffer",
                    u64::from(workgroups) * mem::size_of::<f32>() as u64,
                    wgpu::BufferUsages::STORAGE,
                );
                let accumulator = context.create_empty_buffer(
                    "Jacobi Residual Accumulator",
                    mem::size_of::<f32>() as u64,
                    wgpu::BufferUsages::STORAGE
                        | wgpu::BufferUsages::COPY_SRC
                        | wgpu::BufferUsages::COPY_DST,
                );
                (params, partials, accumulator)
            })
            .await?;

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Jacobi Update Bind Group Layout"),
            entries: &[
                uniform_entry(0),
                storage_entry(1, true),  // a
                storage_entry(2, true),  // b
                storage_entry(3, true),  // inv_diag
                storage_entry(4, true),  // x_curr
                storage_entry(5, false), // x_next
                storage_entry(6, false), // partials
            ],
        });
        let update_pipeline = create_compute_pipeline(
            context,
            "Jacobi Update Pipeline",
            specialize(JACOBI_UPDATE_SHADER, context.workgroup_size),
            &layout,
        )
        .await?;

        let [slot0, slot1] = iterates.slots();
        let make_bind_group = |label: &str, x_curr: &GpuVector, x_next: &GpuVector| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &layout,
                entries: &bind_entries(&[
                    params_buffer.as_entire_binding(),
                    a.values_buffer().as_entire_binding(),
                    b.as_entire_binding(),
                    inv_diag.as_entire_binding(),
                    x_curr.as_entire_binding(),
                    x_next.as_entire_binding(),
                    partials.as_entire_binding(),
                ]),
            })
        };
        let update_bind_groups = [
            make_bind_group("Jacobi Update Bind Group (slot 0 -> 1)", slot0, slot1),
            make_bind_group("Jacobi Update Bind Group (slot 1 -> 0)", slot1, slot0),
        ];

        let reduce = ReduceStage::new(context, &partials, workgroups, &accumulator).await?;

        log::debug!(
            "Jacobi kernel ready: {} rows, {} work-groups of {}",
            n,
            workgroups,
            context.workgroup_size
        );

        Ok(Self {
            context: Arc::clone(context),
            rows: n,
            workgroups,
            update_pipeline,
            update_bind_groups,
            reduce,
            params_buffer,
            partials,
            accumulator,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn workgroups(&self) -> u32 {
        self.workgroups
    }

    pub fn workgroup_size(&self) -> u32 {
        self.context.workgroup_size
    }

    /// One sweep: clears the accumulator, reads iterate slot `parity`, writes
    /// slot `1 - parity`, reduces the squared differences and blocks until
    /// the squared norm is back on the host.
    pub async fn update_and_reduce(&self, parity: usize) -> Result<f32, JacobiCoreError> {
        let bind_group = self.update_bind_groups.get(parity).ok_or_else(|| {
            JacobiCoreError::Internal(format!("Iterate parity {} out of range", parity))
        })?;

        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Jacobi Iteration Encoder"),
                });
        encoder.clear_buffer(&self.accumulator, 0, None);
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Jacobi Update Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.update_pipeline);
            pass.set_bind_group(0, bind_group, &[]);
            pass.dispatch_workgroups(self.workgroups, 1, 1);
        }
        self.reduce.encode(&mut encoder);
        self.context.queue.submit(std::iter::once(encoder.finish()));

        let norm = self
            .context
            .read_buffer_to_cpu::<f32>(&self.accumulator, 1)
            .await?;
        norm.first().copied().ok_or_else(|| {
            JacobiCoreError::Internal("Residual readback returned no value".to_string())
        })
    }
}

impl Drop for JacobiKernel {
    fn drop(&mut self) {
        log::trace!("Releasing Jacobi kernel scratch buffers");
        self.params_buffer.destroy();
        self.partials.destroy();
        self.accumulator.destroy();
    }
}

/// `sum_i (x[i] - y[i])^2` through the same two-stage reduction the Jacobi sweep uses.
pub(crate) async fn internal_squared_distance(
    context: &GpuContext,
    x: &GpuVector,
    y: &GpuVector,
) -> Result<f32, JacobiCoreError> {
    if x.size() != y.size() {
        return Err(JacobiCoreError::InvalidDimensions(format!(
            "Vector sizes for squared distance mismatch: {} != {}",
            x.size(),
            y.size()
        )));
    }
    let device = &context.device;
    let n = x.size();
    let workgroups = dispatch_count(context, n)?;

    let (params_buffer, partials, accumulator) = context
        .scoped_allocation(|| {
            let params = context.create_gpu_buffer_with_data(
                "Squared Distance Params Buffer",
                bytemuck::bytes_of(&SizeParams::new(n as u32)),
                wgpu::BufferUsages::UNIFORM,
            );
            let partials = context.create_empty_buffer(
                "Squared Distance Partial Sums Buffer",
                u64::from(workgroups) * mem::size_of::<f32>() as u64,
                wgpu::BufferUsages::STORAGE,
            );
            let accumulator = context.create_empty_buffer(
                "Squared Distance Accumulator",
                mem::size_of::<f32>() as u64,
                wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_SRC
                    | wgpu::BufferUsages::COPY_DST,
            );
            (params, partials, accumulator)
        })
        .await?;

    let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Squared Distance Bind Group Layout"),
        entries: &[
            uniform_entry(0),
            storage_entry(1, true),
            storage_entry(2, true),
            storage_entry(3, false),
        ],
    });
    let pipeline = create_compute_pipeline(
        context,
        "Squared Distance Pipeline",
        specialize(SQUARED_DISTANCE_SHADER, context.workgroup_size),
        &layout,
    )
    .await?;
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Squared Distance Bind Group"),
        layout: &layout,
        entries: &bind_entries(&[
            params_buffer.as_entire_binding(),
            x.as_entire_binding(),
            y.as_entire_binding(),
            partials.as_entire_binding(),
        ]),
    });
    let reduce = ReduceStage::new(context, &partials, workgroups, &accumulator).await?;

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Squared Distance Encoder"),
    });
    encoder.clear_buffer(&accumulator, 0, None);
    {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Squared Distance Pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(workgroups, 1, 1);
    }
    reduce.encode(&mut encoder);
    context.queue.submit(std::iter::once(encoder.finish()));

    let result = context.read_buffer_to_cpu::<f32>(&accumulator, 1).await;
    params_buffer.destroy();
    partials.destroy();
    accumulator.destroy();

    result?.first().copied().ok_or_else(|| {
        JacobiCoreError::Internal("Squared distance readback returned no value".to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_specialize_replaces_every_placeholder() {
        for template in [JACOBI_UPDATE_SHADER, SQUARED_DISTANCE_SHADER, REDUCE_SUM_SHADER] {
            let source = specialize(template, 128);
            assert!(!source.contains("{WORKGROUP_SIZE}"));
            assert!(source.contains("const WORKGROUP_SIZE: u32 = 128u;"));
        }
    }

    #[test]
    fn test_size_params_is_uniform_aligned() {
        assert_eq!(mem::size_of::<SizeParams>(), 16);
    }
}
