use jacobi_core::{device::GpuDevice, DenseMatrix, Device, DoubleBuffer, JacobiCoreError, Matrix};
use log::{debug, info};

use super::{Jacobi, JacobiMetadata, SolveAlgorithm, SolveResult};

impl SolveAlgorithm<GpuDevice, DenseMatrix> for Jacobi {
    type Value = f32;
    type Metadata = JacobiMetadata;

    async fn solve(
        &self,
        device: &GpuDevice,
        a: &DenseMatrix,
        b: &[f32],
    ) -> Result<SolveResult<Self::Value, Self::Metadata>, JacobiCoreError> {
        <Self as SolveAlgorithm<GpuDevice, DenseMatrix>>::validate_inputs(self, a, b)?;
        self.validate_params()?;

        let n = a.rows();
        info!(
            "GPU Jacobi: n = {}, accuracy = {:e}, max_iterations = {}, device = {}",
            n,
            self.accuracy,
            self.max_iterations,
            device.name()
        );

        // A zero diagonal turns into inf here and propagates; callers own that contract.
        let inv_diag = a.inverse_diagonal();

        // Everything the loop touches is uploaded once. The handles release
        // their buffers when they go out of scope, on success or on `?`.
        let a_gpu = device.create_dense_matrix(a).await?;
        let b_gpu = device.create_vector("b", b).await?;
        let inv_diag_gpu = device.create_vector("inv_diag", &inv_diag).await?;
        let mut iterates = DoubleBuffer::new(
            device.create_zeroed_vector("x (slot 0)", n).await?,
            device.create_zeroed_vector("x (slot 1)", n).await?,
        );

        let kernel = device
            .jacobi_kernel(&a_gpu, &b_gpu, &inv_diag_gpu, &iterates)
            .await?;
        debug!(
            "Dispatching {} work-groups of {} per iteration over {} rows",
            kernel.workgroups(),
            kernel.workgroup_size(),
            kernel.rows()
        );

        let mut monitor = self.monitor();
        while monitor.should_continue() {
            let norm_sq = kernel.update_and_reduce(iterates.parity()).await?;
            monitor.record(norm_sq);
            iterates.swap();
        }

        let x = iterates.current().read_contents().await?;
        Ok(SolveResult {
            x,
            metadata: monitor.finish(),
        })
    }
}
