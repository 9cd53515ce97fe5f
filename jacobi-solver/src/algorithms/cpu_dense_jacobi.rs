use jacobi_core::{device::CpuDevice, DenseMatrix, Device, DoubleBuffer, JacobiCoreError, Matrix};
use log::info;

use super::{Jacobi, JacobiMetadata, SolveAlgorithm, SolveResult};

impl SolveAlgorithm<CpuDevice, DenseMatrix> for Jacobi {
    type Value = f32;
    type Metadata = JacobiMetadata;

    async fn solve(
        &self,
        device: &CpuDevice,
        a: &DenseMatrix,
        b: &[f32],
    ) -> Result<SolveResult<Self::Value, Self::Metadata>, JacobiCoreError> {
        <Self as SolveAlgorithm<CpuDevice, DenseMatrix>>::validate_inputs(self, a, b)?;
        self.validate_params()?;

        let n = a.rows();
        info!(
            "CPU Jacobi: n = {}, accuracy = {:e}, max_iterations = {}, device = {}",
            n,
            self.accuracy,
            self.max_iterations,
            device.name()
        );

        let inv_diag = a.inverse_diagonal();
        let mut iterates = DoubleBuffer::new(vec![0.0f32; n], vec![0.0f32; n]);

        let mut monitor = self.monitor();
        while monitor.should_continue() {
            let (x_curr, x_next) = iterates.split_mut();
            let norm_sq = device.jacobi_update_and_reduce(a, b, &inv_diag, x_curr, x_next)?;
            monitor.record(norm_sq);
            iterates.swap();
        }

        Ok(SolveResult {
            x: iterates.into_current(),
            metadata: monitor.finish(),
        })
    }
}
