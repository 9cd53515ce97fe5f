use jacobi_solver::{
    systems::{diagonally_dominant, residual_inf_norm},
    CpuDevice, DenseMatrix, GpuDevice, Jacobi, SolveAlgorithm, TransferStats,
};
use std::time::Instant;

fn report(target: &str, a: &DenseMatrix, b: &[f32], x: &[f32], iterations: usize, converged: bool) {
    log::info!("{} solve finished:", target);
    log::info!("  Iterations: {}", iterations);
    log::info!("  Converged: {}", converged);
    log::info!("  |Ax - b|_inf: {:.6e}", residual_inf_norm(a, x, b));
    log::debug!("  x (first 8 elements): {:?}", &x[..8.min(x.len())]);
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .filter_module("wgpu", log::LevelFilter::Off)
        .filter_module("naga", log::LevelFilter::Off)
        .init();

    let n = 1024;
    log::info!("Setting up {}x{} diagonally dominant system...", n, n);
    let (a, b) = diagonally_dominant(n, 1.0, 42);
    let algorithm = Jacobi::with_accuracy(1e-5);

    // Host target
    let cpu_device = CpuDevice::new();
    let start_time = Instant::now();
    match algorithm.solve(&cpu_device, &a, &b).await {
        Ok(result) => {
            report("CPU", &a, &b, &result.x, result.metadata.iterations, result.metadata.converged());
            log::info!("  Time elapsed: {:?}", start_time.elapsed());
        }
        Err(e) => log::error!("CPU solver failed: {:?}", e),
    }

    // GPU target, if the machine has one
    let gpu_device = match GpuDevice::try_new().await {
        Ok(Some(device)) => device,
        Ok(None) => {
            log::warn!("No GPU adapter found, skipping GPU solve");
            return;
        }
        Err(e) => {
            log::error!("Failed to create GPU device: {:?}", e);
            return;
        }
    };
    log::info!(
        "Running on {} with work-group size {}",
        gpu_device.adapter_info().name,
        gpu_device.workgroup_size()
    );
    gpu_device.reset_transfer_stats();

    let start_time = Instant::now();
    let x_result = algorithm.solve(&gpu_device, &a, &b).await;
    let duration = start_time.elapsed();

    let TransferStats {
        bytes_to_gpu,
        bytes_from_gpu,
    } = gpu_device.get_transfer_stats();
    log::info!("GPU Transfer Stats:");
    log::info!("  Bytes CPU -> GPU: {}", bytes_to_gpu);
    log::info!("  Bytes GPU -> CPU: {}", bytes_from_gpu);

    match x_result {
        Ok(result) => {
            report("GPU", &a, &b, &result.x, result.metadata.iterations, result.metadata.converged());
            log::info!("  Time elapsed: {:?}", duration);
        }
        Err(e) => log::error!("GPU solver failed: {:?}", e),
    }
}
