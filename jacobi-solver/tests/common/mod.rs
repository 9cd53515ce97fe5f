#![allow(dead_code)]

use jacobi_solver::GpuDevice;

/// Helper for float comparison in tests
pub fn assert_approx_eq_vec(a: &[f32], b: &[f32], tolerance: f32) {
    assert_eq!(a.len(), b.len(), "Vector lengths differ");
    for i in 0..a.len() {
        let diff = (a[i] - b[i]).abs();
        assert!(
            diff <= tolerance,
            "Verification failed at index {}: expected {}, got {}, diff {}",
            i,
            b[i],
            a[i],
            diff
        );
    }
}

pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .filter_module("wgpu", log::LevelFilter::Off)
        .filter_module("naga", log::LevelFilter::Off)
        .is_test(true)
        .try_init();
}

/// GPU device for tests, or `None` (after a note on stderr) on machines without an adapter.
pub fn gpu_device() -> Option<GpuDevice> {
    init_logging();
    match GpuDevice::try_new_blocking() {
        Ok(Some(device)) => Some(device),
        Ok(None) => {
            eprintln!("skipping GPU test: no adapter available");
            None
        }
        Err(e) => {
            eprintln!("skipping GPU test: device initialisation failed: {}", e);
            None
        }
    }
}
