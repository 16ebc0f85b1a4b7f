//! CPU compute backend using Rayon for shared-memory parallelism.

use std::sync::Arc;

use rayon::prelude::*;

use crate::backend::{BackendType, ComputeBackend, ComputeError, DeviceInfo};

/// CPU backend that parallelises work across threads via Rayon.
pub struct CpuBackend {
    num_threads: usize,
    /// Dedicated pool when a thread count was requested; the global pool otherwise.
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl CpuBackend {
    /// Create a new CPU backend on Rayon's global pool.
    pub fn new() -> Self {
        Self {
            num_threads: rayon::current_num_threads(),
            pool: None,
        }
    }

    /// Create a CPU backend with its own pool of `num_threads` threads.
    pub fn with_threads(num_threads: usize) -> Result<Self, ComputeError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(|e| ComputeError::Unavailable(e.to_string()))?;
        Ok(Self {
            num_threads: pool.current_num_threads(),
            pool: Some(Arc::new(pool)),
        })
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ComputeBackend for CpuBackend {
    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            name: format!("CPU ({} threads)", self.num_threads),
            backend_type: BackendType::Cpu,
            compute_units: Some(self.num_threads),
        }
    }

    fn parallel_map(
        &self,
        count: usize,
        task_fn: &(dyn Fn(usize) -> f64 + Send + Sync),
    ) -> Result<Vec<f64>, ComputeError> {
        let run = || (0..count).into_par_iter().map(task_fn).collect::<Vec<f64>>();
        Ok(match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_matches_serial_order() {
        let backend = CpuBackend::new();
        let out = backend.parallel_map(100, &|i| i as f64 * 0.5).unwrap();
        let expected: Vec<f64> = (0..100).map(|i| i as f64 * 0.5).collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn test_dedicated_pool() {
        let backend = CpuBackend::with_threads(2).unwrap();
        let info = backend.device_info();
        assert_eq!(info.backend_type, BackendType::Cpu);
        assert_eq!(info.compute_units, Some(2));
        assert_eq!(backend.parallel_map(3, &|i| i as f64).unwrap(), vec![0.0, 1.0, 2.0]);
    }
}
