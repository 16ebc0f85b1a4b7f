//! Single-threaded backend.

use crate::backend::{BackendType, ComputeBackend, ComputeError, DeviceInfo};

/// Evaluates tasks in order on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialBackend;

impl ComputeBackend for SerialBackend {
    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            name: "Serial".to_string(),
            backend_type: BackendType::Serial,
            compute_units: Some(1),
        }
    }

    fn parallel_map(
        &self,
        count: usize,
        task_fn: &(dyn Fn(usize) -> f64 + Send + Sync),
    ) -> Result<Vec<f64>, ComputeError> {
        Ok((0..count).map(task_fn).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_preserves_order() {
        let out = SerialBackend.parallel_map(4, &|i| (i * i) as f64).unwrap();
        assert_eq!(out, vec![0.0, 1.0, 4.0, 9.0]);
        assert_eq!(SerialBackend.device_info().backend_type, BackendType::Serial);
    }

    #[test]
    fn test_serial_empty() {
        assert!(SerialBackend.parallel_map(0, &|_| 1.0).unwrap().is_empty());
    }
}
