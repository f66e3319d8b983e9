//! Compute device selection for inference.

use std::fmt;
use std::str::FromStr;

use tracing::{info, warn};

/// Compute target shared by every model in the process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Device {
    #[default]
    Cpu,
    Cuda(i32),
}

/// Requested device, as given on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DevicePreference {
    /// Use an accelerator when one is available.
    #[default]
    Auto,
    Cpu,
    Cuda,
}

impl FromStr for DevicePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" | "gpu" => Ok(Self::Cuda),
            other => Err(format!("unknown device {other:?} (expected auto, cpu, or cuda)")),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda(id) => write!(f, "cuda:{id}"),
        }
    }
}

impl Device {
    /// Pick the device once at startup.
    ///
    /// Never fails: a missing accelerator resolves to [`Device::Cpu`].
    pub fn select(preference: DevicePreference) -> Self {
        let device = match preference {
            DevicePreference::Cpu => Self::Cpu,
            DevicePreference::Auto => probe_accelerator().unwrap_or(Self::Cpu),
            DevicePreference::Cuda => probe_accelerator().unwrap_or_else(|| {
                warn!("CUDA requested but not available, falling back to CPU");
                Self::Cpu
            }),
        };
        info!("Using device: {device}");
        device
    }

    /// Execution providers for sessions bound to this device, CPU last as fallback.
    #[cfg(feature = "onnx")]
    pub fn execution_providers(&self) -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
        use ort::execution_providers::CPUExecutionProvider;

        let cpu = CPUExecutionProvider::default().build();
        match self {
            Self::Cpu => vec![cpu],
            #[cfg(feature = "cuda")]
            Self::Cuda(id) => vec![
                ort::execution_providers::CUDAExecutionProvider::default()
                    .with_device_id(*id)
                    .build(),
                cpu,
            ],
            #[cfg(not(feature = "cuda"))]
            Self::Cuda(_) => vec![cpu],
        }
    }
}

#[cfg(feature = "cuda")]
fn probe_accelerator() -> Option<Device> {
    use ort::execution_providers::{CUDAExecutionProvider, ExecutionProvider};

    match CUDAExecutionProvider::default().with_device_id(0).is_available() {
        Ok(true) => Some(Device::Cuda(0)),
        Ok(false) => None,
        Err(e) => {
            tracing::debug!(error = %e, "CUDA availability probe failed");
            None
        }
    }
}

#[cfg(not(feature = "cuda"))]
fn probe_accelerator() -> Option<Device> {
    None
}
