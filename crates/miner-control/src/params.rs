//! Immutable process parameters.
//!
//! Produced once by CLI parsing, shared as `Arc<ProcessParameters>` and never
//! mutated afterwards. Restart rebuilds everything else; this struct survives
//! unchanged for the process lifetime.

use std::path::PathBuf;

/// OpenCL vendor selection for the AMD backend slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GpuVendor {
    #[default]
    Amd,
    Nvidia,
}

/// Benchmark mode request, present only when `--benchmark` was given.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BenchmarkSpec {
    /// Block version stamped into the synthetic work buffer (0–255).
    pub block_version: u8,
    /// Warm-up seconds before measurement starts (0–299).
    pub wait_sec: u64,
    /// Measurement window seconds (10–299).
    pub work_sec: u64,
}

#[derive(Clone, Debug)]
pub struct ProcessParameters {
    pub currency: String,

    pub pool_url: Option<String>,
    pub pool_use_tls: bool,
    pub pool_user: Option<String>,
    pub pool_pass: Option<String>,
    pub pool_rigid: Option<String>,
    /// Set when `-p` was given explicitly, so an empty password is not
    /// re-prompted by the wizard.
    pub user_set_pass: bool,
    pub user_set_rigid: bool,
    pub use_nicehash: bool,

    pub use_cpu: bool,
    pub use_amd: bool,
    pub use_nvidia: bool,
    pub amd_cache: bool,
    pub opencl_vendor: GpuVendor,

    pub config_file: PathBuf,
    pub pool_config_file: PathBuf,
    pub cpu_config_file: PathBuf,
    pub amd_config_file: PathBuf,
    pub nvidia_config_file: PathBuf,

    /// HTTP status port; None = unset (wizard decides), Some(0) = disabled.
    pub httpd_port: Option<u16>,

    pub benchmark: Option<BenchmarkSpec>,

    /// Platform privilege-elevation opt-out (`--noUAC`); recorded on every
    /// platform, acted on only where elevation exists.
    pub allow_elevation: bool,

    /// Whether the first-run wizard may ask the expert question
    /// (`-noExpert` clears this).
    pub ask_expert: bool,
}

impl Default for ProcessParameters {
    fn default() -> Self {
        Self {
            currency: String::new(),
            pool_url: None,
            pool_use_tls: false,
            pool_user: None,
            pool_pass: None,
            pool_rigid: None,
            user_set_pass: false,
            user_set_rigid: false,
            use_nicehash: false,
            use_cpu: true,
            use_amd: true,
            use_nvidia: true,
            amd_cache: true,
            opencl_vendor: GpuVendor::Amd,
            config_file: PathBuf::from("config.json"),
            pool_config_file: PathBuf::from("pools.json"),
            cpu_config_file: PathBuf::from("cpu.json"),
            amd_config_file: PathBuf::from("amd.json"),
            nvidia_config_file: PathBuf::from("nvidia.json"),
            httpd_port: None,
            benchmark: None,
            allow_elevation: true,
            ask_expert: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_leave_the_wizard_in_charge() {
        let params = ProcessParameters::default();
        assert!(params.pool_url.is_none());
        assert!(params.httpd_port.is_none());
        assert!(params.benchmark.is_none());
        assert!(params.ask_expert);
        assert_eq!(params.config_file, PathBuf::from("config.json"));
    }
}
