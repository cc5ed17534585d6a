//! Ember miner CLI.
//!
//! Parses the command-line surface into [`ProcessParameters`] and hands off
//! to the lifecycle controller. Exit codes: 0 for normal runs, help and
//! version output; 1 for argument, configuration or self-test errors.

use std::path::PathBuf;
use std::process;

use clap::error::ErrorKind;
use clap::{ArgGroup, Parser, ValueEnum};

use miner_control::{banner, BenchmarkSpec, GpuVendor, ProcessParameters};

#[derive(Parser, Debug)]
#[command(
    name = "ember-miner",
    about = "Guided pool miner with play/pause control and an HTTP status page",
    after_help = "The pool options can be used for automatic start without a guided config.\nIf a config exists, the given pool gets top priority.",
    disable_version_flag = true,
    group(ArgGroup::new("pool-url").args(["url", "tls_url"])),
)]
struct Args {
    /// show version number
    #[arg(short = 'v', long = "version")]
    version: bool,

    /// show long version number
    #[arg(short = 'V', long = "version-long")]
    version_long: bool,

    /// common miner configuration file
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// pool configuration file
    #[arg(short = 'C', long = "poolconf", value_name = "FILE")]
    poolconf: Option<PathBuf>,

    /// ONLY do a benchmark and exit
    #[arg(long = "benchmark", value_name = "BLOCKVERSION")]
    benchmark: Option<u8>,

    /// benchmark wait time
    #[arg(
        long = "benchwait",
        value_name = "WAIT_SEC",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(0..300)
    )]
    benchwait: u64,

    /// benchmark work time
    #[arg(
        long = "benchwork",
        value_name = "WORK_SEC",
        default_value_t = 60,
        value_parser = clap::value_parser!(u64).range(10..300)
    )]
    benchwork: u64,

    /// disable the CPU miner backend
    #[arg(long = "noCPU")]
    no_cpu: bool,

    /// disable the AMD miner backend
    #[arg(long = "noAMD")]
    no_amd: bool,

    /// disable the AMD(OpenCL) cache for precompiled binaries
    #[arg(long = "noAMDCache")]
    no_amd_cache: bool,

    /// use OpenCL driver of VENDOR and devices [AMD,NVIDIA]
    #[arg(
        long = "openCLVendor",
        value_name = "VENDOR",
        value_enum,
        default_value_t = VendorCli::Amd
    )]
    opencl_vendor: VendorCli,

    /// disable the NVIDIA miner backend
    #[arg(long = "noNVIDIA")]
    no_nvidia: bool,

    /// CPU backend miner config file
    #[arg(long = "cpu", value_name = "FILE")]
    cpu: Option<PathBuf>,

    /// AMD backend miner config file
    #[arg(long = "amd", value_name = "FILE")]
    amd: Option<PathBuf>,

    /// NVIDIA backend miner config file
    #[arg(long = "nvidia", value_name = "FILE")]
    nvidia: Option<PathBuf>,

    /// pool url and port, e.g. pool.example.com:3333
    #[arg(short = 'o', long = "url", value_name = "URL")]
    url: Option<String>,

    /// TLS pool url and port, e.g. pool.example.com:10443
    #[arg(short = 'O', long = "tls-url", value_name = "URL")]
    tls_url: Option<String>,

    /// pool user name or wallet address
    #[arg(short = 'u', long = "user", value_name = "USERNAME", requires = "pool-url")]
    user: Option<String>,

    /// pool password, in most cases x or empty ""
    #[arg(short = 'p', long = "pass", value_name = "PASSWD", requires = "pool-url")]
    pass: Option<String>,

    /// rig identifier for pool-side statistics (needs pool support)
    #[arg(short = 'r', long = "rigid", value_name = "RIGID", requires = "pool-url")]
    rigid: Option<String>,

    /// the pool should run in nicehash mode
    #[arg(long = "use-nicehash")]
    use_nicehash: bool,

    /// currency to mine
    #[arg(long = "currency", value_name = "NAME")]
    currency: Option<String>,

    /// HTTP interface port (0 disables the interface)
    #[arg(short = 'i', long = "httpd", value_name = "HTTP_PORT")]
    httpd: Option<u16>,

    /// disable the UAC dialog
    #[arg(long = "noUAC")]
    no_uac: bool,

    /// suppress the "are you an expert" question on the first run
    #[arg(long = "noExpert", alias = "no-expert")]
    no_expert: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum VendorCli {
    #[value(name = "AMD")]
    Amd,
    #[value(name = "NVIDIA")]
    Nvidia,
}

impl From<VendorCli> for GpuVendor {
    fn from(value: VendorCli) -> Self {
        match value {
            VendorCli::Amd => GpuVendor::Amd,
            VendorCli::Nvidia => GpuVendor::Nvidia,
        }
    }
}

/// `-noExpert` predates the double-dash convention; keep accepting it.
fn normalize_args<I: IntoIterator<Item = String>>(argv: I) -> Vec<String> {
    argv.into_iter()
        .map(|arg| {
            if arg == "-noExpert" {
                "--noExpert".to_string()
            } else {
                arg
            }
        })
        .collect()
}

fn build_params(args: &Args) -> ProcessParameters {
    let mut params = ProcessParameters::default();

    if let Some(path) = &args.config {
        params.config_file = path.clone();
    }
    if let Some(path) = &args.poolconf {
        params.pool_config_file = path.clone();
    }
    if let Some(path) = &args.cpu {
        params.cpu_config_file = path.clone();
    }
    if let Some(path) = &args.amd {
        params.amd_config_file = path.clone();
    }
    if let Some(path) = &args.nvidia {
        params.nvidia_config_file = path.clone();
    }

    if let Some(url) = &args.tls_url {
        params.pool_url = Some(url.clone());
        params.pool_use_tls = true;
    } else if let Some(url) = &args.url {
        params.pool_url = Some(url.clone());
        params.pool_use_tls = false;
    }
    params.pool_user = args.user.clone();
    if let Some(pass) = &args.pass {
        params.user_set_pass = true;
        params.pool_pass = Some(pass.clone());
    }
    if let Some(rigid) = &args.rigid {
        params.user_set_rigid = true;
        params.pool_rigid = Some(rigid.clone());
    }
    params.use_nicehash = args.use_nicehash;
    params.currency = args.currency.clone().unwrap_or_default();

    params.use_cpu = !args.no_cpu;
    params.use_amd = !args.no_amd;
    params.use_nvidia = !args.no_nvidia;
    params.amd_cache = !args.no_amd_cache;
    params.opencl_vendor = args.opencl_vendor.into();

    params.httpd_port = args.httpd;
    params.allow_elevation = !args.no_uac;
    params.ask_expert = !args.no_expert;

    params.benchmark = args.benchmark.map(|block_version| BenchmarkSpec {
        block_version,
        wait_sec: args.benchwait,
        work_sec: args.benchwork,
    });

    params
}

fn init_logger() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();
}

#[tokio::main]
async fn main() {
    let argv = normalize_args(std::env::args());
    let args = match Args::try_parse_from(argv) {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{e}");
                process::exit(0);
            }
            _ => {
                eprint!("{e}");
                process::exit(1);
            }
        },
    };

    if args.version {
        println!("Version: {}", banner::version_short());
        process::exit(0);
    }
    if args.version_long {
        println!("Version: {}", banner::version_long());
        process::exit(0);
    }

    init_logger();

    let params = build_params(&args);
    match miner_control::run(params).await {
        Ok(code) => process::exit(code),
        Err(e) => {
            log::error!("Miner terminated with error: {e:?}");
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Result<Args, clap::Error> {
        let argv: Vec<String> = std::iter::once("ember-miner".to_string())
            .chain(argv.iter().map(|s| s.to_string()))
            .collect();
        Args::try_parse_from(normalize_args(argv))
    }

    #[test]
    fn defaults_enable_every_backend_and_the_wizard() {
        let params = build_params(&parse(&[]).expect("parse"));
        assert!(params.use_cpu && params.use_amd && params.use_nvidia);
        assert!(params.ask_expert);
        assert!(params.pool_url.is_none());
        assert!(params.benchmark.is_none());
    }

    #[test]
    fn tls_url_sets_the_tls_flag() {
        let params = build_params(&parse(&["-O", "pool.example.com:10443"]).expect("parse"));
        assert_eq!(params.pool_url.as_deref(), Some("pool.example.com:10443"));
        assert!(params.pool_use_tls);

        let params = build_params(&parse(&["-o", "pool.example.com:3333"]).expect("parse"));
        assert!(!params.pool_use_tls);
    }

    #[test]
    fn credentials_require_a_pool_url() {
        assert!(parse(&["-u", "WALLET"]).is_err());
        assert!(parse(&["-p", "x"]).is_err());
        assert!(parse(&["-r", "rig-1"]).is_err());
        let params = build_params(
            &parse(&["-o", "pool.example.com:3333", "-u", "WALLET", "-p", ""]).expect("parse"),
        );
        assert_eq!(params.pool_user.as_deref(), Some("WALLET"));
        assert!(params.user_set_pass);
        assert_eq!(params.pool_pass.as_deref(), Some(""));
    }

    #[test]
    fn benchmark_ranges_are_enforced() {
        assert!(parse(&["--benchmark", "256"]).is_err());
        assert!(parse(&["--benchwait", "300"]).is_err());
        assert!(parse(&["--benchwork", "5"]).is_err());

        let params = build_params(
            &parse(&["--benchmark", "13", "--benchwait", "0", "--benchwork", "10"])
                .expect("parse"),
        );
        let spec = params.benchmark.expect("benchmark spec");
        assert_eq!(spec.block_version, 13);
        assert_eq!(spec.wait_sec, 0);
        assert_eq!(spec.work_sec, 10);
    }

    #[test]
    fn single_dash_no_expert_is_normalized() {
        let params = build_params(&parse(&["-noExpert"]).expect("parse"));
        assert!(!params.ask_expert);
    }

    #[test]
    fn config_paths_are_overridable() {
        let params =
            build_params(&parse(&["-c", "general.json", "-C", "mypools.json"]).expect("parse"));
        assert_eq!(params.config_file, PathBuf::from("general.json"));
        assert_eq!(params.pool_config_file, PathBuf::from("mypools.json"));
    }

    #[test]
    fn backend_toggles_and_vendor_map_through() {
        let params = build_params(
            &parse(&["--noCPU", "--noAMDCache", "--openCLVendor", "NVIDIA"]).expect("parse"),
        );
        assert!(!params.use_cpu);
        assert!(!params.amd_cache);
        assert_eq!(params.opencl_vendor, GpuVendor::Nvidia);
        assert!(parse(&["--openCLVendor", "intel"]).is_err());
    }

    #[test]
    fn unknown_flags_are_rejected() {
        assert!(parse(&["--definitely-not-a-flag"]).is_err());
        assert!(parse(&["--currency"]).is_err(), "missing argument");
    }
}
