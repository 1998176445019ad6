//! # GPIO Driver Daemon
//!
//! Maps the GPIO register block, creates one FIFO node per configured pin
//! and serves writes to those nodes until interrupted.
//!
//! # Usage
//!
//! ```bash
//! # Run from a config file
//! gpio_driver --config /etc/rpi-gpio/gpio.toml
//!
//! # No config file: pins from the command line
//! gpio_driver --pin 17 --pin 22
//!
//! # Simulated registers, nodes in a scratch directory
//! gpio_driver -s --pin 17 --dev-dir /tmp/gpio -v
//!
//! # Drive the pin
//! echo 1 > /dev/led17
//! ```

#![deny(warnings)]

use clap::Parser;
use gpio_common::config::{ConfigError, ConfigLoader, LogLevel};
use gpio_common::gpio::config::GpioConfig;
use gpio_common::gpio::consts::DEFAULT_CONFIG_PATH;
use gpio_driver::backends::BackendRegistry;
use gpio_driver::host::FifoHost;
use gpio_driver::lifecycle::GpioDriver;
use gpio_driver::service::NodeService;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Memory-mapped GPIO output driver
#[derive(Parser, Debug)]
#[command(name = "gpio_driver")]
#[command(version)]
#[command(about = "Memory-mapped GPIO output driver exposing one device node per pin")]
#[command(long_about = None)]
struct Args {
    /// Path to driver configuration file (gpio.toml)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Pin to expose (can be specified multiple times; replaces the config list)
    #[arg(short, long = "pin", action = clap::ArgAction::Append)]
    pins: Vec<i64>,

    /// Register backend to use (overrides config)
    #[arg(short, long)]
    backend: Option<String>,

    /// Force simulated registers
    #[arg(short = 's', long)]
    simulate: bool,

    /// Directory to create device nodes in (overrides config)
    #[arg(long, value_name = "DIR")]
    dev_dir: Option<PathBuf>,

    /// Device node name prefix (overrides config)
    #[arg(long)]
    prefix: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() {
    if let Err(e) = run() {
        error!("GPIO driver failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Tracing needs the configured level, but config errors must be logged too.
    let config = match load_config(&args) {
        Ok(config) => {
            setup_tracing(&args, config.shared.log_level);
            config
        }
        Err(e) => {
            setup_tracing(&args, LogLevel::default());
            return Err(e.into());
        }
    };

    info!("GPIO driver v{} starting...", env!("CARGO_PKG_VERSION"));
    if !args.config.exists() {
        warn!("No config at {:?}, using command-line pins", args.config);
    }

    // Installed before any node exists so an early SIGINT still tears down.
    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        flag.store(false, Ordering::SeqCst);
    })?;

    let backends = BackendRegistry::with_builtin();
    let host = FifoHost::new(&config.driver.device_dir);
    let mut driver = GpioDriver::start_with_backends(&config, &backends, Box::new(host))?;

    let served = match driver.device() {
        Some(device) => {
            NodeService::new(device, config.driver.poll_interval()).run(&driver.node_paths(), &running)
        }
        None => Ok(()),
    };

    driver.shutdown();
    served?;

    info!("GPIO driver shutdown complete");
    Ok(())
}

/// Load the config file and apply command-line overrides.
///
/// A missing config file is fine when pins were given with `--pin`.
fn load_config(args: &Args) -> Result<GpioConfig, ConfigError> {
    let mut config = match GpioConfig::load(&args.config) {
        Ok(config) => config,
        Err(ConfigError::FileNotFound) if !args.pins.is_empty() => {
            GpioConfig::from_pins(args.pins.clone())
        }
        Err(e) => return Err(e),
    };

    if !args.pins.is_empty() {
        config.driver.pins = args.pins.clone();
    }
    if let Some(backend) = &args.backend {
        config.registers.backend = backend.clone();
    }
    if args.simulate {
        config.registers.backend = "simulation".to_string();
    }
    if let Some(dir) = &args.dev_dir {
        config.driver.device_dir = dir.clone();
    }
    if let Some(prefix) = &args.prefix {
        config.driver.device_prefix = prefix.clone();
    }

    config.validate()?;
    Ok(config)
}

/// Setup tracing subscriber based on CLI arguments and the configured level.
fn setup_tracing(args: &Args, level: LogLevel) {
    let directive = if args.verbose {
        "debug"
    } else {
        level.as_directive()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
