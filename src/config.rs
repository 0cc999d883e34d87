//! Demo configuration and CLI argument parsing
//!
//! Every option can be given on the command line or through an environment
//! variable with the `TRAILCRAB_` prefix. CLI arguments take precedence over
//! environment variables, which take precedence over defaults.
//!
//! ```bash
//! # Burst of 50 requests, 10ms apart, against a 200ms window
//! trailcrab --requests 50 --interval-ms 10 --wait-ms 200
//!
//! # Same, configured from the environment
//! export TRAILCRAB_WAIT_MS=200
//! trailcrab --requests 50
//! ```

use anyhow::{Result, anyhow};
use clap::Parser;
use std::time::Duration;

/// Settings for one demo run
#[derive(Debug, Clone)]
pub struct DemoConfig {
    /// Minimum spacing between execution starts
    pub wait: Duration,
    /// Number of requests to fire
    pub requests: u64,
    /// Delay between two requests
    pub interval: Duration,
    /// How long each execution of the demo operation takes
    pub work: Duration,
    /// Fail every n-th execution (0 disables failures)
    pub fail_every: u64,
    /// Print metrics as JSON instead of Prometheus text
    pub json: bool,
    /// Logging level (error, warn, info, debug, trace)
    pub log_level: String,
}

#[derive(Parser, Debug)]
#[command(
    name = "trailcrab",
    about = "Drive a trailing throttler with a synthetic burst of requests",
    long_about = "Fires a burst of requests at a throttled operation and reports which ones ran.\n\nEnvironment variables with TRAILCRAB_ prefix are supported. CLI arguments take precedence over environment variables."
)]
pub struct Args {
    #[arg(
        long,
        value_name = "MS",
        help = "Wait window in milliseconds",
        default_value_t = 100,
        env = "TRAILCRAB_WAIT_MS"
    )]
    pub wait_ms: u64,
    #[arg(
        long,
        value_name = "N",
        help = "Number of requests to fire",
        default_value_t = 20,
        env = "TRAILCRAB_REQUESTS"
    )]
    pub requests: u64,
    #[arg(
        long,
        value_name = "MS",
        help = "Delay between requests in milliseconds",
        default_value_t = 15,
        env = "TRAILCRAB_INTERVAL_MS"
    )]
    pub interval_ms: u64,
    #[arg(
        long,
        value_name = "MS",
        help = "Duration of each execution in milliseconds",
        default_value_t = 40,
        env = "TRAILCRAB_WORK_MS"
    )]
    pub work_ms: u64,
    #[arg(
        long,
        value_name = "N",
        help = "Fail every N-th execution, 0 to never fail",
        default_value_t = 0,
        env = "TRAILCRAB_FAIL_EVERY"
    )]
    pub fail_every: u64,
    #[arg(long, help = "Print metrics as JSON", env = "TRAILCRAB_JSON")]
    pub json: bool,
    #[arg(
        long,
        value_name = "LEVEL",
        help = "Log level: error, warn, info, debug, trace",
        default_value = "info",
        env = "TRAILCRAB_LOG_LEVEL"
    )]
    pub log_level: String,

    #[arg(
        long,
        help = "List all environment variables and exit",
        action = clap::ArgAction::SetTrue
    )]
    pub list_env_vars: bool,
}

impl DemoConfig {
    /// Build configuration from environment variables and CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if the resulting configuration is invalid.
    pub fn from_env_and_args() -> Result<Self> {
        let args = Args::parse();

        if args.list_env_vars {
            Self::print_env_vars();
            std::process::exit(0);
        }

        let config = Self::from_args(args);
        config.validate()?;
        Ok(config)
    }

    fn from_args(args: Args) -> Self {
        DemoConfig {
            wait: Duration::from_millis(args.wait_ms),
            requests: args.requests,
            interval: Duration::from_millis(args.interval_ms),
            work: Duration::from_millis(args.work_ms),
            fail_every: args.fail_every,
            json: args.json,
            log_level: args.log_level,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.wait.is_zero() {
            return Err(anyhow!(
                "The wait window must be at least 1ms.\n\n\
                Example:\n  \
                trailcrab --wait-ms 250"
            ));
        }
        if self.requests == 0 {
            return Err(anyhow!("At least one request must be fired (--requests)"));
        }
        if !matches!(
            self.log_level.as_str(),
            "error" | "warn" | "info" | "debug" | "trace"
        ) {
            return Err(anyhow!(
                "Invalid log level: {}. Valid options are: error, warn, info, debug, trace",
                self.log_level
            ));
        }
        Ok(())
    }

    fn print_env_vars() {
        println!("trailcrab Environment Variables");
        println!("===============================");
        println!();
        println!("All environment variables use the TRAILCRAB_ prefix.");
        println!("CLI arguments take precedence over environment variables.");
        println!();
        println!("  TRAILCRAB_WAIT_MS=<ms>          Wait window [default: 100]");
        println!("  TRAILCRAB_REQUESTS=<n>          Number of requests [default: 20]");
        println!("  TRAILCRAB_INTERVAL_MS=<ms>      Delay between requests [default: 15]");
        println!("  TRAILCRAB_WORK_MS=<ms>          Duration of each execution [default: 40]");
        println!("  TRAILCRAB_FAIL_EVERY=<n>        Fail every n-th execution [default: 0]");
        println!("  TRAILCRAB_JSON=true|false       Print metrics as JSON");
        println!(
            "  TRAILCRAB_LOG_LEVEL=<level>     Log level: error, warn, info, debug, trace [default: info]"
        );
    }
}
