/*!
 * RiskGuard CLI - operator drills for the protected scoring service
 */

use clap::{Args, Parser, Subcommand, ValueEnum};
use riskguard::{
    cli_style,
    commands::{drill, simulate},
    config::{LogLevel, RiskGuardConfig},
    error::{RiskGuardError, EXIT_FATAL, EXIT_RUNTIME, EXIT_SUCCESS},
    logging,
};
use riskguard_core_resilience::CircuitState;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "riskguard")]
#[command(
    version,
    about = "Circuit-breaker protected risk scoring with rule-based fallback",
    long_about = None
)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long = "log-level", value_enum, global = true)]
    log_level: Option<LogLevelArg>,

    /// Log file path (JSON lines); logs go to stderr otherwise
    #[arg(long = "log", value_name = "FILE", global = true)]
    log: Option<PathBuf>,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive a flaky simulated model through the protected service
    Simulate(SimulateArgs),

    /// Walk the breaker through an outage and recovery on a manual clock
    Drill,

    /// Print the effective configuration as TOML
    ShowConfig,
}

#[derive(Args)]
struct SimulateArgs {
    /// Number of requests to send
    #[arg(short = 'n', long, default_value_t = 200)]
    requests: usize,

    /// Probability that a model call fails (0.0 - 1.0)
    #[arg(short = 'f', long, default_value_t = 0.3)]
    failure_rate: f64,

    /// Model latency per call in milliseconds
    #[arg(short = 'l', long, default_value_t = 20)]
    latency_ms: u64,

    /// Maximum requests in flight
    #[arg(short = 'j', long, default_value_t = 8)]
    concurrency: usize,

    /// RNG seed for reproducible runs
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Also print the Prometheus exposition
    #[arg(long)]
    prometheus: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for LogLevel {
    fn from(arg: LogLevelArg) -> Self {
        match arg {
            LogLevelArg::Error => LogLevel::Error,
            LogLevelArg::Warn => LogLevel::Warn,
            LogLevelArg::Info => LogLevel::Info,
            LogLevelArg::Debug => LogLevel::Debug,
            LogLevelArg::Trace => LogLevel::Trace,
        }
    }
}

fn main() {
    let code = match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = e
                .downcast_ref::<RiskGuardError>()
                .map(RiskGuardError::exit_code)
                .unwrap_or(EXIT_RUNTIME);
            let hint = (code == EXIT_FATAL).then_some("check the configuration file");
            cli_style::print_error(&format!("{:#}", e), hint);
            code
        }
    };
    std::process::exit(code);
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(ref path) => RiskGuardConfig::load(path)?,
        None => RiskGuardConfig::default(),
    };

    // Command-line flags override the [logging] section
    if let Some(level) = cli.log_level {
        config.logging.level = level.into();
    }
    if cli.log.is_some() {
        config.logging.file = cli.log.clone();
    }
    config.logging.verbose |= cli.verbose;

    if let Err(e) = logging::init_logging(&config.logging) {
        cli_style::print_warning(&format!("Failed to initialize logging: {}", e));
    }

    match cli.command {
        Commands::ShowConfig => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
        Commands::Simulate(args) => {
            let options = simulate::SimulateOptions {
                requests: args.requests,
                failure_rate: args.failure_rate,
                latency: Duration::from_millis(args.latency_ms),
                concurrency: args.concurrency,
                seed: args.seed,
                prometheus: args.prometheus,
            };
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            let report = runtime.block_on(simulate::run_simulation(&config, &options))?;
            if args.json {
                simulate::print_report_json(&report)?;
            } else {
                simulate::print_report(&report);
            }
            Ok(())
        }
        Commands::Drill => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            let steps = runtime.block_on(drill::run_drill(&config.service_breaker()))?;
            drill::print_drill(&steps);
            match steps.last().map(|s| s.snapshot.state) {
                Some(CircuitState::Closed) => {
                    cli_style::print_success("Drill complete: breaker recovered")
                }
                state => cli_style::print_warning(&format!(
                    "Drill ended with breaker in state {:?}",
                    state
                )),
            }
            Ok(())
        }
    }
}
