//! CLI argument parsing and config file support.
//!
//! Settings are layered, later layers winning:
//!
//! 1. built-in defaults (`AppConfig::default()`),
//! 2. the JSON file given with `--config`,
//! 3. environment variables (`RATE_LIMIT_PER_MIN`, ...),
//! 4. CLI flags.

use std::path::{Path, PathBuf};

use socialnet_types::config::AppConfig;

// ---------------------------------------------------------------------------
// CLI arguments (manual parsing, no clap dependency)
// ---------------------------------------------------------------------------

/// Parsed command-line arguments.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CliArgs {
    pub config_path: Option<PathBuf>,
    pub rate_limit: Option<u32>,
    pub notification_buffer: Option<usize>,
    pub demo: bool,
}

/// What the command line asked for.
#[derive(Debug, PartialEq, Eq)]
pub enum CliAction {
    Run(CliArgs),
    Help,
}

impl CliArgs {
    /// Parses `std::env::args`, skipping the program name.
    pub fn parse_from_env() -> Result<CliAction, String> {
        Self::parse(std::env::args().skip(1))
    }

    /// Parses an argument list that excludes the program name.
    pub fn parse<I>(args: I) -> Result<CliAction, String>
    where
        I: IntoIterator<Item = String>,
    {
        let mut cli = Self::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => {
                    cli.config_path = Some(PathBuf::from(value_for(&arg, args.next())?));
                }
                "--rate-limit" => {
                    cli.rate_limit = Some(number_for(&arg, args.next())?);
                }
                "--notification-buffer" => {
                    cli.notification_buffer = Some(number_for(&arg, args.next())?);
                }
                "--demo" => {
                    cli.demo = true;
                }
                "--help" | "-h" => return Ok(CliAction::Help),
                other => return Err(format!("unknown argument: {other}")),
            }
        }

        Ok(CliAction::Run(cli))
    }
}

fn value_for(flag: &str, value: Option<String>) -> Result<String, String> {
    value.ok_or_else(|| format!("{flag} requires a value"))
}

fn number_for<T: std::str::FromStr>(flag: &str, value: Option<String>) -> Result<T, String> {
    let value = value_for(flag, value)?;
    value
        .parse()
        .map_err(|_| format!("{flag}: expected a number, got {value:?}"))
}

// ---------------------------------------------------------------------------
// Config resolution
// ---------------------------------------------------------------------------

/// Loads an [`AppConfig`] from a JSON file. Missing fields keep their
/// defaults; durations are seconds, fractional for sub-second values.
///
/// Example `socialnet.json`:
/// ```json
/// {
///   "rate_limit_count": 120,
///   "rate_limit_window": 60,
///   "notification_buffer": 256,
///   "cleanup_interval": 1800
/// }
/// ```
pub fn load_file(path: &Path) -> Result<AppConfig, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read config file {}: {e}", path.display()))?;
    serde_json::from_str(&text).map_err(|e| format!("invalid config JSON: {e}"))
}

/// Applies every layer, then validates once, so a later layer can fix
/// a value an earlier one got wrong.
pub fn resolve<F>(cli: &CliArgs, env: F) -> Result<AppConfig, String>
where
    F: Fn(&str) -> Option<String>,
{
    let base = match &cli.config_path {
        Some(path) => load_file(path)?,
        None => AppConfig::default(),
    };

    let mut config = base.merge_env(env).map_err(|e| e.to_string())?;

    if let Some(limit) = cli.rate_limit {
        config.rate_limit_count = limit;
    }
    if let Some(buffer) = cli.notification_buffer {
        config.notification_buffer = buffer;
    }

    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Help
// ---------------------------------------------------------------------------

pub fn print_help() {
    println!(
        r#"socialnet daemon - headless social core

USAGE:
    socialnet-daemon [OPTIONS]

OPTIONS:
    --config <PATH>              Load settings from JSON config file
    --rate-limit <N>             Admissions per client per window
    --notification-buffer <N>    Notification queue capacity
    --demo                       Run a short scripted scenario at startup
    -h, --help                   Show this help

ENVIRONMENT:
    RATE_LIMIT_PER_MIN              Admissions per window (default: 60)
    RATE_LIMIT_WINDOW               Sliding window (default: 60s)
    RATE_LIMIT_IDLE_TTL             Idle client eviction (default: 10m)
    RATE_LIMIT_MAX_CLIENTS          Tracked client cap (default: 100000)
    NOTIFICATION_BUFFER             Queue capacity (default: 100)
    NOTIFICATION_ENQUEUE_TIMEOUT    Enqueue deadline (default: 5s)
    CLEANUP_INTERVAL                Retention sweep interval (default: 1h)
    NOTIFICATION_MAX_AGE            Retention horizon (default: 7d)
    RUST_LOG                        Log level filter (default: info)
"#
    );
}
