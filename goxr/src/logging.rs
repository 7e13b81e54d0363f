use std::fmt;
use std::str::FromStr;

use structopt::StructOpt;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown log format: {0} (expected text or json)")]
pub struct ParseLogFormatError(String);

impl FromStr for LogFormat {
    type Err = ParseLogFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(ParseLogFormatError(s.to_string())),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogFormat::Text => "text",
            LogFormat::Json => "json",
        })
    }
}

#[derive(Debug, StructOpt)]
pub struct LoggingOpts {
    #[structopt(
        long = "log-level",
        default_value = "info",
        global = true,
        help = "Minimal level to log: error, warn, info, debug or trace"
    )]
    pub level: Level,

    #[structopt(
        long = "log-format",
        default_value = "text",
        global = true,
        help = "Log output format: text or json"
    )]
    pub format: LogFormat,

    #[structopt(short, long, global = true, help = "Show verbose output")]
    pub verbose: bool,
}

impl LoggingOpts {
    /// The level actually used when `RUST_LOG` is not set.
    pub fn effective_level(&self) -> Level {
        if self.verbose {
            std::cmp::max(self.level, Level::DEBUG)
        } else {
            self.level
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.effective_level().to_string()))
    }
}

/// Installs the global subscriber. Logs go to stderr so `cat` output stays clean.
pub fn init(opts: &LoggingOpts) -> anyhow::Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(opts.filter())
        .with_writer(std::io::stderr)
        .with_target(false);

    match opts.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|e| anyhow::anyhow!("Cannot install logger: {}", e))
}
