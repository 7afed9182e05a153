//! Structured logging for the explain server
//!
//! Console output in pretty, JSON or compact form, optionally mirrored to a
//! daily rolling file. Filtering follows `RUST_LOG` syntax.

use anyhow::Context;
use std::str::FromStr;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

use crate::config::LoggingConfig;

const LOG_FILE_PREFIX: &str = "framemacros-server.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
    Compact,
}

impl FromStr for LogFormat {
    type Err = std::convert::Infallible;

    /// Unknown values fall back to pretty output.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    File,
    Both,
}

impl LogOutput {
    fn writes_file(self) -> bool {
        matches!(self, LogOutput::File | LogOutput::Both)
    }

    fn writes_stdout(self) -> bool {
        matches!(self, LogOutput::Stdout | LogOutput::Both)
    }
}

impl FromStr for LogOutput {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "file" => LogOutput::File,
            "both" => LogOutput::Both,
            _ => LogOutput::Stdout,
        })
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn console_layer(format: LogFormat) -> BoxedLayer {
    match format {
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_thread_ids(true)
            .with_target(true)
            .boxed(),
        LogFormat::Json => fmt::layer().json().with_current_span(true).boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
    }
}

fn file_layer(directory: &str) -> anyhow::Result<BoxedLayer> {
    std::fs::create_dir_all(directory)
        .with_context(|| format!("creating log directory {}", directory))?;
    let appender = RollingFileAppender::new(Rotation::DAILY, directory, LOG_FILE_PREFIX);
    Ok(fmt::layer()
        .with_writer(appender)
        .with_ansi(false)
        .boxed())
}

/// Filter from the configured level, with noisy HTTP internals held at warn.
fn env_filter(level: &str) -> anyhow::Result<EnvFilter> {
    let mut filter =
        EnvFilter::try_new(level).with_context(|| format!("invalid log filter `{}`", level))?;
    for directive in ["hyper=warn", "tokio=warn", "tower=warn", "h2=warn"] {
        filter = filter.add_directive(directive.parse()?);
    }
    Ok(filter)
}

/// Install the global subscriber. Call once at startup.
pub fn init(config: &LoggingConfig) -> anyhow::Result<()> {
    let format: LogFormat = config.format.parse()?;
    let output: LogOutput = config.output.parse()?;

    let mut layers: Vec<BoxedLayer> = Vec::new();
    if output.writes_stdout() {
        layers.push(console_layer(format));
    }
    if output.writes_file() {
        layers.push(file_layer(&config.directory)?);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter(&config.level)?)
        .try_init()
        .context("installing tracing subscriber")?;

    tracing::info!(
        format = ?format,
        output = ?output,
        level = %config.level,
        "Logging initialized"
    );
    if output.writes_file() {
        tracing::debug!(directory = %config.directory, "Writing rolling log files");
    }
    Ok(())
}

/// Emit one structured event with an `event` name and debug-formatted fields.
///
/// ```ignore
/// log_event!(
///     level: tracing::Level::INFO,
///     event: "explain_completed",
///     request_id: id,
///     triples: 3
/// );
/// ```
#[macro_export]
macro_rules! log_event {
    (level: $level:expr, event: $event:expr $(, $key:ident: $value:expr)* $(,)?) => {
        tracing::event!(
            $level,
            event = $event
            $(, $key = ?$value)*
        );
    };
}
