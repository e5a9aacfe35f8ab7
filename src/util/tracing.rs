//! Tracing helpers
// (c) 2024 Ross Younger

use std::{
    fs::File,
    io::Write,
    sync::atomic::{AtomicBool, Ordering},
    sync::Arc,
};

use anyhow::Context;
use chrono::{DateTime, Local, SecondsFormat, Utc};
use indicatif::MultiProgress;
use serde::{de, Deserialize, Serialize};
use strum::VariantNames as _;
use tracing_subscriber::{
    fmt::{format::Writer, time::FormatTime, MakeWriter},
    prelude::*,
    EnvFilter, Layer, Registry,
};

use crate::cli::OutputOptions;

static TRACING_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Log line time stamps
const LOG_FORMAT_LOCAL: &str = "%Y-%m-%d %H:%M:%S%.3f";
const LOG_FORMAT_UTC: &str = "%Y-%m-%d %H:%M:%S%.3fZ";

/// Human-readable calendar format, as used in transfer summaries
const CALENDAR_FORMAT: &str = "%c";

/// Environment variable that controls what gets logged to stderr
const STANDARD_ENV_VAR: &str = "RUST_LOG";
/// Environment variable that controls what gets logged to file
const LOG_FILE_DETAIL_ENV_VAR: &str = "RUST_LOG_FILE_DETAIL";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Computes the trace level for a given set of [`OutputOptions`]
pub(crate) fn trace_level(args: &OutputOptions) -> &'static str {
    if args.debug {
        "debug"
    } else if args.quiet {
        "error"
    } else {
        "info"
    }
}

/// Selects the format of time stamps in log messages and transfer summaries
#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    Eq,
    PartialEq,
    strum::Display,
    strum::EnumString,
    strum::VariantNames,
    clap::ValueEnum,
    Serialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "kebab-case")]
pub enum TimeFormat {
    /// Local time (as best as we can figure it out)
    #[default]
    Local,
    /// UTC time
    Utc,
    /// [RFC 3339](https://datatracker.ietf.org/doc/html/rfc3339), e.g. `2010-03-14T18:32:03+00:00`
    Rfc3339,
}

impl<'de> Deserialize<'de> for TimeFormat {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        std::str::FromStr::from_str(&s.to_ascii_lowercase())
            .map_err(|_| de::Error::unknown_variant(&s, TimeFormat::VARIANTS))
    }
}

impl TimeFormat {
    /// Renders a POSIX timestamp for people to read.
    ///
    /// Timestamps that cannot be represented are shown as raw seconds.
    #[must_use]
    pub fn render_timestamp(self, secs: u32) -> String {
        let Some(utc) = DateTime::<Utc>::from_timestamp(i64::from(secs), 0) else {
            return format!("{secs} seconds since the epoch");
        };
        match self {
            TimeFormat::Local => utc
                .with_timezone(&Local)
                .format(CALENDAR_FORMAT)
                .to_string(),
            TimeFormat::Utc => utc.format(CALENDAR_FORMAT).to_string(),
            TimeFormat::Rfc3339 => utc.to_rfc3339(),
        }
    }
}

impl FormatTime for TimeFormat {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        match self {
            TimeFormat::Local => write!(w, "{}", Local::now().format(LOG_FORMAT_LOCAL)),
            TimeFormat::Utc => write!(w, "{}", Utc::now().format(LOG_FORMAT_UTC)),
            TimeFormat::Rfc3339 => write!(
                w,
                "{}",
                Local::now().to_rfc3339_opts(SecondsFormat::Millis, false)
            ),
        }
    }
}

/// An event filter, and whether it came from the environment
struct Filter {
    env: EnvFilter,
    from_env: bool,
}

impl Filter {
    /// Obeys `var` if it is set; otherwise passes our own events at `level` and above.
    fn new(var: &str, level: &str) -> anyhow::Result<Self> {
        if let Ok(directives) = std::env::var(var) {
            let env = EnvFilter::try_new(&directives)
                .with_context(|| format!("{var} (set in environment) was not understood"))?;
            return Ok(Self {
                env,
                from_env: true,
            });
        }
        Ok(Self {
            env: EnvFilter::try_new(format!("tcpfetch={level}"))?,
            from_env: false,
        })
    }
}

fn layer_for<W>(writer: W, filter: Filter, time_format: TimeFormat, ansi: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    // Targets are only interesting if the environment let in events from other crates.
    tracing_subscriber::fmt::layer()
        .compact()
        .with_timer(time_format)
        .with_target(filter.from_env)
        .with_ansi(ansi)
        .with_writer(writer)
        .with_filter(filter.env)
        .boxed()
}

/// Where console trace output goes
pub(crate) enum ConsoleTraceType {
    /// Trace directly to stderr
    Standard,
    /// Trace above the progress bars, so they are not disturbed
    Indicatif(MultiProgress),
}

/// Set up rust tracing, to console and optionally to file.
///
/// By default we log only our own events, at a given trace level.
/// This can be overridden by setting `RUST_LOG`.
///
/// **CAUTION:** If this function fails, tracing is not set up; callers must report the error some other way.
///
/// Only the first successful call in a process has any effect.
pub(crate) fn setup(
    trace_level: &str,
    console: ConsoleTraceType,
    log_file: Option<&String>,
    time_format: TimeFormat,
    ansi_colours: bool,
) -> anyhow::Result<()> {
    if is_initialized() {
        tracing::warn!("tracing::setup called a second time (ignoring)");
        return Ok(());
    }
    let layers = build_layers(trace_level, console, log_file, time_format, ansi_colours)?;
    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .context("failed to install trace subscriber")?;
    TRACING_INITIALIZED.store(true, Ordering::Relaxed);
    Ok(())
}

fn build_layers(
    trace_level: &str,
    console: ConsoleTraceType,
    log_file: Option<&String>,
    time_format: TimeFormat,
    ansi_colours: bool,
) -> anyhow::Result<Vec<BoxedLayer>> {
    let filter = Filter::new(STANDARD_ENV_VAR, trace_level)?;
    let mut layers = vec![match console {
        ConsoleTraceType::Standard => layer_for(std::io::stderr, filter, time_format, ansi_colours),
        ConsoleTraceType::Indicatif(display) => layer_for(
            AboveProgressBars(display),
            filter,
            time_format,
            ansi_colours,
        ),
    }];

    if let Some(filename) = log_file {
        let out_file = Arc::new(File::create(filename).context("Failed to open log file")?);
        let var = if std::env::var_os(LOG_FILE_DETAIL_ENV_VAR).is_some() {
            LOG_FILE_DETAIL_ENV_VAR
        } else {
            STANDARD_ENV_VAR
        };
        layers.push(layer_for(
            out_file,
            Filter::new(var, trace_level)?,
            time_format,
            false,
        ));
    }
    Ok(layers)
}

/// Returns whether tracing has been initialized
pub(crate) fn is_initialized() -> bool {
    TRACING_INITIALIZED.load(Ordering::Relaxed)
}

/// Prints log events above a set of progress bars
struct AboveProgressBars(MultiProgress);

impl<'a> MakeWriter<'a> for AboveProgressBars {
    type Writer = PendingLine;

    fn make_writer(&'a self) -> PendingLine {
        PendingLine {
            display: self.0.clone(),
            text: Vec::new(),
        }
    }
}

/// One log event, collected and printed as a whole when dropped
struct PendingLine {
    display: MultiProgress,
    text: Vec<u8>,
}

impl Write for PendingLine {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.text.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Drop for PendingLine {
    fn drop(&mut self) {
        let text = String::from_utf8_lossy(&self.text);
        let line = text.trim_end_matches('\n');
        if line.is_empty() {
            return;
        }
        // a hidden display (quiet mode) swallows println
        if self.display.is_hidden() {
            eprintln!("{line}");
        } else {
            let _ = self.display.println(line);
        }
    }
}

#[cfg(test)]
mod test {
    use indicatif::{MultiProgress, ProgressDrawTarget};
    use pretty_assertions::assert_eq;
    use rusty_fork::rusty_fork_test;
    use tracing_subscriber::fmt::{format::Writer, time::FormatTime as _, MakeWriter as _};

    use super::{build_layers, setup, trace_level, AboveProgressBars, ConsoleTraceType, TimeFormat};
    use crate::cli::OutputOptions;

    #[test]
    fn trace_levels() {
        let p = OutputOptions {
            debug: true,
            quiet: true,
            ..Default::default()
        };
        assert_eq!(trace_level(&p), "debug");
        let p = OutputOptions {
            quiet: true,
            ..Default::default()
        };
        assert_eq!(trace_level(&p), "error");
        assert_eq!(trace_level(&OutputOptions::default()), "info");
    }

    #[test]
    fn time_format_parsing() {
        #[derive(serde::Deserialize)]
        struct Holder {
            tf: TimeFormat,
        }
        let h: Holder = figment::Figment::from(figment::providers::Serialized::default(
            "tf", "UTC",
        ))
        .extract()
        .unwrap();
        assert_eq!(h.tf, TimeFormat::Utc);
        let h: Result<Holder, _> = figment::Figment::from(
            figment::providers::Serialized::default("tf", "sundial"),
        )
        .extract();
        assert!(h.is_err());
    }

    #[test]
    fn render_timestamps() {
        assert_eq!(
            TimeFormat::Rfc3339.render_timestamp(1_700_000_000),
            "2023-11-14T22:13:20+00:00"
        );
        assert_eq!(
            TimeFormat::Utc.render_timestamp(1_700_000_000),
            "Tue Nov 14 22:13:20 2023"
        );
        // local time depends on the machine, but always mentions the year
        assert!(TimeFormat::Local.render_timestamp(1_700_000_000).contains("2023"));
    }

    #[test]
    fn log_timestamps() {
        let mut s = String::new();
        TimeFormat::Utc.format_time(&mut Writer::new(&mut s)).unwrap();
        // 2024-01-02 03:04:05.678Z
        assert_eq!(s.len(), 24);
        assert!(s.ends_with('Z'));
    }

    #[test]
    fn console_layer_only() {
        let mp = MultiProgress::new();
        let layers = build_layers(
            "info",
            ConsoleTraceType::Indicatif(mp),
            None,
            TimeFormat::Local,
            false,
        )
        .unwrap();
        assert_eq!(layers.len(), 1);
    }

    #[test]
    fn console_and_file_layers() {
        let dir = tempfile::tempdir().unwrap();
        let filename = dir.path().join("test.log").to_string_lossy().to_string();
        let layers = build_layers(
            "info",
            ConsoleTraceType::Standard,
            Some(&filename),
            TimeFormat::Rfc3339,
            false,
        )
        .unwrap();
        assert_eq!(layers.len(), 2);
        assert!(dir.path().join("test.log").exists());
    }

    #[test]
    fn invalid_level() {
        let result = build_layers(
            "invalid_level",
            ConsoleTraceType::Standard,
            None,
            TimeFormat::Utc,
            false,
        );
        assert!(result.is_err());
    }

    #[test]
    fn pending_line_collects_writes() {
        use std::io::Write as _;
        let bars = AboveProgressBars(MultiProgress::with_draw_target(
            ProgressDrawTarget::hidden(),
        ));
        let mut line = bars.make_writer();
        assert_eq!(line.write(b"part one, ").unwrap(), 10);
        line.write_all(b"part two\n").unwrap();
        assert_eq!(line.text, b"part one, part two\n");
        line.flush().unwrap();
    }

    // these tests affect global state, so need to run in forks
    rusty_fork_test! {
        #[test]
        fn setup_twice() {
            setup("debug", ConsoleTraceType::Standard, None, TimeFormat::Utc, false).unwrap();
            assert!(super::is_initialized());
            // a second call must succeed (albeit with a warning)
            setup("debug", ConsoleTraceType::Standard, None, TimeFormat::Utc, false).unwrap();
        }

        #[test]
        fn failed_setup_is_not_initialised() {
            std::env::set_var("RUST_LOG", "tcpfetch=sundial");
            let e = setup("info", ConsoleTraceType::Standard, None, TimeFormat::Utc, false).unwrap_err();
            assert!(e.to_string().contains("RUST_LOG"));
            assert!(!super::is_initialized());
        }
    }
}
