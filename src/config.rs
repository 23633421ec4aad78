use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use tracing::warn;

use crate::{
    error::{QueryRunnerError, Result},
    parse::parse_duration,
    Cli,
};

pub const DEFAULT_URL: &str = "http://localhost:9090";
pub const DEFAULT_QUERY: &str =
    "sum by (pod_name) (container_memory_rss{container_name=\"prometheus\"})";
pub const DEFAULT_STEP: Duration = Duration::from_secs(60);

/// What to do with the "list monitored targets" call made before the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TargetsMode {
    /// Don't list targets
    #[default]
    Skip,
    /// List targets, log a failure and carry on
    Report,
    /// List targets, abort the run on failure
    Require,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeriesSelection {
    #[default]
    First,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub step: Duration,
}

impl Range {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, step: Duration) -> Result<Self> {
        if start > end {
            return Err(QueryRunnerError::InvalidWindow(format!(
                "start {start} is after end {end}"
            )));
        }
        if step.is_zero() {
            return Err(QueryRunnerError::InvalidWindow(
                "step must be greater than zero".to_string(),
            ));
        }
        Ok(Range { start, end, step })
    }

    /// A window of `minutes` ending at `now`.
    pub fn ending_at(now: DateTime<Utc>, minutes: u32, step: Duration) -> Result<Self> {
        let start = now - chrono::Duration::minutes(minutes.into());
        Range::new(start, now, step)
    }

    /// Form parameters of a `query_range` request.
    pub fn query_params(&self, query: &str) -> Vec<(&'static str, String)> {
        vec![
            ("query", query.to_string()),
            ("start", format_time(&self.start)),
            ("end", format_time(&self.end)),
            ("step", format_seconds(self.step.as_secs_f64())),
        ]
    }
}

fn format_time(time: &DateTime<Utc>) -> String {
    let seconds = time.timestamp() as f64 + f64::from(time.timestamp_subsec_nanos()) / 1e9;
    format_seconds(seconds)
}

fn format_seconds(seconds: f64) -> String {
    format!("{seconds}")
}

/// Everything one run needs, fixed at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub url: String,
    pub auth_token: Option<String>,
    pub insecure_tls: bool,
    pub timeout: Duration,
    pub query: String,
    pub range: Range,
    pub targets: TargetsMode,
    pub series: SeriesSelection,
}

impl Config {
    pub fn from_cli(cli: &Cli, now: DateTime<Utc>) -> Result<Self> {
        let step = resolve_step(&cli.step);
        let range = match (cli.start, cli.end) {
            (Some(start), Some(end)) => Range::new(start, end, step)?,
            (None, None) => Range::ending_at(now, cli.duration, step)?,
            _ => {
                return Err(QueryRunnerError::InvalidWindow(
                    "--start and --end must be given together".to_string(),
                ))
            }
        };

        Ok(Config {
            url: cli.url.clone(),
            auth_token: cli.token.clone().filter(|token| !token.is_empty()),
            insecure_tls: cli.insecure,
            timeout: cli.timeout,
            query: cli.query.clone(),
            range,
            targets: cli.targets,
            series: if cli.all_series {
                SeriesSelection::All
            } else {
                SeriesSelection::First
            },
        })
    }
}

/// A step that does not parse, or parses to zero, is reported and replaced by
/// [`DEFAULT_STEP`]; it never aborts the run.
pub fn resolve_step(raw: &str) -> Duration {
    match parse_duration(raw) {
        Ok(step) if !step.is_zero() => step,
        Ok(_) => {
            warn!(step = raw, "step must be greater than zero, using {DEFAULT_STEP:?}");
            DEFAULT_STEP
        }
        Err(e) => {
            let err = QueryRunnerError::from(e);
            warn!("{err}");
            warn!("using default step of {DEFAULT_STEP:?}");
            DEFAULT_STEP
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::{Arc, Mutex};

    use chrono::TimeZone;
    use clap::Parser;
    use pretty_assertions::assert_eq;

    use super::*;

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn with_captured_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let result = tracing::subscriber::with_default(subscriber, f);
        (result, logs.contents())
    }

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("query-range").chain(args.iter().copied()))
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 2, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn defaults() {
        let config = Config::from_cli(&cli(&["--url", DEFAULT_URL]), now()).unwrap();
        assert_eq!(config.url, "http://localhost:9090");
        assert_eq!(config.auth_token, None);
        assert!(!config.insecure_tls);
        assert_eq!(config.query, DEFAULT_QUERY);
        assert_eq!(config.range.step, Duration::from_secs(60));
        assert_eq!(config.targets, TargetsMode::Skip);
        assert_eq!(config.series, SeriesSelection::First);
        assert_eq!(config.timeout, Duration::from_secs(120));
    }

    #[test]
    fn duration_window_ends_now() {
        let config = Config::from_cli(&cli(&["--duration", "30"]), now()).unwrap();
        assert_eq!(config.range.end, now());
        assert_eq!(config.range.start, now() - chrono::Duration::minutes(30));
    }

    #[test]
    fn fixed_window_is_passed_through() {
        let config = Config::from_cli(
            &cli(&[
                "--start",
                "2019-05-14T00:00:00Z",
                "--end",
                "2019-05-15T00:00:00Z",
                "--step",
                "1m",
            ]),
            now(),
        )
        .unwrap();
        assert_eq!(
            config.range.query_params("up"),
            vec![
                ("query", "up".to_string()),
                ("start", "1557792000".to_string()),
                ("end", "1557878400".to_string()),
                ("step", "60".to_string()),
            ]
        );
    }

    #[test]
    fn fractional_times_keep_precision() {
        let start = Utc.timestamp_opt(1557792000, 500_000_000).unwrap();
        let range = Range::new(start, start, Duration::from_millis(1500)).unwrap();
        let params = range.query_params("up");
        assert_eq!(params[1], ("start", "1557792000.5".to_string()));
        assert_eq!(params[3], ("step", "1.5".to_string()));
    }

    #[test]
    fn bad_step_falls_back_to_default() {
        let config = Config::from_cli(&cli(&["--step", "every minute"]), now()).unwrap();
        assert_eq!(config.range.step, DEFAULT_STEP);
    }

    #[test]
    fn bad_step_logs_a_warning() {
        let (step, logs) = with_captured_logs(|| resolve_step("every minute"));
        assert_eq!(step, DEFAULT_STEP);
        assert!(logs.contains("WARN"), "{logs}");
        assert!(
            logs.contains("Step error: invalid duration \"every minute\""),
            "{logs}"
        );
        assert!(logs.contains("using default step of 60s"), "{logs}");
    }

    #[test]
    fn zero_step_falls_back_to_default() {
        let (step, logs) = with_captured_logs(|| resolve_step("0s"));
        assert_eq!(step, DEFAULT_STEP);
        assert!(logs.contains("step must be greater than zero"), "{logs}");

        let (step, logs) = with_captured_logs(|| resolve_step("15s"));
        assert_eq!(step, Duration::from_secs(15));
        assert!(logs.is_empty(), "{logs}");
    }

    #[test]
    fn start_after_end_is_rejected() {
        let err = Config::from_cli(
            &cli(&[
                "--start",
                "2019-05-15T00:00:00Z",
                "--end",
                "2019-05-14T00:00:00Z",
            ]),
            now(),
        )
        .unwrap_err();
        assert!(matches!(err, QueryRunnerError::InvalidWindow(_)));
    }

    #[test]
    fn zero_step_range_is_rejected() {
        assert!(Range::new(now(), now(), Duration::ZERO).is_err());
    }

    #[test]
    fn empty_token_means_no_header() {
        let config = Config::from_cli(&cli(&["--token", ""]), now()).unwrap();
        assert_eq!(config.auth_token, None);

        let config = Config::from_cli(&cli(&["--token", "Bearer abc"]), now()).unwrap();
        assert_eq!(config.auth_token.as_deref(), Some("Bearer abc"));
    }

    #[test]
    fn selection_and_targets_flags() {
        let config =
            Config::from_cli(&cli(&["--all-series", "--targets", "require"]), now()).unwrap();
        assert_eq!(config.series, SeriesSelection::All);
        assert_eq!(config.targets, TargetsMode::Require);
    }
}
