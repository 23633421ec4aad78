use std::{ffi::OsString, time::Duration};

use chrono::{DateTime, Utc};
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use client::PrometheusClient;
use config::{Config, TargetsMode, DEFAULT_QUERY, DEFAULT_URL};
use parse::parse_duration_arg;
use runner::QueryRunner;

mod client;
mod config;
mod error;
mod parse;
mod prometheus;
mod runner;
mod series;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    if std::env::args_os().len() <= 1 {
        Cli::command().print_help()?;
        return Ok(());
    }
    let args = Cli::parse_from(normalize_args(std::env::args_os()));
    init_tracing();

    let config = Config::from_cli(&args, Utc::now())?;
    let api = PrometheusClient::new(&config)?;
    QueryRunner::new(api, std::io::stdout()).run(&config).await?;
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Rewrites single-dash long flags (`-url X`, `-step=30s`) to their `--` form so the
/// Go-style spelling keeps working. Short flags and values are left alone.
fn normalize_args<I: IntoIterator<Item = OsString>>(args: I) -> Vec<OsString> {
    let command = Cli::command();
    let longs: Vec<&str> = command
        .get_arguments()
        .filter_map(|arg| arg.get_long())
        .collect();
    args.into_iter()
        .map(|arg| match arg.to_str() {
            Some(flag) if is_single_dash_long(flag, &longs) => OsString::from(format!("-{flag}")),
            _ => arg,
        })
        .collect()
}

fn is_single_dash_long(arg: &str, longs: &[&str]) -> bool {
    let Some(rest) = arg.strip_prefix('-') else {
        return false;
    };
    if rest.starts_with('-') {
        return false;
    }
    let name = rest.split_once('=').map_or(rest, |(name, _)| name);
    longs.contains(&name)
}

/// Run a single range query against a Prometheus server and print the result.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    after_help = "Long flags also accept a single dash, e.g. -url http://localhost:9090 -step 30s"
)]
pub struct Cli {
    /// URL for prometheus connection
    #[arg(short, long, default_value = DEFAULT_URL)]
    url: String,

    /// Skip TLS certificate verification
    #[arg(short = 'k', long)]
    insecure: bool,

    /// Query window in minutes, ending now
    #[arg(short, long, default_value_t = 30)]
    duration: u32,

    /// Query resolution step, e.g. 30s, 1m, 1h30m
    #[arg(short, long, default_value = "1m")]
    step: String,

    /// Value sent verbatim in the Authorization header
    #[arg(short, long)]
    token: Option<String>,

    /// PromQL expression to evaluate
    #[arg(short, long, default_value = DEFAULT_QUERY)]
    query: String,

    /// Fixed window start (RFC 3339), overrides --duration
    #[arg(long, requires = "end")]
    start: Option<DateTime<Utc>>,

    /// Fixed window end (RFC 3339), overrides --duration
    #[arg(long, requires = "start")]
    end: Option<DateTime<Utc>>,

    /// Whether to list monitored targets before querying
    #[arg(long, value_enum, default_value_t = TargetsMode::Skip)]
    targets: TargetsMode,

    /// Convert every series of the result instead of only the first
    #[arg(long)]
    all_series: bool,

    /// Timeout for each request
    #[arg(long, default_value = "2m", value_parser = parse_duration_arg)]
    timeout: Duration,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn short_flags() {
        let args = Cli::parse_from([
            "query-range",
            "-u",
            "https://prom:9090",
            "-k",
            "-d",
            "5",
            "-s",
            "30s",
            "-t",
            "secret",
        ]);
        assert_eq!(args.url, "https://prom:9090");
        assert!(args.insecure);
        assert_eq!(args.duration, 5);
        assert_eq!(args.step, "30s");
        assert_eq!(args.token.as_deref(), Some("secret"));
    }

    fn parse_normalized(args: &[&str]) -> Cli {
        Cli::parse_from(normalize_args(args.iter().map(OsString::from)))
    }

    #[test]
    fn go_style_flags() {
        let args = parse_normalized(&[
            "query-range",
            "-url",
            "http://localhost:9091",
            "-insecure",
            "-duration",
            "15",
            "-step=30s",
            "-token",
            "secret",
        ]);
        assert_eq!(args.url, "http://localhost:9091");
        assert!(args.insecure);
        assert_eq!(args.duration, 15);
        assert_eq!(args.step, "30s");
        assert_eq!(args.token.as_deref(), Some("secret"));
    }

    #[test]
    fn normalizing_leaves_short_flags_and_values_alone() {
        let args: Vec<OsString> = ["query-range", "-s", "-url", "-d", "5", "--query", "-up"]
            .iter()
            .map(OsString::from)
            .collect();
        let normalized = normalize_args(args);
        assert_eq!(
            normalized,
            ["query-range", "-s", "--url", "-d", "5", "--query", "-up"]
                .iter()
                .map(OsString::from)
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn start_requires_end() {
        let res = Cli::try_parse_from(["query-range", "--start", "2019-05-14T00:00:00Z"]);
        assert!(res.is_err());
    }

    #[test]
    fn bad_timeout_is_rejected() {
        let res = Cli::try_parse_from(["query-range", "--timeout", "soon"]);
        assert!(res.is_err());
    }
}
