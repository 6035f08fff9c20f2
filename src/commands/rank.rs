//! The rank command: run one aggregation and render the report.

use crate::Result;
use crate::engine::{Aggregator, Cache, CancelToken, Client, DEFAULT_TTL, Pager, Throttler};
use crate::reports::generate_console;
use clap::{Args, ValueEnum};
use core::time::Duration;
use directories::BaseDirs;
use ohno::{EnrichableExt, IntoAppError};
use std::path::PathBuf;

/// Default and public GitHub API endpoint.
const DEFAULT_API_BASE_URL: &str = "https://api.github.com";

/// Color mode configuration for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Always use colors
    Always,

    /// Never use colors
    Never,

    /// Use colors if the output is a terminal, otherwise don't use colors
    Auto,
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// No logging output
    None,

    /// Only error messages
    Error,

    /// Warning and error messages
    Warn,

    /// Info, warning, and error messages
    Info,

    /// Debug and above
    Debug,

    /// Everything
    Trace,
}

#[derive(Args, Debug)]
pub struct RankArgs {
    /// GitHub search query, e.g. "topic:llm"
    pub query: String,

    /// GitHub API token used for authenticated requests
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Directory for the response cache (defaults to the platform cache dir)
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// How long cached responses stay fresh, in hours
    #[arg(long, default_value_t = DEFAULT_TTL.as_secs() / 3600)]
    pub cache_ttl_hours: u64,

    /// Treat every cache lookup as a miss
    #[arg(long)]
    pub ignore_cached: bool,

    /// Maximum number of concurrent API requests
    #[arg(long, default_value_t = 5)]
    pub max_concurrency: usize,

    /// Only consider the top N repositories from the search
    #[arg(long)]
    pub max_repos: Option<usize>,

    /// Base URL of the GitHub API
    #[arg(long, default_value = DEFAULT_API_BASE_URL, hide = true)]
    pub api_base_url: String,

    /// Logging verbosity
    #[arg(long, value_enum, default_value_t = LogLevel::Warn)]
    pub log_level: LogLevel,

    /// When to colorize output
    #[arg(long, value_enum, default_value_t = ColorMode::Auto)]
    pub color: ColorMode,
}

/// Run one aggregation for the query and render the ranked report.
///
/// Partial runs still render; their diagnostics go to stderr. Only a failed
/// repository search returns an error.
pub async fn process_rank(args: &RankArgs) -> Result<()> {
    init_logging(args.log_level);

    let cache_dir = if let Some(dir) = &args.cache_dir {
        dir.clone()
    } else {
        BaseDirs::new()
            .into_app_err("could not determine cache directory")?
            .cache_dir()
            .join("contrib-rank")
    };

    let cache = Cache::new(cache_dir, Duration::from_secs(args.cache_ttl_hours * 3600), args.ignore_cached);
    let client = Client::new(args.github_token.as_deref(), &args.api_base_url)?;
    let throttler = Throttler::new(args.max_concurrency.max(1));
    let pager = Pager::new(client, cache, throttler);
    let aggregator = Aggregator::new(pager, args.max_repos);

    let cancel = CancelToken::new();
    let report = match aggregator.run(&args.query, &cancel).await {
        Ok(report) => report,
        Err(failure) => {
            return Err(ohno::app_err!("repository search failed").enrich_with(|| failure.to_string()));
        }
    };

    let use_colors = match args.color {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => {
            use std::io::{IsTerminal, stdout};
            stdout().is_terminal()
        }
    };

    let mut rendered = String::new();
    generate_console(&report, use_colors, &mut rendered)?;
    print!("{rendered}");

    for diagnostic in &report.diagnostics {
        eprintln!("warning: {diagnostic}");
    }

    Ok(())
}

/// Initialize logger based on log level
fn init_logging(log_level: LogLevel) {
    let level = match log_level {
        LogLevel::None => return,
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };

    let env = env_logger::Env::default().filter_or("RUST_LOG", level);

    env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(matches!(log_level, LogLevel::Debug | LogLevel::Trace))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct TestCli {
        #[command(flatten)]
        rank: RankArgs,
    }

    #[test]
    fn defaults() {
        let cli = TestCli::parse_from(["contrib-rank", "topic:llm"]);
        assert_eq!(cli.rank.query, "topic:llm");
        assert_eq!(cli.rank.cache_ttl_hours, 5);
        assert_eq!(cli.rank.max_concurrency, 5);
        assert_eq!(cli.rank.max_repos, None);
        assert_eq!(cli.rank.api_base_url, DEFAULT_API_BASE_URL);
        assert!(!cli.rank.ignore_cached);
        assert_eq!(cli.rank.color, ColorMode::Auto);
    }

    #[test]
    fn flags_parse() {
        let cli = TestCli::parse_from([
            "contrib-rank",
            "language:rust stars:>100",
            "--max-repos",
            "10",
            "--max-concurrency",
            "2",
            "--ignore-cached",
            "--cache-ttl-hours",
            "1",
            "--color",
            "never",
        ]);
        assert_eq!(cli.rank.query, "language:rust stars:>100");
        assert_eq!(cli.rank.max_repos, Some(10));
        assert_eq!(cli.rank.max_concurrency, 2);
        assert!(cli.rank.ignore_cached);
        assert_eq!(cli.rank.cache_ttl_hours, 1);
        assert_eq!(cli.rank.color, ColorMode::Never);
    }
}
