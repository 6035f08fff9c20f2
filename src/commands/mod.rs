//! Command-line interface and orchestration for contrib-rank
//!
//! Parses arguments, wires up the engine (cache, transport, pager,
//! aggregator), runs one aggregation, and renders the report.

mod rank;

pub use rank::{RankArgs, process_rank};

use crate::Result;
use clap::Parser;
use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = "contrib-rank", version, about = "Rank contributors across repositories matching a GitHub search", author)]
#[command(styles = CLAP_STYLES)]
struct Cli {
    #[command(flatten)]
    rank: RankArgs,
}

/// Dispatch command-line arguments to the rank command.
///
/// # Errors
///
/// Returns an error if argument parsing fails or the run terminally fails
/// (the repository search itself could not complete).
pub async fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    process_rank(&cli.rank).await
}
