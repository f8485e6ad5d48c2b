use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use crate::fetch::DEFAULT_USER_AGENT;

pub fn parse_args() -> Cli {
    Cli::parse()
}

/// Bounded parallel task dispatch: CPU-bound digest mining and I/O-bound fetching
#[derive(Parser, Debug)]
#[command(name = "fanout")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search for random tokens whose MD5 digest ends in a run of zeros
    Mine(MineArgs),

    /// Fetch every URL listed in a file, reporting results as they complete
    Fetch(FetchArgs),
}

#[derive(Args, Debug)]
pub struct MineArgs {
    /// Number of searches to run
    #[arg(long, default_value_t = 4)]
    pub tasks: usize,

    /// Number of trailing zero characters the digest must end with
    #[arg(long, default_value_t = 5)]
    pub suffix: usize,

    /// One search per listed suffix length (e.g. 3,4,5); overrides --tasks and --suffix
    #[arg(long, value_delimiter = ',', conflicts_with_all = ["tasks", "suffix"])]
    pub lengths: Vec<usize>,

    #[command(flatten)]
    pub batch: BatchArgs,

    /// Maximum concurrent searches (default: one per CPU)
    #[arg(long, env = "FANOUT_MINE_WORKERS")]
    pub workers: Option<usize>,
}

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// File with one URL per line
    pub file: PathBuf,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "60", value_parser = parse_seconds)]
    pub timeout: Duration,

    /// User-Agent header sent with every request
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    #[command(flatten)]
    pub batch: BatchArgs,

    /// Maximum concurrent requests (default: 64 per CPU, at most 4096)
    #[arg(long, env = "FANOUT_FETCH_WORKERS")]
    pub workers: Option<usize>,
}

/// Options shared by every mode.
#[derive(Args, Debug)]
pub struct BatchArgs {
    /// Cancel whatever is still outstanding after this many seconds
    #[arg(long, value_parser = parse_seconds)]
    pub deadline: Option<Duration>,

    /// Print a per-status summary table when the batch completes
    #[arg(long)]
    pub summary: bool,

    /// Show a progress bar on stderr
    #[arg(long)]
    pub progress: bool,
}

fn parse_seconds(raw: &str) -> Result<Duration, String> {
    let secs: f64 = raw
        .parse()
        .map_err(|_| format!("`{raw}` is not a number of seconds"))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("`{raw}`: {e}"))
}

pub struct Console {
    bar: ProgressBar,
}

pub fn console(total: u64, label: &str, visible: bool) -> Console {
    if !visible {
        return Console {
            bar: ProgressBar::hidden(),
        };
    }

    let bar = ProgressBar::new(total);
    let style = ProgressStyle::with_template("{prefix} [{bar:40.cyan/blue}] {pos}/{len}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");
    bar.set_style(style);
    bar.set_prefix(label.to_string());

    Console { bar }
}

/// Print one result line to stdout and advance the bar.
pub fn report(console: &Console, line: &str) {
    console.bar.suspend(|| println!("{line}"));
    console.bar.inc(1);
}

pub fn finish(console: &Console) {
    console.bar.finish_and_clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn mine_defaults() {
        let cli = Cli::try_parse_from(["fanout", "mine"]).unwrap();
        let Commands::Mine(args) = cli.command else {
            panic!("expected mine");
        };
        assert_eq!(args.tasks, 4);
        assert_eq!(args.suffix, 5);
        assert!(args.lengths.is_empty());
        assert_eq!(args.batch.deadline, None);
    }

    #[test]
    fn mine_lengths_list() {
        let argv = ["fanout", "mine", "--lengths", "3,4,5", "--deadline", "1.5"];
        let cli = Cli::try_parse_from(argv).unwrap();
        let Commands::Mine(args) = cli.command else {
            panic!("expected mine");
        };
        assert_eq!(args.lengths, vec![3, 4, 5]);
        assert_eq!(args.batch.deadline, Some(Duration::from_millis(1500)));
    }

    #[test]
    fn lengths_conflict_with_explicit_suffix() {
        let argv = ["fanout", "mine", "--lengths", "3", "--suffix", "4"];
        assert!(Cli::try_parse_from(argv).is_err());
    }

    #[test]
    fn fetch_arguments() {
        let argv = ["fanout", "fetch", "urls.txt", "--timeout", "0.05"];
        let cli = Cli::try_parse_from(argv).unwrap();
        let Commands::Fetch(args) = cli.command else {
            panic!("expected fetch");
        };
        assert_eq!(args.file, PathBuf::from("urls.txt"));
        assert_eq!(args.timeout, Duration::from_millis(50));
        assert_eq!(args.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn rejects_negative_seconds() {
        assert!(parse_seconds("-1").is_err());
        assert!(parse_seconds("soon").is_err());
        assert_eq!(parse_seconds("2").unwrap(), Duration::from_secs(2));
    }
}
