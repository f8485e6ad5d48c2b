use tokio::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod cli;
mod error;
mod fetch;
mod limits;
mod mine;
mod pool;
mod report;

use error::Result;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = cli::parse_args();

    match args.command {
        cli::Commands::Mine(args) => run_mine(args).await,
        cli::Commands::Fetch(args) => run_fetch(args).await,
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run_mine(args: cli::MineArgs) -> Result<()> {
    let workers = args.workers.unwrap_or_else(limits::cpu_workers);
    let config = pool::config(workers, args.batch.deadline)?;
    let tasks = if args.lengths.is_empty() {
        mine::batch(args.tasks, args.suffix)
    } else {
        mine::batch_for_lengths(&args.lengths)
    };
    info!(tasks = tasks.len(), workers, "starting mine batch");

    let now = Instant::now();
    let dispatch = pool::spawn(&config, tasks, mine::mine_suffix);
    let console = cli::console(dispatch.total, "mine", args.batch.progress);
    let summary = consume(dispatch, &console, |completion| match &completion.outcome {
        Ok(mined) => mined.to_string(),
        Err(err) => format!("task {}: {err}", completion.id),
    })
    .await;
    cli::finish(&console);

    if args.batch.summary {
        report::print_summary(&summary);
    }
    report::print_elapsed(now);

    Ok(())
}

async fn run_fetch(args: cli::FetchArgs) -> Result<()> {
    let workers = args.workers.unwrap_or_else(limits::io_workers);
    let config = pool::config(workers, args.batch.deadline)?;
    let urls = fetch::read_urls(&args.file).await?;
    let client = fetch::client(&args.user_agent)?;
    let tasks = fetch::batch(urls, args.timeout);
    info!(tasks = tasks.len(), workers, timeout = ?args.timeout, "starting fetch batch");

    let now = Instant::now();
    let dispatch = pool::spawn(&config, tasks, move |task, _cancel| {
        fetch::fetch_resource(client.clone(), task)
    });
    let console = cli::console(dispatch.total, "fetch", args.batch.progress);
    let summary = consume(dispatch, &console, |completion| match &completion.outcome {
        Ok(body) => format!("{} {} bytes", completion.task.url, body.len()),
        Err(err) => format!("{} {err}", completion.task.url),
    })
    .await;
    cli::finish(&console);

    if args.batch.summary {
        report::print_summary(&summary);
    }
    info!(elapsed = ?now.elapsed(), "fetch batch complete");

    Ok(())
}

/// Drain the batch, printing each result as it completes.
async fn consume<T, P>(
    mut dispatch: pool::Dispatch<T, P>,
    console: &cli::Console,
    render: impl Fn(&pool::Completion<T, P>) -> String,
) -> report::Summary {
    let mut summary = report::Summary::default();
    while let Some(completion) = dispatch.next().await {
        summary.record(&completion.outcome);
        cli::report(console, &render(&completion));
    }
    summary
}
