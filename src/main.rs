use clap::Parser;
use env_logger::Env;
use log::{error, info, warn};
use std::path::PathBuf;
use std::process::ExitCode;
use svcmetrics::{
    default_collectors,
    shared::collector::collect_and_publish,
    AppError, Config, InfluxDbStorage, PublishSummary, RunCollector, SshExecutor, SystemClock,
};

#[derive(Debug, Parser)]
#[command(name = "svcmetrics", version, about = "SVC metrics collector for InfluxDB")]
struct Args {
    /// The configuration file
    config: PathBuf,

    /// Use a same collect time for all the targets
    #[arg(short, long)]
    fixed: bool,
}

async fn run(args: &Args) -> Result<PublishSummary, AppError> {
    let config = Config::load(&args.config)?;
    let storage = InfluxDbStorage::new(&config.influxdb)?;
    let executor = SshExecutor::new(config.ssh.clone());
    let clock = SystemClock;

    let collector = RunCollector::new(&executor, &clock).with_collectors(default_collectors());
    if args.fixed {
        info!("Using a single timestamp for every target");
    }

    let summary = collect_and_publish(
        &collector,
        &storage,
        &config.influxdb.database,
        &config.targets,
        args.fixed,
    )
    .await?;
    Ok(summary)
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match run(&args).await {
        Ok(summary) if summary.is_complete() => {
            info!("Stored batches of {} targets", summary.published);
            ExitCode::SUCCESS
        }
        Ok(summary) => {
            warn!(
                "Stored {} batches, failed for: [{}], unreachable: [{}]",
                summary.published,
                summary.failed.join(", "),
                summary.unreachable.join(", ")
            );
            ExitCode::from(2)
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
