use std::{path::PathBuf, time::Duration};

use clap::Parser;
use countsem::{config::StressConfig, runner::StressRunner};

#[derive(clap::Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(short, long)]
    waiters: Option<usize>,
    #[arg(short, long)]
    signals: Option<usize>,
    #[arg(short, long)]
    initial_count: Option<i32>,
    #[arg(short = 't', long, value_parser = humantime::parse_duration)]
    wait_timeout: Option<Duration>,
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();
    let args = Args::parse();

    let mut config = match args.config {
        Some(path) => StressConfig::from_file(path)?,
        None => StressConfig::default(),
    };

    if let Some(waiters) = args.waiters {
        config.workload.waiters = waiters;
    }

    if let Some(signals) = args.signals {
        config.workload.signals = signals;
    }

    if let Some(initial_count) = args.initial_count {
        config.semaphore.initial_count = initial_count;
    }

    if let Some(wait_timeout) = args.wait_timeout {
        config.workload.wait_timeout = wait_timeout;
    }

    let report = StressRunner::run(&config)?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.is_balanced() {
        anyhow::bail!("semaphore accounting is off: {:?}", report);
    }

    Ok(())
}
