use anyhow::Context;
use clap::{Arg, ArgAction, Command};
use common::config::Settings;
use songplays::processor::RunPhase;
use std::process;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(matches: &clap::ArgMatches) -> anyhow::Result<()> {
    let config_path = matches
        .get_one::<String>("config")
        .map(|s| s.as_str())
        .unwrap_or("config/songplays.toml");

    let mut settings = Settings::new(config_path)
        .with_context(|| format!("failed to load settings from {}", config_path))?;
    if let Some(input_root) = matches.get_one::<String>("input-root") {
        settings.pipeline.input_root = input_root.clone();
    }
    if let Some(output_root) = matches.get_one::<String>("output-root") {
        settings.pipeline.output_root = output_root.clone();
    }

    let phase = matches
        .get_one::<String>("phase")
        .map(|s| s.parse::<RunPhase>())
        .transpose()?
        .unwrap_or_default();

    info!(config = config_path, ?phase, "Starting songplays pipeline");
    let summary = songplays::run_songplays_pipeline(&settings, phase)
        .await
        .context("songplays pipeline failed")?;
    info!(run_id = %summary.run_id, tables = summary.tables.len(), "Songplays pipeline finished");
    Ok(())
}

#[tokio::main]
async fn main() {
    let matches = Command::new("songplays")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Builds the songplays star schema from song and event logs")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Sets a custom config file"),
        )
        .arg(
            Arg::new("input-root")
                .long("input-root")
                .value_name("URI")
                .help("Overrides pipeline.input_root (s3://bucket/prefix or a local path)"),
        )
        .arg(
            Arg::new("output-root")
                .long("output-root")
                .value_name("URI")
                .help("Overrides pipeline.output_root"),
        )
        .arg(
            Arg::new("phase")
                .long("phase")
                .value_name("PHASE")
                .value_parser(["all", "song-data", "log-data"])
                .help("Runs only part of the job"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .action(ArgAction::SetTrue)
                .help("Emits logs as JSON lines"),
        )
        .get_matches();

    init_tracing(matches.get_flag("json-logs"));

    if let Err(e) = run(&matches).await {
        error!("Songplays pipeline error: {:#}", e);
        process::exit(1);
    }
}
