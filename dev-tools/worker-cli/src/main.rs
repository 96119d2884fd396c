// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Compile EC2 worker pools into machine classes and machine deployments

use anyhow::anyhow;
use anyhow::Context;
use camino::Utf8PathBuf;
use clap::Parser;
use clap::Subcommand;
use slog::info;
use slog::Drain;
use slog::Level;
use slog::LevelFilter;
use slog::Logger;
use slog_term::FullFormat;
use slog_term::TermDecorator;
use worker_planning::example::ExampleSystem;
use worker_planning::PoolCompiler;
use worker_types::worker::ClusterInfo;
use worker_types::worker::WorkerSpec;

mod config;

use config::Config;

fn parse_log_level(s: &str) -> anyhow::Result<Level> {
    s.parse().map_err(|_| anyhow!("Invalid log level"))
}

/// Compile EC2 worker pools into machine classes and machine deployments
#[derive(Clone, Debug, Parser)]
struct Cli {
    /// The log level, when the config file has no `[log]` section
    #[arg(
        long,
        value_parser = parse_log_level,
        default_value_t = Level::Warning,
    )]
    log_level: Level,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Clone, Debug, Subcommand)]
enum Cmd {
    /// Compile a worker spec and print the result as JSON
    Compile {
        /// Path to the TOML config file
        #[arg(short, long)]
        config: Utf8PathBuf,
        /// Path to the JSON worker spec
        #[arg(short, long)]
        input: Utf8PathBuf,
    },
    /// Print an example worker spec
    Example {
        /// Number of zones of the example pool
        #[arg(
            long,
            default_value_t = 3,
            value_parser = clap::value_parser!(u8).range(1..=26),
        )]
        zones: u8,
    },
    /// Print the JSON schema of worker specs
    Schema,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    match args.cmd {
        Cmd::Compile { config, input } => {
            compile(&config, &input, args.log_level).await
        }
        Cmd::Example { zones } => {
            let example = ExampleSystem::new(usize::from(zones));
            println!("{}", serde_json::to_string_pretty(&example.spec)?);
            Ok(())
        }
        Cmd::Schema => {
            let schema = schemars::schema_for!(WorkerSpec);
            println!("{}", serde_json::to_string_pretty(&schema)?);
            Ok(())
        }
    }
}

async fn compile(
    config_path: &Utf8PathBuf,
    input_path: &Utf8PathBuf,
    log_level: Level,
) -> anyhow::Result<()> {
    let config = Config::from_file(config_path)?;
    let log = match &config.log {
        Some(log_config) => log_config
            .to_logger("worker-cli")
            .context("failed to create logger")?,
        None => terminal_logger(log_level),
    };

    let input = std::fs::read_to_string(input_path)
        .with_context(|| format!("error reading {input_path:?}"))?;
    let spec: WorkerSpec = serde_json::from_str(&input)
        .with_context(|| format!("error parsing {input_path:?}"))?;
    info!(
        log,
        "loaded worker spec";
        "path" => %input_path,
        "namespace" => &spec.namespace,
        "pools" => spec.pools.len(),
    );

    let images = config.image_catalog();
    let user_data = config.static_user_data();
    let cluster = ClusterInfo::from(config.cluster);
    let compiled = PoolCompiler::new(&log, &images, &user_data)
        .compile(&spec, &cluster)
        .await
        .with_context(|| format!("failed to compile {input_path:?}"))?;

    println!("{}", serde_json::to_string_pretty(&compiled)?);
    Ok(())
}

fn terminal_logger(level: Level) -> Logger {
    let decorator = TermDecorator::new().build();
    let drain = FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    let drain = LevelFilter::new(drain, level).fuse();
    Logger::root(drain, slog::o!("unit" => "worker-cli"))
}
