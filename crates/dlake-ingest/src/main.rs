//! csv-to-parquet - Main entry point

use std::io::Read;
use std::path::PathBuf;
use std::process;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use dlake_common::logging::{init_logging, LogConfig};
use dlake_ingest::config::RuntimeConfig;
use dlake_ingest::event::S3Event;
use dlake_ingest::metadata::{resolve, ObjectMetadata};
use dlake_ingest::pipeline::{CsvToParquetPipeline, InvocationContext};
use dlake_ingest::store::ObjectLocation;
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "csv-to-parquet")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load the objects named by a bucket notification event
    Handle {
        /// Event JSON file, `-` for stdin
        #[arg(short, long, default_value = "-", conflicts_with = "object")]
        event: String,

        /// Objects to load instead of an event (`s3://bucket/key`)
        #[arg(short, long)]
        object: Vec<String>,

        /// ARN of the invoked function; locates the notification topic
        #[arg(long, env = "FUNCTION_ARN")]
        function_arn: Option<String>,
    },

    /// Print the settings an object with the given metadata would be loaded with
    Resolve {
        /// Metadata entries as `key=value`
        #[arg(short, long, value_parser = parse_key_value)]
        metadata: Vec<(String, String)>,

        /// Object path used in error messages
        #[arg(long, default_value = "s3://bucket/key.csv")]
        path: String,
    },
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got {}", raw))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // CLI should work without logging
    let log_config = LogConfig::from_env().unwrap_or_default();
    let _ = init_logging(&log_config);

    if let Err(e) = execute_command(cli.command).await {
        error!(error = %format!("{:#}", e), "Command failed");
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn execute_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Handle {
            event,
            object,
            function_arn,
        } => handle(&event, &object, function_arn.as_deref()).await,
        Commands::Resolve { metadata, path } => {
            let raw: ObjectMetadata = metadata.into_iter().collect();
            let resolved = resolve(&path, &raw)?;
            println!("{}", serde_json::to_string_pretty(&resolved)?);
            Ok(())
        },
    }
}

async fn handle(event: &str, objects: &[String], function_arn: Option<&str>) -> anyhow::Result<()> {
    let config = RuntimeConfig::from_env().context("Invalid configuration")?;

    let event = if objects.is_empty() {
        load_event(event)?
    } else {
        let locations = objects
            .iter()
            .map(|o| ObjectLocation::parse(o))
            .collect::<anyhow::Result<Vec<_>>>()?;
        S3Event::for_objects(locations.iter().map(|l| (l.bucket.as_str(), l.key.as_str())))
    };

    let pipeline = CsvToParquetPipeline::from_config(&config).await?;
    let ctx = InvocationContext::new(config.notification_channel(function_arn));
    let report = pipeline.handle_event(&event, &ctx).await;

    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.has_failures() {
        return Err(anyhow!(
            "{} of {} objects failed",
            report.failures().count(),
            report.objects.len()
        ));
    }
    Ok(())
}

fn load_event(source: &str) -> anyhow::Result<S3Event> {
    let text = if source == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read event from stdin")?;
        text
    } else {
        let path = PathBuf::from(source);
        std::fs::read_to_string(&path).with_context(|| format!("Failed to read event file: {}", path.display()))?
    };
    serde_json::from_str(&text).context("Failed to parse event")
}
