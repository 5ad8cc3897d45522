//! Command-line front end for the docpipe job service.
//!
//! Every command opens the storage root, runs, and drains the worker queue
//! before exiting, so `submit` returns once the job has finished.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docpipe::{load_effective_config, telemetry, ExportFormat, JobService, SubmitOptions};

#[derive(Parser, Debug)]
#[command(
    name = "docpipe",
    version,
    about = "Run documents through remote OCR and enrichment, then query the results"
)]
struct Cli {
    /// Config file (JSON or YAML). Defaults to ~/.docpipe/config.json when present.
    #[arg(short, long, global = true, env = "DOCPIPE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a local document and process it
    Submit {
        file: PathBuf,
        /// Request bounding-box annotations (needs --schema)
        #[arg(long)]
        annotations: bool,
        /// JSON schema for annotations, inline or @path
        #[arg(long)]
        schema: Option<String>,
        /// Generate a document summary
        #[arg(long)]
        qna: bool,
    },
    /// Process a document the remote service fetches by URL
    SubmitUrl {
        url: String,
        #[arg(long)]
        annotations: bool,
        #[arg(long)]
        schema: Option<String>,
        #[arg(long)]
        qna: bool,
    },
    /// Show a job's status
    Status { job_id: String },
    /// Print a job's result document
    Result { job_id: String },
    /// List recent jobs
    Jobs {
        #[arg(long)]
        limit: Option<u64>,
    },
    /// Ask a question about a processed document
    Ask { job_id: String, question: String },
    /// Export a result as markdown or docx
    Export {
        job_id: String,
        #[arg(long, default_value = "md")]
        format: ExportFormat,
        /// Output file; defaults to the suggested filename
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

fn read_schema(arg: Option<&str>) -> Result<Option<String>> {
    let Some(arg) = arg else {
        return Ok(None);
    };
    match arg.strip_prefix('@') {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read schema file {}", path))?;
            Ok(Some(content))
        }
        None => Ok(Some(arg.to_string())),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(service: &JobService, command: Command) -> Result<()> {
    match command {
        Command::Submit {
            file,
            annotations,
            schema,
            qna,
        } => {
            let schema = read_schema(schema.as_deref())?;
            let options = SubmitOptions::parse(annotations, schema.as_deref(), qna)?;
            let name = file
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("document")
                .to_string();
            let mut reader = tokio::fs::File::open(&file)
                .await
                .with_context(|| format!("Failed to open {}", file.display()))?;
            let job_id = service.submit(&mut reader, &name, options).await?;
            println!("{}", job_id);
        }
        Command::SubmitUrl {
            url,
            annotations,
            schema,
            qna,
        } => {
            let schema = read_schema(schema.as_deref())?;
            let options = SubmitOptions::parse(annotations, schema.as_deref(), qna)?;
            let job_id = service.submit_url(&url, options).await?;
            println!("{}", job_id);
        }
        Command::Status { job_id } => print_json(&service.status(&job_id).await?)?,
        Command::Result { job_id } => print_json(&service.result(&job_id).await?)?,
        Command::Jobs { limit } => print_json(&service.list_jobs(limit).await?)?,
        Command::Ask { job_id, question } => {
            println!("{}", service.ask(&job_id, &question).await?);
        }
        Command::Export {
            job_id,
            format,
            out,
        } => {
            let exported = service.export(&job_id, format).await?;
            let out = out.unwrap_or_else(|| PathBuf::from(&exported.filename));
            tokio::fs::write(&out, &exported.bytes)
                .await
                .with_context(|| format!("Failed to write {}", out.display()))?;
            eprintln!("Wrote {} ({})", out.display(), exported.content_type);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_effective_config(cli.config.as_deref()).context("Failed to load config")?;
    telemetry::init(&config.logging)?;

    // The remote client is blocking; build and drop it off the runtime.
    let service = tokio::task::spawn_blocking(move || JobService::start(config))
        .await?
        .context("Failed to start job service")?;

    let outcome = run(&service, cli.command).await;
    tokio::task::spawn_blocking(move || service.wait()).await?;
    outcome
}
