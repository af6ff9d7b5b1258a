//! kbatch CLI - render or submit a sandboxed batch job

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use kbatch_common::telemetry::{init_telemetry, TelemetryConfig};
use kbatch_job::User;

use kbatch::cluster::KubeClusterApi;
use kbatch::config::ProxyConfig;
use kbatch::submit::{load_job_value, prepare_job, submit_job};
use kbatch::{Error, Result};

/// kbatch - run user batch jobs in per-user namespaces
#[derive(Parser, Debug)]
#[command(name = "kbatch", version, about, long_about = None)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, env = "KBATCH_LOG_JSON")]
    log_json: bool,

    #[command(flatten)]
    config: ProxyConfig,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the patched Job manifest without submitting it
    Render(JobArgs),

    /// Submit the job to the cluster from the current kubeconfig
    Submit(JobArgs),
}

#[derive(Args, Debug)]
struct JobArgs {
    /// Job description (or manifest, with --manifest) in YAML or JSON
    #[arg(short = 'f', long = "file")]
    file: PathBuf,

    /// Treat the file as a full batch/v1 Job instead of a description
    #[arg(long)]
    manifest: bool,

    /// Identity the job runs as
    #[arg(long, env = "KBATCH_USER")]
    user: String,

    /// Groups of the submitting user
    #[arg(long = "group")]
    groups: Vec<String>,

    /// Zip archive unpacked into /code before the job starts
    #[arg(long)]
    code: Option<PathBuf>,
}

impl JobArgs {
    fn user(&self) -> User {
        User {
            name: self.user.clone(),
            groups: self.groups.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_telemetry(TelemetryConfig {
        json: cli.log_json,
        ..Default::default()
    }) {
        eprintln!("failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "kbatch failed");
            ExitCode::FAILURE
        }
    }
}

async fn execute(cli: Cli) -> Result<()> {
    let settings = cli.config.resolve()?;

    match cli.command {
        Commands::Render(args) => {
            let value = load_job_value(&args.file, args.manifest)?;
            let job = prepare_job(&settings, &args.user(), value, args.code.is_some())?;
            print!("{}", kbatch_common::yaml::to_yaml(&job)?);
        }
        Commands::Submit(args) => {
            let code = match &args.code {
                Some(path) => Some(std::fs::read(path).map_err(|e| Error::io(path, e))?),
                None => None,
            };
            let value = load_job_value(&args.file, args.manifest)?;
            let job = prepare_job(&settings, &args.user(), value, code.is_some())?;

            let api = KubeClusterApi::try_default().await?;
            let submitted = submit_job(&api, job, code.as_deref()).await?;

            let namespace = submitted.job.metadata.namespace.unwrap_or_default();
            let name = submitted.job.metadata.name.unwrap_or_default();
            println!("job.batch/{name} created in namespace {namespace}");
        }
    }
    Ok(())
}
