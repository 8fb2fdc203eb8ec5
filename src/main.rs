use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hypha::agent::ChatCompletionsClient;
use hypha::config::AppConfig;
use hypha::platform::github::GitHubPlatform;
use hypha::report::{GithubOutputFile, OutputSink, RunOutputs, StdoutSink};
use hypha::workspace::GitWorkspace;

#[derive(Parser)]
#[command(name = "hypha", about = "Turn a GitHub issue into an applied patch")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Repository checkout to patch
    #[arg(long, default_value = ".")]
    repo_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout may carry the run outputs.
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?;

    tracing::info!(
        issue = config.issue_number,
        repository = %config.github.repository,
        model = %config.llm.model,
        "Starting hypha"
    );

    let platform = GitHubPlatform::new(&config.github)?;
    let provider = ChatCompletionsClient::new(&config.llm)?;
    let workspace = GitWorkspace::new(cli.repo_dir);

    let mut sink: Box<dyn OutputSink> = match &config.output_file {
        Some(path) => Box::new(GithubOutputFile::new(path)),
        None => Box::new(StdoutSink::new()),
    };

    let outputs = hypha::workflow::run(
        &config,
        &platform,
        &provider,
        &workspace,
        sink.as_mut(),
    )
    .await
    .inspect_err(|e| tracing::error!(error = %e, "Run failed"))?;

    match &outputs {
        RunOutputs::Changed { branch_name, .. } => {
            tracing::info!(branch = %branch_name, "Change ready for pull request");
        }
        RunOutputs::Unchanged { reason } => {
            tracing::info!(reason = %reason, "No change produced");
        }
    }

    Ok(())
}
