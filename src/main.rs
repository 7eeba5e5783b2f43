use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ethics_navi::{
    config::{Config, LogFormat},
    console::{self, Console},
    error::StorageError,
    interview::{InterviewMachine, Session},
    langbase::LangbaseClient,
    report,
    storage::{SessionStore, SqliteSessionStore},
};

#[derive(Parser, Debug)]
#[command(name = "ethics-navi", version, about = "Guided four-box clinical ethics interview")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone)]
enum Commands {
    /// Run an interactive interview (default)
    Interview {
        /// Start a new session instead of resuming the latest one
        #[arg(long)]
        new: bool,
    },

    /// Re-render the report of a stored session
    Report {
        /// Session ID
        #[arg(long)]
        session: String,

        /// Output directory (defaults to REPORT_OUTPUT_DIR)
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    info!(version = env!("CARGO_PKG_VERSION"), "EthicsNavi starting...");

    let store = match SqliteSessionStore::new(&config.database).await {
        Ok(s) => {
            info!(path = %config.database.path.display(), "Database initialized");
            s
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize database");
            return Err(e.into());
        }
    };

    match cli.command.unwrap_or(Commands::Interview { new: false }) {
        Commands::Interview { new } => run_interview(config, store, new).await,
        Commands::Report { session, output } => {
            let output_dir = output.unwrap_or_else(|| config.report.output_dir.clone());
            render_stored_report(&config, &store, &session, &output_dir).await
        }
    }
}

async fn run_interview(config: Config, store: SqliteSessionStore, new: bool) -> anyhow::Result<()> {
    let langbase = match LangbaseClient::new(&config.langbase, config.request.clone()) {
        Ok(c) => {
            info!(base_url = %config.langbase.base_url, "Langbase client initialized");
            c
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize Langbase client");
            return Err(e.into());
        }
    };

    info!("Ensuring interview pipes exist...");
    if let Err(e) = langbase.ensure_interview_pipes(&config.pipes).await {
        error!(error = %e, "Failed to ensure interview pipes exist");
        return Err(e.into());
    }

    let mut session = if new {
        Session::new()
    } else {
        store.latest().await?.unwrap_or_default()
    };
    info!(session_id = %session.id, phase = %session.phase(), "Session ready");

    let machine = InterviewMachine::new(Arc::new(langbase), &config.pipes, config.report.clone());
    let console = Console::new(machine, Arc::new(store), config.report.output_dir.clone());

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    if let Err(e) = console.run(&mut session, stdin, &mut stdout).await {
        error!(error = %e, "Console error");
        return Err(e.into());
    }

    info!("Shutdown complete");
    Ok(())
}

async fn render_stored_report(
    config: &Config,
    store: &SqliteSessionStore,
    session_id: &str,
    output_dir: &std::path::Path,
) -> anyhow::Result<()> {
    let session = store
        .load(session_id)
        .await?
        .ok_or_else(|| StorageError::SessionNotFound {
            session_id: session_id.to_string(),
        })?;
    let Some(synthesis) = session.synthesis() else {
        anyhow::bail!("Session {} has no synthesis yet; finish the interview first", session_id);
    };

    let created = session.updated_at.with_timezone(&Local).date_naive();
    let bytes = report::generate_report(session.case_overview(), synthesis, created, &config.report)?;
    let path = console::write_report(output_dir, &session, &bytes)?;

    info!(session_id = %session.id, path = %path.display(), "Report written");
    println!("{}", path.display());
    Ok(())
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
