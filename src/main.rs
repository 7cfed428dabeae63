use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use inbox_triage::config::TriageConfig;
use inbox_triage::error::Error;
use inbox_triage::gate::{InteractionGate, StdinInput, listen_for_ctrl_c};
use inbox_triage::llm::classifier::{LlmClassifier, SYSTEM_PROMPT};
use inbox_triage::llm::create_provider;
use inbox_triage::mail::{BlockingSession, ImapSession};
use inbox_triage::pipeline::{Folders, RunSummary, TriageRun};
use inbox_triage::scorer::RspamdScorer;
use inbox_triage::store::LibSqlLedger;

#[derive(Parser, Debug)]
#[clap(
    name = "inbox-triage",
    version = env!("CARGO_PKG_VERSION"),
    about = "Inbox cleaner using rspamd scores, LLM labels and your own past decisions"
)]
struct Cli {
    /// Apply recommended actions without prompting (overrides INTERACTIVE=true).
    #[clap(long)]
    auto: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    // Install rustls crypto provider before any TLS usage
    let _ = rustls::crypto::ring::default_provider().install_default();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) if matches!(e.downcast_ref::<Error>(), Some(Error::Interrupted)) => {
            println!("\nInterrupted by user");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<RunSummary> {
    let config = TriageConfig::from_env().map_err(Error::from)?;
    let interactive = config.interactive && !cli.auto;

    let ledger = LibSqlLedger::new_local(&config.db_path)
        .await
        .map_err(Error::from)
        .with_context(|| format!("opening ledger at {}", config.db_path.display()))?;
    let scorer = RspamdScorer::new(config.scorer_url.clone());
    let llm = create_provider(&config.llm, SYSTEM_PROMPT).map_err(Error::from)?;
    let classifier = LlmClassifier::new(llm);

    let gate = if interactive {
        InteractionGate::confirm(StdinInput::stdin(listen_for_ctrl_c()))
    } else {
        InteractionGate::unattended()
    };
    let folders = Folders {
        promotional: config.mail.promotional_folder.clone(),
        trash: config.mail.trash_folder.clone(),
    };
    let mut triage = TriageRun::new(
        Arc::new(ledger),
        Arc::new(scorer),
        Arc::new(classifier),
        gate,
        config.thresholds,
        folders,
    )
    .with_min_samples(config.history_min_samples);

    tracing::info!(
        host = %config.mail.host,
        mailbox = %config.mail.mailbox,
        mode = %triage.mode(),
        model = %config.llm.model,
        "Connecting"
    );
    let mail_config = config.mail.clone();
    let session = tokio::task::spawn_blocking(move || ImapSession::open(&mail_config))
        .await
        .context("IMAP connect task panicked")?
        .map_err(Error::from)?;
    let mut mail = BlockingSession::new(session);
    let outcome = triage.run(&mut mail).await;
    mail.logout().await;

    Ok(outcome?)
}
