use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use url::Url;

use verbena_capability::http::{HttpLanguageAnalyzer, HttpTranslator};
use verbena_capability::memory::{
  LogClaimQueue, LogMailer, LogNotifier, ScriptedLanguageAnalyzer, ScriptedTranslator,
};
use verbena_capability::{LanguageAnalyzer, Translator};
use verbena_catalog::{Catalog, ClaimResumeMessage, Services};
use verbena_event::{EventEnvelope, event_channel, run_dispatcher};
use verbena_runtime::{ResumeOutcome, RunnerConfig};
use verbena_store::{SqliteStore, Store};

/// Verbena - event-driven review workflow orchestration
#[derive(Parser)]
#[command(name = "verbena")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.verbena)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  /// Base URL of the language analysis service; scripted defaults are used
  /// when omitted
  #[arg(long, global = true)]
  language_service_url: Option<Url>,

  /// Base URL of the translation service; scripted defaults are used when
  /// omitted
  #[arg(long, global = true)]
  translation_service_url: Option<Url>,

  /// How long to let event-triggered workflows drain before exiting, in
  /// milliseconds
  #[arg(long, global = true, default_value_t = 2000)]
  settle_ms: u64,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Submit a review (intake body JSON on stdin) and print the response
  Submit,

  /// Publish an event envelope (JSON on stdin) onto the bus
  Publish,

  /// Record a human claim for a case awaiting one
  Claim {
    /// Correlation token from the claim queue message
    #[arg(long)]
    token: String,

    /// Who claimed the case
    #[arg(long)]
    claimed_by: String,
  },

  /// Print a review's audit trail
  Audit {
    #[arg(long)]
    review_id: String,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(io::stderr)
    .init();

  let mut cli = Cli::parse();

  let data_dir = cli.data_dir.clone().unwrap_or_else(|| {
    dirs::home_dir()
      .expect("could not determine home directory")
      .join(".verbena")
  });

  match cli.command.take() {
    Some(command) => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(async { run_command(command, data_dir, &cli).await })
    }
    None => {
      println!("verbena - use --help to see available commands");
      Ok(())
    }
  }
}

struct App {
  catalog: Catalog,
  store: Arc<SqliteStore>,
  bus: verbena_event::EventBus,
  cancel: CancellationToken,
  dispatcher: tokio::task::JoinHandle<()>,
}

impl App {
  /// Let in-flight event-triggered workflows drain, then stop dispatching.
  async fn settle(self, settle_ms: u64) {
    tokio::time::sleep(Duration::from_millis(settle_ms)).await;
    self.cancel.cancel();
    let _ = self.dispatcher.await;
  }
}

async fn build_app(data_dir: PathBuf, cli: &Cli) -> Result<App> {
  tokio::fs::create_dir_all(&data_dir)
    .await
    .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

  let store = SqliteStore::open(&data_dir.join("verbena.db"))
    .await
    .context("failed to open store")?;
  store.migrate().await.context("failed to run migrations")?;
  let store = Arc::new(store);

  let client = reqwest::Client::builder()
    .timeout(Duration::from_secs(10))
    .build()
    .context("failed to build http client")?;

  let analyzer: Arc<dyn LanguageAnalyzer> = match &cli.language_service_url {
    Some(url) => Arc::new(HttpLanguageAnalyzer::new(client.clone(), url.clone())),
    None => {
      warn!("no language service configured; using scripted defaults");
      Arc::new(ScriptedLanguageAnalyzer::new())
    }
  };
  let translator: Arc<dyn Translator> = match &cli.translation_service_url {
    Some(url) => Arc::new(HttpTranslator::new(client, url.clone())),
    None => Arc::new(ScriptedTranslator::new()),
  };

  let (bus, receiver) = event_channel();
  let services = Services {
    store: store.clone() as Arc<dyn Store>,
    analyzer,
    translator,
    mailer: Arc::new(LogMailer),
    notifier: Arc::new(LogNotifier),
    claim_queue: Arc::new(LogClaimQueue),
    bus: bus.clone(),
  };

  let catalog = Catalog::new(&services, RunnerConfig::default()).context("failed to wire catalog")?;
  let cancel = CancellationToken::new();
  let dispatcher = tokio::spawn(run_dispatcher(catalog.router(), receiver, cancel.clone()));

  Ok(App {
    catalog,
    store,
    bus,
    cancel,
    dispatcher,
  })
}

async fn run_command(command: Commands, data_dir: PathBuf, cli: &Cli) -> Result<()> {
  let app = build_app(data_dir, cli).await?;

  match command {
    Commands::Submit => {
      let body = read_payload_from_stdin()?;
      let result = app.catalog.intake().submit(body, CancellationToken::new()).await;
      match result {
        Ok(response) => {
          println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Err(e) => {
          app.settle(0).await;
          bail!("intake rejected ({}): {}", e.status_code(), e);
        }
      }
      app.settle(cli.settle_ms).await;
    }

    Commands::Publish => {
      let payload = read_payload_from_stdin()?;
      let envelope = parse_envelope(payload)?;
      eprintln!("Publishing {} from {}", envelope.detail_type, envelope.source);
      app.bus.publish(envelope);
      app.settle(cli.settle_ms).await;
    }

    Commands::Claim { token, claimed_by } => {
      let outcome = app
        .catalog
        .resume_claim(
          ClaimResumeMessage { token, claimed_by },
          CancellationToken::new(),
        )
        .await
        .context("claim failed")?;
      match outcome {
        ResumeOutcome::Completed(_) => eprintln!("Claim recorded"),
        ResumeOutcome::Duplicate => eprintln!("Token already consumed; nothing to do"),
      }
      app.settle(cli.settle_ms).await;
    }

    Commands::Audit { review_id } => {
      let trail = app.store.list_audit(&review_id).await.context("audit scan failed")?;
      eprintln!("{} events for review {}", trail.len(), review_id);
      println!("{}", serde_json::to_string_pretty(&trail)?);
      app.settle(0).await;
    }
  }

  Ok(())
}

/// Accept a full wire envelope, defaulting `time` to now when omitted.
fn parse_envelope(payload: serde_json::Value) -> Result<EventEnvelope> {
  if payload.get("time").is_some() {
    return serde_json::from_value(payload).context("invalid event envelope");
  }

  let source = payload["source"]
    .as_str()
    .context("envelope is missing 'source'")?
    .to_string();
  let detail_type = payload["detail-type"]
    .as_str()
    .context("envelope is missing 'detail-type'")?
    .to_string();
  let detail = payload
    .get("detail")
    .cloned()
    .context("envelope is missing 'detail'")?;
  Ok(EventEnvelope::new(source, detail_type, detail))
}

fn read_payload_from_stdin() -> Result<serde_json::Value> {
  use std::io::IsTerminal;

  if io::stdin().is_terminal() {
    // No stdin pipe, use empty object
    Ok(serde_json::json!({}))
  } else {
    let mut input = String::new();
    io::stdin()
      .read_to_string(&mut input)
      .context("failed to read payload from stdin")?;

    if input.trim().is_empty() {
      Ok(serde_json::json!({}))
    } else {
      serde_json::from_str(&input).context("failed to parse payload JSON from stdin")
    }
  }
}
