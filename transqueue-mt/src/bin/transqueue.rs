use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing::info;
use transqueue::provider::{Provider, ProviderRegistry};
use transqueue::source::load_messages;
use transqueue::store::JsonFileStore;
use transqueue::{
    CommitOutcome, DiffOutcome, EngineConfig, ProjectProgress, ProjectReport, ProviderKind,
    Reconciler, Step, SubmitOutcome,
};
use transqueue_mt::{DEFAULT_NOTE, GoogleTranslateProvider, OhtConfig, OneHourTranslationProvider};

#[derive(Parser)]
#[command(name = "transqueue", version, about = "Translation queue for a multilingual corpus")]
struct Cli {
    /// Directory holding the corpus, queue and project collections
    #[arg(long, env = "TRANSQUEUE_STORE", default_value = "./transqueue-data")]
    store: PathBuf,

    /// Language the corpus is authored in
    #[arg(long, env = "TRANSQUEUE_SOURCE_LANGUAGE", default_value = "en")]
    source_language: String,

    #[arg(long, env = "GOOGLE_TRANSLATE_API_KEY", hide_env_values = true)]
    google_api_key: Option<String>,

    #[command(flatten)]
    oht: OhtArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct OhtArgs {
    #[arg(long = "oht-pubkey", env = "OHT_PUBLIC_KEY")]
    public_key: Option<String>,

    #[arg(long = "oht-secret", env = "OHT_SECRET_KEY", hide_env_values = true)]
    secret_key: Option<String>,

    /// Use the OneHourTranslation sandbox
    #[arg(long = "oht-sandbox", env = "OHT_SANDBOX")]
    sandbox: bool,

    /// Instructions for the translators
    #[arg(long = "oht-note", default_value = DEFAULT_NOTE)]
    note: String,

    #[arg(long = "oht-expertise")]
    expertise: Option<String>,

    /// Tag every created project
    #[arg(long = "oht-tag")]
    tag: Option<String>,

    #[arg(long = "oht-callback")]
    callback_url: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Queue missing translations into pending projects
    Diff {
        #[arg(long, short)]
        provider: ProviderKind,
        /// Maximum items per project (values of 0 or 1 use the default)
        #[arg(long, short)]
        limit: Option<usize>,
        #[arg(required = true)]
        targets: Vec<String>,
    },
    /// Submit pending projects
    Add { project_ids: Vec<String> },
    /// Show pending and in-progress projects
    Status { project_ids: Vec<String> },
    /// Collect finished translations
    Commit { project_ids: Vec<String> },
    /// Write ready translations into the corpus
    Push,
    /// Import a message file into a namespace and queue its translations
    Sync {
        #[arg(long, short)]
        namespace: String,
        /// JSON object of message key to text
        #[arg(long, short)]
        file: PathBuf,
        #[arg(long, short)]
        provider: ProviderKind,
        #[arg(long, short)]
        limit: Option<usize>,
        #[arg(required = true)]
        targets: Vec<String>,
    },
}

fn build_registry(cli: &Cli) -> Result<ProviderRegistry, Box<dyn std::error::Error>> {
    let mut registry = ProviderRegistry::new();

    if let Some(key) = &cli.google_api_key {
        let provider = GoogleTranslateProvider::new(key.clone())?;
        registry.register(ProviderKind::Gct, Provider::Sync(Arc::new(provider)));
    }

    if let (Some(public_key), Some(secret_key)) = (&cli.oht.public_key, &cli.oht.secret_key) {
        let config = OhtConfig::new(public_key, secret_key)
            .with_sandbox(cli.oht.sandbox)
            .with_note(&cli.oht.note)
            .with_expertise(cli.oht.expertise.clone())
            .with_tag(cli.oht.tag.clone())
            .with_callback_url(cli.oht.callback_url.clone());
        let provider = OneHourTranslationProvider::new(config)?;
        registry.register(ProviderKind::Oht, Provider::Async(Arc::new(provider)));
    }

    Ok(registry)
}

fn print_diff(outcome: &DiffOutcome) {
    println!(
        "[{}] scanned {}, already translated {}, already queued {}, queued now {}",
        outcome.target_language,
        outcome.report.scanned,
        outcome.report.translated,
        outcome.report.queued,
        outcome.report.missing
    );
    for project in &outcome.batches.projects {
        println!("  Project [{}] created with {} items", project.project_id, project.items);
    }
}

fn print_reports<T>(reports: &[ProjectReport<T>], describe: impl Fn(&T) -> String) {
    if reports.is_empty() {
        println!("No projects to process");
    }
    for report in reports {
        match &report.step {
            Step::Done(outcome) => println!("Project: [{}] {}", report.project_id, describe(outcome)),
            Step::Skipped(reason) => println!("Project: [{}] skipped: {}", report.project_id, reason),
        }
    }
}

fn describe_submit(outcome: &SubmitOutcome) -> String {
    match outcome {
        SubmitOutcome::Translated {
            ready,
            remaining,
            failed_chunks,
            retired,
            completed,
        } => format!(
            "translated {} items, {} remaining ({} failed chunks, {} retired){}",
            ready,
            remaining,
            failed_chunks,
            retired,
            if *completed { ", completed" } else { "" }
        ),
        SubmitOutcome::Submitted {
            external_id,
            cost,
            items,
            retired,
        } => format!(
            "submitted {} items as [{}] ({} retired), cost: [{}]",
            items,
            external_id,
            retired,
            cost.map(|c| c.to_string()).unwrap_or_else(|| "unknown".to_string())
        ),
        SubmitOutcome::Empty => "had no pending items and was completed".to_string(),
    }
}

fn describe_progress(progress: &ProjectProgress) -> String {
    match progress {
        ProjectProgress::Local(status) => format!("is [{}]", status),
        ProjectProgress::Remote {
            code,
            label,
            progress,
        } => format!(
            "provider status: [{}] {} ({})",
            code,
            label.as_deref().unwrap_or(""),
            progress
        ),
    }
}

fn describe_commit(outcome: &CommitOutcome) -> String {
    match outcome {
        CommitOutcome::AlreadyCompleted => "is already completed".to_string(),
        CommitOutcome::NotReady { code, progress } => {
            format!("is not ready to commit: [{}] ({})", code, progress)
        }
        CommitOutcome::Committed(report) => {
            let mut line = format!("committed {} items", report.staged);
            if !report.foreign_ids.is_empty() {
                line.push_str(&format!(", ignored unknown ids {:?}", report.foreign_ids));
            }
            if !report.missing_ids.is_empty() {
                line.push_str(&format!(", still missing {:?}", report.missing_ids));
            }
            if report.retired > 0 {
                line.push_str(&format!(", retired {} without source", report.retired));
            }
            if report.completed {
                line.push_str(", completed");
            }
            line
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let registry = build_registry(&cli)?;
    let store = JsonFileStore::open(&cli.store).await?;
    info!("Using store at {}", cli.store.display());

    let config = EngineConfig::default().with_source_language(&cli.source_language);
    let engine = Reconciler::new(Arc::new(store), registry, config);

    match cli.command {
        Command::Diff {
            provider,
            limit,
            targets,
        } => {
            for outcome in engine.diff_all(&targets, provider, limit).await? {
                print_diff(&outcome);
            }
        }
        Command::Add { project_ids } => {
            print_reports(&engine.add(&project_ids).await?, describe_submit);
        }
        Command::Status { project_ids } => {
            print_reports(&engine.status(&project_ids).await?, describe_progress);
        }
        Command::Commit { project_ids } => {
            print_reports(&engine.commit(&project_ids).await?, describe_commit);
        }
        Command::Push => {
            let report = engine.push().await?;
            println!(
                "Pushed {} items: {} entries created, {} refreshed, {} requeued",
                report.pushed, report.created, report.refreshed, report.requeued
            );
        }
        Command::Sync {
            namespace,
            file,
            provider,
            limit,
            targets,
        } => {
            let messages = load_messages(&file)?;
            let report = engine
                .sync(&namespace, &messages, &targets, provider, limit)
                .await?;
            println!(
                "Namespace [{}]: {} new source entries, {} unchanged",
                namespace, report.import.created, report.import.unchanged
            );
            for outcome in &report.diffs {
                print_diff(outcome);
            }
        }
    }

    Ok(())
}
