//! Command-line surface of the `bucketlocale` binary.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use bucketlocale::ads::forecast::{get_metric_forecast, metrics_to_csv};
use bucketlocale::commands::input::{parse_keywords, resolve_locales, validation_groups_from_csv};
use bucketlocale::commands::{self, IdeaTargeting, JobResults};
use bucketlocale::gemini::types::Job;
use bucketlocale::jobs::MonitorSnapshot;
use bucketlocale::requests::classify::{
    build_classification_batch, suggest_classifications, Category,
};
use bucketlocale::requests::localize::build_localization_batch;
use bucketlocale::requests::seeds::SeedKeywordForm;
use bucketlocale::requests::validate::build_validation_batch;
use bucketlocale::requests::BatchSubmission;
use bucketlocale::results::atomic_writer::write_atomic;
use bucketlocale::{AppConfig, AppState, MergeMode};

#[derive(Debug, Parser)]
#[command(
    name = "bucketlocale",
    version,
    about = "Localize, classify and validate keyword lists with Gemini batch jobs"
)]
pub struct Cli {
    /// Settings file (JSON, camelCase keys)
    #[arg(long, global = true, value_name = "PATH", env = "BUCKETLOCALE_CONFIG")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Submit a localization batch
    Localize(LocalizeArgs),
    /// Submit a classification batch, or suggest classifications
    Classify(ClassifyArgs),
    /// Submit a validation batch for a localized CSV
    Validate(ValidateArgs),
    /// Inspect and manage batch jobs
    Jobs(JobsArgs),
    /// Merge the results of a finished job
    Results(ResultsArgs),
    /// Merge a downloaded JSONL results file
    Merge(MergeArgs),
    /// Fetch historical search metrics from Google Ads
    Forecast(ForecastArgs),
    /// Generate seed keywords with Gemini and expand them with Google Ads ideas
    Ideas(IdeasArgs),
}

#[derive(Debug, Args)]
struct LocalizeArgs {
    /// Keyword file, one keyword per line
    #[arg(long, short)]
    keywords: PathBuf,
    /// Target locale as language_COUNTRY (repeatable)
    #[arg(long = "locale", short, required = true)]
    locales: Vec<String>,
    /// Print the requests instead of submitting
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Args)]
struct ClassifyArgs {
    #[arg(long, short)]
    keywords: PathBuf,
    /// JSON array of {name, classifications: [{name, description}]}
    #[arg(long, required_unless_present = "suggest")]
    categories: Option<PathBuf>,
    /// Ask the model for candidate classifications instead of submitting
    #[arg(long, conflicts_with = "dry_run")]
    suggest: bool,
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Args)]
struct ValidateArgs {
    /// CSV with Original_Term and Localized_Term_{country} columns
    #[arg(long, short)]
    input: PathBuf,
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Args)]
struct JobsArgs {
    #[command(subcommand)]
    command: JobsCommand,
}

#[derive(Debug, Subcommand)]
enum JobsCommand {
    /// List jobs created within the filter window
    List {
        /// Show every job regardless of age
        #[arg(long)]
        all: bool,
    },
    /// Poll until every job has finished
    Watch,
    /// Cancel a running job (it is deleted afterwards)
    Cancel { name: String },
    Delete { name: String },
}

#[derive(Debug, Args)]
struct ResultsArgs {
    /// Job name (`batches/...` or the bare id)
    name: String,
    /// Merge mode; inferred from the job's display name when omitted
    #[arg(long, value_parser = parse_mode)]
    mode: Option<MergeMode>,
    /// Write the CSV here instead of stdout
    #[arg(long, short)]
    out: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct MergeArgs {
    file: PathBuf,
    #[arg(long, value_parser = parse_mode)]
    mode: MergeMode,
    #[arg(long, short)]
    out: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ForecastArgs {
    #[arg(long, short)]
    keywords: PathBuf,
    #[arg(long, short)]
    out: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct IdeasArgs {
    #[arg(long)]
    company: String,
    #[arg(long)]
    vertical: String,
    /// Comma separated seed keywords
    #[arg(long, default_value = "")]
    seeds: String,
    /// Product landing page, also used as the URL seed
    #[arg(long, default_value = "")]
    landing_page: String,
    /// Target user intent (repeatable)
    #[arg(long = "intent")]
    intents: Vec<String>,
    #[arg(long)]
    company_description: Option<String>,
    #[arg(long)]
    vertical_description: Option<String>,
    /// Competitor landing page (repeatable)
    #[arg(long = "competitor")]
    competitors: Vec<String>,
    /// Comma separated keywords to avoid
    #[arg(long)]
    negative: Option<String>,
    /// Language constant, e.g. languageConstants/1003
    #[arg(long)]
    language: Option<String>,
    /// Geo target constant (repeatable)
    #[arg(long = "geo")]
    geo_targets: Vec<String>,
    #[arg(long, short)]
    out: Option<PathBuf>,
}

fn parse_mode(value: &str) -> Result<MergeMode, String> {
    value.parse().map_err(|e: bucketlocale::AppError| e.to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// Dispatch
// ─────────────────────────────────────────────────────────────────────────────

pub async fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::load(cli.config.as_deref()).context("loading settings")?;
    let state = AppState::new(config).context("initializing")?;

    match cli.command {
        CliCommand::Localize(args) => localize(&state, args).await,
        CliCommand::Classify(args) => classify(&state, args).await,
        CliCommand::Validate(args) => validate(&state, args).await,
        CliCommand::Jobs(args) => jobs(&state, args.command).await,
        CliCommand::Results(args) => results(&state, args).await,
        CliCommand::Merge(args) => {
            let table = commands::merge_results_file(&args.file, args.mode)?;
            emit(&table.to_csv()?, args.out.as_deref())
        }
        CliCommand::Forecast(args) => forecast(&state, args).await,
        CliCommand::Ideas(args) => ideas(&state, args).await,
    }
}

async fn localize(state: &AppState, args: LocalizeArgs) -> Result<()> {
    let keywords = read_keywords(&args.keywords)?;
    let locales = resolve_locales(&state.locales, &args.locales)?;
    let submission = build_localization_batch(&keywords, &locales, &state.prompts.localization)?;
    submit_or_print(state, submission, args.dry_run).await
}

async fn classify(state: &AppState, args: ClassifyArgs) -> Result<()> {
    let keywords = read_keywords(&args.keywords)?;

    if args.suggest {
        let suggestions =
            suggest_classifications(&state.client, &keywords, &state.prompts.class_generation)
                .await?;
        println!("{}", serde_json::to_string_pretty(&suggestions)?);
        return Ok(());
    }

    let Some(path) = args.categories else {
        bail!("--categories is required unless --suggest is given");
    };
    let text = read_text(&path)?;
    let categories: Vec<Category> =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    let submission =
        build_classification_batch(&keywords, &categories, &state.prompts.classification)?;
    submit_or_print(state, submission, args.dry_run).await
}

async fn validate(state: &AppState, args: ValidateArgs) -> Result<()> {
    let groups = validation_groups_from_csv(&read_text(&args.input)?)?;
    let submission = build_validation_batch(&groups, &state.locales, &state.prompts.validation)?;
    submit_or_print(state, submission, args.dry_run).await
}

async fn submit_or_print(state: &AppState, submission: BatchSubmission, dry_run: bool) -> Result<()> {
    if dry_run {
        println!("{}", serde_json::to_string_pretty(&submission)?);
        return Ok(());
    }
    let job = commands::submit_batch(state.client.as_ref(), &submission).await?;
    println!("{}", job.name);
    Ok(())
}

async fn jobs(state: &AppState, command: JobsCommand) -> Result<()> {
    let monitor = &state.monitor;
    match command {
        JobsCommand::List { all } => {
            if all {
                monitor.set_filter_days(None).await;
            }
            monitor.fetch_jobs().await?;
            monitor.stop_polling().await;
            print_jobs(&monitor.snapshot().await);
        }
        JobsCommand::Watch => {
            monitor.fetch_jobs().await?;
            print_jobs(&monitor.snapshot().await);
            let interval = state.config.read().await.poll_interval();
            while monitor.is_polling().await {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        monitor.stop_polling().await;
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        print_jobs(&monitor.snapshot().await);
                    }
                }
            }
            print_jobs(&monitor.snapshot().await);
        }
        JobsCommand::Cancel { name } => {
            monitor.cancel_job(&batch_name(&name)).await?;
            println!("cancelled {}", batch_name(&name));
        }
        JobsCommand::Delete { name } => {
            monitor.delete_job(&batch_name(&name)).await?;
            println!("deleted {}", batch_name(&name));
        }
    }
    Ok(())
}

async fn results(state: &AppState, args: ResultsArgs) -> Result<()> {
    let name = batch_name(&args.name);
    let api = state.client.as_ref();

    let Some(path) = args.out else {
        let results = commands::fetch_job_results(api, &name, args.mode).await?;
        println!("{}", results.csv);
        return Ok(());
    };

    let (results, written): (JobResults, PathBuf) =
        commands::export_job_results(api, &name, args.mode, &path).await?;
    eprintln!(
        "{} rows ({} fragments, {}) written to {}",
        results.table.rows.len(),
        results.fragment_count,
        results.mode,
        written.display()
    );
    Ok(())
}

async fn forecast(state: &AppState, args: ForecastArgs) -> Result<()> {
    let keywords = read_keywords(&args.keywords)?;
    let client = Arc::new(state.ads_client().await?);
    let options = state.config.read().await.forecast_options();
    let metrics = get_metric_forecast(client, &keywords, &options).await?;
    emit(&metrics_to_csv(&metrics)?, args.out.as_deref())
}

async fn ideas(state: &AppState, args: IdeasArgs) -> Result<()> {
    let form = SeedKeywordForm {
        company_name: args.company,
        vertical_name: args.vertical,
        seed_keywords: args.seeds,
        product_landing_page: args.landing_page,
        user_intents: args.intents,
        company_description: args.company_description,
        vertical_description: args.vertical_description,
        competitor_landing_pages: (!args.competitors.is_empty()).then(|| args.competitors.join("\n")),
        negative_keywords: args.negative,
    };
    let targeting = IdeaTargeting {
        language: args.language,
        geo_targets: args.geo_targets,
    };

    let ads = state.ads_client().await?;
    let generated = commands::generate_keywords(
        &state.client,
        &ads,
        &form,
        &targeting,
        &state.prompts.keyword_generation,
    )
    .await?;
    eprintln!("seeds: {}", generated.seeds.join(", "));
    emit(&metrics_to_csv(&generated.ideas)?, args.out.as_deref())
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn read_keywords(path: &Path) -> Result<Vec<String>> {
    let keywords = parse_keywords(&read_text(path)?);
    if keywords.is_empty() {
        bail!("{} contains no keywords", path.display());
    }
    Ok(keywords)
}

fn emit(csv: &str, out: Option<&Path>) -> Result<()> {
    match out {
        Some(path) => {
            write_atomic(path, csv.as_bytes())?;
            eprintln!("written to {}", path.display());
        }
        None => println!("{}", csv),
    }
    Ok(())
}

fn batch_name(name: &str) -> String {
    if name.starts_with("batches/") {
        name.to_string()
    } else {
        format!("batches/{}", name)
    }
}

fn print_jobs(snapshot: &MonitorSnapshot) {
    if let Some(error) = &snapshot.error {
        eprintln!("error: {}", error);
    }
    for job in &snapshot.jobs {
        println!("{}", job_line(job));
    }
    if snapshot.polling {
        eprintln!("-- {} jobs shown, polling", snapshot.jobs.len());
    }
}

fn job_line(job: &Job) -> String {
    let created = job
        .created_at()
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string());
    let progress = job
        .metadata
        .as_ref()
        .and_then(|m| m.batch_stats.as_ref())
        .map(|s| {
            format!(
                "{}/{}",
                s.successful_request_count.as_deref().unwrap_or("0"),
                s.request_count.as_deref().unwrap_or("?")
            )
        })
        .unwrap_or_default();
    format!(
        "{}\t{}\t{}\t{}\t{}",
        job.name,
        job.display_name().unwrap_or("-"),
        job.state().unwrap_or(if job.done { "DONE" } else { "PENDING" }),
        created,
        progress
    )
}
