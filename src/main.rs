//! trendscope - search interest from the terminal
//!
//! A CLI over a trends provider: fetches interest timelines, regional
//! breakdowns, related queries and trending stories, normalizes them and
//! renders Markdown or JSON reports.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Any error (invalid input, network, provider, malformed response, config)

mod analysis;
mod cli;
mod client;
mod config;
mod error;
mod models;
mod normalize;
mod report;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use cli::{Args, Command, OutputFormat};
use client::{HttpTransport, RefreshHandle, RequestExecutor, RequestState, Transport};
use config::{Config, CONFIG_FILE_NAME};
use indicatif::{ProgressBar, ProgressStyle};
use models::{Report, ReportMetadata, RequestDescriptor, View};
use normalize::Normalized;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Config comes first so its verbosity can set the log level
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };

    init_logging(&args, config.general.verbose);

    info!("trendscope v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    debug!("Config: {:?}", config);

    match run(args, config).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Query failed: {}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .trendscope.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize the provider URL, refresh interval, and limits.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args, config_verbose: bool) {
    let level = args.log_level(config_verbose);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run one command end to end.
async fn run(args: Args, mut config: Config) -> Result<()> {
    config.merge_with_args(&args);

    let Some(ref command) = args.command else {
        bail!("No command given");
    };

    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(config.transport_config())?);
    let descriptors = command.descriptors(&config.display)?;
    let options = view_options(command, &config);

    if command.watches() {
        let descriptor = descriptors
            .into_iter()
            .next()
            .context("No request to watch")?;
        return watch(&args, &config, transport, descriptor, &options).await;
    }

    if !args.quiet {
        eprintln!("📡 {} ({})", command.title(), config.api.base_url);
    }

    let views = fetch_views(transport, &descriptors, &options, args.quiet).await?;
    let report = build_report(command, &config, &descriptors, views);
    emit(&report, &args)
}

/// Limits applied to the derived views of a command.
fn view_options(command: &Command, config: &Config) -> analysis::ViewOptions {
    let mut options = analysis::ViewOptions::default();
    match command {
        Command::Compare(_) => {
            options.region_limit = Some(config.display.top_regions_per_keyword);
        }
        Command::Regions { limit, .. } => {
            options.region_limit = Some(limit.unwrap_or(config.display.region_limit));
        }
        Command::Realtime { limit, .. } => options.story_limit = *limit,
        Command::Categories { filter } => options.category_filter = filter.clone(),
        _ => {}
    }
    options
}

/// Executor whose success data is the normalized response.
fn normalizing_executor(transport: Arc<dyn Transport>) -> RequestExecutor<Normalized> {
    RequestExecutor::new(transport, |descriptor, body| {
        normalize::normalize(descriptor, &body)
    })
}

/// Issue every request concurrently and derive one view per request.
async fn fetch_views(
    transport: Arc<dyn Transport>,
    descriptors: &[RequestDescriptor],
    options: &analysis::ViewOptions,
    quiet: bool,
) -> Result<Vec<View>> {
    let mut executors = Vec::with_capacity(descriptors.len());
    let mut pending = Vec::with_capacity(descriptors.len());
    for descriptor in descriptors {
        let executor = normalizing_executor(Arc::clone(&transport));
        pending.push(executor.execute(descriptor.clone())?);
        executors.push(executor);
    }

    let progress = spinner(quiet, "Fetching trends data...");
    futures::future::join_all(pending).await;
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    executors
        .iter()
        .map(|executor| view_from_state(executor.state(), options))
        .collect()
}

fn view_from_state(
    state: RequestState<Normalized>,
    options: &analysis::ViewOptions,
) -> Result<View> {
    match state {
        RequestState::Success(data) => Ok(analysis::derive_view(data, options)?),
        RequestState::Error(info) => bail!("{}", info),
        other => bail!("Request ended while {}", other.status()),
    }
}

/// Re-issue a trending query every refresh interval and render each
/// result until Ctrl-C.
async fn watch(
    args: &Args,
    config: &Config,
    transport: Arc<dyn Transport>,
    descriptor: RequestDescriptor,
    options: &analysis::ViewOptions,
) -> Result<()> {
    let Some(ref command) = args.command else {
        bail!("No command given");
    };

    descriptor.validate()?;
    let executor = normalizing_executor(transport);
    let mut watcher = executor.subscribe();
    let period = Duration::from_secs(config.refresh.interval_seconds);
    let refresh = RefreshHandle::start(executor, descriptor.clone(), period);

    if !args.quiet {
        eprintln!(
            "👀 Watching {} every {}s (Ctrl-C to stop)",
            descriptor.endpoint(),
            period.as_secs()
        );
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            state = watcher.changed() => {
                match state {
                    Some(RequestState::Success(data)) => {
                        let view = analysis::derive_view(data, options)?;
                        let descriptors = std::slice::from_ref(&descriptor);
                        let report = build_report(command, config, descriptors, vec![view]);
                        emit(&report, args)?;
                    }
                    Some(RequestState::Error(info)) => {
                        warn!("Refresh failed: {}", info);
                        eprintln!("⚠️  {}", info);
                    }
                    Some(_) => {}
                    None => break,
                }
            }
            _ = &mut ctrl_c => {
                info!("Interrupted");
                break;
            }
        }
    }

    refresh.stop().await;
    Ok(())
}

fn build_report(
    command: &Command,
    config: &Config,
    descriptors: &[RequestDescriptor],
    views: Vec<View>,
) -> Report {
    Report {
        metadata: ReportMetadata {
            title: command.title().to_string(),
            requests: descriptors.iter().map(ToString::to_string).collect(),
            base_url: config.api.base_url.clone(),
            generated_at: Utc::now(),
        },
        views,
    }
}

/// Render the report and write it to `--output` or stdout.
fn emit(report: &Report, args: &Args) -> Result<()> {
    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(report)?,
        OutputFormat::Markdown => report::generate_markdown_report(report),
    };

    match args.output {
        Some(ref path) => {
            std::fs::write(path, &output)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            if !args.quiet {
                eprintln!("✅ Report saved to: {}", path.display());
            }
        }
        None => println!("{}", output),
    }

    Ok(())
}

/// Spinner on stderr while requests are in flight.
fn spinner(quiet: bool, message: &str) -> Option<ProgressBar> {
    if quiet {
        return None;
    }

    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed_precise}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Some(pb)
}

/// Load configuration from file or use defaults.
///
/// Runs before logging is initialized, so problems go straight to stderr.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok(config),
        Ok(None) => Ok(Config::default()),
        Err(e) => {
            eprintln!("⚠️  Failed to load {}: {:#}. Using defaults.", CONFIG_FILE_NAME, e);
            Ok(Config::default())
        }
    }
}
