//! CLI command definitions, routing, and tracing setup.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::Local;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing::info;

use planaid_acquisition::{AcquisitionReport, RegistryDocument, clear_cache};
use planaid_core::BriefRequest;
use planaid_core::brief::{DEFAULT_SORTIE, DEFAULT_TRUE_AIRSPEED_KTS};
use planaid_core::pipeline::{self, GenerateSummary};
use planaid_shared::{
    AppConfig, ProgressPhase, ProgressSink, SourceName, WorkLayout, config_file_path,
    init_config, load_config, load_config_from, validate_config,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// PlanAid — airport planning map builder.
#[derive(Parser)]
#[command(
    name = "planaid",
    version,
    about = "Fetch airport, fuel and chart-supplement data and build the planning map.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.planaid/planaid.toml).
    #[arg(long, global = true, env = "PLANAID_CONFIG")]
    pub config: Option<PathBuf>,

    /// Working directory, overriding `paths.work_dir`.
    #[arg(long, global = true)]
    pub work_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Acquire every source, then generate the outputs.
    Run,

    /// Acquire every source without generating outputs.
    Fetch {
        /// Print the per-source report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate outputs from the data already in the working directory.
    Generate,

    /// Write a mission briefing sheet for a route.
    Brief {
        /// Departure identifier (e.g. KRND).
        departure: String,
        /// Destination identifier (e.g. KPNS).
        destination: String,
        /// Alternate identifier.
        #[arg(long = "alt")]
        alternate: Option<String>,
        #[arg(long)]
        pilot: Option<String>,
        #[arg(long)]
        instructor: Option<String>,
        /// Mission number.
        #[arg(long)]
        mission: Option<String>,
        #[arg(long, default_value = DEFAULT_SORTIE)]
        sortie: String,
        /// True airspeed in knots.
        #[arg(long, default_value_t = DEFAULT_TRUE_AIRSPEED_KTS)]
        tas: u32,
        /// Wind component in knots, positive for a tailwind.
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        wind: i32,
        /// Print the sheet to stdout as well.
        #[arg(long)]
        print: bool,
    },

    /// Inspect or clear the download cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Cache subcommands.
#[derive(Subcommand)]
pub(crate) enum CacheAction {
    /// Show the registry entry of every source.
    Status {
        /// Print the registry document as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Delete cached downloads and the registry.
    Clear,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "planaid=info",
        1 => "planaid=debug",
        _ => "planaid=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run => cmd_run(&resolve_config(&cli)?).await,
        Command::Fetch { json } => cmd_fetch(&resolve_config(&cli)?, json).await,
        Command::Generate => cmd_generate(&resolve_config(&cli)?),
        Command::Brief {
            ref departure,
            ref destination,
            ref alternate,
            ref pilot,
            ref instructor,
            ref mission,
            ref sortie,
            tas,
            wind,
            print,
        } => {
            let mut request =
                BriefRequest::new(departure, destination).with_alternate(alternate.as_deref());
            request.pilot = pilot.clone();
            request.instructor = instructor.clone();
            request.mission = mission.clone();
            request.sortie = sortie.clone();
            request.true_airspeed_kts = tas;
            request.wind_component_kts = wind;
            cmd_brief(&resolve_config(&cli)?, &request, print)
        }
        Command::Cache { ref action } => {
            let config = resolve_config(&cli)?;
            match action {
                CacheAction::Status { json } => cmd_cache_status(&config, *json),
                CacheAction::Clear => cmd_cache_clear(&config),
            }
        }
        Command::Config { ref action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&resolve_config(&cli)?),
        },
    }
}

/// Load the config file, then apply command-line overrides.
fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    if let Some(dir) = &cli.work_dir {
        config.paths.work_dir = dir.to_string_lossy().to_string();
    }
    validate_config(&config)?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(config: &AppConfig) -> Result<()> {
    let layout = WorkLayout::from(config);
    info!(work_dir = %layout.work_dir.display(), "starting full run");

    let progress = CliProgress::new();
    let summary = pipeline::run(config, &layout, &progress).await?;
    progress.finish();

    print_report(&summary.acquisition);
    print_generation(&summary.generation);
    Ok(())
}

async fn cmd_fetch(config: &AppConfig, json: bool) -> Result<()> {
    let layout = WorkLayout::from(config);
    info!(work_dir = %layout.work_dir.display(), "acquiring sources");

    let progress = CliProgress::new();
    let report = pipeline::acquire(config, &layout, &progress).await?;
    progress.finish();

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn cmd_generate(config: &AppConfig) -> Result<()> {
    let layout = WorkLayout::from(config);
    if !layout.apt_data_dir.is_dir() {
        return Err(eyre!(
            "no airport tables under '{}'. Run `planaid fetch` first.",
            layout.apt_data_dir.display()
        ));
    }

    let edition = pipeline::recorded_supplement_edition(&layout);
    let progress = CliProgress::new();
    let summary = pipeline::generate(config, &layout, edition.as_deref(), &progress)?;
    progress.finish();

    print_generation(&summary);
    Ok(())
}

fn cmd_brief(config: &AppConfig, request: &BriefRequest, print: bool) -> Result<()> {
    let layout = WorkLayout::from(config);
    if !layout.apt_data_dir.is_dir() {
        return Err(eyre!(
            "no airport tables under '{}'. Run `planaid fetch` first.",
            layout.apt_data_dir.display()
        ));
    }

    let (file, text) = pipeline::brief(config, &layout, request, Local::now().naive_local())?;
    if print {
        println!("{text}");
    }
    println!(
        "Briefing saved to: {}",
        layout.output_dir.join(&file.filename).display()
    );
    Ok(())
}

fn cmd_cache_status(config: &AppConfig, json: bool) -> Result<()> {
    let layout = WorkLayout::from(config);
    let registry = RegistryDocument::load(&layout.registry_file);

    if json {
        println!("{}", serde_json::to_string_pretty(&registry)?);
        return Ok(());
    }

    println!();
    println!("  Registry: {}", layout.registry_file.display());
    println!();
    for name in SourceName::ALL {
        match registry.sources.get(&name) {
            Some(state) => {
                let present = state.download_location.as_ref().is_some_and(|p| p.exists());
                println!(
                    "  {:<10} {:<8} edition {:<12} fetched {:<26} {}",
                    name.as_str(),
                    if state.success { "ok" } else { "failed" },
                    state.downloaded_cycle_date.as_deref().unwrap_or("-"),
                    state
                        .timestamp
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| "-".to_string()),
                    if present { "cached" } else { "missing" },
                );
            }
            None => println!("  {:<10} never fetched", name.as_str()),
        }
    }
    println!();
    Ok(())
}

fn cmd_cache_clear(config: &AppConfig) -> Result<()> {
    let layout = WorkLayout::from(config);
    clear_cache(&layout)?;
    println!("Cache cleared under: {}", layout.data_dir.display());
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    if let Ok(path) = config_file_path() {
        println!("# {}", path.display());
    }
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Report printing
// ---------------------------------------------------------------------------

fn print_report(report: &AcquisitionReport) {
    println!();
    println!("  Sources:");
    for r in &report.sources {
        println!(
            "  {:<10} {:<12} {:<12} {}",
            r.source.as_str(),
            r.outcome.to_string(),
            r.edition.as_deref().unwrap_or("-"),
            match (&r.error, r.deployed) {
                (Some(e), _) => format!("error: {e}"),
                (None, true) => "deployed".to_string(),
                (None, false) => "not deployed".to_string(),
            }
        );
    }
    println!();
}

fn print_generation(summary: &GenerateSummary) {
    let manifest = &summary.manifest;
    println!("  Outputs written to {}", summary.output_dir.display());
    println!("  Airports: {} fused, {} on the map", manifest.record_count, manifest.included_count);
    for file in &manifest.files {
        println!("    {:<32} {:>9} bytes", file.filename, file.size_bytes);
    }
    println!("  Time:     {:.1}s", summary.elapsed.as_secs_f64());
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress sink
// ---------------------------------------------------------------------------

/// One indicatif bar per source or stage.
struct CliProgress {
    bars: MultiProgress,
    active: Mutex<HashMap<String, ProgressBar>>,
}

impl CliProgress {
    fn new() -> Self {
        Self {
            bars: MultiProgress::new(),
            active: Mutex::new(HashMap::new()),
        }
    }

    fn bar_for(&self, source: &str) -> ProgressBar {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        active
            .entry(source.to_string())
            .or_insert_with(|| {
                let bar = self.bars.add(ProgressBar::new(100));
                bar.set_style(
                    ProgressStyle::with_template("{prefix:>10.cyan} {bar:30} {pos:>3}% {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_bar()),
                );
                bar.set_prefix(source.to_string());
                bar
            })
            .clone()
    }

    fn finish(&self) {
        let active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        for bar in active.values().filter(|b| !b.is_finished()) {
            bar.finish();
        }
    }
}

impl ProgressSink for CliProgress {
    fn emit(&self, source: &str, phase: ProgressPhase, percent: Option<u8>) {
        let bar = self.bar_for(source);
        if let Some(p) = percent {
            bar.set_position(u64::from(p));
        }
        match phase {
            ProgressPhase::Done => bar.finish_with_message("done"),
            ProgressPhase::Failed => bar.abandon_with_message("failed"),
            other => bar.set_message(other.to_string()),
        }
    }
}
