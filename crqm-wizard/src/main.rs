//! crqm-wizard - CRQM input wizard
//!
//! Resolves a free-text company name to a profile, lets the user review and
//! override every field, collects asset classification pools and prints the
//! confirmed record as JSON.
//!
//! Logs go to stderr; stdout carries only the JSON document.

use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use crqm_common::config::{self, EnrichmentStrategy, SelectionPolicy};
use crqm_wizard::fusion::{Disambiguation, DisambiguationOutcome};
use crqm_wizard::{AssetClassification, ProfileDraft, ProfileField, Resolver, SensitivityLevels};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Select};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for crqm-wizard
#[derive(Parser, Debug)]
#[command(name = "crqm-wizard")]
#[command(about = "Collect a company profile for cyber risk quantification")]
#[command(version)]
struct Args {
    /// Company name as you would type it (e.g. "sbi", "Aditya Birla")
    company: String,

    /// Config file (overrides CRQM_CONFIG and the default location)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enrichment strategy: first-success or merge-all
    #[arg(long)]
    strategy: Option<EnrichmentStrategy>,

    /// Per-provider timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Candidate selection: prompt or pick-first
    #[arg(long, value_name = "POLICY")]
    selection: Option<SelectionPolicy>,

    /// Take the first candidate without asking (same as --selection pick-first)
    #[arg(long, conflicts_with_all = ["select", "selection"])]
    pick_first: bool,

    /// Take the Nth candidate (1-based) without asking
    #[arg(long, value_name = "N")]
    select: Option<usize>,

    /// Override revenue (e.g. "57.2 billion", "450 crore")
    #[arg(long)]
    revenue: Option<String>,

    /// Override employee count
    #[arg(long)]
    employees: Option<String>,

    #[arg(long)]
    industry: Option<String>,

    #[arg(long)]
    sector: Option<String>,

    #[arg(long)]
    region: Option<String>,

    /// Override the company name
    #[arg(long)]
    name: Option<String>,

    /// Asset pool split across sensitivity levels, repeatable
    #[arg(long = "asset", value_name = "NAME=TOTAL:P1,P2,..")]
    assets: Vec<String>,

    /// Multiplier for derived classification counts
    #[arg(long, default_value_t = 1.0)]
    scale: f64,

    /// Write JSON here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    config::load_dotenv();
    let mut config = config::load_config(args.config.as_deref()).context("Failed to load configuration")?;

    // Initialize tracing
    let level = if args.verbose {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Some(strategy) = args.strategy {
        config.pipeline.strategy = strategy;
    }
    if let Some(timeout) = args.timeout_secs {
        config.pipeline.timeout_secs = timeout;
    }
    if let Some(selection) = args.selection {
        config.pipeline.selection = selection;
    }
    if args.pick_first {
        config.pipeline.selection = SelectionPolicy::PickFirst;
    }
    config.validate().context("Invalid configuration")?;

    let levels = SensitivityLevels::from_config(&config.classification)?;
    let resolver = Resolver::from_config(&config).context("Failed to build providers")?;
    info!(
        "Providers: {} (strategy {})",
        resolver.provider_names().join(", "),
        resolver.strategy()
    );

    let cancel = resolver.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; abandoning resolution");
            cancel.cancel();
        }
    });

    let interactive = args.select.is_none()
        && config.pipeline.selection == SelectionPolicy::Prompt
        && std::io::stdin().is_terminal();

    let disambiguation = resolver.suggest(&args.company).await;
    let candidate = match args.select {
        Some(n) => n
            .checked_sub(1)
            .and_then(|i| disambiguation.select(i))
            .with_context(|| format!("--select {} out of range (1-{})", n, disambiguation.len()))?,
        None if interactive => choose_candidate(&disambiguation)?,
        None => disambiguation.first(),
    }
    .clone();

    let profile = resolver.build_profile(&candidate).await;
    if resolver.cancellation_token().is_cancelled() {
        bail!("Cancelled");
    }

    let mut draft = ProfileDraft::new(candidate, profile);
    draft.set_scale(args.scale)?;
    apply_flag_overrides(&mut draft, &args)?;

    for asset in &args.assets {
        draft.add_classification(AssetClassification::parse(asset, &levels)?);
    }

    if interactive {
        review_fields(&mut draft)?;
        if args.assets.is_empty() {
            prompt_assets(&mut draft, &levels)?;
        }
    }

    let submission = draft.confirm();
    for warning in submission.warnings() {
        eprintln!("warning: {}", warning);
    }

    let json = submission.to_json()?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {}", path.display());
        }
        None => println!("{}", json),
    }

    Ok(())
}

fn choose_candidate(disambiguation: &Disambiguation) -> Result<&crqm_wizard::CompanyCandidate> {
    if disambiguation.len() == 1 {
        return Ok(disambiguation.first());
    }

    let prompt = match disambiguation.outcome() {
        DisambiguationOutcome::Affiliates { parent, .. } => {
            format!("{} is not listed itself. Pick a listed affiliate", parent)
        }
        _ => "Which company did you mean?".to_string(),
    };

    let items: Vec<String> = disambiguation
        .candidates()
        .iter()
        .map(|c| match &c.handle {
            Some(handle) => format!("{} ({})", c.display_name, handle),
            None => c.display_name.clone(),
        })
        .collect();

    let index = Select::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .items(&items)
        .default(0)
        .interact()?;

    disambiguation
        .select(index)
        .context("selection out of range")
}

fn apply_flag_overrides(draft: &mut ProfileDraft, args: &Args) -> Result<()> {
    let overrides = [
        (ProfileField::Name, &args.name),
        (ProfileField::Region, &args.region),
        (ProfileField::Industry, &args.industry),
        (ProfileField::Sector, &args.sector),
        (ProfileField::Revenue, &args.revenue),
        (ProfileField::Employees, &args.employees),
    ];

    for (field, value) in overrides {
        if let Some(value) = value {
            draft
                .set_from_text(field, value)
                .with_context(|| format!("--{}", field))?;
        }
    }
    Ok(())
}

/// Walk every field with the resolved value pre-filled; re-ask on invalid input
fn review_fields(draft: &mut ProfileDraft) -> Result<()> {
    let theme = ColorfulTheme::default();

    for field in draft.fields() {
        let label = match field.field {
            ProfileField::Revenue => "revenue (USD billions)".to_string(),
            other => other.to_string(),
        };
        let prompt = if field.is_default {
            format!("{} [default, please check]", label)
        } else {
            format!("{} [from {}]", label, field.provenance)
        };

        loop {
            let answer: String = Input::with_theme(&theme)
                .with_prompt(&prompt)
                .default(field.value.clone())
                .interact_text()?;

            if answer.trim() == field.value {
                break;
            }
            match draft.set_from_text(field.field, &answer) {
                Ok(()) => break,
                Err(e) => eprintln!("  {}", e),
            }
        }
    }
    Ok(())
}

fn prompt_assets(draft: &mut ProfileDraft, levels: &SensitivityLevels) -> Result<()> {
    let theme = ColorfulTheme::default();
    eprintln!("Sensitivity levels: {}", levels.names().join(", "));

    loop {
        let answer: String = Input::with_theme(&theme)
            .with_prompt("Asset pool as NAME=TOTAL:P1,P2,.. (empty to finish)")
            .allow_empty(true)
            .interact_text()?;
        if answer.trim().is_empty() {
            return Ok(());
        }

        match AssetClassification::parse(&answer, levels) {
            Ok(pool) => {
                if let Some(w) = pool.warning() {
                    eprintln!("  warning: {}", w);
                }
                draft.add_classification(pool);
            }
            Err(e) => eprintln!("  {}", e),
        }
    }
}
