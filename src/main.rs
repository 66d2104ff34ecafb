use std::path::{Path, PathBuf};
use std::sync::Arc;

use custodian::cache::ScoreCache;
use custodian::cli::{CacheAction, Cli, Commands, ConfigAction};
use custodian::collectors::Ecosystem;
use custodian::config::Config;
use custodian::error::{CustodianError, Result};
use custodian::replay::{BatchResult, TemporalReplayService};
use custodian::scoring::{HistoricalScore, RiskBreakdown};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Score {
            package,
            ecosystem,
            force,
            json,
        } => {
            cmd_score(cli.config, &package, &ecosystem, force, json).await?;
        }
        Commands::History {
            package,
            ecosystem,
            months,
            json,
        } => {
            cmd_history(cli.config, &package, &ecosystem, months, json).await?;
        }
        Commands::Batch { file, force, json } => {
            cmd_batch(cli.config, &file, force, json).await?;
        }
        Commands::Cache { action } => {
            cmd_cache(cli.config, action)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose {
        "custodian=debug"
    } else {
        "custodian=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt().with_env_filter(filter).with_target(false).init();
}

fn service(config_path: Option<PathBuf>) -> Result<TemporalReplayService> {
    let config = Config::load(config_path.as_deref())?;
    TemporalReplayService::new(config)
}

async fn cmd_score(
    config_path: Option<PathBuf>,
    package: &str,
    ecosystem: &str,
    force: bool,
    json: bool,
) -> Result<()> {
    let ecosystem: Ecosystem = ecosystem.parse()?;
    let service = service(config_path)?;

    let result = service.score_now(package, ecosystem, force).await?;

    if json {
        println!("{}", to_json(&result.breakdown)?);
        return Ok(());
    }

    print_breakdown(&result.breakdown);
    if result.from_cache {
        println!("\n(cached result; rerun with --force to recalculate)");
    }
    Ok(())
}

async fn cmd_history(
    config_path: Option<PathBuf>,
    package: &str,
    ecosystem: &str,
    months: u32,
    json: bool,
) -> Result<()> {
    let ecosystem: Ecosystem = ecosystem.parse()?;
    let service = service(config_path)?;

    let series = service.score_history(package, ecosystem, months).await?;

    if json {
        println!("{}", to_json(&series)?);
        return Ok(());
    }

    println!("Risk history: {package} ({ecosystem})");
    println!("{:<12} {:>5}  {:<9} {:>6} {:>8} {:>13}", "month", "score", "level", "conc%", "commits", "contributors");
    for point in &series {
        println!(
            "{:<12} {:>5}  {:<9} {:>6.0} {:>8} {:>13}",
            point.date.format("%Y-%m"),
            point.score,
            point.risk_level.as_str(),
            point.concentration,
            point.commits_year,
            point.contributors,
        );
    }
    print_trend(&series);
    Ok(())
}

fn print_trend(series: &[HistoricalScore]) {
    let (Some(first), Some(last)) = (series.first(), series.last()) else {
        return;
    };
    let delta = last.score - first.score;
    if delta > 10 {
        println!("\nTrend: risk increased by {delta} points over the window");
    } else if delta < -10 {
        println!("\nTrend: risk decreased by {} points over the window", -delta);
    } else {
        println!("\nTrend: stable");
    }
}

async fn cmd_batch(
    config_path: Option<PathBuf>,
    file: &Path,
    force: bool,
    json: bool,
) -> Result<()> {
    let packages = parse_discovery_file(file)?;
    if packages.is_empty() {
        println!("Discovery file contains no packages");
        return Ok(());
    }

    let service = Arc::new(service(config_path)?);
    let batch = service.score_batch(packages, force).await;

    if json {
        let breakdowns: Vec<&RiskBreakdown> =
            batch.results.iter().map(|r| &r.breakdown).collect();
        println!("{}", to_json(&breakdowns)?);
        return Ok(());
    }

    print_batch(&batch);
    Ok(())
}

fn print_batch(batch: &BatchResult) {
    println!("Scored {} packages, {} failed", batch.results.len(), batch.failures.len());
    println!();
    for result in &batch.results {
        let b = &result.breakdown;
        let cached = if result.from_cache { " (cached)" } else { "" };
        println!(
            "{} {:>3}  {:<9} {} ({}){cached}",
            b.risk_level.semaphore(),
            b.final_score,
            b.risk_level.as_str(),
            b.package_name,
            b.ecosystem,
        );
    }
    if !batch.failures.is_empty() {
        println!("\nFailures:");
        for (package, error) in &batch.failures {
            println!("  {package}: {error}");
        }
    }
}

/// Discovery files are JSON arrays of `"ecosystem:name"` strings or
/// `{"name", "ecosystem"}` objects. Bare strings with a slash are treated as
/// github repositories, anything else as npm.
fn parse_discovery_file(path: &Path) -> Result<Vec<(String, Ecosystem)>> {
    let text = std::fs::read_to_string(path).map_err(|e| CustodianError::Io {
        source: e,
        context: format!("Failed to read discovery file: {:?}", path),
    })?;
    let value: serde_json::Value =
        serde_json::from_str(&text).map_err(|e| CustodianError::Json {
            source: e,
            context: format!("parsing discovery file {:?}", path),
        })?;

    let Some(entries) = value.as_array() else {
        return Err(CustodianError::Config(
            "Discovery file must be a JSON array".to_string(),
        ));
    };

    let mut packages = Vec::new();
    for entry in entries {
        match entry {
            serde_json::Value::String(s) => {
                if let Some((eco, name)) = s.split_once(':') {
                    packages.push((name.to_string(), eco.parse()?));
                } else if s.contains('/') {
                    packages.push((s.clone(), Ecosystem::Github));
                } else {
                    packages.push((s.clone(), Ecosystem::Npm));
                }
            }
            serde_json::Value::Object(obj) => {
                let name = obj
                    .get("name")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| {
                        CustodianError::Config("Discovery entry missing 'name'".to_string())
                    })?;
                let eco = obj
                    .get("ecosystem")
                    .and_then(|v| v.as_str())
                    .unwrap_or("github");
                packages.push((name.to_string(), eco.parse()?));
            }
            other => {
                return Err(CustodianError::Config(format!(
                    "Unsupported discovery entry: {other}"
                )));
            }
        }
    }
    Ok(packages)
}

fn cmd_cache(config_path: Option<PathBuf>, action: CacheAction) -> Result<()> {
    let config = Config::load(config_path.as_deref())?;
    let cache = ScoreCache::open(&config.cache_db_path())?;

    match action {
        CacheAction::List => {
            let packages = cache.list_packages()?;
            if packages.is_empty() {
                println!("Cache is empty");
                return Ok(());
            }
            println!("{} cached packages:", packages.len());
            for (name, ecosystem, score, level) in packages {
                println!("  {score:>3}  {level:<9} {name} ({ecosystem})");
            }
        }
        CacheAction::Evict { package, ecosystem } => {
            if cache.evict(&package, &ecosystem)? {
                println!("✓ Evicted {package} ({ecosystem})");
            } else {
                println!("{package} ({ecosystem}) was not cached");
            }
        }
        CacheAction::ClearHistory { package, ecosystem } => {
            let deleted = cache.clear_history(&package, &ecosystem)?;
            println!("✓ Removed {deleted} history points for {package} ({ecosystem})");
        }
    }
    Ok(())
}

fn cmd_config(config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = Config::load(config_path.as_deref())?;
            let json = serde_json::to_string_pretty(&config).map_err(|e| {
                CustodianError::Json {
                    source: e,
                    context: "Failed to serialize config".to_string(),
                }
            })?;
            println!("{json}");
        }
        ConfigAction::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_path);
            Config::load(Some(&path))?;
            println!("✓ Configuration is valid");
        }
        ConfigAction::Init { force } => {
            let path = Config::default_path();

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            let config = Config::default();
            config.save(&path)?;
            println!("✓ Configuration initialized at: {}", path.display());
        }
    }
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| CustodianError::Json {
        source: e,
        context: "serializing output".to_string(),
    })
}

fn print_breakdown(b: &RiskBreakdown) {
    println!("{} {} ({})", b.risk_level.semaphore(), b.package_name, b.ecosystem);
    if let Some(url) = &b.repo_url {
        println!("  {url}");
    }
    println!();
    println!("Risk score: {} / 100 — {}", b.final_score, b.risk_level.as_str());
    println!("  {}", b.risk_level.description());
    println!();
    println!("Components:");
    println!("  Base risk (concentration {:.0}%): {:>4}", b.maintainer_concentration, b.base_risk);
    println!("  Activity ({} commits/year):      {:>+4}", b.commits_last_year, b.activity_modifier);
    println!("  Protective factors:              {:>+4}", b.protective_factors.total());

    let pf = &b.protective_factors;
    let factors = [
        ("maintainer reputation", pf.reputation_score),
        ("funding", pf.funding_score),
        ("organization backing", pf.org_score),
        ("visibility", pf.visibility_score),
        ("distributed governance", pf.distributed_score),
        ("active community", pf.community_score),
        ("best-practices badge", pf.cii_score),
        ("maintainer frustration", pf.frustration_score),
        ("sentiment", pf.sentiment_score),
        ("takeover pattern", pf.takeover_risk_score),
    ];
    for (label, score) in factors {
        if score != 0 {
            println!("    {score:>+4}  {label}");
        }
    }

    println!();
    println!("{}", b.explanation);

    if !b.recommendations.is_empty() {
        println!("\nRecommendations:");
        for rec in &b.recommendations {
            println!("  - {rec}");
        }
    }
    if !b.warnings.is_empty() {
        println!("\nWarnings:");
        for warning in &b.warnings {
            println!("  ⚠ {warning}");
        }
    }
}
