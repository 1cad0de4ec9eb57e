use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use serde_json::{Value, json};

use pipscope::publish::{NotionPublisher, RetryingPublisher, publish_profiles};
use pipscope::{Pipeline, PipelineConfig, PipscopeError, PreparedSymbol, SymbolMetrics};
use pipscope_core::BuildOutcome;

#[derive(Parser)]
#[command(version, about = "Forex session and volatility statistics")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Args)]
struct GlobalArgs {
    /// TOML configuration file; defaults apply when omitted.
    #[arg(long, short, env = "PIPSCOPE_CONFIG", value_name = "FILE", global = true)]
    config: Option<PathBuf>,
    /// Override `data_dir` from the configuration.
    #[arg(long, value_name = "DIR", global = true)]
    data_dir: Option<PathBuf>,
    /// Override `max_workers` from the configuration.
    #[arg(long, value_name = "N", global = true)]
    workers: Option<usize>,
}

#[derive(Subcommand)]
enum Cmd {
    /// Compute metrics and print `{symbol: {category: {metric: value}}}` as JSON.
    Run {
        /// Symbols to process; every directory under `data_dir/raw` when omitted.
        #[arg(long, value_delimiter = ',')]
        symbols: Vec<String>,
        /// Publish to these profiles after computing.
        #[arg(long = "publish", value_name = "PROFILE", value_delimiter = ',')]
        profiles: Vec<String>,
        /// Publish to every configured profile.
        #[arg(long, conflicts_with = "profiles")]
        publish_all: bool,
        /// API token for the metrics store.
        #[arg(long, env = "PIPSCOPE_NOTION_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },
    /// Build reformatted histories and candle files only.
    Aggregate {
        /// Symbols to process; every directory under `data_dir/raw` when omitted.
        #[arg(long, value_delimiter = ',')]
        symbols: Vec<String>,
    },
    /// Delete cached daily session records.
    ClearCache {
        /// Only this symbol (requires --year).
        #[arg(long, requires = "year")]
        symbol: Option<String>,
        /// Only this year (requires --symbol).
        #[arg(long, requires = "symbol")]
        year: Option<i32>,
    },
    /// List metric categories, or the metrics a profile receives.
    Categories {
        /// Profile to describe.
        #[arg(long)]
        profile: Option<String>,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(global: &GlobalArgs) -> Result<PipelineConfig, PipscopeError> {
    let mut cfg = match &global.config {
        Some(path) => PipelineConfig::from_toml_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(dir) = &global.data_dir {
        cfg.data_dir.clone_from(dir);
    }
    if let Some(n) = global.workers {
        cfg.max_workers = n;
    }
    Ok(cfg)
}

fn print_json(value: &impl serde::Serialize) -> Result<(), PipscopeError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| PipscopeError::Other(format!("json encoding: {e}")))?;
    println!("{text}");
    Ok(())
}

fn symbols_or_discovered(
    pipeline: &Pipeline,
    symbols: Vec<String>,
) -> Result<Vec<String>, PipscopeError> {
    if symbols.is_empty() {
        pipeline.discover_symbols()
    } else {
        Ok(symbols)
    }
}

fn prepared_summary(p: &PreparedSymbol) -> Value {
    let timeframes: BTreeMap<&str, String> = p
        .timeframes
        .iter()
        .map(|(tf, r)| {
            let status = match r {
                Ok(BuildOutcome::Created(n)) => format!("created {n}"),
                Ok(BuildOutcome::Reused) => "reused".to_string(),
                Err(e) => format!("error: {e}"),
            };
            (tf.key(), status)
        })
        .collect();
    json!({
        "year": p.year,
        "bars": p.bars,
        "formatted_written": p.formatted_written,
        "timeframes": timeframes,
    })
}

fn exit_for(failed: usize) -> ExitCode {
    if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    }
}

async fn run(global: &GlobalArgs, cmd: Cmd) -> Result<ExitCode, PipscopeError> {
    let cfg = load_config(global)?;
    match cmd {
        Cmd::Run {
            symbols,
            profiles,
            publish_all,
            token,
        } => {
            let pipeline = Pipeline::builder().config(cfg).build()?;
            let symbols = symbols_or_discovered(&pipeline, symbols)?;
            let report = pipeline.run_all(&symbols).await;
            if let Some(e) = report.all_failed() {
                return Err(e);
            }
            for (symbol, e) in &report.failures {
                eprintln!("{symbol}: {e}");
            }
            let metrics: SymbolMetrics = report.results;
            print_json(&metrics)?;

            let profiles: Vec<String> = if publish_all {
                pipeline
                    .config()
                    .profiles
                    .iter()
                    .map(|p| p.name.clone())
                    .collect()
            } else {
                profiles
            };
            if profiles.is_empty() {
                return Ok(exit_for(report.failures.len()));
            }
            let token = token.ok_or_else(|| {
                PipscopeError::Config("publishing requires --token or PIPSCOPE_NOTION_TOKEN".into())
            })?;
            let cfg = pipeline.config();
            let publisher = RetryingPublisher::new(
                NotionPublisher::new(&cfg.publish, token)?,
                &cfg.publish,
                cfg.backoff,
            );
            let published =
                publish_profiles(&publisher, pipeline.catalog(), &metrics, &profiles).await;
            if let Some(e) = published.all_failed() {
                return Err(e);
            }
            for (profile, e) in &published.profile_failures {
                eprintln!("{profile}: {e}");
            }
            for (profile, tally) in &published.profiles {
                for (symbol, e) in &tally.failures {
                    eprintln!("{profile}/{symbol}: {e}");
                }
            }
            Ok(exit_for(report.failures.len() + published.failed()))
        }
        Cmd::Aggregate { symbols } => {
            let pipeline = Pipeline::builder().config(cfg).build()?;
            let symbols = symbols_or_discovered(&pipeline, symbols)?;
            let report = pipeline.prepare_all(&symbols).await;
            if let Some(e) = report.all_failed() {
                return Err(e);
            }
            let mut out: BTreeMap<String, Value> = report
                .results
                .iter()
                .map(|(s, p)| (s.clone(), prepared_summary(p)))
                .collect();
            for (symbol, e) in &report.failures {
                out.insert(symbol.clone(), json!({ "error": e.to_string() }));
            }
            print_json(&out)?;
            Ok(exit_for(report.failures.len()))
        }
        Cmd::ClearCache { symbol, year } => {
            let pipeline = Pipeline::builder().config(cfg).build()?;
            let target = symbol.as_deref().zip(year);
            let removed = pipeline.clear_session_cache(target)?;
            print_json(&json!({ "removed": removed }))?;
            Ok(ExitCode::SUCCESS)
        }
        Cmd::Categories { profile } => {
            let pipeline = Pipeline::builder().config(cfg).build()?;
            let catalog = pipeline.catalog();
            match profile {
                None => print_json(&catalog.categories())?,
                Some(p) => {
                    let mut grouped: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
                    for name in catalog.metrics_for_profile(&p)? {
                        grouped.entry(catalog.category_of(name)).or_default().push(name);
                    }
                    print_json(&grouped)?;
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match run(&cli.global, cli.cmd).await {
        Ok(code) => code,
        Err(e) => {
            for e in e.flatten() {
                eprintln!("error: {e}");
            }
            ExitCode::FAILURE
        }
    }
}
