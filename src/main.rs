use anyhow::{bail, Context, Result};
use log::error;
use serde::Serialize;
use std::env;
use std::path::PathBuf;

use listing_merge::{EngineConfig, EntityKind, MergeEngine, MergeError, SqliteRepository, VERSION};

/// Exit code for failures a retry is expected to fix (EX_TEMPFAIL)
const EXIT_RETRY: i32 = 75;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args: Vec<String> = env::args().skip(1).collect();

    let config_path = take_flag(&mut args, "--config");
    let config = EngineConfig::load(config_path.as_deref().map(PathBuf::from).as_deref())?;

    let Some(command) = args.first().cloned() else {
        print_usage();
        return Ok(());
    };

    match command.as_str() {
        "init" => run_init(&config),
        "find" => {
            let kind = kind_arg(&args)?;
            let threshold = match args.get(2) {
                Some(raw) => Some(
                    raw.parse::<f64>()
                        .with_context(|| format!("threshold is not a number: {}", raw))?,
                ),
                None => None,
            };
            let engine = open_engine(config)?;
            report(engine.find_duplicates(kind, threshold))
        }
        "preview" => {
            let (kind, primary, duplicate) = pair_args(&args)?;
            let engine = open_engine(config)?;
            report(engine.preview_merge(kind, &primary, &duplicate))
        }
        "merge" => {
            let (kind, primary, duplicate) = pair_args(&args)?;
            let engine = open_engine(config)?;
            report(engine.execute_merge(kind, &primary, &duplicate))
        }
        "version" | "--version" => {
            println!("listing-merge {}", VERSION);
            Ok(())
        }
        "help" | "--help" => {
            print_usage();
            Ok(())
        }
        other => {
            print_usage();
            bail!("unknown command: {}", other)
        }
    }
}

fn print_usage() {
    println!("listing-merge {}", VERSION);
    println!();
    println!("Usage: listing-merge [--config <file.json>] <command>");
    println!();
    println!("Commands:");
    println!("  init                                   Create the database schema");
    println!("  find <kind> [threshold]                List likely duplicates (0.5-1.0, default 0.7)");
    println!("  preview <kind> <primaryId> <duplicateId>  Show what a merge would do");
    println!("  merge <kind> <primaryId> <duplicateId>    Merge duplicate into primary");
    println!();
    println!("Kinds: venues | events | vendors | promoters");
    println!("Environment: LISTING_MERGE_DB, LISTING_MERGE_THRESHOLD, LISTING_MERGE_TIME_BUDGET_MS");
}

fn run_init(config: &EngineConfig) -> Result<()> {
    SqliteRepository::open(&config.database_path)?;
    println!("✓ Database ready at {}", config.database_path.display());
    Ok(())
}

fn open_engine(config: EngineConfig) -> Result<MergeEngine<SqliteRepository>> {
    let repo = SqliteRepository::open(&config.database_path)?;
    Ok(MergeEngine::new(repo, config))
}

/// Print a successful result as JSON; map engine errors to exit codes
fn report<T: Serialize>(result: Result<T, MergeError>) -> Result<()> {
    match result {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Err(err) => {
            error!("{}", err);
            eprintln!("❌ {}", err);
            eprintln!("   {}", err.recovery_suggestion());
            std::process::exit(if err.is_retryable() { EXIT_RETRY } else { 1 });
        }
    }
}

/// Remove `--flag value` from `args`
fn take_flag(args: &mut Vec<String>, flag: &str) -> Option<String> {
    let pos = args.iter().position(|a| a == flag)?;
    args.remove(pos);
    if pos < args.len() {
        Some(args.remove(pos))
    } else {
        None
    }
}

fn kind_arg(args: &[String]) -> Result<EntityKind> {
    let raw = args.get(1).context("missing <kind>")?;
    Ok(raw.parse::<EntityKind>()?)
}

fn pair_args(args: &[String]) -> Result<(EntityKind, String, String)> {
    let kind = kind_arg(args)?;
    let primary = args.get(2).context("missing <primaryId>")?.clone();
    let duplicate = args.get(3).context("missing <duplicateId>")?.clone();
    Ok((kind, primary, duplicate))
}
