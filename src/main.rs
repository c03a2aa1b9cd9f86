//! Ledger Hub - Binary Entry Point
//!
//! Small operational CLI over the on-disk store:
//!
//! - `status`: replay the store and print the recovered state
//! - `verify [ledger_id]`: verify the hash chain of a ledger mirror
//! - `export <dir>`: write a bundle of the full history
//! - `import <dir>`: restore a bundle into the store

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use ledger_hub::hub::StateHub;
use ledger_hub::ledger::HashChainLedger;
use ledger_hub::persist::{export_bundle, import_bundle, replay_into_hub, PersistConfig};

const DATA_DIR_ENV: &str = "LEDGER_HUB_DATA";
const DEFAULT_LEDGER_ID: &str = "operations";

fn data_dir() -> PathBuf {
    std::env::var_os(DATA_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("state_store"))
}

fn usage() -> &'static str {
    "usage: ledger-hub <status | verify [ledger_id] | export <dir> | import <dir>>"
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = PersistConfig::new(data_dir());

    let outcome = match args.first().map(String::as_str) {
        Some("status") => cmd_status(&config),
        Some("verify") => cmd_verify(&config, args.get(1).map(String::as_str)),
        Some("export") => match args.get(1) {
            Some(dest) => cmd_export(&config, PathBuf::from(dest)),
            None => Err("export requires a destination directory".to_string()),
        },
        Some("import") => match args.get(1) {
            Some(source) => cmd_import(&config, PathBuf::from(source)),
            None => Err("import requires a bundle directory".to_string()),
        },
        _ => Err(usage().to_string()),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{}", message);
            ExitCode::FAILURE
        }
    }
}

fn cmd_status(config: &PersistConfig) -> Result<(), String> {
    let hub = StateHub::new();
    let signals = replay_into_hub(config, &hub);

    // Include the default ledger's summary when its mirror exists.
    let ledger_summary = config
        .ledger_dir()
        .join(format!("{}.ledger.jsonl", DEFAULT_LEDGER_ID))
        .exists()
        .then(|| {
            HashChainLedger::open(config.ledger_dir(), DEFAULT_LEDGER_ID, "cli")
                .map(|ledger| ledger.operational_summary())
        })
        .transpose()
        .map_err(|e| format!("failed to open ledger: {}", e))?;

    let report = serde_json::json!({
        "data_dir": config.data_dir,
        "state": hub.snapshot(),
        "integrity": signals,
        "ledger": ledger_summary,
    });
    let rendered = serde_json::to_string_pretty(&report).map_err(|e| e.to_string())?;
    println!("{}", rendered);
    Ok(())
}

fn cmd_verify(config: &PersistConfig, ledger_id: Option<&str>) -> Result<(), String> {
    let ledger_id = ledger_id.unwrap_or(DEFAULT_LEDGER_ID);
    let ledger = HashChainLedger::open(config.ledger_dir(), ledger_id, "cli")
        .map_err(|e| format!("failed to open ledger '{}': {}", ledger_id, e))?;

    let (intact, first_bad) = ledger.verify_chain();
    let summary = ledger.operational_summary();
    let report = serde_json::json!({
        "ledger": ledger.path(),
        "intact": intact,
        "first_bad_sequence": if intact { serde_json::Value::Null } else { first_bad.into() },
        "summary": summary,
    });
    let rendered = serde_json::to_string_pretty(&report).map_err(|e| e.to_string())?;
    println!("{}", rendered);

    if intact {
        Ok(())
    } else {
        Err(format!("chain broken at sequence {}", first_bad))
    }
}

fn cmd_export(config: &PersistConfig, dest: PathBuf) -> Result<(), String> {
    let manifest = export_bundle(config, &dest).map_err(|e| format!("export failed: {}", e))?;
    let rendered = serde_json::to_string_pretty(&manifest).map_err(|e| e.to_string())?;
    println!("{}", rendered);
    Ok(())
}

fn cmd_import(config: &PersistConfig, source: PathBuf) -> Result<(), String> {
    let hub = Arc::new(StateHub::new());
    let outcome =
        import_bundle(config, &hub, &source).map_err(|e| format!("import failed: {}", e))?;
    let rendered = serde_json::to_string_pretty(&outcome).map_err(|e| e.to_string())?;
    println!("{}", rendered);
    Ok(())
}
