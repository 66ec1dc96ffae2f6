use anyhow::{bail, Context, Result};
use std::env;
use std::io;
use std::sync::Arc;
use tracing::info;

use medical_registry::{
    init_logging, Config, Item, ItemData, MedicalRecord, RecordKind, RecordService, Service,
    ServiceData, SignalBus, SqliteStore, UserContext,
};

const USAGE: &str = "usage: medical-registry <init | items | services | upsert <item|service> < data.json | history <item|service> <uuid> | delete <item|service> <uuid>>";

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let config = Config::from_env()?;
    init_logging(config.log_format);

    let store = SqliteStore::open(&config.db_path)
        .with_context(|| format!("Failed to open database {}", config.db_path.display()))?;

    let user = UserContext::new("cli", config.audit_user_id);
    let signals = SignalBus::new();
    for kind in [RecordKind::Item, RecordKind::Service] {
        signals.connect_after(kind.signal_name(), store.event_listener());
    }

    let items: RecordService<Item> =
        RecordService::new(user.clone(), Arc::new(store.clone()), Arc::new(store.clone()))
            .with_signals(signals.clone());
    let services: RecordService<Service> =
        RecordService::new(user, Arc::new(store.clone()), Arc::new(store.clone()))
            .with_signals(signals);

    match args.get(1).map(String::as_str) {
        Some("init") => {
            info!(path = %config.db_path.display(), "database ready");
        }
        Some("items") => print_current(&items)?,
        Some("services") => print_current(&services)?,
        Some("upsert") => {
            let kind = parse_kind(&args)?;
            // field set as JSON on stdin; include "uuid" to update
            let saved = match kind {
                RecordKind::Item => {
                    let data: ItemData = serde_json::from_reader(io::stdin().lock())
                        .context("Failed to parse item JSON from stdin")?;
                    serde_json::to_string_pretty(&items.create_or_update(data)?)?
                }
                RecordKind::Service => {
                    let data: ServiceData = serde_json::from_reader(io::stdin().lock())
                        .context("Failed to parse service JSON from stdin")?;
                    serde_json::to_string_pretty(&services.create_or_update(data)?)?
                }
            };
            println!("{}", saved);
            println!("✓ Saved {}", kind);
        }
        Some("history") => match parse_target(&args)? {
            (RecordKind::Item, uuid) => print_history(&items, uuid)?,
            (RecordKind::Service, uuid) => print_history(&services, uuid)?,
        },
        Some("delete") => {
            let failures = match parse_target(&args)? {
                (RecordKind::Item, uuid) => items.delete_by_uuids(&[uuid.to_string()]),
                (RecordKind::Service, uuid) => services.delete_by_uuids(&[uuid.to_string()]),
            };
            if !failures.is_empty() {
                println!("{}", serde_json::to_string_pretty(&failures)?);
                bail!("{} deletion(s) failed", failures.len());
            }
            println!("✓ Deleted");
        }
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    }

    Ok(())
}

fn parse_kind(args: &[String]) -> Result<RecordKind> {
    let Some(kind) = args.get(2) else {
        bail!(USAGE);
    };
    RecordKind::parse(kind).with_context(|| format!("unknown kind {kind:?}"))
}

fn parse_target(args: &[String]) -> Result<(RecordKind, &str)> {
    let kind = parse_kind(args)?;
    let Some(uuid) = args.get(3) else {
        bail!(USAGE);
    };
    Ok((kind, uuid.as_str()))
}

fn print_current<R: MedicalRecord + serde::Serialize>(service: &RecordService<R>) -> Result<()> {
    let records = service.current()?;
    for record in &records {
        println!("{}", serde_json::to_string(record)?);
    }
    println!("✓ {} current {}(s)", records.len(), R::KIND);
    Ok(())
}

fn print_history<R: MedicalRecord + serde::Serialize>(
    service: &RecordService<R>,
    uuid: &str,
) -> Result<()> {
    let versions = service.history(uuid)?;
    if versions.is_empty() {
        bail!("no {} with uuid {}", R::KIND, uuid);
    }
    println!("{}", serde_json::to_string_pretty(&versions)?);
    Ok(())
}
