use super::{Cli, Command, DomainKind};
use anyhow::{Context, Result, bail};
use recordkeep::domains::{CarParts, Crm, Deliveries, Domain, EscapeRooms};
use recordkeep::{RecordId, RecordManager, StoreConfig};
use serde_json::Value;
use tracing::debug;

pub fn run(cli: Cli) -> Result<()> {
    let mut config = StoreConfig::from_url(&cli.store)
        .with_context(|| format!("Invalid --store '{}'", cli.store))?;
    if let Some(policy) = cli.conflict {
        config = config.conflict_policy(policy);
    }
    debug!(store = %config.to_url(), domain = ?cli.domain, "opening store");

    match cli.domain {
        DomainKind::CarParts => execute::<CarParts>(&config, cli.command),
        DomainKind::Crm => execute::<Crm>(&config, cli.command),
        DomainKind::EscapeRooms => execute::<EscapeRooms>(&config, cli.command),
        DomainKind::Delivery => execute::<Deliveries>(&config, cli.command),
    }
}

fn execute<D: Domain>(config: &StoreConfig, command: Command) -> Result<()> {
    let manager = RecordManager::from_config(config, D::NAME)
        .with_context(|| format!("Failed to open store '{}'", config.to_url()))?;

    match command {
        Command::Seed => {
            let domain = open::<D>(&manager)?;
            for (collection, count) in domain.counts() {
                println!("{}: {} record(s)", manager.key_for(collection), count);
            }
        }
        Command::Dashboard { json } => {
            let domain = open::<D>(&manager)?;
            let dashboard = serde_json::to_value(domain.dashboard())
                .context("Failed to render dashboard")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&dashboard)?);
            } else {
                println!("{} dashboard", D::NAME);
                print_fields("", &dashboard);
            }
        }
        Command::List { collection, search } => {
            let domain = open::<D>(&manager)?;
            let rows = domain
                .list(&collection, search.as_deref())
                .with_context(|| known_collections::<D>(&collection))?;
            for row in rows {
                println!("{}", serde_json::to_string(&row)?);
            }
        }
        Command::Status {
            collection,
            id,
            status,
        } => {
            let mut domain = open::<D>(&manager)?;
            domain
                .set_status(&collection, &RecordId::new(id.as_str()), &status)
                .with_context(|| format!("Failed to set {collection} '{id}' to '{status}'"))?;
            println!("{collection} '{id}' is now {status}");
        }
        Command::Remove {
            collection,
            id,
            yes,
        } => {
            if !yes {
                bail!("Refusing to delete {collection} '{id}' without --yes");
            }
            let mut domain = open::<D>(&manager)?;
            let released = domain
                .remove(&collection, &RecordId::new(id.as_str()))
                .with_context(|| format!("Failed to delete {collection} '{id}'"))?;
            println!("Deleted {collection} '{id}'");
            for (relation, count) in released {
                println!("  {relation}: {count} dependent record(s) affected");
            }
        }
        Command::Keys => {
            let keys = manager.keys().context("Failed to list store keys")?;
            if keys.is_empty() {
                println!("No keys for domain '{}'. Run `seed` first.", D::NAME);
            }
            for key in keys {
                println!("{key}");
            }
        }
        Command::Dump { key } => {
            let raw = manager
                .raw(&key)
                .with_context(|| format!("Failed to read '{key}'"))?;
            match raw {
                Some(raw) => println!("{raw}"),
                None => bail!("Key '{key}' is not in the store"),
            }
        }
        Command::Reset { yes } => {
            if !yes {
                bail!("Refusing to reset domain '{}' without --yes", D::NAME);
            }
            let removed = manager.reset().context("Failed to reset domain")?;
            println!("Removed {removed} key(s) of domain '{}'", D::NAME);
        }
    }

    Ok(())
}

fn open<D: Domain>(manager: &RecordManager) -> Result<D> {
    D::open(manager).with_context(|| format!("Failed to open domain '{}'", D::NAME))
}

fn known_collections<D: Domain>(requested: &str) -> String {
    format!(
        "Cannot list '{requested}'; {} has: {}",
        D::NAME,
        D::COLLECTIONS.join(", ")
    )
}

fn print_fields(prefix: &str, value: &Value) {
    match value {
        Value::Object(fields) => {
            for (name, field) in fields {
                let path = if prefix.is_empty() {
                    name.clone()
                } else {
                    format!("{prefix}.{name}")
                };
                print_fields(&path, field);
            }
        }
        Value::Number(number) => match number.as_f64() {
            Some(float) if number.is_f64() => println!("  {prefix}: {float:.2}"),
            _ => println!("  {prefix}: {number}"),
        },
        other => println!("  {prefix}: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn memory_store_commands_run_end_to_end() {
        let cases: [&[&str]; 4] = [
            &["recordkeep", "--store", "memory://", "--domain", "crm", "seed"],
            &["recordkeep", "--store", "memory://", "--domain", "delivery", "dashboard", "--json"],
            &["recordkeep", "--store", "memory://", "list", "parts", "--search", "brake"],
            &["recordkeep", "--store", "memory://", "--domain", "escape-rooms", "status", "bookings", "3", "checked_in"],
        ];
        for args in cases {
            run(parse(args)).unwrap();
        }
    }

    #[test]
    fn destructive_commands_need_confirmation() {
        let err = run(parse(&["recordkeep", "--store", "memory://", "reset"])).unwrap_err();
        assert!(err.to_string().contains("--yes"));
    }

    #[test]
    fn unknown_collections_name_the_valid_ones() {
        let err = run(parse(&["recordkeep", "--store", "memory://", "list", "widgets"])).unwrap_err();
        assert!(err.to_string().contains("parts, sales, suppliers"));
    }
}
