pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use recordkeep::ConflictPolicy;

#[derive(Parser)]
#[command(name = "recordkeep")]
#[command(about = "Inspect and drive recordkeep domain stores", version)]
pub struct Cli {
    /// Store URL: memory:// or file://<dir>, with ?quota=&conflict=&pretty=
    #[arg(
        long,
        global = true,
        env = "RECORDKEEP_STORE",
        default_value = "file://./recordkeep-data"
    )]
    pub store: String,

    #[arg(long, global = true, value_enum, default_value_t = DomainKind::CarParts)]
    pub domain: DomainKind,

    /// Overrides the conflict policy from the store URL.
    #[arg(long, global = true)]
    pub conflict: Option<ConflictPolicy>,

    /// -v info, -vv debug, -vvv trace. RUST_LOG applies when absent.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DomainKind {
    CarParts,
    Crm,
    EscapeRooms,
    Delivery,
}

#[derive(Subcommand)]
pub enum Command {
    /// Open every collection, seeding empty ones, and print counts.
    Seed,
    Dashboard {
        #[arg(long)]
        json: bool,
    },
    /// Print records as JSON lines.
    List {
        collection: String,
        #[arg(long)]
        search: Option<String>,
    },
    /// Apply a lifecycle transition.
    Status {
        collection: String,
        id: String,
        status: String,
    },
    /// Delete a record with the domain's cascade rules.
    Remove {
        collection: String,
        id: String,
        #[arg(long)]
        yes: bool,
    },
    /// List this domain's keys in the store.
    Keys,
    /// Print a raw stored blob.
    Dump { key: String },
    /// Remove every key of this domain; the next open re-seeds.
    Reset {
        #[arg(long)]
        yes: bool,
    },
}
