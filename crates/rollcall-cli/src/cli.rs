use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "rollcall")]
#[command(about = "Run and maintain an NFC check-in station")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// JSON configuration file
    #[arg(long, short, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory holding the registry, ledger and snapshot cache
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Station name, e.g. "Reception"
    #[arg(long, global = true, value_name = "NAME")]
    pub station: Option<String>,

    /// Never contact the directory; check-ins stay queued
    #[arg(long, global = true)]
    pub offline: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan tags and sync in the background until Ctrl-C
    Run,
    /// Show station, queue and sync status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run one sync cycle now
    Sync,
    /// Bind a tag to a guest
    Register {
        /// Guest identifier
        guest_id: String,
        /// Bind this UID without touching a reader
        #[arg(long, value_name = "UID")]
        tag: Option<String>,
        /// Replace an existing binding instead of refusing
        #[arg(long)]
        rewrite: bool,
    },
    /// Blank the presented tag and remove its binding
    Erase {
        /// Remove this UID's binding without touching a reader
        #[arg(long, value_name = "UID")]
        tag: Option<String>,
    },
    /// Show the guest bound to a tag
    Lookup {
        /// Tag UID, hex with or without separators
        tag: String,
    },
    /// Mark a guest absent at this station
    Absent {
        /// Guest identifier
        guest_id: String,
    },
    /// List check-ins waiting to sync
    Pending {
        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Archive synced check-ins past the retention window
    Compact,
    /// Drop every check-in that has not synced
    ClearQueue {
        /// Confirm the operation
        #[arg(long)]
        yes: bool,
    },
    /// Probe every reader backend
    Readers,
}
