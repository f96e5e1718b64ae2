use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "fieldcase")]
#[command(about = "Offline-first field casework from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, value_name = "PATH", global = true)]
    pub db_path: Option<PathBuf>,

    /// Operate against the local store only; no remote calls are attempted
    #[arg(long, global = true)]
    pub offline: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Push pending offline work, then refresh the local mirrors
    Sync,
    /// Refresh every sub-record collection of one case/license
    Detail {
        /// Parent kind the record belongs to
        kind: ParentKindArg,
        /// Parent record id
        id: String,
    },
    /// List locally mirrored cases or licenses
    List {
        /// Parent kind to list
        kind: ParentKindArg,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the admin notes of one case/license
    Notes {
        /// Parent kind the notes belong to
        kind: ParentKindArg,
        /// Parent record id
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Capture an admin note (works offline)
    AddNote {
        /// Parent kind the note belongs to
        kind: ParentKindArg,
        /// Parent record id
        id: String,
        /// Note text
        text: Vec<String>,
        /// Note author
        #[arg(long)]
        author: Option<String>,
    },
    /// Show records still awaiting reconciliation
    Pending,
    /// Delete fully reconciled records from the local store
    Prune,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ParentKindArg {
    Case,
    License,
}

impl From<ParentKindArg> for fieldcase_core::ParentKind {
    fn from(value: ParentKindArg) -> Self {
        match value {
            ParentKindArg::Case => Self::Case,
            ParentKindArg::License => Self::License,
        }
    }
}
