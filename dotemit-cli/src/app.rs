use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// dotemit - inspect ECMA-335 metadata in .NET images or raw metadata dumps
#[derive(Debug, Parser)]
#[command(name = "dotemit", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared across all subcommands.
#[derive(Debug, Parser)]
pub struct GlobalOptions {
    /// Emit output as JSON instead of human-readable text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose (debug-level) logging output.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Display the metadata root: version, streams, heap sizes and table counts.
    Info {
        /// Path to a .NET PE image or a raw metadata blob starting with BSJB.
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },

    /// List metadata tables and row counts.
    Tables {
        /// Path to a .NET PE image or a raw metadata blob starting with BSJB.
        #[arg(value_name = "FILE")]
        path: PathBuf,

        /// Show the rows of a specific table (e.g., TypeDef, MethodDef).
        #[arg(short, long)]
        table: Option<String>,
    },

    /// Dump metadata heaps (strings, blob, guid, userstrings).
    Heaps {
        /// Path to a .NET PE image or a raw metadata blob starting with BSJB.
        #[arg(value_name = "FILE")]
        path: PathBuf,

        /// Dump a specific heap: strings, blob, guid, userstrings.
        #[arg(long)]
        heap: Option<String>,
    },
}
