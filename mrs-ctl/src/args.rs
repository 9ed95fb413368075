use std::path::PathBuf;

use clap::{Parser, Subcommand};

//
// For parsing user specified command.
//
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Path of the coordinator socket. Defaults to a per-user socket in /var/tmp.
    #[arg(short, long, global = true)]
    pub socket: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print whether the job is over. Exits non-zero while it is still running.
    Done,
    /// Show how many map and reduce tasks have finished.
    Status,
    /// Block until the job is over, printing progress along the way.
    Wait {
        /// Seconds between polls.
        #[arg(short, long, default_value_t = 1)]
        interval: u64,
    },
}
