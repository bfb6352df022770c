use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "skein")]
#[command(about = "Replay captured agent streams and inspect conversation history", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Store database path (defaults to SKEIN_PATH, then the XDG data dir)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Feed a captured raw-stream JSONL file through a turn pipeline
    Replay {
        /// JSONL file of raw stream items, one per line
        file: PathBuf,

        /// Turn id to record the stream under
        #[arg(long)]
        turn: String,

        /// User prompt that opened the turn (becomes the root record)
        #[arg(long)]
        user: Option<String>,
    },

    /// Print the reconstructed conversation tree for a turn
    Tree {
        /// Turn id to reconstruct
        turn: String,
    },
}
