use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "encodebot")]
#[command(author, version, about = "Telegram bot that re-encodes uploaded videos to 480p", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the bot (long polling)
    Run,

    /// Encode a local file with the same fallback chain the bot uses
    Encode {
        /// Input video
        input: PathBuf,

        /// Output file (defaults to `<ENCODED_DIR>/<stem>_encoded.mp4`)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check that ffmpeg runs and the working directories are writable
    Check,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
