use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Weft chat generator
#[derive(Debug, Parser)]
#[command(name = "weft", about = "Drive a Hugging Face chat generator from a config file")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "weft.toml", env = "WEFT_CONFIG")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Send one user prompt and print the reply
    Chat {
        /// User prompt
        prompt: String,

        /// System prompt sent before the user prompt
        #[arg(long)]
        system: Option<String>,

        /// Print the reply as it streams in
        #[arg(long)]
        stream: bool,

        /// Use the blocking client instead of the async one
        #[arg(long)]
        blocking: bool,
    },

    /// Print the generator's serialized form
    Describe,
}
