//! flowlens command line
//!
//! ## Commands
//!
//! - `extract <file>` - Call graph of one source file as JSON
//! - `diff <old> <new>` - Structural diff between two revisions of a file
//! - `watch <root>` - Keep a workflow graph live and stream engine events
//!   as JSON lines on stdout

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod extract;
mod watch;

#[derive(Parser, Debug)]
#[command(name = "flowlens", version, about = "Incremental call graphs for LLM pipelines")]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the call graph of a source file
    Extract {
        file: PathBuf,
        /// Workspace root used to name the file (default: the file's directory)
        #[arg(long)]
        root: Option<PathBuf>,
    },
    /// Print the structural diff between two revisions of a file
    Diff { old: PathBuf, new: PathBuf },
    /// Watch a workspace and print engine events as JSON lines
    Watch {
        #[arg(default_value = ".")]
        root: PathBuf,
        /// Config file (default: flowlens.toml in the root)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // stdout carries JSON; logs go to stderr
    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Stderr)
        .init();

    match cli.command {
        Command::Extract { file, root } => {
            let call_graph = extract::extract_file(&file, root.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&call_graph)?);
        }
        Command::Diff { old, new } => {
            let delta = extract::diff_files(&old, &new)?;
            println!("{}", serde_json::to_string_pretty(&delta)?);
        }
        Command::Watch { root, config } => watch::run(&root, config.as_deref()).await?,
    }
    Ok(())
}
