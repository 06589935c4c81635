//! Import and export snippets or history as XML against a support directory.
//!
//! Usage:
//!     cargo run --bin shelf-xml -- --support-dir <dir> export-snippets [-o out.xml]
//!     cargo run --bin shelf-xml -- --support-dir <dir> import-history history.xml
//!
//! Runs without a system pasteboard; only stored data is touched.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shelf::environment::Environment;
use shelf::logging::init_logging;
use shelf::pasteboard::MemoryPasteboard;
use shelf::ShelfStore;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(about = "Shelf snippet and history XML tool")]
struct Args {
    /// Application support directory holding shelf.sqlite
    #[arg(long)]
    support_dir: PathBuf,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Write all folders and snippets as XML
    ExportSnippets {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Append the folders of an XML file after the existing ones
    ImportSnippets { input: PathBuf },
    /// Write plain-text history as XML (configured order and cap)
    ExportHistory {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Store every history entry of an XML file as a text clip
    ImportHistory { input: PathBuf },
    /// Print the stored history, one clip per line
    List,
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    let env = Environment::open(&args.support_dir, Arc::new(MemoryPasteboard::new()))
        .with_context(|| format!("opening store in {}", args.support_dir.display()))?;
    let store = ShelfStore::with_environment(env);

    match args.command {
        Cmd::ExportSnippets { output } => emit(store.export_snippets_xml()?, output.as_deref())?,
        Cmd::ImportSnippets { input } => {
            let count = store.import_snippets_xml(read(&input)?)?;
            println!("Imported {} folders", count);
        }
        Cmd::ExportHistory { output } => emit(store.export_history_xml()?, output.as_deref())?,
        Cmd::ImportHistory { input } => {
            let count = store.import_history_xml(read(&input)?)?;
            println!("Imported {} clips", count);
        }
        Cmd::List => {
            for clip in store.clips()? {
                let title = clip.title.lines().next().unwrap_or_default();
                println!("{}\t{}\t{}", clip.update_time, clip.primary_type, title);
            }
        }
    }
    Ok(())
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn emit(xml: String, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => fs::write(path, xml).with_context(|| format!("writing {}", path.display())),
        None => {
            print!("{}", xml);
            Ok(())
        }
    }
}
