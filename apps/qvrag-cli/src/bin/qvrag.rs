use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use qvrag_core::config::Config;
use qvrag_core::{CollectionInfo, Metadata};
use qvrag_engine::{RagEngine, SplitType};

#[derive(Parser)]
#[command(name = "qvrag", about = "Split, embed, store and retrieve document chunks")]
struct Cli {
    /// Collection to use (overrides `rag.collection_name`)
    #[arg(short, long, global = true)]
    collection: Option<String>,

    /// Database directory (overrides `rag.persist_directory`)
    #[arg(long, global = true)]
    persist_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Add files, or every file under directories
    Add {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// File type override (txt, md, html, json, pdf)
        #[arg(long = "type")]
        file_type: Option<String>,
        /// Extra metadata as key=value; values that parse as JSON are stored as JSON
        #[arg(long = "meta", value_parser = parse_key_value)]
        meta: Vec<(String, Value)>,
    },
    /// Add literal texts
    AddText {
        #[arg(required = true)]
        texts: Vec<String>,
        #[arg(long, default_value = "text")]
        split_type: String,
    },
    /// Print the closest chunks as JSON lines
    Query {
        text: String,
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
        #[arg(long = "where", value_parser = parse_json)]
        where_: Option<Value>,
        #[arg(long, value_parser = parse_json)]
        where_document: Option<Value>,
    },
    /// Print collection name and size
    Info,
    /// Delete chunks matching the filters
    Delete {
        #[arg(long = "where", value_parser = parse_json)]
        where_: Option<Value>,
        #[arg(long, value_parser = parse_json)]
        where_document: Option<Value>,
    },
    /// Remove every chunk from the collection
    Reset,
}

fn parse_json(s: &str) -> Result<Value, String> {
    serde_json::from_str(s).map_err(|e| format!("invalid JSON: {}", e))
}

fn parse_key_value(s: &str) -> Result<(String, Value), String> {
    let (key, raw) = s.split_once('=').ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.trim().to_string(), value))
}

fn is_hidden(path: &Path) -> bool {
    path.file_name().is_some_and(|n| n.to_string_lossy().starts_with('.'))
}

fn collect_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            files.extend(
                WalkDir::new(path)
                    .into_iter()
                    .filter_entry(|e| e.depth() == 0 || !is_hidden(e.path()))
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().is_file())
                    .map(|e| e.into_path()),
            );
        } else {
            files.push(path.clone());
        }
    }
    files.sort();
    files
}

async fn add_files(engine: &RagEngine, paths: &[PathBuf], file_type: Option<&str>, meta: &Metadata) -> anyhow::Result<()> {
    let files = collect_files(paths);
    if files.is_empty() {
        bail!("no files found");
    }
    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files {msg}")?
            .progress_chars("#>-"),
    );
    let (mut chunks, mut failed) = (0usize, 0usize);
    for file in &files {
        pb.set_message(file.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default());
        match engine.add_file(file, Some(meta.clone()), file_type).await {
            Ok(n) => chunks += n,
            Err(e) => {
                failed += 1;
                tracing::warn!(path = %file.display(), error = %e, "skipping file");
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();
    println!("Added {} chunks from {} files ({} failed)", chunks, files.len() - failed, failed);
    Ok(())
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

async fn open_engine(config: &Config, cli: &Cli) -> anyhow::Result<RagEngine> {
    let mut settings = config.settings()?;
    if let Some(name) = &cli.collection {
        settings.collection_name = name.clone();
    }
    if let Some(dir) = &cli.persist_dir {
        settings.persist_directory = Some(dir.clone());
    }
    if settings.persist_directory.is_none() {
        tracing::warn!("no persist directory configured; the collection will not outlive this process");
    }
    let engine = RagEngine::from_settings(&settings)
        .await
        .with_context(|| format!("opening collection '{}'", settings.collection_name))?;
    Ok(engine)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load().context("loading configuration")?;
    let engine = open_engine(&config, &cli).await?;

    match &cli.command {
        Command::Add { paths, file_type, meta } => {
            let meta: Metadata = meta.iter().cloned().collect();
            add_files(&engine, paths, file_type.as_deref(), &meta).await?;
        }
        Command::AddText { texts, split_type } => {
            let split_type: SplitType = split_type.parse()?;
            let n = engine.add_texts(texts, None, split_type).await?;
            println!("Added {} chunks", n);
        }
        Command::Query { text, top_k, where_, where_document } => {
            let top_k = top_k.unwrap_or_else(|| engine.default_top_k());
            for result in engine.query(text, top_k, where_.as_ref(), where_document.as_ref()).await? {
                print_json(&result)?;
            }
        }
        Command::Info => {
            let info = engine.get_info().await.unwrap_or_else(|e| {
                tracing::warn!(error = %e, "could not read collection info");
                CollectionInfo::unknown()
            });
            print_json(&info)?;
        }
        Command::Delete { where_, where_document } => {
            if where_.is_none() && where_document.is_none() {
                bail!("delete needs --where and/or --where-document; use `reset` to clear the collection");
            }
            let n = engine.delete(where_.as_ref(), where_document.as_ref()).await?;
            println!("Deleted {} chunks", n);
        }
        Command::Reset => {
            engine.reset().await?;
            println!("Collection '{}' cleared", engine.storage().name());
        }
    }
    Ok(())
}
