//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `ladder_core` linkage.
//! - Convert MARC files to MODS from the command line.
//! - List the models each configured tenant gets.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ladder_core::{CatalogConfig, LegacyFormat, LegacyMapper, ModelRegistry, VocabularyRegistry};

#[derive(Parser, Debug)]
#[command(name = "ladder")]
#[command(about = "Ladder metadata catalog tools")]
#[command(version)]
struct Args {
    /// Catalog configuration file; enables file logging when it sets
    /// `[logging] dir`
    #[arg(short, long, env = "LADDER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print ping and version
    Ping,
    /// Print the MODS form of every record in a MARC file
    Marc {
        file: PathBuf,
        /// Read the file as MARCXML instead of binary MARC 21
        #[arg(long)]
        xml: bool,
    },
    /// Print the models defined for every tenant of the config
    Models,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => CatalogConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => CatalogConfig::default(),
    };
    if ladder_core::init_logging(&config.logging)
        .context("Failed to initialize logging")?
        .is_some()
    {
        ladder_core::log_catalog_start(&config);
    }

    match args.command.unwrap_or(Command::Ping) {
        Command::Ping => {
            println!("ladder_core ping={}", ladder_core::ping());
            println!("ladder_core version={}", ladder_core::core_version());
        }
        Command::Marc { file, xml } => {
            let bytes = std::fs::read(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let format = if xml {
                LegacyFormat::MarcXml
            } else {
                LegacyFormat::Marc21
            };
            let mods = LegacyMapper::new(format)
                .map_bytes(&bytes)
                .with_context(|| format!("Failed to map {}", file.display()))?;
            println!("{mods}");
        }
        Command::Models => print_models(&config),
    }
    Ok(())
}

fn print_models(config: &CatalogConfig) {
    let models = ModelRegistry::new(Arc::new(VocabularyRegistry::builtin()));
    for tenant in &config.tenants {
        for descriptor in models.define_tenant_models(tenant) {
            let prefixes: Vec<&str> = descriptor
                .bindings()
                .iter()
                .map(|binding| binding.prefix.as_str())
                .collect();
            println!(
                "{} vocabularies={} types={}",
                descriptor.key(),
                prefixes.join(","),
                descriptor.types().join(",")
            );
        }
    }
}
