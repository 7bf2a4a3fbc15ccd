//! Command-line front end: load a catalog file and print a report.

use crate::config::StoreConfig;
use crate::core::{Material, MaterialType};
use crate::errors::{Result, StoreError};
use crate::infrastructure::logging::init_logging;
use crate::persistence::JsonFileRepository;
use crate::store::{CatalogStats, MaterialStore};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::debug;

const USAGE: &str = "Usage: material-store [OPTIONS] <catalog.json>\n\nOptions:\n  \
                     --config <file>  Load settings from this TOML file\n  \
                     --json           Print the report as JSON";

#[derive(Debug, Clone, PartialEq)]
pub struct CliConfig {
    pub catalog: PathBuf,
    pub config_path: Option<PathBuf>,
    pub json: bool,
}

/// What the command line asked for
#[derive(Debug, Clone, PartialEq)]
pub enum CliAction {
    Run(CliConfig),
    Help,
}

#[derive(Serialize)]
struct Report<'a> {
    stats: &'a CatalogStats,
    by_type: &'a BTreeMap<MaterialType, usize>,
    materials: Vec<&'a Material>,
}

pub struct Cli {
    config: CliConfig,
}

impl Cli {
    pub fn new(config: CliConfig) -> Self {
        Self { config }
    }

    pub fn run(&self) -> Result<()> {
        let settings = match &self.config.config_path {
            Some(path) => StoreConfig::load(path)?,
            None => StoreConfig::discover(),
        };
        let _guard = init_logging(settings.logging.to_log_config()?);

        let repository = JsonFileRepository::new(&self.config.catalog);
        let store = MaterialStore::from_repository(&repository)?;

        let stats = store.aggregate_stats()?;
        let by_type = store.count_by_type()?;
        let materials = store.sorted_all()?;

        if self.config.json {
            let report = Report {
                stats: &stats,
                by_type: &by_type,
                materials: materials.iter().map(|m| m.as_ref()).collect(),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print!("{}", render_text(&stats, &by_type, &materials));
        }

        debug!("\n{}", store.metrics().summary().report());
        store.close();
        Ok(())
    }
}

fn render_text(
    stats: &CatalogStats,
    by_type: &BTreeMap<MaterialType, usize>,
    materials: &[std::sync::Arc<Material>],
) -> String {
    let mut out = String::new();
    out.push_str(&format!("Materials:     {}\n", stats.count));
    out.push_str(&format!("Total value:   {:.2}\n", stats.total_value));
    out.push_str(&format!("Average price: {:.2}\n", stats.average_price));
    out.push_str(&format!("Median price:  {:.2}\n", stats.median_price));
    out.push_str(&format!(
        "Print / media: {} / {}\n",
        stats.print_count, stats.media_count
    ));
    for (kind, count) in by_type {
        out.push_str(&format!("  {:<10} {}\n", kind.as_str(), count));
    }
    out.push('\n');
    for material in materials {
        out.push_str(&format!("{}\n", material));
    }
    out
}

/// Parse arguments, `args[0]` being the program name.
pub fn parse_args(args: &[String]) -> Result<CliAction> {
    let mut catalog = None;
    let mut config_path = None;
    let mut json = false;
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--json" => json = true,
            "--config" => {
                i += 1;
                let path = args
                    .get(i)
                    .ok_or_else(|| StoreError::invalid_argument("--config requires an argument"))?;
                config_path = Some(PathBuf::from(path));
            }
            "-h" | "--help" => return Ok(CliAction::Help),
            arg if arg.starts_with("--") => {
                return Err(StoreError::invalid_argument(format!("unknown option: {}", arg)));
            }
            path => {
                if catalog.replace(PathBuf::from(path)).is_some() {
                    return Err(StoreError::invalid_argument("only one catalog file may be given"));
                }
            }
        }
        i += 1;
    }

    let catalog = catalog.ok_or_else(|| StoreError::invalid_argument(USAGE))?;
    Ok(CliAction::Run(CliConfig { catalog, config_path, json }))
}

/// Entry point for the binary
pub fn cli_main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    match parse_args(&args)? {
        CliAction::Run(config) => Cli::new(config).run(),
        CliAction::Help => {
            println!("{}", USAGE);
            Ok(())
        }
    }
}
