//! gaapx CLI - US-GAAP taxonomy resolver

use anyhow::{Context, Result};
use clap::{Args, Parser as ClapParser, Subcommand};
use colored::*;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

use gaapx::taxonomy::DocumentStatus;
use gaapx::{
    BuildReport, DirectorySource, DocumentKind, ElementCatalog, Exporter, Taxonomy,
    TaxonomyBuilder, TaxonomyConfig,
};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Resolve the US-GAAP XBRL taxonomy into flat element tables
#[derive(ClapParser)]
#[command(name = "gaapx")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// Taxonomy base URL, `{year}` is substituted
    #[arg(long, conflicts_with = "source_dir")]
    base_url: Option<String>,

    /// Read documents from a local copy of the taxonomy instead
    #[arg(long)]
    source_dir: Option<PathBuf>,

    /// Taxonomy year
    #[arg(short, long)]
    year: Option<u16>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the taxonomy and export the element and hierarchy tables
    Build {
        #[command(flatten)]
        source: SourceArgs,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,

        /// Also write JSON output and a build summary
        #[arg(short, long)]
        json: bool,
    },

    /// Build the taxonomy and print statistics
    Stats {
        #[command(flatten)]
        source: SourceArgs,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Look up fact tags in an exported element table
    Lookup {
        /// Element or trimmed CSV written by `build`
        #[arg(long)]
        catalog: PathBuf,

        /// Tags, bare or prefixed (us-gaap:Assets)
        #[arg(required = true)]
        tags: Vec<String>,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

impl SourceArgs {
    fn config(&self) -> Result<TaxonomyConfig> {
        let mut config = match &self.config {
            Some(path) => TaxonomyConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => TaxonomyConfig::default(),
        };
        if let Some(base_url) = &self.base_url {
            config = config.with_base_url(base_url.as_str());
        }
        if let Some(year) = self.year {
            config = config.with_year(year);
        }
        if let Some(secs) = self.timeout {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    fn build(&self) -> Result<(Taxonomy, BuildReport)> {
        let config = self.config()?;
        let built = match &self.source_dir {
            Some(dir) => TaxonomyBuilder::new(config, DirectorySource::new(dir)).build(),
            None => TaxonomyBuilder::from_config(config)
                .context("Failed to set up HTTP client")?
                .build(),
        };
        Ok(built)
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "gaapx=debug" } else { "gaapx=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.parse()?))
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn print_report(taxonomy: &Taxonomy, report: &BuildReport, elapsed: Duration) {
    for outcome in &report.documents {
        match (&outcome.status, &outcome.location) {
            (DocumentStatus::Parsed, Some(location)) => {
                println!("{} {:<12} {}", "✓".green().bold(), outcome.kind, location);
            }
            (DocumentStatus::Failed(reason), location) => {
                println!(
                    "{} {:<12} {} ({})",
                    "✗".red().bold(),
                    outcome.kind,
                    location.as_deref().unwrap_or("-"),
                    reason
                );
            }
            _ => {
                println!(
                    "{} {:<12} {}",
                    "-".dimmed(),
                    outcome.kind,
                    outcome.candidates.join(", ").dimmed()
                );
            }
        }
    }

    println!("  Elements: {}", taxonomy.len());
    for kind in DocumentKind::LINKBASES {
        println!("  {:<13} {}", format!("{}:", kind), report.contributions(kind));
    }
    println!("  Classified: {}", report.classified_elements);
    println!("  Time: {:.2}ms", elapsed.as_secs_f64() * 1000.0);
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    match cli.command {
        Commands::Build {
            source,
            out_dir,
            json,
        } => {
            let start = Instant::now();
            let (taxonomy, report) = source.build()?;
            print_report(&taxonomy, &report, start.elapsed());

            if taxonomy.is_empty() {
                println!("{} no elements resolved, nothing exported", "✗".red().bold());
                std::process::exit(1);
            }

            let written = Exporter::new(&out_dir, report.year)
                .with_json(json)
                .export(&taxonomy, Some(&report))
                .with_context(|| format!("Failed to export to {}", out_dir.display()))?;
            for path in written {
                println!("{} {}", "→".cyan(), path.display());
            }
        }

        Commands::Stats { source, json } => {
            let (taxonomy, _) = source.build()?;
            let stats = taxonomy.stats();

            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("  Elements: {}", stats.total_elements);
                println!("  Roots: {}", stats.root_elements);
                println!("  Leaves: {}", stats.leaf_elements);
                println!("  Abstract: {}", stats.abstract_elements);
                println!("  Hierarchy edges: {}", stats.hierarchy_relationships);
                println!("  Calculation edges: {}", stats.calculation_relationships);
                println!("  Labelled: {}", stats.labelled_elements);
                println!("  Referenced: {}", stats.referenced_elements);
                for (statement, count) in &stats.statements {
                    println!("    {}: {}", statement, count);
                }
            }
        }

        Commands::Lookup {
            catalog,
            tags,
            json,
        } => {
            let catalog = ElementCatalog::from_csv_path(&catalog)
                .with_context(|| format!("Failed to read catalog {}", catalog.display()))?;

            if json {
                let found: BTreeMap<&str, _> = tags
                    .iter()
                    .map(|tag| (tag.as_str(), catalog.lookup(tag)))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&found)?);
                return Ok(());
            }

            for tag in &tags {
                if !catalog.contains(tag) {
                    println!("{} {} - not in catalog", "✗".red().bold(), tag);
                    continue;
                }
                let enrichment = catalog.lookup(tag);
                println!("{} {}", "✓".green().bold(), tag);
                println!(
                    "  Label: {}",
                    enrichment.standard_label.as_deref().unwrap_or("-")
                );
                println!(
                    "  Statement: {}",
                    enrichment
                        .financial_statement
                        .map(|s| s.as_str())
                        .unwrap_or("-")
                );
                if let Some(documentation) = &enrichment.documentation {
                    println!("  Documentation: {}", documentation);
                }
            }
        }
    }

    Ok(())
}
