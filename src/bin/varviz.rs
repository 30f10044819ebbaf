// Copyright (c) 2024-2025 Fulcrum Genomics LLC
// SPDX-License-Identifier: MIT

//! varviz CLI
//!
//! Map variants onto protein structures and annotate them from the command line.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::util::SubscriberInitExt;

use varviz::literature::LiteratureKey;
use varviz::pipeline::{AnalysisOptions, AnalysisRequest, AnalysisResult, Pipeline, PipelineBuilder, ProgressEvent};
use varviz::{ClearScope, GenomicVariant, PipelineConfig, SourceSet, VarvizError};

#[derive(Parser)]
#[command(name = "varviz")]
#[command(author, version, about = "Variant annotation and structure mapping")]
#[command(
    long_about = "Resolve a gene, map variants onto its protein structure and annotate them.

Examples:
  varviz analyze TP53 17:7577120:C:T
  varviz analyze TP53 -i variants.tsv --json
  varviz analyze TP53 17:7577120:C:T --offline --progress
  varviz cache clear --gene TP53
  varviz config -o .varviz.toml"
)]
struct Cli {
    /// Configuration file (default: search .varviz.toml, then ~/.config/varviz/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze variants in one gene
    Analyze {
        /// Gene symbol (e.g., TP53)
        gene: String,

        /// Variants as CHROM:POS:REF:ALT
        variants: Vec<String>,

        /// File of variants: CHROM:POS:REF:ALT per line, or VCF-style tab-separated columns
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Use the built-in fixtures instead of the public APIs
        #[arg(long)]
        offline: bool,

        #[arg(long)]
        no_literature: bool,

        #[arg(long)]
        no_structure: bool,

        #[arg(long)]
        no_conservation: bool,

        /// Variants per mapping chunk
        #[arg(long)]
        batch_size: Option<usize>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,

        /// Report progress on stderr
        #[arg(long)]
        progress: bool,
    },

    /// Inspect or clear the literature cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Generate a sample configuration file
    Config {
        /// Output path for configuration file
        #[arg(short, long, default_value = ".varviz.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Remove cached literature
    Clear {
        /// Only this gene
        #[arg(long, conflicts_with = "key")]
        gene: Option<String>,

        /// Only one key, as GENE or GENE:VARIANT (default search parameters)
        #[arg(long)]
        key: Option<String>,
    },
    /// Show cache counters
    Stats,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(&cli.log_level, cli.json_logs) {
        eprintln!("Error: {}", e);
        std::process::exit(2);
    }

    let code = match run(cli).await {
        Ok(()) => 0,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            1
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Analyze {
            gene,
            variants,
            input,
            offline,
            no_literature,
            no_structure,
            no_conservation,
            batch_size,
            json,
            progress,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let mut parsed = variants
                .iter()
                .map(|s| parse_variant(s))
                .collect::<Result<Vec<_>, _>>()?;
            if let Some(path) = input {
                parsed.extend(read_variants(&path)?);
            }
            if parsed.is_empty() {
                return Err("no variants given; pass CHROM:POS:REF:ALT or --input".into());
            }

            let options = AnalysisOptions {
                include_literature: !no_literature,
                include_structure: !no_structure,
                include_conservation: !no_conservation,
                batch_size: batch_size.unwrap_or(config.pipeline.batch_size),
            };
            let request = AnalysisRequest::new(gene, parsed).with_options(options);
            let pipeline = Arc::new(build_pipeline(&config, offline)?);

            let result = if progress {
                analyze_with_progress(&pipeline, request).await?
            } else {
                pipeline.analyze(request).await?
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_summary(&result);
            }
            Ok(())
        }
        Commands::Cache { action } => {
            let config = load_config(cli.config.as_deref())?;
            // The cache only needs the store; no upstream is contacted
            let pipeline = PipelineBuilder::configured(SourceSet::mock(), &config).build();
            match action {
                CacheAction::Clear { gene, key } => {
                    let scope = match (gene, key) {
                        (Some(gene), _) => ClearScope::Gene(gene),
                        (None, Some(key)) => ClearScope::Key(parse_key(&key, &config)),
                        (None, None) => ClearScope::All,
                    };
                    let report = pipeline.clear_cache(scope).await?;
                    println!("Removed {} cached literature entries", report.literature);
                }
                CacheAction::Stats => {
                    let stats = pipeline.cache_stats().await;
                    println!("{}", serde_json::to_string_pretty(&stats)?);
                }
            }
            Ok(())
        }
        Commands::Config { output, force } => config_command(&output, force),
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig, VarvizError> {
    let config = match path {
        Some(p) => PipelineConfig::from_file(p)?,
        None => PipelineConfig::load()?,
    };
    Ok(config)
}

fn build_pipeline(config: &PipelineConfig, offline: bool) -> Result<Pipeline, VarvizError> {
    if offline {
        info!("using built-in fixtures");
        Ok(PipelineBuilder::configured(SourceSet::mock(), config).build())
    } else {
        Ok(PipelineBuilder::from_config(config)?.build())
    }
}

async fn analyze_with_progress(
    pipeline: &Arc<Pipeline>,
    request: AnalysisRequest,
) -> Result<AnalysisResult, VarvizError> {
    let mut subscription = pipeline.analyze_with_progress(request);
    while let Some(event) = subscription.next().await {
        match event {
            ProgressEvent::StageFinished(stage) => eprintln!("[{}] done", stage),
            ProgressEvent::Mapped { done, total } => eprintln!("[mapping] {}/{}", done, total),
            ProgressEvent::Annotated { done, total } => eprintln!("[annotating] {}/{}", done, total),
            ProgressEvent::LiteratureReady { entries, .. } => {
                eprintln!("[mining_literature] {} publications", entries)
            }
            ProgressEvent::Completed(result) => return Ok(*result),
            ProgressEvent::Failed(err) => return Err(err),
        }
    }
    Err(VarvizError::Task {
        msg: "analysis ended without a result".to_string(),
    })
}

/// `17:7577120:C:T`, `chr17-7577120-C-T`
fn parse_variant(input: &str) -> Result<GenomicVariant, String> {
    let fields: Vec<&str> = input.trim().split([':', '-']).collect();
    let [chrom, pos, reference, alternate] = fields.as_slice() else {
        return Err(format!("expected CHROM:POS:REF:ALT, got '{}'", input));
    };
    let position = pos
        .parse::<i64>()
        .map_err(|e| format!("invalid position in '{}': {}", input, e))?;
    Ok(GenomicVariant::new(*chrom, position, *reference, *alternate))
}

fn read_variants(path: &Path) -> Result<Vec<GenomicVariant>, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(path)?;
    let mut variants = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let variant = if line.contains('\t') {
            // CHROM POS ID REF ALT
            let cols: Vec<&str> = line.split('\t').collect();
            if cols.len() < 5 {
                return Err(format!("expected at least 5 columns: '{}'", line).into());
            }
            parse_variant(&format!("{}:{}:{}:{}", cols[0], cols[1], cols[3], cols[4]))?
        } else {
            parse_variant(line)?
        };
        variants.push(variant);
    }
    Ok(variants)
}

fn parse_key(key: &str, config: &PipelineConfig) -> LiteratureKey {
    let (gene, variant) = match key.split_once(':') {
        Some((g, v)) => (g, Some(v)),
        None => (key, None),
    };
    LiteratureKey::new(gene, variant, &config.literature.search_params())
}

fn print_summary(result: &AnalysisResult) {
    let gene = &result.gene;
    println!(
        "{}  {}  {}  structure: {}",
        gene.symbol,
        gene.transcript.id,
        gene.uniprot,
        gene.structure_ref()
            .map(|s| format!("{} {} ({} residues)", s.kind, s.identifier, s.residue_count))
            .unwrap_or_else(|| "none".to_string())
    );
    println!();
    for v in &result.variants {
        let protein = v
            .protein_change
            .as_ref()
            .map(|p| p.hgvs_p())
            .unwrap_or_else(|| "-".to_string());
        let status = match (&v.unmapped, &v.coordinate) {
            (Some(reason), _) => reason.to_string(),
            (None, Some(c)) => format!("({:.1}, {:.1}, {:.1})", c.x, c.y, c.z),
            (None, None) => "-".to_string(),
        };
        let call = v
            .annotation
            .as_ref()
            .and_then(|a| a.pathogenicity)
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>4}  {:<24} {:<16} {:<32} {}",
            v.index,
            v.hgvs_g.as_deref().unwrap_or(&v.variant.to_string()),
            protein,
            status,
            call
        );
    }
    println!();
    println!(
        "Literature: {} publications ({:?})",
        result.literature.len(),
        result.literature_status
    );
    for entry in result.literature.iter().take(5) {
        println!(
            "  [{}] {} ({})",
            entry.pmid.as_deref().unwrap_or("-"),
            entry.title,
            entry.year.map(|y| y.to_string()).unwrap_or_default()
        );
    }
}

fn config_command(output_path: &Path, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    if output_path.exists() && !force {
        return Err(format!(
            "configuration file already exists: {} (use --force to overwrite)",
            output_path.display()
        )
        .into());
    }
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    PipelineConfig::default().to_file(output_path)?;
    println!("Sample configuration file created: {}", output_path.display());
    Ok(())
}

fn init_tracing(level: &str, json_logs: bool) -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| format!("Invalid log level '{}': {}", level, e))?;

    // Logs go to stderr so JSON results on stdout stay parseable
    let (plain, json) = if json_logs {
        (None, Some(fmt::layer().json().with_writer(std::io::stderr)))
    } else {
        (Some(fmt::layer().with_writer(std::io::stderr)), None)
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(plain)
        .with(json)
        .init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_variant() {
        let v = parse_variant("17:7577120:C:T").unwrap();
        assert_eq!(v, GenomicVariant::new("17", 7577120, "C", "T"));
        let v = parse_variant("chr17-7577120-C-T").unwrap();
        assert_eq!(v.chromosome, "chr17");
        assert!(parse_variant("17:7577120:C").is_err());
        assert!(parse_variant("17:abc:C:T").is_err());
    }

    #[test]
    fn test_parse_key() {
        let config = PipelineConfig::default();
        let key = parse_key("tp53:R273H", &config);
        assert_eq!(key.gene, "TP53");
        assert_eq!(key.variant.as_deref(), Some("R273H"));
        assert!(parse_key("TP53", &config).variant.is_none());
    }
}
