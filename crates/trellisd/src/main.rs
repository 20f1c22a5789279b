use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use trellis_config::ensure_config;
use trellis_core::similarity::SimilarityPolicy;
use trellis_store::SqliteCatalogStore;
use trellisd::OutputFormat;
use trellisd::rebuild::run_rebuild;
use trellisd::recommend::run_recommendation;
use trellisd::retrieve::retrieve;

#[derive(Debug, Parser)]
#[command(author, version, about = "Trellis catalog graph and recommendation daemon")]
struct Cli {
    #[arg(
        long,
        default_value = ".trellis",
        help = "Data directory holding the config file and catalog store"
    )]
    data_dir: PathBuf,

    #[arg(
        long,
        value_name = "CSV",
        help = "Rebuild the similarity graph from a catalog CSV and recompute ranks"
    )]
    rebuild: Option<PathBuf>,

    #[arg(
        long,
        conflicts_with = "rebuild",
        help = "Run retrieval for a free-text query and exit"
    )]
    query: Option<String>,

    #[arg(
        long,
        conflicts_with_all = ["rebuild", "query"],
        help = "Comma-separated product ids to blend into a recommendation pass"
    )]
    recommend: Option<String>,

    #[arg(
        long,
        requires = "rebuild",
        value_parser = parse_policy,
        help = "Similarity policy override: first_pass or gender_gated"
    )]
    policy: Option<SimilarityPolicy>,

    #[arg(
        long,
        requires = "rebuild",
        help = "Batch size override for graph construction"
    )]
    batch_size: Option<usize>,

    #[arg(
        long,
        default_value = "table",
        value_parser = parse_output_format,
        help = "Output format: table or json"
    )]
    output: OutputFormat,
}

fn main() -> Result<()> {
    init_tracing();
    run(Cli::parse())
}

fn run(cli: Cli) -> Result<()> {
    let mut config = ensure_config(&cli.data_dir).with_context(|| {
        format!(
            "failed to load or create config under {}",
            cli.data_dir.display()
        )
    })?;
    if let Some(policy) = cli.policy {
        config.build.policy = policy;
    }
    if let Some(batch_size) = cli.batch_size {
        config.build.batch_size = batch_size;
    }

    let store = SqliteCatalogStore::open(&cli.data_dir).with_context(|| {
        format!("failed to open catalog store under {}", cli.data_dir.display())
    })?;

    if let Some(catalog) = &cli.rebuild {
        let outcome = run_rebuild(&store, catalog, &config)?;
        match cli.output {
            OutputFormat::Table => println!(
                "rebuilt graph: {} products, {} edges, {} ranked",
                outcome.products, outcome.edges, outcome.ranked
            ),
            OutputFormat::Json => println!(
                "{}",
                serde_json::json!({
                    "products": outcome.products,
                    "edges": outcome.edges,
                    "ranked": outcome.ranked,
                })
            ),
        }
        return Ok(());
    }

    if let Some(utterance) = cli.query.as_deref() {
        let retrieval = retrieve(&store, utterance)?;
        match cli.output {
            OutputFormat::Table => print!("{}", retrieval.context),
            OutputFormat::Json => println!(
                "{}",
                serde_json::to_string_pretty(&retrieval)
                    .context("failed to serialize retrieval")?
            ),
        }
        return Ok(());
    }

    if let Some(raw_ids) = cli.recommend.as_deref() {
        let ai_ids: Vec<String> = raw_ids
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_owned)
            .collect();

        let recommendations = run_recommendation(&store, &ai_ids)?;
        match cli.output {
            OutputFormat::Table => {
                for product in &recommendations.products {
                    println!(
                        "{:<12} {:<40} {:<16} {:>9.2} {:>8.4} {}",
                        product.product_id,
                        product.name,
                        product.brand,
                        product.price,
                        product.pagerank,
                        product.recommendation.as_str(),
                    );
                }
                if let Some(metrics) = &recommendations.metrics {
                    println!(
                        "precision={:.3} recall={:.3} f1={:.3}",
                        metrics.precision, metrics.recall, metrics.f1_score
                    );
                }
            }
            OutputFormat::Json => println!(
                "{}",
                serde_json::to_string_pretty(&recommendations)
                    .context("failed to serialize recommendations")?
            ),
        }
        return Ok(());
    }

    bail!("nothing to do: pass --rebuild, --query or --recommend");
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn parse_policy(value: &str) -> Result<SimilarityPolicy, String> {
    value.parse()
}

fn parse_output_format(value: &str) -> Result<OutputFormat, String> {
    value.parse()
}
