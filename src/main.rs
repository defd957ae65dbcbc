use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use relgraph::{config::LoweringConfig, cypher_to_sql, graph_catalog::load_mapping};
use validator::Validate;

/// relgraph - translate graph-pattern queries into SQL over mapped tables
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// YAML graph-to-table mapping
    #[arg(long, short = 's')]
    schema: PathBuf,

    /// Query text
    #[arg(long, short = 'q', conflicts_with = "query_file")]
    query: Option<String>,

    /// File holding the query text
    #[arg(long)]
    query_file: Option<PathBuf>,

    /// YAML translator configuration; environment variables are used otherwise
    #[arg(long)]
    config: Option<PathBuf>,

    /// Upper bound on union branches from ambiguous labels
    #[arg(long)]
    max_union_combinations: Option<usize>,

    /// Join union branches with `UNION ALL` (true) or `UNION` (false)
    #[arg(long)]
    union_all: Option<bool>,

    /// Prefix of generated subquery names
    #[arg(long)]
    subquery_prefix: Option<String>,

    /// Print a JSON object instead of bare SQL
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn lowering_config(&self) -> anyhow::Result<LoweringConfig> {
        let mut config = match &self.config {
            Some(path) => LoweringConfig::from_yaml_file(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?,
            None => LoweringConfig::from_env().context("reading configuration from environment")?,
        };

        // Flags override environment and file values
        if let Some(limit) = self.max_union_combinations {
            config.max_union_combinations = limit;
        }
        if let Some(union_all) = self.union_all {
            config.union_all = union_all;
        }
        if let Some(prefix) = &self.subquery_prefix {
            config.subquery_prefix = prefix.clone();
        }
        config.validate().context("invalid configuration")?;
        Ok(config)
    }

    fn query_text(&self) -> anyhow::Result<String> {
        match (&self.query, &self.query_file) {
            (Some(query), _) => Ok(query.clone()),
            (None, Some(path)) => std::fs::read_to_string(path)
                .with_context(|| format!("reading query from {}", path.display())),
            (None, None) => bail!("either --query or --query-file is required"),
        }
    }
}

fn main() -> anyhow::Result<()> {
    // .env is optional
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(e).context("loading .env");
        }
    }

    // Initialize logger - defaults to INFO level, can be overridden with RUST_LOG env var
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = cli.lowering_config()?;
    let schema = load_mapping(&cli.schema)
        .with_context(|| format!("loading mapping from {}", cli.schema.display()))?;
    let query = cli.query_text()?;

    log::debug!("Translating with {:?}", config);
    let sql = cypher_to_sql(&query, &schema, &config).context("translation failed")?;

    if cli.json {
        let output = serde_json::json!({
            "query": query.trim(),
            "sql": sql,
            "config": config,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", sql);
    }
    Ok(())
}
