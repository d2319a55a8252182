use anyhow::Result;
use catalog_core::{build_advanced, map_advanced, AdvancedParams, ProductDoc};
use catalog_engine::{wire, InMemoryEngine, SearchEngine};
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "catalog")]
#[command(about="Catalog search admin CLI", long_about=None)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Print the engine request body an advanced search would send.
    Plan(SearchArgs),
    /// Run an advanced search against a local product fixture.
    Search {
        /// Path to a JSON array of product documents.
        fixture: String,
        #[command(flatten)]
        args: SearchArgs,
    },
}

#[derive(Args)]
struct SearchArgs {
    #[arg(long)]
    search: Option<String>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    brand: Option<String>,
    #[arg(long)]
    min_price: Option<String>,
    #[arg(long)]
    max_price: Option<String>,
    /// Comma list of tags.
    #[arg(long)]
    tags: Option<String>,
    #[arg(long)]
    sort_by: Option<String>,
    #[arg(long)]
    sort_order: Option<String>,
    #[arg(long)]
    page: Option<String>,
    #[arg(long)]
    size: Option<String>,
}

impl SearchArgs {
    fn into_params(self) -> AdvancedParams {
        AdvancedParams {
            search: self.search,
            category: self.category,
            brand: self.brand,
            min_price: self.min_price,
            max_price: self.max_price,
            tags: self.tags,
            sort_by: self.sort_by,
            sort_order: self.sort_order,
            page: self.page,
            size: self.size,
        }
    }
}

fn read_fixture(path: &str) -> Result<Vec<ProductDoc>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Plan(args) => {
            let (tree, mods) = build_advanced(&args.into_params())?;
            let body = wire::search_body(&tree, &mods);
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Cmd::Search { fixture, args } => {
            let engine = InMemoryEngine::new();
            engine.load(read_fixture(&fixture)?);
            let (tree, mods) = build_advanced(&args.into_params())?;
            let page = mods.offset / mods.limit + 1;
            let size = mods.limit;
            let raw = engine.execute(&tree, &mods).await?;
            let env = map_advanced(&raw, page, size);
            println!("{}", serde_json::to_string_pretty(&env)?);
        }
    }
    Ok(())
}
