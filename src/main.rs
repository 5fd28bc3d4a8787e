//! Command line search over the configured index partitions
//!
//! Read-only: it never opens a writer, so it can run next to a live
//! indexing service.

use anyhow::{Context, bail};
use std::sync::Arc;
use tracing_subscriber::{self, EnvFilter};
use wiki_search::config::Config;
use wiki_search::registry::FieldRegistry;
use wiki_search::search::{QueryBuilder, SearchEngine, SearchRequest, SearcherPool, split_list};

fn usage(program: &str) {
    eprintln!("Usage:");
    eprintln!(
        "  {} search <query> [--sort f1,-f2] [--wikis a,b] [--langs en,fr] [--limit n] [--dirs d1,d2]",
        program
    );
    eprintln!("  {} stats", program);
    eprintln!("\nPartitions come from WIKI_SEARCH_INDEX_DIRS unless --dirs is given.");
}

fn parse_search(args: &[String]) -> anyhow::Result<(SearchRequest, Option<String>)> {
    let Some(query) = args.first() else {
        bail!("missing query");
    };
    let mut request = SearchRequest::new(query.as_str());
    let mut dirs = None;

    let mut rest = args[1..].iter();
    while let Some(flag) = rest.next() {
        let value = rest
            .next()
            .with_context(|| format!("missing value for {}", flag))?;
        match flag.as_str() {
            "--sort" => request = request.with_sort(split_list(value)),
            "--wikis" => request = request.with_wikis(split_list(value)),
            "--langs" => request = request.with_languages(split_list(value)),
            "--limit" => {
                let limit = value
                    .parse()
                    .with_context(|| format!("invalid limit '{}'", value))?;
                request = request.with_limit(limit);
            }
            "--dirs" => dirs = Some(value.clone()),
            other => bail!("unknown option {}", other),
        }
    }
    Ok((request, dirs))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        usage(&args[0]);
        std::process::exit(1);
    }

    let config = Config::from_env();
    let pool = Arc::new(SearcherPool::new(config.index_dirs.clone(), config.analyzer()));

    match args[1].as_str() {
        "search" => {
            let (request, dirs) = match parse_search(&args[2..]) {
                Ok(parsed) => parsed,
                Err(e) => {
                    eprintln!("Error: {}\n", e);
                    usage(&args[0]);
                    std::process::exit(1);
                }
            };

            let engine = Arc::new(SearchEngine::new(pool, QueryBuilder::new(FieldRegistry::new())));
            let results = match dirs {
                Some(dirs) => engine.search_in_dirs(&request, &dirs)?,
                None => engine.search_async(request).await?,
            };

            tracing::info!("{} of {} hits", results.len(), results.total_hits);
            for hit in results.iter() {
                let line = serde_json::json!({
                    "rank": hit.rank,
                    "score": hit.score,
                    "id": hit.id,
                    "reference": hit.reference,
                    "language": hit.language,
                    "type": hit.doc_type,
                    "title": hit.field_text("title")?,
                    "partition": hit.partition.display().to_string(),
                });
                println!("{}", line);
            }
        }
        "stats" => {
            let set = pool.current();
            for (dir, count) in set.record_counts() {
                println!("{}\t{}", dir.display(), count);
            }
            let missing = config.index_dirs.len() - set.len();
            if missing > 0 {
                eprintln!("{} configured partitions could not be opened", missing);
            }
        }
        other => {
            eprintln!("Unknown command: {}\n", other);
            usage(&args[0]);
            std::process::exit(1);
        }
    }

    Ok(())
}
