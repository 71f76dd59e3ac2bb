use anyhow::Result;
use bookrec::api::routes;
use bookrec::catalog::profile::profiles_to_csv;
use bookrec::catalog::{load_books, RawCatalog};
use bookrec::config::Config;
use bookrec::knowledge::recommender::{build_artifacts, Recommender};
use bookrec::knowledge::storage::Storage;
use bookrec::shelf::Shelf;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use env_logger::Builder;
use log::LevelFilter;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

#[macro_use]
extern crate log;

#[derive(Parser)]
#[command(name = "bookrec", about = "Content-based book recommender")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build profiles, vocabulary and similarity artifacts from the CSV tables
    Build {
        #[arg(long)]
        books: Option<PathBuf>,
        #[arg(long)]
        tags: Option<PathBuf>,
        #[arg(long)]
        book_tags: Option<PathBuf>,
        #[arg(long)]
        top_n_tags: Option<usize>,
        /// also write the profile table to this CSV file
        #[arg(long)]
        profiles_out: Option<PathBuf>,
    },
    /// Serve recommendations over HTTP from the stored artifacts
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // read .env
    dotenv().ok();

    // init logger
    let log_level = std::env::var("RUST_LOG").unwrap_or_default();

    if log_level == "debug" {
        Builder::new()
            .filter(None, LevelFilter::Off)
            .filter(Some("bookrec::knowledge"), LevelFilter::Debug)
            .filter(Some("bookrec"), LevelFilter::Debug)
            .init();
    } else if log_level == "info" {
        Builder::new()
            .filter(None, LevelFilter::Off)
            .filter(Some("bookrec::knowledge"), LevelFilter::Info)
            .filter(Some("bookrec"), LevelFilter::Info)
            .init();
    } else {
        env_logger::init();
    }

    let cli = Cli::parse();
    let mut config = Config::from_env()?;

    match cli.command {
        Command::Build {
            books,
            tags,
            book_tags,
            top_n_tags,
            profiles_out,
        } => {
            config.books_csv = books.unwrap_or(config.books_csv);
            config.tags_csv = tags.unwrap_or(config.tags_csv);
            config.book_tags_csv = book_tags.unwrap_or(config.book_tags_csv);
            config.top_n_tags = top_n_tags.unwrap_or(config.top_n_tags);
            build(&config, profiles_out).await
        }
        Command::Serve { port } => {
            config.port = port.unwrap_or(config.port);
            serve(config).await
        }
    }
}

async fn build(config: &Config, profiles_out: Option<PathBuf>) -> Result<()> {
    let start = Instant::now();
    let raw = RawCatalog::load(&config.books_csv, &config.tags_csv, &config.book_tags_csv)?;
    let artifacts = build_artifacts(&raw, config.top_n_tags, config.max_matrix_books)?;

    if let Some(path) = profiles_out {
        tokio::fs::write(&path, profiles_to_csv(&artifacts.profiles)?).await?;
        info!("profiles written to {}", path.display());
    }

    let storage = Storage::open(&config.storage_dir)?;
    let generation = storage.store(&artifacts).await?;
    let elapsed = start.elapsed().as_secs_f64();
    info!(
        "build generation {} of {} books spends {}s",
        generation,
        artifacts.profiles.len(),
        elapsed
    );
    Ok(())
}

async fn serve(config: Config) -> Result<()> {
    let storage = Storage::open(&config.storage_dir)?;
    let artifacts = match storage.load().await? {
        Some(artifacts) => artifacts,
        None => anyhow::bail!(
            "no artifacts in {}, run `bookrec build` first",
            config.storage_dir.display()
        ),
    };
    let recommender = Recommender::from_artifacts(artifacts)?;

    // card metadata only, recommendations work without it
    let catalog = match load_books(&config.books_csv) {
        Ok(books) => books,
        Err(e) => {
            warn!("load {} failed, cards carry no metadata: {}", config.books_csv.display(), e);
            vec![]
        }
    };
    let shelf = Arc::new(Shelf::new(recommender, catalog));

    let routes = routes(shelf, config.default_top_n);

    info!("server running at port: {}", config.port);
    warp::serve(routes).run(([0, 0, 0, 0], config.port)).await;

    Ok(())
}
