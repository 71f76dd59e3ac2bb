use anyhow::{Context, Result};
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_TOP_N_TAGS: usize = 1000;
pub const DEFAULT_TOP_N: usize = 5;
pub const DEFAULT_MAX_MATRIX_BOOKS: usize = 20_000;
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Clone, Debug)]
pub struct Config {
    pub books_csv: PathBuf,
    pub tags_csv: PathBuf,
    pub book_tags_csv: PathBuf,
    pub storage_dir: PathBuf,
    pub top_n_tags: usize,
    /// corpora larger than this skip the precomputed matrix
    pub max_matrix_books: usize,
    pub default_top_n: usize,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            books_csv: PathBuf::from("./data/books.csv"),
            tags_csv: PathBuf::from("./data/tags.csv"),
            book_tags_csv: PathBuf::from("./data/book_tags.csv"),
            storage_dir: PathBuf::from("./storage"),
            top_n_tags: DEFAULT_TOP_N_TAGS,
            max_matrix_books: DEFAULT_MAX_MATRIX_BOOKS,
            default_top_n: DEFAULT_TOP_N,
            port: DEFAULT_PORT,
        }
    }
}

impl Config {
    /// Reads the process environment. Call `dotenv().ok()` first to pick up `.env`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let path = |key: &str, default: PathBuf| lookup(key).map(PathBuf::from).unwrap_or(default);

        let config = Self {
            books_csv: path("BOOKS_CSV", defaults.books_csv),
            tags_csv: path("TAGS_CSV", defaults.tags_csv),
            book_tags_csv: path("BOOK_TAGS_CSV", defaults.book_tags_csv),
            storage_dir: path("STORAGE_DIR", defaults.storage_dir),
            top_n_tags: parse_var(&lookup, "TOP_N_TAGS", defaults.top_n_tags)?,
            max_matrix_books: parse_var(&lookup, "MAX_MATRIX_BOOKS", defaults.max_matrix_books)?,
            default_top_n: parse_var(&lookup, "DEFAULT_TOP_N", defaults.default_top_n)?,
            port: parse_var(&lookup, "SERVER_PORT", defaults.port)?,
        };
        if config.default_top_n == 0 {
            anyhow::bail!("DEFAULT_TOP_N must be positive");
        }
        Ok(config)
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {}: {:?}", key, raw)),
        None => Ok(default),
    }
}
