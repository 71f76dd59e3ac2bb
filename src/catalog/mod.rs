pub mod profile;

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::io::Read;
use std::path::Path;

// input tables, loaded read-only:
//
// books.csv     -> CatalogRecord      (book_id, best_book_id, title, authors, ...)
// tags.csv      -> TagVocabularyEntry (tag_id, tag_name)
// book_tags.csv -> TagUsageRecord     (goodreads_book_id, tag_id, count)
//
// unknown columns are ignored, passthrough numeric cells that fail to parse load as None

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct CatalogRecord {
    pub book_id: u64,
    /// representative edition, joined against `TagUsageRecord::goodreads_book_id`
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub best_book_id: Option<u64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub authors: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub average_rating: Option<f32>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub ratings_count: Option<u64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub original_publication_year: Option<f32>,
    #[serde(default)]
    pub language_code: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl Display for CatalogRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "CatalogRecord {{ book_id: {}, title: {}, authors: {} }}",
            self.book_id,
            self.title.as_deref().unwrap_or(""),
            self.authors.as_deref().unwrap_or("")
        )
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct TagVocabularyEntry {
    pub tag_id: u64,
    pub tag_name: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct TagUsageRecord {
    pub goodreads_book_id: u64,
    pub tag_id: u64,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub count: Option<i64>,
}

/// The three raw tables the profile builder consumes.
#[derive(Clone, Debug, Default)]
pub struct RawCatalog {
    pub books: Vec<CatalogRecord>,
    pub tags: Vec<TagVocabularyEntry>,
    pub book_tags: Vec<TagUsageRecord>,
}

impl RawCatalog {
    pub fn load(books: &Path, tags: &Path, book_tags: &Path) -> Result<Self> {
        let raw = Self {
            books: read_table(std::fs::File::open(books)?)?,
            tags: read_table(std::fs::File::open(tags)?)?,
            book_tags: read_table(std::fs::File::open(book_tags)?)?,
        };
        info!(
            "catalog loaded: books: {}, tags: {}, book_tags: {}",
            raw.books.len(),
            raw.tags.len(),
            raw.book_tags.len()
        );
        Ok(raw)
    }
}

pub fn load_books(path: &Path) -> Result<Vec<CatalogRecord>> {
    read_table(std::fs::File::open(path)?)
}

/// Deserializes every row of a headered CSV table.
pub fn read_table<T, R>(reader: R) -> Result<Vec<T>>
where
    T: for<'de> Deserialize<'de>,
    R: Read,
{
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(reader);
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn reads_books_with_missing_and_malformed_cells() {
        let data = "book_id,goodreads_book_id,best_book_id,authors,original_publication_year,title,language_code,average_rating,image_url\n\
                    1,2767052,2767052,Suzanne Collins,2008.0,The Hunger Games,eng,4.34,http://img/1.jpg\n\
                    2,3,,,n/a,,,oops,\n";
        let books: Vec<CatalogRecord> = read_table(data.as_bytes()).unwrap();
        assert_eq!(books.len(), 2);
        assert_eq!(books[0].best_book_id, Some(2767052));
        assert_eq!(books[0].title.as_deref(), Some("The Hunger Games"));
        assert_eq!(books[0].average_rating, Some(4.34));
        assert_eq!(books[1].best_book_id, None);
        assert_eq!(books[1].title, None);
        assert_eq!(books[1].average_rating, None);
        assert_eq!(books[1].original_publication_year, None);
    }

    #[test]
    fn loads_all_three_tables_from_disk() {
        let mut books = NamedTempFile::new().unwrap();
        writeln!(books, "book_id,best_book_id,title,authors").unwrap();
        writeln!(books, "1,10,Dune,Frank Herbert").unwrap();
        let mut tags = NamedTempFile::new().unwrap();
        writeln!(tags, "tag_id,tag_name").unwrap();
        writeln!(tags, "7,sci-fi").unwrap();
        let mut book_tags = NamedTempFile::new().unwrap();
        writeln!(book_tags, "goodreads_book_id,tag_id,count").unwrap();
        writeln!(book_tags, "10,7,120").unwrap();

        let raw = RawCatalog::load(books.path(), tags.path(), book_tags.path()).unwrap();
        assert_eq!(raw.books.len(), 1);
        assert_eq!(raw.tags[0].tag_name, "sci-fi");
        assert_eq!(raw.book_tags[0].count, Some(120));
    }

    #[test]
    fn bad_usage_counts_do_not_reject_the_table() {
        let data = "goodreads_book_id,tag_id,count\n1,7,120\n1,8,-1\n2,7,lots\n2,8,\n";
        let usage: Vec<TagUsageRecord> = read_table(data.as_bytes()).unwrap();
        assert_eq!(usage.len(), 4);
        assert_eq!(usage[0].count, Some(120));
        assert_eq!(usage[1].count, Some(-1));
        assert_eq!(usage[2].count, None);
        assert_eq!(usage[3].count, None);
        assert_eq!(usage[2].tag_id, 7);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_books(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, crate::error::RecommendError::Io(_)));
    }
}
