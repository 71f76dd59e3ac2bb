use crate::catalog::profile::BookProfile;
use crate::catalog::CatalogRecord;
use crate::error::{RecommendError, Result};
use crate::knowledge::recommender::{Recommendation, Recommender};
use serde::Serialize;
use std::collections::HashMap;
use url::Url;

const UNKNOWN_GENRE: &str = "Unknown";

// checked in order, first hit wins
const GENRES: &[(&[&str], &str)] = &[
    (&["love", "romance", "relationship", "heart"], "Romance"),
    (&["magic", "dragon", "fantasy", "wizard"], "Fantasy"),
    (&["murder", "crime", "detective", "mystery"], "Mystery"),
    (&["space", "alien", "future", "robot", "sci-fi"], "Science Fiction"),
    (&["history", "war", "past", "ancient"], "Historical"),
    (&["ghost", "horror", "haunted", "nightmare"], "Horror"),
    (&["life", "journey", "inspirational", "memoir"], "Biography / Memoir"),
];

/// Keyword lookup over the lowercased profile text, substring match.
pub fn infer_genre(profile_text: &str) -> &'static str {
    let text = profile_text.to_lowercase();
    GENRES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| text.contains(k)))
        .map(|(_, label)| *label)
        .unwrap_or(UNKNOWN_GENRE)
}

/// Average rating on a 0-5 scale as a percentage, one decimal.
pub fn percent_liked(average_rating: f32) -> f32 {
    let percent = average_rating as f64 / 5.0 * 100.0;
    ((percent * 10.0).round() / 10.0) as f32
}

/// Uppercases the first letter of every word, lowercases the rest.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for c in text.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

/// Web search link restricted to the store's site.
pub fn buy_link(title: &str, authors: &str) -> String {
    let query = format!("{} {} site:amazon.com", title_case(title.trim()), title_case(authors.trim()));
    match Url::parse_with_params("https://www.google.com/search", &[("q", query.as_str())]) {
        Ok(url) => url.to_string(),
        Err(e) => {
            warn!("build buy link for {} failed: {}", title, e);
            String::from("https://www.google.com/search")
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BookCard {
    pub book_id: u64,
    pub title: String,
    pub authors: String,
    pub image_url: Option<String>,
    pub percent_liked: Option<f32>,
    pub genre: String,
    pub buy_link: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

/// Presentation layer over the recommender and the catalog metadata.
pub struct Shelf {
    recommender: Recommender,
    books: HashMap<u64, CatalogRecord>,
}

impl Shelf {
    pub fn new(recommender: Recommender, catalog: Vec<CatalogRecord>) -> Self {
        let books = catalog.into_iter().map(|b| (b.book_id, b)).collect();
        Self { recommender, books }
    }

    pub fn recommender(&self) -> &Recommender {
        &self.recommender
    }

    /// Case-insensitive title lookup, first match in corpus order.
    ///
    /// A blank title is `EmptyQuery`, it never resolves to an untitled record.
    pub fn resolve_title(&self, title: &str) -> Result<&str> {
        let wanted = title.trim().to_lowercase();
        if wanted.is_empty() {
            return Err(RecommendError::EmptyQuery);
        }
        self.recommender
            .profiles()
            .iter()
            .find(|p| p.title.to_lowercase() == wanted)
            .map(|p| p.title.as_str())
            .ok_or_else(|| RecommendError::BookNotFound(title.to_string()))
    }

    pub fn by_book(&self, title: &str, top_n: usize) -> Result<Vec<BookCard>> {
        let resolved = self.resolve_title(title)?;
        let result = self.recommender.recommend_by_book(resolved, top_n)?;
        Ok(self.cards(result))
    }

    pub fn by_interests(&self, query: &str, top_n: usize) -> Result<Vec<BookCard>> {
        let result = self.recommender.recommend_by_text(query, top_n)?;
        Ok(self.cards(result))
    }

    pub fn all_books(&self) -> Vec<BookCard> {
        self.recommender
            .profiles()
            .iter()
            .map(|p| self.card(p, None))
            .collect()
    }

    /// Distinct titles containing `query`, ignoring case, in corpus order.
    pub fn suggest_titles(&self, query: &str, limit: usize) -> Vec<String> {
        let wanted = query.trim().to_lowercase();
        let mut titles: Vec<String> = Vec::new();
        for profile in self.recommender.profiles() {
            if titles.len() >= limit {
                break;
            }
            if profile.title.to_lowercase().contains(&wanted) && !titles.contains(&profile.title) {
                titles.push(profile.title.clone());
            }
        }
        titles
    }

    /// First book whose title contains `query`, ignoring case.
    pub fn find_for_purchase(&self, query: &str) -> Result<BookCard> {
        let wanted = query.trim().to_lowercase();
        if wanted.is_empty() {
            return Err(RecommendError::EmptyQuery);
        }
        self.recommender
            .profiles()
            .iter()
            .find(|p| p.title.to_lowercase().contains(&wanted))
            .map(|p| self.card(p, None))
            .ok_or_else(|| RecommendError::BookNotFound(query.to_string()))
    }

    /// Books whose title contains the first word of `query`, for a missed purchase search.
    pub fn purchase_suggestions(&self, query: &str, limit: usize) -> Vec<BookCard> {
        let first_word = match query.split_whitespace().next() {
            Some(word) => word.to_lowercase(),
            None => return vec![],
        };
        self.recommender
            .profiles()
            .iter()
            .filter(|p| p.title.to_lowercase().contains(&first_word))
            .take(limit)
            .map(|p| self.card(p, None))
            .collect()
    }

    fn cards(&self, result: Vec<Recommendation>) -> Vec<BookCard> {
        result
            .iter()
            .map(|r| self.card(&r.profile, Some(r.score)))
            .collect()
    }

    fn card(&self, profile: &BookProfile, score: Option<f32>) -> BookCard {
        let record = self.books.get(&profile.book_id);
        BookCard {
            book_id: profile.book_id,
            title: title_case(&profile.title),
            authors: title_case(&profile.authors),
            image_url: record.and_then(|r| r.image_url.clone()),
            percent_liked: record.and_then(|r| r.average_rating).map(percent_liked),
            genre: infer_genre(&profile.profile_text).to_string(),
            buy_link: buy_link(&profile.title, &profile.authors),
            score,
        }
    }
}
