use super::corpus_digest;
use super::matching::{
    cosine_similarity, match_top_n, similarity_row, SimilarityMatrix, SparseVector,
};
use super::vectorizer::VocabularyModel;
use crate::catalog::profile::{build_profiles, BookProfile};
use crate::catalog::RawCatalog;
use crate::error::{RecommendError, Result};
use serde::Serialize;
use std::borrow::Cow;
use std::time::Instant;

/// Durable derived state of one build.
#[derive(Clone, Debug)]
pub struct Artifacts {
    pub profiles: Vec<BookProfile>,
    pub model: VocabularyModel,
    /// `None` when the corpus is too large to precompute
    pub matrix: Option<SimilarityMatrix>,
    pub digest: String,
}

/// Raw tables -> profiles -> vocabulary -> similarity matrix.
pub fn build_artifacts(
    raw: &RawCatalog,
    top_n_tags: usize,
    max_matrix_books: usize,
) -> Result<Artifacts> {
    let start = Instant::now();
    let build = build_profiles(&raw.books, &raw.tags, &raw.book_tags, top_n_tags);
    let elapsed = start.elapsed().as_secs_f64();
    info!(
        "build {} profiles spends {}s, dropped usage records: {}",
        build.profiles.len(),
        elapsed,
        build.dropped.len()
    );
    artifacts_from_profiles(build.profiles, max_matrix_books)
}

pub fn artifacts_from_profiles(
    profiles: Vec<BookProfile>,
    max_matrix_books: usize,
) -> Result<Artifacts> {
    let texts = profiles
        .iter()
        .map(|p| p.profile_text.as_str())
        .collect::<Vec<_>>();

    let start = Instant::now();
    let model = VocabularyModel::fit(&texts)?;
    let vectors = model.transform_all(&texts);
    let elapsed = start.elapsed().as_secs_f64();
    info!("fit vocabulary of {} terms spends {}s", model.len(), elapsed);

    let matrix = if profiles.len() <= max_matrix_books {
        let start = Instant::now();
        let matrix = SimilarityMatrix::build(&vectors);
        let elapsed = start.elapsed().as_secs_f64();
        info!("similarity matrix {}x{} spends {}s", matrix.dim(), matrix.dim(), elapsed);
        Some(matrix)
    } else {
        info!(
            "corpus of {} exceeds {}, similarity rows computed on demand",
            profiles.len(),
            max_matrix_books
        );
        None
    };

    let digest = corpus_digest(&profiles);
    Ok(Artifacts {
        profiles,
        model,
        matrix,
        digest,
    })
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Recommendation {
    pub index: usize,
    pub score: f32,
    pub profile: BookProfile,
}

/// Read-only query side over one loaded generation.
pub struct Recommender {
    profiles: Vec<BookProfile>,
    model: VocabularyModel,
    vectors: Vec<SparseVector>,
    matrix: Option<SimilarityMatrix>,
}

impl Recommender {
    pub fn new(
        profiles: Vec<BookProfile>,
        model: VocabularyModel,
        matrix: Option<SimilarityMatrix>,
    ) -> Result<Self> {
        if profiles.is_empty() {
            return Err(RecommendError::EmptyCorpus);
        }
        if let Some(matrix) = &matrix {
            if matrix.dim() != profiles.len() {
                return Err(RecommendError::Corruption(format!(
                    "matrix dim {} does not match {} profiles",
                    matrix.dim(),
                    profiles.len()
                )));
            }
        }
        let vectors = profiles
            .iter()
            .map(|p| model.transform(&p.profile_text))
            .collect();
        Ok(Self {
            profiles,
            model,
            vectors,
            matrix,
        })
    }

    pub fn from_artifacts(artifacts: Artifacts) -> Result<Self> {
        Self::new(artifacts.profiles, artifacts.model, artifacts.matrix)
    }

    pub fn profiles(&self) -> &[BookProfile] {
        &self.profiles
    }

    pub fn is_precomputed(&self) -> bool {
        self.matrix.is_some()
    }

    /// Exact, case-sensitive; first match in corpus order.
    pub fn book_index_of(&self, title: &str) -> Result<usize> {
        self.profiles
            .iter()
            .position(|p| p.title == title)
            .ok_or_else(|| RecommendError::BookNotFound(title.to_string()))
    }

    pub fn recommend_by_book(&self, title: &str, top_n: usize) -> Result<Vec<Recommendation>> {
        check_top_n(top_n)?;
        let index = self.book_index_of(title)?;
        let row = match &self.matrix {
            Some(matrix) => Cow::Borrowed(matrix.row(index)),
            None => Cow::Owned(similarity_row(&self.vectors, index)),
        };
        let result = self.collect(&row, Some(index), top_n);
        debug!("by book: {} -> {} results", title, result.len());
        Ok(result)
    }

    /// Free-text search; the best hit is kept even when it is an exact match.
    pub fn recommend_by_text(&self, query: &str, top_n: usize) -> Result<Vec<Recommendation>> {
        check_top_n(top_n)?;
        if query.trim().is_empty() {
            return Err(RecommendError::EmptyQuery);
        }
        let vector = self.model.transform(query);
        if vector.is_zero() {
            debug!("query {:?} has no known terms", query);
        }
        let scores = self
            .vectors
            .iter()
            .map(|v| cosine_similarity(&vector, v))
            .collect::<Vec<_>>();
        let result = self.collect(&scores, None, top_n);
        debug!("by text: {:?} -> {} results", query, result.len());
        Ok(result)
    }

    fn collect(&self, scores: &[f32], exclude: Option<usize>, top_n: usize) -> Vec<Recommendation> {
        match_top_n(scores, exclude, top_n)
            .into_iter()
            .map(|m| Recommendation {
                index: m.index,
                score: m.similarity,
                profile: self.profiles[m.index].clone(),
            })
            .collect()
    }
}

fn check_top_n(top_n: usize) -> Result<()> {
    if top_n == 0 {
        return Err(RecommendError::InvalidTopN(top_n));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogRecord, TagUsageRecord, TagVocabularyEntry};

    fn profile(book_id: u64, title: &str, text: &str) -> BookProfile {
        BookProfile {
            book_id,
            title: title.to_string(),
            authors: String::new(),
            profile_text: text.to_string(),
        }
    }

    fn corpus() -> Vec<BookProfile> {
        vec![
            profile(1, "A", "Dragon Magic Quest"),
            profile(2, "B", "Love and Heartbreak"),
            profile(3, "C", "Space Robot Future"),
        ]
    }

    fn recommender(profiles: Vec<BookProfile>, max_matrix_books: usize) -> Recommender {
        Recommender::from_artifacts(artifacts_from_profiles(profiles, max_matrix_books).unwrap())
            .unwrap()
    }

    #[test]
    fn interests_rank_matching_book_first() {
        let rec = recommender(corpus(), 100);
        let result = rec.recommend_by_text("dragon magic", 5).unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(result[0].profile.title, "A");
        assert!(result[0].score > 0.0);
    }

    #[test]
    fn by_book_never_returns_itself() {
        let rec = recommender(corpus(), 100);
        let result = rec.recommend_by_book("A", 5).unwrap();
        assert_eq!(result.len(), 2);
        assert!(result.iter().all(|r| r.index != 0));
        // all scores zero: corpus order
        assert_eq!(result[0].index, 1);
        assert_eq!(result[1].index, 2);
    }

    #[test]
    fn exact_profile_text_is_its_own_best_hit() {
        let rec = recommender(corpus(), 100);
        let result = rec.recommend_by_text("Space Robot Future", 1).unwrap();
        assert_eq!(result[0].index, 2);
        assert!((result[0].score - 1.0).abs() < 1e-5);
    }

    #[test]
    fn scores_are_non_increasing() {
        let profiles = vec![
            profile(1, "Dune", "dune desert spice sand worm"),
            profile(2, "Dune Messiah", "dune desert spice emperor"),
            profile(3, "Arrakis", "desert planet"),
            profile(4, "Emma", "romance regency"),
        ];
        let rec = recommender(profiles, 100);
        let result = rec.recommend_by_book("Dune", 10).unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(result[0].profile.title, "Dune Messiah");
        assert!(result.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn on_demand_mode_matches_precomputed() {
        let profiles = vec![
            profile(1, "Dune", "dune desert spice sand worm"),
            profile(2, "Dune Messiah", "dune desert spice emperor"),
            profile(3, "Arrakis", "desert planet"),
            profile(4, "Emma", "romance regency"),
        ];
        let precomputed = recommender(profiles.clone(), 100);
        let on_demand = recommender(profiles, 2);
        assert!(precomputed.is_precomputed());
        assert!(!on_demand.is_precomputed());
        for title in ["Dune", "Arrakis", "Emma"] {
            assert_eq!(
                precomputed.recommend_by_book(title, 3).unwrap(),
                on_demand.recommend_by_book(title, 3).unwrap()
            );
        }
    }

    #[test]
    fn title_lookup_is_exact_and_first_wins() {
        let profiles = vec![
            profile(1, "Twin", "first twin"),
            profile(2, "Twin", "second twin"),
            profile(3, "Other", "other"),
        ];
        let rec = recommender(profiles, 100);
        assert_eq!(rec.book_index_of("Twin").unwrap(), 0);
        assert!(matches!(rec.book_index_of("twin"), Err(RecommendError::BookNotFound(_))));
        assert!(matches!(
            rec.recommend_by_book("Missing", 5),
            Err(RecommendError::BookNotFound(_))
        ));
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let rec = recommender(corpus(), 100);
        assert!(matches!(rec.recommend_by_text("  ", 5), Err(RecommendError::EmptyQuery)));
        assert!(matches!(rec.recommend_by_text("dragon", 0), Err(RecommendError::InvalidTopN(0))));
        assert!(matches!(rec.recommend_by_book("A", 0), Err(RecommendError::InvalidTopN(0))));
    }

    #[test]
    fn stop_word_query_scores_zero_in_corpus_order() {
        let rec = recommender(corpus(), 100);
        let result = rec.recommend_by_text("the and of", 2).unwrap();
        assert_eq!(result.iter().map(|r| r.index).collect::<Vec<_>>(), vec![0, 1]);
        assert!(result.iter().all(|r| r.score == 0.0));
    }

    #[test]
    fn builds_from_raw_tables() {
        let raw = RawCatalog {
            books: vec![
                CatalogRecord {
                    book_id: 1,
                    best_book_id: Some(10),
                    title: Some("Dune".to_string()),
                    authors: Some("Frank Herbert".to_string()),
                    ..Default::default()
                },
                CatalogRecord {
                    book_id: 2,
                    best_book_id: Some(20),
                    title: Some("Hyperion".to_string()),
                    authors: Some("Dan Simmons".to_string()),
                    ..Default::default()
                },
            ],
            tags: vec![TagVocabularyEntry {
                tag_id: 7,
                tag_name: "science-fiction".to_string(),
            }],
            book_tags: vec![
                TagUsageRecord { goodreads_book_id: 10, tag_id: 7, count: Some(5) },
                TagUsageRecord { goodreads_book_id: 20, tag_id: 7, count: Some(3) },
                TagUsageRecord { goodreads_book_id: 20, tag_id: 99, count: Some(1) },
            ],
        };
        let artifacts = build_artifacts(&raw, 1000, 100).unwrap();
        assert_eq!(artifacts.profiles.len(), 2);
        assert_eq!(artifacts.matrix.as_ref().unwrap().dim(), 2);
        assert!(artifacts.matrix.as_ref().unwrap().get(0, 1) > 0.0);
        assert_eq!(artifacts.digest.len(), 64);
    }

    #[test]
    fn empty_catalog_is_empty_corpus() {
        let raw = RawCatalog::default();
        assert!(matches!(
            build_artifacts(&raw, 1000, 100),
            Err(RecommendError::EmptyCorpus)
        ));
    }
}
