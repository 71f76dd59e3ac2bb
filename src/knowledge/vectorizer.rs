use super::matching::SparseVector;
use crate::error::{RecommendError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

lazy_static! {
    static ref TOKEN: Regex = Regex::new(r"\b\w\w+\b").unwrap();
    static ref STOP_WORDS: HashSet<&'static str> = ENGLISH_STOP_WORDS.iter().copied().collect();
}

/// Lowercased word tokens of two or more characters, stop words removed.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    TOKEN
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|token| !STOP_WORDS.contains(token))
        .map(str::to_string)
        .collect()
}

/// Fitted TF-IDF term space.
///
/// Column indices follow lexicographic term order, so fitting the same
/// texts twice serializes to the same bytes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VocabularyModel {
    pub vocabulary: BTreeMap<String, u32>,
    pub idf: Vec<f32>,
    pub document_frequency: Vec<u32>,
    pub n_documents: usize,
}

impl VocabularyModel {
    pub fn fit<S: AsRef<str>>(texts: &[S]) -> Result<Self> {
        if texts.is_empty() {
            return Err(RecommendError::EmptyCorpus);
        }

        let mut df: BTreeMap<String, u32> = BTreeMap::new();
        for text in texts {
            let mut seen = tokenize(text.as_ref());
            seen.sort_unstable();
            seen.dedup();
            for term in seen {
                *df.entry(term).or_insert(0) += 1;
            }
        }
        if df.is_empty() {
            return Err(RecommendError::EmptyCorpus);
        }

        let n = texts.len();
        let mut vocabulary = BTreeMap::new();
        let mut idf = Vec::with_capacity(df.len());
        let mut document_frequency = Vec::with_capacity(df.len());
        for (column, (term, freq)) in df.into_iter().enumerate() {
            // smoothed: ln((1 + n) / (1 + df)) + 1
            let weight = ((1.0 + n as f64) / (1.0 + freq as f64)).ln() + 1.0;
            idf.push(weight as f32);
            document_frequency.push(freq);
            vocabulary.insert(term, column as u32);
        }
        debug!("vocabulary fitted: terms: {}, documents: {}", vocabulary.len(), n);

        Ok(Self {
            vocabulary,
            idf,
            document_frequency,
            n_documents: n,
        })
    }

    pub fn len(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vocabulary.is_empty()
    }

    /// Projects text into the fitted space; unknown terms are ignored.
    pub fn transform(&self, text: &str) -> SparseVector {
        let mut counts: HashMap<u32, u32> = HashMap::new();
        for token in tokenize(text) {
            if let Some(column) = self.vocabulary.get(&token) {
                *counts.entry(*column).or_insert(0) += 1;
            }
        }

        let mut weighted = counts
            .into_iter()
            .map(|(column, tf)| (column, tf as f64 * self.idf[column as usize] as f64))
            .collect::<Vec<_>>();
        weighted.sort_unstable_by_key(|(column, _)| *column);

        let norm = weighted.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        if norm == 0.0 {
            return SparseVector::default();
        }
        SparseVector {
            indices: weighted.iter().map(|(column, _)| *column).collect(),
            values: weighted.iter().map(|(_, w)| (w / norm) as f32).collect(),
        }
    }

    pub fn transform_all<S: AsRef<str>>(&self, texts: &[S]) -> Vec<SparseVector> {
        texts.iter().map(|t| self.transform(t.as_ref())).collect()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let model: Self = serde_json::from_slice(bytes)?;
        if model.idf.len() != model.vocabulary.len()
            || model.document_frequency.len() != model.vocabulary.len()
        {
            return Err(RecommendError::Corruption(format!(
                "vocabulary has {} terms but {} idf weights",
                model.vocabulary.len(),
                model.idf.len()
            )));
        }
        Ok(model)
    }
}

const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "about", "above", "across", "after", "afterwards", "again", "against", "all", "almost",
    "alone", "along", "already", "also", "although", "always", "am", "among", "amongst", "amoungst",
    "amount", "an", "and", "another", "any", "anyhow", "anyone", "anything", "anyway", "anywhere",
    "are", "around", "as", "at", "back", "be", "became", "because", "become", "becomes", "becoming",
    "been", "before", "beforehand", "behind", "being", "below", "beside", "besides", "between",
    "beyond", "bill", "both", "bottom", "but", "by", "call", "can", "cannot", "cant", "co", "con",
    "could", "couldnt", "cry", "de", "describe", "detail", "do", "done", "down", "due", "during",
    "each", "eg", "eight", "either", "eleven", "else", "elsewhere", "empty", "enough", "etc",
    "even", "ever", "every", "everyone", "everything", "everywhere", "except", "few", "fifteen",
    "fifty", "fill", "find", "fire", "first", "five", "for", "former", "formerly", "forty", "found",
    "four", "from", "front", "full", "further", "get", "give", "go", "had", "has", "hasnt", "have",
    "he", "hence", "her", "here", "hereafter", "hereby", "herein", "hereupon", "hers", "herself",
    "him", "himself", "his", "how", "however", "hundred", "i", "ie", "if", "in", "inc", "indeed",
    "interest", "into", "is", "it", "its", "itself", "keep", "last", "latter", "latterly", "least",
    "less", "ltd", "made", "many", "may", "me", "meanwhile", "might", "mill", "mine", "more",
    "moreover", "most", "mostly", "move", "much", "must", "my", "myself", "name", "namely",
    "neither", "never", "nevertheless", "next", "nine", "no", "nobody", "none", "noone", "nor",
    "not", "nothing", "now", "nowhere", "of", "off", "often", "on", "once", "one", "only", "onto",
    "or", "other", "others", "otherwise", "our", "ours", "ourselves", "out", "over", "own", "part",
    "per", "perhaps", "please", "put", "rather", "re", "same", "see", "seem", "seemed", "seeming",
    "seems", "serious", "several", "she", "should", "show", "side", "since", "sincere", "six",
    "sixty", "so", "some", "somehow", "someone", "something", "sometime", "sometimes", "somewhere",
    "still", "such", "system", "take", "ten", "than", "that", "the", "their", "them", "themselves",
    "then", "thence", "there", "thereafter", "thereby", "therefore", "therein", "thereupon",
    "these", "they", "thick", "thin", "third", "this", "those", "though", "three", "through",
    "throughout", "thru", "thus", "to", "together", "too", "top", "toward", "towards", "twelve",
    "twenty", "two", "un", "under", "until", "up", "upon", "us", "very", "via", "was", "we", "well",
    "were", "what", "whatever", "when", "whence", "whenever", "where", "whereafter", "whereas",
    "whereby", "wherein", "whereupon", "wherever", "whether", "which", "while", "whither", "who",
    "whoever", "whole", "whom", "whose", "why", "will", "with", "within", "without", "would", "yet",
    "you", "your", "yours", "yourself", "yourselves",
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::matching::cosine_similarity;

    fn corpus() -> Vec<&'static str> {
        vec!["Dragon Magic Quest", "Love and Heartbreak", "Space Robot Future"]
    }

    #[test]
    fn tokenizer_lowercases_and_drops_stop_words() {
        assert_eq!(
            tokenize("The Lord of the Rings: a Fellowship, I think"),
            vec!["lord", "rings", "fellowship", "think"]
        );
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn vocabulary_is_sorted() {
        let model = VocabularyModel::fit(&corpus()).unwrap();
        let terms = model.vocabulary.keys().cloned().collect::<Vec<_>>();
        assert_eq!(
            terms,
            vec!["dragon", "future", "heartbreak", "love", "magic", "quest", "robot", "space"]
        );
        assert_eq!(model.vocabulary["dragon"], 0);
        assert_eq!(model.n_documents, 3);
    }

    #[test]
    fn shared_terms_weigh_less() {
        let model = VocabularyModel::fit(&["red fox", "red hen", "blue jay"]).unwrap();
        let red = model.idf[model.vocabulary["red"] as usize];
        let fox = model.idf[model.vocabulary["fox"] as usize];
        assert!(red < fox);
        assert!((fox - ((4.0f64 / 2.0).ln() + 1.0) as f32).abs() < 1e-6);
        assert_eq!(model.document_frequency[model.vocabulary["red"] as usize], 2);
    }

    #[test]
    fn vectors_are_unit_length() {
        let model = VocabularyModel::fit(&corpus()).unwrap();
        for v in model.transform_all(&corpus()) {
            assert!((v.norm() - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn out_of_vocabulary_text_is_zero_vector() {
        let model = VocabularyModel::fit(&corpus()).unwrap();
        assert!(model.transform("submarine").is_zero());
        assert!(model.transform("the and of").is_zero());
    }

    #[test]
    fn interest_query_lands_on_matching_book() {
        let model = VocabularyModel::fit(&corpus()).unwrap();
        let vectors = model.transform_all(&corpus());
        let query = model.transform("dragon magic");
        let scores = vectors.iter().map(|v| cosine_similarity(&query, v)).collect::<Vec<_>>();
        assert!(scores[0] > 0.5);
        assert_eq!(scores[1], 0.0);
        assert_eq!(scores[2], 0.0);
    }

    #[test]
    fn empty_inputs_are_rejected() {
        let empty: Vec<String> = vec![];
        assert!(matches!(VocabularyModel::fit(&empty), Err(RecommendError::EmptyCorpus)));
        assert!(matches!(
            VocabularyModel::fit(&["the", "a of"]),
            Err(RecommendError::EmptyCorpus)
        ));
    }

    #[test]
    fn refit_and_reload_are_identical() {
        let a = VocabularyModel::fit(&corpus()).unwrap();
        let b = VocabularyModel::fit(&corpus()).unwrap();
        assert_eq!(a.to_bytes().unwrap(), b.to_bytes().unwrap());
        let reloaded = VocabularyModel::from_bytes(&a.to_bytes().unwrap()).unwrap();
        assert_eq!(reloaded, a);
        assert_eq!(reloaded.transform("space robot"), a.transform("space robot"));
    }
}
