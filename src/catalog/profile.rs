use super::{CatalogRecord, TagUsageRecord, TagVocabularyEntry};
use crate::error::{RecommendError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One comparable text profile per catalog record.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct BookProfile {
    pub book_id: u64,
    pub title: String,
    pub authors: String,
    pub profile_text: String,
}

#[derive(Clone, Debug, Default)]
pub struct ProfileBuild {
    pub profiles: Vec<BookProfile>,
    /// usage records dropped because their tag id is not in the vocabulary
    pub dropped: Vec<TagUsageRecord>,
}

/// Merges every catalog record with the names of its globally popular tags.
///
/// Usage rows whose tag id is unknown are dropped and reported, never fatal.
/// Tag names keep their usage-row order inside a profile. Popularity ties are
/// broken by first appearance in `tag_usage`.
pub fn build_profiles(
    catalog: &[CatalogRecord],
    tag_vocabulary: &[TagVocabularyEntry],
    tag_usage: &[TagUsageRecord],
    top_n_tags: usize,
) -> ProfileBuild {
    let names: HashMap<u64, &str> = tag_vocabulary
        .iter()
        .map(|t| (t.tag_id, t.tag_name.as_str()))
        .collect();

    // join usage -> tag name, keeping usage row order
    let mut dropped = Vec::new();
    let mut named: Vec<(u64, &str)> = Vec::with_capacity(tag_usage.len());
    for usage in tag_usage {
        match names.get(&usage.tag_id) {
            Some(name) => named.push((usage.goodreads_book_id, *name)),
            None => {
                let e = RecommendError::MissingJoinKey {
                    tag_id: usage.tag_id,
                    goodreads_book_id: usage.goodreads_book_id,
                };
                warn!("drop tag usage record: {}", e);
                dropped.push(usage.clone());
            }
        }
    }

    let popular = top_tag_names(&named, top_n_tags);
    debug!("top tags kept: {} of cap {}", popular.len(), top_n_tags);

    let mut tag_strings: HashMap<u64, String> = HashMap::new();
    for (book, name) in named.iter().filter(|(_, name)| popular.contains_key(name)) {
        let tag_string = tag_strings.entry(*book).or_default();
        if !tag_string.is_empty() {
            tag_string.push(' ');
        }
        tag_string.push_str(name);
    }

    let profiles = catalog
        .iter()
        .map(|record| {
            let title = record.title.as_deref().unwrap_or("").trim().to_string();
            let authors = record.authors.as_deref().unwrap_or("").trim().to_string();
            let tag_string = record
                .best_book_id
                .and_then(|id| tag_strings.get(&id))
                .map(String::as_str)
                .unwrap_or("");
            let profile_text = format!("{} {} {}", title, authors, tag_string);
            BookProfile {
                book_id: record.book_id,
                title,
                authors,
                profile_text,
            }
        })
        .collect::<Vec<_>>();

    if !dropped.is_empty() {
        warn!("{} tag usage records referenced unknown tag ids", dropped.len());
    }
    info!(
        "built {} profiles, {} books carry tags",
        profiles.len(),
        tag_strings.len()
    );

    ProfileBuild { profiles, dropped }
}

/// Tag names ranked by usage-record count, capped at `top_n`.
fn top_tag_names<'a>(named: &[(u64, &'a str)], top_n: usize) -> HashMap<&'a str, usize> {
    let mut counts: HashMap<&'a str, (usize, usize)> = HashMap::new();
    for (position, (_, name)) in named.iter().enumerate() {
        counts.entry(*name).or_insert((0, position)).0 += 1;
    }
    let mut ranked = counts.into_iter().collect::<Vec<_>>();
    ranked.sort_unstable_by(|(_, (ca, fa)), (_, (cb, fb))| cb.cmp(ca).then(fa.cmp(fb)));
    ranked
        .into_iter()
        .take(top_n)
        .map(|(name, (count, _))| (name, count))
        .collect()
}

/// Writes the profile table as `book_id,title,authors,profile_text`.
pub fn profiles_to_csv(profiles: &[BookProfile]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for profile in profiles {
        writer.serialize(profile)?;
    }
    writer
        .into_inner()
        .map_err(|e| RecommendError::Io(e.into_error()))
}

pub fn profiles_from_csv(bytes: &[u8]) -> Result<Vec<BookProfile>> {
    super::read_table(bytes)
}
