pub mod matching;
pub mod recommender;
pub mod storage;
pub mod vectorizer;

use crate::catalog::profile::BookProfile;
use sha2::{Digest, Sha256};

/// Hex sha256 over the ordered profile texts, each length-prefixed.
pub fn corpus_digest(profiles: &[BookProfile]) -> String {
    let mut hasher = Sha256::new();
    for profile in profiles {
        hasher.update((profile.profile_text.len() as u64).to_be_bytes());
        hasher.update(profile.profile_text.as_bytes());
    }
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(text: &str) -> BookProfile {
        BookProfile {
            profile_text: text.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn digest_depends_on_order_and_boundaries() {
        let ab = corpus_digest(&[profile("a"), profile("b")]);
        assert_eq!(ab.len(), 64);
        assert_eq!(ab, corpus_digest(&[profile("a"), profile("b")]));
        assert_ne!(ab, corpus_digest(&[profile("b"), profile("a")]));
        assert_ne!(ab, corpus_digest(&[profile("ab"), profile("")]));
    }
}
