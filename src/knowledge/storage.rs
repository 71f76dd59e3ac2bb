// storage protocol:
// current            -> generation g currently served, u64 big-endian
// [g]/profiles.csv   -> book_id,title,authors,profile_text in corpus order
// [g]/vocabulary.json -> serialized VocabularyModel
// [g]/mode           -> "precomputed" | "on-demand"
// [g]/matrix_dim     -> matrix dimension, u64 big-endian (precomputed only)
// [g]/matrix         -> f32 little-endian row-major (precomputed only)
// [g]/digest         -> hex sha256 of the ordered profile texts
//
// a build writes a whole new generation first and flips `current` last,
// so readers only ever see complete generations

use super::corpus_digest;
use super::matching::SimilarityMatrix;
use super::recommender::Artifacts;
use super::vectorizer::VocabularyModel;
use crate::catalog::profile::{profiles_from_csv, profiles_to_csv};
use crate::error::{RecommendError, Result};
use futures::future::join_all;
use opendal::services::Sled;
use opendal::{ErrorKind, Operator};
use std::path::Path;

const CURRENT: &str = "current";
const PROFILES: &str = "profiles.csv";
const VOCABULARY: &str = "vocabulary.json";
const MODE: &str = "mode";
const MATRIX_DIM: &str = "matrix_dim";
const MATRIX: &str = "matrix";
const DIGEST: &str = "digest";
const GENERATION_KEYS: [&str; 6] = [PROFILES, VOCABULARY, MODE, MATRIX_DIM, MATRIX, DIGEST];

const PRECOMPUTED: &str = "precomputed";
const ON_DEMAND: &str = "on-demand";

#[derive(Clone)]
pub struct Storage {
    pub operator: Operator,
}

impl Storage {
    pub fn open(dir: &Path) -> Result<Self> {
        let mut builder = Sled::default();
        builder.datadir(&dir.to_string_lossy());

        Ok(Storage {
            operator: Operator::new(builder)?.finish(),
        })
    }

    /// Generation currently served, `None` before the first build.
    pub async fn current(&self) -> Result<Option<u64>> {
        match self.operator.read(CURRENT).await {
            Ok(bytes) => Ok(Some(u64_decode(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Persists a full generation and makes it current. Returns the new generation.
    pub async fn store(&self, artifacts: &Artifacts) -> Result<u64> {
        let previous = self.current().await?;
        let generation = previous.map(|g| g + 1).unwrap_or(0);

        self.operator
            .write(&key(generation, PROFILES), profiles_to_csv(&artifacts.profiles)?)
            .await?;
        self.operator
            .write(&key(generation, VOCABULARY), artifacts.model.to_bytes()?)
            .await?;
        match &artifacts.matrix {
            Some(matrix) => {
                self.operator
                    .write(
                        &key(generation, MATRIX_DIM),
                        (matrix.dim() as u64).to_be_bytes().to_vec(),
                    )
                    .await?;
                self.operator
                    .write(&key(generation, MATRIX), matrix.to_bytes())
                    .await?;
                self.operator
                    .write(&key(generation, MODE), PRECOMPUTED)
                    .await?;
            }
            None => {
                self.operator
                    .write(&key(generation, MODE), ON_DEMAND)
                    .await?;
            }
        }
        self.operator
            .write(&key(generation, DIGEST), artifacts.digest.clone())
            .await?;
        debug!("generation {} written, digest: {}", generation, artifacts.digest);

        // swap
        self.operator
            .write(CURRENT, generation.to_be_bytes().to_vec())
            .await?;
        info!("generation {} is current", generation);

        if let Some(previous) = previous {
            self.remove_generation(previous).await;
        }
        Ok(generation)
    }

    /// Loads the current generation, `None` when nothing was built yet.
    pub async fn load(&self) -> Result<Option<Artifacts>> {
        let generation = match self.current().await? {
            Some(g) => g,
            None => return Ok(None),
        };

        let profiles = profiles_from_csv(&self.read_artifact(generation, PROFILES).await?)?;
        let model = VocabularyModel::from_bytes(&self.read_artifact(generation, VOCABULARY).await?)?;
        let mode = string_decode(&self.read_artifact(generation, MODE).await?);
        let matrix = match mode.as_str() {
            PRECOMPUTED => {
                let dim = u64_decode(&self.read_artifact(generation, MATRIX_DIM).await?)?;
                let dim = usize::try_from(dim).map_err(|_| {
                    RecommendError::Corruption(format!("matrix dim {} out of range", dim))
                })?;
                let bytes = self.read_artifact(generation, MATRIX).await?;
                Some(SimilarityMatrix::from_bytes(dim, &bytes)?)
            }
            ON_DEMAND => None,
            other => {
                return Err(RecommendError::Corruption(format!(
                    "unknown similarity mode: {}",
                    other
                )))
            }
        };
        let digest = string_decode(&self.read_artifact(generation, DIGEST).await?);
        if digest != corpus_digest(&profiles) {
            return Err(RecommendError::Corruption(format!(
                "generation {} digest does not match its profiles",
                generation
            )));
        }

        info!(
            "load generation: {}, profiles: {}, terms: {}, mode: {}",
            generation,
            profiles.len(),
            model.len(),
            mode
        );
        Ok(Some(Artifacts {
            profiles,
            model,
            matrix,
            digest,
        }))
    }

    pub async fn read_artifact(&self, generation: u64, name: &str) -> Result<Vec<u8>> {
        Ok(self.operator.read(&key(generation, name)).await?)
    }

    async fn remove_generation(&self, generation: u64) {
        let keys = GENERATION_KEYS
            .iter()
            .map(|name| key(generation, name))
            .collect::<Vec<_>>();
        let results = join_all(keys.iter().map(|k| self.operator.delete(k))).await;
        for (k, result) in keys.iter().zip(results) {
            if let Err(e) = result {
                warn!("remove stale artifact {} failed: {}", k, e);
            }
        }
        debug!("generation {} removed", generation);
    }
}

fn key(generation: u64, name: &str) -> String {
    generation.to_string() + "/" + name
}

fn u64_decode(data: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = data
        .try_into()
        .map_err(|_| RecommendError::Corruption(format!("expected 8 bytes, got {}", data.len())))?;
    Ok(u64::from_be_bytes(bytes))
}

fn string_decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).to_string()
}
