use crate::error::{RecommendError, Result};
use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Sparse weighted vector, indices strictly increasing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

impl SparseVector {
    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|v| *v == 0.0)
    }

    pub fn norm(&self) -> f32 {
        self.values.iter().map(|x| x * x).sum::<f32>().sqrt()
    }
}

fn dot_product(a: &SparseVector, b: &SparseVector) -> f32 {
    let (mut i, mut j) = (0, 0);
    let mut sum = 0.0f32;
    while i < a.indices.len() && j < b.indices.len() {
        match a.indices[i].cmp(&b.indices[j]) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                sum += a.values[i] * b.values[j];
                i += 1;
                j += 1;
            }
        }
    }
    sum
}

/// Cosine similarity; 0.0 when either side has zero norm.
pub fn cosine_similarity(a: &SparseVector, b: &SparseVector) -> f32 {
    let mag_a = a.norm();
    let mag_b = b.norm();
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    (dot_product(a, b) / (mag_a * mag_b)).clamp(0.0, 1.0)
}

/// One similarity row computed on demand, self entry pinned like the matrix diagonal.
pub fn similarity_row(vectors: &[SparseVector], index: usize) -> Vec<f32> {
    let query = &vectors[index];
    vectors
        .iter()
        .enumerate()
        .map(|(j, v)| {
            if j == index {
                self_similarity(query)
            } else {
                cosine_similarity(query, v)
            }
        })
        .collect()
}

fn self_similarity(v: &SparseVector) -> f32 {
    if v.norm() == 0.0 {
        0.0
    } else {
        1.0
    }
}

/// Dense square cosine matrix, row-major, indexed by corpus order.
#[derive(Clone, Debug, PartialEq)]
pub struct SimilarityMatrix {
    dim: usize,
    data: Vec<f32>,
}

impl SimilarityMatrix {
    pub fn build(vectors: &[SparseVector]) -> Self {
        let dim = vectors.len();
        let mut data = vec![0f32; dim * dim];
        for i in 0..dim {
            data[i * dim + i] = self_similarity(&vectors[i]);
            for j in (i + 1)..dim {
                let similarity = cosine_similarity(&vectors[i], &vectors[j]);
                data[i * dim + j] = similarity;
                data[j * dim + i] = similarity;
            }
        }
        debug!("similarity matrix built, dim: {}", dim);
        Self { dim, data }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn get(&self, i: usize, j: usize) -> f32 {
        self.data[i * self.dim + j]
    }

    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.dim..(i + 1) * self.dim]
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut byte_vec = vec![0u8; self.data.len() * 4];
        LittleEndian::write_f32_into(&self.data, &mut byte_vec);
        byte_vec
    }

    pub fn from_bytes(dim: usize, byte_vec: &[u8]) -> Result<Self> {
        let expected = dim
            .checked_mul(dim)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| RecommendError::Corruption(format!("matrix dim {} overflows", dim)))?;
        if byte_vec.len() != expected {
            return Err(RecommendError::Corruption(format!(
                "matrix has {} bytes, expected {} for dim {}",
                byte_vec.len(),
                expected,
                dim
            )));
        }
        let mut data = vec![0f32; dim * dim];
        LittleEndian::read_f32_into(byte_vec, &mut data);
        Ok(Self { dim, data })
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Matched {
    pub index: usize,
    pub similarity: f32,
}

/// Orders candidates by descending similarity, ties by corpus position.
///
/// `exclude` removes one position outright (the query book in book-to-book search).
pub fn match_top_n(scores: &[f32], exclude: Option<usize>, top_n: usize) -> Vec<Matched> {
    let mut matched = scores
        .iter()
        .enumerate()
        .filter(|(index, _)| Some(*index) != exclude)
        .map(|(index, similarity)| Matched {
            index,
            similarity: *similarity,
        })
        .collect::<Vec<_>>();
    // stable sort keeps corpus order among equal scores
    matched.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
    });
    matched.truncate(top_n);
    matched
}
