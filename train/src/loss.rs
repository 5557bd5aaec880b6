/// Default triplet loss margin.
pub const DEFAULT_ALPHA: f32 = 0.1;

/// Cosine similarity of two vectors. Zero if either has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "train: embedding dimension mismatch");
    let mut dot = 0.0f64;
    let mut na = 0.0f64;
    let mut nb = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        dot += x as f64 * y as f64;
        na += x as f64 * x as f64;
        nb += y as f64 * y as f64;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    (dot / (na.sqrt() * nb.sqrt())) as f32
}

/// Triplet loss over embeddings laid out as `[anchors | positives | negatives]`.
///
/// Roles come from position only:
/// `mean_i max(cos(a_i, n_i) - cos(a_i, p_i) + alpha, 0)`.
pub fn triplet_loss(embeddings: &[Vec<f32>], num_triplets: usize, alpha: f32) -> f32 {
    assert_eq!(
        embeddings.len(),
        3 * num_triplets,
        "train: expected 3 x {num_triplets} embeddings"
    );
    if num_triplets == 0 {
        return 0.0;
    }
    let (anchors, rest) = embeddings.split_at(num_triplets);
    let (positives, negatives) = rest.split_at(num_triplets);

    let total: f32 = anchors
        .iter()
        .zip(positives)
        .zip(negatives)
        .map(|((a, p), n)| (cosine_similarity(a, n) - cosine_similarity(a, p) + alpha).max(0.0))
        .sum();
    total / num_triplets as f32
}
