use super::*;

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[test]
fn same_text_same_vector() {
    let embedder = HashingEmbedder::new(64).expect("valid dimension");
    let a = embedder.embed("Python is a programming language").expect("embed");
    let b = embedder.embed("Python is a programming language").expect("embed");
    assert_eq!(a, b);
}

#[test]
fn vectors_are_normalised_and_sized() {
    let embedder = HashingEmbedder::new(384).expect("valid dimension");
    let vector = embedder.embed("Reina Mishima uses Purple Lightning").expect("embed");

    assert_eq!(vector.len(), 384);
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() < 1e-5);
}

#[test]
fn tokenisation_ignores_case_and_punctuation() {
    let embedder = HashingEmbedder::new(128).expect("valid dimension");
    let a = embedder.embed("What is PYTHON?").expect("embed");
    let b = embedder.embed("what is python").expect("embed");
    assert_eq!(a, b);
}

#[test]
fn shared_vocabulary_scores_higher() {
    let embedder = HashingEmbedder::new(384).expect("valid dimension");
    let query = embedder.embed("What is Python?").expect("embed");
    let related = embedder
        .embed("Python is a high-level programming language.")
        .expect("embed");
    let unrelated = embedder
        .embed("The Devil Gene grants supernatural strength.")
        .expect("embed");

    assert!(cosine(&query, &related) > cosine(&query, &unrelated));
}

#[test]
fn text_without_tokens_is_the_zero_vector() {
    let embedder = HashingEmbedder::new(16).expect("valid dimension");
    let vector = embedder.embed("?!  ...").expect("embed");
    assert!(vector.iter().all(|v| *v == 0.0));
}

#[test]
fn batch_matches_single_embeddings() {
    let embedder = HashingEmbedder::new(32).expect("valid dimension");
    let texts = vec!["alpha beta".to_string(), "gamma".to_string()];
    let batch = embedder.embed_batch(&texts).expect("embed batch");

    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0], embedder.embed("alpha beta").expect("embed"));
    assert_eq!(batch[1], embedder.embed("gamma").expect("embed"));
}

#[test]
fn model_id_includes_dimension() {
    let embedder = HashingEmbedder::new(384).expect("valid dimension");
    assert_eq!(embedder.model_id(), "hashing:d384");
    assert_eq!(embedder.dimension(), 384);
}

#[test]
fn zero_dimension_is_rejected() {
    assert!(matches!(
        HashingEmbedder::new(0),
        Err(RagError::InvalidConfig(_))
    ));
}
