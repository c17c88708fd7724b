use std::sync::Arc;

use tempdir::TempDir;
use textvae::{
    embeddings::{EmbeddingLookup, InMemoryEmbeddings},
    errors::TextVaeError,
    estimator::{PersistedState, TextVae, TextVaeOptions},
    text::{RegexTokenizer, Tokenizer},
    vae::ReconstructionLoss,
};

const CORPUS: [&str; 10] = [
    "the cat sat",
    "a dog ran",
    "the dog sat",
    "a cat ran",
    "the bird flew",
    "a bird sat",
    "the cat ran",
    "a dog flew",
    "the bird ran",
    "a cat flew",
];

fn embeddings() -> Arc<dyn EmbeddingLookup> {
    let table = InMemoryEmbeddings::from_entries(
        4,
        [
            ("the", vec![1.0, 0.1, 0.0, 0.0]),
            ("a", vec![0.9, 0.2, 0.1, 0.0]),
            ("cat", vec![0.0, 1.0, 0.2, 0.0]),
            ("dog", vec![0.1, 0.9, 0.3, 0.0]),
            ("bird", vec![0.0, 0.8, 0.0, 0.5]),
            ("sat", vec![0.0, 0.0, 1.0, 0.1]),
            ("ran", vec![0.0, 0.1, 0.9, 0.4]),
            ("flew", vec![0.1, 0.0, 0.3, 1.0]),
        ],
    )
    .unwrap();
    Arc::new(table)
}

fn tokenizer() -> Arc<dyn Tokenizer> {
    Arc::new(RegexTokenizer::default())
}

fn options() -> TextVaeOptions {
    TextVaeOptions::default()
        .with_n_filters(vec![4])
        .with_latent_dim(2)
        .with_n_recurrent_units(8)
        .with_batch_size(4)
        .with_max_epochs(2)
        .with_validation_fraction(0.3)
        .with_seed(7)
}

fn estimator(options: TextVaeOptions) -> TextVae {
    TextVae::new(tokenizer(), embeddings()).with_options(options)
}

#[test]
fn test_fit_predict_preserves_container_shape() {
    let mut vae = estimator(options());
    let report = vae.fit(&CORPUS, None).unwrap();
    assert!(vae.is_fitted());
    assert_eq!(report.vae.len(), 1);
    assert!(report.generator.is_some());
    assert!(report.vae[0].best_validation.unwrap().is_finite());

    let list: Vec<String> = vae.predict(&CORPUS.to_vec()).unwrap();
    assert_eq!(list.len(), CORPUS.len());

    let fixed: [String; 10] = vae.predict(&CORPUS).unwrap();
    assert_eq!(fixed.to_vec(), list);

    let slice: Vec<String> = vae.predict(&CORPUS[..3]).unwrap();
    assert_eq!(slice, list[..3].to_vec());
}

#[test]
fn test_validation_fraction_without_eval_pairs() {
    let mut vae = estimator(options().with_validation_fraction(0.04));
    assert!(matches!(
        vae.fit(&CORPUS, None),
        Err(TextVaeError::Data(_))
    ));
    assert!(!vae.is_fitted());
}

#[test]
fn test_transform_is_deterministic() {
    let mut vae = estimator(options());
    let latents = vae.fit_transform(&CORPUS, None).unwrap();
    assert_eq!(latents.len(), CORPUS.len());
    assert!(latents.iter().all(|z| z.len() == 2));
    assert_eq!(vae.transform(&CORPUS).unwrap(), latents);

    let reconstructed = vae.reconstruct(&CORPUS[..2]).unwrap();
    assert_eq!(reconstructed.len(), 2);
    // "the cat sat": three words; rows are 4 embedding columns + unknown + end.
    assert_eq!(reconstructed[0].len(), 3);
    assert_eq!(reconstructed[0][0].len(), 6);
}

#[test]
fn test_state_round_trip() {
    let mut vae = estimator(options());
    vae.fit(&CORPUS, None).unwrap();

    let state = vae.to_state().unwrap();
    let restored = TextVae::from_state(tokenizer(), embeddings(), None, &state).unwrap();
    assert_eq!(
        restored.transform(&CORPUS).unwrap(),
        vae.transform(&CORPUS).unwrap()
    );
    assert_eq!(
        restored.predict(&CORPUS).unwrap(),
        vae.predict(&CORPUS).unwrap()
    );

    let dir = TempDir::new("textvae-estimator").unwrap();
    let path = dir.path().join("state.json");
    vae.save_state(&path).unwrap();
    let loaded = TextVae::load_state(tokenizer(), embeddings(), None, &path).unwrap();
    assert_eq!(loaded.options(), vae.options());
    assert_eq!(
        loaded.transform(&CORPUS).unwrap(),
        vae.transform(&CORPUS).unwrap()
    );
}

#[test]
fn test_malformed_state() {
    let mut vae = estimator(options());
    vae.fit(&CORPUS, None).unwrap();
    let state = vae.to_state().unwrap();

    let mut truncated = state.clone();
    truncated.weights.vae_decoder.truncate(16);
    assert!(matches!(
        TextVae::from_state(tokenizer(), embeddings(), None, &truncated),
        Err(TextVaeError::State(_))
    ));

    let mut missing = state.clone();
    missing.weights.generator_decoder = None;
    assert!(matches!(
        TextVae::from_state(tokenizer(), embeddings(), None, &missing),
        Err(TextVaeError::State(_))
    ));

    let mut json: serde_json::Value = serde_json::from_str(&state.to_json().unwrap()).unwrap();
    json.as_object_mut().unwrap().remove("weights");
    assert!(matches!(
        PersistedState::from_json(&json.to_string()),
        Err(TextVaeError::State(_))
    ));

    let narrow = InMemoryEmbeddings::from_entries(3, [("the", vec![1.0, 0.0, 0.0])]).unwrap();
    assert!(matches!(
        TextVae::from_state(tokenizer(), Arc::new(narrow), None, &state),
        Err(TextVaeError::State(_))
    ));
}

#[test]
fn test_direct_cosine_variants() {
    let mut vae = estimator(options().with_loss(ReconstructionLoss::DirectCosine));
    let report = vae.fit(&CORPUS, None).unwrap();
    assert!(report.generator.is_none());

    let state = vae.to_state().unwrap();
    assert!(state.weights.generator_encoder.is_none());
    assert!(state.alphabet.is_empty());
    assert_eq!(state.output_words.len(), 8);

    let variants = vae.predict_variants(&CORPUS, 3).unwrap();
    assert_eq!(variants.len(), CORPUS.len());
    for texts in &variants {
        assert!(!texts.is_empty() && texts.len() <= 3);
    }

    let best = vae.predict(&CORPUS.to_vec()).unwrap();
    let firsts = variants.iter().map(|t| t[0].clone()).collect::<Vec<_>>();
    assert_eq!(best, firsts);

    let restored = TextVae::from_state(tokenizer(), embeddings(), None, &state).unwrap();
    assert_eq!(restored.predict_variants(&CORPUS, 3).unwrap(), variants);
}

#[test]
fn test_warm_start() {
    let mut vae = estimator(options());
    vae.fit(&CORPUS, None).unwrap();

    vae.set_options(options().with_warm_start(true));
    let report = vae.fit(&CORPUS[..8], None).unwrap();
    assert_eq!(report.vae.len(), 2);
    assert!(vae.is_fitted());
}

#[test]
fn test_state_records_fitted_options() {
    let mut vae = estimator(options());
    vae.fit(&CORPUS, None).unwrap();
    let before = vae.transform(&CORPUS).unwrap();

    vae.set_options(options().with_latent_dim(6).with_n_filters(vec![3, 3]));
    let state = vae.to_state().unwrap();
    assert_eq!(state.options, options());

    let restored = TextVae::from_state(tokenizer(), embeddings(), None, &state).unwrap();
    assert_eq!(restored.options().latent_dim, 2);
    assert_eq!(restored.transform(&CORPUS).unwrap(), before);
}

#[test]
fn test_warm_start_keeps_the_encoder_shape() {
    let mut vae = estimator(options());
    vae.fit(&CORPUS, None).unwrap();
    let before = vae.transform(&CORPUS).unwrap();

    vae.set_options(options().with_latent_dim(3).with_warm_start(true));
    assert!(matches!(
        vae.fit(&CORPUS, None),
        Err(TextVaeError::Configuration(_))
    ));

    vae.set_options(options());
    assert_eq!(vae.transform(&CORPUS).unwrap(), before);
}
