//! # Persisted State
//!
//! A fitted estimator as one JSON record. Each sub-network's weights are a
//! safetensors blob, base64-encoded; the embedding tables are not stored.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use base64::{Engine, prelude::BASE64_STANDARD};
use serde::{Deserialize, Serialize};

use crate::{
    errors::{TVResult, TextVaeError},
    estimator::TextVaeOptions,
};

/// Base64 weight blobs, one per sub-network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightBlobs {
    /// The VAE encoder.
    pub vae_encoder: String,

    /// The VAE decoder.
    pub vae_decoder: String,

    /// The generator encoder; absent on the word resolver path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator_encoder: Option<String>,

    /// The generator decoder; absent on the word resolver path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator_decoder: Option<String>,
}

/// Encode a weight blob.
pub fn encode_blob(bytes: &[u8]) -> String {
    BASE64_STANDARD.encode(bytes)
}

/// Decode a weight blob.
///
/// ## Arguments
/// * `name` - the blob's key, for error messages.
/// * `blob` - the base64 text.
pub fn decode_blob(
    name: &str,
    blob: &str,
) -> TVResult<Vec<u8>> {
    BASE64_STANDARD
        .decode(blob)
        .map_err(|err| TextVaeError::state(format!("`{name}` is not valid base64: {err}")))
}

impl WeightBlobs {
    /// A blob that must be present.
    pub fn required<'a>(
        name: &str,
        blob: &'a Option<String>,
    ) -> TVResult<&'a str> {
        blob.as_deref()
            .ok_or_else(|| TextVaeError::state(format!("the weights `{name}` are missing")))
    }
}

/// Everything needed to rebuild a fitted estimator, given its tokenizer
/// and embeddings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    /// The hyperparameters.
    pub options: TextVaeOptions,

    /// Fitted encoder time steps.
    pub input_text_size: usize,

    /// Fitted decoder time steps.
    pub output_text_size: usize,

    /// Encoder row width.
    pub input_vector_size: usize,

    /// Decoder row width.
    pub output_vector_size: usize,

    /// The generation bound, in characters.
    pub output_text_size_in_characters: usize,

    /// The ordered special symbols.
    pub special_symbols: Vec<String>,

    /// The character table; sentinels first.
    pub alphabet: Vec<char>,

    /// Candidate words for word resolution.
    pub output_words: Vec<String>,

    /// The weights.
    pub weights: WeightBlobs,
}

impl PersistedState {
    /// Serialize to JSON.
    pub fn to_json(&self) -> TVResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse from JSON.
    ///
    /// ## Errors
    /// [`TextVaeError::State`] on missing keys or wrongly typed values.
    pub fn from_json(json: &str) -> TVResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write JSON to a writer.
    pub fn write_json<W: Write>(
        &self,
        writer: W,
    ) -> TVResult<()> {
        Ok(serde_json::to_writer(writer, self)?)
    }

    /// Read JSON from a reader.
    pub fn read_json<R: Read>(reader: R) -> TVResult<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Save to a file.
    pub fn save<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> TVResult<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_json(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Load from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> TVResult<Self> {
        Self::read_json(BufReader::new(File::open(path)?))
    }
}

#[cfg(test)]
mod tests {
    use tempdir::TempDir;

    use super::*;
    use crate::generator::{BOS, EOS};

    fn sample() -> PersistedState {
        PersistedState {
            options: TextVaeOptions::default().with_latent_dim(3),
            input_text_size: 7,
            output_text_size: 6,
            input_vector_size: 12,
            output_vector_size: 12,
            output_text_size_in_characters: 30,
            special_symbols: vec!["<num>".to_string()],
            alphabet: vec![BOS, EOS, ' ', 'a'],
            output_words: vec!["a".to_string()],
            weights: WeightBlobs {
                vae_encoder: encode_blob(&[1, 2, 3]),
                vae_decoder: encode_blob(&[4]),
                generator_encoder: None,
                generator_decoder: Some(encode_blob(&[])),
            },
        }
    }

    #[test]
    fn test_json_round_trip() {
        let state = sample();
        let json = state.to_json().unwrap();
        assert!(!json.contains("generator_encoder"));
        assert_eq!(PersistedState::from_json(&json).unwrap(), state);
        assert_eq!(
            decode_blob("vae_encoder", &state.weights.vae_encoder).unwrap(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_file_round_trip() {
        let dir = TempDir::new("textvae-state").unwrap();
        let path = dir.path().join("state.json");
        let state = sample();
        state.save(&path).unwrap();
        assert_eq!(PersistedState::load(&path).unwrap(), state);
    }

    #[test]
    fn test_malformed_state() {
        let mut value = serde_json::to_value(sample()).unwrap();
        value.as_object_mut().unwrap().remove("alphabet");
        let err = PersistedState::from_json(&value.to_string()).unwrap_err();
        assert!(matches!(err, TextVaeError::State(_)));

        let mut value = serde_json::to_value(sample()).unwrap();
        value["weights"]["vae_decoder"] = serde_json::json!(17);
        let err = PersistedState::from_json(&value.to_string()).unwrap_err();
        assert!(matches!(err, TextVaeError::State(_)));

        assert!(matches!(
            decode_blob("vae_decoder", "not base64!"),
            Err(TextVaeError::State(_))
        ));
        assert!(matches!(
            WeightBlobs::required("generator_encoder", &None),
            Err(TextVaeError::State(_))
        ));
    }
}
