use std::sync::Arc;

use textvae::{
    embeddings::{EmbeddingLookup, InMemoryEmbeddings},
    estimator::{PersistedState, TextVae},
    text::RegexTokenizer,
};

/// Word vector arg group.
#[derive(clap::Args, Debug)]
pub struct EmbeddingArgs {
    /// Input word vectors, word2vec text format.
    #[arg(long)]
    embeddings: String,

    /// Output word vectors, when they differ from the input ones.
    #[arg(long)]
    output_embeddings: Option<String>,
}

impl EmbeddingArgs {
    /// Load the input word vectors.
    pub fn load_input(&self) -> Result<Arc<dyn EmbeddingLookup>, Box<dyn std::error::Error>> {
        load_table(&self.embeddings)
    }

    /// Load the output word vectors, if configured.
    pub fn load_output(
        &self
    ) -> Result<Option<Arc<dyn EmbeddingLookup>>, Box<dyn std::error::Error>> {
        self.output_embeddings
            .as_deref()
            .map(load_table)
            .transpose()
    }

    /// Rebuild a fitted estimator from a saved state file.
    pub fn load_estimator(
        &self,
        state_path: &str,
    ) -> Result<TextVae, Box<dyn std::error::Error>> {
        log::info!("Loading state: {state_path}");
        let state = PersistedState::load(state_path)?;
        let tokenizer = Arc::new(RegexTokenizer::new(&state.special_symbols)?);
        Ok(TextVae::from_state(
            tokenizer,
            self.load_input()?,
            self.load_output()?,
            &state,
        )?)
    }
}

fn load_table(path: &str) -> Result<Arc<dyn EmbeddingLookup>, Box<dyn std::error::Error>> {
    log::info!("Loading word vectors: {path}");
    let table = InMemoryEmbeddings::load_word2vec(path)?;
    log::info!("{} words of dimension {}", table.len(), table.dimension());
    Ok(Arc::new(table))
}
