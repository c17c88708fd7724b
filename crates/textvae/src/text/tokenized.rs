//! # Tokenized Texts

use crate::text::Tokenizer;

/// An ordered sequence of word tokens.
///
/// Ordinary words are lowercased; special symbols are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TokenizedText {
    tokens: Vec<String>,
}

impl From<Vec<String>> for TokenizedText {
    fn from(tokens: Vec<String>) -> Self {
        Self { tokens }
    }
}

impl TokenizedText {
    /// Tokenize one text.
    ///
    /// ## Arguments
    /// * `tokenizer` - the word-boundary tokenizer.
    /// * `text` - the source text.
    pub fn new(
        tokenizer: &dyn Tokenizer,
        text: &str,
    ) -> Self {
        let specials = tokenizer.special_symbols();
        let tokens = tokenizer
            .word_boundaries(text)
            .into_iter()
            .map(|bounds| {
                let word = &text[bounds];
                if specials.iter().any(|s| s == word) {
                    word.to_string()
                } else {
                    word.to_lowercase()
                }
            })
            .collect();
        Self { tokens }
    }

    /// The number of tokens.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Is this text empty?
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// The tokens, in text order.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Iterate over the tokens.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }
}

/// Tokenize a corpus once; the result is reused for every epoch.
///
/// ## Arguments
/// * `tokenizer` - the word-boundary tokenizer.
/// * `texts` - the source texts.
pub fn tokenize_all<S: AsRef<str>>(
    tokenizer: &dyn Tokenizer,
    texts: &[S],
) -> Vec<TokenizedText> {
    texts
        .iter()
        .map(|text| TokenizedText::new(tokenizer, text.as_ref()))
        .collect()
}

/// Re-segment a text into characters.
///
/// ## Arguments
/// * `tokenizer` - the word-boundary tokenizer.
/// * `text` - the source text.
pub fn text_characters(
    tokenizer: &dyn Tokenizer,
    text: &str,
) -> Vec<char> {
    let bounds = tokenizer.word_boundaries(text);
    tokenizer.characters(text, &bounds)
}
