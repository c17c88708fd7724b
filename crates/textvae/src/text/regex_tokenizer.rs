//! # Regex Tokenizer

use core::ops::Range;

use regex::Regex;

use crate::{
    errors::{TVResult, TextVaeError},
    text::Tokenizer,
};

/// The default word pattern.
///
/// Words (with inner hyphens / apostrophes), numbers, and single punctuation marks.
pub const DEFAULT_WORD_PATTERN: &str = r"\w+(?:[-'’]\w+)*|[^\w\s]";

/// Span Label/Range Reference for [`RegexTokenizer`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SpanRef {
    /// A normal word reference.
    Word(Range<usize>),

    /// A special symbol reference.
    Special(Range<usize>),

    /// A gap reference.
    Gap(Range<usize>),
}

impl From<SpanRef> for Range<usize> {
    fn from(span: SpanRef) -> Self {
        match span {
            SpanRef::Word(range) => range,
            SpanRef::Special(range) => range,
            SpanRef::Gap(range) => range,
        }
    }
}

/// Create a union pattern of exact matches.
///
/// Longer alternatives come first, so a symbol is never shadowed by its own prefix.
///
/// ## Arguments
/// * `alts` - A slice of alternatives to union.
pub fn alternate_choice_pattern<S: AsRef<str>>(alts: &[S]) -> String {
    let mut parts = alts
        .iter()
        .map(|s| s.as_ref())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();
    parts.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

    let parts = parts.into_iter().map(regex::escape).collect::<Vec<_>>();
    format!("({})", parts.join("|"))
}

/// Tokenizer with regex-based word splitting and special symbol matching.
#[derive(Debug, Clone)]
pub struct RegexTokenizer {
    /// Regex for splitting words.
    word_re: Regex,

    /// Regex for matching special symbols.
    special_re: Option<Regex>,

    /// Sorted special symbols.
    specials: Vec<String>,
}

impl Default for RegexTokenizer {
    fn default() -> Self {
        Self::new::<&str>(&[]).expect("default word pattern compiles")
    }
}

impl RegexTokenizer {
    /// Build a tokenizer with the default word pattern.
    ///
    /// ## Arguments
    /// * `specials` - special symbols to match verbatim.
    pub fn new<S: AsRef<str>>(specials: &[S]) -> TVResult<Self> {
        Self::from_patterns(DEFAULT_WORD_PATTERN, specials)
    }

    /// Build a tokenizer from a word pattern.
    ///
    /// ## Arguments
    /// * `word_pattern` - The word split pattern.
    /// * `specials` - A slice of special symbol strings.
    pub fn from_patterns<S: AsRef<str>>(
        word_pattern: &str,
        specials: &[S],
    ) -> TVResult<Self> {
        let word_re = Regex::new(word_pattern)
            .map_err(|e| TextVaeError::configuration(format!("bad word pattern: {e}")))?;

        let mut specials: Vec<String> = specials
            .iter()
            .map(|s| s.as_ref().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        specials.sort();
        specials.dedup();

        let special_re = if specials.is_empty() {
            None
        } else {
            Some(
                Regex::new(&alternate_choice_pattern(&specials)).map_err(|e| {
                    TextVaeError::configuration(format!("bad special symbols: {e}"))
                })?,
            )
        };

        Ok(Self {
            word_re,
            special_re,
            specials,
        })
    }

    /// Iterate over all split [`SpanRef`]s in the text.
    ///
    /// ## Arguments
    /// * `text` - the text to split.
    /// * `f` - the function to apply to each span.
    pub fn for_each_split_span<F>(
        &self,
        text: &str,
        f: &mut F,
    ) where
        F: FnMut(SpanRef),
    {
        let mut offset = 0;
        if let Some(special_re) = &self.special_re {
            for m in special_re.find_iter(text) {
                self.for_each_word(&text[offset..m.start()], offset, f);
                f(SpanRef::Special(m.range()));
                offset = m.end();
            }
        }
        self.for_each_word(&text[offset..], offset, f);
    }

    fn for_each_word<F>(
        &self,
        text: &str,
        offset: usize,
        f: &mut F,
    ) where
        F: FnMut(SpanRef),
    {
        let mut last = 0;
        for m in self.word_re.find_iter(text) {
            let Range { start, end } = m.range();
            if start == end {
                continue;
            }
            if last < start {
                f(SpanRef::Gap(offset + last..offset + start));
            }
            f(SpanRef::Word(offset + start..offset + end));
            last = end;
        }
        if last < text.len() {
            f(SpanRef::Gap(offset + last..offset + text.len()));
        }
    }

    /// Split text into spans.
    pub fn split_spans(
        &self,
        text: &str,
    ) -> Vec<SpanRef> {
        let mut spans = Vec::new();
        self.for_each_split_span(text, &mut |span| spans.push(span));
        spans
    }
}

impl Tokenizer for RegexTokenizer {
    fn word_boundaries(
        &self,
        text: &str,
    ) -> Vec<Range<usize>> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        self.split_spans(text)
            .into_iter()
            .filter_map(|span| match span {
                SpanRef::Gap(_) => None,
                span => Some(span.into()),
            })
            .collect()
    }

    fn special_symbols(&self) -> &[String] {
        &self.specials
    }
}
