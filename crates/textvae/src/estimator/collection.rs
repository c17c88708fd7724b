//! # Text Collections
//!
//! Inputs whose container shape carries over to generated outputs.

use crate::errors::{TVResult, TextVaeError};

/// A collection of texts.
pub trait TextCollection {
    /// The collection of generated texts, shaped like `Self`.
    type Generated;

    /// The texts, in order.
    fn texts(&self) -> Vec<&str>;

    /// Shape generated texts like `self`.
    ///
    /// ## Arguments
    /// * `generated` - one text per input, in order.
    fn collect_generated(
        &self,
        generated: Vec<String>,
    ) -> TVResult<Self::Generated>;
}

impl<S: AsRef<str>> TextCollection for [S] {
    type Generated = Vec<String>;

    fn texts(&self) -> Vec<&str> {
        self.iter().map(AsRef::as_ref).collect()
    }

    fn collect_generated(
        &self,
        generated: Vec<String>,
    ) -> TVResult<Vec<String>> {
        Ok(generated)
    }
}

impl<S: AsRef<str>> TextCollection for Vec<S> {
    type Generated = Vec<String>;

    fn texts(&self) -> Vec<&str> {
        self.as_slice().texts()
    }

    fn collect_generated(
        &self,
        generated: Vec<String>,
    ) -> TVResult<Vec<String>> {
        Ok(generated)
    }
}

impl<S: AsRef<str>, const N: usize> TextCollection for [S; N] {
    type Generated = [String; N];

    fn texts(&self) -> Vec<&str> {
        self.as_slice().texts()
    }

    fn collect_generated(
        &self,
        generated: Vec<String>,
    ) -> TVResult<[String; N]> {
        let n = generated.len();
        generated.try_into().map_err(|_| {
            TextVaeError::data(format!("expected {N} generated texts, got {n}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shapes_carry_over() {
        let list = vec!["a", "b"];
        assert_eq!(list.texts(), vec!["a", "b"]);
        let out: Vec<String> = list
            .collect_generated(vec!["x".into(), "y".into()])
            .unwrap();
        assert_eq!(out, vec!["x", "y"]);

        let fixed = ["a".to_string(), "b".to_string()];
        let out: [String; 2] = fixed
            .collect_generated(vec!["x".into(), "y".into()])
            .unwrap();
        assert_eq!(out, ["x".to_string(), "y".to_string()]);
        assert!(fixed.collect_generated(vec!["x".into()]).is_err());

        let slice: &[&str] = &["a"];
        assert_eq!(slice.texts(), vec!["a"]);
    }
}
