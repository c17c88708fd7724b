//! # Greedy Decoding
//!
//! Each text moves `Started -> Emitting -> Stopped`. A text stops when it
//! emits the end sentinel or grows past the length bound; there is no
//! backtracking and no beam.

use candle_core::{DType, Tensor};

use crate::{
    errors::TVResult,
    generator::{BOS_INDEX, CharAlphabet, EOS_INDEX, GeneratorDecoder},
    math::argmax,
};

/// The decoding state of one text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DecodeState {
    /// Nothing emitted yet.
    #[default]
    Started,

    /// Emitting characters.
    Emitting,

    /// Done.
    Stopped,
}

impl DecodeState {
    /// The state after emitting a character.
    ///
    /// ## Arguments
    /// * `emitted` - the emitted character index.
    /// * `n_emitted` - characters emitted so far, this one included.
    /// * `max_chars` - the length bound.
    pub fn after_emit(
        self,
        emitted: usize,
        n_emitted: usize,
        max_chars: usize,
    ) -> Self {
        match self {
            DecodeState::Stopped => DecodeState::Stopped,
            _ if emitted == EOS_INDEX || n_emitted > max_chars => DecodeState::Stopped,
            _ => DecodeState::Emitting,
        }
    }
}

/// Greedy batch decoding from encoder states.
pub struct GreedyDecoder<'a> {
    decoder: &'a GeneratorDecoder,
    alphabet: &'a CharAlphabet,
    max_chars: usize,
}

impl<'a> GreedyDecoder<'a> {
    /// Create a decoder.
    ///
    /// ## Arguments
    /// * `decoder` - the trained character decoder.
    /// * `alphabet` - its alphabet.
    /// * `max_chars` - the length bound.
    pub fn new(
        decoder: &'a GeneratorDecoder,
        alphabet: &'a CharAlphabet,
        max_chars: usize,
    ) -> Self {
        Self {
            decoder,
            alphabet,
            max_chars,
        }
    }

    /// Decode one text per `(batch, hidden)` state row.
    pub fn generate(
        &self,
        states: &Tensor,
    ) -> TVResult<Vec<String>> {
        let batch = states.dim(0)?;
        let n_chars = self.alphabet.len();
        let device = states.device();

        let mut status = vec![DecodeState::Started; batch];
        let mut emitted: Vec<Vec<usize>> = vec![Vec::new(); batch];
        let mut current = vec![BOS_INDEX; batch];
        let mut state = states.clone();

        while status.iter().any(|s| *s != DecodeState::Stopped) {
            let mut one_hot = vec![0.0f32; batch * n_chars];
            for (row, &c) in current.iter().enumerate() {
                one_hot[row * n_chars + c] = 1.0;
            }
            let x = Tensor::from_vec(one_hot, (batch, n_chars), device)?;
            let (probs, next) = self.decoder.step(&x, &state)?;
            state = next;

            let probs = probs.to_dtype(DType::F32)?.to_vec2::<f32>()?;
            for (row, p) in probs.iter().enumerate() {
                let best = argmax(p).unwrap_or(EOS_INDEX);
                current[row] = best;
                if status[row] == DecodeState::Stopped {
                    continue;
                }
                emitted[row].push(best);
                status[row] = status[row].after_emit(best, emitted[row].len(), self.max_chars);
            }
        }

        Ok(emitted
            .iter()
            .map(|indices| self.alphabet.decode(indices))
            .collect())
    }
}
