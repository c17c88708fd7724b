//! # Text Ranker
//!
//! Whole-text variants from per-position candidate lists.

/// A non-best candidate: `(distance, position, rank)`.
type Alternative = (f32, usize, usize);

/// Rank whole-text variants.
///
/// The first text takes the best candidate at every position. Each further
/// text swaps exactly one position of that baseline for one of its
/// alternatives; alternatives are taken by ascending distance, then
/// position, then rank.
///
/// Positions without candidates are skipped.
///
/// ## Arguments
/// * `positions` - per position, candidates best first.
/// * `ntop` - the maximum number of texts.
///
/// ## Returns
/// At least one text (the baseline), most confident first.
pub fn find_best_texts<S: AsRef<str>>(
    positions: &[Vec<(S, f32)>],
    ntop: usize,
) -> Vec<String> {
    let positions = positions
        .iter()
        .filter(|candidates| !candidates.is_empty())
        .collect::<Vec<_>>();

    let baseline = positions
        .iter()
        .map(|candidates| candidates[0].0.as_ref())
        .collect::<Vec<_>>();

    let mut alternatives: Vec<Alternative> = positions
        .iter()
        .enumerate()
        .flat_map(|(pos, candidates)| {
            candidates
                .iter()
                .enumerate()
                .skip(1)
                .map(move |(rank, (_, distance))| (*distance, pos, rank))
        })
        .collect();
    alternatives.sort_by(|a, b| {
        a.0.total_cmp(&b.0)
            .then(a.1.cmp(&b.1))
            .then(a.2.cmp(&b.2))
    });

    let mut texts = Vec::with_capacity(ntop.max(1));
    texts.push(baseline.join(" "));
    for &(_, pos, rank) in alternatives.iter().take(ntop.saturating_sub(1)) {
        let mut variant = baseline.clone();
        variant[pos] = positions[pos][rank].0.as_ref();
        texts.push(variant.join(" "));
    }
    texts
}
