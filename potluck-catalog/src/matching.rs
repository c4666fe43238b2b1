//! Fuzzy name matching used for restaurants, menu items and options.
//!
//! Matching is a case-insensitive ordered-subsequence search: every
//! non-whitespace character of the query must appear in the candidate in
//! order. Denser matches score higher (consecutive runs and word starts earn
//! bonuses), so "chkn momo" still finds "Chicken Momo" while "momo chicken"
//! does not.

const MATCH_SCORE: u32 = 1;
const CONSECUTIVE_BONUS: u32 = 4;
const WORD_START_BONUS: u32 = 3;

fn lowercase_chars(s: &str) -> Vec<char> {
    s.chars().flat_map(char::to_lowercase).collect()
}

/// Score `query` against `candidate`; `None` when it is not a subsequence.
pub fn subsequence_score(query: &str, candidate: &str) -> Option<u32> {
    let pattern: Vec<char> = lowercase_chars(query)
        .into_iter()
        .filter(|c| !c.is_whitespace())
        .collect();
    if pattern.is_empty() {
        return None;
    }
    let text = lowercase_chars(candidate);

    let mut best: Option<u32> = None;
    for start in 0..text.len() {
        if text[start] != pattern[0] {
            continue;
        }
        if let Some(score) = score_from(&pattern, &text, start) {
            if best.map_or(true, |b| score > b) {
                best = Some(score);
            }
        }
    }
    best
}

// Greedy left-to-right match anchored at `start`.
fn score_from(pattern: &[char], text: &[char], start: usize) -> Option<u32> {
    let mut score = 0;
    let mut cursor = start;
    let mut previous: Option<usize> = None;

    for &wanted in pattern {
        let offset = text[cursor..].iter().position(|&c| c == wanted)?;
        let idx = cursor + offset;

        score += MATCH_SCORE;
        if previous.is_some_and(|p| p + 1 == idx) {
            score += CONSECUTIVE_BONUS;
        }
        if idx == 0 || !text[idx - 1].is_alphanumeric() {
            score += WORD_START_BONUS;
        }

        previous = Some(idx);
        cursor = idx + 1;
    }
    Some(score)
}

/// Index of the best-scoring candidate. Ties go to the earliest candidate.
pub fn best_match<'a, I>(query: &str, candidates: I) -> Option<(usize, u32)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(usize, u32)> = None;
    for (idx, candidate) in candidates.into_iter().enumerate() {
        if let Some(score) = subsequence_score(query, candidate) {
            if best.map_or(true, |(_, b)| score > b) {
                best = Some((idx, score));
            }
        }
    }
    best
}

/// Case-insensitive Levenshtein distance
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a = lowercase_chars(a);
    let b = lowercase_chars(b);
    if a.is_empty() {
        return b.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Closest candidate by edit distance, if strictly below `threshold`
pub fn nearest_within<'a, I>(query: &str, candidates: I, threshold: usize) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(&'a str, usize)> = None;
    for candidate in candidates {
        let distance = edit_distance(query, candidate);
        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((candidate, distance));
        }
    }
    best.filter(|(_, d)| *d < threshold).map(|(name, _)| name)
}
