use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use serde::Serialize;

/// Result cap used when callers do not pass one.
pub const DEFAULT_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FuzzyMatch {
    pub value: String,
    pub score: i64,
    /// Position of `value` in the candidate sequence.
    pub index: usize,
}

/// Rank `candidates` against `query`, best first, at most `limit` results.
///
/// Matching is case-insensitive and accepts non-contiguous characters, so `fb`
/// finds `Foo#bar`. Equal scores keep candidate order. An empty query matches
/// nothing.
pub fn fuzzy_filter<'a, I>(query: &str, candidates: I, limit: usize) -> Vec<FuzzyMatch>
where
    I: IntoIterator<Item = &'a str>,
{
    let query = query.trim();
    if query.is_empty() || limit == 0 {
        return Vec::new();
    }

    let matcher = SkimMatcherV2::default().ignore_case();
    let mut results: Vec<FuzzyMatch> = candidates
        .into_iter()
        .enumerate()
        .filter_map(|(index, candidate)| {
            matcher
                .fuzzy_match(candidate, query)
                .map(|score| FuzzyMatch {
                    value: candidate.to_string(),
                    score,
                    index,
                })
        })
        .collect();

    // sort_by is stable
    results.sort_by(|a, b| b.score.cmp(&a.score));
    results.truncate(limit);
    results
}
