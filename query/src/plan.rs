use search_core::analyzer::{Analyzer, Mode};

/// Per-field score multipliers for one query evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldBoosts {
    pub title: f64,
    pub content: f64,
}

impl Default for FieldBoosts {
    fn default() -> Self {
        Self { title: 2.0, content: 1.0 }
    }
}

/// Execution plan, chosen once per incoming query string and immutable for
/// the duration of one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryPlan {
    /// Consecutive-position match against the content field only.
    Phrase { terms: Vec<String> },
    /// Term-dictionary pattern scan over both fields.
    Wildcard { pattern: String, boosts: FieldBoosts },
    /// Analyzed terms OR-ed across both fields.
    MultiFieldFuzzy { terms: Vec<String>, boosts: FieldBoosts },
}

/// Pick the plan for a raw query string.
///
/// Wildcard boosts are content-adaptive: a leading wildcard favors content
/// over title, a trailing one favors title over content. The heuristic is
/// carried over from the original ranking behavior rather than derived from
/// a principle.
pub fn plan(query: &str, is_phrase: bool, analyzer: &Analyzer) -> QueryPlan {
    if is_phrase {
        let terms = query
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .collect();
        return QueryPlan::Phrase { terms };
    }
    if query.contains(['*', '?']) {
        let boosts = if query.starts_with('*') {
            FieldBoosts { title: 1.0, content: 2.0 }
        } else if query.ends_with('*') {
            FieldBoosts { title: 3.0, content: 1.0 }
        } else {
            FieldBoosts::default()
        };
        // The dictionary holds folded terms, so the pattern folds too.
        return QueryPlan::Wildcard { pattern: query.to_lowercase(), boosts };
    }
    let terms = analyzer
        .analyze(query, Mode::Exact)
        .map(|t| t.text)
        .collect();
    QueryPlan::MultiFieldFuzzy { terms, boosts: FieldBoosts::default() }
}
