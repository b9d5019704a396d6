use crate::highlight;
use crate::plan::{FieldBoosts, QueryPlan};
use crate::{RankingParams, ScoredHit};
use search_core::index::InvertedIndex;
use search_core::{DocId, Field, IndexedDocument};
use std::collections::BTreeMap;

/// Exact-phrase hits get `score * 5.0 + 200.0` so they always outrank fuzzy
/// hits in the merged list.
const EXACT_MULTIPLIER: f64 = 5.0;
const EXACT_BONUS: f64 = 200.0;
/// Fuzzy/wildcard hits below this score are discarded; phrase hits are exempt.
const SCORE_FLOOR: f64 = 0.5;
/// Candidates kept per plan before pagination.
const CANDIDATE_LIMIT: usize = 100;

const NO_TITLE_MATCH: &str = "无标题匹配";
const NO_CONTENT_MATCH: &str = "无内容匹配";

struct Bm25<'a> {
    index: &'a InvertedIndex,
    k1: f64,
    b: f64,
}

impl<'a> Bm25<'a> {
    fn new(index: &'a InvertedIndex, params: RankingParams) -> Self {
        Self { index, k1: params.k1, b: params.b }
    }

    fn idf(&self, field: Field, term: &str) -> f64 {
        let n = self.index.num_docs().max(1) as f64;
        let df = self.index.field(field).doc_freq(term) as f64;
        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }

    fn term_score(&self, field: Field, term: &str, doc_id: DocId, tf: u32) -> f64 {
        let fi = self.index.field(field);
        let len = fi.doc_len(doc_id) as f64;
        let tf = tf as f64;
        let norm = tf + self.k1 * (1.0 - self.b + self.b * len / fi.avg_len());
        if norm == 0.0 {
            return 0.0;
        }
        self.idf(field, term) * tf * (self.k1 + 1.0) / norm
    }

    /// Accumulate `boost * bm25` contributions of one term over one field.
    fn accumulate(&self, field: Field, term: &str, boost: f64, scores: &mut BTreeMap<DocId, f64>) {
        if let Some(postings) = self.index.field(field).postings(term) {
            for p in postings {
                *scores.entry(p.doc_id).or_insert(0.0) +=
                    boost * self.term_score(field, term, p.doc_id, p.tf);
            }
        }
    }
}

/// Evaluate a plan into a merged, deduplicated, score-ordered candidate list.
/// Phrase hits always precede fuzzy hits in the dedup race.
pub fn execute(
    index: &InvertedIndex,
    plan: &QueryPlan,
    raw_query: &str,
    params: RankingParams,
    files_only: bool,
) -> Vec<ScoredHit> {
    let scorer = Bm25::new(index, params);
    let (phrase_hits, fuzzy_hits) = match plan {
        QueryPlan::Phrase { terms } => (phrase_candidates(index, &scorer, terms, raw_query), Vec::new()),
        QueryPlan::Wildcard { pattern, boosts } => {
            (Vec::new(), wildcard_candidates(index, &scorer, pattern, *boosts))
        }
        QueryPlan::MultiFieldFuzzy { terms, boosts } => {
            (Vec::new(), fuzzy_candidates(index, &scorer, terms, *boosts, raw_query))
        }
    };

    let mut seen = std::collections::HashSet::new();
    let mut merged = Vec::new();
    for hit in phrase_hits.into_iter().chain(fuzzy_hits) {
        // files_only applies to every plan, phrase hits included.
        if files_only && hit.file_type == "html" {
            continue;
        }
        if seen.insert(hit.url.clone()) {
            merged.push(hit);
        }
    }
    merged
}

fn phrase_candidates(
    index: &InvertedIndex,
    scorer: &Bm25<'_>,
    terms: &[String],
    raw_query: &str,
) -> Vec<ScoredHit> {
    let needles = query_needles(raw_query);
    let mut out = Vec::new();
    for (doc_id, _matches) in index.phrase_docs(Field::Content, terms) {
        let Some(doc) = index.doc(doc_id) else { continue };
        let mut score = 0.0;
        for term in terms {
            if let Some(postings) = index.field(Field::Content).postings(term) {
                if let Ok(idx) = postings.binary_search_by_key(&doc_id, |p| p.doc_id) {
                    score += scorer.term_score(Field::Content, term, doc_id, postings[idx].tf);
                }
            }
        }
        out.push(make_hit(doc, score * EXACT_MULTIPLIER + EXACT_BONUS, true, &needles));
    }
    sort_and_cap(&mut out);
    out
}

fn fuzzy_candidates(
    index: &InvertedIndex,
    scorer: &Bm25<'_>,
    terms: &[String],
    boosts: FieldBoosts,
    raw_query: &str,
) -> Vec<ScoredHit> {
    let mut scores: BTreeMap<DocId, f64> = BTreeMap::new();
    for term in terms {
        scorer.accumulate(Field::Title, term, boosts.title, &mut scores);
        scorer.accumulate(Field::Content, term, boosts.content, &mut scores);
    }
    let needles = query_needles(raw_query);
    collect_floored(index, scores, &needles)
}

fn wildcard_candidates(
    index: &InvertedIndex,
    scorer: &Bm25<'_>,
    pattern: &str,
    boosts: FieldBoosts,
) -> Vec<ScoredHit> {
    let mut scores: BTreeMap<DocId, f64> = BTreeMap::new();
    let mut matched_terms: Vec<String> = Vec::new();
    for (field, boost) in [(Field::Title, boosts.title), (Field::Content, boosts.content)] {
        for term in index.field(field).matching_terms(pattern) {
            scorer.accumulate(field, &term, boost, &mut scores);
            if !matched_terms.contains(&term) {
                matched_terms.push(term);
            }
        }
    }
    // Highlight the expanded terms plus the pattern's literal chars.
    let mut needles = matched_terms;
    for c in pattern.chars().filter(|c| *c != '*' && *c != '?' && !c.is_whitespace()) {
        needles.push(c.to_string());
    }
    collect_floored(index, scores, &needles)
}

fn collect_floored(
    index: &InvertedIndex,
    scores: BTreeMap<DocId, f64>,
    needles: &[String],
) -> Vec<ScoredHit> {
    let mut out = Vec::new();
    for (doc_id, score) in scores {
        if score <= SCORE_FLOOR {
            continue;
        }
        if let Some(doc) = index.doc(doc_id) {
            out.push(make_hit(doc, score, false, needles));
        }
    }
    sort_and_cap(&mut out);
    out
}

/// Literal query string first, then its individual chars.
fn query_needles(raw_query: &str) -> Vec<String> {
    let mut needles = vec![raw_query.to_string()];
    for c in raw_query.chars().filter(|c| !c.is_whitespace()) {
        needles.push(c.to_string());
    }
    needles
}

fn make_hit(doc: &IndexedDocument, score: f64, is_exact: bool, needles: &[String]) -> ScoredHit {
    let title_highlight = if doc.title.is_empty() {
        NO_TITLE_MATCH.to_string()
    } else {
        highlight::mark(&doc.title, needles)
    };
    let content_highlight = if doc.content.is_empty() {
        NO_CONTENT_MATCH.to_string()
    } else {
        highlight::snippet(&doc.content, needles)
    };
    ScoredHit {
        url: doc.url.clone(),
        title: doc.title.clone(),
        title_highlight,
        content_highlight,
        score,
        file_type: doc.file_type.clone(),
        snapshot_path: doc.snapshot_path.clone(),
        is_exact,
    }
}

fn sort_and_cap(hits: &mut Vec<ScoredHit>) {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.url.cmp(&b.url))
    });
    hits.truncate(CANDIDATE_LIMIT);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan;
    use search_core::analyzer::Analyzer;

    fn index_with(docs: &[(&str, &str, &str)]) -> InvertedIndex {
        let analyzer = Analyzer::default();
        let mut index = InvertedIndex::new();
        for (url, title, content) in docs {
            index.add_document(
                &analyzer,
                IndexedDocument {
                    url: url.to_string(),
                    title: title.to_string(),
                    content: content.to_string(),
                    file_type: "html".to_string(),
                    snapshot_path: None,
                },
            );
        }
        index
    }

    #[test]
    fn phrase_hit_outranks_any_fuzzy_hit_for_the_same_document() {
        let analyzer = Analyzer::default();
        let index = index_with(&[
            ("http://a/1", "校区", "天津大学的历史沿革"),
            ("http://a/2", "校区", "大学历史与天津地理"),
        ]);

        let phrase = plan::plan("天津 大学", true, &analyzer);
        let exact = execute(&index, &phrase, "天津大学", RankingParams::default(), false);
        assert_eq!(exact.len(), 1);
        assert_eq!(exact[0].url, "http://a/1");
        assert!(exact[0].is_exact);

        let fuzzy = plan::plan("天津大学", false, &analyzer);
        let loose = execute(&index, &fuzzy, "天津大学", RankingParams::default(), false);
        let same_doc = loose.iter().find(|h| h.url == "http://a/1");
        if let Some(same_doc) = same_doc {
            assert!(exact[0].score > same_doc.score);
        }
    }

    #[test]
    fn wildcard_only_matches_prefixed_terms() {
        let analyzer = Analyzer::default();
        let index = index_with(&[
            ("http://a/1", "图书馆指南", "图书馆开放时间与图书借阅"),
            ("http://a/2", "体育场", "体育场使用说明"),
        ]);
        let p = plan::plan("图书*", false, &analyzer);
        let hits = execute(&index, &p, "图书*", RankingParams::default(), false);
        assert!(!hits.is_empty());
        assert!(hits.iter().all(|h| h.url == "http://a/1"));
    }

    #[test]
    fn uppercase_wildcard_matches_folded_dictionary_terms() {
        let analyzer = Analyzer::default();
        let index = index_with(&[("http://a/1", "Rust 教程", "rust 语言入门")]);
        let p = plan::plan("Rus*", false, &analyzer);
        let hits = execute(&index, &p, "Rus*", RankingParams::default(), false);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].url, "http://a/1");
    }

    #[test]
    fn files_only_drops_page_hits() {
        let analyzer = Analyzer::default();
        let mut index = index_with(&[("http://a/1", "校园指南", "图书馆公告")]);
        index.add_document(
            &Analyzer::default(),
            IndexedDocument {
                url: "http://a/f.pdf".to_string(),
                title: "图书馆年报".to_string(),
                content: "无内容".to_string(),
                file_type: "pdf".to_string(),
                snapshot_path: None,
            },
        );
        let p = plan::plan("图书馆", false, &analyzer);
        let hits = execute(&index, &p, "图书馆", RankingParams::default(), true);
        assert!(!hits.is_empty());
        assert!(hits.iter().all(|h| h.file_type != "html"));
    }

    #[test]
    fn files_only_applies_to_phrase_hits_too() {
        let analyzer = Analyzer::default();
        let index = index_with(&[("http://a/1", "校史", "天津大学欢迎您")]);
        let p = plan::plan("天津 大学", true, &analyzer);

        let all = execute(&index, &p, "天津大学", RankingParams::default(), false);
        assert_eq!(all.len(), 1);
        let filtered = execute(&index, &p, "天津大学", RankingParams::default(), true);
        assert!(filtered.is_empty());
    }

    #[test]
    fn highlights_mark_query_chars() {
        let analyzer = Analyzer::default();
        let index = index_with(&[("http://a/1", "图书馆指南", "图书馆开放时间")]);
        let p = plan::plan("图书馆", false, &analyzer);
        let hits = execute(&index, &p, "图书馆", RankingParams::default(), false);
        assert_eq!(hits.len(), 1);
        assert!(hits[0].title_highlight.contains("<strong>图书馆</strong>"));
        assert!(hits[0].content_highlight.contains("<strong>"));
    }
}
