pub mod cache;
pub mod highlight;
pub mod logstore;
pub mod personalize;
pub mod plan;
pub mod rank;

use crate::cache::{CacheKey, QueryCache};
use crate::logstore::{QueryLog, Recommendation, RecommendationKind, Suggestion};
use search_core::error::CoreError;
use search_core::index::InvertedIndex;
use search_core::persist::{load_index, IndexPaths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

pub const PAGE_SIZE: usize = 10;

/// BM25 parameters, supplied per user by the request layer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RankingParams {
    /// Length normalization, clamped to [0, 1]. Default 0.75.
    #[serde(rename = "B")]
    pub b: f64,
    /// Term-frequency saturation, non-negative. Default 1.5.
    #[serde(rename = "K1")]
    pub k1: f64,
}

impl Default for RankingParams {
    fn default() -> Self {
        Self { b: 0.75, k1: 1.5 }
    }
}

impl RankingParams {
    /// Out-of-range values fall back to the documented defaults.
    pub fn validated(self) -> Self {
        let defaults = Self::default();
        let b = if (0.0..=1.0).contains(&self.b) { self.b } else { defaults.b };
        let k1 = if self.k1.is_finite() && self.k1 >= 0.0 { self.k1 } else { defaults.k1 };
        if b != self.b || k1 != self.k1 {
            tracing::warn!(b = self.b, k1 = self.k1, "ranking params out of range, using defaults");
        }
        Self { b, k1 }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredHit {
    pub url: String,
    pub title: String,
    pub title_highlight: String,
    pub content_highlight: String,
    pub score: f64,
    pub file_type: String,
    pub snapshot_path: Option<String>,
    pub is_exact: bool,
}

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    /// 1-based.
    pub page: usize,
    pub files_only: bool,
    pub ranking: RankingParams,
    pub is_phrase: bool,
    pub user: Option<String>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            page: 1,
            files_only: false,
            ranking: RankingParams::default(),
            is_phrase: false,
            user: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub hits: Vec<ScoredHit>,
    pub elapsed_secs: f64,
    pub total_pages: usize,
    pub total_results: usize,
}

impl SearchResponse {
    fn empty() -> Self {
        Self { hits: Vec::new(), elapsed_secs: 0.0, total_pages: 0, total_results: 0 }
    }
}

/// Source of committed index snapshots. The disk-backed implementation
/// reloads the most recent commit; the seam also admits counting probes in
/// tests.
pub trait IndexStore: Send + Sync {
    fn snapshot(&self) -> Result<Arc<InvertedIndex>, CoreError>;
}

pub struct DiskStore {
    paths: IndexPaths,
}

impl DiskStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { paths: IndexPaths::new(root) }
    }
}

impl IndexStore for DiskStore {
    fn snapshot(&self) -> Result<Arc<InvertedIndex>, CoreError> {
        load_index(&self.paths).map(Arc::new)
    }
}

/// The query surface exposed to the request-layer collaborator: cached
/// paginated search plus log-driven suggestions and recommendations.
pub struct SearchEngine {
    store: Arc<dyn IndexStore>,
    cache: QueryCache,
    analyzer: search_core::analyzer::Analyzer,
    log: QueryLog,
}

impl SearchEngine {
    pub fn new(store: Arc<dyn IndexStore>, log: QueryLog) -> Self {
        Self {
            store,
            cache: QueryCache::default(),
            analyzer: search_core::analyzer::Analyzer::default(),
            log,
        }
    }

    pub fn open<P: AsRef<Path>, Q: AsRef<Path>>(index_dir: P, log_path: Q) -> Self {
        Self::new(Arc::new(DiskStore::new(index_dir)), QueryLog::open(log_path))
    }

    /// Evaluate one query: cache check, plan, BM25 evaluation, optional
    /// personalization, pagination. An unavailable index degrades to an
    /// empty result set with zero counts.
    pub fn search(&self, req: &SearchRequest) -> SearchResponse {
        let start = Instant::now();
        let query = req.query.trim().to_string();
        if query.is_empty() {
            return SearchResponse::empty();
        }
        let page = req.page.max(1);

        let key = CacheKey {
            query: query.clone(),
            page,
            files_only: req.files_only,
            is_phrase: req.is_phrase,
            user: req.user.clone(),
        };
        if let Some(cached) = self.cache.get(&key) {
            tracing::debug!(%query, page, "cache hit");
            return cached;
        }

        let index = match self.store.snapshot() {
            Ok(index) => index,
            Err(err) => {
                tracing::error!(%err, "index unavailable");
                return SearchResponse::empty();
            }
        };

        let plan = plan::plan(&query, req.is_phrase, &self.analyzer);
        let mut hits = rank::execute(&index, &plan, &query, req.ranking.validated(), req.files_only);
        if let Some(user) = &req.user {
            hits = personalize::rerank(hits, user, &query, &self.log);
        }

        let total_results = hits.len();
        let total_pages = total_results.div_ceil(PAGE_SIZE);
        let start_idx = (page - 1) * PAGE_SIZE;
        let paginated: Vec<ScoredHit> = hits
            .into_iter()
            .skip(start_idx)
            .take(PAGE_SIZE)
            .collect();

        let response = SearchResponse {
            hits: paginated,
            elapsed_secs: start.elapsed().as_secs_f64(),
            total_pages,
            total_results,
        };
        self.cache.put(key, response.clone());
        response
    }

    /// Up to 5 prefix completions from the query log.
    pub fn suggest(&self, username: &str, prefix: &str) -> Vec<Suggestion> {
        logstore::suggest(&self.log, username, prefix)
    }

    /// Up to 5 related queries, interleaving collaborative neighbor queries
    /// with the titles of the top content hits.
    pub fn recommend(&self, username: &str, query: &str) -> Vec<Recommendation> {
        let collaborative = match self.log.entries() {
            Ok(entries) => personalize::collaborative_queries(&entries, username, query),
            Err(err) => {
                tracing::warn!(%err, "query log unavailable, content-only recommendations");
                Vec::new()
            }
        };

        let mut req = SearchRequest::new(query);
        req.user = Some(username.to_string());
        let content: Vec<String> = self
            .search(&req)
            .hits
            .into_iter()
            .take(3)
            .map(|h| h.title)
            .filter(|t| !t.is_empty())
            .collect();

        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for i in 0..collaborative.len().max(content.len()) {
            if let Some(q) = collaborative.get(i) {
                if seen.insert(q.clone()) {
                    out.push(Recommendation {
                        query: q.clone(),
                        kind: RecommendationKind::Collaborative,
                    });
                }
            }
            if let Some(t) = content.get(i) {
                if seen.insert(t.clone()) {
                    out.push(Recommendation { query: t.clone(), kind: RecommendationKind::Content });
                }
            }
            if out.len() >= 5 {
                break;
            }
        }
        out.truncate(5);
        out
    }
}
