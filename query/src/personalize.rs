use crate::logstore::{LogEntry, QueryLog};
use crate::ScoredHit;
use std::collections::{HashMap, HashSet};
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};

/// Interest profiles only look this far back.
const RECENCY_WINDOW_DAYS: i64 = 30;
/// Most similar users consulted for the collaborative boost.
const NEIGHBOR_COUNT: usize = 5;
const COLLABORATIVE_BOOST: f64 = 1.5;
const INTEREST_WEIGHT: f64 = 0.25;
const SIMILARITY_WEIGHT: f64 = 0.3;
const MAX_RERANKED: usize = 100;

/// Re-score and re-order a result set for one user.
///
/// Any trouble building the profile (unreadable log, no history at all)
/// degrades to returning the input unchanged; personalization never fails a
/// query.
pub fn rerank(hits: Vec<ScoredHit>, username: &str, query: &str, log: &QueryLog) -> Vec<ScoredHit> {
    let entries = match log.entries() {
        Ok(entries) => entries,
        Err(err) => {
            tracing::warn!(user = username, %err, "profile build failed, returning hits unmodified");
            return hits;
        }
    };
    rerank_with(hits, username, query, &entries)
}

pub fn rerank_with(
    mut hits: Vec<ScoredHit>,
    username: &str,
    query: &str,
    entries: &[LogEntry],
) -> Vec<ScoredHit> {
    // A user with no history has nothing to personalize on: identity.
    if !entries.iter().any(|e| e.username == username) {
        return hits;
    }

    let profile = interest_profile(entries, username);
    let query_terms: Vec<String> = query.to_lowercase().split_whitespace().map(String::from).collect();
    let neighbor_queries = collaborative_queries(entries, username, query);
    let domains: Vec<String> = hits.iter().map(|h| domain_of(&h.url)).collect();

    for (i, hit) in hits.iter_mut().enumerate() {
        let doc_terms: Vec<String> = format!("{} {}", hit.title, hit.content_highlight)
            .to_lowercase()
            .split_whitespace()
            .map(String::from)
            .collect();

        let interest: f64 = doc_terms
            .iter()
            .filter_map(|t| profile.get(t))
            .sum();
        let similarity = cosine_similarity(&query_terms, &doc_terms);
        let boost = if neighbor_queries
            .iter()
            .any(|q| hit.title.to_lowercase().contains(&q.to_lowercase()))
        {
            COLLABORATIVE_BOOST
        } else {
            1.0
        };
        let prior = domains[..i]
            .iter()
            .filter(|d| !d.is_empty() && **d == domains[i])
            .count();
        let penalty = diversity_penalty(prior);

        hit.score = hit.score
            * (1.0 + INTEREST_WEIGHT * interest + SIMILARITY_WEIGHT * similarity)
            * boost
            * penalty;
    }

    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.url.cmp(&b.url))
    });
    hits.truncate(MAX_RERANKED);
    hits
}

/// Recency-weighted term weights from the user's queries in the last 30
/// days. Weights scale linearly from 1.0 at the window edge to 2.0 now.
pub fn interest_profile(entries: &[LogEntry], username: &str) -> HashMap<String, f64> {
    let window_start = OffsetDateTime::now_utc() - Duration::days(RECENCY_WINDOW_DAYS);
    let mut profile: HashMap<String, f64> = HashMap::new();
    for entry in entries.iter().filter(|e| e.username == username) {
        let ts = match OffsetDateTime::parse(&entry.timestamp, &Rfc3339) {
            Ok(ts) => ts,
            Err(err) => {
                tracing::debug!(timestamp = %entry.timestamp, %err, "skipping unparseable log entry");
                continue;
            }
        };
        if ts <= window_start {
            continue;
        }
        let weight = 1.0 + (ts - window_start).whole_days() as f64 / RECENCY_WINDOW_DAYS as f64;
        for term in entry.query.to_lowercase().split_whitespace() {
            *profile.entry(term.to_string()).or_insert(0.0) += weight;
        }
    }
    profile
}

/// Neighbor queries: take the 5 users most similar to `username` by Jaccard
/// similarity of their distinct query sets, pool their queries, keep the
/// ones sharing terms with the current query, best first, capped at 5.
pub fn collaborative_queries(entries: &[LogEntry], username: &str, query: &str) -> Vec<String> {
    let user_queries: HashSet<&str> = entries
        .iter()
        .filter(|e| e.username == username)
        .map(|e| e.query.as_str())
        .collect();

    let mut others: HashMap<&str, HashSet<&str>> = HashMap::new();
    for entry in entries.iter().filter(|e| e.username != username) {
        others.entry(entry.username.as_str()).or_default().insert(entry.query.as_str());
    }

    let mut similarities: Vec<(&str, f64)> = others
        .iter()
        .map(|(user, queries)| (*user, jaccard(&user_queries, queries)))
        .collect();
    similarities.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(b.0))
    });

    let neighbors: HashSet<&str> = similarities
        .iter()
        .take(NEIGHBOR_COUNT)
        .map(|(user, _)| *user)
        .collect();
    let pooled: HashSet<&str> = entries
        .iter()
        .filter(|e| neighbors.contains(e.username.as_str()))
        .map(|e| e.query.as_str())
        .collect();

    let current: HashSet<String> = query.to_lowercase().split_whitespace().map(String::from).collect();
    let mut relevant: Vec<(String, f64)> = pooled
        .into_iter()
        .filter_map(|candidate| {
            let terms: HashSet<String> =
                candidate.to_lowercase().split_whitespace().map(String::from).collect();
            let inter = current.intersection(&terms).count();
            let union = current.union(&terms).count();
            let sim = if union == 0 { 0.0 } else { inter as f64 / union as f64 };
            (sim > 0.0).then(|| (candidate.to_string(), sim))
        })
        .collect();
    relevant.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    relevant.into_iter().take(NEIGHBOR_COUNT).map(|(q, _)| q).collect()
}

/// Cosine similarity of two term-frequency vectors; 0.0 when either is empty.
pub fn cosine_similarity(a: &[String], b: &[String]) -> f64 {
    let va = term_counts(a);
    let vb = term_counts(b);
    let num: f64 = va
        .iter()
        .filter_map(|(term, c)| vb.get(term).map(|d| (*c * *d) as f64))
        .sum();
    let norm = |v: &HashMap<&String, u32>| {
        v.values().map(|c| (*c * *c) as f64).sum::<f64>().sqrt()
    };
    let den = norm(&va) * norm(&vb);
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

fn term_counts(terms: &[String]) -> HashMap<&String, u32> {
    let mut counts = HashMap::new();
    for term in terms {
        *counts.entry(term).or_insert(0) += 1;
    }
    counts
}

fn jaccard(a: &HashSet<&str>, b: &HashSet<&str>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Penalty for a hit whose domain already appeared `prior` times above it.
/// Domain is the url's third `/`-segment (the scheme-stripped authority);
/// urls with unusual shapes key poorly (known limitation).
fn diversity_penalty(prior: usize) -> f64 {
    1.0 - 0.1 * prior.min(3) as f64
}

fn domain_of(url: &str) -> String {
    url.split('/').nth(2).unwrap_or("").to_string()
}
