use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// One historical query from the request layer's log. This core only ever
/// reads the log; appends belong to the collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(default)]
    pub id: u64,
    pub username: String,
    pub query: String,
    /// RFC 3339.
    pub timestamp: String,
}

/// Read-only handle on the query-log collaborator. Every call re-reads the
/// file, so each computation works on a snapshot taken at call start and
/// tolerates append-only growth in between.
pub struct QueryLog {
    path: PathBuf,
}

impl QueryLog {
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    pub fn entries(&self) -> Result<Vec<LogEntry>> {
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("reading query log {}", self.path.display()))?;
        let entries: Vec<LogEntry> = serde_json::from_str(&text)
            .with_context(|| format!("parsing query log {}", self.path.display()))?;
        Ok(entries)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionKind {
    History,
    Popular,
}

#[derive(Debug, Clone, Serialize)]
pub struct Suggestion {
    pub query: String,
    #[serde(rename = "type")]
    pub kind: SuggestionKind,
    pub weight: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationKind {
    Collaborative,
    Content,
}

#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub query: String,
    #[serde(rename = "type")]
    pub kind: RecommendationKind,
}

/// Up to 5 prefix completions: the user's own history weighted by their
/// interest profile, then other users' queries at unit weight, ordered by
/// weight descending. Log trouble degrades to no suggestions.
pub fn suggest(log: &QueryLog, username: &str, prefix: &str) -> Vec<Suggestion> {
    let prefix = prefix.trim();
    if prefix.is_empty() {
        return Vec::new();
    }
    let entries = match log.entries() {
        Ok(entries) => entries,
        Err(err) => {
            tracing::warn!(%err, "query log unavailable, no suggestions");
            return Vec::new();
        }
    };
    let profile = crate::personalize::interest_profile(&entries, username);
    let prefix_lower = prefix.to_lowercase();

    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for entry in entries.iter().filter(|e| e.username == username) {
        if entry.query.to_lowercase().starts_with(&prefix_lower) && seen.insert(entry.query.clone()) {
            let weight = profile.get(&entry.query.to_lowercase()).copied().unwrap_or(0.0);
            out.push(Suggestion { query: entry.query.clone(), kind: SuggestionKind::History, weight });
        }
    }
    for entry in entries.iter().filter(|e| e.username != username) {
        if entry.query.to_lowercase().starts_with(&prefix_lower) && seen.insert(entry.query.clone()) {
            out.push(Suggestion { query: entry.query.clone(), kind: SuggestionKind::Popular, weight: 1.0 });
        }
    }
    out.sort_by(|a, b| b.weight.partial_cmp(&a.weight).unwrap_or(std::cmp::Ordering::Equal));
    out.truncate(5);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use time::format_description::well_known::Rfc3339;
    use time::{Duration, OffsetDateTime};

    fn log_with(entries: &[(&str, &str)]) -> (tempfile::NamedTempFile, QueryLog) {
        let now = OffsetDateTime::now_utc();
        let entries: Vec<LogEntry> = entries
            .iter()
            .enumerate()
            .map(|(i, (user, query))| LogEntry {
                id: i as u64 + 1,
                username: user.to_string(),
                query: query.to_string(),
                timestamp: (now - Duration::days(1)).format(&Rfc3339).unwrap(),
            })
            .collect();
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "{}", serde_json::to_string(&entries).unwrap()).unwrap();
        let log = QueryLog::open(f.path());
        (f, log)
    }

    #[test]
    fn own_history_outranks_popular_queries() {
        let (_f, log) = log_with(&[
            ("alice", "图书馆开放时间"),
            ("bob", "图书馆位置"),
            ("alice", "体育场"),
        ]);
        let got = suggest(&log, "alice", "图书馆");
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].query, "图书馆开放时间");
        assert_eq!(got[0].kind, SuggestionKind::History);
        assert_eq!(got[1].kind, SuggestionKind::Popular);
    }

    #[test]
    fn caps_at_five_and_dedups() {
        let (_f, log) = log_with(&[
            ("bob", "q1"),
            ("bob", "q1"),
            ("bob", "q2"),
            ("bob", "q3"),
            ("bob", "q4"),
            ("bob", "q5"),
            ("bob", "q6"),
        ]);
        let got = suggest(&log, "alice", "q");
        assert_eq!(got.len(), 5);
        let unique: std::collections::HashSet<_> = got.iter().map(|s| s.query.clone()).collect();
        assert_eq!(unique.len(), 5);
    }

    #[test]
    fn missing_log_degrades_to_empty() {
        let log = QueryLog::open("/nonexistent/query_logs.json");
        assert!(suggest(&log, "alice", "图").is_empty());
    }
}
