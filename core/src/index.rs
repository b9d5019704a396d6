use crate::analyzer::{Analyzer, Mode};
use crate::{DocId, Field, IndexedDocument};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Term occurrence in one document: frequency plus sorted positions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub tf: u32,
    pub positions: Vec<u32>,
}

/// Per-field postings plus the length statistics BM25 needs.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct FieldIndex {
    /// Ordered term dictionary; ordering enables prefix-bounded wildcard scans.
    pub postings: BTreeMap<String, Vec<Posting>>,
    pub doc_len: HashMap<DocId, u32>,
    pub total_len: u64,
}

impl FieldIndex {
    pub fn postings(&self, term: &str) -> Option<&[Posting]> {
        self.postings.get(term).map(Vec::as_slice)
    }

    pub fn doc_freq(&self, term: &str) -> usize {
        self.postings.get(term).map_or(0, Vec::len)
    }

    pub fn doc_len(&self, doc_id: DocId) -> u32 {
        self.doc_len.get(&doc_id).copied().unwrap_or(0)
    }

    pub fn avg_len(&self) -> f64 {
        if self.doc_len.is_empty() {
            1.0
        } else {
            self.total_len as f64 / self.doc_len.len() as f64
        }
    }

    fn add(&mut self, doc_id: DocId, tokens: impl Iterator<Item = crate::analyzer::Token>) {
        let mut by_term: BTreeMap<String, Vec<u32>> = BTreeMap::new();
        let mut len = 0u32;
        for token in tokens {
            by_term.entry(token.text).or_default().push(token.position);
            len += 1;
        }
        for (term, mut positions) in by_term {
            positions.sort_unstable();
            positions.dedup();
            let posting = Posting { doc_id, tf: positions.len() as u32, positions };
            self.postings.entry(term).or_default().push(posting);
        }
        self.doc_len.insert(doc_id, len);
        self.total_len += u64::from(len);
    }

    fn positions_in(&self, term: &str, doc_id: DocId) -> Option<&[u32]> {
        let plist = self.postings.get(term)?;
        let idx = plist.binary_search_by_key(&doc_id, |p| p.doc_id).ok()?;
        Some(&plist[idx].positions)
    }

    /// Enumerate dictionary terms matching a `*`/`?` pattern. This scans the
    /// term dictionary directly, bounded by the pattern's literal prefix; it
    /// never scans document text.
    pub fn matching_terms(&self, pattern: &str) -> Vec<String> {
        let re = match wildcard_regex(pattern) {
            Some(re) => re,
            None => return Vec::new(),
        };
        let prefix: String = pattern.chars().take_while(|c| *c != '*' && *c != '?').collect();
        let mut out = Vec::new();
        if prefix.is_empty() {
            for term in self.postings.keys() {
                if re.is_match(term) {
                    out.push(term.clone());
                }
            }
        } else {
            for (term, _) in self.postings.range(prefix.clone()..) {
                if !term.starts_with(&prefix) {
                    break;
                }
                if re.is_match(term) {
                    out.push(term.clone());
                }
            }
        }
        out
    }
}

fn wildcard_regex(pattern: &str) -> Option<Regex> {
    let mut expr = String::from("^");
    for c in pattern.chars() {
        match c {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            _ => expr.push_str(&regex::escape(&c.to_string())),
        }
    }
    expr.push('$');
    match Regex::new(&expr) {
        Ok(re) => Some(re),
        Err(err) => {
            tracing::warn!(pattern, %err, "unusable wildcard pattern");
            None
        }
    }
}

/// The whole inverted index: two analyzed fields plus the stored documents.
///
/// Every dictionary term derives from analyzer output; wildcard evaluation
/// enumerates the dictionary, never raw substrings of stored text.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct InvertedIndex {
    pub title: FieldIndex,
    pub content: FieldIndex,
    pub docs: HashMap<DocId, IndexedDocument>,
    pub url_to_doc: HashMap<String, DocId>,
    pub next_doc_id: DocId,
}

impl InvertedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_docs(&self) -> u32 {
        self.docs.len() as u32
    }

    pub fn field(&self, field: Field) -> &FieldIndex {
        match field {
            Field::Title => &self.title,
            Field::Content => &self.content,
        }
    }

    pub fn doc(&self, doc_id: DocId) -> Option<&IndexedDocument> {
        self.docs.get(&doc_id)
    }

    /// Index one document with the broadened `Mode::Index` split. A url seen
    /// before keeps its first record (manifests carry unique urls; rebuilds
    /// replace the whole index).
    pub fn add_document(&mut self, analyzer: &Analyzer, doc: IndexedDocument) -> DocId {
        if let Some(&existing) = self.url_to_doc.get(&doc.url) {
            tracing::debug!(url = %doc.url, "duplicate url in build, keeping first record");
            return existing;
        }
        let doc_id = self.next_doc_id;
        self.next_doc_id += 1;
        self.title.add(doc_id, analyzer.analyze(&doc.title, Mode::Index));
        self.content.add(doc_id, analyzer.analyze(&doc.content, Mode::Index));
        self.url_to_doc.insert(doc.url.clone(), doc_id);
        self.docs.insert(doc_id, doc);
        doc_id
    }

    /// Documents containing `terms` at consecutive positions in `field`,
    /// with the number of phrase occurrences per document.
    pub fn phrase_docs(&self, field: Field, terms: &[String]) -> Vec<(DocId, u32)> {
        if terms.is_empty() {
            return Vec::new();
        }
        let fi = self.field(field);
        let first = match fi.postings.get(&terms[0]) {
            Some(p) => p,
            None => return Vec::new(),
        };
        let mut out = Vec::new();
        'doc: for p0 in first {
            let mut starts: Vec<u32> = p0.positions.clone();
            for (offset, term) in terms.iter().enumerate().skip(1) {
                let positions = match fi.positions_in(term, p0.doc_id) {
                    Some(p) => p,
                    None => continue 'doc,
                };
                starts.retain(|&s| positions.binary_search(&(s + offset as u32)).is_ok());
                if starts.is_empty() {
                    continue 'doc;
                }
            }
            out.push((p0.doc_id, starts.len() as u32));
        }
        out
    }

    /// Fold another segment into this one. Doc ids are globally assigned by
    /// the writer, so postings merge without remapping.
    pub fn merge(&mut self, other: InvertedIndex) {
        merge_field(&mut self.title, other.title);
        merge_field(&mut self.content, other.content);
        self.docs.extend(other.docs);
        self.url_to_doc.extend(other.url_to_doc);
        self.next_doc_id = self.next_doc_id.max(other.next_doc_id);
    }
}

fn merge_field(into: &mut FieldIndex, from: FieldIndex) {
    for (term, postings) in from.postings {
        let entry = into.postings.entry(term).or_default();
        entry.extend(postings);
        entry.sort_by_key(|p| p.doc_id);
    }
    into.doc_len.extend(from.doc_len);
    into.total_len += from.total_len;
}
