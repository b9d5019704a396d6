use crate::analyzer::Analyzer;
use crate::error::CoreError;
use crate::index::InvertedIndex;
use crate::{DocId, IndexedDocument};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs::{self, create_dir_all, File};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub created_at: String,
    pub version: u32,
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn index(&self) -> PathBuf {
        self.root.join("index.bin")
    }
    fn meta(&self) -> PathBuf {
        self.root.join("meta.json")
    }
    fn segments_dir(&self) -> PathBuf {
        self.root.join("segments")
    }
    fn segment(&self, seq: u32) -> PathBuf {
        self.segments_dir().join(format!("{seq:06}.seg.bin"))
    }
}

/// Single sequential writer with batched commits.
///
/// A non-optimizing commit flushes the pending in-memory segment to its own
/// file and frees it, bounding peak writer memory. The final optimizing
/// commit merges every segment into one `index.bin` and removes the segment
/// files; queries only ever read the merged artifact.
pub struct IndexWriter {
    paths: IndexPaths,
    pending: InvertedIndex,
    next_segment: u32,
    next_doc_id: DocId,
}

impl IndexWriter {
    pub fn create<P: AsRef<Path>>(root: P) -> Result<Self> {
        let paths = IndexPaths::new(root);
        create_dir_all(paths.segments_dir())?;
        // A rebuild replaces the previous artifact wholesale.
        for entry in fs::read_dir(paths.segments_dir())? {
            let entry = entry?;
            fs::remove_file(entry.path())?;
        }
        if paths.index().exists() {
            fs::remove_file(paths.index())?;
        }
        Ok(Self { paths, pending: InvertedIndex::new(), next_segment: 0, next_doc_id: 0 })
    }

    pub fn add_document(&mut self, analyzer: &Analyzer, doc: IndexedDocument) {
        self.pending.next_doc_id = self.next_doc_id;
        self.pending.add_document(analyzer, doc);
        self.next_doc_id = self.pending.next_doc_id;
    }

    /// Commit pending documents. Returns the total number of documents in the
    /// index so far; with `optimize` the merged artifact is written out.
    pub fn commit(&mut self, optimize: bool) -> Result<u32> {
        if optimize {
            return self.finalize();
        }
        if self.pending.num_docs() > 0 {
            let segment = std::mem::take(&mut self.pending);
            let bytes = bincode::serialize(&segment)?;
            let mut f = File::create(self.paths.segment(self.next_segment))?;
            f.write_all(&bytes)?;
            tracing::info!(segment = self.next_segment, docs = segment.num_docs(), "committed segment");
            self.next_segment += 1;
        }
        Ok(self.next_doc_id)
    }

    fn finalize(&mut self) -> Result<u32> {
        let mut merged = InvertedIndex::new();
        for seq in 0..self.next_segment {
            let path = self.paths.segment(seq);
            let bytes = fs::read(&path)?;
            let segment: InvertedIndex = bincode::deserialize(&bytes)?;
            merged.merge(segment);
        }
        merged.merge(std::mem::take(&mut self.pending));
        merged.next_doc_id = self.next_doc_id;

        let bytes = bincode::serialize(&merged)?;
        let mut f = File::create(self.paths.index())?;
        f.write_all(&bytes)?;
        for seq in 0..self.next_segment {
            fs::remove_file(self.paths.segment(seq)).ok();
        }
        self.next_segment = 0;
        tracing::info!(docs = merged.num_docs(), "optimized index written");
        Ok(merged.num_docs())
    }
}

/// Load the most recently committed merged index.
pub fn load_index(paths: &IndexPaths) -> Result<InvertedIndex, CoreError> {
    let path = paths.index();
    let bytes = fs::read(&path).map_err(|err| CoreError::IndexUnavailable {
        path: path.display().to_string(),
        reason: err.to_string(),
    })?;
    bincode::deserialize(&bytes).map_err(|err| CoreError::IndexUnavailable {
        path: path.display().to_string(),
        reason: err.to_string(),
    })
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let buf = fs::read_to_string(paths.meta())?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn doc(url: &str, content: &str) -> IndexedDocument {
        IndexedDocument {
            url: url.to_string(),
            title: "标题".to_string(),
            content: content.to_string(),
            file_type: "html".to_string(),
            snapshot_path: None,
        }
    }

    #[test]
    fn batched_commits_then_optimize_roundtrip() {
        let dir = tempdir().unwrap();
        let analyzer = Analyzer::default();
        let mut writer = IndexWriter::create(dir.path()).unwrap();

        for i in 0..5 {
            writer.add_document(&analyzer, doc(&format!("http://a/{i}"), "图书馆开放时间"));
            if (i + 1) % 2 == 0 {
                writer.commit(false).unwrap();
            }
        }
        let total = writer.commit(true).unwrap();
        assert_eq!(total, 5);

        let paths = IndexPaths::new(dir.path());
        let index = load_index(&paths).unwrap();
        assert_eq!(index.num_docs(), 5);
        assert_eq!(index.content.doc_freq("图书馆"), 5);
        // Segment files are gone after the optimizing commit.
        assert_eq!(fs::read_dir(paths.segments_dir()).unwrap().count(), 0);
    }

    #[test]
    fn missing_artifact_is_index_unavailable() {
        let dir = tempdir().unwrap();
        let err = load_index(&IndexPaths::new(dir.path())).unwrap_err();
        assert!(matches!(err, CoreError::IndexUnavailable { .. }));
    }
}
