use anyhow::Result;
use rayon::prelude::*;
use search_core::analyzer::Analyzer;
use search_core::error::CoreError;
use search_core::extract;
use search_core::persist::{save_meta, IndexPaths, IndexWriter, MetaFile};
use search_core::{FileType, IndexedDocument};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use sysinfo::System;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

const MIN_BATCH: usize = 100;
const MAX_BATCH: usize = 10_000;

/// One line of the acquisition collaborator's manifest (`metadata.json`).
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestEntry {
    pub url: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub original_filename: Option<String>,
    #[serde(default)]
    pub snapshot_path: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct BuildOptions {
    pub max_entries: Option<usize>,
    pub batch_size: Option<usize>,
    pub stoplist: Option<PathBuf>,
}

#[derive(Debug)]
pub struct BuildReport {
    pub docs_indexed: usize,
    pub stubs: usize,
    pub batch_size: usize,
    pub load_secs: f64,
    pub process_secs: f64,
    pub commit_secs: f64,
    pub total_secs: f64,
}

/// Build the persisted inverted index from the collaborator's manifest.
///
/// Extraction and analysis fan out over a worker pool; commits happen on a
/// single sequential writer, non-optimizing after each full batch and
/// optimizing once at the end. Every manifest url yields exactly one indexed
/// document; unresolvable blobs become stubs, never omissions. Only a
/// manifest load failure aborts the run, and it does so before any write.
pub fn build_index(data_dir: &Path, index_dir: &Path, opts: &BuildOptions) -> Result<BuildReport> {
    let start = Instant::now();

    let load_start = Instant::now();
    let mut manifest = load_manifest(data_dir)?;
    if let Some(max) = opts.max_entries {
        manifest.truncate(max);
    }
    let load_secs = load_start.elapsed().as_secs_f64();

    let batch_size = opts
        .batch_size
        .unwrap_or_else(|| estimate_batch_size(&manifest, data_dir));

    let workers = num_cpus::get().saturating_sub(1).max(1);
    let pool = rayon::ThreadPoolBuilder::new().num_threads(workers).build()?;
    tracing::info!(entries = manifest.len(), workers, batch_size, "starting build");

    let process_start = Instant::now();
    let processed: Vec<(IndexedDocument, bool)> = pool.install(|| {
        manifest
            .par_iter()
            .map(|entry| process_entry(entry, data_dir))
            .collect()
    });
    let process_secs = process_start.elapsed().as_secs_f64();

    let commit_start = Instant::now();
    let analyzer = Analyzer::new(opts.stoplist.as_deref());
    let mut writer = IndexWriter::create(index_dir)?;
    let stubs = processed.iter().filter(|(_, stub)| *stub).count();
    for (i, (doc, _)) in processed.into_iter().enumerate() {
        writer.add_document(&analyzer, doc);
        if (i + 1) % batch_size == 0 {
            writer.commit(false)?;
        }
    }
    let num_docs = writer.commit(true)?;
    let paths = IndexPaths::new(index_dir);
    let meta = MetaFile {
        num_docs,
        created_at: OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| String::new()),
        version: 1,
    };
    save_meta(&paths, &meta)?;
    let commit_secs = commit_start.elapsed().as_secs_f64();

    let report = BuildReport {
        docs_indexed: num_docs as usize,
        stubs,
        batch_size,
        load_secs,
        process_secs,
        commit_secs,
        total_secs: start.elapsed().as_secs_f64(),
    };
    tracing::info!(docs = report.docs_indexed, stubs = report.stubs, "build complete");
    Ok(report)
}

fn load_manifest(data_dir: &Path) -> Result<Vec<ManifestEntry>, CoreError> {
    let path = data_dir.join("metadata.json");
    let text = fs::read_to_string(&path)
        .map_err(|err| CoreError::ManifestLoad(format!("{}: {err}", path.display())))?;
    serde_json::from_str(&text)
        .map_err(|err| CoreError::ManifestLoad(format!("{}: {err}", path.display())))
}

/// Page snapshots live under `pages/`, downloaded files under `files/`.
fn resolve_blob(data_dir: &Path, entry: &ManifestEntry, file_type: FileType) -> Option<PathBuf> {
    let filename = entry.filename.as_deref()?;
    let bucket = if file_type.is_markup() { "pages" } else { "files" };
    Some(data_dir.join(bucket).join(filename))
}

/// Default batch size: available memory divided by the manifest's mean
/// on-disk document size, clamped to [100, 10000].
fn estimate_batch_size(manifest: &[ManifestEntry], data_dir: &Path) -> usize {
    let mut total = 0u64;
    for entry in manifest {
        let file_type = FileType::parse(entry.file_type.as_deref(), &entry.url);
        if let Some(path) = resolve_blob(data_dir, entry, file_type) {
            if let Ok(md) = fs::metadata(&path) {
                total += md.len();
            }
        }
    }
    let avg = if manifest.is_empty() { 1 } else { (total / manifest.len() as u64).max(1) };
    let mut sys = System::new();
    sys.refresh_memory();
    ((sys.available_memory() / avg) as usize).clamp(MIN_BATCH, MAX_BATCH)
}

/// Turn one manifest entry into exactly one indexed document. Returns the
/// document and whether it is a stub.
fn process_entry(entry: &ManifestEntry, data_dir: &Path) -> (IndexedDocument, bool) {
    let file_type = FileType::parse(entry.file_type.as_deref(), &entry.url);

    let path = match resolve_blob(data_dir, entry, file_type) {
        Some(path) => path,
        None => {
            tracing::warn!(url = %entry.url, "no filename in manifest, indexing stub");
            return (stub(entry, file_type), true);
        }
    };
    let blob = match fs::read(&path) {
        Ok(blob) => blob,
        Err(err) => {
            let missing = CoreError::MissingBlob {
                url: entry.url.clone(),
                path: path.display().to_string(),
            };
            tracing::warn!(%missing, %err, "indexing stub");
            return (stub(entry, file_type), true);
        }
    };

    let (title, content) = extract::extract(
        &blob,
        file_type,
        entry.original_filename.as_deref(),
        &entry.url,
    );
    let snapshot_path = entry
        .snapshot_path
        .clone()
        .or_else(|| Some(path.display().to_string()));
    let doc = IndexedDocument {
        url: entry.url.clone(),
        title,
        content,
        file_type: file_type.as_str().to_string(),
        snapshot_path,
    };
    (doc, false)
}

fn stub(entry: &ManifestEntry, file_type: FileType) -> IndexedDocument {
    IndexedDocument {
        url: entry.url.clone(),
        title: extract::fallback_title(entry.original_filename.as_deref(), &entry.url),
        content: String::new(),
        file_type: file_type.as_str().to_string(),
        snapshot_path: None,
    }
}
