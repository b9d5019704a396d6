use indexer::{build_index, BuildOptions};
use search_core::persist::{load_index, load_meta, IndexPaths};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write_fixture(data_dir: &Path) {
    fs::create_dir_all(data_dir.join("pages")).unwrap();
    fs::create_dir_all(data_dir.join("files")).unwrap();
    fs::write(
        data_dir.join("pages/p1.html"),
        "<html><head><title>图书馆主页</title></head><body><article><p>图书馆开放时间公告</p></article></body></html>",
    )
    .unwrap();
    fs::write(
        data_dir.join("pages/p2.html"),
        "<html><head><title>体育场</title></head><body><p>体育场使用说明</p></body></html>",
    )
    .unwrap();
    fs::write(data_dir.join("files/report.pdf"), b"%PDF-1.4 not parsed").unwrap();
    let manifest = serde_json::json!([
        { "url": "http://campus/lib", "filename": "p1.html", "file_type": "html" },
        { "url": "http://campus/gym", "filename": "p2.html", "file_type": ".html" },
        { "url": "http://campus/report.pdf", "filename": "report.pdf", "file_type": "pdf",
          "original_filename": "年度报告.pdf" },
        { "url": "http://campus/lost.doc", "filename": "gone.doc", "file_type": "doc" },
        { "url": "http://campus/nameless" }
    ]);
    fs::write(data_dir.join("metadata.json"), serde_json::to_string_pretty(&manifest).unwrap()).unwrap();
}

#[test]
fn every_manifest_entry_yields_exactly_one_document() {
    let data = tempdir().unwrap();
    let index = tempdir().unwrap();
    write_fixture(data.path());

    let opts = BuildOptions { batch_size: Some(2), ..Default::default() };
    let report = build_index(data.path(), index.path(), &opts).unwrap();
    assert_eq!(report.docs_indexed, 5);
    assert_eq!(report.stubs, 2);
    assert_eq!(report.batch_size, 2);

    let loaded = load_index(&IndexPaths::new(index.path())).unwrap();
    let urls: HashSet<&str> = loaded.docs.values().map(|d| d.url.as_str()).collect();
    assert_eq!(urls.len(), 5);
    assert!(urls.contains("http://campus/lost.doc"));

    // Extracted page carries title and body; stub carries the best filename.
    let lib = loaded.docs.values().find(|d| d.url == "http://campus/lib").unwrap();
    assert_eq!(lib.title, "图书馆主页");
    assert!(lib.content.contains("开放时间"));
    let lost = loaded.docs.values().find(|d| d.url == "http://campus/lost.doc").unwrap();
    assert_eq!(lost.title, "lost.doc");
    assert!(lost.content.is_empty());

    // Non-markup documents are indexed by filename only.
    let pdf = loaded.docs.values().find(|d| d.url == "http://campus/report.pdf").unwrap();
    assert_eq!(pdf.title, "年度报告.pdf");
    assert_eq!(pdf.content, search_core::extract::NO_CONTENT);

    let meta = load_meta(&IndexPaths::new(index.path())).unwrap();
    assert_eq!(meta.num_docs, 5);
}

#[test]
fn rebuild_from_unchanged_manifest_is_stable() {
    let data = tempdir().unwrap();
    let index = tempdir().unwrap();
    write_fixture(data.path());

    let opts = BuildOptions::default();
    build_index(data.path(), index.path(), &opts).unwrap();
    let first = load_index(&IndexPaths::new(index.path())).unwrap();

    build_index(data.path(), index.path(), &opts).unwrap();
    let second = load_index(&IndexPaths::new(index.path())).unwrap();

    assert_eq!(first.num_docs(), second.num_docs());
    let a: HashSet<String> = first.docs.values().map(|d| d.url.clone()).collect();
    let b: HashSet<String> = second.docs.values().map(|d| d.url.clone()).collect();
    assert_eq!(a, b);
}

#[test]
fn max_entries_truncates_the_manifest() {
    let data = tempdir().unwrap();
    let index = tempdir().unwrap();
    write_fixture(data.path());

    let opts = BuildOptions { max_entries: Some(2), ..Default::default() };
    let report = build_index(data.path(), index.path(), &opts).unwrap();
    assert_eq!(report.docs_indexed, 2);
}

#[test]
fn manifest_load_failure_aborts_before_any_write() {
    let data = tempdir().unwrap();
    let index = tempdir().unwrap();
    fs::write(data.path().join("metadata.json"), "{ not json").unwrap();

    let err = build_index(data.path(), index.path(), &BuildOptions::default());
    assert!(err.is_err());
    assert!(!index.path().join("index.bin").exists());
}
