pub mod analyzer;
pub mod error;
pub mod extract;
pub mod index;
pub mod persist;

use serde::{Deserialize, Serialize};

pub type DocId = u32;

/// Indexed fields. Title contributions count double in ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    Title,
    Content,
}

impl Field {
    pub fn boost(self) -> f64 {
        match self {
            Field::Title => 2.0,
            Field::Content => 1.0,
        }
    }
}

/// Declared type of a harvested document. Anything unrecognized is treated
/// as a page snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Html,
    Pdf,
    Doc,
    Docx,
    Jpg,
    Png,
    Xls,
    Xlsx,
}

impl FileType {
    /// Normalize a declared type string (leading dot and case are tolerated),
    /// falling back to the url's extension when nothing was declared.
    pub fn parse(declared: Option<&str>, url: &str) -> FileType {
        let raw = match declared {
            Some(s) if !s.trim().is_empty() => s.trim().to_string(),
            _ => type_from_url(url),
        };
        match raw.trim_start_matches('.').to_lowercase().as_str() {
            "pdf" => FileType::Pdf,
            "doc" => FileType::Doc,
            "docx" => FileType::Docx,
            "jpg" | "jpeg" => FileType::Jpg,
            "png" => FileType::Png,
            "xls" => FileType::Xls,
            "xlsx" => FileType::Xlsx,
            _ => FileType::Html,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FileType::Html => "html",
            FileType::Pdf => "pdf",
            FileType::Doc => "doc",
            FileType::Docx => "docx",
            FileType::Jpg => "jpg",
            FileType::Png => "png",
            FileType::Xls => "xls",
            FileType::Xlsx => "xlsx",
        }
    }

    pub fn is_markup(self) -> bool {
        matches!(self, FileType::Html)
    }
}

fn type_from_url(url: &str) -> String {
    let last = url.rsplit('/').next().unwrap_or("");
    match last.rsplit_once('.') {
        Some((_, ext)) => ext.to_string(),
        None => "html".to_string(),
    }
}

/// One indexed record per distinct url. Never mutated after commit; a
/// re-index replaces it wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedDocument {
    pub url: String,
    pub title: String,
    pub content: String,
    pub file_type: String,
    pub snapshot_path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_type_normalizes_dots_and_case() {
        assert_eq!(FileType::parse(Some(".PDF"), "http://a/b"), FileType::Pdf);
        assert_eq!(FileType::parse(Some("docx"), "http://a/b"), FileType::Docx);
        assert_eq!(FileType::parse(None, "http://a/b/c.xls"), FileType::Xls);
        assert_eq!(FileType::parse(None, "http://a/b/page"), FileType::Html);
        assert_eq!(FileType::parse(Some("weird"), "http://a/b"), FileType::Html);
    }
}
