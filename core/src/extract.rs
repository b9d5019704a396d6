use crate::FileType;
use lazy_static::lazy_static;
use scraper::{Html, Selector};

/// Sentinel body for documents that are indexed by filename only.
pub const NO_CONTENT: &str = "无内容";

/// Title used when neither an original filename nor a url segment is usable.
const UNKNOWN_FILENAME: &str = "未知文件名";

lazy_static! {
    static ref SEL_TITLE: Selector = Selector::parse("title").expect("valid selector");
    static ref SEL_ARTICLE: Selector = Selector::parse("article").expect("valid selector");
    static ref SEL_CONTENT_DIV: Selector = Selector::parse("div.content").expect("valid selector");
    static ref SEL_P: Selector = Selector::parse("p").expect("valid selector");
}

/// Extract `(title, body)` from a stored blob.
///
/// Markup types get a tolerant structural parse restricted to
/// title/paragraph/div/article elements. Non-markup types are never
/// content-parsed: the title is the best-available filename and the body is
/// the `NO_CONTENT` sentinel. This function never fails; trouble yields
/// empty strings and a log line.
pub fn extract(
    blob: &[u8],
    file_type: FileType,
    original_filename: Option<&str>,
    url: &str,
) -> (String, String) {
    if file_type.is_markup() {
        extract_markup(blob, url)
    } else {
        (fallback_title(original_filename, url), NO_CONTENT.to_string())
    }
}

fn extract_markup(blob: &[u8], url: &str) -> (String, String) {
    let text = String::from_utf8_lossy(blob);
    if text.trim().is_empty() {
        tracing::warn!(url, "empty markup blob");
        return (String::new(), String::new());
    }
    let doc = Html::parse_document(&text);

    let title = doc
        .select(&SEL_TITLE)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default();

    // Paragraphs inside the first article-like container, falling back to the
    // whole document, joined by single spaces.
    let container = doc
        .select(&SEL_ARTICLE)
        .next()
        .or_else(|| doc.select(&SEL_CONTENT_DIV).next());
    let paragraphs: Vec<String> = match container {
        Some(el) => el.select(&SEL_P).map(paragraph_text).collect(),
        None => doc.select(&SEL_P).map(paragraph_text).collect(),
    };
    let body = paragraphs
        .iter()
        .filter(|p| !p.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string();

    (title, body)
}

fn paragraph_text(el: scraper::ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Best-available display name: declared original filename, else the url's
/// last non-empty path segment.
pub fn fallback_title(original_filename: Option<&str>, url: &str) -> String {
    if let Some(name) = original_filename {
        if !name.trim().is_empty() {
            return name.trim().to_string();
        }
    }
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(UNKNOWN_FILENAME)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_and_article_paragraphs() {
        let html = b"<html><head><title> \xe9\xa6\x96\xe9\xa1\xb5 </title></head>\
            <body><article><p>one</p><p>two</p></article><p>outside</p></body></html>";
        let (title, body) = extract(html, FileType::Html, None, "http://a/b");
        assert_eq!(title, "首页");
        assert_eq!(body, "one two");
    }

    #[test]
    fn falls_back_to_content_div_then_whole_document() {
        let html = b"<html><body><div class=\"content\"><p>inner</p></div><p>other</p></body></html>";
        let (_, body) = extract(html, FileType::Html, None, "http://a/b");
        assert_eq!(body, "inner");

        let html = b"<html><body><p>anywhere</p></body></html>";
        let (_, body) = extract(html, FileType::Html, None, "http://a/b");
        assert_eq!(body, "anywhere");
    }

    #[test]
    fn malformed_markup_does_not_fail() {
        let html = b"<html><title>t<body><p>unclosed";
        let (title, body) = extract(html, FileType::Html, None, "http://a/b");
        assert_eq!(title, "t");
        assert_eq!(body, "unclosed");
    }

    #[test]
    fn absent_structure_yields_empty_strings() {
        let (title, body) = extract(b"<html><body></body></html>", FileType::Html, None, "http://a/b");
        assert_eq!(title, "");
        assert_eq!(body, "");
    }

    #[test]
    fn non_markup_indexed_by_filename_only() {
        let (title, body) = extract(b"%PDF-1.4", FileType::Pdf, Some("年报.pdf"), "http://a/b/x.pdf");
        assert_eq!(title, "年报.pdf");
        assert_eq!(body, NO_CONTENT);

        let (title, _) = extract(b"", FileType::Doc, None, "http://a/b/notice.doc");
        assert_eq!(title, "notice.doc");
    }
}
