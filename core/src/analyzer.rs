use jieba_rs::{Jieba, TokenizeMode};
use lazy_static::lazy_static;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

lazy_static! {
    static ref JIEBA: Jieba = Jieba::new();
}

/// Built-in fallback when no stoplist file is usable.
const DEFAULT_STOPWORDS: &[&str] = &["的", "是", "和", "在", "了", "有", "我", "他", "她", "它"];

/// Segmentation mode. `Exact` yields the one optimal split; `Index` also
/// reports overlapping candidate words and is used only at index time to
/// broaden recall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Exact,
    Index,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    /// Ordinal over emitted tokens. Overlapping candidates from `Mode::Index`
    /// share the ordinal of their start offset so that phrase adjacency is
    /// preserved under the broadened split; in `Mode::Exact` positions are
    /// strictly increasing and gap-free.
    pub position: u32,
    /// Char (not byte) offsets into the input.
    pub char_start: usize,
    pub char_end: usize,
}

pub struct Analyzer {
    stoplist: HashSet<String>,
}

impl Analyzer {
    /// Build an analyzer with the stoplist at `stoplist_path` (one term per
    /// line). An unreadable stoplist degrades to the built-in default set and
    /// never errors.
    pub fn new(stoplist_path: Option<&Path>) -> Self {
        let stoplist = match stoplist_path {
            Some(path) => match fs::read_to_string(path) {
                Ok(text) => text
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(String::from)
                    .collect(),
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "stoplist unavailable, using built-in default");
                    default_stoplist()
                }
            },
            None => default_stoplist(),
        };
        Self { stoplist }
    }

    /// Segment `text` into a finite, non-restartable token stream.
    ///
    /// Stopwords are matched on the original (pre-fold) form, dropped during
    /// analysis, and consume no position slot; case folding happens on emit.
    pub fn analyze(&self, text: &str, mode: Mode) -> TokenStream<'_> {
        let raw = match mode {
            Mode::Exact => JIEBA.tokenize(text, TokenizeMode::Default, true),
            Mode::Index => JIEBA.tokenize(text, TokenizeMode::Search, true),
        };
        let raw: Vec<RawToken> = raw
            .into_iter()
            .map(|t| RawToken { word: t.word.to_string(), start: t.start, end: t.end })
            .collect();
        TokenStream { raw: raw.into_iter(), stoplist: &self.stoplist, emitted: None }
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(None)
    }
}

fn default_stoplist() -> HashSet<String> {
    DEFAULT_STOPWORDS.iter().map(|s| s.to_string()).collect()
}

struct RawToken {
    word: String,
    start: usize,
    end: usize,
}

pub struct TokenStream<'a> {
    raw: std::vec::IntoIter<RawToken>,
    stoplist: &'a HashSet<String>,
    /// (furthest char_start emitted so far, position assigned to it)
    emitted: Option<(usize, u32)>,
}

impl Iterator for TokenStream<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        loop {
            let raw = self.raw.next()?;
            // Punctuation and whitespace segments carry no term.
            if !raw.word.chars().any(|c| c.is_alphanumeric()) {
                continue;
            }
            if self.stoplist.contains(&raw.word) {
                continue;
            }
            let position = match self.emitted {
                None => {
                    self.emitted = Some((raw.start, 0));
                    0
                }
                Some((max_start, last_pos)) if raw.start > max_start => {
                    self.emitted = Some((raw.start, last_pos + 1));
                    last_pos + 1
                }
                Some((_, last_pos)) => last_pos,
            };
            return Some(Token {
                text: raw.word.to_lowercase(),
                position,
                char_start: raw.start,
                char_end: raw.end,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_positions_are_gap_free() {
        let analyzer = Analyzer::default();
        let tokens: Vec<Token> = analyzer.analyze("南开大学图书馆开放时间", Mode::Exact).collect();
        assert!(!tokens.is_empty());
        for (i, t) in tokens.iter().enumerate() {
            assert_eq!(t.position, i as u32);
        }
    }

    #[test]
    fn stopwords_never_emitted_and_consume_no_slot() {
        let analyzer = Analyzer::default();
        let tokens: Vec<Token> = analyzer.analyze("图书馆的开放时间", Mode::Exact).collect();
        assert!(tokens.iter().all(|t| t.text != "的"));
        for (i, t) in tokens.iter().enumerate() {
            assert_eq!(t.position, i as u32);
        }
    }

    #[test]
    fn case_folds_after_stopword_check() {
        let analyzer = Analyzer::default();
        let tokens: Vec<Token> = analyzer.analyze("Rust 语言", Mode::Exact).collect();
        assert!(tokens.iter().any(|t| t.text == "rust"));
    }

    #[test]
    fn analysis_is_deterministic() {
        let analyzer = Analyzer::default();
        let a: Vec<Token> = analyzer.analyze("天津大学的图书馆", Mode::Index).collect();
        let b: Vec<Token> = analyzer.analyze("天津大学的图书馆", Mode::Index).collect();
        assert_eq!(a, b);
    }
}
