//! Marker-based highlighting for logographic text.
//!
//! Word segmentation of the query is ambiguous, so marking is deliberately
//! aggressive: the literal query string first, then each individual query
//! character, with later needles never re-marking chars already inside a
//! marker. Matching is case-insensitive and char-based throughout (byte
//! windows would split multi-byte chars).

const MARK_OPEN: &str = "<strong>";
const MARK_CLOSE: &str = "</strong>";

/// Chars of the content snippet window kept before and after the first match.
const SNIPPET_BEFORE: usize = 100;
const SNIPPET_AFTER: usize = 200;

fn fold(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

fn folded(text: &str) -> Vec<char> {
    text.chars().map(fold).collect()
}

fn find_all(haystack: &[char], needle: &[char]) -> Vec<(usize, usize)> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return Vec::new();
    }
    let mut out = Vec::new();
    for start in 0..=(haystack.len() - needle.len()) {
        if &haystack[start..start + needle.len()] == needle {
            out.push((start, start + needle.len()));
        }
    }
    out
}

/// Wrap occurrences of each needle (in priority order) in `<strong>` markers.
/// A char already covered by an earlier needle's marker is never re-marked;
/// contiguous marked runs render as one marker.
pub fn mark(text: &str, needles: &[String]) -> String {
    let chars: Vec<char> = text.chars().collect();
    let hay = folded(text);
    let mut marked = vec![false; chars.len()];

    for needle in needles {
        let needle: Vec<char> = needle.chars().filter(|c| !c.is_whitespace()).map(fold).collect();
        if needle.is_empty() {
            continue;
        }
        for (start, end) in find_all(&hay, &needle) {
            if marked[start..end].iter().any(|m| *m) {
                continue;
            }
            for m in &mut marked[start..end] {
                *m = true;
            }
        }
    }

    let mut out = String::with_capacity(text.len());
    let mut inside = false;
    for (i, c) in chars.iter().enumerate() {
        match (inside, marked[i]) {
            (false, true) => {
                out.push_str(MARK_OPEN);
                inside = true;
            }
            (true, false) => {
                out.push_str(MARK_CLOSE);
                inside = false;
            }
            _ => {}
        }
        out.push(*c);
    }
    if inside {
        out.push_str(MARK_CLOSE);
    }
    out
}

/// Char-windowed snippet around the first needle occurrence, highlighted.
/// Without a match the head of the text is used.
pub fn snippet(text: &str, needles: &[String]) -> String {
    let chars: Vec<char> = text.chars().collect();
    let hay = folded(text);

    let mut first: Option<usize> = None;
    for needle in needles {
        let needle: Vec<char> = needle.chars().filter(|c| !c.is_whitespace()).map(fold).collect();
        if needle.is_empty() {
            continue;
        }
        if let Some((start, _)) = find_all(&hay, &needle).first() {
            first = Some(*start);
            break;
        }
    }

    let window: String = match first {
        Some(idx) => {
            let start = idx.saturating_sub(SNIPPET_BEFORE);
            let end = (idx + SNIPPET_AFTER).min(chars.len());
            chars[start..end].iter().collect()
        }
        None => chars.iter().take(SNIPPET_AFTER).collect(),
    };
    mark(&window, needles)
}
