//! Turns a filtered message source into the HTML stored with the post.

use std::collections::HashMap;

const ESCAPED_QUOTE: &str = "&gt;&gt;";

/// Post IDs referenced with `>>N`, in order of first appearance.
pub fn referenced_posts(raw: &str) -> Vec<i64> {
    let mut ids = Vec::new();
    for (_, digits) in references(raw, ">>") {
        if let Ok(id) = digits.parse::<i64>() {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    ids
}

/// Escapes HTML, marks `>` lines as greentext, links `>>N` to posts whose
/// thread is known, and joins lines with `<br />`.
///
/// `threads` maps a referenced post ID to its thread ID; unknown references
/// stay plain text.
pub fn format_message(raw: &str, web_root: &str, board_dir: &str, threads: &HashMap<i64, i64>) -> String {
    raw.lines()
        .map(|line| {
            let escaped = html_escape::encode_safe(line.trim_end_matches('\r')).to_string();
            let opens_with_link = references(&escaped, ESCAPED_QUOTE)
                .first()
                .is_some_and(|(start, _)| *start == 0);
            let linked = link_references(&escaped, web_root, board_dir, threads);
            if escaped.starts_with("&gt;") && !opens_with_link {
                format!("<span class=\"greentext\">{}</span>", linked)
            } else {
                linked
            }
        })
        .collect::<Vec<_>>()
        .join("<br />")
}

fn link_references(escaped: &str, web_root: &str, board_dir: &str, threads: &HashMap<i64, i64>) -> String {
    let mut out = String::with_capacity(escaped.len());
    let mut cursor = 0;
    for (start, digits) in references(escaped, ESCAPED_QUOTE) {
        let end = start + ESCAPED_QUOTE.len() + digits.len();
        let target = digits
            .parse::<i64>()
            .ok()
            .and_then(|id| threads.get(&id).map(|thread_id| (id, *thread_id)));
        if let Some((id, thread_id)) = target {
            out.push_str(&escaped[cursor..start]);
            out.push_str(&format!(
                "<a href=\"{}/{}/res/{}.html#{}\" class=\"postref\">{}</a>",
                web_root.trim_end_matches('/'),
                board_dir,
                thread_id,
                id,
                &escaped[start..end]
            ));
            cursor = end;
        }
    }
    out.push_str(&escaped[cursor..]);
    out
}

/// Byte offset and digit run of every `<marker><digits>` occurrence.
fn references<'a>(text: &'a str, marker: &str) -> Vec<(usize, &'a str)> {
    let mut found = Vec::new();
    let mut from = 0;
    while let Some(offset) = text[from..].find(marker) {
        let start = from + offset;
        let digits_start = start + marker.len();
        let digits_len = text[digits_start..]
            .bytes()
            .take_while(u8::is_ascii_digit)
            .count();
        if digits_len > 0 {
            found.push((start, &text[digits_start..digits_start + digits_len]));
        }
        from = digits_start + digits_len;
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn links(pairs: &[(i64, i64)]) -> HashMap<i64, i64> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn escapes_markup() {
        let html = format_message("<script>alert(1)</script>", "/", "b", &HashMap::new());
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn greentext_and_line_breaks() {
        let html = format_message(">implying\nplain", "/", "b", &HashMap::new());
        assert_eq!(html, "<span class=\"greentext\">&gt;implying</span><br />plain");
    }

    #[test]
    fn known_references_become_links() {
        let html = format_message(">>12 agreed, not >>99", "/", "b", &links(&[(12, 10)]));
        assert!(html.starts_with("<a href=\"/b/res/10.html#12\" class=\"postref\">&gt;&gt;12</a>"));
        assert!(html.ends_with("not &gt;&gt;99"));
        assert!(!html.contains("greentext"));
    }

    #[test]
    fn finds_each_reference_once() {
        assert_eq!(referenced_posts(">>3 >>4\n>>3 >>x"), vec![3, 4]);
        assert!(referenced_posts("> 5").is_empty());
    }
}
