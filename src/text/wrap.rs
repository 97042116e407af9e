/// Greedily wrap `text` into lines whose measured width stays within `max_width_px`.
///
/// `measure` returns the rendered advance width of a candidate line in pixels. The current
/// line is extended word-by-word while it stays within budget; on overflow the line is
/// closed and the overflowing word starts the next one. Words are never split: a single
/// word wider than the budget is placed alone on its own line.
///
/// Empty (or all-whitespace) text yields an empty line list.
pub fn wrap_words<F>(text: &str, max_width_px: f32, mut measure: F) -> Vec<String>
where
    F: FnMut(&str) -> f32,
{
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.is_empty() {
            // A lone word is accepted regardless of width.
            current.push_str(word);
            continue;
        }

        let candidate = format!("{current} {word}");
        if measure(&candidate) <= max_width_px {
            current = candidate;
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
