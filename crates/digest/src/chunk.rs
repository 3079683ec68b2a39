//! Splitting rendered digests against the outbound message size ceiling.

/// Hard per-message ceiling imposed by the delivery channel, in characters.
pub const MAX_CHUNK_LEN: usize = 2000;

const TRUNCATION_MARKER: &str = "...";

/// Split `text` on line boundaries into chunks of at most `max_len`
/// characters. A single line longer than `max_len` is hard-truncated to
/// `max_len - 3` plus the marker and emitted as its own chunk. Joining the
/// chunks with newlines reproduces the input up to that truncation.
pub fn chunk_lines(text: &str, max_len: usize) -> Vec<String> {
    if max_len == 0 || text.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_chars = 0usize;

    for line in text.lines() {
        let line_chars = line.chars().count();

        if line_chars > max_len {
            if !current.is_empty() {
                chunks.push(current.join("\n"));
                current.clear();
            }
            chunks.push(truncate_line(line, max_len));
            current_chars = 0;
            continue;
        }

        let needed = if current.is_empty() {
            line_chars
        } else {
            current_chars + 1 + line_chars
        };

        if needed > max_len && !current.is_empty() {
            chunks.push(current.join("\n"));
            current.clear();
            current.push(line);
            current_chars = line_chars;
        } else {
            current.push(line);
            current_chars = needed;
        }
    }

    if !current.is_empty() {
        chunks.push(current.join("\n"));
    }

    chunks
}

fn truncate_line(line: &str, max_len: usize) -> String {
    let keep = max_len.saturating_sub(TRUNCATION_MARKER.len());
    let mut truncated: String = line.chars().take(keep).collect();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = chunk_lines("hello\nworld", 100);
        assert_eq!(chunks, vec!["hello\nworld".to_string()]);
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(chunk_lines("", 100).is_empty());
    }

    #[test]
    fn splits_on_line_boundaries() {
        let text = "aaaa\nbbbb\ncccc";
        let chunks = chunk_lines(text, 9);
        assert_eq!(chunks, vec!["aaaa\nbbbb".to_string(), "cccc".to_string()]);
    }

    #[test]
    fn no_chunk_exceeds_max_len() {
        let lines: Vec<String> = (0..50usize)
            .map(|i| format!("line {i} {}", "x".repeat(i)))
            .collect();
        let text = lines.join("\n");
        for chunk in chunk_lines(&text, 80) {
            assert!(chunk.chars().count() <= 80, "chunk too long: {chunk:?}");
        }
    }

    #[test]
    fn join_reproduces_original() {
        let text = "first line\n\nthird line\nfourth";
        let chunks = chunk_lines(text, 12);
        assert_eq!(chunks.join("\n"), text);
    }

    #[test]
    fn overlength_line_truncated_into_own_chunk() {
        let long = "z".repeat(50);
        let text = format!("before\n{long}\nafter");
        let chunks = chunk_lines(&text, 20);

        assert_eq!(chunks[0], "before");
        assert_eq!(chunks[1].chars().count(), 20);
        assert!(chunks[1].ends_with("..."));
        assert!(chunks[1].starts_with(&"z".repeat(17)));
        assert_eq!(chunks[2], "after");
    }

    #[test]
    fn line_exactly_at_max_is_not_truncated() {
        let line = "q".repeat(20);
        let chunks = chunk_lines(&line, 20);
        assert_eq!(chunks, vec![line]);
    }

    #[test]
    fn multibyte_content_counted_in_characters() {
        let line = "é".repeat(30);
        let chunks = chunk_lines(&line, 10);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chars().count(), 10);
        assert!(chunks[0].ends_with("..."));
    }

    #[test]
    fn digest_sized_input_chunks_in_order() {
        let lines: Vec<String> = (0..200).map(|i| format!("[10:0{}] user: message number {i}", i % 10)).collect();
        let text = lines.join("\n");
        let chunks = chunk_lines(&text, MAX_CHUNK_LEN);

        assert!(chunks.len() > 1);
        assert_eq!(chunks.join("\n"), text);
        assert!(chunks.iter().all(|c| c.chars().count() <= MAX_CHUNK_LEN));
    }
}
