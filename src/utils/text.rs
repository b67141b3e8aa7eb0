/// Splits `text` into chunks of at most `limit` chars. A newline sitting
/// right at the window edge is the split point and is consumed; otherwise
/// the cut happens right after the last newline inside the window (the
/// newline stays with the chunk), or at the window edge when there is none.
/// Empty input yields no chunks.
pub fn split_message(text: &str, limit: usize) -> Vec<&str> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let window_end = match rest.char_indices().nth(limit) {
            Some((index, _)) => index,
            None => {
                chunks.push(rest);
                break;
            }
        };

        let (cut, resume) = if rest[window_end..].starts_with('\n') {
            (window_end, window_end + 1)
        } else {
            match rest[..window_end].rfind('\n') {
                Some(newline) if newline > 0 => (newline + 1, newline + 1),
                _ => (window_end, window_end),
            }
        };
        chunks.push(&rest[..cut]);
        rest = &rest[resume..];
    }

    chunks
}

pub fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

#[cfg(test)]
mod tests {
    use rand::seq::SliceRandom;
    use rand::Rng;

    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(split_message("hello\nworld", 3500), vec!["hello\nworld"]);
        assert_eq!(split_message("abcd", 4), vec!["abcd"]);
    }

    #[test]
    fn empty_text_has_no_chunks() {
        assert!(split_message("", 10).is_empty());
    }

    #[test]
    fn prefers_last_newline_in_window() {
        let chunks = split_message("aaa\nbbb\ncccc", 9);
        assert_eq!(chunks, vec!["aaa\nbbb\n", "cccc"]);
    }

    #[test]
    fn hard_cut_without_newline() {
        assert_eq!(split_message("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn counts_chars_not_bytes() {
        let text = "приветмир";
        let chunks = split_message(text, 6);
        assert_eq!(chunks, vec!["привет", "мир"]);
    }

    #[test]
    fn leading_newline_does_not_make_empty_chunk() {
        let chunks = split_message("\nabcdef", 3);
        assert!(chunks.iter().all(|chunk| !chunk.is_empty()));
        assert_eq!(chunks, vec!["\nab", "cde", "f"]);
    }

    #[test]
    fn newline_at_the_window_edge_is_the_split_point() {
        assert_eq!(split_message("abcd\n", 4), vec!["abcd"]);
        assert_eq!(split_message("abcd\nefg", 4), vec!["abcd", "efg"]);
        assert_eq!(split_message("ab\ncd\n", 4), vec!["ab\n", "cd\n"]);
        assert_eq!(split_message("abc\n\nxy", 4), vec!["abc\n", "xy"]);
    }

    /// Walks `text` through `chunks`, restoring the newline consumed after
    /// every full-width chunk.
    fn rejoins(text: &str, chunks: &[&str], limit: usize) -> bool {
        let mut rest = text;
        for chunk in chunks {
            let Some(after) = rest.strip_prefix(chunk) else {
                return false;
            };
            rest = after;
            if chunk.chars().count() == limit {
                rest = rest.strip_prefix('\n').unwrap_or(rest);
            }
        }
        rest.is_empty()
    }

    #[test]
    fn long_values_are_truncated_for_logs() {
        assert_eq!(truncate_for_log("short", 10), "short");
        assert_eq!(truncate_for_log("абвгдеж", 3), "абв... (truncated)");
    }

    #[test]
    fn random_texts_round_trip_within_limit() {
        let mut rng = rand::thread_rng();
        let pieces = ["word ", "слово ", "\n", "\n\n", "🏠", "x"];
        for _ in 0..300 {
            let limit = rng.gen_range(1..40);
            let count = rng.gen_range(0..120);
            let text: String = (0..count)
                .map(|_| *pieces.choose(&mut rng).unwrap())
                .collect();
            let chunks = split_message(&text, limit);
            assert!(rejoins(&text, &chunks, limit), "{text:?} -> {chunks:?}");
            assert!(chunks.iter().all(|chunk| !chunk.is_empty()));
            assert!(chunks.iter().all(|chunk| chunk.chars().count() <= limit));
            if !text.is_empty() && text.chars().count() <= limit {
                assert_eq!(chunks, vec![text.as_str()]);
            }
        }
    }
}
