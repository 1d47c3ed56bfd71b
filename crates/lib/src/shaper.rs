//! Response shaping: fit LLM output into radio-safe chunks.
//!
//! Every chunk respects both a character and a UTF-8 byte budget, multi-byte
//! characters are never split, and at most `max_chunks` chunks are produced
//! (overflow is dropped behind a truncation marker). Chunks are exact
//! contiguous substrings of the input: boundary whitespace stays at the end
//! of the preceding chunk, so concatenating the chunks in order reproduces a
//! prefix of the input (minus only the marker). Shaping is deterministic.

use crate::config::{LimitsConfig, TRUNCATION_MARKER};

/// Effective per-reply budgets.
#[derive(Debug, Clone, Copy)]
pub struct ChunkLimits {
    pub max_chars: usize,
    pub max_bytes: usize,
    pub max_chunks: usize,
}

impl ChunkLimits {
    /// Budgets from config; `split_long_responses: false` clamps to one chunk.
    pub fn from_config(limits: &LimitsConfig) -> Self {
        Self {
            max_chars: limits.max_msg_chars,
            max_bytes: limits.max_msg_bytes,
            max_chunks: if limits.split_long_responses {
                limits.max_chunks
            } else {
                1
            },
        }
    }
}

/// Split `text` into in-order chunks within the given budgets.
///
/// Split-point priority inside each chunk window: paragraph break, sentence
/// end, whitespace run, hard cut. A soft boundary is only taken when it keeps
/// at least 40% of the window filled, so pathological inputs cannot produce
/// near-empty chunks. Once `max_chunks` chunks exist and text remains, the
/// last chunk is shrunk to make room for the truncation marker within its own
/// budget and the marker is appended.
pub fn shape(text: &str, limits: &ChunkLimits) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let mut chunks: Vec<String> = Vec::new();
    let mut rest = text;
    while !rest.is_empty() && chunks.len() < limits.max_chunks {
        let window = utf8_prefix(rest, limits.max_chars, limits.max_bytes);
        if window.len() == rest.len() {
            chunks.push(rest.to_string());
            rest = "";
        } else {
            let cut = split_point(window);
            chunks.push(rest[..cut].to_string());
            rest = &rest[cut..];
        }
    }
    if !rest.is_empty() {
        if let Some(last) = chunks.last_mut() {
            let budget_chars = limits.max_chars.saturating_sub(TRUNCATION_MARKER.chars().count());
            let budget_bytes = limits.max_bytes.saturating_sub(TRUNCATION_MARKER.len());
            let mut kept = utf8_prefix(last, budget_chars, budget_bytes).to_string();
            kept.push_str(TRUNCATION_MARKER);
            *last = kept;
        }
    }
    chunks
}

/// Longest prefix of `s` within both budgets, ending on a char boundary.
fn utf8_prefix(s: &str, max_chars: usize, max_bytes: usize) -> &str {
    let mut end = 0;
    let mut chars = 0;
    for (i, ch) in s.char_indices() {
        let next = i + ch.len_utf8();
        if chars == max_chars || next > max_bytes {
            break;
        }
        end = next;
        chars += 1;
    }
    &s[..end]
}

/// Byte offset to cut the current chunk at, given the full budget window.
fn split_point(window: &str) -> usize {
    // Keep chunks reasonably full: boundaries in the first 40% are ignored.
    let min_cut = window.len() * 2 / 5;

    if let Some(i) = window.rfind("\n\n") {
        let cut = after_ws_run(window, i);
        if cut >= min_cut {
            return cut;
        }
    }

    let mut sentence_cut = None;
    for (i, ch) in window.char_indices() {
        if matches!(ch, '.' | '!' | '?') {
            let after = i + ch.len_utf8();
            if window[after..]
                .chars()
                .next()
                .is_some_and(char::is_whitespace)
            {
                sentence_cut = Some(after_ws_run(window, after));
            }
        }
    }
    if let Some(cut) = sentence_cut {
        if cut >= min_cut {
            return cut;
        }
    }

    if let Some(i) = window.rfind(char::is_whitespace) {
        let cut = after_ws_run(window, i);
        if cut >= min_cut {
            return cut;
        }
    }

    window.len()
}

/// Advance `i` past a whitespace run (byte offset on a char boundary).
fn after_ws_run(s: &str, mut i: usize) -> usize {
    while let Some(ch) = s[i..].chars().next() {
        if !ch.is_whitespace() {
            break;
        }
        i += ch.len_utf8();
    }
    i
}

/// Make LLM output radio-friendly: collapse runs of spaces/tabs to one space,
/// squeeze 3+ consecutive newlines down to a blank line, drop carriage
/// returns, and trim.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_spaces = false;
    let mut pending_newlines = 0usize;
    for ch in text.chars() {
        match ch {
            ' ' | '\t' => pending_spaces = true,
            '\n' => {
                pending_newlines += 1;
                pending_spaces = false;
            }
            '\r' => {}
            _ => {
                if !out.is_empty() {
                    if pending_newlines >= 2 {
                        out.push_str("\n\n");
                    } else if pending_newlines == 1 {
                        out.push('\n');
                    } else if pending_spaces {
                        out.push(' ');
                    }
                }
                pending_spaces = false;
                pending_newlines = 0;
                out.push(ch);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(max_chars: usize, max_bytes: usize, max_chunks: usize) -> ChunkLimits {
        ChunkLimits {
            max_chars,
            max_bytes,
            max_chunks,
        }
    }

    fn assert_within(chunks: &[String], l: &ChunkLimits) {
        assert!(chunks.len() <= l.max_chunks);
        for c in chunks {
            assert!(c.chars().count() <= l.max_chars, "too many chars: {:?}", c);
            assert!(c.len() <= l.max_bytes, "too many bytes: {:?}", c);
        }
    }

    #[test]
    fn short_text_is_returned_unchanged() {
        let l = limits(200, 200, 4);
        assert_eq!(shape("25", &l), vec!["25".to_string()]);
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(shape("", &limits(200, 200, 4)).is_empty());
    }

    #[test]
    fn concatenation_reproduces_the_input() {
        let text = "one two three four five six seven eight nine ten eleven twelve";
        let l = limits(20, 200, 10);
        let chunks = shape(text, &l);
        assert!(chunks.len() > 1);
        assert_within(&chunks, &l);
        assert_eq!(chunks.concat(), text);
        // Word-boundary splits: continuation chunks start mid-sentence but
        // never mid-word.
        for c in &chunks[1..] {
            assert!(!c.starts_with(' '), "boundary space belongs to the previous chunk: {:?}", c);
        }
    }

    #[test]
    fn truncation_appends_marker_within_budget() {
        let word = "word ";
        let text = word.repeat(200);
        let l = limits(160, 160, 3);
        let chunks = shape(text.trim_end(), &l);
        assert_eq!(chunks.len(), 3);
        assert_within(&chunks, &l);
        let last = chunks.last().expect("last chunk");
        assert!(last.ends_with("…"));
        let joined = chunks.concat();
        let stripped = joined.strip_suffix("…").expect("marker");
        assert!(text.starts_with(stripped));
    }

    #[test]
    fn paragraph_break_is_preferred() {
        let text = format!("{}\n\n{}", "alpha beta gamma delta", "epsilon zeta eta theta");
        let l = limits(30, 200, 4);
        let chunks = shape(&text, &l);
        assert_eq!(chunks[0], "alpha beta gamma delta\n\n");
        assert_eq!(chunks[1], "epsilon zeta eta theta");
    }

    #[test]
    fn sentence_end_is_preferred_over_word() {
        let text = "This is done. More words follow here and keep going";
        let l = limits(30, 200, 4);
        let chunks = shape(text, &l);
        assert_eq!(chunks[0], "This is done. ");
        assert!(chunks[1].starts_with("More words"));
    }

    #[test]
    fn multibyte_characters_are_never_split() {
        // Each 'é' is 2 bytes; a 5-byte budget fits two of them.
        let text = "ééééé";
        let l = limits(100, 5, 10);
        let chunks = shape(text, &l);
        assert_eq!(chunks, vec!["éé", "éé", "é"]);
        assert_within(&chunks, &l);
    }

    #[test]
    fn char_budget_binds_independently_of_bytes() {
        let text = "abcdefghij";
        let l = limits(4, 200, 10);
        let chunks = shape(text, &l);
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn unbroken_word_gets_hard_cut() {
        let text = "a".repeat(50);
        let l = limits(20, 200, 5);
        let chunks = shape(&text, &l);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks.concat(), text);
        assert_within(&chunks, &l);
    }

    #[test]
    fn early_boundary_is_ignored() {
        // The only space sits at 12% of the window; a hard cut wins.
        let text = format!("ab {}", "x".repeat(60));
        let l = limits(25, 200, 5);
        let chunks = shape(&text, &l);
        assert_eq!(chunks[0].chars().count(), 25);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn marker_fits_tight_byte_budget() {
        // 4-byte budget leaves 1 byte of content next to the 3-byte marker.
        let text = "abcdefghij";
        let l = limits(4, 4, 2);
        let chunks = shape(text, &l);
        assert_eq!(chunks.len(), 2);
        assert_within(&chunks, &l);
        assert_eq!(chunks[1], "e…");
    }

    #[test]
    fn shaping_is_deterministic() {
        let text = "Lorem ipsum dolor sit amet, consectetur adipiscing elit. ".repeat(10);
        let l = limits(80, 80, 4);
        assert_eq!(shape(&text, &l), shape(&text, &l));
    }

    #[test]
    fn normalize_collapses_space_runs_and_blank_lines() {
        assert_eq!(normalize("a   b\t\tc"), "a b c");
        assert_eq!(normalize("a\n\n\n\nb"), "a\n\nb");
        assert_eq!(normalize("  padded  "), "padded");
        assert_eq!(normalize("line\r\nnext"), "line\nnext");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn single_chunk_clamp_from_config() {
        let config = LimitsConfig {
            split_long_responses: false,
            ..LimitsConfig::default()
        };
        let l = ChunkLimits::from_config(&config);
        assert_eq!(l.max_chunks, 1);
        let chunks = shape(&"word ".repeat(100), &l);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].ends_with("…"));
    }
}
