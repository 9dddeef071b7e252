//! Sliding-window chunker.
//!
//! Windows of `width` characters with `overlap` characters shared between
//! neighbors. Boundaries snap to the nearest whitespace within ±64
//! characters so words survive intact. Spans are measured in characters and
//! partition the input: the union of spans covers the whole text.

/// How far a window boundary may move to find whitespace.
pub const SNAP_RADIUS: usize = 64;

/// One window over a parent item's body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub ordinal: u32,
    pub text: String,
    /// Character span `[start, end)` into the parent text.
    pub span: (usize, usize),
}

/// Splits `text` into overlapping chunks. `width` must exceed `overlap`
/// (enforced by config validation); short inputs yield a single chunk.
pub fn chunk_text(text: &str, width: usize, overlap: usize) -> Vec<Chunk> {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();

    if len == 0 {
        return Vec::new();
    }

    if len <= width {
        return vec![Chunk {
            ordinal: 0,
            text: text.to_string(),
            span: (0, len),
        }];
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut ordinal = 0u32;

    loop {
        let raw_end = (start + width).min(len);
        let end = if raw_end < len {
            snap_to_whitespace(&chars, raw_end, start)
        } else {
            len
        };

        chunks.push(Chunk {
            ordinal,
            text: chars[start..end].iter().collect(),
            span: (start, end),
        });
        ordinal += 1;

        if end >= len {
            break;
        }

        // Guaranteed progress even under degenerate width/overlap pairs.
        start = end.saturating_sub(overlap).max(start + 1);
    }

    chunks
}

/// Picks the whitespace position closest to `target` within the snap
/// radius, staying inside `(floor, len]`. Falls back to `target` when the
/// window contains no whitespace (one very long word).
fn snap_to_whitespace(chars: &[char], target: usize, floor: usize) -> usize {
    let lo = target.saturating_sub(SNAP_RADIUS).max(floor + 1);
    let hi = (target + SNAP_RADIUS).min(chars.len());

    let mut best: Option<usize> = None;
    for pos in lo..hi {
        if !chars[pos].is_whitespace() {
            continue;
        }
        // Cutting at `pos` leaves the whitespace on the next chunk.
        if best.is_none_or(|b| pos.abs_diff(target) < b.abs_diff(target)) {
            best = Some(pos);
        }
    }

    best.unwrap_or(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIDTH: usize = 800;
    const OVERLAP: usize = 120;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("word{i}")).collect::<Vec<_>>().join(" ")
    }

    fn check_invariants(text: &str, chunks: &[Chunk]) {
        let len = text.chars().count();

        // Ordinals are dense from zero.
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.ordinal, i as u32);
        }

        // Spans cover the text and no span exceeds width + snap radius.
        assert_eq!(chunks.first().unwrap().span.0, 0);
        assert_eq!(chunks.last().unwrap().span.1, len);
        for chunk in chunks {
            assert!(chunk.span.1 - chunk.span.0 <= WIDTH + SNAP_RADIUS);
        }

        // Consecutive spans overlap by at least overlap - snap radius.
        for pair in chunks.windows(2) {
            assert!(pair[1].span.0 < pair[0].span.1, "spans must be contiguous");
            let shared = pair[0].span.1 - pair[1].span.0;
            assert!(shared >= OVERLAP.saturating_sub(SNAP_RADIUS));
        }
    }

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = chunk_text("a short bulletin", WIDTH, OVERLAP);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].span, (0, 16));
        assert_eq!(chunks[0].text, "a short bulletin");
    }

    #[test]
    fn empty_text_yields_nothing() {
        assert!(chunk_text("", WIDTH, OVERLAP).is_empty());
    }

    #[test]
    fn long_text_satisfies_window_invariants() {
        let text = words(900);
        let chunks = chunk_text(&text, WIDTH, OVERLAP);
        assert!(chunks.len() > 1);
        check_invariants(&text, &chunks);
    }

    #[test]
    fn boundaries_do_not_split_words() {
        let text = words(600);
        let chunks = chunk_text(&text, WIDTH, OVERLAP);

        for chunk in &chunks[..chunks.len() - 1] {
            // Each non-final chunk must end exactly at a word end: the
            // character after the cut is whitespace (left on the next chunk).
            let next: char = text.chars().nth(chunk.span.1).unwrap();
            assert!(
                next.is_whitespace() || chunk.text.ends_with(|c: char| c.is_whitespace()),
                "chunk {} ends mid-word",
                chunk.ordinal
            );
        }
    }

    #[test]
    fn unbroken_text_falls_back_to_hard_cut() {
        let text = "x".repeat(2000);
        let chunks = chunk_text(&text, WIDTH, OVERLAP);
        assert!(chunks.len() > 1);
        check_invariants(&text, &chunks);
        assert_eq!(chunks[0].span, (0, WIDTH));
    }

    #[test]
    fn chunking_is_deterministic() {
        let text = words(500);
        assert_eq!(chunk_text(&text, WIDTH, OVERLAP), chunk_text(&text, WIDTH, OVERLAP));
    }

    #[test]
    fn multibyte_text_spans_are_character_based() {
        let text = "日本語のテキスト ".repeat(200);
        let chunks = chunk_text(&text, WIDTH, OVERLAP);
        let total: usize = text.chars().count();
        assert_eq!(chunks.last().unwrap().span.1, total);
        for chunk in &chunks {
            assert_eq!(chunk.text.chars().count(), chunk.span.1 - chunk.span.0);
        }
    }
}
