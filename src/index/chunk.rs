//! Chunk boundary detection.

use std::ops::Range;

/// Split `text` into byte ranges of at most `limit` bytes.
///
/// Cuts prefer a blank line, then a line end, then a statement end, and fall
/// back to a hard cut on a char boundary. The ranges are contiguous and cover
/// the whole text. A range is never longer than `limit` characters.
pub fn boundaries(text: &str, limit: usize) -> Vec<Range<usize>> {
    let limit = limit.max(1);
    let mut ranges = Vec::new();
    let mut start = 0;

    while start < text.len() {
        if text.len() - start <= limit {
            ranges.push(start..text.len());
            break;
        }

        let mut hard = start + limit;
        while !text.is_char_boundary(hard) {
            hard -= 1;
        }
        if hard == start {
            // A single character wider than the limit.
            hard = start + 1;
            while !text.is_char_boundary(hard) {
                hard += 1;
            }
        }

        let cut = preferred_cut(&text[start..hard])
            .map(|offset| start + offset)
            .unwrap_or(hard);
        ranges.push(start..cut);
        start = cut;
    }

    ranges
}

fn preferred_cut(window: &str) -> Option<usize> {
    let half = window.len() / 2;
    window
        .rfind("\n\n")
        .map(|i| i + 2)
        .filter(|&cut| cut > half)
        .or_else(|| window.rfind('\n').map(|i| i + 1).filter(|&cut| cut > half))
        .or_else(|| {
            window
                .rfind(|c| c == ';' || c == '}')
                .map(|i| i + 1)
                .filter(|&cut| cut > 0)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_covers(text: &str, ranges: &[Range<usize>], limit: usize) {
        assert_eq!(ranges.first().map(|r| r.start), Some(0));
        assert_eq!(ranges.last().map(|r| r.end), Some(text.len()));
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        for r in ranges {
            assert!(text[r.clone()].chars().count() <= limit);
        }
    }

    #[test]
    fn test_small_text_is_one_chunk() {
        assert_eq!(boundaries("fn main() {}\n", 100), vec![0..13]);
        assert!(boundaries("", 100).is_empty());
    }

    #[test]
    fn test_prefers_blank_lines() {
        let text = "alpha line one\nalpha line two\n\nbeta line one\nbeta line two\n";
        let ranges = boundaries(text, 40);
        assert_covers(text, &ranges, 40);
        assert_eq!(&text[ranges[0].clone()], "alpha line one\nalpha line two\n\n");
    }

    #[test]
    fn test_falls_back_to_statement_then_hard_cut() {
        let text = "a=1;b=2;c=3;d=4;";
        let ranges = boundaries(text, 6);
        assert_covers(text, &ranges, 6);
        assert_eq!(&text[ranges[0].clone()], "a=1;");

        let text = "abcdefghij";
        let ranges = boundaries(text, 4);
        assert_eq!(ranges, vec![0..4, 4..8, 8..10]);
    }

    #[test]
    fn test_respects_char_boundaries() {
        let text = "ééééé";
        let ranges = boundaries(text, 3);
        assert_covers(text, &ranges, 3);
        for r in &ranges {
            assert!(text.is_char_boundary(r.start) && text.is_char_boundary(r.end));
        }
    }
}
