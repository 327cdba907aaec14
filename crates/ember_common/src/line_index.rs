//! Line-start indexing for fast line/column lookup in script sources.

/// Byte offsets of every line start in a source text.
///
/// The first entry is always 0. Built once per script after a cache entry
/// is restored, so that function start positions can be reported as
/// line/column pairs.
///
/// Columns are counted in characters, the same unit as the source hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    line_starts: Vec<u32>,
    /// Byte offset and extra width of every multi-byte character.
    wide_chars: Vec<(u32, u32)>,
    len: u32,
}

impl LineIndex {
    /// Computes the line starts of `source`.
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0u32];
        let mut wide_chars = Vec::new();
        for (i, ch) in source.char_indices() {
            if ch == '\n' {
                line_starts.push((i + 1) as u32);
            } else if ch.len_utf8() > 1 {
                wide_chars.push((i as u32, (ch.len_utf8() - 1) as u32));
            }
        }
        Self {
            line_starts,
            wide_chars,
            len: source.len() as u32,
        }
    }

    /// Returns the number of lines.
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Converts a byte offset into 1-indexed (line, column) coordinates.
    ///
    /// The column counts characters from the line start. Offsets past the
    /// end of the source are clamped to the end.
    pub fn line_col(&self, byte_offset: u32) -> (u32, u32) {
        let offset = byte_offset.min(self.len);
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx - 1,
        };
        let line_start = self.line_starts[line_idx];
        let first = self.wide_chars.partition_point(|&(at, _)| at < line_start);
        let last = self.wide_chars.partition_point(|&(at, _)| at < offset);
        let extra: u32 = self.wide_chars[first..last]
            .iter()
            .map(|&(at, width)| width.min(offset - at - 1))
            .sum();
        let line = (line_idx as u32) + 1;
        let col = offset - line_start - extra + 1;
        (line, col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_starts_computation() {
        let index = LineIndex::new("abc\ndef\nghi");
        assert_eq!(index.line_starts, vec![0, 4, 8]);
        assert_eq!(index.line_count(), 3);
    }

    #[test]
    fn line_col_resolution() {
        let index = LineIndex::new("abc\ndef\nghi");
        assert_eq!(index.line_col(0), (1, 1));
        assert_eq!(index.line_col(4), (2, 1));
        assert_eq!(index.line_col(5), (2, 2));
        assert_eq!(index.line_col(8), (3, 1));
    }

    #[test]
    fn empty_source() {
        let index = LineIndex::new("");
        assert_eq!(index.line_count(), 1);
        assert_eq!(index.line_col(0), (1, 1));
    }

    #[test]
    fn columns_count_characters() {
        let source = "let s = \"héllo\"; f()\n→ g()";
        let index = LineIndex::new(source);
        let f = source.find("f()").unwrap() as u32;
        assert_eq!(index.line_col(f), (1, 18));
        let g = source.find("g()").unwrap() as u32;
        assert_eq!(index.line_col(g), (2, 3));
        assert_eq!(index.line_col(source.len() as u32), (2, 6));
    }

    #[test]
    fn offset_past_end_is_clamped() {
        let index = LineIndex::new("ab\ncd");
        assert_eq!(index.line_col(99), (2, 3));
    }
}
