use crate::Position;

/// Line-start table for converting between byte offsets and editor positions.
///
/// Columns are counted in UTF-16 code units, the unit editors report positions in.
/// The index only stores line starts, so conversions take the indexed text again.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offset of the start of each line; index 0 is always 0
    line_starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    #[must_use]
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            text.bytes()
                .enumerate()
                .filter(|(_, byte)| *byte == b'\n')
                .map(|(offset, _)| offset + 1),
        );

        Self {
            line_starts,
            len: text.len(),
        }
    }

    /// Convert a byte offset into a position. Offsets past the end clamp to the end.
    #[must_use]
    pub fn offset_to_position(&self, text: &str, offset: usize) -> Position {
        let offset = offset.min(self.len);
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(line) => line.saturating_sub(1),
        };

        let line_start = self.line_starts[line];
        let character = text
            .get(line_start..offset)
            .map_or(offset - line_start, |prefix| {
                prefix.chars().map(char::len_utf16).sum()
            });
        Position::new(line, character)
    }

    /// Convert a position into a byte offset.
    ///
    /// Returns `None` if the line does not exist; columns past the end of a line
    /// clamp to the line end.
    #[must_use]
    pub fn position_to_offset(&self, text: &str, position: Position) -> Option<usize> {
        let line_start = *self.line_starts.get(position.line)?;
        let line_end = self
            .line_starts
            .get(position.line + 1)
            .map_or(self.len, |next| next - 1);
        let line_text = text.get(line_start..line_end)?;

        let mut utf16 = 0;
        for (byte, ch) in line_text.char_indices() {
            if utf16 >= position.character {
                return Some(line_start + byte);
            }
            utf16 += ch.len_utf16();
        }
        Some(line_end)
    }

    #[must_use]
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    #[must_use]
    pub fn line_start(&self, line: usize) -> Option<usize> {
        self.line_starts.get(line).copied()
    }
}
