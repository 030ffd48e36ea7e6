/// Position in a text document (0-indexed, columns in UTF-16 code units)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    pub line: usize,
    pub character: usize,
}

impl Position {
    #[must_use]
    pub const fn new(line: usize, character: usize) -> Self {
        Self { line, character }
    }
}

/// Where a fragment's own line 1 / column 1 sits inside its host file (1-indexed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocationOffset {
    pub line: usize,
    pub column: usize,
}

impl LocationOffset {
    /// Offset of a fragment that starts at the very beginning of its file
    pub const START: Self = Self { line: 1, column: 1 };

    #[must_use]
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl Default for LocationOffset {
    fn default() -> Self {
        Self::START
    }
}

/// One span of GraphQL text found inside a host file.
///
/// Fragments are immutable; re-extraction replaces them wholesale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFragment {
    pub body: String,
    pub origin_uri: String,
    pub location_offset: LocationOffset,
}

impl SourceFragment {
    #[must_use]
    pub fn new(
        body: impl Into<String>,
        origin_uri: impl Into<String>,
        location_offset: LocationOffset,
    ) -> Self {
        Self {
            body: body.into(),
            origin_uri: origin_uri.into(),
            location_offset,
        }
    }

    /// Number of lines the body spans
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.body.split('\n').count()
    }

    /// Host line (0-indexed) of the body's first line
    #[must_use]
    pub const fn start_line(&self) -> usize {
        self.location_offset.line.saturating_sub(1)
    }

    /// Host line (0-indexed) of the body's last line
    #[must_use]
    pub fn end_line(&self) -> usize {
        self.start_line() + self.line_count() - 1
    }

    /// Whether a host position falls on one of this fragment's lines
    #[must_use]
    pub fn contains_position(&self, position: Position) -> bool {
        position.line >= self.start_line() && position.line <= self.end_line()
    }

    /// Translate a fragment-local position into host file coordinates.
    ///
    /// Only the first line is shifted horizontally; later lines start at
    /// column 0 of the host file as well.
    #[must_use]
    pub const fn to_host(&self, position: Position) -> Position {
        let line = position.line + self.start_line();
        let character = if position.line == 0 {
            position.character + self.location_offset.column.saturating_sub(1)
        } else {
            position.character
        };
        Position::new(line, character)
    }

    /// Translate a host position into fragment-local coordinates
    #[must_use]
    pub fn to_fragment(&self, position: Position) -> Option<Position> {
        if !self.contains_position(position) {
            return None;
        }
        let line = position.line - self.start_line();
        let character = if line == 0 {
            position
                .character
                .checked_sub(self.location_offset.column.saturating_sub(1))?
        } else {
            position.character
        };
        Some(Position::new(line, character))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(body: &str, line: usize, column: usize) -> SourceFragment {
        SourceFragment::new(body, "file:///a.ts", LocationOffset::new(line, column))
    }

    #[test]
    fn test_contains_position() {
        let frag = fragment("query {\n  a\n}", 3, 12);

        assert!(!frag.contains_position(Position::new(1, 0)));
        assert!(frag.contains_position(Position::new(2, 0)));
        assert!(frag.contains_position(Position::new(4, 1)));
        assert!(!frag.contains_position(Position::new(5, 0)));
    }

    #[test]
    fn test_to_host_and_back() {
        let frag = fragment("query {\n  a\n}", 5, 10);

        assert_eq!(frag.to_host(Position::new(0, 2)), Position::new(4, 11));
        assert_eq!(frag.to_host(Position::new(1, 2)), Position::new(5, 2));
        assert_eq!(
            frag.to_fragment(Position::new(4, 11)),
            Some(Position::new(0, 2))
        );
        assert_eq!(frag.to_fragment(Position::new(4, 3)), None);
        assert_eq!(frag.to_fragment(Position::new(9, 0)), None);
    }
}
