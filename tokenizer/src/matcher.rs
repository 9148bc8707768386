/// Recognizes a fixed delimiter one byte at a time, across any number
/// of calls.
///
/// A mismatch always drops back to the start of the delimiter; the
/// mismatching byte is not retried against the first byte.
#[derive(Debug, Clone)]
pub struct DelimiterMatcher {
    delimiter: &'static str,
    cursor: usize,
}

impl DelimiterMatcher {
    pub const BEGIN_COMMENT: &'static str = "!--";
    pub const END_COMMENT: &'static str = "-->";
    pub const END_SCRIPT: &'static str = "</script>";
    pub const END_STYLE: &'static str = "</style>";

    pub const fn new(delimiter: &'static str) -> Self {
        assert!(!delimiter.is_empty(), "The delimiter must not be empty");

        Self {
            delimiter,
            cursor: 0,
        }
    }

    /// Returns `true` when `byte` completes the delimiter.
    #[inline]
    pub fn found(&mut self, byte: u8) -> bool {
        let delimiter = self.delimiter.as_bytes();

        if byte != delimiter[self.cursor] {
            self.cursor = 0;
            false
        } else if self.cursor == delimiter.len() - 1 {
            self.cursor = 0;
            true
        } else {
            self.cursor += 1;
            false
        }
    }

    #[inline]
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// The first byte of the delimiter. Any other byte seen while no
    /// match is in progress leaves the matcher unchanged.
    #[inline]
    pub(crate) fn first_byte(&self) -> u8 {
        self.delimiter.as_bytes()[0]
    }

    #[inline]
    pub fn is_matching(&self) -> bool {
        self.cursor != 0
    }
}
