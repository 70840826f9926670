use std::fmt;

/// Associates an I/O source with the event it later produces.
///
/// Passed to [`Registry::register`] and echoed back on every [`Event`]
/// generated for that source.
///
/// [`Registry::register`]: crate::Registry::register
/// [`Event`]: crate::event::Event
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Token(pub usize);

impl From<usize> for Token {
    fn from(val: usize) -> Token {
        Token(val)
    }
}

impl From<Token> for usize {
    fn from(val: Token) -> usize {
        val.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
