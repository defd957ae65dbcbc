use nom::error::{ContextError, ParseError};
use std::fmt;

/// Parser error: a stack of (remaining input, context) pairs, innermost first.
#[derive(Debug, PartialEq, Clone)]
pub struct OpenCypherParsingError<'a> {
    pub errors: Vec<(&'a str, &'static str)>,
}

impl<'a> OpenCypherParsingError<'a> {
    pub fn new(input: &'a str, ctx: &'static str) -> Self {
        OpenCypherParsingError {
            errors: vec![(input, ctx)],
        }
    }

    /// Byte offset of the innermost failure within `source`.
    pub fn offset_in(&self, source: &str) -> usize {
        self.errors
            .first()
            .map(|(rest, _)| source.len().saturating_sub(rest.len()))
            .unwrap_or(0)
    }
}

impl<'a> ParseError<&'a str> for OpenCypherParsingError<'a> {
    fn from_error_kind(input: &'a str, _kind: nom::error::ErrorKind) -> Self {
        OpenCypherParsingError {
            errors: vec![(input, "unexpected input")],
        }
    }

    fn append(_input: &'a str, _kind: nom::error::ErrorKind, other: Self) -> Self {
        other
    }

    fn or(self, other: Self) -> Self {
        // keep whichever alternative got further
        let self_rest = self.errors.first().map(|(i, _)| i.len()).unwrap_or(usize::MAX);
        let other_rest = other.errors.first().map(|(i, _)| i.len()).unwrap_or(usize::MAX);
        if other_rest <= self_rest {
            other
        } else {
            self
        }
    }
}

impl<'a> ContextError<&'a str> for OpenCypherParsingError<'a> {
    fn add_context(input: &'a str, ctx: &'static str, mut other: Self) -> Self {
        other.errors.push((input, ctx));
        other
    }
}

impl fmt::Display for OpenCypherParsingError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (input, ctx)) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            let snippet: String = input.trim_start().chars().take(32).collect();
            if snippet.is_empty() {
                write!(f, "{} at end of input", ctx)?;
            } else {
                write!(f, "{} near `{}`", ctx, snippet)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for OpenCypherParsingError<'_> {}

impl<'a> From<nom::error::Error<&'a str>> for OpenCypherParsingError<'a> {
    fn from(err: nom::error::Error<&'a str>) -> Self {
        OpenCypherParsingError {
            errors: vec![(err.input, "Unable to parse")],
        }
    }
}
