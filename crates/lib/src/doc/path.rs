//! Paths into the document tree.
//!
//! A path names an object by walking from the root: string keys step
//! through maps, integer indices step through lists. The textual form
//! uses `$` as the root sentinel: `$`, `$.meta.title`, `$.items[2].done`.
//!
//! Paths are validated at construction, so a `Path` held by a caller is
//! always syntactically well-formed; whether it resolves against the
//! current tree is a separate, dynamic question.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Error type for path parsing failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    /// A key segment is empty
    #[error("empty key segment in path at byte {position}")]
    EmptyKey { position: usize },

    /// An index segment is not a valid number
    #[error("invalid index segment '{segment}'")]
    InvalidIndexSegment { segment: String },

    /// Unbalanced or misplaced brackets
    #[error("malformed path near byte {position}: {reason}")]
    Malformed { position: usize, reason: &'static str },
}

/// One step of a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// A string key into a map.
    Key(String),
    /// An integer index into a list.
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(k) => write!(f, ".{k}"),
            Segment::Index(i) => write!(f, "[{i}]"),
        }
    }
}

/// A validated path from the document root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Path {
    segments: Vec<Segment>,
}

impl Path {
    /// The root path (`$`).
    pub fn root() -> Self {
        Self::default()
    }

    /// Extend with a map key.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.segments.push(Segment::Key(key.into()));
        self
    }

    /// Extend with a list index.
    pub fn index(mut self, index: usize) -> Self {
        self.segments.push(Segment::Index(index));
        self
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$")?;
        for segment in &self.segments {
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let sentinel = s.starts_with('$');
        let mut rest = if sentinel { &s[1..] } else { s };
        let mut path = Path::root();
        let mut first = true;

        while !rest.is_empty() {
            let position = s.len() - rest.len();
            if let Some(r) = rest.strip_prefix('[') {
                let close = r.find(']').ok_or(PathError::Malformed {
                    position,
                    reason: "unterminated index",
                })?;
                let digits = &r[..close];
                let index: usize =
                    digits.parse().map_err(|_| PathError::InvalidIndexSegment {
                        segment: digits.to_string(),
                    })?;
                path = path.index(index);
                rest = &r[close + 1..];
            } else if let Some(r) = rest.strip_prefix('.') {
                let end = r.find(['.', '[']).unwrap_or(r.len());
                if end == 0 {
                    return Err(PathError::EmptyKey { position });
                }
                path = path.key(&r[..end]);
                rest = &r[end..];
            } else if first && !sentinel {
                // Bare leading key with no sentinel: "title" or "a.b".
                let end = rest.find(['.', '[']).unwrap_or(rest.len());
                path = path.key(&rest[..end]);
                rest = &rest[end..];
            } else {
                return Err(PathError::Malformed {
                    position,
                    reason: "expected '.' or '[' between segments",
                });
            }
            first = false;
        }
        Ok(path)
    }
}
