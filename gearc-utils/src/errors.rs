//! Errors generated by the compiler.
use crate::{GPosIdx, Id, WithPos};
use itertools::Itertools;

/// Convenience wrapper to represent success or meaningful compiler error.
pub type GearcResult<T> = std::result::Result<T, Error>;

/// Errors generated by the compiler
#[derive(Clone)]
pub struct Error {
    kind: Box<ErrorKind>,
    pos: GPosIdx,
    post_msg: Option<String>,
    /// Chain of translation units active when the error was raised,
    /// innermost first.
    frames: Vec<String>,
}

/// Standard error type for gearc errors.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// A source construct the front-end cannot lower.
    #[error("Unsupported construct: {0}")]
    Unsupported(String),
    /// Incompatible types or a failed cast.
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),
    /// A statement cannot be assigned to at most two states.
    #[error("Scheduling ambiguity: {0}")]
    AmbiguousSchedule(String),
    /// The pre- and post-scheduling register sets disagree.
    #[error("Register inference conflict: {0}")]
    RegisterConflict(String),
    /// A name that is not in scope.
    #[error("Undefined {kind} `{name}'")]
    Undefined { name: Id, kind: String },
    /// The source text could not be parsed.
    #[error("{0}")]
    Parse(String),
    /// The input could not be read.
    #[error("Invalid file: {0}")]
    InvalidFile(String),
    /// Output could not be written.
    #[error("Write error: {0}")]
    WriteError(String),
    /// Miscellaneous error message
    #[error("{0}")]
    Misc(String),
}

impl Error {
    fn new(kind: ErrorKind) -> Self {
        Self {
            kind: Box::new(kind),
            pos: GPosIdx::UNKNOWN,
            post_msg: None,
            frames: Vec::new(),
        }
    }

    pub fn with_pos<T: WithPos>(mut self, pos: &T) -> Self {
        self.pos = pos.copy_span();
        self
    }

    /// Attach a position only if the error does not carry one yet.
    pub fn or_pos<T: WithPos>(mut self, pos: &T) -> Self {
        if self.pos == GPosIdx::UNKNOWN {
            self.pos = pos.copy_span();
        }
        self
    }

    pub fn with_post_msg(mut self, msg: Option<String>) -> Self {
        self.post_msg = msg;
        self
    }

    /// Attach the chain of active translation units. An error keeps the
    /// chain that was active where it was first raised.
    pub fn with_frames(mut self, frames: Vec<String>) -> Self {
        if self.frames.is_empty() {
            self.frames = frames;
        }
        self
    }

    pub fn unsupported<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::Unsupported(msg.to_string()))
    }
    pub fn type_mismatch<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::TypeMismatch(msg.to_string()))
    }
    pub fn ambiguous_schedule<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::AmbiguousSchedule(msg.to_string()))
    }
    pub fn register_conflict<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::RegisterConflict(msg.to_string()))
    }
    pub fn undefined<S: ToString>(name: Id, kind: S) -> Self {
        Self::new(ErrorKind::Undefined {
            name,
            kind: kind.to_string(),
        })
    }
    pub fn parse<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::Parse(msg.to_string()))
    }
    pub fn invalid_file<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::InvalidFile(msg.to_string()))
    }
    pub fn write_error<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::WriteError(msg.to_string()))
    }
    pub fn misc<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::Misc(msg.to_string()))
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn location(&self) -> GPosIdx {
        self.pos
    }

    pub fn frames(&self) -> &[String] {
        &self.frames
    }

    /// The error message without location information.
    pub fn message(&self) -> String {
        self.kind.to_string()
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = self.kind.to_string();
        match self.pos.into_option() {
            Some(pos) => write!(f, "{}", pos.format(msg))?,
            None => write!(f, "{msg}")?,
        }
        if let Some(post) = &self.post_msg {
            write!(f, "\n{post}")?;
        }
        if !self.frames.is_empty() {
            write!(
                f,
                "\n{}",
                self.frames.iter().map(|fr| format!("  {fr}")).join("\n")
            )?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

impl std::error::Error for Error {}

impl From<std::str::Utf8Error> for Error {
    fn from(err: std::str::Utf8Error) -> Self {
        Error::invalid_file(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::write_error(format!("IO Error: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_are_kept_from_first_raise() {
        let err = Error::unsupported("`lambda`")
            .with_frames(vec!["translating `f` (called from `top`)".into()])
            .with_frames(vec!["translating `top`".into()]);
        assert_eq!(err.frames().len(), 1);
        let text = err.to_string();
        assert!(text.starts_with("Unsupported construct: `lambda`"));
        assert!(text.contains("translating `f` (called from `top`)"));
        assert!(matches!(err.kind(), ErrorKind::Unsupported(_)));
    }
}
