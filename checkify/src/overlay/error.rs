use super::template::Template;
use crate::category::core::Shape;
use crate::interpreter::TaggedVec;
use crate::path::Path;
use std::fmt;

////////////////////////////////////////////////////////////////////////////////
// Domain faults

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// A `check` predicate was false
    UserCheck,
    /// NaN or infinity produced from finite operands
    NonFinite,
    DivisionByZero,
    OutOfBounds,
}

/// Host copy of a tensor captured when a fault is detected.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    pub shape: Shape,
    pub data: TaggedVec,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fault {
    pub category: ErrorCategory,
    pub message: Template,
    pub payload: Vec<Payload>,
}

/// The first fault detected during one checked execution, if any.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Error {
    fault: Option<Fault>,
}

impl Error {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(category: ErrorCategory, message: Template, payload: Vec<Payload>) -> Self {
        Error {
            fault: Some(Fault {
                category,
                message,
                payload,
            }),
        }
    }

    pub fn is_populated(&self) -> bool {
        self.fault.is_some()
    }

    pub fn fault(&self) -> Option<&Fault> {
        self.fault.as_ref()
    }

    pub fn category(&self) -> Option<ErrorCategory> {
        self.fault.as_ref().map(|f| f.category)
    }

    pub fn payload(&self) -> &[Payload] {
        self.fault.as_ref().map_or(&[], |f| &f.payload)
    }

    /// The message template with the payload substituted
    pub fn message(&self) -> Option<String> {
        self.fault.as_ref().map(|f| f.message.render(&f.payload))
    }

    /// First write wins: `self` if populated, otherwise `later`.
    pub fn merge(self, later: Error) -> Error {
        if self.is_populated() { self } else { later }
    }

    /// Raise a populated error as a [`FailedCheck`].
    pub fn throw(&self) -> Result<(), FailedCheck> {
        match &self.fault {
            None => Ok(()),
            Some(fault) => Err(FailedCheck {
                category: fault.category,
                message: fault.message.render(&fault.payload),
                payload: fault.payload.clone(),
            }),
        }
    }
}

/// Turn a populated [`Error`] into an `Err`; an empty error is `Ok(())`.
pub fn check_error(error: &Error) -> Result<(), FailedCheck> {
    error.throw()
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{category}: {message}")]
pub struct FailedCheck {
    pub category: ErrorCategory,
    pub message: String,
    pub payload: Vec<Payload>,
}

////////////////////////////////////////////////////////////////////////////////
// Usage errors

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CheckifyError {
    #[error("unknown check `{0}`")]
    UnknownCheck(String),

    #[error("malformed message template {template:?}: {reason}")]
    MalformedTemplate { template: String, reason: String },

    #[error("message template {template:?} reads {expected} payload values but {given} were given")]
    PayloadMismatch {
        template: String,
        expected: usize,
        given: usize,
    },

    #[error("missing definition `{0}`")]
    MissingDefinition(Path),

    #[error("term `{0}` contains a cycle")]
    CyclicTerm(String),

    #[error("term `{0}` is already instrumented")]
    AlreadyChecked(String),
}

////////////////////////////////////////////////////////////////////////////////
// Display instances

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::UserCheck => "user_check",
            ErrorCategory::NonFinite => "non_finite",
            ErrorCategory::DivisionByZero => "division_by_zero",
            ErrorCategory::OutOfBounds => "out_of_bounds",
        };
        write!(f, "{name}")
    }
}

impl Payload {
    fn fmt_element(&self, f: &mut fmt::Formatter<'_>, i: usize) -> fmt::Result {
        match &self.data {
            TaggedVec::F32(v) => write!(f, "{}", v[i]),
            TaggedVec::U32(v) => write!(f, "{}", v[i]),
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self.data.len();
        if self.shape.rank() == 0 && len == 1 {
            return self.fmt_element(f, 0);
        }
        write!(f, "[")?;
        for i in 0..len {
            if i > 0 {
                write!(f, ", ")?;
            }
            self.fmt_element(f, i)?;
        }
        write!(f, "]")
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.fault {
            None => write!(f, "no error"),
            Some(fault) => write!(
                f,
                "{}: {}",
                fault.category,
                fault.message.render(&fault.payload)
            ),
        }
    }
}
