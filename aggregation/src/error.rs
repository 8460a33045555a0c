use std::{
    error::Error,
    fmt::{self, Display},
};

/// The result type used in the entire aggregation module.
pub type Result<T> = std::result::Result<T, AggErr>;

/// The aggregation module's error type.
#[derive(Debug, Clone, PartialEq)]
pub enum AggErr {
    GradientLengthMismatch {
        expected: usize,
        got: usize,
    },
    EmptyGradient,
    EmptyMatrix,
    InvalidParameter {
        what: &'static str,
        detail: String,
    },
    NotEnoughRows {
        rule: &'static str,
        got: usize,
        required: usize,
    },
    MemoryMismatch {
        expected: (usize, usize),
        got: (usize, usize),
    },
    RetainedIndicesMismatch {
        got: usize,
        expected: usize,
    },
    IndexOutOfBounds {
        index: usize,
        len: usize,
    },
}

impl AggErr {
    pub(crate) fn invalid(what: &'static str, detail: impl Into<String>) -> Self {
        Self::InvalidParameter {
            what,
            detail: detail.into(),
        }
    }
}

impl Display for AggErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AggErr::GradientLengthMismatch { expected, got } => {
                format!("Gradient of length {got} doesn't fit a buffer of width {expected}")
            }
            AggErr::EmptyGradient => "Can't buffer an empty gradient".to_string(),
            AggErr::EmptyMatrix => "Can't aggregate an empty matrix".to_string(),
            AggErr::InvalidParameter { what, detail } => {
                format!("Invalid {what}: {detail}")
            }
            AggErr::NotEnoughRows {
                rule,
                got,
                required,
            } => format!("{rule} needs at least {required} rows, got {got}"),
            AggErr::MemoryMismatch { expected, got } => format!(
                "Compressor memory has shape {expected:?} but the matrix has shape {got:?}"
            ),
            AggErr::RetainedIndicesMismatch { got, expected } => {
                format!("Got {got} retained indices for {expected} columns")
            }
            AggErr::IndexOutOfBounds { index, len } => {
                format!("Index {index} is out of bounds for length {len}")
            }
        };

        write!(f, "{s}")
    }
}

impl Error for AggErr {}
