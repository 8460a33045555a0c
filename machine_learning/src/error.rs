use std::{
    error::Error,
    fmt::{self, Display},
};

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug)]
pub enum MlErr {
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    IndexOutOfBounds {
        what: &'static str,
        index: usize,
        len: usize,
    },
    EmptyDataset,
    InvalidInput(String),
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MlErr::SizeMismatch {
                what,
                got,
                expected,
            } => {
                format!("There's a size mismatch in {what}, got {got} and expected {expected}")
            }
            MlErr::IndexOutOfBounds { what, index, len } => {
                format!("Index {index} is out of bounds for {what} of length {len}")
            }
            MlErr::EmptyDataset => "The dataset has no samples".to_string(),
            MlErr::InvalidInput(detail) => format!("Invalid input: {detail}"),
        };

        write!(f, "{s}")
    }
}

impl Error for MlErr {}
