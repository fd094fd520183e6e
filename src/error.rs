#![deny(clippy::unwrap_used, clippy::expect_used)]

use serde::{Deserialize, Serialize};

/// A struct that represents an error with a context and possibly the propagated source error.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ContextError {
    pub context: String,
    pub source_error: Option<String>,
}

impl std::fmt::Display for ContextError {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.source_error {
            Some(source_error) => write!(
                formatter,
                "{}: {}",
                self.context,
                minimize_first_letter(source_error.to_string()),
            ),
            None => write!(formatter, "{}", self.context),
        }
    }
}

impl std::error::Error for ContextError {}

impl ContextError {
    /// Create a new `ContextError` with the given context.
    pub fn with_context<S: Into<String>>(context: S) -> ContextError {
        ContextError {
            context: context.into(),
            source_error: None,
        }
    }

    /// Create a new `ContextError` with the given context and source error.
    pub fn with_error<S: Into<String>>(context: S, error: &dyn std::error::Error) -> ContextError {
        ContextError {
            context: context.into(),
            source_error: Some(error.to_string()),
        }
    }
}

/// The source file could not be turned into a table: it is unreadable, of an unsupported
/// format or its content is corrupt. This error aborts the batch.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadError(pub ContextError);

impl std::fmt::Display for LoadError {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

impl std::error::Error for LoadError {}

impl From<ContextError> for LoadError {
    fn from(value: ContextError) -> Self {
        LoadError(value)
    }
}

/// The key column requested by the caller is not one of the table's columns.
/// The available columns are kept so that the message can list them to the user.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnNotFoundError {
    pub requested_column: String,
    pub available_columns: Vec<String>,
}

impl std::fmt::Display for ColumnNotFoundError {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "Column {:?} not found, available columns: {}",
            self.requested_column,
            self.available_columns.join(", ")
        )
    }
}

impl std::error::Error for ColumnNotFoundError {}

/// The document of a single entity could not be produced. It is counted and logged by the
/// batch worker, which then carries on with the next entity.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderError {
    pub entity_name: String,
    pub cause: ContextError,
}

impl RenderError {
    pub fn new<S: Into<String>>(entity_name: S, cause: ContextError) -> RenderError {
        RenderError {
            entity_name: entity_name.into(),
            cause,
        }
    }
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "Failed to render the document for {:?}: {}",
            self.entity_name,
            minimize_first_letter(self.cause.to_string())
        )
    }
}

impl std::error::Error for RenderError {}

/// Reshaping of a string failed. It never leaves the text shaper, which degrades to the
/// unshaped text instead.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapingError {
    /// A diacritic with no letter before it to carry it.
    DetachedHarakah { character: char, position: usize },
}

impl std::fmt::Display for ShapingError {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShapingError::DetachedHarakah {
                character,
                position,
            } => write!(
                formatter,
                "The diacritic {:?} at position {} is not attached to any letter",
                character, position
            ),
        }
    }
}

impl std::error::Error for ShapingError {}

/// The errors which abort a batch before any document is produced.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchError {
    Load(LoadError),
    ColumnNotFound(ColumnNotFoundError),
}

impl std::fmt::Display for BatchError {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchError::Load(error) => write!(formatter, "{}", error),
            BatchError::ColumnNotFound(error) => write!(formatter, "{}", error),
        }
    }
}

impl std::error::Error for BatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BatchError::Load(error) => Some(error),
            BatchError::ColumnNotFound(error) => Some(error),
        }
    }
}

impl From<LoadError> for BatchError {
    fn from(value: LoadError) -> Self {
        BatchError::Load(value)
    }
}

impl From<ColumnNotFoundError> for BatchError {
    fn from(value: ColumnNotFoundError) -> Self {
        BatchError::ColumnNotFound(value)
    }
}

/// Minimizes the first letter of a string, it is used for standardizing the error message.
fn minimize_first_letter(string: String) -> String {
    let mut characters = string.chars();
    match characters.next() {
        None => String::new(),
        Some(character) => character.to_lowercase().chain(characters).collect(),
    }
}
