//! The engine's error taxonomy.
//!
//! Every failure aborts the current marshal/unmarshal call; there is no
//! partial-result recovery, no retry, and no logging from the engines.
//! What the taxonomy does guarantee is *structured* context: a
//! [`ConversionError`] carries an ordered diagnostic map and the nested
//! cause chain, so callers can inspect what failed programmatically instead
//! of parsing a flattened message.

use alloc::borrow::Cow;
use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use thiserror::Error;

/// Engine result type.
pub type Result<T, E = Error> = core::result::Result<T, E>;

// -----------------------------------------------------------------------------
// Leaf errors

/// A serialized name does not map to any registered type.
#[derive(Debug, Error)]
#[error("no type registered for name `{name}`")]
pub struct TypeResolutionError {
    /// The name that failed to resolve.
    pub name: String,
}

/// A configuration call depends on a policy the mapper chain does not
/// contain.
#[derive(Debug, Error)]
#[error("`{operation}` requires a `{missing}` policy, but the mapper chain has none")]
pub struct InitializationError {
    /// Type name of the missing policy.
    pub missing: &'static str,
    /// The configuration operation that needed it.
    pub operation: &'static str,
}

/// A reference marker does not resolve to any previously produced value.
#[derive(Debug, Error)]
#[error("reference marker `{marker}` has no matching entry")]
pub struct InvalidReferenceError {
    /// The marker as it appeared in the document.
    pub marker: String,
}

/// The object graph cannot be represented under the active configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StructuralError {
    /// A circular reference was encountered while reference tracking is
    /// disabled.
    #[error("circular reference to `{type_path}` with reference tracking disabled")]
    CircularReference { type_path: Cow<'static, str> },

    /// An element whose reference attribute is suppressed was referenced
    /// again elsewhere in the graph.
    #[error("cannot emit a reference to the implicit element at `{path}`")]
    ReferencedImplicitElement { path: String },
}

// -----------------------------------------------------------------------------
// ConversionError

/// A converter failed.
///
/// As the failure propagates out of nested conversions, the drivers attach
/// diagnostic key/value pairs (`item-type`, `converter`, `path`). A key is
/// only written once, so the *deepest* frame that knows a value wins and
/// outer frames cannot overwrite it.
///
/// `Display` is hand-written because of the accumulating map; the nested
/// cause is reachable through [`core::error::Error::source`] as well as
/// [`cause`](ConversionError::cause).
#[derive(Debug)]
pub struct ConversionError {
    message: String,
    details: Vec<(Cow<'static, str>, String)>,
    cause: Option<Box<Error>>,
}

impl ConversionError {
    /// Creates an error with a message and no diagnostics.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: Vec::new(),
            cause: None,
        }
    }

    /// Creates an error wrapping a nested cause.
    pub fn wrap(message: impl Into<String>, cause: Error) -> Self {
        Self {
            message: message.into(),
            details: Vec::new(),
            cause: Some(Box::new(cause)),
        }
    }

    /// Attaches a diagnostic entry unless the key is already present.
    pub fn add(&mut self, key: impl Into<Cow<'static, str>>, value: impl Into<String>) {
        let key = key.into();
        if self.detail(&key).is_none() {
            self.details.push((key, value.into()));
        }
    }

    /// Builder form of [`add`](ConversionError::add).
    pub fn with(mut self, key: impl Into<Cow<'static, str>>, value: impl Into<String>) -> Self {
        self.add(key, value);
        self
    }

    /// The message this error was created with.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Looks up one diagnostic entry.
    pub fn detail(&self, key: &str) -> Option<&str> {
        self.details
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All diagnostic entries, in attachment order.
    pub fn details(&self) -> &[(Cow<'static, str>, String)] {
        &self.details
    }

    /// The nested cause, if any.
    pub fn cause(&self) -> Option<&Error> {
        self.cause.as_deref()
    }
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        for (key, value) in &self.details {
            write!(f, "\n  {key}: {value}")?;
        }
        Ok(())
    }
}

impl core::error::Error for ConversionError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn core::error::Error + 'static))
    }
}

// -----------------------------------------------------------------------------
// Error

/// Any failure the engine can raise.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    TypeResolution(#[from] TypeResolutionError),

    #[error(transparent)]
    Initialization(#[from] InitializationError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    InvalidReference(#[from] InvalidReferenceError),

    #[error(transparent)]
    Structural(#[from] StructuralError),
}

impl Error {
    /// The conversion payload, when this is a conversion failure.
    pub fn as_conversion(&self) -> Option<&ConversionError> {
        match self {
            Self::Conversion(conversion) => Some(conversion),
            _ => None,
        }
    }
}

// -----------------------------------------------------------------------------
// Tests
