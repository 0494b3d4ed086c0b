//! The canonical admission error taxonomy (spec §4.10, §7) and the
//! field-path-aware multi-error accumulator every validator writes into.

use std::fmt;

use indexmap::IndexSet;

/// A dotted path into a request's spec, e.g. `spec.kubernetes.version`.
///
/// Built incrementally with [`FieldPath::child`] so each validator can
/// describe exactly where a violation lives without string-formatting by
/// hand at every call site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath(String);

impl FieldPath {
    pub fn new(root: impl Into<String>) -> Self {
        Self(root.into())
    }

    #[must_use]
    pub fn child(&self, segment: impl fmt::Display) -> Self {
        Self(format!("{}.{}", self.0, segment))
    }

    #[must_use]
    pub fn index(&self, i: usize) -> Self {
        Self(format!("{}[{}]", self.0, i))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for FieldPath {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// The canonical error kinds from spec §4.10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum ErrorKind {
    /// Caches not yet synced (§4.1, §4.4).
    NotReady,
    /// Spec could not be converted to the expected shape.
    BadRequest,
    /// A referenced object is absent.
    NotFound,
    /// A stated invariant is violated. Default for user-visible spec problems.
    Forbidden,
    /// The authorizer denied read access on a referenced object.
    Unauthorized,
    /// Unexpected failure downstream (cache/live-read transport, deadline).
    InternalError,
}

/// One accumulated violation: a field path plus a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldError {
    pub field: FieldPath,
    pub message: String,
}

impl FieldError {
    pub fn new(field: FieldPath, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// A rejection of an admission request: a kind plus the accumulated
/// per-field violations that produced it.
///
/// Multi-error aggregation preserves insertion order and deduplicates by
/// `(field, message)`, per spec §4.10.
#[derive(Debug, Clone, Default)]
pub struct Forbid {
    kind_override: Option<ErrorKind>,
    errors: IndexSet<FieldError>,
}

impl Forbid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(kind: ErrorKind, field: impl Into<FieldPath>, message: impl Into<String>) -> Self {
        let mut forbid = Self {
            kind_override: Some(kind),
            errors: IndexSet::new(),
        };
        forbid.errors.insert(FieldError::new(field.into(), message));
        forbid
    }

    pub fn forbidden(field: impl Into<FieldPath>, message: impl Into<String>) -> Self {
        Self::single(ErrorKind::Forbidden, field, message)
    }

    pub fn not_found(field: impl Into<FieldPath>, message: impl Into<String>) -> Self {
        Self::single(ErrorKind::NotFound, field, message)
    }

    pub fn unauthorized(field: impl Into<FieldPath>, message: impl Into<String>) -> Self {
        Self::single(ErrorKind::Unauthorized, field, message)
    }

    pub fn internal(field: impl Into<FieldPath>, message: impl Into<String>) -> Self {
        Self::single(ErrorKind::InternalError, field, message)
    }

    pub fn not_ready() -> Self {
        Self::single(ErrorKind::NotReady, "", "caches are not yet synced")
    }

    pub fn bad_request(field: impl Into<FieldPath>, message: impl Into<String>) -> Self {
        Self::single(ErrorKind::BadRequest, field, message)
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn push(&mut self, field: impl Into<FieldPath>, message: impl Into<String>) {
        self.errors.insert(FieldError::new(field.into(), message));
        self.kind_override.get_or_insert(ErrorKind::Forbidden);
    }

    pub fn push_kind(&mut self, kind: ErrorKind, field: impl Into<FieldPath>, message: impl Into<String>) {
        self.errors.insert(FieldError::new(field.into(), message));
        // InternalError/NotFound take precedence over a plain Forbidden once seen,
        // since they indicate a harder failure than an ordinary spec violation.
        match (&self.kind_override, kind) {
            (Some(ErrorKind::InternalError), _) => {}
            (_, ErrorKind::InternalError) => self.kind_override = Some(ErrorKind::InternalError),
            (None, k) => self.kind_override = Some(k),
            _ => {}
        }
    }

    pub fn extend(&mut self, other: Forbid) {
        for error in other.errors {
            self.errors.insert(error);
        }
        match (self.kind_override, other.kind_override) {
            (_, Some(ErrorKind::InternalError)) => self.kind_override = Some(ErrorKind::InternalError),
            (None, Some(kind)) => self.kind_override = Some(kind),
            _ => {}
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind_override.unwrap_or(ErrorKind::Forbidden)
    }

    pub fn errors(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }

    pub fn into_result(self) -> Result<(), Forbid> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for Forbid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.kind())?;
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Forbid {}

/// Infrastructure-level failures that sit below the admission taxonomy:
/// transport and wiring errors that a plugin wraps into [`ErrorKind::InternalError`]
/// before it ever reaches a caller. Kept separate from [`Forbid`] so the
/// domain-facing type stays a plain tagged enum, per the spec's design note
/// on multi-error aggregation.
#[derive(Debug, snafu::Snafu)]
pub enum PortError {
    #[snafu(display("live-read transport failure for {reference}"))]
    Transport {
        reference: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[snafu(display("authorizer call failed for {reference}"))]
    Authorizer {
        reference: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[snafu(display("operation timed out after the transport deadline"))]
    DeadlineExceeded,
}

impl From<PortError> for Forbid {
    fn from(value: PortError) -> Self {
        Forbid::internal("", value.to_string())
    }
}
