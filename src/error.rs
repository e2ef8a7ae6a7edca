/// Failure class, used by callers to decide whether a failure is absorbed
/// (skip the candidate/fold/item and keep sweeping) or surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Model fitting did not converge or hit a numerical singularity.
    /// Always recoverable: the affected candidate/fold/item is skipped.
    Fit,
    /// Too few sequences to form the requested cross-validation folds.
    /// Recoverable: the affected candidate is skipped.
    InsufficientData,
    /// Every candidate in the range failed and so did the constant fallback.
    /// Fatal for the `select()` call.
    NoValidCandidate,
    /// Invalid selector configuration (range, fold count, ...).
    Config,
    /// Inconsistent sequence or corpus data (dimension mismatch, empty
    /// sequence, flattening invariant violation).
    Data,
}

#[derive(Clone)]
pub struct SelectError {
    kind: ErrorKind,
    message: String,
}

impl SelectError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn fit(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Fit, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    pub fn data(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Data, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Whether the failure is one the selection sweep absorbs locally.
    pub fn is_recoverable(&self) -> bool {
        matches!(self.kind, ErrorKind::Fit | ErrorKind::InsufficientData)
    }
}

impl std::fmt::Display for SelectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for SelectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectError")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for SelectError {}
