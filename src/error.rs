use thiserror::Error;

use super::wire::problem::AcmeProblem;

pub type AcmeResult<T> = Result<T, AcmeError>;

/// Abstract outcome class, independent of the concrete error that produced it.
///
/// The pipeline consults this to decide whether a failed request is worth
/// retrying (`Transient`) or final. Callers who only care about the broad
/// failure category (rather than matching the full [`AcmeError`]) can use
/// this instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Protocol violation, malformed input, unparseable response, unknown
    /// dialect, missing endpoints, bad CSR, bad signature algorithm.
    Invalid,
    /// The server rejected the request's arguments (rate limit, rejected
    /// identifier, unsupported identifier, invalid contact).
    BadArg,
    /// Unauthorized / HTTP 403.
    Forbidden,
    /// HTTP 404; also used when a loaded account belongs to a different CA.
    NotFound,
    /// `badNonce` or `userActionRequired`. The pipeline retries this
    /// automatically up to its budget; callers only observe it once retries
    /// are exhausted.
    Transient,
    /// Catch-all server-side failure: unknown problem types, CAA/DNS/TLS/
    /// connection/incorrectResponse classes.
    General,
    /// An HTTP method other than GET/HEAD/POST was requested. Unreachable
    /// through this crate's typed API — [`Session`](crate::session::Session)
    /// only exposes `get`/`post` methods — but kept so the taxonomy matches
    /// the protocol core's full outcome space for callers matching on
    /// `ErrorKind` exhaustively.
    NotImplemented,
}

#[derive(Error, Debug)]
pub enum AcmeError {
    #[error("{0}")]
    AcmeProblem(AcmeProblem),

    #[error(transparent)]
    CryptoError(anyhow::Error),

    #[error("http: [{}] {0}", .0.status())]
    HttpError(http_client::Error),

    #[error("json: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("missing expected field {0}")]
    MissingExpectedField(&'static str),

    #[error("missing expected header {0}")]
    MissingExpectedHeader(&'static str),

    #[error("account key missing key id")]
    NoKeyId,

    #[error("account {0:?} is not registered with this CA")]
    AccountNotFound(String),

    #[error("response body exceeds {0} byte limit")]
    ResponseTooLarge(usize),

    #[error("{0}")]
    InvalidState(String),
}

impl AcmeError {
    /// Classify this error per the problem taxonomy (see `wire::problem`).
    pub fn kind(&self) -> ErrorKind {
        match self {
            AcmeError::AcmeProblem(problem) => problem.kind(),
            AcmeError::HttpError(err) => crate::wire::problem::classify_status(err.status()),
            AcmeError::AccountNotFound(_) => ErrorKind::NotFound,
            AcmeError::CryptoError(_)
            | AcmeError::JsonError(_)
            | AcmeError::MissingExpectedField(_)
            | AcmeError::MissingExpectedHeader(_)
            | AcmeError::NoKeyId
            | AcmeError::ResponseTooLarge(_)
            | AcmeError::InvalidState(_) => ErrorKind::Invalid,
        }
    }
}

impl From<http_client::Error> for AcmeError {
    fn from(err: http_client::Error) -> Self {
        AcmeError::HttpError(err)
    }
}
