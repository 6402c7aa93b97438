use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ErrorKind;

/// An RFC 7807 problem document as returned by an ACME server.
///
/// https://datatracker.ietf.org/doc/html/rfc8555#section-6.7
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AcmeProblem {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,

    /// A compound problem (`urn:ietf:params:acme:error:compound`) lists the
    /// individual failures here. Not classified on its own; callers that
    /// care should inspect it directly.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subproblems: Vec<AcmeProblem>,

    #[serde(flatten)]
    pub additional_fields: Map<String, Value>,
}

impl AcmeProblem {
    pub const CONTENT_TYPE: &'static str = "application/problem+json";

    /// The problem-type URI's trailing segment, lower-cased, with any
    /// `urn:ietf:params:acme:error:` / `urn:...:` prefix stripped. This is
    /// what gets matched against the table in [`AcmeProblemType`].
    pub fn type_suffix(&self) -> Option<String> {
        let type_ = self.type_.as_deref()?;
        let suffix = type_.rsplit(':').next().unwrap_or(type_);
        Some(suffix.to_ascii_lowercase())
    }

    pub fn problem_type(&self) -> AcmeProblemType {
        match self.type_suffix().as_deref() {
            Some(suffix) => AcmeProblemType::from_suffix(suffix),
            None => AcmeProblemType::Unknown,
        }
    }

    pub fn has_type(&self, ty: AcmeProblemType) -> bool {
        self.problem_type() == ty
    }

    /// Classify this problem document by its `type` URI. Unmatched problem
    /// types fall through to `General`, never silently to success.
    pub fn kind(&self) -> ErrorKind {
        self.problem_type().kind()
    }
}

impl fmt::Display for AcmeProblem {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (&self.type_, &self.detail) {
            (Some(type_), Some(detail)) => write!(f, "acme problem {type_}: {detail}"),
            (Some(type_), None) => write!(f, "acme problem {type_}"),
            (None, Some(detail)) => write!(f, "acme problem: {detail}"),
            (None, None) => write!(f, "acme problem"),
        }
    }
}

/// The problem-type taxonomy consulted by the request pipeline, and the
/// `ErrorKind` each type classifies to.
///
/// https://datatracker.ietf.org/doc/html/rfc8555#section-6.7
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcmeProblemType {
    BadCsr,
    BadSignatureAlgorithm,
    Malformed,
    BadRevocationReason,
    BadNonce,
    UserActionRequired,
    InvalidContact,
    RateLimited,
    RejectedIdentifier,
    UnsupportedIdentifier,
    UnsupportedContact,
    ServerInternal,
    Caa,
    Dns,
    Connection,
    Tls,
    IncorrectResponse,
    Unauthorized,
    Unknown,
}

impl AcmeProblemType {
    fn from_suffix(suffix: &str) -> Self {
        match suffix {
            "badcsr" => Self::BadCsr,
            "badsignaturealgorithm" => Self::BadSignatureAlgorithm,
            "malformed" => Self::Malformed,
            "badrevocationreason" => Self::BadRevocationReason,
            "badnonce" => Self::BadNonce,
            "useractionrequired" => Self::UserActionRequired,
            "invalidcontact" => Self::InvalidContact,
            "ratelimited" => Self::RateLimited,
            "rejectedidentifier" => Self::RejectedIdentifier,
            "unsupportedidentifier" => Self::UnsupportedIdentifier,
            "unsupportedcontact" => Self::UnsupportedContact,
            "serverinternal" => Self::ServerInternal,
            "caa" => Self::Caa,
            "dns" => Self::Dns,
            "connection" => Self::Connection,
            "tls" => Self::Tls,
            "incorrectresponse" => Self::IncorrectResponse,
            "unauthorized" => Self::Unauthorized,
            _ => Self::Unknown,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BadCsr | Self::BadSignatureAlgorithm | Self::Malformed | Self::BadRevocationReason => {
                ErrorKind::Invalid
            }
            Self::BadNonce | Self::UserActionRequired => ErrorKind::Transient,
            Self::InvalidContact
            | Self::RateLimited
            | Self::RejectedIdentifier
            | Self::UnsupportedIdentifier => ErrorKind::BadArg,
            Self::UnsupportedContact
            | Self::ServerInternal
            | Self::Caa
            | Self::Dns
            | Self::Connection
            | Self::Tls
            | Self::IncorrectResponse => ErrorKind::General,
            Self::Unauthorized => ErrorKind::Forbidden,
            Self::Unknown => ErrorKind::General,
        }
    }
}

/// Classify a non-problem HTTP error status (no `application/problem+json`
/// body was present) per §4.1.
pub fn classify_status(status: http_types::StatusCode) -> ErrorKind {
    match status as u16 {
        400 => ErrorKind::Invalid,
        403 => ErrorKind::Forbidden,
        404 => ErrorKind::NotFound,
        _ => ErrorKind::General,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn problem(type_: &str) -> AcmeProblem {
        AcmeProblem {
            type_: Some(type_.to_string()),
            detail: Some("stale".to_string()),
            status: Some(400),
            instance: None,
            subproblems: Vec::new(),
            additional_fields: Map::new(),
        }
    }

    #[test]
    fn strips_urn_prefix_and_matches_case_insensitively() {
        let p = problem("urn:ietf:params:acme:error:BadNonce");
        assert_eq!(p.problem_type(), AcmeProblemType::BadNonce);
        assert_eq!(p.kind(), ErrorKind::Transient);
    }

    #[test]
    fn short_urn_prefix_also_strips() {
        let p = problem("urn:acme:error:malformed");
        assert_eq!(p.problem_type(), AcmeProblemType::Malformed);
        assert_eq!(p.kind(), ErrorKind::Invalid);
    }

    #[test]
    fn unknown_type_is_general_not_ok() {
        let p = problem("urn:ietf:params:acme:error:somethingNew");
        assert_eq!(p.problem_type(), AcmeProblemType::Unknown);
        assert_eq!(p.kind(), ErrorKind::General);
    }

    #[test]
    fn table_matches_spec() {
        let cases: &[(&str, ErrorKind)] = &[
            ("badCSR", ErrorKind::Invalid),
            ("badSignatureAlgorithm", ErrorKind::Invalid),
            ("malformed", ErrorKind::Invalid),
            ("badRevocationReason", ErrorKind::Invalid),
            ("badNonce", ErrorKind::Transient),
            ("userActionRequired", ErrorKind::Transient),
            ("invalidContact", ErrorKind::BadArg),
            ("rateLimited", ErrorKind::BadArg),
            ("rejectedIdentifier", ErrorKind::BadArg),
            ("unsupportedIdentifier", ErrorKind::BadArg),
            ("unsupportedContact", ErrorKind::General),
            ("serverInternal", ErrorKind::General),
            ("caa", ErrorKind::General),
            ("dns", ErrorKind::General),
            ("connection", ErrorKind::General),
            ("tls", ErrorKind::General),
            ("incorrectResponse", ErrorKind::General),
            ("unauthorized", ErrorKind::Forbidden),
        ];
        for (suffix, expected) in cases {
            let p = problem(&format!("urn:ietf:params:acme:error:{suffix}"));
            assert_eq!(p.kind(), *expected, "suffix {suffix}");
        }
    }
}
