use serde_json::Value;

/// How a response body should be interpreted by a convenience operation.
///
/// This is the idiomatic re-expression of the source's three-callback shape
/// (`on_init`/`on_json`/`on_res`): rather than the caller handing the
/// pipeline a JSON callback and/or a raw-response callback and the pipeline
/// picking one to invoke, the caller states up front which outcome shapes it
/// can accept and the pipeline returns a matching [`Outcome`] value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Accept {
    /// Only a parsed JSON body is acceptable; a non-JSON (or absent) body is
    /// an `INVALID` error.
    JsonOnly,
    /// Only the raw response is wanted; the body is never parsed as JSON.
    RawOnly,
    /// Prefer a parsed JSON body; if the body is absent or not JSON, fall
    /// back to the raw response instead of failing. This mirrors the source
    /// providing both `on_json` and `on_res`, where JSON wins ties.
    PreferJson,
}

/// A successful response, shaped per the [`Accept`] the caller requested.
#[derive(Debug)]
pub enum Outcome {
    Json(Value),
    Raw(RawResponse),
}

impl Outcome {
    /// Unwrap a `Json` outcome, or fail `INVALID` if the pipeline returned a
    /// raw response instead (only possible if the caller passed
    /// [`Accept::PreferJson`] and the server sent a non-JSON body).
    pub fn into_json(self) -> crate::error::AcmeResult<Value> {
        match self {
            Outcome::Json(v) => Ok(v),
            Outcome::Raw(_) => Err(crate::error::AcmeError::InvalidState(
                "expected a JSON response body".to_string(),
            )),
        }
    }
}

/// A response the pipeline could not (or was told not to) parse as JSON.
#[derive(Clone, Debug)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
