use serde_json::Value;

use crate::error::{AcmeError, AcmeResult};

/// The ACME protocol dialect a [`Session`](crate::session::Session) has
/// bound to. `V1` is the pre-RFC draft (`new-reg`/`new-authz`/`new-cert`);
/// `V2` is RFC 8555 (`newAccount`/`newOrder`/`newNonce`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dialect {
    V1,
    V2,
}

/// Endpoint URLs advertised by a V1 (legacy draft) directory document.
#[derive(Clone, Debug)]
pub struct V1Endpoints {
    pub new_authz: String,
    pub new_cert: String,
    pub new_reg: String,
    pub revoke_cert: String,
}

/// Endpoint URLs advertised by a V2 (RFC 8555) directory document.
#[derive(Clone, Debug)]
pub struct V2Endpoints {
    pub new_account: String,
    pub new_order: String,
    pub revoke_cert: String,
    pub key_change: String,
    pub new_nonce: String,
}

/// Dialect-tagged endpoint set. At most one variant is ever populated on a
/// [`Session`](crate::session::Session) (invariant I1).
#[derive(Clone, Debug)]
pub enum Endpoints {
    V1(V1Endpoints),
    V2(V2Endpoints),
}

impl Endpoints {
    pub fn dialect(&self) -> Dialect {
        match self {
            Endpoints::V1(_) => Dialect::V1,
            Endpoints::V2(_) => Dialect::V2,
        }
    }
}

/// The directory document the resolver produced: dialect-tagged endpoints
/// plus the optional terms-of-service URL advertised in `meta`.
#[derive(Clone, Debug)]
pub struct DirectoryDocument {
    pub endpoints: Endpoints,
    pub ca_agreement: Option<String>,
}

const DIAGNOSTIC: &str = "Unable to understand ACME server response.";

/// Detect the dialect of a raw directory JSON document and extract its
/// endpoints, per §4.3/§6.6. V1 is detected by the presence of `new-authz`;
/// V2 by the presence of `newAccount`. Anything else, or a recognized
/// dialect missing a required peer endpoint, is rejected wholesale —
/// dialect detection never partially binds (B2).
pub fn parse_directory(body: &Value) -> AcmeResult<DirectoryDocument> {
    let obj = body
        .as_object()
        .ok_or_else(|| AcmeError::InvalidState(DIAGNOSTIC.to_string()))?;

    if obj.contains_key("new-authz") {
        let get = |key: &'static str| -> AcmeResult<String> {
            obj.get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or(AcmeError::MissingExpectedField(key))
        };
        let endpoints = V1Endpoints {
            new_authz: get("new-authz")?,
            new_cert: get("new-cert")?,
            new_reg: get("new-reg")?,
            revoke_cert: get("revoke-cert")?,
        };
        let ca_agreement = obj
            .get("meta")
            .and_then(|meta| meta.get("terms-of-service"))
            .and_then(Value::as_str)
            .map(str::to_string);
        return Ok(DirectoryDocument {
            endpoints: Endpoints::V1(endpoints),
            ca_agreement,
        });
    }

    if obj.contains_key("newAccount") {
        let get = |key: &'static str| -> AcmeResult<String> {
            obj.get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or(AcmeError::MissingExpectedField(key))
        };
        let endpoints = V2Endpoints {
            new_account: get("newAccount")?,
            new_order: get("newOrder")?,
            revoke_cert: get("revokeCert")?,
            key_change: get("keyChange")?,
            new_nonce: get("newNonce")?,
        };
        let ca_agreement = obj
            .get("meta")
            .and_then(|meta| meta.get("termsOfService"))
            .and_then(Value::as_str)
            .map(str::to_string);
        return Ok(DirectoryDocument {
            endpoints: Endpoints::V2(endpoints),
            ca_agreement,
        });
    }

    Err(AcmeError::InvalidState(DIAGNOSTIC.to_string()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn v2_directory() {
        let doc = parse_directory(&json!({
            "newAccount": "https://acme.example/acct",
            "newOrder": "https://acme.example/ord",
            "revokeCert": "https://acme.example/rev",
            "keyChange": "https://acme.example/kc",
            "newNonce": "https://acme.example/nnc",
            "meta": {"termsOfService": "https://acme.example/tos"}
        }))
        .unwrap();
        assert_eq!(doc.endpoints.dialect(), Dialect::V2);
        match doc.endpoints {
            Endpoints::V2(ref e) => assert_eq!(e.new_account, "https://acme.example/acct"),
            _ => panic!("expected v2"),
        }
        assert_eq!(doc.ca_agreement.as_deref(), Some("https://acme.example/tos"));
    }

    #[test]
    fn v1_directory() {
        let doc = parse_directory(&json!({
            "new-authz": "https://acme.example/authz",
            "new-cert": "https://acme.example/cert",
            "new-reg": "https://acme.example/reg",
            "revoke-cert": "https://acme.example/rev",
            "meta": {"terms-of-service": "https://acme.example/tos"}
        }))
        .unwrap();
        assert_eq!(doc.endpoints.dialect(), Dialect::V1);
    }

    #[test]
    fn rejects_unrecognized_directory() {
        let err = parse_directory(&json!({"foo": "bar"})).unwrap_err();
        assert!(matches!(err, AcmeError::InvalidState(_)));
    }

    #[test]
    fn rejects_v2_missing_required_endpoint() {
        // newAccount present but newNonce missing: must not partially bind (B2).
        let err = parse_directory(&json!({
            "newAccount": "https://acme.example/acct",
            "newOrder": "https://acme.example/ord",
            "revokeCert": "https://acme.example/rev",
            "keyChange": "https://acme.example/kc"
        }))
        .unwrap_err();
        assert!(matches!(err, AcmeError::MissingExpectedField("newNonce")));
    }
}
