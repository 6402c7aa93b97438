use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::common::is_false;

/// ACME Account resource.
///
/// https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.2
///
/// The V1 draft dialect has no directly equivalent resource (registration
/// is a looser bag of fields), so this type is used verbatim for V2 and
/// as a best-effort shape for V1 responses, which tend to be a subset.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct AccountResource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AccountStatus>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contact: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terms_of_service_agreed: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_account_binding: Option<Value>,

    /// A URL from which a list of orders submitted by this account can be
    /// fetched. Technically required by RFC 8555; not all servers populate it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orders: Option<String>,
}

/// ACME newAccount request body.
///
/// https://datatracker.ietf.org/doc/html/rfc8555#section-7.3
#[derive(Serialize, Deserialize, Default, Debug)]
#[serde(rename_all = "camelCase")]
pub struct NewAccountResource {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contact: Vec<String>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub terms_of_service_agreed: bool,

    /// If true, the server MUST NOT create a new account if one does not
    /// already exist for this key; this is how an existing account's kid is
    /// rediscovered from its key alone (used by `Session::use_account`'s
    /// validation step).
    #[serde(default, skip_serializing_if = "is_false")]
    pub only_return_existing: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_account_binding: Option<Value>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Valid,
    Deactivated,
    Revoked,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn rfc8555_account_example() {
        let account = AccountResource::deserialize(json!({
            "status": "valid",
            "contact": [
                "mailto:cert-admin@example.org",
                "mailto:admin@example.org"
            ],
            "termsOfServiceAgreed": true,
            "orders": "https://example.com/acme/orders/rzGoeA"
        }))
        .unwrap();

        assert_eq!(account.status, Some(AccountStatus::Valid));
        assert_eq!(
            account.contact,
            ["mailto:cert-admin@example.org", "mailto:admin@example.org"]
        );
        assert_eq!(account.terms_of_service_agreed, Some(true));
        assert_eq!(
            account.orders.unwrap(),
            "https://example.com/acme/orders/rzGoeA"
        );
    }

    #[test]
    fn new_account_only_return_existing() {
        let req = NewAccountResource {
            only_return_existing: true,
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(req).unwrap(),
            json!({"onlyReturnExisting": true})
        );
    }
}
