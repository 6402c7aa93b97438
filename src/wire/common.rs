use http_client::Response;

// Serde skip_serialization_if helper
pub(crate) fn is_false(value: &bool) -> bool {
    !value
}

/// Extract the `Location` response header, if present. Used to recover an
/// account's kid (key identifier) from a `newAccount`/account-update
/// response, per RFC 8555 §7.3.
pub(crate) fn location_header(resp: &Response) -> Option<String> {
    resp.header("Location")
        .map(|values| values.last().as_str().to_owned())
}

/// Extract the `Replay-Nonce` response header, if present (§4.2).
pub(crate) fn replay_nonce_header(resp: &Response) -> Option<String> {
    resp.header("Replay-Nonce")
        .map(|values| values.last().as_str().to_owned())
}
