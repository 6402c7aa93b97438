use std::sync::Arc;

use http_client::HttpClient;
use serde_json::Value;

use crate::crypto::account_key::AccountKey;
use crate::error::{AcmeError, AcmeResult};
use crate::pipeline::{self, Signing};
use crate::request::{Accept, Outcome};
use crate::store::{AccountStore, StoredAccount};
use crate::wire::account::{AccountResource, NewAccountResource};
use crate::wire::directory::{Dialect, Endpoints};

/// Response bodies are never read past this many bytes, directory documents
/// and protocol responses alike.
pub(crate) const MAX_RESPONSE_BODY_BYTES: usize = 1024 * 1024;

pub(crate) const DEFAULT_MAX_RETRIES: u32 = 3;

/// An account bound into a [`Session`]: its server resource, its V2 key
/// identifier (if known), the id it is filed under in the external store,
/// and the signing key it was registered with.
///
/// The account resource and `account_key` move together as a unit (the data
/// model's "account triple") — [`Session::clear_account`] is the only thing
/// that un-sets them. `account_id` lags the other two: a freshly-created
/// account (via [`Session::post_new_account`]) has none until
/// [`Session::save_account`] files it under a caller-chosen id.
pub struct BoundAccount {
    pub account_id: Option<String>,
    pub resource: AccountResource,
    pub url: Option<String>,
    pub key: Box<dyn AccountKey>,
}

/// The root ACME client object, bound to one CA directory URL for its
/// entire lifetime.
///
/// A `Session` is not `Sync`-shareable by design: every method that can
/// issue a signed request takes `&mut self`, so the borrow checker enforces
/// the protocol's real constraint that signed POSTs against one session
/// must be serialized — a second one can't begin while the nonce the
/// first consumed is still in flight. A caller that needs concurrent
/// sessions against the same account should hold several `Session`s, one
/// per in-flight request.
pub struct Session {
    pub(crate) base_url: String,
    pub(crate) dialect: Option<Dialect>,
    pub(crate) endpoints: Option<Endpoints>,
    pub(crate) ca_agreement: Option<String>,
    pub(crate) nonce: Option<String>,
    pub(crate) account: Option<BoundAccount>,
    pub(crate) http: Arc<dyn HttpClient>,
    pub(crate) user_agent: String,
    pub(crate) proxy_url: Option<String>,
    pub(crate) short_name: String,
    pub(crate) max_retries: u32,
}

impl Session {
    /// Build a session for the CA directory at `base_url`, using `http` as
    /// the transport. `product` is the ambient product token prepended to
    /// the user-agent string (the source initializes this process-wide via
    /// `md_acme_init`; here it's a plain constructor parameter instead —
    /// see the Design Notes on avoiding global mutable state).
    ///
    /// `base_url` must be an absolute URI or this fails `Invalid`.
    pub fn create(
        base_url: impl Into<String>,
        http: impl Into<Arc<dyn HttpClient>>,
        product: impl AsRef<str>,
        proxy_url: Option<String>,
    ) -> AcmeResult<Self> {
        let base_url = base_url.into();
        let host = extract_host(&base_url)?;
        let short_name = short_name_of(host);
        Ok(Self {
            base_url,
            dialect: None,
            endpoints: None,
            ca_agreement: None,
            nonce: None,
            account: None,
            http: http.into(),
            user_agent: format!("{} mod_md/{}", product.as_ref(), env!("CARGO_PKG_VERSION")),
            proxy_url,
            short_name,
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn dialect(&self) -> Option<Dialect> {
        self.dialect
    }

    pub fn ca_agreement(&self) -> Option<&str> {
        self.ca_agreement.as_deref()
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn set_max_retries(&mut self, max_retries: u32) -> &mut Self {
        self.max_retries = max_retries;
        self
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn proxy_url(&self) -> Option<&str> {
        self.proxy_url.as_deref()
    }

    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    pub(crate) fn endpoints(&self) -> AcmeResult<&Endpoints> {
        self.endpoints
            .as_ref()
            .ok_or_else(|| AcmeError::InvalidState("dialect not yet resolved".to_string()))
    }

    /// Before a signed POST is dispatched, a nonce must be cached.
    /// Acquiring one is the pipeline's job; this just reports whether a
    /// cached nonce is already on hand.
    pub fn has_nonce(&self) -> bool {
        self.nonce.is_some()
    }

    /// Consume the cached nonce: it is cleared here, *before* the HTTP
    /// transport is engaged, so a duplicated retry is forced to re-acquire
    /// one rather than spend the same value twice.
    pub(crate) fn take_nonce(&mut self) -> Option<String> {
        self.nonce.take()
    }

    /// Replace the cached nonce from a `Replay-Nonce` response header.
    /// Called on every response, success or failure.
    pub(crate) fn set_nonce(&mut self, nonce: String) {
        self.nonce = Some(nonce);
    }

    /// The id this session's bound account is filed under in the external
    /// store, if it has been loaded via [`Self::use_account`] or saved via
    /// [`Self::save_account`].
    pub fn account_id(&self) -> Option<&str> {
        self.account.as_ref()?.account_id.as_deref()
    }

    /// The V2 key identifier (kid) of the bound account, i.e. its account
    /// URL. `None` for a V1 session (the dialect never assigns one) or when
    /// no account is bound.
    pub fn account_url(&self) -> Option<&str> {
        self.account.as_ref()?.url.as_deref()
    }

    /// Un-set the account triple. Does not touch `dialect` or `nonce` —
    /// those stay bound to the CA directory, not to any one account.
    pub fn clear_account(&mut self) {
        self.account = None;
    }

    /// Dispatch an unsigned `GET`. Never touches the nonce cache beyond the
    /// passive `Replay-Nonce` refresh.
    pub async fn get(&mut self, url: &str, accept: Accept) -> AcmeResult<Outcome> {
        let (outcome, _location) = pipeline::fetch(url, self, accept).await?;
        Ok(outcome)
    }

    /// Fetch `url` and require a JSON body.
    pub async fn get_json(&mut self, url: &str) -> AcmeResult<Value> {
        self.get(url, Accept::JsonOnly).await?.into_json()
    }

    /// Dispatch a JWS-signed `POST` as the session's bound account. Fails
    /// `Invalid` if no account is bound — this session-level check exists
    /// so the failure names the real cause instead of surfacing as a
    /// confusing signing error three layers down.
    pub async fn post(
        &mut self,
        url: &str,
        payload: Option<&Value>,
        accept: Accept,
    ) -> AcmeResult<Outcome> {
        if self.account.is_none() {
            return Err(AcmeError::InvalidState(
                "no account bound for signed POST".to_string(),
            ));
        }
        let (outcome, _location) =
            pipeline::send_signed(self, url, Signing::Account, payload, accept).await?;
        Ok(outcome)
    }

    /// Dispatch to the dialect's account-creation endpoint (`new_reg` for
    /// V1, `newAccount` for V2), signing with `key` (embedded as `jwk`,
    /// since no account is bound to sign with a kid yet). On success the
    /// returned account is bound onto the session — `account_id` stays
    /// unset until [`Self::save_account`] files it.
    ///
    /// Building `payload` (contact fields, terms-of-service agreement,
    /// `onlyReturnExisting`) is the caller's job.
    pub async fn post_new_account(
        &mut self,
        key: Box<dyn AccountKey>,
        payload: &NewAccountResource,
    ) -> AcmeResult<AccountResource> {
        pipeline::ensure_dialect(self).await?;
        let url = account_creation_url(self)?.to_string();
        let payload_value = serde_json::to_value(payload)?;

        let (outcome, location) = pipeline::send_signed(
            self,
            &url,
            Signing::NewAccount(&key),
            Some(&payload_value),
            Accept::JsonOnly,
        )
        .await?;

        let resource: AccountResource = serde_json::from_value(outcome.into_json()?)?;
        self.account = Some(BoundAccount {
            account_id: None,
            resource: resource.clone(),
            url: location,
            key,
        });
        Ok(resource)
    }

    /// Load `(account, key)` from `store` and bind it onto this session,
    /// provided it was registered against this same CA directory. An
    /// account recorded under a different `ca_url` belongs to a different
    /// CA (or dialect endpoint on the same host) and is rejected
    /// `NotFound` rather than silently reused.
    ///
    /// The account triple is left entirely unset on rejection.
    pub async fn use_account(
        &mut self,
        store: &dyn AccountStore,
        account_id: &str,
    ) -> AcmeResult<()> {
        let (stored, key) = store.load_account(account_id).await?;
        if stored.ca_url != self.base_url {
            return Err(AcmeError::AccountNotFound(account_id.to_string()));
        }
        self.account = Some(BoundAccount {
            account_id: Some(account_id.to_string()),
            resource: stored.resource,
            url: stored.account_url,
            key,
        });
        Ok(())
    }

    /// Delegate to the external account-persistence routine, filing the
    /// bound account under `account_id`. The core neither defines nor
    /// inspects the on-disk layout.
    pub async fn save_account(
        &mut self,
        store: &dyn AccountStore,
        account_id: &str,
    ) -> AcmeResult<()> {
        let base_url = self.base_url.clone();
        let account = self
            .account
            .as_ref()
            .ok_or_else(|| AcmeError::InvalidState("no account bound to save".to_string()))?;
        let stored = StoredAccount {
            ca_url: base_url,
            account_url: account.url.clone(),
            resource: account.resource.clone(),
        };
        store
            .save_account(account_id, &stored, account.key.as_ref())
            .await?;
        if let Some(bound) = self.account.as_mut() {
            bound.account_id = Some(account_id.to_string());
        }
        Ok(())
    }
}

/// The dialect's account-creation endpoint: `new_reg` for V1, `newAccount`
/// for V2.
fn account_creation_url(session: &Session) -> AcmeResult<&str> {
    match session.endpoints()? {
        Endpoints::V1(e) => Ok(e.new_reg.as_str()),
        Endpoints::V2(e) => Ok(e.new_account.as_str()),
    }
}

fn extract_host(base_url: &str) -> AcmeResult<&str> {
    let without_scheme = base_url
        .split_once("://")
        .map(|(_, rest)| rest)
        .ok_or_else(|| AcmeError::InvalidState(format!("not an absolute URI: {base_url}")))?;
    if without_scheme.is_empty() {
        return Err(AcmeError::InvalidState(format!(
            "not an absolute URI: {base_url}"
        )));
    }
    let host_and_port = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or(without_scheme);
    let host = host_and_port.rsplit_once('@').map_or(host_and_port, |(_, h)| h);
    let host = host.split(':').next().unwrap_or(host);
    if host.is_empty() {
        return Err(AcmeError::InvalidState(format!(
            "not an absolute URI: {base_url}"
        )));
    }
    Ok(host)
}

/// The last `<= 16` characters of `host`: longer hostnames are truncated
/// from the left, shorter ones kept verbatim.
fn short_name_of(host: &str) -> String {
    let len = host.chars().count();
    if len <= 16 {
        host.to_string()
    } else {
        host.chars().skip(len - 16).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_name_truncates_from_the_left() {
        assert_eq!(short_name_of("example.com"), "example.com");
        assert_eq!(short_name_of("a.very.long.hostname.example.com").len(), 16);
        assert_eq!(
            short_name_of("a.very.long.hostname.example.com"),
            "name.example.com"
        );
    }

    #[test]
    fn short_name_exactly_sixteen() {
        let host = "0123456789abcdef"; // len 16
        assert_eq!(short_name_of(host), host);
    }

    #[test]
    fn extract_host_rejects_relative() {
        assert!(extract_host("/dir").is_err());
        assert!(extract_host("not a url").is_err());
    }

    #[test]
    fn extract_host_strips_port_and_path() {
        assert_eq!(
            extract_host("https://acme.example:8443/directory").unwrap(),
            "acme.example"
        );
    }
}
