use async_trait::async_trait;

use crate::crypto::account_key::AccountKey;
use crate::error::AcmeResult;
use crate::wire::account::AccountResource;

/// A persisted account as the external store hands it back: the account
/// resource itself, plus the CA directory URL it was registered against.
///
/// `ca_url` is what lets [`crate::session::Session::use_account`] reject an
/// account that belongs to a different CA (or dialect endpoint on the same
/// host) with `NotFound` rather than silently reusing a kid the current
/// session's CA has never heard of.
#[derive(Clone, Debug)]
pub struct StoredAccount {
    pub ca_url: String,
    pub account_url: Option<String>,
    pub resource: AccountResource,
}

/// The account-persistence interface the session consumes. The core neither
/// defines nor inspects the on-disk layout; a host application backs this
/// with whatever storage it likes (file, database, …).
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn load_account(
        &self,
        account_id: &str,
    ) -> AcmeResult<(StoredAccount, Box<dyn AccountKey>)>;

    async fn save_account(
        &self,
        account_id: &str,
        account: &StoredAccount,
        key: &dyn AccountKey,
    ) -> AcmeResult<()>;
}
