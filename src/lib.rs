pub mod crypto;
pub mod error;
pub(crate) mod pipeline;
pub mod request;
pub mod session;
pub mod store;
pub mod wire;

pub(crate) mod base64url;

use std::sync::Arc;

pub use error::{AcmeError, AcmeResult};
pub use session::Session;

/// Ambient product token prepended to the user-agent string. This is just a
/// constant baked into the convenience constructors below, since this crate
/// has no other host to inherit a product name from. Callers embedding this
/// crate in a larger product should use [`Session::create`] directly and
/// pass their own.
const PRODUCT: &str = "acme-core";

pub static LETS_ENCRYPT_DIRECTORY_URL: &str = "https://acme-v02.api.letsencrypt.org/directory";
pub static LETS_ENCRYPT_STAGING_DIRECTORY_URL: &str =
    "https://acme-staging-v02.api.letsencrypt.org/directory";

/// A [`Session`] bound to Let's Encrypt's production directory, with the
/// dialect already resolved.
pub async fn lets_encrypt_session(
    http: impl Into<Arc<dyn http_client::HttpClient>>,
) -> AcmeResult<Session> {
    session_for_directory_url(http, LETS_ENCRYPT_DIRECTORY_URL).await
}

/// A [`Session`] bound to Let's Encrypt's staging directory, with the
/// dialect already resolved.
pub async fn lets_encrypt_staging_session(
    http: impl Into<Arc<dyn http_client::HttpClient>>,
) -> AcmeResult<Session> {
    session_for_directory_url(http, LETS_ENCRYPT_STAGING_DIRECTORY_URL).await
}

async fn session_for_directory_url(
    http: impl Into<Arc<dyn http_client::HttpClient>>,
    directory_url: &str,
) -> AcmeResult<Session> {
    let mut session = Session::create(directory_url, http, PRODUCT, None)?;
    pipeline::ensure_dialect(&mut session).await?;
    Ok(session)
}
