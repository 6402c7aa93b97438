use http_client::{Request, Response};
use serde_json::value::RawValue;
use serde_json::Value;

use crate::crypto::account_key::AccountKey;
use crate::crypto::jws::{jws_flattened, JwsHeader};
use crate::error::{AcmeError, AcmeResult, ErrorKind};
use crate::request::{Accept, Outcome, RawResponse};
use crate::session::{Session, MAX_RESPONSE_BODY_BYTES};
use crate::wire::common::{location_header, replay_nonce_header};
use crate::wire::directory::{parse_directory, Dialect};
use crate::wire::problem::AcmeProblem;

/// Who signs a request, and under what identity, per dialect.
pub(crate) enum Signing<'a> {
    /// Sign with an explicit key not yet bound to the session, embedding its
    /// public JWK directly (`newAccount`, or recovering an existing account
    /// by key via `onlyReturnExisting`).
    NewAccount(&'a Box<dyn AccountKey>),
    /// Sign as the session's already-bound account.
    Account,
}

/// Resolve the CA's directory document and bind the session's dialect and
/// endpoints, if not already bound. Runs once: nothing later mutates
/// `dialect`.
pub(crate) async fn ensure_dialect(session: &mut Session) -> AcmeResult<()> {
    if session.endpoints.is_some() {
        return Ok(());
    }

    let req = Request::get(session.base_url.as_str());
    let mut resp = session.http.send(req).await?;
    http_error_result(&mut resp).await?;
    let body = read_body_capped(&mut resp).await?;
    let doc = parse_directory(&serde_json::from_slice(&body)?)?;

    log::debug!(
        "{}: bound dialect {:?}",
        session.short_name,
        doc.endpoints.dialect()
    );
    session.dialect = Some(doc.endpoints.dialect());
    session.ca_agreement = doc.ca_agreement;
    session.endpoints = Some(doc.endpoints);
    Ok(())
}

fn new_nonce_url(session: &Session) -> AcmeResult<&str> {
    match session.endpoints()? {
        crate::wire::directory::Endpoints::V1(e) => Ok(e.new_reg.as_str()),
        crate::wire::directory::Endpoints::V2(e) => Ok(e.new_nonce.as_str()),
    }
}

/// Refresh the nonce cache if empty, by HEAD-ing the dialect's new-nonce
/// endpoint (V1: `new_reg`; V2: the dedicated `new_nonce` endpoint).
pub(crate) async fn ensure_nonce(session: &mut Session) -> AcmeResult<()> {
    if session.has_nonce() {
        return Ok(());
    }
    let url = new_nonce_url(session)?.to_string();
    let req = Request::head(url.as_str());
    let resp = session.http.send(req).await?;
    let nonce =
        replay_nonce_header(&resp).ok_or(AcmeError::MissingExpectedHeader("Replay-Nonce"))?;
    session.set_nonce(nonce);
    Ok(())
}

/// Dispatch an unsigned GET or HEAD request: no dialect setup, no nonce
/// touched beyond the passive refresh from the response header.
///
/// Returns the `Location` header alongside the outcome; most callers ignore
/// it, but it's how a re-fetched account resource recovers its kid.
pub(crate) async fn fetch(
    url: &str,
    session: &mut Session,
    accept: Accept,
) -> AcmeResult<(Outcome, Option<String>)> {
    let req = Request::get(url);
    let mut resp = session.http.send(req).await?;
    if let Some(nonce) = replay_nonce_header(&resp) {
        session.set_nonce(nonce);
    }
    http_error_result(&mut resp).await?;
    let location = location_header(&resp);
    let outcome = classify_success(&mut resp, accept).await?;
    Ok((outcome, location))
}

/// Send a JWS-signed POST through the full pipeline: pre-flight
/// dialect/nonce setup, protected-header assembly, signing, dispatch,
/// response classification, and automatic retry on a transient error up to
/// `session.max_retries`, looping rather than recursing so the retry budget
/// can't blow the stack.
pub(crate) async fn send_signed(
    session: &mut Session,
    url: &str,
    signing: Signing<'_>,
    payload: Option<&Value>,
    accept: Accept,
) -> AcmeResult<(Outcome, Option<String>)> {
    let mut retries_left = session.max_retries;

    loop {
        ensure_dialect(session).await?;
        ensure_nonce(session).await?;

        let nonce = session
            .take_nonce()
            .ok_or(AcmeError::MissingExpectedHeader("Replay-Nonce"))?;
        let dialect = session.endpoints()?.dialect();

        let (kid, jwk, signer): (Option<String>, Option<Box<RawValue>>, &Box<dyn AccountKey>) =
            match &signing {
                Signing::NewAccount(key) => {
                    let public_jwk = key.public_jwk().map_err(AcmeError::CryptoError)?;
                    let jwk = RawValue::from_string(public_jwk).map_err(AcmeError::JsonError)?;
                    (None, Some(jwk), *key)
                }
                Signing::Account => {
                    let account = session
                        .account
                        .as_ref()
                        .ok_or_else(|| AcmeError::InvalidState("no account bound".to_string()))?;
                    match dialect {
                        Dialect::V2 => {
                            let kid = account.url.clone().ok_or(AcmeError::NoKeyId)?;
                            (Some(kid), None, &account.key)
                        }
                        Dialect::V1 => {
                            let public_jwk =
                                account.key.public_jwk().map_err(AcmeError::CryptoError)?;
                            let jwk =
                                RawValue::from_string(public_jwk).map_err(AcmeError::JsonError)?;
                            (None, Some(jwk), &account.key)
                        }
                    }
                }
            };

        let header = JwsHeader {
            alg: signer.jws_alg(),
            nonce: &nonce,
            url: matches!(dialect, Dialect::V2).then_some(url),
            jwk: jwk.as_deref(),
            kid: kid.as_deref(),
        };

        let payload_bytes = match payload {
            Some(p) => serde_json::to_vec(p)?,
            None => Vec::new(),
        };

        let jws = jws_flattened(signer, &header, &payload_bytes).map_err(AcmeError::CryptoError)?;

        let mut req = Request::post(url);
        req.insert_header("User-Agent", session.user_agent.as_str());
        req.set_body(&jws);

        let mut resp = session.http.send(req).await?;
        if let Some(nonce) = replay_nonce_header(&resp) {
            session.set_nonce(nonce);
        }

        match http_error_result(&mut resp).await {
            Ok(()) => {
                let location = location_header(&resp);
                let outcome = classify_success(&mut resp, accept).await?;
                return Ok((outcome, location));
            }
            Err(err) => {
                if err.kind() == ErrorKind::Transient {
                    if retries_left == 0 {
                        log::debug!(
                            "{}: transient ACME error, retries exhausted: {}",
                            session.short_name,
                            err
                        );
                        return Err(err);
                    }
                    log::debug!(
                        "{}: transient ACME error, retrying ({} left): {}",
                        session.short_name,
                        retries_left,
                        err
                    );
                    retries_left -= 1;
                    continue;
                }
                log::warn!("{}: ACME request failed: {}", session.short_name, err);
                return Err(err);
            }
        }
    }
}

async fn classify_success(resp: &mut Response, accept: Accept) -> AcmeResult<Outcome> {
    let status: u16 = resp.status().into();
    let body = read_body_capped(resp).await?;

    if matches!(accept, Accept::RawOnly) {
        return Ok(Outcome::Raw(to_raw_response(resp, status, body)));
    }

    match serde_json::from_slice::<Value>(&body) {
        Ok(value) => Ok(Outcome::Json(value)),
        // An absent body is the documented "no body" case that falls
        // through to the raw response; a present-but-malformed body is
        // always INVALID, even when the caller would accept a raw fallback.
        Err(_) if matches!(accept, Accept::PreferJson) && body.is_empty() => {
            Ok(Outcome::Raw(to_raw_response(resp, status, body)))
        }
        Err(_) => Err(AcmeError::InvalidState(
            "expected a JSON response body".to_string(),
        )),
    }
}

fn to_raw_response(resp: &Response, status: u16, body: Vec<u8>) -> RawResponse {
    let headers = resp
        .iter()
        .map(|(name, values)| (name.to_string(), values.last().as_str().to_owned()))
        .collect();
    RawResponse {
        status,
        headers,
        body,
    }
}

/// Read a response body, failing `ResponseTooLarge` rather than buffering an
/// unbounded amount of attacker- or bug-controlled data.
pub(crate) async fn read_body_capped(resp: &mut Response) -> AcmeResult<Vec<u8>> {
    let body = resp.body_bytes().await?;
    if body.len() > MAX_RESPONSE_BODY_BYTES {
        return Err(AcmeError::ResponseTooLarge(MAX_RESPONSE_BODY_BYTES));
    }
    Ok(body)
}

/// If `resp`'s status indicates failure, classify it: a `problem+json` body
/// becomes `AcmeError::AcmeProblem`; anything else becomes a generic
/// transport error tagged with the status.
async fn http_error_result(resp: &mut Response) -> AcmeResult<()> {
    let status = resp.status();
    if status.is_success() || status.is_informational() {
        return Ok(());
    }

    if resp
        .content_type()
        .map(|ct| ct.essence() == AcmeProblem::CONTENT_TYPE)
        .unwrap_or(false)
    {
        let body = read_body_capped(resp).await?;
        if let Ok(problem) = serde_json::from_slice::<AcmeProblem>(&body) {
            return Err(AcmeError::AcmeProblem(problem));
        }
    }

    Err(AcmeError::from(http_client::Error::from_str(status, "")))
}
