//! Temporary read URL issuance.
//!
//! Cloud backends sign with their own credentials ([`NativeSigner`]). Backends that
//! cannot sign (local filesystem, in-memory) use [`HmacUrlSigner`]: the URL points
//! at the service's own file route and carries an expiry plus an HMAC-SHA256 tag
//! over the method, key and expiry.
//!
//! URL format: `{base_url}/{key}?expires={unix_secs}&signature={base64url(tag)}`.

use crate::traits::{StorageError, StorageResult};
use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use http::Method;
use object_store::path::Path;
use object_store::signer::Signer;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;

/// Characters left as-is when a key is placed in a URL path.
const KEY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Issues read-only, time-bounded URLs for object keys.
#[async_trait]
pub trait UrlSigner: Send + Sync {
    async fn sign_read(&self, key: &str, expires_in: Duration) -> StorageResult<String>;
}

/// Delegates signing to the backend's native presigning (S3 presigned GET, Azure SAS).
pub struct NativeSigner<S> {
    signer: Arc<S>,
}

impl<S> NativeSigner<S> {
    pub fn new(signer: Arc<S>) -> Self {
        Self { signer }
    }
}

#[async_trait]
impl<S> UrlSigner for NativeSigner<S>
where
    S: Signer + 'static,
{
    async fn sign_read(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        let location = Path::parse(key).map_err(|e| StorageError::InvalidKey(e.to_string()))?;
        let url = self
            .signer
            .signed_url(Method::GET, &location, expires_in)
            .await
            .map_err(|e| StorageError::from_object_store(e, key))?;
        Ok(url.to_string())
    }
}

/// Self-issued signed URLs for backends without native presigning.
#[derive(Clone)]
pub struct HmacUrlSigner {
    base_url: String,
    secret: Vec<u8>,
    clock_skew: Duration,
}

impl std::fmt::Debug for HmacUrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacUrlSigner")
            .field("base_url", &self.base_url)
            .field("clock_skew", &self.clock_skew)
            .finish_non_exhaustive()
    }
}

impl HmacUrlSigner {
    /// # Arguments
    /// * `base_url` - URL of the file route, e.g. "http://localhost:4000/files"
    /// * `secret` - HMAC key
    pub fn new(base_url: impl Into<String>, secret: impl AsRef<[u8]>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret: secret.as_ref().to_vec(),
            clock_skew: Duration::ZERO,
        }
    }

    /// Accept URLs up to `skew` past their expiry to absorb clock drift between hosts.
    pub fn with_clock_skew(mut self, skew: Duration) -> Self {
        self.clock_skew = skew;
        self
    }

    fn mac(&self) -> Hmac<Sha256> {
        let mut mac =
            Hmac::<Sha256>::new_from_slice(&self.secret).expect("HMAC accepts any key size");
        mac.update(Method::GET.as_str().as_bytes());
        mac
    }

    fn tag(&self, key: &str, expires: i64) -> Hmac<Sha256> {
        let mut mac = self.mac();
        mac.update(b"\n");
        mac.update(key.as_bytes());
        mac.update(b"\n");
        mac.update(&expires.to_be_bytes());
        mac
    }

    /// Build a URL for `key` valid until `expires_at`.
    pub fn sign_until(&self, key: &str, expires_at: DateTime<Utc>) -> String {
        let expires = expires_at.timestamp();
        let signature = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .encode(self.tag(key, expires).finalize().into_bytes());
        format!(
            "{}/{}?expires={}&signature={}",
            self.base_url,
            utf8_percent_encode(key, KEY_ENCODE_SET),
            expires,
            signature
        )
    }

    /// Check a presented URL's parts at time `now`.
    ///
    /// Fails with `Forbidden` if the signature does not match or the URL expired
    /// more than the configured skew ago.
    pub fn verify(
        &self,
        key: &str,
        expires: i64,
        signature: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<()> {
        let tag = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| StorageError::Forbidden("Malformed URL signature".to_string()))?;

        self.tag(key, expires)
            .verify_slice(&tag)
            .map_err(|_| StorageError::Forbidden("Invalid URL signature".to_string()))?;

        let skew = i64::try_from(self.clock_skew.as_secs()).unwrap_or(i64::MAX);
        if now.timestamp() > expires.saturating_add(skew) {
            return Err(StorageError::Forbidden("URL has expired".to_string()));
        }

        Ok(())
    }
}

#[async_trait]
impl UrlSigner for HmacUrlSigner {
    async fn sign_read(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        let ttl = chrono::Duration::from_std(expires_in)
            .map_err(|e| StorageError::ConfigError(format!("Invalid URL lifetime: {}", e)))?;
        Ok(self.sign_until(key, Utc::now() + ttl))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> HmacUrlSigner {
        HmacUrlSigner::new("http://localhost:4000/files/", "0123456789abcdef0123456789abcdef")
            .with_clock_skew(Duration::from_secs(30))
    }

    fn query_param<'a>(url: &'a str, name: &str) -> &'a str {
        url.split(['?', '&'])
            .find_map(|pair| pair.strip_prefix(&format!("{}=", name)))
            .unwrap()
    }

    #[test]
    fn test_url_shape() {
        let issued = Utc::now();
        let url = signer().sign_until("jobs/AB12CDE-20240101/spare/preImage.jpg", issued);
        assert!(url.starts_with(
            "http://localhost:4000/files/jobs/AB12CDE-20240101/spare/preImage.jpg?expires="
        ));
        assert_eq!(query_param(&url, "expires"), issued.timestamp().to_string());
    }

    #[test]
    fn test_url_valid_until_expiry_plus_skew() {
        let signer = signer();
        let key = "jobs/AB12CDE-20240101/front-left/postImage.png";
        let issued_at = Utc::now();
        let expires_at = issued_at + chrono::Duration::minutes(5);
        let url = signer.sign_until(key, expires_at);
        let expires: i64 = query_param(&url, "expires").parse().unwrap();
        let signature = query_param(&url, "signature");

        assert!(signer.verify(key, expires, signature, issued_at).is_ok());
        assert!(signer
            .verify(key, expires, signature, expires_at - chrono::Duration::seconds(1))
            .is_ok());
        assert!(signer
            .verify(key, expires, signature, expires_at + chrono::Duration::seconds(30))
            .is_ok());

        let err = signer
            .verify(key, expires, signature, expires_at + chrono::Duration::seconds(31))
            .unwrap_err();
        assert!(matches!(err, StorageError::Forbidden(_)));
    }

    #[test]
    fn test_signature_bound_to_key_and_expiry() {
        let signer = signer();
        let now = Utc::now();
        let url = signer.sign_until("jobs/a/init.json", now + chrono::Duration::minutes(5));
        let expires: i64 = query_param(&url, "expires").parse().unwrap();
        let signature = query_param(&url, "signature");

        assert!(signer
            .verify("jobs/b/init.json", expires, signature, now)
            .is_err());
        assert!(signer
            .verify("jobs/a/init.json", expires + 3600, signature, now)
            .is_err());
    }

    #[test]
    fn test_other_secret_rejected() {
        let now = Utc::now();
        let url = signer().sign_until("k", now + chrono::Duration::minutes(1));
        let expires: i64 = query_param(&url, "expires").parse().unwrap();
        let other = HmacUrlSigner::new("http://localhost:4000/files", "another-secret");
        assert!(other
            .verify("k", expires, query_param(&url, "signature"), now)
            .is_err());
    }

    #[tokio::test]
    async fn test_sign_read_uses_ttl() {
        let before = Utc::now().timestamp();
        let url = signer()
            .sign_read("jobs/x/init.json", Duration::from_secs(300))
            .await
            .unwrap();
        let expires: i64 = query_param(&url, "expires").parse().unwrap();
        assert!(expires >= before + 300);
        assert!(expires <= Utc::now().timestamp() + 300);
    }
}
