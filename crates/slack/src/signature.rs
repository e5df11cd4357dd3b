use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_VERSION: &str = "v0";

/// Requests older (or newer) than this are treated as replays.
pub const MAX_REQUEST_AGE_SECS: u64 = 60 * 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing request timestamp")]
    MissingTimestamp,
    #[error("missing request signature")]
    MissingSignature,
    #[error("request timestamp `{0}` is not a unix time")]
    InvalidTimestamp(String),
    #[error("request timestamp is {age_secs}s away from now")]
    Stale { age_secs: u64 },
    #[error("request signature does not match")]
    Mismatch,
    #[error("signing secret cannot key an hmac")]
    InvalidSecret,
}

/// Checks `X-Slack-Signature` headers against the app's signing secret.
pub struct RequestVerifier {
    signing_secret: SecretString,
}

impl RequestVerifier {
    pub fn new(signing_secret: SecretString) -> Self {
        Self { signing_secret }
    }

    pub fn verify(
        &self,
        timestamp: Option<&str>,
        signature: Option<&str>,
        body: &[u8],
        now_unix: i64,
    ) -> Result<(), SignatureError> {
        let timestamp = timestamp.ok_or(SignatureError::MissingTimestamp)?;
        let signature = signature.ok_or(SignatureError::MissingSignature)?;

        let sent_at: i64 = timestamp
            .trim()
            .parse()
            .map_err(|_| SignatureError::InvalidTimestamp(timestamp.to_owned()))?;
        let age_secs = now_unix.abs_diff(sent_at);
        if age_secs > MAX_REQUEST_AGE_SECS {
            return Err(SignatureError::Stale { age_secs });
        }

        let expected = signature
            .strip_prefix("v0=")
            .and_then(|digest| hex::decode(digest).ok())
            .ok_or(SignatureError::Mismatch)?;

        self.mac(timestamp, body)?.verify_slice(&expected).map_err(|_| SignatureError::Mismatch)
    }

    /// `v0=` plus the hex digest Slack would send for `body` at `timestamp`.
    pub fn sign(&self, timestamp: &str, body: &[u8]) -> Result<String, SignatureError> {
        let digest = self.mac(timestamp, body)?.finalize().into_bytes();
        Ok(format!("{SIGNATURE_VERSION}={}", hex::encode(digest)))
    }

    fn mac(&self, timestamp: &str, body: &[u8]) -> Result<HmacSha256, SignatureError> {
        let mut mac =
            <HmacSha256 as Mac>::new_from_slice(self.signing_secret.expose_secret().as_bytes())
                .map_err(|_| SignatureError::InvalidSecret)?;
        mac.update(SIGNATURE_VERSION.as_bytes());
        mac.update(b":");
        mac.update(timestamp.as_bytes());
        mac.update(b":");
        mac.update(body);
        Ok(mac)
    }
}
