//! Slack request signing: HMAC-SHA256 over `v0:{timestamp}:{body}`.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use crate::errors::SignatureError;

type HmacSha256 = Hmac<Sha256>;

pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
pub const SIGNATURE_HEADER: &str = "x-slack-signature";

const VERSION_PREFIX: &str = "v0=";

#[derive(Clone, Debug)]
pub struct RequestVerifier {
    signing_secret: SecretString,
    tolerance_secs: i64,
}

impl RequestVerifier {
    pub fn new(signing_secret: SecretString, tolerance_secs: u64) -> Self {
        Self { signing_secret, tolerance_secs: i64::try_from(tolerance_secs).unwrap_or(i64::MAX) }
    }

    /// Checks freshness first, then compares the MAC in constant time.
    pub fn verify(
        &self,
        timestamp: Option<&str>,
        signature: Option<&str>,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<(), SignatureError> {
        let timestamp = timestamp.ok_or(SignatureError::MissingHeader(TIMESTAMP_HEADER))?;
        let signature = signature.ok_or(SignatureError::MissingHeader(SIGNATURE_HEADER))?;

        let sent_at: i64 =
            timestamp.trim().parse().map_err(|_| SignatureError::MalformedTimestamp)?;
        if (now.timestamp() - sent_at).abs() > self.tolerance_secs {
            return Err(SignatureError::StaleTimestamp);
        }

        let provided = signature
            .strip_prefix(VERSION_PREFIX)
            .and_then(|encoded| hex::decode(encoded).ok())
            .ok_or(SignatureError::MalformedSignature)?;

        self.mac(timestamp, body)?.verify_slice(&provided).map_err(|_| SignatureError::Mismatch)
    }

    /// Produces the header value Slack would send for this body.
    pub fn sign(&self, timestamp: &str, body: &[u8]) -> Result<String, SignatureError> {
        let digest = self.mac(timestamp, body)?.finalize().into_bytes();
        Ok(format!("{VERSION_PREFIX}{}", hex::encode(digest)))
    }

    fn mac(&self, timestamp: &str, body: &[u8]) -> Result<HmacSha256, SignatureError> {
        let mut mac = HmacSha256::new_from_slice(self.signing_secret.expose_secret().as_bytes())
            .map_err(|_| SignatureError::MalformedSignature)?;
        mac.update(b"v0:");
        mac.update(timestamp.as_bytes());
        mac.update(b":");
        mac.update(body);
        Ok(mac)
    }
}
