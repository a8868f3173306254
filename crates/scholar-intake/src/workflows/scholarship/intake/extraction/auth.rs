//! Per-request capability tokens for the extraction webhooks.
//!
//! Tokens are compact HS256 JWTs signed with a secret shared with the extraction
//! service. The claims carry a digest of the exact request body, so a token is
//! only valid for the payload it was minted for, and expire after five minutes.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::ExtractionChannel;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_ISSUER: &str = "scholar-intake";
const TOKEN_TTL_SECS: i64 = 5 * 60;

#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("shared secret is empty")]
    EmptySecret,
    #[error("unable to encode token claims: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("token is malformed")]
    Malformed,
    #[error("token signature does not verify")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("token was minted for a different payload")]
    PayloadMismatch,
}

/// Strategy for authenticating a request to an extraction channel.
pub trait RequestSigner: Send + Sync {
    fn sign(&self, channel: ExtractionChannel, body: &[u8]) -> Result<String, SigningError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    pub body_sha256: String,
}

#[derive(Serialize)]
struct TokenHeader {
    alg: &'static str,
    typ: &'static str,
}

/// Signs tokens with a secret shared between this client and the extraction service.
#[derive(Clone)]
pub struct SharedSecretSigner {
    secret: Vec<u8>,
    ttl: Duration,
}

impl SharedSecretSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, SigningError> {
        let secret = secret.as_ref().to_vec();
        if secret.is_empty() {
            return Err(SigningError::EmptySecret);
        }

        Ok(Self {
            secret,
            ttl: Duration::seconds(TOKEN_TTL_SECS),
        })
    }

    pub fn sign_at(
        &self,
        channel: ExtractionChannel,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<String, SigningError> {
        let header = TokenHeader {
            alg: "HS256",
            typ: "JWT",
        };
        let claims = TokenClaims {
            iss: TOKEN_ISSUER.to_string(),
            aud: channel.label().to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
            body_sha256: body_digest(body),
        };

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?),
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?)
        );
        let signature = self.mac(signing_input.as_bytes())?.finalize().into_bytes();
        let signature = URL_SAFE_NO_PAD.encode(signature);

        Ok(format!("{signing_input}.{signature}"))
    }

    /// Check a token the way the extraction service does.
    pub fn verify(
        &self,
        token: &str,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<TokenClaims, SigningError> {
        let (signing_input, signature) = token.rsplit_once('.').ok_or(SigningError::Malformed)?;
        let (_, encoded_claims) = signing_input
            .split_once('.')
            .ok_or(SigningError::Malformed)?;

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| SigningError::Malformed)?;
        self.mac(signing_input.as_bytes())?
            .verify_slice(&signature)
            .map_err(|_| SigningError::BadSignature)?;

        let claims_bytes = URL_SAFE_NO_PAD
            .decode(encoded_claims)
            .map_err(|_| SigningError::Malformed)?;
        let claims: TokenClaims =
            serde_json::from_slice(&claims_bytes).map_err(|_| SigningError::Malformed)?;

        if now.timestamp() >= claims.exp {
            return Err(SigningError::Expired);
        }
        if claims.body_sha256 != body_digest(body) {
            return Err(SigningError::PayloadMismatch);
        }

        Ok(claims)
    }

    fn mac(&self, input: &[u8]) -> Result<HmacSha256, SigningError> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.secret)
            .map_err(|_| SigningError::EmptySecret)?;
        mac.update(input);
        Ok(mac)
    }
}

impl RequestSigner for SharedSecretSigner {
    fn sign(&self, channel: ExtractionChannel, body: &[u8]) -> Result<String, SigningError> {
        self.sign_at(channel, body, Utc::now())
    }
}

impl std::fmt::Debug for SharedSecretSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSecretSigner")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

fn body_digest(body: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).single().expect("valid time")
    }

    #[test]
    fn token_verifies_for_its_own_payload() {
        let signer = SharedSecretSigner::new("top-secret").expect("signer");
        let token = signer
            .sign_at(ExtractionChannel::Id, b"{\"ocrText\":\"x\"}", fixed_now())
            .expect("signs");

        assert_eq!(token.split('.').count(), 3);
        let claims = signer
            .verify(&token, b"{\"ocrText\":\"x\"}", fixed_now())
            .expect("verifies");
        assert_eq!(claims.aud, ExtractionChannel::Id.label());
        assert_eq!(claims.exp - claims.iat, TOKEN_TTL_SECS);
    }

    #[test]
    fn token_is_bound_to_payload() {
        let signer = SharedSecretSigner::new("top-secret").expect("signer");
        let token = signer
            .sign_at(ExtractionChannel::Grades, b"original", fixed_now())
            .expect("signs");

        assert!(matches!(
            signer.verify(&token, b"tampered", fixed_now()),
            Err(SigningError::PayloadMismatch)
        ));
    }

    #[test]
    fn token_expires_after_five_minutes() {
        let signer = SharedSecretSigner::new("top-secret").expect("signer");
        let token = signer
            .sign_at(ExtractionChannel::Registration, b"body", fixed_now())
            .expect("signs");

        let later = fixed_now() + Duration::seconds(TOKEN_TTL_SECS);
        assert!(matches!(
            signer.verify(&token, b"body", later),
            Err(SigningError::Expired)
        ));
        assert!(signer
            .verify(&token, b"body", later - Duration::seconds(1))
            .is_ok());
    }

    #[test]
    fn other_secrets_are_rejected() {
        let signer = SharedSecretSigner::new("top-secret").expect("signer");
        let imposter = SharedSecretSigner::new("guess").expect("signer");
        let token = imposter
            .sign_at(ExtractionChannel::Id, b"body", fixed_now())
            .expect("signs");

        assert!(matches!(
            signer.verify(&token, b"body", fixed_now()),
            Err(SigningError::BadSignature)
        ));
    }

    #[test]
    fn empty_secret_is_refused() {
        assert!(matches!(
            SharedSecretSigner::new(""),
            Err(SigningError::EmptySecret)
        ));
    }
}
