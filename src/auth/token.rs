//! Access token issuing and validation.
//!
//! Tokens are compact three-segment JWTs (`header.payload.signature`)
//! signed with HMAC-SHA256. The signing secret is injected at
//! construction; rotating it invalidates every outstanding token at
//! once. There is no denylist.

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Fixed validity window for issued tokens: seven days.
pub const TOKEN_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct TokenHeader {
    alg: String,
    typ: String,
}

impl TokenHeader {
    fn hs256() -> Self {
        Self {
            alg: "HS256".to_string(),
            typ: "JWT".to_string(),
        }
    }
}

/// Claims carried by an issued token.
///
/// The privilege flag is a snapshot at issuance and is never
/// authoritative; authorization re-fetches the live identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub member_uuid: String,
    pub is_admin: bool,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed token")]
    Malformed,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("token not yet valid")]
    NotYetValid,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("invalid signing key")]
    Key,
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, Error> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(segment: &str) -> Result<T, Error> {
    let bytes = Base64UrlUnpadded::decode_vec(segment).map_err(|_| Error::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| Error::Malformed)
}

fn mac(secret: &[u8], signing_input: &[u8]) -> Result<HmacSha256, Error> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| Error::Key)?;
    mac.update(signing_input);
    Ok(mac)
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX))
}

/// Issues and validates signed access tokens.
pub struct TokenCodec {
    secret: SecretString,
    issuer: String,
}

impl TokenCodec {
    #[must_use]
    pub fn new(secret: SecretString, issuer: String) -> Self {
        Self { secret, issuer }
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Issue a token for a subject, valid from now for seven days.
    ///
    /// # Errors
    ///
    /// Returns an error if claims cannot be encoded or signing fails.
    pub fn issue(&self, subject_id: &str, is_admin: bool) -> Result<String, Error> {
        self.issue_at(subject_id, is_admin, unix_now())
    }

    fn issue_at(&self, subject_id: &str, is_admin: bool, now: i64) -> Result<String, Error> {
        let claims = Claims {
            member_uuid: subject_id.to_string(),
            is_admin,
            iss: self.issuer.clone(),
            iat: now,
            exp: now + TOKEN_TTL_SECONDS,
        };

        let header_b64 = b64e_json(&TokenHeader::hs256())?;
        let claims_b64 = b64e_json(&claims)?;
        let signing_input = format!("{header_b64}.{claims_b64}");

        let signature = mac(self.secret.expose_secret().as_bytes(), signing_input.as_bytes())?
            .finalize()
            .into_bytes();
        let signature_b64 = Base64UrlUnpadded::encode_string(&signature);

        Ok(format!("{signing_input}.{signature_b64}"))
    }

    /// Validate a token and return its claims exactly as issued.
    ///
    /// The signature is verified before any claim is trusted. Claims are
    /// not re-checked against current identity state here.
    ///
    /// # Errors
    ///
    /// `Malformed` on structural decode failure, `InvalidSignature` on MAC
    /// mismatch, `Expired` past the window, `NotYetValid` before it.
    pub fn validate(&self, token: &str) -> Result<Claims, Error> {
        self.validate_at(token, unix_now())
    }

    fn validate_at(&self, token: &str, now: i64) -> Result<Claims, Error> {
        let mut segments = token.split('.');
        let header_b64 = segments.next().ok_or(Error::Malformed)?;
        let claims_b64 = segments.next().ok_or(Error::Malformed)?;
        let signature_b64 = segments.next().ok_or(Error::Malformed)?;
        if segments.next().is_some() {
            return Err(Error::Malformed);
        }

        let header: TokenHeader = b64d_json(header_b64)?;
        if header.alg != "HS256" {
            return Err(Error::Malformed);
        }

        let signature = Base64UrlUnpadded::decode_vec(signature_b64).map_err(|_| Error::Malformed)?;
        let signing_input = format!("{header_b64}.{claims_b64}");
        mac(self.secret.expose_secret().as_bytes(), signing_input.as_bytes())?
            .verify_slice(&signature)
            .map_err(|_| Error::InvalidSignature)?;

        let claims: Claims = b64d_json(claims_b64)?;
        if now < claims.iat {
            return Err(Error::NotYetValid);
        }
        if now > claims.exp {
            return Err(Error::Expired);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn codec() -> TokenCodec {
        TokenCodec::new(SecretString::from("test-secret"), "agora".to_string())
    }

    #[test]
    fn round_trip_returns_claims_as_issued() -> Result<(), Error> {
        let codec = codec();
        let token = codec.issue_at("member-1", true, NOW)?;
        let claims = codec.validate_at(&token, NOW)?;

        assert_eq!(claims.member_uuid, "member-1");
        assert!(claims.is_admin);
        assert_eq!(claims.iss, "agora");
        assert_eq!(claims.iat, NOW);
        assert_eq!(claims.exp, NOW + TOKEN_TTL_SECONDS);
        Ok(())
    }

    #[test]
    fn window_boundaries_are_inclusive() -> Result<(), Error> {
        let codec = codec();
        let token = codec.issue_at("member-1", false, NOW)?;

        assert!(codec.validate_at(&token, NOW).is_ok());
        assert!(codec.validate_at(&token, NOW + TOKEN_TTL_SECONDS).is_ok());

        let result = codec.validate_at(&token, NOW - 1);
        assert!(matches!(result, Err(Error::NotYetValid)));

        let result = codec.validate_at(&token, NOW + TOKEN_TTL_SECONDS + 1);
        assert!(matches!(result, Err(Error::Expired)));
        Ok(())
    }

    #[test]
    fn rejects_wrong_secret() -> Result<(), Error> {
        let token = codec().issue_at("member-1", false, NOW)?;
        let other = TokenCodec::new(SecretString::from("rotated-secret"), "agora".to_string());

        let result = other.validate_at(&token, NOW);
        assert!(matches!(result, Err(Error::InvalidSignature)));
        Ok(())
    }

    #[test]
    fn rejects_tampered_claims() -> Result<(), Error> {
        let codec = codec();
        let token = codec.issue_at("member-1", false, NOW)?;

        let mut segments: Vec<&str> = token.split('.').collect();
        let forged = b64e_json(&Claims {
            member_uuid: "member-1".to_string(),
            is_admin: true,
            iss: "agora".to_string(),
            iat: NOW,
            exp: NOW + TOKEN_TTL_SECONDS,
        })?;
        segments[1] = &forged;
        let forged_token = segments.join(".");

        let result = codec.validate_at(&forged_token, NOW);
        assert!(matches!(result, Err(Error::InvalidSignature)));
        Ok(())
    }

    #[test]
    fn rejects_structural_garbage() {
        let codec = codec();
        for token in ["", "not-a-token", "a.b", "a.b.c.d", "!!!.###.$$$"] {
            let result = codec.validate_at(token, NOW);
            assert!(matches!(result, Err(Error::Malformed)), "token: {token}");
        }
    }

    #[test]
    fn rejects_unexpected_algorithm() -> Result<(), Error> {
        let codec = codec();
        let token = codec.issue_at("member-1", false, NOW)?;
        let segments: Vec<&str> = token.split('.').collect();

        let header_b64 = b64e_json(&TokenHeader {
            alg: "none".to_string(),
            typ: "JWT".to_string(),
        })?;
        let forged_token = format!("{header_b64}.{}.{}", segments[1], segments[2]);

        let result = codec.validate_at(&forged_token, NOW);
        assert!(matches!(result, Err(Error::Malformed)));
        Ok(())
    }
}
