//! Scoped authorization over bearer tokens.
//!
//! Token claims are a snapshot taken at issuance. Before any access is
//! granted the guard re-fetches the live identity from the record store,
//! so a demoted or deactivated member loses access immediately instead
//! of at natural token expiry.

use axum::http::{header::AUTHORIZATION, HeaderMap};
use std::future::Future;
use thiserror::Error;

use super::token::TokenCodec;

/// Minimum privilege level an operation requires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    None,
    Authenticated,
    Administrator,
}

/// Live subject state resolved from the record store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub subject_id: String,
    pub is_admin: bool,
    pub is_active: bool,
}

/// Record-store seam for the per-call identity re-fetch.
pub trait IdentityStore {
    /// Fetch the live identity for a subject, or `None` when unknown.
    fn find_identity(
        &self,
        subject_id: &str,
    ) -> impl Future<Output = anyhow::Result<Option<Identity>>> + Send;
}

/// Authorization failures are terminal and carry a distinguishable kind;
/// there are no retries.
#[derive(Debug, Error)]
pub enum GuardError {
    #[error("unauthenticated")]
    Unauthenticated,
    #[error("forbidden")]
    Forbidden,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Resolve the caller of an operation that requires `scope`.
///
/// `Scope::None` with no `Authorization` header resolves to no identity.
/// A header that is present but invalid is rejected even on `None`-scoped
/// calls rather than silently ignored.
///
/// # Errors
///
/// `Unauthenticated` for a missing/invalid/expired token or a missing or
/// deactivated identity, `Forbidden` for a valid identity lacking the
/// required privilege, `Store` when the identity re-fetch itself fails.
pub async fn authorize<S: IdentityStore>(
    scope: Scope,
    headers: &HeaderMap,
    codec: &TokenCodec,
    store: &S,
) -> Result<Option<Identity>, GuardError> {
    let token = match bearer_token(headers) {
        Some(token) => token,
        None if scope == Scope::None => return Ok(None),
        None => return Err(GuardError::Unauthenticated),
    };

    let claims = codec
        .validate(&token)
        .map_err(|_| GuardError::Unauthenticated)?;

    // Claims are not trusted here; only the live record decides.
    let identity = store
        .find_identity(&claims.member_uuid)
        .await?
        .ok_or(GuardError::Unauthenticated)?;
    if !identity.is_active {
        return Err(GuardError::Unauthenticated);
    }

    if scope == Scope::Administrator && !identity.is_admin {
        return Err(GuardError::Forbidden);
    }

    Ok(Some(identity))
}

/// Like [`authorize`], for scopes where the caller must be present.
///
/// # Errors
///
/// As [`authorize`], plus `Unauthenticated` when no identity resolves.
pub async fn require<S: IdentityStore>(
    scope: Scope,
    headers: &HeaderMap,
    codec: &TokenCodec,
    store: &S,
) -> Result<Identity, GuardError> {
    authorize(scope, headers, codec, store)
        .await?
        .ok_or(GuardError::Unauthenticated)
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use secrecy::SecretString;
    use std::collections::HashMap;

    struct MemberDirectory(HashMap<String, Identity>);

    impl MemberDirectory {
        fn with(identities: &[Identity]) -> Self {
            Self(
                identities
                    .iter()
                    .map(|identity| (identity.subject_id.clone(), identity.clone()))
                    .collect(),
            )
        }
    }

    impl IdentityStore for MemberDirectory {
        async fn find_identity(&self, subject_id: &str) -> anyhow::Result<Option<Identity>> {
            Ok(self.0.get(subject_id).cloned())
        }
    }

    fn codec() -> TokenCodec {
        TokenCodec::new(SecretString::from("guard-test-secret"), "agora".to_string())
    }

    fn member(subject_id: &str, is_admin: bool, is_active: bool) -> Identity {
        Identity {
            subject_id: subject_id.to_string(),
            is_admin,
            is_active,
        }
    }

    fn headers_with(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).expect("header value"),
        );
        headers
    }

    #[tokio::test]
    async fn none_scope_without_header_resolves_to_no_identity() {
        let codec = codec();
        let store = MemberDirectory::with(&[]);

        let resolved = authorize(Scope::None, &HeaderMap::new(), &codec, &store).await;
        assert!(matches!(resolved, Ok(None)));
    }

    #[tokio::test]
    async fn none_scope_with_bad_token_is_rejected() {
        let codec = codec();
        let store = MemberDirectory::with(&[]);
        let headers = headers_with("not-a-token");

        let resolved = authorize(Scope::None, &headers, &codec, &store).await;
        assert!(matches!(resolved, Err(GuardError::Unauthenticated)));
    }

    #[tokio::test]
    async fn missing_token_is_unauthenticated() {
        let codec = codec();
        let store = MemberDirectory::with(&[member("m-1", true, true)]);

        let resolved = require(Scope::Administrator, &HeaderMap::new(), &codec, &store).await;
        assert!(matches!(resolved, Err(GuardError::Unauthenticated)));
    }

    #[tokio::test]
    async fn admin_scope_rejects_plain_member() -> anyhow::Result<()> {
        let codec = codec();
        let store = MemberDirectory::with(&[member("m-1", false, true)]);
        let headers = headers_with(&codec.issue("m-1", false)?);

        let resolved = require(Scope::Administrator, &headers, &codec, &store).await;
        assert!(matches!(resolved, Err(GuardError::Forbidden)));
        Ok(())
    }

    #[tokio::test]
    async fn deactivated_member_is_unauthenticated() -> anyhow::Result<()> {
        let codec = codec();
        let store = MemberDirectory::with(&[member("m-1", false, false)]);
        let headers = headers_with(&codec.issue("m-1", false)?);

        let resolved = require(Scope::Authenticated, &headers, &codec, &store).await;
        assert!(matches!(resolved, Err(GuardError::Unauthenticated)));
        Ok(())
    }

    #[tokio::test]
    async fn unknown_subject_is_unauthenticated() -> anyhow::Result<()> {
        let codec = codec();
        let store = MemberDirectory::with(&[]);
        let headers = headers_with(&codec.issue("m-ghost", false)?);

        let resolved = require(Scope::Authenticated, &headers, &codec, &store).await;
        assert!(matches!(resolved, Err(GuardError::Unauthenticated)));
        Ok(())
    }

    #[tokio::test]
    async fn stale_privileged_token_does_not_grant_admin() -> anyhow::Result<()> {
        // Token minted while the member was an administrator; the live
        // record has since been demoted.
        let codec = codec();
        let store = MemberDirectory::with(&[member("m-1", false, true)]);
        let headers = headers_with(&codec.issue("m-1", true)?);

        let resolved = require(Scope::Administrator, &headers, &codec, &store).await;
        assert!(matches!(resolved, Err(GuardError::Forbidden)));
        Ok(())
    }

    #[tokio::test]
    async fn admin_scope_resolves_live_admin() -> anyhow::Result<()> {
        let codec = codec();
        let store = MemberDirectory::with(&[member("m-1", true, true)]);
        let headers = headers_with(&codec.issue("m-1", true)?);

        let identity = require(Scope::Administrator, &headers, &codec, &store).await?;
        assert_eq!(identity.subject_id, "m-1");
        assert!(identity.is_admin);
        Ok(())
    }

    #[test]
    fn bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi".to_string()));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer xyz"));
        assert_eq!(bearer_token(&headers), Some("xyz".to_string()));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }
}
