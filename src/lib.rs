//! # Agora (Community Platform API)
//!
//! `agora` is the backend of a community platform: members, boards,
//! posts, comments, and push subscriptions over a plain HTTP/JSON
//! surface.
//!
//! ## Access Control
//!
//! Login verifies an Argon2id credential and mints a signed, seven-day
//! access token. Tokens are stateless: the privilege flag they carry is a
//! snapshot at issuance, and every scoped call re-fetches the live member
//! record before granting access, so demotion or deactivation takes
//! effect on the very next request. Rotating the signing secret is the
//! only way to invalidate outstanding tokens early.
//!
//! ## Pagination
//!
//! Board post listings use keyset pagination over the monotonically
//! increasing post id: exclusive `before`/`after` bounds, windows always
//! returned newest-first, plus best-effort `has_previous`/`has_next`
//! flags computed against the extremes of the returned window. This
//! stays stable under concurrent inserts at either end of the set, which
//! offset-based pagination does not.
//!
//! ## Collaborators
//!
//! Entity persistence is Postgres via `sqlx`; uploaded files live in a
//! pluggable blob store; outbound email and device push go through
//! sender traits with logging implementations for local dev.

pub mod api;
pub mod auth;
pub mod blob;
pub mod cli;
pub mod page;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(GIT_COMMIT_HASH.len() >= 7);
        assert!(GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_app_user_agent() {
        assert!(APP_USER_AGENT.starts_with("agora/"));
    }
}
