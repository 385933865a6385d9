//! Map validated CLI matches to an action.

use crate::cli::actions::Action;
use anyhow::{Context, Result};
use secrecy::SecretString;

/// Map validated CLI matches to a server action.
///
/// # Errors
///
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let secret_key = matches
        .get_one::<String>("secret-key")
        .cloned()
        .map(SecretString::from)
        .context("missing required argument: --secret-key")?;

    Ok(Action::Server {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        dsn: matches
            .get_one::<String>("dsn")
            .cloned()
            .context("missing required argument: --dsn")?,
        secret_key,
        issuer: matches
            .get_one::<String>("issuer")
            .cloned()
            .unwrap_or_else(|| "agora".to_string()),
        frontend_base_url: matches
            .get_one::<String>("frontend-base-url")
            .cloned()
            .unwrap_or_else(|| "https://agora.dev".to_string()),
        files_dir: matches
            .get_one::<String>("files-dir")
            .cloned()
            .unwrap_or_else(|| "files".to_string()),
        fcm_server_key: matches
            .get_one::<String>("fcm-server-key")
            .cloned()
            .map(SecretString::from),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn server_action_from_args() {
        temp_env::with_vars([("AGORA_FCM_SERVER_KEY", None::<&str>)], || {
            let command = crate::cli::commands::new();
            let matches = command.get_matches_from(vec![
                "agora",
                "--dsn",
                "postgres://user@localhost:5432/agora",
                "--secret-key",
                "s3cret",
                "--issuer",
                "agora-test",
            ]);

            let action = handler(&matches).expect("server action");
            let Action::Server {
                port,
                dsn,
                secret_key,
                issuer,
                frontend_base_url,
                files_dir,
                fcm_server_key,
            } = action;

            assert_eq!(port, 8080);
            assert_eq!(dsn, "postgres://user@localhost:5432/agora");
            assert_eq!(secret_key.expose_secret(), "s3cret");
            assert_eq!(issuer, "agora-test");
            assert_eq!(frontend_base_url, "https://agora.dev");
            assert_eq!(files_dir, "files");
            assert!(fcm_server_key.is_none());
        });
    }

    #[test]
    fn fcm_key_is_optional_and_secret() {
        temp_env::with_vars([("AGORA_FCM_SERVER_KEY", Some("fcm-key"))], || {
            let command = crate::cli::commands::new();
            let matches = command.get_matches_from(vec![
                "agora",
                "--dsn",
                "postgres://user@localhost:5432/agora",
                "--secret-key",
                "s3cret",
            ]);

            let Action::Server { fcm_server_key, .. } = handler(&matches).expect("server action");
            assert_eq!(
                fcm_server_key.map(|key| key.expose_secret().to_string()),
                Some("fcm-key".to_string())
            );
        });
    }
}
