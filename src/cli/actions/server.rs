use crate::api::{self, notify, AppConfig, AppState};
use crate::auth::token::TokenCodec;
use crate::blob::FsBlobStore;
use crate::cli::actions::Action;
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

/// Handle the server action.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn handle(action: Action) -> Result<()> {
    match action {
        Action::Server {
            port,
            dsn,
            secret_key,
            issuer,
            frontend_base_url,
            files_dir,
            fcm_server_key,
        } => {
            // The signing secret is injected here, once; nothing else in
            // the process can reach it.
            let codec = TokenCodec::new(secret_key, issuer);
            let config = AppConfig::new(frontend_base_url);

            let email: Arc<dyn notify::EmailSender> = Arc::new(notify::LogEmailSender);
            let push: Arc<dyn notify::PushSender> = match fcm_server_key {
                Some(key) => Arc::new(notify::FcmPushSender::new(key)),
                None => Arc::new(notify::LogPushSender),
            };
            let blobs = Arc::new(FsBlobStore::new(PathBuf::from(files_dir)));

            let state = AppState::new(codec, config, email, push, blobs);
            api::new(port, dsn, state).await?;
        }
    }

    Ok(())
}
