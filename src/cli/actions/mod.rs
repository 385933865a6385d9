use secrecy::SecretString;

pub mod server;

/// Actions the CLI can dispatch to.
#[derive(Debug)]
pub enum Action {
    Server {
        port: u16,
        dsn: String,
        secret_key: SecretString,
        issuer: String,
        frontend_base_url: String,
        files_dir: String,
        fcm_server_key: Option<SecretString>,
    },
}
