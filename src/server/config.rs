use std::net::IpAddr;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use thiserror::Error;

use crate::StoreBackend;

use super::crypto::{CipherError, ContentCipher};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid SECRET_KEY: {0}")]
    SecretKey(#[from] CipherError),
    #[error("sweep interval must be at least one second")]
    SweepInterval,
    #[error("body limit must be greater than zero")]
    BodyLimit,
    #[error("CORS origin must not be empty")]
    CorsOrigin,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum StoreKind {
    #[default]
    Sqlite,
    Memory,
}

/// Run the pastebin HTTP server.
#[derive(Parser, Debug)]
#[command(author, version = env!("PASTEBIN_VERSION"), about)]
pub struct ServerArgs {
    /// Address to bind.
    #[arg(long, env = "PASTEBIN_ADDRESS", default_value = "0.0.0.0")]
    pub address: IpAddr,

    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Storage backend.
    #[arg(long, env = "PASTEBIN_STORE", value_enum, default_value_t = StoreKind::Sqlite)]
    pub store: StoreKind,

    /// SQLite database file (sqlite store only).
    #[arg(long, env = "DATABASE_PATH", default_value = "data/pastes.db")]
    pub database_path: String,

    /// Secret key for encryption at rest: 16, 24 or 32 bytes. Omit to store plaintext.
    #[arg(long, env = "SECRET_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,

    /// Seconds between background sweeps of expired pastes.
    #[arg(long, env = "PASTEBIN_SWEEP_INTERVAL_SECS", default_value_t = 60)]
    pub sweep_interval_secs: u64,

    /// Maximum accepted request body size in bytes.
    #[arg(long, env = "PASTEBIN_BODY_LIMIT_BYTES", default_value_t = 1024 * 1024)]
    pub body_limit_bytes: u64,

    /// Value of Access-Control-Allow-Origin sent to browsers.
    #[arg(long, env = "PASTEBIN_CORS_ORIGIN", default_value = "*")]
    pub cors_origin: String,
}

/// Validated process configuration, resolved once before serving.
#[derive(Debug)]
pub struct ServerConfig {
    pub address: IpAddr,
    pub port: u16,
    pub backend: StoreBackend,
    pub cipher: Option<ContentCipher>,
    pub sweep_interval: Duration,
    pub body_limit_bytes: u64,
    pub cors_origin: String,
}

impl TryFrom<ServerArgs> for ServerConfig {
    type Error = ConfigError;

    fn try_from(args: ServerArgs) -> Result<Self, Self::Error> {
        let cipher = match args.secret_key.filter(|key| !key.is_empty()) {
            Some(key) => {
                let cipher = ContentCipher::new(key.into_bytes());
                cipher.validate()?;
                Some(cipher)
            }
            None => None,
        };

        if args.sweep_interval_secs == 0 {
            return Err(ConfigError::SweepInterval);
        }
        if args.body_limit_bytes == 0 {
            return Err(ConfigError::BodyLimit);
        }
        let cors_origin = args.cors_origin.trim().to_owned();
        if cors_origin.is_empty() {
            return Err(ConfigError::CorsOrigin);
        }

        let backend = match args.store {
            StoreKind::Sqlite => StoreBackend::Sqlite {
                path: args.database_path,
            },
            StoreKind::Memory => StoreBackend::Memory,
        };

        Ok(Self {
            address: args.address,
            port: args.port,
            backend,
            cipher,
            sweep_interval: Duration::from_secs(args.sweep_interval_secs),
            body_limit_bytes: args.body_limit_bytes,
            cors_origin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> ServerArgs {
        let mut argv = vec!["pastebin", "--address", "127.0.0.1", "--port", "9000"];
        argv.extend_from_slice(extra);
        ServerArgs::parse_from(argv)
    }

    #[test]
    fn resolves_sqlite_backend_with_valid_key() {
        let config = ServerConfig::try_from(parse(&[
            "--database-path",
            "/tmp/p.db",
            "--secret-key",
            "0123456789abcdef",
        ]))
        .unwrap();
        assert_eq!(
            config.backend,
            StoreBackend::Sqlite {
                path: "/tmp/p.db".into()
            }
        );
        assert_eq!(config.cipher.map(|c| c.key_len()), Some(16));
        assert_eq!(config.port, 9000);
        assert_eq!(config.cors_origin, "*");
    }

    #[test]
    fn rejects_blank_cors_origin() {
        let err = ServerConfig::try_from(parse(&["--cors-origin", "  "])).unwrap_err();
        assert!(matches!(err, ConfigError::CorsOrigin));
    }

    #[test]
    fn rejects_bad_key_length() {
        let err = ServerConfig::try_from(parse(&["--secret-key", "short"])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::SecretKey(CipherError::InvalidKey(5))
        ));
    }

    #[test]
    fn empty_key_disables_encryption() {
        let config =
            ServerConfig::try_from(parse(&["--store", "memory", "--secret-key", ""])).unwrap();
        assert!(config.cipher.is_none());
        assert_eq!(config.backend, StoreBackend::Memory);
    }

    #[test]
    fn rejects_zero_sweep_interval() {
        let err = ServerConfig::try_from(parse(&["--sweep-interval-secs", "0"])).unwrap_err();
        assert!(matches!(err, ConfigError::SweepInterval));
    }
}
