use std::path::PathBuf;

use config::{Config, ConfigError, Environment};
use secrecy::SecretString;
use serde::Deserialize;

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

fn default_port() -> u16 {
    3000
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("public")
}

/// Settings read from the environment (and `.env`).
#[derive(Debug, Deserialize)]
pub struct Settings {
    /// `sqlite:` URL or `http(s)://` base URL of the JSON API
    pub db_uri: Option<String>,
    /// Extra root certificate (PEM) for the remote source
    pub db_cert_path: Option<PathBuf>,
    pub session_secret: Option<SecretString>,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_environment(Environment::default())
    }

    fn from_environment(environment: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(environment.try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// Address to bind, as accepted by `TcpListener::bind`.
    pub fn bind_addr(&self) -> (&str, u16) {
        (self.host.as_str(), self.port)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn settings(vars: &[(&str, &str)]) -> Settings {
        let source: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_environment(Environment::default().source(Some(source))).unwrap()
    }

    #[test]
    fn defaults_apply() {
        let settings = settings(&[("DB_URI", "sqlite:math.db")]);
        assert_eq!(settings.db_uri.as_deref(), Some("sqlite:math.db"));
        assert_eq!(settings.bind_addr(), ("0.0.0.0", 3000));
        assert_eq!(settings.static_dir, PathBuf::from("public"));
        assert!(settings.session_secret.is_none());
    }

    #[test]
    fn reads_all_variables() {
        let settings = settings(&[
            ("DB_URI", "https://example.org/json"),
            ("DB_CERT_PATH", "/etc/ca.pem"),
            ("SESSION_SECRET", "12345"),
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("STATIC_DIR", "assets"),
        ]);
        assert_eq!(settings.db_cert_path, Some(PathBuf::from("/etc/ca.pem")));
        assert_eq!(
            settings.session_secret.as_ref().map(|s| s.expose_secret().to_owned()),
            Some("12345".to_owned())
        );
        assert_eq!(settings.bind_addr(), ("127.0.0.1", 8080));
        assert_eq!(settings.static_dir, PathBuf::from("assets"));
    }

    #[test]
    fn missing_uri_is_none() {
        assert!(settings(&[]).db_uri.is_none());
    }
}
