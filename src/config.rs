use std::env;

pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_PORT: &str = "1234";
pub const DEFAULT_CLIENT_IP: &str = "127.0.0.1";
pub const CREDENTIALS_FILE: &str = "credentials.txt";

pub const GREETING: &str = "Welcome to MyFTP Server!\n";
pub const PROMPT: &str = "server> ";
pub const MAX_LOGIN_ATTEMPTS: usize = 3;

/// Upper bound on one protocol line, newline included.
pub const LINE_MAX: usize = 4096;

/// Server settings: compiled-in defaults overridable from the environment.
/// There is no config file; the credential file is the only on-disk input.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    pub port: String,
    pub credentials: String,
    pub greeting: String,
    pub max_login_attempts: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT.to_string(),
            credentials: CREDENTIALS_FILE.to_string(),
            greeting: GREETING.to_string(),
            max_login_attempts: MAX_LOGIN_ATTEMPTS,
        }
    }
}

impl ServerConfig {
    /// Defaults with `MYFTP_BIND`, `MYFTP_PORT` and `MYFTP_CREDENTIALS`
    /// applied on top when present.
    pub fn from_env() -> ServerConfig {
        let mut cfg = ServerConfig::default();
        if let Ok(v) = env::var("MYFTP_BIND") {
            cfg.bind = v;
        }
        if let Ok(v) = env::var("MYFTP_PORT") {
            cfg.port = v;
        }
        if let Ok(v) = env::var("MYFTP_CREDENTIALS") {
            cfg.credentials = v;
        }
        cfg
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.addr(), "0.0.0.0:1234");
        assert_eq!(cfg.credentials, "credentials.txt");
        assert_eq!(cfg.max_login_attempts, 3);
        assert!(cfg.greeting.ends_with('\n'));
    }

    #[test]
    fn test_env_override() {
        env::set_var("MYFTP_PORT", "4321");
        let cfg = ServerConfig::from_env();
        env::remove_var("MYFTP_PORT");
        assert_eq!(cfg.port, "4321");
        assert_eq!(cfg.bind, DEFAULT_BIND);
    }
}
