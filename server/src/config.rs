//! Command line and environment configuration.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use crate::mailer::{DEFAULT_MAIL_FROM, RESEND_API_URL};

#[derive(Parser, Debug, Clone)]
#[command(name = "studyboard", author, version, about)]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:3000")]
    pub listen: SocketAddr,

    /// SQLite database file
    #[arg(long = "database", env = "DATABASE_PATH")]
    pub database: Option<PathBuf>,

    /// Directory with the static pages and the wasm bundle
    #[arg(long, env = "PUBLIC_DIR")]
    pub public_dir: Option<PathBuf>,

    /// Admin login; admin access is disabled unless both are set
    #[arg(long, env = "ADMIN_USER")]
    pub admin_user: Option<String>,

    #[arg(long, env = "ADMIN_PASS", hide_env_values = true)]
    pub admin_pass: Option<String>,

    /// Resend API key; without it credential emails are only logged
    #[arg(long, env = "RESEND_API_KEY", hide_env_values = true)]
    pub resend_api_key: Option<String>,

    #[arg(long, env = "RESEND_API_URL", default_value = RESEND_API_URL)]
    pub resend_api_url: String,

    #[arg(long, env = "MAIL_FROM", default_value = DEFAULT_MAIL_FROM)]
    pub mail_from: String,

    /// Mark the session cookie `Secure` (serve over HTTPS)
    #[arg(long, env = "SECURE_COOKIES", default_value = "false")]
    pub secure_cookies: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    pub fn auth_config(&self) -> AuthConfig {
        let admin = match (&self.admin_user, &self.admin_pass) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                Some(AdminCredentials {
                    username: username.clone(),
                    password: password.clone(),
                })
            }
            _ => None,
        };
        AuthConfig {
            admin,
            secure_cookies: self.secure_cookies,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

#[derive(Clone, Debug, Default)]
pub struct AuthConfig {
    pub admin: Option<AdminCredentials>,
    pub secure_cookies: bool,
}

impl AuthConfig {
    pub fn is_admin(&self, username: &str, password: &str) -> bool {
        self.admin
            .as_ref()
            .is_some_and(|admin| admin.username == username && admin.password == password)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_requires_both_values() {
        let args = Args::parse_from(["studyboard", "--admin-user", "root"]);
        assert!(args.auth_config().admin.is_none());

        let args = Args::parse_from(["studyboard", "--admin-user", "root", "--admin-pass", "pw"]);
        let auth = args.auth_config();
        assert!(auth.is_admin("root", "pw"));
        assert!(!auth.is_admin("root", "nope"));
        assert_eq!(args.listen.port(), 3000);
    }
}
