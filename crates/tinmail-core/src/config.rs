//! Configuration loading.
//!
//! The configuration is a TOML file read from:
//! 1. `$TINMAIL_CONFIG`
//! 2. `<config dir>/tinmail/config.toml` (`~/.config` on Linux)
//!
//! ```toml
//! download_folder = "~/Downloads"
//! inbox_view = "unseen"
//! auto_refresh = 30
//!
//! [[accounts]]
//! email = "me@example.com"
//!
//! [accounts.imap]
//! host = "imap.example.com"
//! password = "secret"
//!
//! [accounts.smtp]
//! host = "smtp.example.com"
//! password = "secret"
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use crate::error::{Error, Result};
use crate::model::MailboxFilter;

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV: &str = "TINMAIL_CONFIG";

const DEFAULT_IMAP_PORT: u16 = 993;
const DEFAULT_SMTP_PORT: u16 = 465;
const AUTO_REFRESH_ENABLED_SECS: u64 = 10;

/// Server connection settings.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Login name; defaults to the account email.
    pub user: String,
    /// Password.
    pub password: String,
    /// Host name.
    pub host: String,
    /// Port; 0 means the protocol default.
    pub port: u16,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

/// One mail account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Account {
    /// Address used as the sender.
    pub email: String,
    /// Incoming mail server.
    pub imap: ServerConfig,
    /// Outgoing mail server.
    pub smtp: ServerConfig,
}

/// `auto_refresh` accepts a flag or a number of seconds.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AutoRefresh {
    Flag(bool),
    Seconds(i64),
}

impl AutoRefresh {
    fn seconds(&self) -> u64 {
        match *self {
            Self::Flag(true) => AUTO_REFRESH_ENABLED_SECS,
            Self::Flag(false) => 0,
            Self::Seconds(n) => u64::try_from(n).unwrap_or(0),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    accounts: Vec<Account>,
    download_folder: Option<String>,
    inbox_view: Option<String>,
    editor: Option<String>,
    auto_refresh: Option<AutoRefresh>,
}

/// Validated configuration with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Configured accounts; never empty.
    pub accounts: Vec<Account>,
    /// Where downloaded attachments are copied.
    pub download_folder: PathBuf,
    /// Default listing filter.
    pub inbox_view: MailboxFilter,
    /// Preferred editor command, if any.
    pub editor: Option<String>,
    /// Refresh interval in seconds; 0 disables refreshing.
    pub auto_refresh: u64,
}

impl Config {
    /// Loads the configuration from `path`, or from the default location.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read, parsed or
    /// validated.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => config_file_path()
                .ok_or_else(|| Error::Config("unable to determine config directory".into()))?,
        };
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("unable to find home directory".into()))?;

        let contents = std::fs::read_to_string(&path).map_err(|e| {
            Error::Config(format!(
                "unable to read config file at {}: {e}",
                path.display()
            ))
        })?;
        let config = Self::from_toml_str(&contents, &home)?;
        info!(
            path = %path.display(),
            accounts = config.accounts.len(),
            "loaded config"
        );
        Ok(config)
    }

    /// Parses and validates a configuration document.
    ///
    /// `home` is used for the default download folder and `~` expansion.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on a parse error, when no account is
    /// configured, when an account lacks its email or a host, or when
    /// `inbox_view` is not a known filter.
    pub fn from_toml_str(contents: &str, home: &Path) -> Result<Self> {
        let raw: RawConfig = toml::from_str(contents)
            .map_err(|e| Error::Config(format!("unable to parse config file: {e}")))?;

        if raw.accounts.is_empty() {
            return Err(Error::Config("no accounts configured".into()));
        }

        let mut accounts = raw.accounts;
        for (index, account) in accounts.iter_mut().enumerate() {
            fill_account(index, account)?;
        }

        let download_folder = match raw.download_folder.as_deref() {
            None | Some("") => home.join("Downloads"),
            Some(folder) => expand_path(folder, home),
        };

        let inbox_view = match raw.inbox_view.as_deref() {
            None | Some("") => MailboxFilter::default(),
            Some(view) => view
                .parse::<MailboxFilter>()
                .map_err(|e| Error::Config(e.to_string()))?,
        };

        Ok(Self {
            accounts,
            download_folder,
            inbox_view,
            editor: raw.editor.filter(|e| !e.is_empty()),
            auto_refresh: raw.auto_refresh.as_ref().map_or(0, AutoRefresh::seconds),
        })
    }

    /// Picks an account by index or email; the first one when `selector`
    /// is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if nothing matches.
    pub fn account(&self, selector: Option<&str>) -> Result<&Account> {
        let found = match selector {
            None => self.accounts.first(),
            Some(s) => match s.parse::<usize>() {
                Ok(index) => self.accounts.get(index),
                Err(_) => self
                    .accounts
                    .iter()
                    .find(|a| a.email.eq_ignore_ascii_case(s)),
            },
        };
        found.ok_or_else(|| {
            Error::Config(format!(
                "no account matches '{}'",
                selector.unwrap_or_default()
            ))
        })
    }
}

fn fill_account(index: usize, account: &mut Account) -> Result<()> {
    if account.email.is_empty() {
        return Err(Error::Config(format!(
            "account at index {index} is missing email"
        )));
    }
    if account.imap.host.is_empty() {
        return Err(Error::Config(format!(
            "account {} is missing IMAP host",
            account.email
        )));
    }
    if account.smtp.host.is_empty() {
        return Err(Error::Config(format!(
            "account {} is missing SMTP host",
            account.email
        )));
    }

    if account.imap.port == 0 {
        account.imap.port = DEFAULT_IMAP_PORT;
    }
    if account.smtp.port == 0 {
        account.smtp.port = DEFAULT_SMTP_PORT;
    }
    if account.imap.user.is_empty() {
        account.imap.user.clone_from(&account.email);
    }
    if account.smtp.user.is_empty() {
        account.smtp.user.clone_from(&account.email);
    }
    Ok(())
}

/// Expands a leading `~` to `home`. Other paths are returned unchanged.
#[must_use]
pub fn expand_path(path: &str, home: &Path) -> PathBuf {
    if path == "~" {
        return home.to_path_buf();
    }
    if let Some(rest) = path.strip_prefix('~')
        && let Some(rest) = rest
            .strip_prefix('/')
            .or_else(|| rest.strip_prefix(std::path::MAIN_SEPARATOR))
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}

/// Default config file location, honoring `$TINMAIL_CONFIG`.
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|d| d.join("tinmail").join("config.toml"))
}

/// Root for data written by the client.
///
/// # Errors
///
/// Returns [`Error::Config`] if the platform has no data directory.
pub fn data_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|d| d.join("tinmail"))
        .ok_or_else(|| Error::Config("unable to determine data directory".into()))
}

/// Directory holding extracted attachments.
///
/// # Errors
///
/// See [`data_dir`].
pub fn attachments_dir() -> Result<PathBuf> {
    Ok(data_dir()?.join("attachments"))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[[accounts]]
email = "me@example.com"

[accounts.imap]
host = "imap.example.com"
password = "secret"

[accounts.smtp]
host = "smtp.example.com"
password = "secret"
"#;

    fn home() -> PathBuf {
        PathBuf::from("/home/me")
    }

    fn config_error(contents: &str) -> String {
        match Config::from_toml_str(contents, &home()) {
            Err(Error::Config(msg)) => msg,
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_toml_str(MINIMAL, &home()).unwrap();
        let account = &config.accounts[0];
        assert_eq!(account.imap.port, 993);
        assert_eq!(account.smtp.port, 465);
        assert_eq!(account.imap.user, "me@example.com");
        assert_eq!(account.smtp.user, "me@example.com");
        assert_eq!(config.download_folder, PathBuf::from("/home/me/Downloads"));
        assert_eq!(config.inbox_view, MailboxFilter::All);
        assert_eq!(config.editor, None);
        assert_eq!(config.auto_refresh, 0);
    }

    #[test]
    fn test_explicit_values() {
        let contents = format!(
            "download_folder = \"~/mail\"\ninbox_view = \"unseen\"\neditor = \"vim\"\nauto_refresh = 30\n{MINIMAL}"
        );
        let config = Config::from_toml_str(&contents, &home()).unwrap();
        assert_eq!(config.download_folder, PathBuf::from("/home/me/mail"));
        assert_eq!(config.inbox_view, MailboxFilter::Unseen);
        assert_eq!(config.editor.as_deref(), Some("vim"));
        assert_eq!(config.auto_refresh, 30);
    }

    #[test]
    fn test_auto_refresh_forms() {
        for (value, expected) in [("true", 10), ("false", 0), ("-5", 0), ("7", 7)] {
            let contents = format!("auto_refresh = {value}\n{MINIMAL}");
            let config = Config::from_toml_str(&contents, &home()).unwrap();
            assert_eq!(config.auto_refresh, expected, "auto_refresh = {value}");
        }
    }

    #[test]
    fn test_no_accounts() {
        assert_eq!(config_error("inbox_view = \"all\"\n"), "no accounts configured");
    }

    #[test]
    fn test_missing_fields() {
        let msg = config_error("[[accounts]]\n[accounts.imap]\nhost = \"h\"\n");
        assert_eq!(msg, "account at index 0 is missing email");

        let msg = config_error(
            "[[accounts]]\nemail = \"me@example.com\"\n[accounts.smtp]\nhost = \"h\"\n",
        );
        assert_eq!(msg, "account me@example.com is missing IMAP host");

        let msg = config_error(
            "[[accounts]]\nemail = \"me@example.com\"\n[accounts.imap]\nhost = \"h\"\n",
        );
        assert_eq!(msg, "account me@example.com is missing SMTP host");
    }

    #[test]
    fn test_invalid_inbox_view() {
        let msg = config_error(&format!("inbox_view = \"starred\"\n{MINIMAL}"));
        assert!(msg.contains("starred"));
    }

    #[test]
    fn test_parse_error() {
        assert!(config_error("accounts = 3").starts_with("unable to parse config file"));
    }

    #[test]
    fn test_expand_path() {
        let home = home();
        assert_eq!(expand_path("~", &home), home);
        assert_eq!(expand_path("~/x/y", &home), PathBuf::from("/home/me/x/y"));
        assert_eq!(expand_path("/tmp/dl", &home), PathBuf::from("/tmp/dl"));
        assert_eq!(expand_path("rel", &home), PathBuf::from("rel"));
    }

    #[test]
    fn test_account_selection() {
        let contents = format!(
            "{MINIMAL}\n[[accounts]]\nemail = \"work@example.com\"\n[accounts.imap]\nhost = \"i\"\n[accounts.smtp]\nhost = \"s\"\n"
        );
        let config = Config::from_toml_str(&contents, &home()).unwrap();
        assert_eq!(config.account(None).unwrap().email, "me@example.com");
        assert_eq!(config.account(Some("1")).unwrap().email, "work@example.com");
        assert_eq!(
            config.account(Some("WORK@example.com")).unwrap().email,
            "work@example.com"
        );
        assert!(config.account(Some("5")).is_err());
        assert!(config.account(Some("nobody@example.com")).is_err());
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = Config::from_toml_str(MINIMAL, &home()).unwrap();
        let debug = format!("{:?}", config.accounts[0]);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, MINIMAL).unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.accounts.len(), 1);

        let missing = Config::load(Some(&dir.path().join("nope.toml")));
        assert!(matches!(missing, Err(Error::Config(_))));
    }
}
