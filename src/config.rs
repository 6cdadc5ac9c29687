use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::cli::GlobalArgs;
use crate::fox::Credentials;

const DEFAULT_STATE_DIRECTORY: &str = "~/.foxwq-sgf-rs";
const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Contents of the TOML configuration file. Every key is optional here;
/// what a command actually needs is checked when it asks for it.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub srcuid: Option<StringOrNumber>,
    pub token: Option<String>,
    pub session: Option<String>,
    pub time_stamp: Option<StringOrNumber>,
    pub directory: Option<String>,
    pub state_directory: Option<String>,
    pub page_size: Option<u32>,
}

/// uids and timestamps are numbers in FoxWQ's own files but strings on the
/// wire; accept either.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StringOrNumber {
    String(String),
    Number(i64),
}

impl From<StringOrNumber> for String {
    fn from(value: StringOrNumber) -> Self {
        match value {
            StringOrNumber::String(s) => s,
            StringOrNumber::Number(n) => n.to_string(),
        }
    }
}

impl FileConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }
}

/// Settings after merging the config file with command-line flags.
/// Flags win.
pub struct Config {
    pub srcuid: Option<String>,
    pub token: Option<String>,
    pub session: Option<String>,
    pub time_stamp: Option<String>,
    pub directory: Option<PathBuf>,
    pub state_directory: PathBuf,
    pub page_size: Option<u32>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("srcuid", &self.srcuid)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("session", &self.session.as_ref().map(|_| "<redacted>"))
            .field("directory", &self.directory)
            .field("state_directory", &self.state_directory)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

pub(crate) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Config {
    /// Read the config file named by `--config`, or the default one under
    /// the state directory when it exists, and merge `global` over it.
    pub fn load(global: &GlobalArgs) -> anyhow::Result<Self> {
        let file = match &global.config {
            Some(path) => FileConfig::load(path)?,
            None => {
                let path = expand_tilde(DEFAULT_STATE_DIRECTORY).join(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    tracing::debug!("Using config file {}", path.display());
                    FileConfig::load(&path)?
                } else {
                    FileConfig::default()
                }
            }
        };
        Ok(Self::merge(global, file))
    }

    pub fn merge(global: &GlobalArgs, file: FileConfig) -> Self {
        let state_directory = global
            .state_directory
            .as_deref()
            .or(file.state_directory.as_deref())
            .unwrap_or(DEFAULT_STATE_DIRECTORY);

        Self {
            srcuid: global.srcuid.clone().or(file.srcuid.map(String::from)),
            token: global.token.clone().or(file.token),
            session: global.session.clone().or(file.session),
            time_stamp: file.time_stamp.map(String::from),
            directory: file.directory.as_deref().map(expand_tilde),
            state_directory: expand_tilde(state_directory),
            page_size: file.page_size,
        }
    }

    /// Account uid, the default sync target.
    pub fn srcuid(&self) -> anyhow::Result<&str> {
        match self.srcuid.as_deref() {
            Some(uid) if !uid.is_empty() => Ok(uid),
            _ => anyhow::bail!("Missing required setting: srcuid (config file or --srcuid)"),
        }
    }

    /// Everything needed to talk to FoxWQ. Fails naming every missing key so
    /// nothing is sent with a partial identity.
    pub fn credentials(&self) -> anyhow::Result<Credentials> {
        let missing: Vec<&str> = [
            ("srcuid", &self.srcuid),
            ("token", &self.token),
            ("session", &self.session),
        ]
        .into_iter()
        .filter(|(_, value)| value.as_deref().map_or(true, str::is_empty))
        .map(|(key, _)| key)
        .collect();
        if !missing.is_empty() {
            anyhow::bail!(
                "Missing required setting(s): {} (config file, flags, or FOXWQ_TOKEN/FOXWQ_SESSION)",
                missing.join(", ")
            );
        }

        Ok(Credentials {
            srcuid: self.srcuid.clone().unwrap_or_default(),
            token: self.token.clone().unwrap_or_default(),
            session: self.session.clone().unwrap_or_default(),
            time_stamp: self
                .time_stamp
                .clone()
                .unwrap_or_else(|| chrono::Utc::now().timestamp_millis().to_string()),
        })
    }

    /// Save directory: the flag if given, otherwise the config file's.
    pub fn directory(&self, flag: Option<&str>) -> anyhow::Result<PathBuf> {
        flag.map(expand_tilde)
            .or_else(|| self.directory.clone())
            .context("--directory is required (or set `directory` in the config file)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn globals() -> GlobalArgs {
        GlobalArgs {
            config: None,
            log_level: crate::types::LogLevel::Info,
            log_file: None,
            srcuid: None,
            token: None,
            session: None,
            state_directory: None,
        }
    }

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join("foxwq_sgf_rs")
            .join("config_tests")
            .join(name);
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_expand_tilde_with_home() {
        let result = expand_tilde("~/Documents");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(result, home.join("Documents"));
        }
    }

    #[test]
    fn test_expand_tilde_no_prefix() {
        assert_eq!(expand_tilde("/absolute/path"), PathBuf::from("/absolute/path"));
        assert_eq!(expand_tilde("relative/path"), PathBuf::from("relative/path"));
    }

    #[test]
    fn test_load_file_with_numeric_uid() {
        let dir = test_dir("numeric_uid");
        let path = dir.join("config.toml");
        std::fs::write(
            &path,
            "srcuid = 12345\ntoken = \"tok\"\nsession = \"sess\"\ntime_stamp = 1700000000000\n\
             directory = \"/data/sgf\"\npage_size = 50\n",
        )
        .unwrap();

        let file = FileConfig::load(&path).unwrap();
        let config = Config::merge(&globals(), file);
        assert_eq!(config.srcuid.as_deref(), Some("12345"));
        assert_eq!(config.time_stamp.as_deref(), Some("1700000000000"));
        assert_eq!(config.directory, Some(PathBuf::from("/data/sgf")));
        assert_eq!(config.page_size, Some(50));

        let creds = config.credentials().unwrap();
        assert_eq!(creds.token, "tok");
        assert_eq!(creds.time_stamp, "1700000000000");
    }

    #[test]
    fn test_unknown_key_rejected() {
        let dir = test_dir("unknown_key");
        let path = dir.join("config.toml");
        std::fs::write(&path, "srcuid = \"1\"\npasword = \"typo\"\n").unwrap();
        assert!(FileConfig::load(&path).is_err());
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = test_dir("missing_file");
        assert!(FileConfig::load(&dir.join("nope.toml")).is_err());
    }

    #[test]
    fn test_flags_override_file() {
        let file = FileConfig {
            srcuid: Some(StringOrNumber::String("file-uid".into())),
            token: Some("file-token".into()),
            ..Default::default()
        };
        let mut global = globals();
        global.srcuid = Some("flag-uid".into());
        global.state_directory = Some("/var/lib/fox".into());

        let config = Config::merge(&global, file);
        assert_eq!(config.srcuid.as_deref(), Some("flag-uid"));
        assert_eq!(config.token.as_deref(), Some("file-token"));
        assert_eq!(config.state_directory, PathBuf::from("/var/lib/fox"));
    }

    #[test]
    fn test_credentials_report_every_missing_key() {
        let mut global = globals();
        global.srcuid = Some("1".into());
        let config = Config::merge(&global, FileConfig::default());

        let err = config.credentials().unwrap_err().to_string();
        assert!(err.contains("token"));
        assert!(err.contains("session"));
        assert!(!err.contains("srcuid"));
    }

    #[test]
    fn test_time_stamp_defaults_to_now() {
        let mut global = globals();
        global.srcuid = Some("1".into());
        global.token = Some("t".into());
        global.session = Some("s".into());
        let creds = Config::merge(&global, FileConfig::default())
            .credentials()
            .unwrap();
        assert!(creds.time_stamp.parse::<i64>().unwrap() > 1_600_000_000_000);
    }

    #[test]
    fn test_directory_flag_wins() {
        let file = FileConfig {
            directory: Some("/from/file".into()),
            ..Default::default()
        };
        let config = Config::merge(&globals(), file);
        assert_eq!(
            config.directory(Some("/from/flag")).unwrap(),
            PathBuf::from("/from/flag")
        );
        assert_eq!(config.directory(None).unwrap(), PathBuf::from("/from/file"));

        let bare = Config::merge(&globals(), FileConfig::default());
        assert!(bare.directory(None).is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut global = globals();
        global.token = Some("super-secret".into());
        let config = Config::merge(&global, FileConfig::default());
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
    }
}
