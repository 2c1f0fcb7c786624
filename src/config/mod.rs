use crate::error::{Result, RunbookError};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const DOMAIN_NAME: &str = "DomainName";
pub const DOMAIN_CONTROLLER: &str = "DomainController";
pub const SYNC_SERVER_NAME: &str = "SyncServerName";
pub const DOMAIN_CREDENTIALS: &str = "DomainCredentials";
pub const POWERSHELL_PATH: &str = "PowerShellPath";

/// Prefix for configuration read from the process environment
pub const ENV_PREFIX: &str = "ADRUNBOOK_";

/// Identity and secret pair stored under a credential name
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Key-value store the runbooks resolve their environment from
pub trait ConfigSource {
    /// Fetch a named variable; missing or empty values are configuration errors
    fn get(&self, name: &str) -> Result<String>;

    /// Fetch a named credential; both halves must be present
    fn get_credential(&self, name: &str) -> Result<Credential>;
}

/// Resolved domain, controller and credential for one invocation
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub domain_name: String,
    pub domain_controller: String,
    pub credential: Credential,
}

impl ExecutionContext {
    pub fn resolve(source: &dyn ConfigSource) -> Result<Self> {
        Ok(Self {
            domain_name: source.get(DOMAIN_NAME)?,
            domain_controller: source.get(DOMAIN_CONTROLLER)?,
            credential: source.get_credential(DOMAIN_CREDENTIALS)?,
        })
    }

    /// Principal name a user is looked up by
    pub fn principal_name(&self, username: &str) -> String {
        format!("{}@{}", username, self.domain_name)
    }
}

/// Resolved sync server and credential for the delta sync command
#[derive(Debug, Clone)]
pub struct SyncContext {
    pub server_name: String,
    pub credential: Credential,
    pub powershell_path: Option<String>,
}

impl SyncContext {
    pub fn resolve(source: &dyn ConfigSource) -> Result<Self> {
        Ok(Self {
            server_name: source.get(SYNC_SERVER_NAME)?,
            credential: source.get_credential(DOMAIN_CREDENTIALS)?,
            powershell_path: source.get(POWERSHELL_PATH).ok(),
        })
    }
}

/// Variables and credentials merged from every configuration layer
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AutomationStore {
    #[serde(default)]
    pub variables: BTreeMap<String, String>,

    #[serde(default)]
    pub credentials: BTreeMap<String, Credential>,
}

impl AutomationStore {
    /// Overlay `KEY=VALUE` pairs whose keys are the UPPER_SNAKE form of a
    /// variable name (`DOMAIN_NAME`) or of a credential name followed by
    /// `_USERNAME` / `_PASSWORD`. Pairs without `prefix` are ignored.
    pub fn overlay<I>(&mut self, pairs: I, prefix: &str)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let pairs: HashMap<String, String> = pairs
            .into_iter()
            .filter_map(|(k, v)| k.strip_prefix(prefix).map(|k| (k.to_string(), v)))
            .collect();

        for name in [DOMAIN_NAME, DOMAIN_CONTROLLER, SYNC_SERVER_NAME, POWERSHELL_PATH] {
            if let Some(value) = pairs.get(&to_env_key(name)) {
                self.variables.insert(name.to_string(), value.clone());
            }
        }

        let mut credential_names: Vec<String> = self.credentials.keys().cloned().collect();
        if !credential_names.iter().any(|n| n == DOMAIN_CREDENTIALS) {
            credential_names.push(DOMAIN_CREDENTIALS.to_string());
        }

        for name in credential_names {
            let key = to_env_key(&name);
            let username = pairs.get(&format!("{}_USERNAME", key));
            let password = pairs.get(&format!("{}_PASSWORD", key));
            if username.is_none() && password.is_none() {
                continue;
            }

            let entry = self.credentials.entry(name).or_insert_with(|| Credential {
                username: String::new(),
                password: String::new(),
            });
            if let Some(username) = username {
                entry.username = username.clone();
            }
            if let Some(password) = password {
                entry.password = password.clone();
            }
        }
    }
}

impl ConfigSource for AutomationStore {
    fn get(&self, name: &str) -> Result<String> {
        match self.variables.get(name).map(|v| v.trim()) {
            Some(value) if !value.is_empty() => Ok(value.to_string()),
            _ => Err(RunbookError::Configuration(format!(
                "Variable '{}' is not set",
                name
            ))),
        }
    }

    fn get_credential(&self, name: &str) -> Result<Credential> {
        let credential = self.credentials.get(name).ok_or_else(|| {
            RunbookError::Configuration(format!("Credential '{}' is not set", name))
        })?;

        if credential.username.trim().is_empty() || credential.password.is_empty() {
            return Err(RunbookError::Configuration(format!(
                "Credential '{}' is missing its username or password",
                name
            )));
        }

        Ok(credential.clone())
    }
}

/// `DomainCredentials` -> `DOMAIN_CREDENTIALS`
pub fn to_env_key(name: &str) -> String {
    let mut key = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_ascii_uppercase() && i > 0 {
            key.push('_');
        }
        key.push(ch.to_ascii_uppercase());
    }
    key
}

/// Configuration manager
#[derive(Clone)]
pub struct ConfigManager {
    config_dir: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self> {
        let project_dirs = ProjectDirs::from("com", "adrunbook", "adrunbook").ok_or_else(|| {
            RunbookError::Configuration("Failed to determine config directory".into())
        })?;

        Ok(Self {
            config_dir: project_dirs.config_dir().to_path_buf(),
        })
    }

    /// Use an explicit directory, falling back to the platform default
    pub fn with_dir(dir: Option<PathBuf>) -> Result<Self> {
        match dir {
            Some(config_dir) => Ok(Self { config_dir }),
            None => Self::new(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn store_file(&self) -> PathBuf {
        self.config_dir.join("automation.toml")
    }

    pub fn env_file(&self) -> PathBuf {
        self.config_dir.join(".env")
    }

    /// Load only what is persisted in automation.toml
    pub fn load_file_store(&self) -> Result<AutomationStore> {
        let path = self.store_file();

        if !path.exists() {
            return Ok(AutomationStore::default());
        }

        let contents = fs::read_to_string(path)?;
        let store: AutomationStore = toml::from_str(&contents)?;
        Ok(store)
    }

    /// Save automation.toml, creating the directory on first write
    pub fn save_file_store(&self, store: &AutomationStore) -> Result<()> {
        if !self.config_dir.exists() {
            fs::create_dir_all(&self.config_dir)?;
        }

        let contents = toml::to_string_pretty(store)?;
        fs::write(self.store_file(), contents)?;
        Ok(())
    }

    /// Merge automation.toml, the .env file and the process environment
    pub fn load_store(&self) -> Result<AutomationStore> {
        let mut store = self.load_file_store()?;

        let env_path = self.env_file();
        if env_path.exists() {
            let contents = fs::read_to_string(&env_path)?;
            store.overlay(Self::parse_env_file(&contents), "");
        }

        store.overlay(process_env(), ENV_PREFIX);

        tracing::debug!(
            variables = store.variables.len(),
            credentials = store.credentials.len(),
            dir = %self.config_dir.display(),
            "Loaded automation configuration"
        );

        Ok(store)
    }

    /// Parse simple .env file format
    fn parse_env_file(contents: &str) -> Vec<(String, String)> {
        let mut vars = Vec::new();

        for line in contents.lines() {
            let line = line.trim();

            // Skip comments and empty lines
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let line = line.strip_prefix("export ").unwrap_or(line);

            if let Some(pos) = line.find('=') {
                let key = line[..pos].trim().to_uppercase();
                let value = line[pos + 1..].trim();

                let value = if value.len() >= 2
                    && ((value.starts_with('"') && value.ends_with('"'))
                        || (value.starts_with('\'') && value.ends_with('\'')))
                {
                    value[1..value.len() - 1].to_string()
                } else {
                    value.to_string()
                };

                vars.push((key, value));
            }
        }

        vars
    }
}

/// Process environment, skipping entries that are not valid UTF-8
fn process_env() -> impl Iterator<Item = (String, String)> {
    std::env::vars_os()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
}

/// Loads the merged store on first lookup, so a request is validated before
/// any configuration file is read
pub struct LazyStore {
    config_dir: Option<PathBuf>,
    store: OnceLock<std::result::Result<AutomationStore, String>>,
}

impl LazyStore {
    pub fn new(config_dir: Option<PathBuf>) -> Self {
        Self {
            config_dir,
            store: OnceLock::new(),
        }
    }

    fn store(&self) -> Result<&AutomationStore> {
        let loaded = self.store.get_or_init(|| {
            ConfigManager::with_dir(self.config_dir.clone())
                .and_then(|manager| manager.load_store())
                .map_err(|e| format!("Failed to load automation settings: {}", e))
        });

        match loaded {
            Ok(store) => Ok(store),
            Err(message) => Err(RunbookError::Configuration(message.clone())),
        }
    }
}

impl ConfigSource for LazyStore {
    fn get(&self, name: &str) -> Result<String> {
        self.store()?.get(name)
    }

    fn get_credential(&self, name: &str) -> Result<Credential> {
        self.store()?.get_credential(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_to_env_key() {
        assert_eq!(to_env_key("DomainName"), "DOMAIN_NAME");
        assert_eq!(to_env_key("DomainCredentials"), "DOMAIN_CREDENTIALS");
        assert_eq!(to_env_key("SyncServerName"), "SYNC_SERVER_NAME");
    }

    #[test]
    fn test_parse_env_file() {
        let contents = r#"
# runbook environment
DOMAIN_NAME=corp.example.com
export DOMAIN_CONTROLLER = "dc01.corp.example.com"
DOMAIN_CREDENTIALS_PASSWORD='p=ss'
"#;
        let vars = ConfigManager::parse_env_file(contents);
        assert_eq!(
            vars,
            pairs(&[
                ("DOMAIN_NAME", "corp.example.com"),
                ("DOMAIN_CONTROLLER", "dc01.corp.example.com"),
                ("DOMAIN_CREDENTIALS_PASSWORD", "p=ss"),
            ])
        );
    }

    #[test]
    fn test_overlay_respects_prefix() {
        let mut store = AutomationStore::default();
        store.overlay(
            pairs(&[
                ("ADRUNBOOK_DOMAIN_NAME", "corp.example.com"),
                ("DOMAIN_CONTROLLER", "ignored"),
                ("ADRUNBOOK_DOMAIN_CREDENTIALS_USERNAME", "CORP\\svc-runbook"),
                ("ADRUNBOOK_DOMAIN_CREDENTIALS_PASSWORD", "s3cret"),
            ]),
            ENV_PREFIX,
        );

        assert_eq!(store.get(DOMAIN_NAME).unwrap(), "corp.example.com");
        assert!(matches!(
            store.get(DOMAIN_CONTROLLER),
            Err(RunbookError::Configuration(_))
        ));
        let credential = store.get_credential(DOMAIN_CREDENTIALS).unwrap();
        assert_eq!(credential.username, "CORP\\svc-runbook");
        assert_eq!(credential.password, "s3cret");
    }

    #[test]
    fn test_overlay_updates_half_of_stored_credential() {
        let mut store = AutomationStore::default();
        store.credentials.insert(
            DOMAIN_CREDENTIALS.to_string(),
            Credential {
                username: "svc".into(),
                password: "old".into(),
            },
        );
        store.overlay(pairs(&[("DOMAIN_CREDENTIALS_PASSWORD", "new")]), "");

        let credential = store.get_credential(DOMAIN_CREDENTIALS).unwrap();
        assert_eq!(credential.username, "svc");
        assert_eq!(credential.password, "new");
    }

    #[test]
    fn test_empty_values_are_configuration_errors() {
        let mut store = AutomationStore::default();
        store.variables.insert(DOMAIN_NAME.into(), "   ".into());
        store.credentials.insert(
            DOMAIN_CREDENTIALS.into(),
            Credential {
                username: "svc".into(),
                password: String::new(),
            },
        );

        assert!(matches!(
            store.get(DOMAIN_NAME),
            Err(RunbookError::Configuration(_))
        ));
        assert!(matches!(
            store.get_credential(DOMAIN_CREDENTIALS),
            Err(RunbookError::Configuration(_))
        ));
    }

    #[test]
    fn test_credential_debug_redacts_password() {
        let credential = Credential {
            username: "svc".into(),
            password: "hunter2".into(),
        };
        let debug = format!("{:?}", credential);
        assert!(debug.contains("svc"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_file_store_round_trip_and_env_file() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ConfigManager::with_dir(Some(dir.path().join("cfg"))).unwrap();

        let mut store = AutomationStore::default();
        store
            .variables
            .insert(DOMAIN_NAME.into(), "corp.example.com".into());
        manager.save_file_store(&store).unwrap();

        fs::write(
            manager.env_file(),
            "DOMAIN_CONTROLLER=dc02.corp.example.com\n",
        )
        .unwrap();

        let loaded = manager.load_store().unwrap();
        assert_eq!(loaded.get(DOMAIN_NAME).unwrap(), "corp.example.com");
        assert_eq!(
            loaded.get(DOMAIN_CONTROLLER).unwrap(),
            "dc02.corp.example.com"
        );
    }

    #[test]
    fn test_execution_context_principal_name() {
        let mut store = AutomationStore::default();
        store.variables.insert(DOMAIN_NAME.into(), "corp.example.com".into());
        store.variables.insert(DOMAIN_CONTROLLER.into(), "dc01".into());
        store.credentials.insert(
            DOMAIN_CREDENTIALS.into(),
            Credential {
                username: "svc".into(),
                password: "pw".into(),
            },
        );

        let ctx = ExecutionContext::resolve(&store).unwrap();
        assert_eq!(ctx.principal_name("john"), "john@corp.example.com");
    }

    #[test]
    fn test_lazy_store_reports_unreadable_file_as_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("automation.toml"), "[variables\nbroken").unwrap();

        let store = LazyStore::new(Some(dir.path().to_path_buf()));
        let err = store.get(DOMAIN_NAME).unwrap_err();
        assert!(matches!(err, RunbookError::Configuration(msg) if msg.contains("TOML")));
        assert!(matches!(
            store.get_credential(DOMAIN_CREDENTIALS),
            Err(RunbookError::Configuration(_))
        ));
    }

    #[test]
    fn test_lazy_store_reads_file_once_resolved() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("automation.toml"),
            "[variables]\nDomainName = \"corp.example.com\"\n",
        )
        .unwrap();

        let store = LazyStore::new(Some(dir.path().to_path_buf()));
        assert_eq!(store.get(DOMAIN_NAME).unwrap(), "corp.example.com");
        assert!(matches!(
            store.get(SYNC_SERVER_NAME),
            Err(RunbookError::Configuration(_))
        ));
    }
}
