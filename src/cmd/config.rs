use super::RunOptions;
use crate::config::{AutomationStore, ConfigManager, Credential};
use crate::error::{Result, RunbookError};
use clap::Args;
use colored::Colorize;
use dialoguer::{theme::ColorfulTheme, Password};

#[derive(Args, Debug)]
pub struct ConfigShowArgs {
    /// Only show what is stored in automation.toml (ignore .env and environment)
    #[arg(long)]
    file_only: bool,
}

#[derive(Args, Debug)]
pub struct ConfigSetArgs {
    /// Variable name (e.g. DomainName, DomainController, SyncServerName)
    name: String,

    /// Value to store
    value: String,
}

#[derive(Args, Debug)]
pub struct ConfigSetCredentialArgs {
    /// Credential name (e.g. DomainCredentials)
    name: String,

    /// Account used to bind, e.g. CORP\svc-runbook or svc-runbook@corp.example.com
    #[arg(long)]
    username: String,

    /// Password (prompted when omitted)
    #[arg(long)]
    password: Option<String>,
}

#[derive(Args, Debug)]
pub struct ConfigRemoveArgs {
    /// Variable or credential name to remove
    name: String,
}

pub async fn show(options: &RunOptions, args: ConfigShowArgs) -> Result<()> {
    let config_manager = ConfigManager::with_dir(options.config_dir.clone())?;
    let store = if args.file_only {
        config_manager.load_file_store()?
    } else {
        config_manager.load_store()?
    };

    if store.variables.is_empty() && store.credentials.is_empty() {
        println!("{} No automation settings configured", "!".yellow());
        println!(
            "\n{} Run {} to add one",
            "→".cyan(),
            "adrunbook config set DomainName corp.example.com".bold()
        );
        return Ok(());
    }

    println!("\n{}", "Variables:".bold());
    println!("{}", "─".repeat(60));
    for (name, value) in &store.variables {
        println!("  {:<20} {}", name, value);
    }

    println!("\n{}", "Credentials:".bold());
    println!("{}", "─".repeat(60));
    for (name, credential) in &store.credentials {
        let password = if credential.password.is_empty() {
            "not set".yellow()
        } else {
            "********".dimmed()
        };
        println!("  {:<20} {} ({})", name, credential.username, password);
    }

    println!("\n{} {}", "→".cyan(), config_manager.config_dir().display());
    Ok(())
}

pub async fn set(options: &RunOptions, args: ConfigSetArgs) -> Result<()> {
    let config_manager = ConfigManager::with_dir(options.config_dir.clone())?;
    let mut store = config_manager.load_file_store()?;

    set_variable(&mut store, &args.name, &args.value)?;
    config_manager.save_file_store(&store)?;

    println!("{} Variable '{}' saved", "✓".green(), args.name);
    Ok(())
}

pub async fn set_credential(options: &RunOptions, args: ConfigSetCredentialArgs) -> Result<()> {
    let config_manager = ConfigManager::with_dir(options.config_dir.clone())?;
    let mut store = config_manager.load_file_store()?;

    let password = match args.password {
        Some(password) => password,
        None => Password::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("Password for {}", args.username))
            .interact()?,
    };

    set_credential_entry(&mut store, &args.name, &args.username, &password)?;
    config_manager.save_file_store(&store)?;

    println!("{} Credential '{}' saved", "✓".green(), args.name);
    Ok(())
}

pub async fn remove(options: &RunOptions, args: ConfigRemoveArgs) -> Result<()> {
    let config_manager = ConfigManager::with_dir(options.config_dir.clone())?;
    let mut store = config_manager.load_file_store()?;

    if !remove_entry(&mut store, &args.name) {
        return Err(RunbookError::Configuration(format!(
            "'{}' is not stored in {}",
            args.name,
            config_manager.store_file().display()
        )));
    }

    config_manager.save_file_store(&store)?;
    println!("{} '{}' removed", "✓".green(), args.name);
    Ok(())
}

pub async fn path(options: &RunOptions) -> Result<()> {
    let config_manager = ConfigManager::with_dir(options.config_dir.clone())?;
    println!("{}", config_manager.config_dir().display());
    Ok(())
}

fn set_variable(store: &mut AutomationStore, name: &str, value: &str) -> Result<()> {
    let (name, value) = (name.trim(), value.trim());
    if name.is_empty() || value.is_empty() {
        return Err(RunbookError::Configuration(
            "Variable name and value must not be empty".into(),
        ));
    }
    store.variables.insert(name.to_string(), value.to_string());
    Ok(())
}

fn set_credential_entry(
    store: &mut AutomationStore,
    name: &str,
    username: &str,
    password: &str,
) -> Result<()> {
    let (name, username) = (name.trim(), username.trim());
    if name.is_empty() || username.is_empty() || password.is_empty() {
        return Err(RunbookError::Configuration(
            "Credential name, username and password must not be empty".into(),
        ));
    }
    store.credentials.insert(
        name.to_string(),
        Credential {
            username: username.to_string(),
            password: password.to_string(),
        },
    );
    Ok(())
}

/// Returns false when nothing by that name was stored
fn remove_entry(store: &mut AutomationStore, name: &str) -> bool {
    let removed_variable = store.variables.remove(name).is_some();
    let removed_credential = store.credentials.remove(name).is_some();
    removed_variable || removed_credential
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigSource;
    use tempfile::TempDir;

    #[test]
    fn test_set_and_remove_round_trip_through_file() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_dir(Some(dir.path().to_path_buf())).unwrap();

        let mut store = manager.load_file_store().unwrap();
        set_variable(&mut store, "DomainName", " corp.example.com ").unwrap();
        set_credential_entry(&mut store, "DomainCredentials", "CORP\\svc", "pw").unwrap();
        manager.save_file_store(&store).unwrap();

        let mut loaded = manager.load_file_store().unwrap();
        assert_eq!(loaded.get("DomainName").unwrap(), "corp.example.com");
        assert_eq!(
            loaded.get_credential("DomainCredentials").unwrap().username,
            "CORP\\svc"
        );

        assert!(remove_entry(&mut loaded, "DomainCredentials"));
        assert!(!remove_entry(&mut loaded, "DomainCredentials"));
        assert!(loaded.get_credential("DomainCredentials").is_err());
    }

    #[test]
    fn test_blank_values_rejected() {
        let mut store = AutomationStore::default();
        assert!(set_variable(&mut store, "DomainName", "  ").is_err());
        assert!(set_credential_entry(&mut store, "DomainCredentials", "svc", "").is_err());
        assert!(store.variables.is_empty());
        assert!(store.credentials.is_empty());
    }
}
