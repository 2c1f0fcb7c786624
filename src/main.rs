mod cmd;
mod config;
mod directory;
mod error;
mod runbook;

use clap::{Parser, Subcommand};
use cmd::RunOptions;
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "adrunbook",
    about = "Active Directory identity runbooks with JSON output",
    version,
    long_about = "Validated Active Directory user and group operations plus Azure AD Connect delta sync\n\n\
                  Each command performs exactly one directory change and prints a JSON document\n\
                  describing the affected object on success. Errors go to stderr with exit code 1."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration directory (defaults to the platform config dir)
    #[arg(long, global = true, env = "ADRUNBOOK_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Print single-line JSON
    #[arg(long, global = true)]
    compact: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an enabled user account
    CreateUser(cmd::user::CreateUserArgs),

    /// Delete a user account
    RemoveUser(cmd::user::UserArgs),

    /// Create a security group
    CreateGroup(cmd::group::CreateGroupArgs),

    /// Delete a group
    RemoveGroup(cmd::group::GroupArgs),

    /// Add a user to a group
    AddGroupMember(cmd::group::GroupMemberArgs),

    /// Remove a user from a group
    RemoveGroupMember(cmd::group::GroupMemberArgs),

    /// Replace a password or force a change at next logon
    SetPassword(cmd::user::SetPasswordArgs),

    /// Clear an account lockout
    UnlockUser(cmd::user::UserArgs),

    /// Start an Azure AD Connect delta sync cycle
    #[command(alias = "sync-azure-ad")]
    SyncDirectory,

    /// Manage automation variables and credentials
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show variables and credential identities (passwords redacted)
    Show(cmd::config::ConfigShowArgs),

    /// Store a variable in automation.toml
    Set(cmd::config::ConfigSetArgs),

    /// Store a credential in automation.toml
    SetCredential(cmd::config::ConfigSetCredentialArgs),

    /// Remove a variable or credential
    Remove(cmd::config::ConfigRemoveArgs),

    /// Print the configuration directory
    Path,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run() -> error::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout is reserved for the result document
    let filter = if cli.verbose {
        EnvFilter::new("adrunbook=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("adrunbook=warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let options = RunOptions {
        config_dir: cli.config_dir,
        compact: cli.compact,
    };

    match cli.command {
        Commands::CreateUser(args) => cmd::user::create(&options, args).await?,
        Commands::RemoveUser(args) => cmd::user::remove(&options, args).await?,
        Commands::CreateGroup(args) => cmd::group::create(&options, args).await?,
        Commands::RemoveGroup(args) => cmd::group::remove(&options, args).await?,
        Commands::AddGroupMember(args) => cmd::group::add_member(&options, args).await?,
        Commands::RemoveGroupMember(args) => cmd::group::remove_member(&options, args).await?,
        Commands::SetPassword(args) => cmd::user::set_password(&options, args).await?,
        Commands::UnlockUser(args) => cmd::user::unlock(&options, args).await?,
        Commands::SyncDirectory => cmd::sync::delta(&options).await?,
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Show(args) => cmd::config::show(&options, args).await?,
            ConfigCommands::Set(args) => cmd::config::set(&options, args).await?,
            ConfigCommands::SetCredential(args) => {
                cmd::config::set_credential(&options, args).await?
            }
            ConfigCommands::Remove(args) => cmd::config::remove(&options, args).await?,
            ConfigCommands::Path => cmd::config::path(&options).await?,
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_camel_case_aliases_and_sync_alias() {
        let cli = Cli::try_parse_from([
            "adrunbook",
            "add-group-member",
            "--username",
            "john",
            "--groupName",
            "Staff",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::AddGroupMember(_)));

        let cli = Cli::try_parse_from(["adrunbook", "sync-azure-ad", "--compact"]).unwrap();
        assert!(matches!(cli.command, Commands::SyncDirectory));
        assert!(cli.compact);
    }
}
