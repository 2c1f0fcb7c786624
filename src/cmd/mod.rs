pub mod config;
pub mod group;
pub mod progress;
pub mod sync;
pub mod user;

use crate::config::LazyStore;
use crate::directory::ldap::LdapDirectory;
use crate::directory::sync::PowerShellSync;
use crate::error::Result;
use crate::runbook::request::OperationRequest;
use crate::runbook::{Arguments, CommandKind, Envelope};
use std::path::PathBuf;

/// Global flags shared by every runbook subcommand
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub config_dir: Option<PathBuf>,
    pub compact: bool,
}

/// Run one command through the envelope and print its JSON document
pub async fn run_request(
    options: &RunOptions,
    command: CommandKind,
    arguments: Arguments,
) -> Result<()> {
    let store = LazyStore::new(options.config_dir.clone());

    let directory = LdapDirectory::new();
    let sync = PowerShellSync::new();
    let envelope = Envelope::new(&store, &directory, &sync);
    let request = OperationRequest::new(command, arguments);

    let spinner = progress::create_spinner(&format!("Running {}...", command));
    match envelope.execute(&request).await {
        Ok(result) => {
            progress::finish_spinner_success(
                &spinner,
                &format!(
                    "{} completed in {} ms",
                    command,
                    result.elapsed.as_millis()
                ),
            );
            println!("{}", result.to_json(options.compact)?);
            Ok(())
        }
        Err(e) => {
            progress::finish_spinner_error(&spinner, &format!("{} failed", command));
            Err(e)
        }
    }
}
