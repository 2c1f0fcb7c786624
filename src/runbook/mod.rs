//! Runbook envelope
//!
//! Validate arguments, resolve configuration, look up the target objects,
//! perform the single directory mutation, project the result. Every failure
//! names the step it came from and no partial output is produced.

pub mod output;
pub mod request;

use crate::config::{ConfigSource, ExecutionContext, SyncContext};
use crate::directory::{
    domain_to_dn, DirectoryError, DirectoryGroup, DirectoryService, DirectorySession,
    DirectoryUser, NewGroup, NewUser, SyncService,
};
use crate::error::{Result, RunbookError, Step};
use chrono::Utc;
use output::{
    CreateGroupOutput, CreateUserOutput, GroupMemberOutput, OperationOutput, OperationResult,
    RemoveGroupOutput, RemoveUserOutput, SetPasswordOutput, SyncDirectoryOutput,
    UnlockUserOutput,
};
use request::{Operation, OperationRequest, PasswordReset};
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

pub use request::{Arguments, CommandKind};

/// Executes one operation request against its collaborators
pub struct Envelope<'a> {
    config: &'a dyn ConfigSource,
    directory: &'a dyn DirectoryService,
    sync: &'a dyn SyncService,
}

impl<'a> Envelope<'a> {
    pub fn new(
        config: &'a dyn ConfigSource,
        directory: &'a dyn DirectoryService,
        sync: &'a dyn SyncService,
    ) -> Self {
        Self {
            config,
            directory,
            sync,
        }
    }

    #[instrument(skip_all, fields(command = %request.command))]
    pub async fn execute(&self, request: &OperationRequest) -> Result<OperationResult> {
        let started_at = Utc::now();
        let timer = Instant::now();

        let outcome = self.run(request).await;
        let elapsed = timer.elapsed();

        match outcome {
            Ok(output) => {
                info!(elapsed_ms = elapsed.as_millis() as u64, "Runbook completed");
                Ok(OperationResult {
                    command: request.command,
                    started_at,
                    elapsed,
                    output,
                })
            }
            Err(e) => {
                error!(
                    step = ?e.step(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %e,
                    "Runbook failed"
                );
                Err(e)
            }
        }
    }

    async fn run(&self, request: &OperationRequest) -> Result<OperationOutput> {
        let operation = request.validate()?;

        if let Operation::SyncDirectory = operation {
            let context = SyncContext::resolve(self.config)?;
            let report = self
                .sync
                .start_delta_sync(&context)
                .await
                .map_err(remote(Step::Sync))?;
            return Ok(OperationOutput::SyncDirectory(SyncDirectoryOutput::from(
                report,
            )));
        }

        let context = ExecutionContext::resolve(self.config)?;
        let mut session = self
            .directory
            .open(&context)
            .await
            .map_err(remote(Step::Connect))?;

        let outcome = apply(&mut *session, &context, operation).await;

        if let Err(e) = session.close().await {
            warn!(error = %e, "Failed to close directory session");
        }

        outcome
    }
}

async fn apply(
    session: &mut dyn DirectorySession,
    context: &ExecutionContext,
    operation: Operation,
) -> Result<OperationOutput> {
    match operation {
        Operation::CreateUser(create) => {
            let container = create
                .path
                .clone()
                .unwrap_or_else(|| format!("CN=Users,{}", domain_to_dn(&context.domain_name)));
            let display_name = create
                .display_name
                .clone()
                .unwrap_or_else(|| format!("{} {}", create.firstname, create.lastname));

            let new_user = NewUser {
                user_principal_name: context.principal_name(&create.username),
                sam_account_name: create.username,
                given_name: create.firstname,
                surname: create.lastname,
                display_name,
                description: create.description,
                password: create.password.expose().to_string(),
                container,
                change_password_at_logon: create.change_password_at_logon,
            };

            let user = session
                .create_user(&new_user)
                .await
                .map_err(remote(Step::Mutate))?;
            Ok(OperationOutput::CreateUser(CreateUserOutput::from(&user)))
        }

        Operation::RemoveUser { username } => {
            let user = require_user(session, context, &username).await?;
            session
                .remove_user(&user)
                .await
                .map_err(remote(Step::Mutate))?;
            Ok(OperationOutput::RemoveUser(RemoveUserOutput::from(&user)))
        }

        Operation::CreateGroup(create) => {
            let new_group = NewGroup {
                name: create.group_name,
                container: create.path,
                scope: create.scope,
                display_name: create.display_name,
                description: create.description,
            };

            let group = session
                .create_group(&new_group)
                .await
                .map_err(remote(Step::Mutate))?;
            Ok(OperationOutput::CreateGroup(CreateGroupOutput::from(&group)))
        }

        Operation::RemoveGroup { group_name } => {
            // No NotFound stop here: an unresolvable group is the directory rejecting the removal
            let group = find_group(session, &group_name).await?.ok_or_else(|| {
                RunbookError::remote(
                    Step::Mutate,
                    format!("Cannot find an object with identity '{}'", group_name),
                )
            })?;
            session
                .remove_group(&group)
                .await
                .map_err(remote(Step::Mutate))?;
            Ok(OperationOutput::RemoveGroup(RemoveGroupOutput::from(&group)))
        }

        Operation::AddGroupMember {
            username,
            group_name,
        } => {
            let user = require_user(session, context, &username).await?;
            let group = require_group(session, &group_name).await?;
            session
                .add_group_member(&group, &user)
                .await
                .map_err(remote(Step::Mutate))?;
            Ok(OperationOutput::GroupMember(GroupMemberOutput::new(
                &group, &user,
            )))
        }

        Operation::RemoveGroupMember {
            username,
            group_name,
        } => {
            let user = require_user(session, context, &username).await?;
            let group = require_group(session, &group_name).await?;
            session
                .remove_group_member(&group, &user)
                .await
                .map_err(remote(Step::Mutate))?;
            Ok(OperationOutput::GroupMember(GroupMemberOutput::new(
                &group, &user,
            )))
        }

        Operation::SetPassword { username, reset } => {
            let user = require_user(session, context, &username).await?;
            match reset {
                PasswordReset::Replace(password) => {
                    session
                        .set_password(&user, password.expose())
                        .await
                        .map_err(remote(Step::Mutate))?;
                    Ok(OperationOutput::SetPassword(SetPasswordOutput::new(
                        &user, false,
                    )))
                }
                PasswordReset::ChangeAtLogon => {
                    // AD refuses change-at-logon while the password never expires
                    let user = if user.password_never_expires() {
                        session
                            .clear_password_never_expires(&user)
                            .await
                            .map_err(remote(Step::Mutate))?
                    } else {
                        user
                    };
                    session
                        .require_password_change(&user)
                        .await
                        .map_err(remote(Step::Mutate))?;
                    Ok(OperationOutput::SetPassword(SetPasswordOutput::new(
                        &user, true,
                    )))
                }
            }
        }

        Operation::UnlockUser { username } => {
            let user = require_user(session, context, &username).await?;
            let user = session.unlock(&user).await.map_err(remote(Step::Mutate))?;
            Ok(OperationOutput::UnlockUser(UnlockUserOutput::from(&user)))
        }

        Operation::SyncDirectory => unreachable!("sync runs without a directory session"),
    }
}

async fn require_user(
    session: &mut dyn DirectorySession,
    context: &ExecutionContext,
    username: &str,
) -> Result<DirectoryUser> {
    let principal_name = context.principal_name(username);
    debug!(principal_name = %principal_name, "Looking up user");

    session
        .find_user(&principal_name)
        .await
        .map_err(remote(Step::Lookup))?
        .ok_or_else(|| RunbookError::NotFound(format!("User '{}' not found", principal_name)))
}

async fn find_group(
    session: &mut dyn DirectorySession,
    group_name: &str,
) -> Result<Option<DirectoryGroup>> {
    debug!(group = %group_name, "Looking up group");
    session
        .find_group(group_name)
        .await
        .map_err(remote(Step::Lookup))
}

async fn require_group(
    session: &mut dyn DirectorySession,
    group_name: &str,
) -> Result<DirectoryGroup> {
    find_group(session, group_name)
        .await?
        .ok_or_else(|| RunbookError::NotFound(format!("Group '{}' not found", group_name)))
}

fn remote(step: Step) -> impl Fn(DirectoryError) -> RunbookError {
    move |e| RunbookError::remote(step, e.to_string())
}
