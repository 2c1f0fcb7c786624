use super::request::CommandKind;
use crate::directory::{DirectoryGroup, DirectoryUser, SyncReport};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateUserOutput {
    pub sam_account_name: String,
    pub user_principal_name: String,
    pub name: String,
    pub enabled: bool,
    pub distinguished_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RemoveUserOutput {
    pub sam_account_name: String,
    pub user_principal_name: String,
    pub distinguished_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateGroupOutput {
    pub name: String,
    pub description: String,
    pub distinguished_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RemoveGroupOutput {
    pub name: String,
    pub distinguished_name: String,
}

/// Shared by add and remove member
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct GroupMemberOutput {
    pub group_name: String,
    pub group_distinguished_name: String,
    pub sam_account_name: String,
    pub user_principal_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SetPasswordOutput {
    pub sam_account_name: String,
    pub user_principal_name: String,
    pub enabled: bool,
    pub password_never_expires: bool,
    pub change_password_at_logon: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UnlockUserOutput {
    pub sam_account_name: String,
    pub user_principal_name: String,
    pub enabled: bool,
    pub locked_out: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SyncDirectoryOutput {
    pub server_name: String,
    pub policy_type: String,
    pub result: String,
}

/// The fixed projection emitted for each command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OperationOutput {
    CreateUser(CreateUserOutput),
    RemoveUser(RemoveUserOutput),
    CreateGroup(CreateGroupOutput),
    RemoveGroup(RemoveGroupOutput),
    GroupMember(GroupMemberOutput),
    SetPassword(SetPasswordOutput),
    UnlockUser(UnlockUserOutput),
    SyncDirectory(SyncDirectoryOutput),
}

impl From<&DirectoryUser> for CreateUserOutput {
    fn from(user: &DirectoryUser) -> Self {
        Self {
            sam_account_name: user.sam_account_name.clone(),
            user_principal_name: user.user_principal_name.clone(),
            name: user.name.clone(),
            enabled: user.enabled(),
            distinguished_name: user.distinguished_name.clone(),
        }
    }
}

impl From<&DirectoryUser> for RemoveUserOutput {
    fn from(user: &DirectoryUser) -> Self {
        Self {
            sam_account_name: user.sam_account_name.clone(),
            user_principal_name: user.user_principal_name.clone(),
            distinguished_name: user.distinguished_name.clone(),
        }
    }
}

impl From<&DirectoryGroup> for CreateGroupOutput {
    fn from(group: &DirectoryGroup) -> Self {
        Self {
            name: group.name.clone(),
            description: group.description.clone(),
            distinguished_name: group.distinguished_name.clone(),
        }
    }
}

impl From<&DirectoryGroup> for RemoveGroupOutput {
    fn from(group: &DirectoryGroup) -> Self {
        Self {
            name: group.name.clone(),
            distinguished_name: group.distinguished_name.clone(),
        }
    }
}

impl GroupMemberOutput {
    pub fn new(group: &DirectoryGroup, user: &DirectoryUser) -> Self {
        Self {
            group_name: group.name.clone(),
            group_distinguished_name: group.distinguished_name.clone(),
            sam_account_name: user.sam_account_name.clone(),
            user_principal_name: user.user_principal_name.clone(),
        }
    }
}

impl SetPasswordOutput {
    pub fn new(user: &DirectoryUser, change_password_at_logon: bool) -> Self {
        Self {
            sam_account_name: user.sam_account_name.clone(),
            user_principal_name: user.user_principal_name.clone(),
            enabled: user.enabled(),
            password_never_expires: user.password_never_expires(),
            change_password_at_logon,
        }
    }
}

impl From<&DirectoryUser> for UnlockUserOutput {
    fn from(user: &DirectoryUser) -> Self {
        Self {
            sam_account_name: user.sam_account_name.clone(),
            user_principal_name: user.user_principal_name.clone(),
            enabled: user.enabled(),
            locked_out: user.locked_out,
        }
    }
}

impl From<SyncReport> for SyncDirectoryOutput {
    fn from(report: SyncReport) -> Self {
        Self {
            server_name: report.server_name,
            policy_type: "Delta".to_string(),
            result: report.result,
        }
    }
}

/// A successful invocation: projection plus timing
#[derive(Debug, Clone)]
pub struct OperationResult {
    pub command: CommandKind,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub output: OperationOutput,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct Document<'a> {
    operation: CommandKind,
    started_at: &'a DateTime<Utc>,
    elapsed_milliseconds: u64,
    result: &'a OperationOutput,
}

impl OperationResult {
    pub fn to_json(&self, compact: bool) -> serde_json::Result<String> {
        let document = Document {
            operation: self.command,
            started_at: &self.started_at,
            elapsed_milliseconds: self.elapsed.as_millis() as u64,
            result: &self.output,
        };

        if compact {
            serde_json::to_string(&document)
        } else {
            serde_json::to_string_pretty(&document)
        }
    }
}
