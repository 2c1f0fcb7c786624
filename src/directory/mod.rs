//! Directory and sync service seams
//!
//! The runbook envelope only talks to these traits. `ldap` implements the
//! directory side against Active Directory over LDAP(S); `sync` runs the
//! Azure AD Connect delta cycle through PowerShell remoting.

pub mod ldap;
pub mod sync;

use crate::config::{ExecutionContext, SyncContext};
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// userAccountControl: ACCOUNTDISABLE
pub const UF_ACCOUNT_DISABLE: u32 = 0x2;
/// userAccountControl: NORMAL_ACCOUNT
pub const UF_NORMAL_ACCOUNT: u32 = 0x200;
/// userAccountControl: DONT_EXPIRE_PASSWORD
pub const UF_DONT_EXPIRE_PASSWD: u32 = 0x10000;
/// msDS-User-Account-Control-Computed: LOCKOUT
pub const UF_LOCKOUT: u32 = 0x10;

#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("{0}")]
    Connection(String),

    #[error("{0}")]
    Rejected(String),

    #[error("LDAP client error: {0}")]
    Client(#[from] ::ldap3::LdapError),

    #[error("Failed to start sync process: {0}")]
    Process(#[from] std::io::Error),

    #[error("Sync reported errors: {0}")]
    SyncErrors(String),
}

pub type DirectoryResult<T> = std::result::Result<T, DirectoryError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupScope {
    DomainLocal,
    Global,
    Universal,
}

impl GroupScope {
    pub const ALL: [GroupScope; 3] = [
        GroupScope::Universal,
        GroupScope::Global,
        GroupScope::DomainLocal,
    ];

    /// Signed `groupType` value for a security group of this scope
    pub fn security_group_type(self) -> i32 {
        let scope: u32 = match self {
            GroupScope::Global => 0x2,
            GroupScope::DomainLocal => 0x4,
            GroupScope::Universal => 0x8,
        };
        (0x8000_0000u32 | scope) as i32
    }
}

impl fmt::Display for GroupScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GroupScope::DomainLocal => "DomainLocal",
            GroupScope::Global => "Global",
            GroupScope::Universal => "Universal",
        };
        f.write_str(name)
    }
}

impl FromStr for GroupScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GroupScope::ALL
            .into_iter()
            .find(|scope| scope.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!(
                    "groupScope '{}' is not one of Universal, Global, DomainLocal",
                    s
                )
            })
    }
}

/// A user account as read from the directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryUser {
    pub distinguished_name: String,
    pub sam_account_name: String,
    pub user_principal_name: String,
    pub name: String,
    pub account_control: u32,
    pub locked_out: bool,
}

impl DirectoryUser {
    pub fn enabled(&self) -> bool {
        self.account_control & UF_ACCOUNT_DISABLE == 0
    }

    pub fn password_never_expires(&self) -> bool {
        self.account_control & UF_DONT_EXPIRE_PASSWD != 0
    }
}

/// A group as read from the directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryGroup {
    pub distinguished_name: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub sam_account_name: String,
    pub user_principal_name: String,
    pub given_name: String,
    pub surname: String,
    pub display_name: String,
    pub description: Option<String>,
    pub password: String,
    pub container: String,
    pub change_password_at_logon: bool,
}

#[derive(Debug, Clone)]
pub struct NewGroup {
    pub name: String,
    pub container: String,
    pub scope: GroupScope,
    pub display_name: Option<String>,
    pub description: Option<String>,
}

/// Opens one directory session per invocation
#[async_trait]
pub trait DirectoryService: Send + Sync {
    async fn open(&self, context: &ExecutionContext) -> DirectoryResult<Box<dyn DirectorySession>>;
}

/// Capability-level directory operations bound to one authenticated session
#[async_trait]
pub trait DirectorySession: Send {
    async fn find_user(&mut self, principal_name: &str) -> DirectoryResult<Option<DirectoryUser>>;

    async fn find_group(&mut self, name: &str) -> DirectoryResult<Option<DirectoryGroup>>;

    async fn create_user(&mut self, user: &NewUser) -> DirectoryResult<DirectoryUser>;

    async fn remove_user(&mut self, user: &DirectoryUser) -> DirectoryResult<()>;

    async fn create_group(&mut self, group: &NewGroup) -> DirectoryResult<DirectoryGroup>;

    async fn remove_group(&mut self, group: &DirectoryGroup) -> DirectoryResult<()>;

    async fn add_group_member(
        &mut self,
        group: &DirectoryGroup,
        user: &DirectoryUser,
    ) -> DirectoryResult<()>;

    async fn remove_group_member(
        &mut self,
        group: &DirectoryGroup,
        user: &DirectoryUser,
    ) -> DirectoryResult<()>;

    async fn set_password(&mut self, user: &DirectoryUser, password: &str) -> DirectoryResult<()>;

    /// Clears DONT_EXPIRE_PASSWORD and returns the updated account
    async fn clear_password_never_expires(
        &mut self,
        user: &DirectoryUser,
    ) -> DirectoryResult<DirectoryUser>;

    async fn require_password_change(&mut self, user: &DirectoryUser) -> DirectoryResult<()>;

    /// Clears the lockout and returns the updated account
    async fn unlock(&mut self, user: &DirectoryUser) -> DirectoryResult<DirectoryUser>;

    /// Release the session
    async fn close(self: Box<Self>) -> DirectoryResult<()>;
}

/// What the sync server reported back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub server_name: String,
    pub result: String,
}

/// Runs the delta synchronization procedure on the sync server
#[async_trait]
pub trait SyncService: Send + Sync {
    async fn start_delta_sync(&self, context: &SyncContext) -> DirectoryResult<SyncReport>;
}

/// `corp.example.com` -> `DC=corp,DC=example,DC=com`
pub fn domain_to_dn(domain: &str) -> String {
    domain
        .split('.')
        .filter(|label| !label.is_empty())
        .map(|label| format!("DC={}", label))
        .collect::<Vec<_>>()
        .join(",")
}
