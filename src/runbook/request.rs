use crate::directory::GroupScope;
use crate::error::{Result, RunbookError};
use serde::Serialize;
use std::fmt;

/// The nine runbook commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CommandKind {
    CreateUser,
    RemoveUser,
    CreateGroup,
    RemoveGroup,
    AddGroupMember,
    RemoveGroupMember,
    SetPassword,
    UnlockUser,
    SyncDirectory,
}

impl CommandKind {
    #[cfg(test)]
    pub const ALL: [CommandKind; 9] = [
        CommandKind::CreateUser,
        CommandKind::RemoveUser,
        CommandKind::CreateGroup,
        CommandKind::RemoveGroup,
        CommandKind::AddGroupMember,
        CommandKind::RemoveGroupMember,
        CommandKind::SetPassword,
        CommandKind::UnlockUser,
        CommandKind::SyncDirectory,
    ];

    /// Required fields; SetPassword only needs a password when it is not
    /// forcing a change at next logon.
    pub fn required_fields(self, arguments: &Arguments) -> Vec<Field> {
        match self {
            CommandKind::CreateUser => vec![
                Field::Username,
                Field::Password,
                Field::Firstname,
                Field::Lastname,
            ],
            CommandKind::RemoveUser | CommandKind::UnlockUser => vec![Field::Username],
            CommandKind::CreateGroup => vec![Field::GroupName, Field::Path, Field::GroupScope],
            CommandKind::RemoveGroup => vec![Field::GroupName],
            CommandKind::AddGroupMember | CommandKind::RemoveGroupMember => {
                vec![Field::Username, Field::GroupName]
            }
            CommandKind::SetPassword if arguments.change_password_at_logon => {
                vec![Field::Username]
            }
            CommandKind::SetPassword => vec![Field::Username, Field::Password],
            CommandKind::SyncDirectory => vec![],
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Named string arguments a command can take
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Username,
    Password,
    Firstname,
    Lastname,
    GroupName,
    Path,
    DisplayName,
    Description,
    GroupScope,
}

impl Field {
    pub fn name(self) -> &'static str {
        match self {
            Field::Username => "username",
            Field::Password => "password",
            Field::Firstname => "firstname",
            Field::Lastname => "lastname",
            Field::GroupName => "groupName",
            Field::Path => "path",
            Field::DisplayName => "displayName",
            Field::Description => "description",
            Field::GroupScope => "groupScope",
        }
    }
}

/// A string that never shows up in Debug output
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

/// Raw named arguments as supplied by the caller
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    pub username: Option<String>,
    pub password: Option<Secret>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub group_name: Option<String>,
    pub path: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub group_scope: Option<String>,
    pub change_password_at_logon: bool,
}

impl Arguments {
    /// Present and not blank
    pub fn value(&self, field: Field) -> Option<&str> {
        let raw = match field {
            Field::Username => self.username.as_deref(),
            Field::Password => self.password.as_ref().map(Secret::expose),
            Field::Firstname => self.firstname.as_deref(),
            Field::Lastname => self.lastname.as_deref(),
            Field::GroupName => self.group_name.as_deref(),
            Field::Path => self.path.as_deref(),
            Field::DisplayName => self.display_name.as_deref(),
            Field::Description => self.description.as_deref(),
            Field::GroupScope => self.group_scope.as_deref(),
        };
        raw.filter(|v| !v.trim().is_empty())
    }

    fn owned(&self, field: Field) -> Option<String> {
        self.value(field).map(|v| v.trim().to_string())
    }
}

/// A command plus its arguments, before validation
#[derive(Debug, Clone)]
pub struct OperationRequest {
    pub command: CommandKind,
    pub arguments: Arguments,
}

#[derive(Debug, Clone)]
pub struct CreateUser {
    pub username: String,
    pub password: Secret,
    pub firstname: String,
    pub lastname: String,
    pub path: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub change_password_at_logon: bool,
}

#[derive(Debug, Clone)]
pub struct CreateGroup {
    pub group_name: String,
    pub path: String,
    pub scope: GroupScope,
    pub display_name: Option<String>,
    pub description: Option<String>,
}

/// The two mutually exclusive password-reset paths
#[derive(Debug, Clone)]
pub enum PasswordReset {
    Replace(Secret),
    ChangeAtLogon,
}

/// A validated request with typed arguments
#[derive(Debug, Clone)]
pub enum Operation {
    CreateUser(CreateUser),
    RemoveUser { username: String },
    CreateGroup(CreateGroup),
    RemoveGroup { group_name: String },
    AddGroupMember { username: String, group_name: String },
    RemoveGroupMember { username: String, group_name: String },
    SetPassword { username: String, reset: PasswordReset },
    UnlockUser { username: String },
    SyncDirectory,
}

impl OperationRequest {
    pub fn new(command: CommandKind, arguments: Arguments) -> Self {
        Self { command, arguments }
    }

    pub fn validate(&self) -> Result<Operation> {
        let args = &self.arguments;

        let missing: Vec<&str> = self
            .command
            .required_fields(args)
            .into_iter()
            .filter(|field| args.value(*field).is_none())
            .map(Field::name)
            .collect();

        if !missing.is_empty() {
            return Err(RunbookError::Validation(format!(
                "{} requires non-empty {}",
                self.command,
                missing.join(", ")
            )));
        }

        // Everything required is present past this point
        let required = |field: Field| args.owned(field).unwrap_or_default();

        let operation = match self.command {
            CommandKind::CreateUser => Operation::CreateUser(CreateUser {
                username: required(Field::Username),
                password: args.password.clone().unwrap_or_else(|| Secret::from("")),
                firstname: required(Field::Firstname),
                lastname: required(Field::Lastname),
                path: args.owned(Field::Path),
                display_name: args.owned(Field::DisplayName),
                description: args.owned(Field::Description),
                change_password_at_logon: args.change_password_at_logon,
            }),
            CommandKind::RemoveUser => Operation::RemoveUser {
                username: required(Field::Username),
            },
            CommandKind::CreateGroup => {
                let scope = required(Field::GroupScope)
                    .parse::<GroupScope>()
                    .map_err(RunbookError::Validation)?;
                Operation::CreateGroup(CreateGroup {
                    group_name: required(Field::GroupName),
                    path: required(Field::Path),
                    scope,
                    display_name: args.owned(Field::DisplayName),
                    description: args.owned(Field::Description),
                })
            }
            CommandKind::RemoveGroup => Operation::RemoveGroup {
                group_name: required(Field::GroupName),
            },
            CommandKind::AddGroupMember => Operation::AddGroupMember {
                username: required(Field::Username),
                group_name: required(Field::GroupName),
            },
            CommandKind::RemoveGroupMember => Operation::RemoveGroupMember {
                username: required(Field::Username),
                group_name: required(Field::GroupName),
            },
            CommandKind::SetPassword => Operation::SetPassword {
                username: required(Field::Username),
                reset: if args.change_password_at_logon {
                    PasswordReset::ChangeAtLogon
                } else {
                    PasswordReset::Replace(
                        args.password.clone().unwrap_or_else(|| Secret::from("")),
                    )
                },
            },
            CommandKind::UnlockUser => Operation::UnlockUser {
                username: required(Field::Username),
            },
            CommandKind::SyncDirectory => Operation::SyncDirectory,
        };

        Ok(operation)
    }
}
