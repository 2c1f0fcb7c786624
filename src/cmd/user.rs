use super::{run_request, RunOptions};
use crate::error::Result;
use crate::runbook::{Arguments, CommandKind};
use clap::Args;

#[derive(Args, Debug)]
pub struct CreateUserArgs {
    /// sAMAccountName of the new account
    #[arg(long)]
    username: Option<String>,

    /// Initial password
    #[arg(long)]
    password: Option<String>,

    /// Given name
    #[arg(long, alias = "firstName")]
    firstname: Option<String>,

    /// Surname
    #[arg(long, alias = "lastName")]
    lastname: Option<String>,

    /// Container DN (defaults to CN=Users under the domain)
    #[arg(long)]
    path: Option<String>,

    /// Display name (defaults to "firstname lastname")
    #[arg(long, alias = "displayName")]
    display_name: Option<String>,

    /// Account description
    #[arg(long)]
    description: Option<String>,

    /// Require a password change at next logon
    #[arg(long, alias = "changePasswordAtLogon")]
    change_password_at_logon: bool,
}

#[derive(Args, Debug)]
pub struct UserArgs {
    /// sAMAccountName of the target user
    #[arg(long)]
    username: Option<String>,
}

#[derive(Args, Debug)]
pub struct SetPasswordArgs {
    /// sAMAccountName of the target user
    #[arg(long)]
    username: Option<String>,

    /// New password (not needed with --change-password-at-logon)
    #[arg(long)]
    password: Option<String>,

    /// Expire the current password instead of replacing it
    #[arg(long, alias = "changePasswordAtLogon")]
    change_password_at_logon: bool,
}

impl From<CreateUserArgs> for Arguments {
    fn from(args: CreateUserArgs) -> Self {
        Arguments {
            username: args.username,
            password: args.password.map(Into::into),
            firstname: args.firstname,
            lastname: args.lastname,
            path: args.path,
            display_name: args.display_name,
            description: args.description,
            change_password_at_logon: args.change_password_at_logon,
            ..Arguments::default()
        }
    }
}

impl From<UserArgs> for Arguments {
    fn from(args: UserArgs) -> Self {
        Arguments {
            username: args.username,
            ..Arguments::default()
        }
    }
}

impl From<SetPasswordArgs> for Arguments {
    fn from(args: SetPasswordArgs) -> Self {
        Arguments {
            username: args.username,
            password: args.password.map(Into::into),
            change_password_at_logon: args.change_password_at_logon,
            ..Arguments::default()
        }
    }
}

pub async fn create(options: &RunOptions, args: CreateUserArgs) -> Result<()> {
    run_request(options, CommandKind::CreateUser, args.into()).await
}

pub async fn remove(options: &RunOptions, args: UserArgs) -> Result<()> {
    run_request(options, CommandKind::RemoveUser, args.into()).await
}

pub async fn set_password(options: &RunOptions, args: SetPasswordArgs) -> Result<()> {
    run_request(options, CommandKind::SetPassword, args.into()).await
}

pub async fn unlock(options: &RunOptions, args: UserArgs) -> Result<()> {
    run_request(options, CommandKind::UnlockUser, args.into()).await
}
