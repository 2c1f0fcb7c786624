use super::{run_request, RunOptions};
use crate::error::Result;
use crate::runbook::{Arguments, CommandKind};
use clap::Args;

#[derive(Args, Debug)]
pub struct CreateGroupArgs {
    /// Group name (also used as sAMAccountName)
    #[arg(long, alias = "groupName")]
    group_name: Option<String>,

    /// Container DN for the new group
    #[arg(long)]
    path: Option<String>,

    /// Universal, Global or DomainLocal
    #[arg(long, alias = "groupScope")]
    group_scope: Option<String>,

    /// Display name
    #[arg(long, alias = "displayName")]
    display_name: Option<String>,

    /// Group description
    #[arg(long)]
    description: Option<String>,
}

#[derive(Args, Debug)]
pub struct GroupArgs {
    /// Name of the target group
    #[arg(long, alias = "groupName")]
    group_name: Option<String>,
}

#[derive(Args, Debug)]
pub struct GroupMemberArgs {
    /// sAMAccountName of the member
    #[arg(long)]
    username: Option<String>,

    /// Name of the group
    #[arg(long, alias = "groupName")]
    group_name: Option<String>,
}

impl From<CreateGroupArgs> for Arguments {
    fn from(args: CreateGroupArgs) -> Self {
        Arguments {
            group_name: args.group_name,
            path: args.path,
            group_scope: args.group_scope,
            display_name: args.display_name,
            description: args.description,
            ..Arguments::default()
        }
    }
}

impl From<GroupArgs> for Arguments {
    fn from(args: GroupArgs) -> Self {
        Arguments {
            group_name: args.group_name,
            ..Arguments::default()
        }
    }
}

impl From<GroupMemberArgs> for Arguments {
    fn from(args: GroupMemberArgs) -> Self {
        Arguments {
            username: args.username,
            group_name: args.group_name,
            ..Arguments::default()
        }
    }
}

pub async fn create(options: &RunOptions, args: CreateGroupArgs) -> Result<()> {
    run_request(options, CommandKind::CreateGroup, args.into()).await
}

pub async fn remove(options: &RunOptions, args: GroupArgs) -> Result<()> {
    run_request(options, CommandKind::RemoveGroup, args.into()).await
}

pub async fn add_member(options: &RunOptions, args: GroupMemberArgs) -> Result<()> {
    run_request(options, CommandKind::AddGroupMember, args.into()).await
}

pub async fn remove_member(options: &RunOptions, args: GroupMemberArgs) -> Result<()> {
    run_request(options, CommandKind::RemoveGroupMember, args.into()).await
}
