use super::{run_request, RunOptions};
use crate::error::Result;
use crate::runbook::{Arguments, CommandKind};

/// Start a delta sync cycle on the configured Azure AD Connect server
pub async fn delta(options: &RunOptions) -> Result<()> {
    run_request(options, CommandKind::SyncDirectory, Arguments::default()).await
}
