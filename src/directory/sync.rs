//! Azure AD Connect delta sync over PowerShell remoting

use super::{DirectoryError, DirectoryResult, SyncReport, SyncService};
use crate::config::SyncContext;
use async_trait::async_trait;
use std::process::Output;
use tokio::process::Command;
use tracing::{debug, info, instrument};

const DEFAULT_POWERSHELL: &str = "pwsh";

/// Inputs arrive through the child environment so nothing is interpolated
const DELTA_SYNC_SCRIPT: &str = r#"$ErrorActionPreference = 'Stop'
$secret = ConvertTo-SecureString -String $env:ADRUNBOOK_SYNC_SECRET -AsPlainText -Force
$credential = New-Object System.Management.Automation.PSCredential($env:ADRUNBOOK_SYNC_IDENTITY, $secret)
$result = Invoke-Command -ComputerName $env:ADRUNBOOK_SYNC_SERVER -Credential $credential -ScriptBlock {
    Import-Module ADSync
    Start-ADSyncSyncCycle -PolicyType Delta
}
if ($result -and $result.Result) { Write-Output $result.Result } else { Write-Output 'Success' }
"#;

/// Runs `Start-ADSyncSyncCycle -PolicyType Delta` on the sync server
#[derive(Debug, Clone, Default)]
pub struct PowerShellSync;

impl PowerShellSync {
    pub fn new() -> Self {
        Self
    }

    fn command(context: &SyncContext) -> Command {
        let program = context
            .powershell_path
            .as_deref()
            .unwrap_or(DEFAULT_POWERSHELL);

        let mut command = Command::new(program);
        command
            .args(["-NoProfile", "-NonInteractive", "-Command", DELTA_SYNC_SCRIPT])
            .env("ADRUNBOOK_SYNC_SERVER", &context.server_name)
            .env("ADRUNBOOK_SYNC_IDENTITY", &context.credential.username)
            .env("ADRUNBOOK_SYNC_SECRET", &context.credential.password)
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl SyncService for PowerShellSync {
    #[instrument(skip(self, context), fields(server = %context.server_name))]
    async fn start_delta_sync(&self, context: &SyncContext) -> DirectoryResult<SyncReport> {
        debug!("Starting delta sync cycle");
        let output = Self::command(context).output().await?;
        let report = evaluate_output(&context.server_name, &output)?;
        info!(result = %report.result, "Delta sync cycle started");
        Ok(report)
    }
}

/// Success means a zero exit status and nothing on the error stream
pub fn evaluate_output(server_name: &str, output: &Output) -> DirectoryResult<SyncReport> {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();

    if !stderr.is_empty() {
        return Err(DirectoryError::SyncErrors(stderr.to_string()));
    }
    if !output.status.success() {
        return Err(DirectoryError::SyncErrors(format!(
            "PowerShell exited with {}",
            output.status
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let result = stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .unwrap_or("Success")
        .to_string();

    Ok(SyncReport {
        server_name: server_name.to_string(),
        result,
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::Credential;
    use std::os::unix::process::ExitStatusExt;
    use std::process::ExitStatus;

    fn output(code: i32, stdout: &str, stderr: &str) -> Output {
        Output {
            status: ExitStatus::from_raw(code << 8),
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_success_takes_last_line() {
        let report = evaluate_output("aadc01", &output(0, "\nSuccess\n", "")).unwrap();
        assert_eq!(report.server_name, "aadc01");
        assert_eq!(report.result, "Success");
    }

    #[test]
    fn test_empty_stdout_defaults_to_success() {
        let report = evaluate_output("aadc01", &output(0, "", "  \n")).unwrap();
        assert_eq!(report.result, "Success");
    }

    #[test]
    fn test_error_stream_fails_even_with_zero_exit() {
        let err = evaluate_output("aadc01", &output(0, "Success", "Sync is already running")).unwrap_err();
        assert!(matches!(err, DirectoryError::SyncErrors(msg) if msg == "Sync is already running"));
    }

    #[test]
    fn test_non_zero_exit_fails() {
        assert!(evaluate_output("aadc01", &output(1, "", "")).is_err());
    }

    #[test]
    fn test_script_does_not_embed_inputs() {
        let context = SyncContext {
            server_name: "aadc01".into(),
            credential: Credential {
                username: "CORP\\svc".into(),
                password: "p'ss; Remove-Item".into(),
            },
            powershell_path: None,
        };
        let command = PowerShellSync::command(&context);
        let std_command = command.as_std();

        assert_eq!(std_command.get_program(), "pwsh");
        let args: Vec<_> = std_command.get_args().collect();
        assert_eq!(args.len(), 4);
        assert!(!args[3].to_string_lossy().contains("p'ss"));
        assert!(std_command
            .get_envs()
            .any(|(k, v)| k == "ADRUNBOOK_SYNC_SECRET" && v.map(|v| v == "p'ss; Remove-Item").unwrap_or(false)));
    }
}
