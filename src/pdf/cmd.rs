//! Shared helpers for mapping `std::process::Command` output to typed
//! results. Grounded on `ocr/extractor.rs`'s `handle_cmd_output`/
//! `check_cmd_status` free functions.

use std::io;
use std::process::{Command, Output};

pub fn run_capturing_stdout(
    cmd: &mut Command,
    tool_name: &str,
    error_prefix: &str,
) -> Result<String, CmdError> {
    handle_output(cmd.output(), tool_name, error_prefix)
}

pub fn handle_output(
    result: io::Result<Output>,
    tool_name: &str,
    error_prefix: &str,
) -> Result<String, CmdError> {
    match result {
        Ok(output) => {
            if output.status.success() {
                Ok(String::from_utf8_lossy(&output.stdout).to_string())
            } else {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(CmdError::Failed(format!("{error_prefix}: {stderr}")))
            }
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(CmdError::NotFound(tool_name.to_string()))
        }
        Err(e) => Err(CmdError::Io(e)),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CmdError {
    #[error("external tool not found: {0}")]
    NotFound(String),
    #[error("command failed: {0}")]
    Failed(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}
