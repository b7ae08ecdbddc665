//! Remote command execution through the system `ssh` client.
//!
//! Each command runs in its own `ssh` process. Password authentication goes
//! through `sshpass -e`, which reads the password from `SSHPASS`.

use async_trait::async_trait;
use crate::shared::config::{SshSettings, Target};
use crate::shared::error::ExecError;
use crate::shared::traits::{RemoteExecutor, RemoteSession};
use encoding_rs::UTF_8;
use log::{debug, warn};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use which::which;

/// ssh reserves this exit status for its own failures.
const SSH_ERROR_STATUS: i32 = 255;

pub struct SshExecutor {
    settings: SshSettings,
    sshpass_available: bool,
}

impl SshExecutor {
    pub fn new(settings: SshSettings) -> Self {
        let sshpass_available = which("sshpass").is_ok();
        if !sshpass_available {
            debug!("sshpass not found, password authentication is unavailable");
        }
        Self {
            settings,
            sshpass_available,
        }
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn connect(&self, target: &Target) -> Result<Box<dyn RemoteSession>, ExecError> {
        if target.password.is_some() && !self.sshpass_available {
            return Err(ExecError::MissingSshpass);
        }
        Ok(Box::new(SshSession {
            target: target.clone(),
            connect_timeout_secs: self.settings.connect_timeout_secs,
            command_timeout: self.settings.command_timeout(),
        }))
    }
}

pub struct SshSession {
    target: Target,
    connect_timeout_secs: u64,
    command_timeout: Duration,
}

impl SshSession {
    /// Program and arguments for running `command` on the target.
    pub fn command_line(&self, command: &str) -> (String, Vec<String>) {
        let mut args = Vec::new();
        let program = if self.target.password.is_some() {
            args.push("-e".to_string());
            args.push("ssh".to_string());
            "sshpass"
        } else {
            args.push("-o".to_string());
            args.push("BatchMode=yes".to_string());
            "ssh"
        };

        args.push("-o".to_string());
        args.push("StrictHostKeyChecking=accept-new".to_string());
        args.push("-o".to_string());
        args.push(format!("ConnectTimeout={}", self.connect_timeout_secs));

        if self.target.port != 22 {
            args.push("-p".to_string());
            args.push(self.target.port.to_string());
        }
        if let Some(identity) = &self.target.identity_file {
            args.push("-i".to_string());
            args.push(identity.clone());
        }

        args.push(self.target.destination());
        args.push(command.to_string());
        (program.to_string(), args)
    }

    fn classify_failure(&self, command: &str, status: Option<i32>, stderr: &str) -> ExecError {
        let stderr = stderr.trim().to_string();
        match status {
            Some(SSH_ERROR_STATUS) => {
                if stderr.contains("Permission denied") {
                    ExecError::Authentication {
                        destination: self.target.destination(),
                        message: stderr,
                    }
                } else {
                    ExecError::Connection {
                        destination: self.target.destination(),
                        message: stderr,
                    }
                }
            }
            // sshpass: 5 means the password was refused
            Some(5) if self.target.password.is_some() => ExecError::Authentication {
                destination: self.target.destination(),
                message: "invalid password".to_string(),
            },
            status => ExecError::Command {
                command: command.to_string(),
                status: status.unwrap_or(-1),
                stderr,
            },
        }
    }
}

fn decode_output(bytes: &[u8]) -> String {
    let (cow, _encoding_used, had_errors) = UTF_8.decode(bytes);
    if had_errors {
        warn!("Replaced invalid UTF-8 sequences in command output");
    }
    cow.into_owned()
}

#[async_trait]
impl RemoteSession for SshSession {
    async fn exec(&mut self, command: &str) -> Result<String, ExecError> {
        let (program, args) = self.command_line(command);
        let mut cmd = Command::new(&program);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(password) = &self.target.password {
            cmd.env("SSHPASS", password);
        }

        debug!("{}: running `{}`", self.target.name, command);
        let output = match tokio::time::timeout(self.command_timeout, cmd.output()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(ExecError::Timeout {
                    command: command.to_string(),
                    timeout: self.command_timeout,
                })
            }
        };

        if output.status.success() {
            Ok(decode_output(&output.stdout))
        } else {
            let stderr = decode_output(&output.stderr);
            Err(self.classify_failure(command, output.status.code(), &stderr))
        }
    }
}
