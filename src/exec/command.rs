// src/exec/command.rs

//! Shell command bodies.

use std::process::Stdio;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::target::{BodyFuture, TargetBody, TargetContext};

/// Build a shell command appropriate for the platform.
fn shell(cmd: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    }
}

/// Run `cmd` in the build root with the target environment.
///
/// stdout lines are logged at `info`, stderr at `debug`. Returns the exit
/// code (`-1` when killed by a signal).
pub async fn run_shell(cmd: &str, ctx: &TargetContext) -> Result<i32> {
    let mut command = shell(cmd);
    command
        .current_dir(ctx.build().root_dir())
        .envs(ctx.env_vars())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .with_context(|| format!("spawning `{cmd}` for target '{}'", ctx.target()))?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let out_task = stdout.map(|stdout| {
        let target = ctx.target().to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                info!(target_name = %target, "{}", line);
            }
        })
    });

    // Always consume stderr so buffers don't fill.
    let err_task = stderr.map(|stderr| {
        let target = ctx.target().to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(target_name = %target, "stderr: {}", line);
            }
        })
    });

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for `{cmd}` of target '{}'", ctx.target()))?;

    for task in [out_task, err_task].into_iter().flatten() {
        let _ = task.await;
    }

    Ok(status.code().unwrap_or(-1))
}

/// Body that runs a shell command and fails on a non-zero exit code.
#[derive(Debug, Clone)]
pub struct CommandBody {
    cmd: String,
}

impl CommandBody {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self { cmd: cmd.into() }
    }
}

impl TargetBody for CommandBody {
    fn execute<'a>(&'a self, ctx: &'a TargetContext) -> BodyFuture<'a> {
        Box::pin(async move {
            info!(target_name = %ctx.target(), cmd = %self.cmd, "running command");
            let code = run_shell(&self.cmd, ctx).await?;
            if code != 0 {
                bail!("command `{}` exited with code {}", self.cmd, code);
            }
            Ok(())
        })
    }

    fn describe(&self) -> Option<String> {
        Some(self.cmd.clone())
    }
}
