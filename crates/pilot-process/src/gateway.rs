use std::{path::PathBuf, process::Stdio, time::Duration};

use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::{Child, Command},
    time::Instant,
};

use crate::{
    CommandRunner, Invocation, InvocationId, ProcessError, STDERR_SNIPPET_CHARS, program_label,
    truncate_chars,
};

/// Time between SIGTERM and SIGKILL when an invocation overruns its deadline.
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(1);

/// Runs invocations as real child processes.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    kill_grace: Duration,
}

impl SystemRunner {
    pub fn new(kill_grace: Duration) -> Self {
        Self { kill_grace }
    }

    pub fn kill_grace(&self) -> Duration {
        self.kill_grace
    }
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new(DEFAULT_KILL_GRACE)
    }
}

impl CommandRunner for SystemRunner {
    fn locate(&self, program: &str) -> Option<PathBuf> {
        crate::locate(program)
    }

    async fn run(&self, invocation: &Invocation) -> Result<String, ProcessError> {
        run_invocation(invocation, self.kill_grace).await
    }
}

async fn run_invocation(inv: &Invocation, kill_grace: Duration) -> Result<String, ProcessError> {
    let (program, args) = inv.argv.split_first().ok_or(ProcessError::EmptyCommand)?;
    let label = program_label(program);
    let id = InvocationId::new();
    let started = Instant::now();

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &inv.cwd {
        cmd.current_dir(dir);
    }
    // Own session, so the child's pid is also the process group id and a
    // timeout can signal everything it started.
    #[cfg(unix)]
    // SAFETY: the hook only calls `setsid`, which is async-signal-safe.
    unsafe {
        cmd.pre_exec(|| {
            if libc::setsid() == -1 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }

    let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
        program: label.clone(),
        source,
    })?;
    tracing::debug!(
        %id,
        program = %label,
        pid = ?child.id(),
        timeout_ms = inv.timeout.as_millis() as u64,
        "spawned external process"
    );

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    // Pipes are drained alongside the wait so a chatty child cannot block on a full pipe.
    let collected = tokio::time::timeout(inv.timeout, async {
        tokio::join!(read_pipe(stdout), read_pipe(stderr), child.wait())
    })
    .await;

    let (stdout, stderr, status) = match collected {
        Ok(v) => v,
        Err(_) => {
            let forced = terminate(&mut child, kill_grace).await;
            tracing::warn!(
                %id,
                program = %label,
                timeout_ms = inv.timeout.as_millis() as u64,
                forced,
                "external process timed out"
            );
            return Err(ProcessError::TimedOut {
                program: label,
                timeout: inv.timeout,
                forced,
            });
        }
    };

    let io_err = |source| ProcessError::Io {
        program: label.clone(),
        source,
    };
    let status = status.map_err(io_err)?;
    let stdout = stdout.map_err(io_err)?;
    let stderr = stderr.map_err(io_err)?;

    tracing::debug!(
        %id,
        program = %label,
        code = ?status.code(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "external process finished"
    );

    if !status.success() {
        return Err(ProcessError::Exited {
            program: label,
            code: status.code(),
            stderr: truncate_chars(&stderr, STDERR_SNIPPET_CHARS),
        });
    }

    Ok(stdout)
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> std::io::Result<String> {
    let Some(mut pipe) = pipe else {
        return Ok(String::new());
    };
    let mut buf = Vec::new();
    pipe.read_to_end(&mut buf).await?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// SIGTERM to the child's process group, then SIGKILL once `grace` has
/// passed. Returns whether the child itself needed SIGKILL.
async fn terminate(child: &mut Child, grace: Duration) -> bool {
    // No pid means the child has already been reaped.
    let Some(pid) = child.id() else {
        return false;
    };

    #[cfg(unix)]
    {
        let pgid = pid as libc::pid_t;
        // SAFETY: `pgid` is the group led by our own unreaped child, so it
        // cannot have been recycled.
        unsafe {
            libc::kill(-pgid, libc::SIGTERM);
        }
        let exited = tokio::time::timeout(grace, child.wait()).await.is_ok();
        // Descendants may outlive the leader; the group id stays reserved
        // while any member is alive.
        // SAFETY: as above.
        unsafe {
            libc::kill(-pgid, libc::SIGKILL);
        }
        if exited {
            return false;
        }
    }

    #[cfg(not(unix))]
    let _ = (pid, grace);

    let _ = child.start_kill();
    let _ = child.wait().await;
    true
}
