// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Persistent sandbox shell inside a project-mounted container.
//!
//! One interactive bash runs for the whole session; each `run` writes a
//! single framed command line and waits on its slot.  The container engine
//! is driven through the `podman` CLI so the same code works against a local
//! daemonless podman, a podman machine, or a remote socket via
//! `CONTAINER_HOST`.

use std::borrow::Cow;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use asimi_config::{ContainerConfig, Mount, RunInShellConfig};

use crate::{
    frame::{reader_loop, SlotTable},
    host::{HostPolicy, HostShellRunner},
    runner::{CommandResult, HarnessError, ShellRunner},
    TIMEOUT_EXIT_CODE,
};

/// Shell prelude written once per attachment.  Defines the framing function
/// and silences everything that could pollute framed output.  Idempotent, so
/// re-attachment after a restart is safe even when the image bashrc already
/// carries the same definitions.
const PRELUDE: &str = r#"export TERM=dumb
set +m
PS1=''
__asimi_run() {
  local __id="$1"; shift
  printf '__ASIMI_STDOUT_START:%s\n' "$__id"
  ( eval "$1" ) 2>&1
  printf '__ASIMI_STDOUT_END:%s:%s\n' "$__id" "$?"
}
"#;

/// Candidate engine sockets, probed in order: macOS user socket, the
/// already-configured default, Linux user socket, system socket.
fn engine_socket() -> Option<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        let mac = home.join(".local/share/containers/podman/machine/podman.sock");
        if mac.exists() {
            return Some(mac);
        }
    }
    if std::env::var_os("CONTAINER_HOST").is_some() {
        return None; // default already configured
    }
    if let Ok(xdg) = std::env::var("XDG_RUNTIME_DIR") {
        let user = PathBuf::from(xdg).join("podman/podman.sock");
        if user.exists() {
            return Some(user);
        }
    }
    let system = PathBuf::from("/run/podman/podman.sock");
    if system.exists() {
        return Some(system);
    }
    None
}

fn quote(s: &str) -> Cow<'_, str> {
    shell_escape::escape(Cow::Borrowed(s))
}

struct Attachment {
    child: Child,
    stdin: ChildStdin,
}

pub struct PodmanShellRunner {
    container_name: String,
    image: String,
    project_root: PathBuf,
    worktree: Option<PathBuf>,
    extra_mounts: Vec<Mount>,
    timeout: Duration,
    no_cleanup: bool,
    /// Attachment state; a mutex because `restart` may race a caller.
    attachment: Mutex<Option<Attachment>>,
    slots: Arc<SlotTable>,
    next_id: AtomicU64,
    /// Set once the container is known to be running.
    started: AtomicBool,
    /// Host fallback when container setup fails and the config allows it.
    fallback: Option<Arc<HostShellRunner>>,
    fell_back: AtomicBool,
}

impl PodmanShellRunner {
    pub fn new(
        project_root: PathBuf,
        worktree: Option<PathBuf>,
        shell_cfg: &RunInShellConfig,
        container_cfg: &ContainerConfig,
    ) -> Self {
        let fallback = shell_cfg.allow_host_fallback.then(|| {
            Arc::new(HostShellRunner::new(HostPolicy::default()))
        });
        // Container name derived from the project root so parallel projects
        // do not collide; the pid keeps concurrent sessions apart.
        let slug: String = project_root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "project".into())
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect();
        Self {
            container_name: format!("asimi-{}-{}", slug, std::process::id()),
            image: container_cfg.image_name.clone(),
            project_root,
            worktree,
            extra_mounts: container_cfg.additional_mounts.clone(),
            timeout: Duration::from_secs(shell_cfg.timeout_minutes * 60),
            no_cleanup: shell_cfg.no_cleanup,
            attachment: Mutex::new(None),
            slots: Arc::new(SlotTable::default()),
            next_id: AtomicU64::new(1),
            started: AtomicBool::new(false),
            fallback,
            fell_back: AtomicBool::new(false),
        }
    }

    /// A `podman` command with `CONTAINER_HOST` pointed at the probed socket.
    fn podman(&self) -> Command {
        let mut cmd = Command::new("podman");
        if let Some(sock) = engine_socket() {
            cmd.env("CONTAINER_HOST", format!("unix://{}", sock.display()));
        }
        cmd.stdin(Stdio::null());
        cmd
    }

    async fn podman_ok(&self, args: &[&str]) -> Result<bool, HarnessError> {
        let status = self.podman().args(args).stdout(Stdio::null()).stderr(Stdio::null()).status().await?;
        Ok(status.success())
    }

    async fn podman_checked(&self, args: &[&str]) -> Result<(), HarnessError> {
        let out = self.podman().args(args).output().await?;
        if out.status.success() {
            Ok(())
        } else {
            Err(HarnessError::Setup(format!(
                "podman {} failed: {}",
                args.first().unwrap_or(&""),
                String::from_utf8_lossy(&out.stderr).trim()
            )))
        }
    }

    /// Ensure the image is present and the container is running.
    async fn ensure_started(&self) -> Result<(), HarnessError> {
        if self.started.load(Ordering::Acquire) {
            return Ok(());
        }
        if !self.podman_ok(&["image", "exists", &self.image]).await? {
            info!(image = %self.image, "pulling sandbox image");
            self.podman_checked(&["pull", &self.image]).await?;
        }

        let root = self.project_root.to_string_lossy().to_string();
        let mut args: Vec<String> = vec![
            "run".into(),
            "-d".into(),
            "--name".into(),
            self.container_name.clone(),
            "-v".into(),
            format!("{root}:{root}"),
            "-w".into(),
            root.clone(),
        ];
        for m in &self.extra_mounts {
            args.push("-v".into());
            args.push(format!("{}:{}", m.source, m.destination));
        }
        args.push(self.image.clone());
        args.push("sleep".into());
        args.push("infinity".into());
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.podman_checked(&arg_refs).await?;
        self.started.store(true, Ordering::Release);
        info!(container = %self.container_name, "sandbox container started");
        Ok(())
    }

    /// Attach an interactive bash if not already attached, spawn the reader,
    /// and send the prelude plus the two setup commands.
    async fn ensure_attached(
        &self,
        attachment: &mut Option<Attachment>,
    ) -> Result<(), HarnessError> {
        if attachment.is_some() {
            return Ok(());
        }
        self.ensure_started().await?;

        let mut child = self
            .podman()
            .args(["exec", "-i", &self.container_name, "bash", "-i"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;
        let mut stdin = child.stdin.take().ok_or(HarnessError::ReaderGone)?;
        let stdout = child.stdout.take().ok_or(HarnessError::ReaderGone)?;

        let slots = Arc::clone(&self.slots);
        tokio::spawn(async move {
            reader_loop(stdout, &slots).await;
        });

        stdin.write_all(PRELUDE.as_bytes()).await?;
        // Prelude commands, unframed: output before the first START marker
        // is discarded by the reader.
        stdin
            .write_all(b"git config --global core.pager cat\n")
            .await?;
        let cwd = self.worktree.as_ref().unwrap_or(&self.project_root);
        stdin
            .write_all(format!("cd {}\n", quote(&cwd.to_string_lossy())).as_bytes())
            .await?;
        stdin.flush().await?;

        *attachment = Some(Attachment { child, stdin });
        debug!("sandbox shell attached");
        Ok(())
    }

    async fn run_sandboxed(&self, command: &str) -> Result<CommandResult, HarnessError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let ready = self.slots.register(id);

        {
            let mut attachment = self.attachment.lock().await;
            if let Err(e) = self.ensure_attached(&mut attachment).await {
                self.slots.remove(id);
                return Err(e);
            }
            let att = attachment.as_mut().expect("attached above");
            // Single-quoted argument survives embedded newlines (heredocs)
            // and cannot grow redirections of its own.
            let line = format!("__asimi_run {id} {}\n", quote(command));
            if let Err(e) = att.stdin.write_all(line.as_bytes()).await {
                self.slots.remove(id);
                return Err(e.into());
            }
            if let Err(e) = att.stdin.flush().await {
                self.slots.remove(id);
                return Err(e.into());
            }
        }

        match tokio::time::timeout(self.timeout, ready).await {
            Ok(Ok(())) => {
                let (output, exit_code) = self.slots.take(id).ok_or(HarnessError::ReaderGone)?;
                Ok(CommandResult::new(output, exit_code))
            }
            Ok(Err(_)) => Err(HarnessError::ReaderGone),
            Err(_) => {
                self.slots.remove(id);
                Ok(CommandResult::new(
                    format!(
                        "command timed out after {} minutes",
                        self.timeout.as_secs() / 60
                    ),
                    TIMEOUT_EXIT_CODE,
                ))
            }
        }
    }
}

#[async_trait]
impl ShellRunner for PodmanShellRunner {
    async fn run(&self, command: &str) -> Result<CommandResult, HarnessError> {
        if self.fell_back.load(Ordering::Acquire) {
            let fb = self.fallback.as_ref().expect("fell_back implies fallback");
            return fb.run(command).await;
        }
        match self.run_sandboxed(command).await {
            Err(HarnessError::Setup(reason)) if self.fallback.is_some() => {
                warn!(%reason, "container setup failed; falling back to host shell");
                self.fell_back.store(true, Ordering::Release);
                self.fallback.as_ref().unwrap().run(command).await
            }
            other => other,
        }
    }

    /// Drop the attachment and fail all in-flight slots.  The container keeps
    /// running; the next `run` re-attaches.
    async fn restart(&self) {
        let mut attachment = self.attachment.lock().await;
        if let Some(mut att) = attachment.take() {
            let _ = att.child.start_kill();
        }
        self.slots.fail_all();
        debug!("sandbox shell restarted");
    }

    /// Stop the container with a 5-second grace and remove it, unless
    /// `no_cleanup` asked to keep it for inspection.
    async fn close(&self) {
        self.restart().await;
        if !self.started.load(Ordering::Acquire) {
            return;
        }
        let _ = self
            .podman_ok(&["stop", "-t", "5", &self.container_name])
            .await;
        if !self.no_cleanup {
            let _ = self.podman_ok(&["rm", "-f", &self.container_name]).await;
        }
        self.started.store(false, Ordering::Release);
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn runner() -> PodmanShellRunner {
        PodmanShellRunner::new(
            PathBuf::from("/tmp/proj"),
            None,
            &RunInShellConfig::default(),
            &ContainerConfig::default(),
        )
    }

    #[test]
    fn container_name_is_project_scoped() {
        let r = runner();
        assert!(r.container_name.starts_with("asimi-proj-"));
    }

    #[test]
    fn command_line_is_single_quoted() {
        let cmd = "echo 'it works' > out.txt";
        let line = format!("__asimi_run 3 {}\n", quote(cmd));
        // The payload must arrive as ONE argument: quoting wraps it and
        // escapes the embedded single quotes.
        assert!(line.starts_with("__asimi_run 3 '"));
        assert!(line.contains(r"'\''"));
    }

    #[test]
    fn quoting_preserves_newlines_for_heredocs() {
        let cmd = "cat <<'EOF' > f\nline1\nline2\nEOF";
        let quoted = quote(cmd);
        assert!(quoted.contains('\n'), "newlines must survive quoting");
    }

    #[test]
    fn prelude_defines_framing_function() {
        assert!(PRELUDE.contains("__asimi_run()"));
        assert!(PRELUDE.contains("__ASIMI_STDOUT_START"));
        assert!(PRELUDE.contains("__ASIMI_STDOUT_END"));
        assert!(PRELUDE.contains("TERM=dumb"));
        assert!(PRELUDE.contains("set +m"));
    }

    #[test]
    fn ids_are_monotonic() {
        let r = runner();
        let a = r.next_id.fetch_add(1, Ordering::Relaxed);
        let b = r.next_id.fetch_add(1, Ordering::Relaxed);
        assert!(b > a);
    }

    #[tokio::test]
    async fn restart_without_attachment_is_a_noop() {
        let r = runner();
        r.restart().await; // must not panic or deadlock
        assert!(r.attachment.lock().await.is_none());
    }
}
