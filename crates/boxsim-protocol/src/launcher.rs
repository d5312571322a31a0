//! Spawning and terminating the external simulator.
//!
//! [`Launcher`] is the seam between a session and the process it talks to.
//! [`CommandLauncher`] runs the real simulator as
//! `<program> -cp <artifact> <entry> <port>` in a fresh process group so the
//! whole group (including any JVM helpers) can be signalled at teardown.

use std::io;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use boxsim_core::config::ComConfig;
use thiserror::Error;
use tracing::{debug, info, warn};

/// How long a terminated process group gets to exit before it is killed.
const TERMINATE_GRACE: Duration = Duration::from_secs(2);
const REAP_POLL: Duration = Duration::from_millis(20);

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("simulator artifact not found: {}", .0.display())]
    MissingArtifact(PathBuf),

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("launcher failed: {0}")]
    Other(String),
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// A running simulator.
pub trait SimHandle: Send {
    /// OS process id, if the simulator is a child process.
    fn id(&self) -> Option<u32>;

    /// Stop the simulator and release its resources. Idempotent.
    fn terminate(&mut self) -> io::Result<()>;
}

/// Starts a simulator listening on a localhost port.
pub trait Launcher: Send {
    fn launch(&self, port: u16) -> Result<Box<dyn SimHandle>, LaunchError>;
}

// ---------------------------------------------------------------------------
// CommandLauncher
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLauncher {
    pub program: String,
    pub artifact: PathBuf,
    pub entry: String,
    pub forward_output: bool,
}

impl CommandLauncher {
    pub fn new(program: impl Into<String>, artifact: impl Into<PathBuf>, entry: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            artifact: artifact.into(),
            entry: entry.into(),
            forward_output: false,
        }
    }

    pub fn from_config(com: &ComConfig) -> Self {
        Self {
            program: com.program.clone(),
            artifact: com.artifact.clone(),
            entry: com.entry().to_string(),
            forward_output: com.forward_output,
        }
    }

    #[must_use]
    pub const fn forward_output(mut self, forward: bool) -> Self {
        self.forward_output = forward;
        self
    }

    /// The command that would be spawned for `port`.
    pub fn command(&self, port: u16) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-cp")
            .arg(&self.artifact)
            .arg(&self.entry)
            .arg(port.to_string())
            .stdin(Stdio::null());
        if self.forward_output {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        } else {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        cmd
    }
}

impl Launcher for CommandLauncher {
    fn launch(&self, port: u16) -> Result<Box<dyn SimHandle>, LaunchError> {
        if !self.artifact.exists() {
            return Err(LaunchError::MissingArtifact(self.artifact.clone()));
        }
        let child = self
            .command(port)
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        info!(pid = child.id(), port, entry = %self.entry, "simulator launched");
        Ok(Box::new(ChildHandle::new(child)))
    }
}

// ---------------------------------------------------------------------------
// ChildHandle
// ---------------------------------------------------------------------------

/// A simulator child process leading its own process group.
///
/// The group id is kept apart from the child so the group can still be
/// signalled after the leader has exited.
#[derive(Debug)]
struct ChildHandle {
    child: Option<Child>,
    pgid: u32,
}

impl ChildHandle {
    fn new(child: Child) -> Self {
        Self {
            pgid: child.id(),
            child: Some(child),
        }
    }

    /// Signal every process in the group. `None` only checks that the group
    /// exists. Returns `false` once the group is gone.
    #[cfg(unix)]
    fn signal_group(&self, signal: Option<nix::sys::signal::Signal>) -> io::Result<bool> {
        use nix::errno::Errno;
        use nix::sys::signal::killpg;
        use nix::unistd::Pid;

        let pgid = i32::try_from(self.pgid)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pgid out of range"))?;
        match killpg(Pid::from_raw(pgid), signal) {
            Ok(()) => Ok(true),
            Err(Errno::ESRCH) => Ok(false),
            Err(e) => Err(io::Error::from(e)),
        }
    }

    #[cfg(unix)]
    fn stop(&self, child: &mut Child) -> io::Result<()> {
        use nix::sys::signal::Signal;

        if !self.signal_group(Some(Signal::SIGTERM))? {
            child.try_wait()?;
            return Ok(());
        }

        // The leader must be reaped before the group can disappear.
        let deadline = Instant::now() + TERMINATE_GRACE;
        while Instant::now() < deadline {
            if child.try_wait()?.is_some() && !self.signal_group(None)? {
                debug!(pgid = self.pgid, "simulator process group exited");
                return Ok(());
            }
            thread::sleep(REAP_POLL);
        }
        warn!(pgid = self.pgid, "simulator group ignored SIGTERM, killing");
        self.signal_group(Some(Signal::SIGKILL))?;
        child.wait()?;
        Ok(())
    }

    #[cfg(not(unix))]
    #[allow(clippy::unused_self)]
    fn stop(&self, child: &mut Child) -> io::Result<()> {
        if child.try_wait()?.is_none() {
            child.kill()?;
        }
        child.wait()?;
        Ok(())
    }
}

impl SimHandle for ChildHandle {
    fn id(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    fn terminate(&mut self) -> io::Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        self.stop(&mut child)
    }
}

impl Drop for ChildHandle {
    fn drop(&mut self) {
        if let Err(e) = self.terminate() {
            warn!(error = %e, "failed to terminate simulator");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_artifact_fails_before_spawning() {
        let launcher = CommandLauncher::new("java", "/nonexistent/interact.jar", "Main");
        let err = launcher.launch(4000).err().unwrap();
        assert!(matches!(err, LaunchError::MissingArtifact(_)));
        assert_eq!(
            err.to_string(),
            "simulator artifact not found: /nonexistent/interact.jar"
        );
    }

    #[test]
    fn command_line_layout() {
        let launcher = CommandLauncher::from_config(&ComConfig::default());
        let cmd = launcher.command(5123);
        assert_eq!(cmd.get_program(), "java");
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            ["-cp", "interact.jar", "experiments.interact.StandAlone", "5123"]
        );
    }

    #[test]
    fn visual_entry_is_selected() {
        let com = ComConfig {
            visual: true,
            ..ComConfig::default()
        };
        assert_eq!(
            CommandLauncher::from_config(&com).entry,
            "experiments.interact.ProcSketch"
        );
    }

    #[cfg(unix)]
    fn shell_script(name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = std::env::temp_dir().join(format!("boxsim-{name}-{}.sh", std::process::id()));
        std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn terminate_stops_process_group() {
        let script = shell_script("fake-sim", "sleep 30 &\nwait\n");

        let launcher = CommandLauncher::new(script.to_string_lossy(), &script, "Main");
        let mut handle = launcher.launch(4000).unwrap();
        assert!(handle.id().is_some());

        let start = Instant::now();
        handle.terminate().unwrap();
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(handle.id().is_none());
        handle.terminate().unwrap();

        std::fs::remove_file(&script).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn terminate_reaches_group_after_leader_exit() {
        let marker =
            std::env::temp_dir().join(format!("boxsim-orphan-{}.done", std::process::id()));
        let _ = std::fs::remove_file(&marker);
        let body = format!("(sleep 2; touch '{}') &\nexit 0\n", marker.display());
        let script = shell_script("leader-exits", &body);

        let launcher = CommandLauncher::new(script.to_string_lossy(), &script, "Main");
        let mut handle = launcher.launch(4000).unwrap();
        thread::sleep(Duration::from_millis(500));
        handle.terminate().unwrap();

        thread::sleep(Duration::from_secs(3));
        assert!(!marker.exists(), "group member outlived terminate");

        std::fs::remove_file(&script).unwrap();
    }
}
