#![allow(unsafe_code)]

//! Managed processes and the wrapper that runs them.

use std::collections::HashMap;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use crate::colour::Colour;
use crate::event::{Event, EventKind, EventSink};

/// Something the supervisor can run on its own thread.
///
/// `run` blocks until the process has exited and must report, in order, at
/// most one `Started`, any number of `Line`s, and then exactly one `Stopped`
/// (or a single `SpawnFailed` instead of all of those).
pub trait ChildProcess: Send {
    fn name(&self) -> &str;

    /// Runs to completion. If `ignore_signals` is set, the calling thread
    /// must not receive SIGINT or SIGTERM itself.
    fn run(self: Box<Self>, sink: Box<dyn EventSink>, ignore_signals: bool);
}

/// One declared unit of work: a named shell command line.
#[derive(Clone, Debug)]
pub struct ManagedProcess {
    name: String,
    command: String,
    colour: Option<Colour>,
    quiet: bool,
    env: HashMap<String, String>,
    cwd: Option<PathBuf>,
}

impl ManagedProcess {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            colour: None,
            quiet: false,
            env: HashMap::new(),
            cwd: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub const fn colour(&self) -> Option<Colour> {
        self.colour
    }

    pub const fn is_quiet(&self) -> bool {
        self.quiet
    }

    pub const fn env(&self) -> &HashMap<String, String> {
        &self.env
    }

    pub fn cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    pub fn with_colour(&mut self, colour: Option<Colour>) -> &mut Self {
        self.colour = colour;
        self
    }

    /// Suppresses output lines. Start and stop are still reported.
    pub fn quiet(&mut self, quiet: bool) -> &mut Self {
        self.quiet = quiet;
        self
    }

    /// Variables set for this process on top of the supervisor's own environment.
    pub fn env_vars<I, K, V>(&mut self, vars: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn current_dir(&mut self, cwd: impl Into<PathBuf>) -> &mut Self {
        self.cwd = Some(cwd.into());
        self
    }

    fn event(&self, kind: EventKind) -> Event {
        Event::new(self.name.clone(), self.colour, kind)
    }
}

impl ChildProcess for ManagedProcess {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(self: Box<Self>, sink: Box<dyn EventSink>, ignore_signals: bool) {
        let (mut child, output) = match imp::spawn(&self) {
            Ok(spawned) => spawned,
            Err(err) => {
                warn!("Unable to start {}: {}", self.name, err);
                sink.emit(self.event(EventKind::SpawnFailed {
                    error: err.to_string(),
                }));
                return;
            }
        };

        let pid = child.id();
        debug!("Spawned {} (pid {})", self.name, pid);
        sink.emit(self.event(EventKind::Started { pid }));

        if ignore_signals {
            if let Err(err) = crate::signal::block_on_current_thread() {
                warn!("Unable to block signals for {}: {}", self.name, err);
            }
        }

        let mut reader = BufReader::new(output);
        let mut line = Vec::new();
        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line) {
                Ok(0) => break,
                Ok(_) => {
                    if !self.quiet {
                        sink.emit(self.event(EventKind::Line(line.clone())));
                    }
                }
                Err(ref err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    warn!("Error reading output of {}: {}", self.name, err);
                    break;
                }
            }
        }

        let code = match child.wait() {
            Ok(status) => exit_code(status),
            Err(err) => {
                warn!("Unable to wait for {}: {}", self.name, err);
                -1
            }
        };

        debug!("{} exited with {}", self.name, code);
        sink.emit(self.event(EventKind::Stopped { code }));
    }
}

/// The exit code, or the negated signal number if the process was killed.
pub fn exit_code(status: ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;

        if let Some(sig) = status.signal() {
            return -sig;
        }
    }

    status.code().unwrap_or(-1)
}

#[cfg(unix)]
mod imp {
    use super::ManagedProcess;
    use nix::sys::signal::{pthread_sigmask, SigSet, SigmaskHow};
    use nix::unistd::setsid;
    use std::fs::File;
    use std::io;
    use std::os::fd::OwnedFd;
    use std::os::unix::process::CommandExt;
    use std::process::{Child, Command, Stdio};

    fn from_nix_error(err: nix::Error) -> io::Error {
        io::Error::from_raw_os_error(err as i32)
    }

    /// A pipe with both ends close-on-exec from the moment they exist.
    ///
    /// Other wrapper threads fork concurrently; a write end that one of their
    /// children inherits would hold the pipe open past our child's exit.
    #[cfg(not(any(target_os = "macos", target_os = "ios")))]
    pub fn output_pipe() -> io::Result<(OwnedFd, OwnedFd)> {
        use nix::fcntl::OFlag;

        nix::unistd::pipe2(OFlag::O_CLOEXEC).map_err(from_nix_error)
    }

    /// Apple platforms have no `pipe2`: the flags are set right after creation.
    #[cfg(any(target_os = "macos", target_os = "ios"))]
    pub fn output_pipe() -> io::Result<(OwnedFd, OwnedFd)> {
        use nix::fcntl::{fcntl, FcntlArg, FdFlag};
        use std::os::fd::AsRawFd;

        let (read, write) = nix::unistd::pipe().map_err(from_nix_error)?;
        for fd in &[&read, &write] {
            fcntl(fd.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC)).map_err(from_nix_error)?;
        }
        Ok((read, write))
    }

    /// Starts `sh -c <command>` in a new session, with stdout and stderr both
    /// writing to one pipe. Returns the child and the read end of that pipe.
    pub fn spawn(process: &ManagedProcess) -> io::Result<(Child, File)> {
        let (read, write) = output_pipe()?;
        let write_err = write.try_clone()?;

        // The command owns our copies of the write end; it has to be gone
        // before we read, or the pipe never reaches end of file.
        let child = {
            let mut command = Command::new("sh");
            command
                .arg("-c")
                .arg(process.command())
                .envs(process.env())
                .stdin(Stdio::null())
                .stdout(Stdio::from(File::from(write)))
                .stderr(Stdio::from(File::from(write_err)));

            if let Some(cwd) = process.cwd() {
                command.current_dir(cwd);
            }

            debug!("Assembled command {:?}", command);

            unsafe {
                command.pre_exec(|| {
                    // Signals the supervisor blocks must not stay blocked in the child.
                    pthread_sigmask(SigmaskHow::SIG_SETMASK, Some(&SigSet::empty()), None)
                        .map_err(from_nix_error)?;
                    setsid().map_err(from_nix_error).map(|_| ())
                });
            }

            command.spawn()?
        };

        Ok((child, File::from(read)))
    }
}
