use std::{error::Error as StdError, fmt, io, path::PathBuf};

pub type Result<T> = ::std::result::Result<T, Error>;

pub enum Error {
    AlreadyRan,
    Config(String),
    DuplicateProcess(String),
    EnvFile(PathBuf, io::Error),
    Io(io::Error),
    #[cfg(unix)]
    Nix(nix::Error),
    NoProcesses,
    Procfile { line: usize, reason: String },
}

impl StdError for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

#[cfg(unix)]
impl From<nix::Error> for Error {
    fn from(err: nix::Error) -> Self {
        Error::Nix(err)
    }
}

impl From<String> for Error {
    fn from(err: String) -> Self {
        Error::Config(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} error: {}",
            match self {
                Error::AlreadyRan => "Supervisor",
                Error::Config(_) => "Config",
                Error::DuplicateProcess(_) => "Process",
                Error::EnvFile(_, _) => "Env",
                Error::Io(_) => "I/O",
                #[cfg(unix)]
                Error::Nix(_) => "System",
                Error::NoProcesses => "Procfile",
                Error::Procfile { .. } => "Procfile",
            },
            match self {
                Error::AlreadyRan => "processes have already been run".to_string(),
                Error::Config(msg) => msg.clone(),
                Error::DuplicateProcess(name) => {
                    format!("a process named '{}' is already registered", name)
                }
                Error::EnvFile(path, err) => {
                    format!("couldn't read '{}':\n{}", path.display(), err)
                }
                Error::Io(err) => format!("{}", err),
                #[cfg(unix)]
                Error::Nix(err) => format!("{}", err),
                Error::NoProcesses => "no processes defined".to_string(),
                Error::Procfile { line, reason } => format!("line {}: {}", line, reason),
            }
        )
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
