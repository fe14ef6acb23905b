//! The commands behind the `procmux` binary.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command as ShellCommand, Stdio};

use crate::cli::{Args, Command};
use crate::config::ConfigBuilder;
use crate::environ::{self, Expansion};
use crate::error::{Error, Result};
use crate::printer::Printer;
use crate::procfile::Procfile;
use crate::process;
use crate::signal::{ShutdownSignal, SignalBridge};
use crate::supervisor::Supervisor;

pub fn init_logger(verbose: bool) {
    let mut log_builder = env_logger::Builder::new();
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };

    log_builder
        .format(|buf, r| writeln!(buf, "*** {}", r.args()))
        .filter(None, level);

    if let Ok(filters) = std::env::var("RUST_LOG") {
        log_builder.parse_filters(&filters);
    }

    log_builder.init();
}

/// Runs the selected command. Returns the exit status for the binary.
pub fn run(args: Args) -> Result<i32> {
    init_logger(args.verbose);
    debug!("Arguments: {:?}", args);

    let root = app_root(&args);
    match args.command {
        Command::Check => {
            check(&args.procfile, &mut io::stdout())?;
            Ok(0)
        }
        Command::Start {
            ref processes,
            port,
            ref concurrency,
            ref quiet,
            grace_period,
            colour,
        } => {
            let procfile = load_procfile(&args.procfile)?.select(processes)?;
            let expansion = Expansion {
                concurrency: match concurrency {
                    Some(desc) => environ::parse_concurrency(desc)?,
                    None => Default::default(),
                },
                env: load_env(&root, &args.env_files)?,
                quiet: quiet.clone(),
                port: Some(port),
            };

            let config = ConfigBuilder::default()
                .grace_period(grace_period)
                .build()?;
            let mut supervisor = Supervisor::new(config, Printer::stdout(colour));
            for params in environ::expand_processes(&procfile, &expansion)? {
                supervisor
                    .register(params.name, params.cmd)?
                    .quiet(params.quiet)
                    .env_vars(params.env)
                    .current_dir(&root);
            }

            supervisor.run()?;
            Ok(exit_status(supervisor.returncode().unwrap_or(0)))
        }
        Command::Run { ref command } => {
            let env = load_env(&root, &args.env_files)?;
            run_command(&command.join(" "), &env, &root)
        }
    }
}

/// Maps a returncode to a process exit status: a child killed by signal N
/// (returncode `-N`) becomes `128 + N`, as a shell would report it.
pub fn exit_status(returncode: i32) -> i32 {
    if returncode < 0 {
        128 - returncode
    } else {
        returncode
    }
}

fn app_root(args: &Args) -> PathBuf {
    if let Some(root) = &args.app_root {
        return root.clone();
    }

    match args.procfile.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn load_env(root: &Path, files: &[PathBuf]) -> Result<BTreeMap<String, String>> {
    let paths: Vec<PathBuf> = files.iter().map(|f| root.join(f)).collect();
    environ::load_env_files(&paths)
}

/// Loads a Procfile, which must define at least one process.
pub fn load_procfile(path: &Path) -> Result<Procfile> {
    let procfile = Procfile::load(path).map_err(|err| match err {
        Error::Io(ref e) if e.kind() == io::ErrorKind::NotFound => Error::Config(format!(
            "Procfile {} does not exist or is not a file",
            path.display()
        )),
        other => other,
    })?;

    if procfile.is_empty() {
        return Err(Error::NoProcesses);
    }

    Ok(procfile)
}

/// Validates the Procfile and reports the process types it defines.
pub fn check(path: &Path, out: &mut impl Write) -> Result<()> {
    let procfile = load_procfile(path)?;
    writeln!(
        out,
        "Valid procfile detected ({})",
        procfile.names().collect::<Vec<_>>().join(", ")
    )?;
    Ok(())
}

/// Runs one command through the shell with the given environment, in the
/// foreground. SIGINT and SIGTERM sent to us are passed on to it.
pub fn run_command(command: &str, env: &BTreeMap<String, String>, cwd: &Path) -> Result<i32> {
    debug!("Running {:?} in {:?}", command, cwd);
    let mut child = ShellCommand::new("sh")
        .arg("-c")
        .arg(command)
        .envs(env)
        .current_dir(cwd)
        .stdin(Stdio::inherit())
        .spawn()?;

    let pid = child.id();
    let _bridge = match SignalBridge::install(move |sig| forward(pid, sig)) {
        Ok(bridge) => Some(bridge),
        Err(err) => {
            warn!("Not forwarding signals to {}: {}", pid, err);
            None
        }
    };

    let status = child.wait()?;
    Ok(exit_status(process::exit_code(status)))
}

fn forward(pid: u32, signal: ShutdownSignal) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let sig = match signal {
        ShutdownSignal::Interrupt => Signal::SIGINT,
        ShutdownSignal::Terminate => Signal::SIGTERM,
    };

    debug!("Forwarding {} to {}", signal, pid);
    if let Err(err) = kill(Pid::from_raw(pid as i32), sig) {
        warn!("Unable to forward {} to {}: {}", signal, pid, err);
    }
}
