use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use clap::{App, AppSettings, Arg, ArgMatches, Error, ErrorKind, SubCommand};

use crate::config::DEFAULT_GRACE_PERIOD;

/// Port given to the first instance of the first process type.
pub const DEFAULT_PORT: u16 = 5000;

#[derive(Debug)]
pub struct Args {
    pub procfile: PathBuf,
    pub app_root: Option<PathBuf>,
    pub env_files: Vec<PathBuf>,
    pub verbose: bool,
    pub command: Command,
}

#[derive(Debug)]
pub enum Command {
    /// Validate the Procfile.
    Check,
    /// Run the Procfile's processes together.
    Start {
        processes: Vec<String>,
        port: u16,
        concurrency: Option<String>,
        quiet: Vec<String>,
        grace_period: Duration,
        colour: bool,
    },
    /// Run a single command in the application's environment.
    Run { command: Vec<String> },
}

fn app() -> App<'static, 'static> {
    App::new("procmux")
        .version(crate_version!())
        .about("Manage Procfile-based applications")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .setting(AppSettings::VersionlessSubcommands)
        .arg(Arg::with_name("procfile")
            .help("Procfile path [default: Procfile]")
            .short("f")
            .long("procfile")
            .takes_value(true)
            .value_name("FILE")
            .global(true))
        .arg(Arg::with_name("app-root")
            .help("Directory processes run in [default: the Procfile's directory]")
            .short("d")
            .long("app-root")
            .takes_value(true)
            .value_name("DIR")
            .global(true))
        .arg(Arg::with_name("env")
            .help("Comma-separated list of env files to load [default: .env]")
            .short("e")
            .long("env")
            .takes_value(true)
            .value_name("FILES")
            .global(true))
        .arg(Arg::with_name("verbose")
            .help("Print debugging messages to stderr")
            .short("v")
            .long("verbose")
            .global(true))
        .subcommand(SubCommand::with_name("check")
            .about("Validate your application's Procfile"))
        .subcommand(SubCommand::with_name("start")
            .about("Start the application (or specific PROCESS types)")
            .arg(Arg::with_name("port")
                .help("Port of the first process [default: 5000]")
                .short("p")
                .long("port")
                .takes_value(true)
                .value_name("PORT"))
            .arg(Arg::with_name("concurrency")
                .help("Number of each process type to run, as process=num,process=num")
                .short("c")
                .long("concurrency")
                .takes_value(true)
                .value_name("SPEC"))
            .arg(Arg::with_name("quiet")
                .help("Comma-separated list of process types to hide the output of")
                .short("q")
                .long("quiet")
                .takes_value(true)
                .value_name("PROCESSES"))
            .arg(Arg::with_name("grace")
                .help("Seconds to wait for processes to exit before killing them [default: 5]")
                .short("g")
                .long("grace")
                .takes_value(true)
                .value_name("SECONDS"))
            .arg(Arg::with_name("no-colour")
                .help("Disable coloured output")
                .long("no-colour")
                .alias("no-color"))
            .arg(Arg::with_name("process")
                .help("Process types to start; all of them if omitted")
                .multiple(true)))
        .subcommand(SubCommand::with_name("run")
            .about("Run a command using your application's environment")
            .setting(AppSettings::TrailingVarArg)
            .arg(Arg::with_name("command")
                .help("Command to run")
                .multiple(true)
                .required(true)))
}

/// Parses the process arguments, exiting with usage on error.
pub fn get_args() -> Args {
    get_args_from(std::env::args_os()).unwrap_or_else(|e| e.exit())
}

pub fn get_args_from<I, T>(argv: I) -> Result<Args, Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let args = app().get_matches_from_safe(argv)?;
    let (name, sub) = args.subcommand();

    // Global options given after the subcommand only land in its matches.
    let global = |option: &str| {
        sub.and_then(|s| s.value_of(option))
            .or_else(|| args.value_of(option))
            .map(String::from)
    };

    let command = match (name, sub) {
        ("check", _) => Command::Check,
        ("start", Some(sub)) => start_command(sub)?,
        ("run", Some(sub)) => Command::Run {
            command: values_t!(sub.values_of("command"), String)?,
        },
        _ => {
            return Err(Error::with_description(
                "a subcommand is required",
                ErrorKind::MissingSubcommand,
            ))
        }
    };

    let env_files = global("env")
        .unwrap_or_else(|| ".env".into())
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(PathBuf::from)
        .collect();

    Ok(Args {
        procfile: PathBuf::from(global("procfile").unwrap_or_else(|| "Procfile".into())),
        app_root: global("app-root").map(PathBuf::from),
        env_files,
        verbose: args.is_present("verbose") || sub.map_or(false, |s| s.is_present("verbose")),
        command,
    })
}

fn start_command(args: &ArgMatches) -> Result<Command, Error> {
    let port = if args.is_present("port") {
        value_t!(args.value_of("port"), u16)?
    } else {
        DEFAULT_PORT
    };

    let grace_period = if args.is_present("grace") {
        Duration::from_secs(value_t!(args.value_of("grace"), u64)?)
    } else {
        DEFAULT_GRACE_PERIOD
    };

    let quiet: Vec<String> = args
        .value_of("quiet")
        .map(|q| {
            q.split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    Ok(Command::Start {
        processes: values_t!(args.values_of("process"), String).unwrap_or_default(),
        port,
        concurrency: args.value_of("concurrency").map(String::from),
        quiet,
        grace_period,
        colour: !args.is_present("no-colour"),
    })
}
