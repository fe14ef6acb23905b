//! Environment files and expansion of process types into process instances.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::Path;

use regex::Regex;

use crate::error::{Error, Result};
use crate::procfile::Procfile;

/// Parses `.env` contents: `KEY=value` lines.
///
/// Single-quoted values are taken literally, double-quoted values have
/// backslash escapes removed. An `export ` prefix is allowed. Anything else
/// is skipped.
pub fn parse_env(contents: &str) -> BTreeMap<String, String> {
    contents
        .lines()
        .filter_map(|line| ENV_LINE.captures(line))
        .map(|captures| (captures[1].to_string(), unquote(&captures[2])))
        .collect()
}

lazy_static! {
    static ref ENV_LINE: Regex = Regex::new(r"^\s*(?:export\s+)?([A-Za-z0-9_]+)=(.*)$").expect("valid regex");
    static ref SINGLE_QUOTED: Regex = Regex::new(r"^'(.*)'$").expect("valid regex");
    static ref DOUBLE_QUOTED: Regex = Regex::new(r#"^"(.*)"$"#).expect("valid regex");
    static ref ESCAPE: Regex = Regex::new(r"\\(.)").expect("valid regex");
}

fn unquote(value: &str) -> String {
    if let Some(captures) = SINGLE_QUOTED.captures(value) {
        return captures[1].to_string();
    }

    if let Some(captures) = DOUBLE_QUOTED.captures(value) {
        return ESCAPE.replace_all(&captures[1], "$1").into_owned();
    }

    value.trim_end().to_string()
}

/// Reads and merges env files in order; later files win. Missing files are skipped.
pub fn load_env_files<P: AsRef<Path>>(paths: &[P]) -> Result<BTreeMap<String, String>> {
    let mut env = BTreeMap::new();
    for path in paths {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => {
                debug!("Loaded env file {:?}", path);
                env.extend(parse_env(&contents));
            }
            Err(ref err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("No env file at {:?}", path);
            }
            Err(err) => return Err(Error::EnvFile(path.to_path_buf(), err)),
        }
    }

    Ok(env)
}

/// Parses `web=2,worker=3` into per-process-type instance counts.
pub fn parse_concurrency(desc: &str) -> Result<HashMap<String, usize>> {
    let mut result = HashMap::new();
    for item in desc.split(',').map(str::trim).filter(|i| !i.is_empty()) {
        let (name, count) = match item.find('=') {
            Some(eq) => (&item[..eq], &item[eq + 1..]),
            None => {
                return Err(Error::Config(format!(
                    "invalid concurrency '{}', expected name=count",
                    item
                )))
            }
        };

        let count = count
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("invalid concurrency count in '{}'", item)))?;
        result.insert(name.trim().to_string(), count);
    }

    Ok(result)
}

/// One concrete process to run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessParams {
    pub name: String,
    pub cmd: String,
    pub quiet: bool,
    pub env: BTreeMap<String, String>,
}

/// How to turn process types into instances.
#[derive(Clone, Debug, Default)]
pub struct Expansion {
    /// Instances per process type; types not listed get one.
    pub concurrency: HashMap<String, usize>,
    /// Environment shared by every instance.
    pub env: BTreeMap<String, String>,
    /// Process types whose output is suppressed.
    pub quiet: Vec<String>,
    /// Base port. A `PORT` in `env` takes precedence.
    pub port: Option<u16>,
}

/// Expands each process type of the Procfile into numbered instances.
///
/// `web` with a concurrency of 2 becomes `web.1` and `web.2`. When a port is
/// known, instance `i` of a type gets `PORT=base+i`, and the base moves up by
/// 100 for every process type.
pub fn expand_processes(procfile: &Procfile, expansion: &Expansion) -> Result<Vec<ProcessParams>> {
    let mut port = match expansion.env.get("PORT") {
        Some(p) => Some(
            p.parse::<u32>()
                .map_err(|_| Error::Config(format!("invalid PORT '{}'", p)))?,
        ),
        None => expansion.port.map(u32::from),
    };

    if let Some(p) = port {
        if p % 1000 != 0 {
            return Err(Error::Config(format!("port must be a multiple of 1000, got {}", p)));
        }
    }

    let mut out = Vec::new();
    for (name, cmd) in procfile.iter() {
        let count = expansion.concurrency.get(name).copied().unwrap_or(1);
        for i in 0..count {
            let mut env = expansion.env.clone();
            if let Some(p) = port {
                env.insert("PORT".to_string(), (p + i as u32).to_string());
            }

            out.push(ProcessParams {
                name: format!("{}.{}", name, i + 1),
                cmd: cmd.to_string(),
                quiet: expansion.quiet.iter().any(|q| q == name),
                env,
            });
        }

        if let Some(p) = port.as_mut() {
            *p += 100;
        }
    }

    Ok(out)
}
