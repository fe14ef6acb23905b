//! Procfiles: one `name: command` per line.

use std::fs;
use std::path::Path;

use regex::Regex;

use crate::error::{Error, Result};

/// The process types of an application, in the order they were declared.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Procfile {
    processes: Vec<(String, String)>,
}

impl Procfile {
    /// Parses Procfile contents.
    ///
    /// Lines that don't look like `name: command` (comments, blank lines) are
    /// skipped. A name declared twice is an error.
    pub fn parse(contents: &str) -> Result<Self> {
        let mut procfile = Self::default();
        for (number, line) in contents.lines().enumerate() {
            if let Some((name, command)) = parse_line(line) {
                if procfile.get(name).is_some() {
                    return Err(Error::Procfile {
                        line: number + 1,
                        reason: format!("process '{}' is defined more than once", name),
                    });
                }
                procfile
                    .processes
                    .push((name.to_string(), command.to_string()));
            }
        }

        Ok(procfile)
    }

    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading Procfile {:?}", path);
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.processes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c.as_str())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.processes.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.processes.iter().map(|(n, c)| (n.as_str(), c.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    /// Keeps only the named process types, failing on names not in the Procfile.
    pub fn select(&self, names: &[String]) -> Result<Self> {
        if names.is_empty() {
            return Ok(self.clone());
        }

        for name in names {
            if self.get(name).is_none() {
                return Err(Error::Config(format!("no process named '{}' in Procfile", name)));
            }
        }

        Ok(Self {
            processes: self
                .processes
                .iter()
                .filter(|(n, _)| names.contains(n))
                .cloned()
                .collect(),
        })
    }
}

lazy_static! {
    static ref PROCESS_LINE: Regex = Regex::new(r"^([A-Za-z0-9_-]+):\s*(.+)$").expect("valid regex");
}

fn parse_line(line: &str) -> Option<(&str, &str)> {
    let captures = PROCESS_LINE.captures(line)?;
    Some((captures.get(1)?.as_str(), captures.get(2)?.as_str()))
}
