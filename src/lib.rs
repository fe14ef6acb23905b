//! Procmux: the library
//!
//! Runs the processes of a Procfile side by side, prefixes and interleaves
//! their output on one stream, and brings all of them down as soon as one of
//! them exits. The binary is built on [`supervisor::Supervisor`], which can
//! also be driven directly:
//!
//! ```no_run
//! use procmux::{config::Config, printer::Printer, Supervisor};
//!
//! let mut supervisor = Supervisor::new(Config::default(), Printer::stdout(true));
//! supervisor.register("web", "python -m http.server").unwrap();
//! supervisor.run().unwrap();
//! ```

#![deny(unsafe_code)]
#![allow(clippy::default_trait_access, clippy::cognitive_complexity)]

#[cfg(not(unix))]
compile_error!("procmux only supports unix platforms");

#[macro_use]
extern crate clap;
#[macro_use]
extern crate derive_builder;
#[macro_use]
extern crate log;
#[macro_use]
extern crate lazy_static;

pub mod cli;
pub mod colour;
pub mod config;
pub mod environ;
pub mod error;
pub mod event;
pub mod printer;
pub mod procfile;
pub mod process;
pub mod run;
pub mod signal;
pub mod supervisor;
mod timer;

pub use supervisor::Supervisor;
