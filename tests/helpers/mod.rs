#![allow(dead_code)]

use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use procmux::config::{Config, ConfigBuilder};
use procmux::printer::Printer;
use procmux::Supervisor;

/// A writer whose contents can still be read after the printer took it.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SharedBuffer {
    pub fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock().unwrap())
            .lines()
            .map(String::from)
            .collect()
    }

    pub fn has_line(&self, suffix: &str) -> bool {
        self.lines().iter().any(|l| l.ends_with(suffix))
    }

    pub fn position(&self, suffix: &str) -> usize {
        self.lines()
            .iter()
            .position(|l| l.ends_with(suffix))
            .unwrap_or_else(|| panic!("no line ending with {:?} in {:#?}", suffix, self.lines()))
    }
}

/// Test config: signals are left alone, since tests share one process.
pub fn config(grace: Duration) -> Config {
    ConfigBuilder::default()
        .grace_period(grace)
        .poll_interval(Duration::from_millis(10))
        .handle_signals(false)
        .build()
        .unwrap()
}

pub fn supervisor(grace: Duration) -> (Supervisor<Printer<SharedBuffer>>, SharedBuffer) {
    let output = SharedBuffer::default();
    let supervisor = Supervisor::new(config(grace), Printer::new(output.clone()));
    (supervisor, output)
}
