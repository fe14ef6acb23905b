//! One-shot escalation deadline.

use std::io;
use std::sync::mpsc::{channel, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Runs a callback once a deadline passes, unless disarmed first.
///
/// The callback runs on the timer's own thread. Dropping the timer disarms it.
#[derive(Debug)]
pub struct EscalationTimer {
    cancel: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl EscalationTimer {
    pub fn arm<F>(after: Duration, callback: F) -> io::Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let (cancel, cancelled) = channel::<()>();
        let handle = thread::Builder::new()
            .name("procmux-escalation".into())
            .spawn(move || match cancelled.recv_timeout(after) {
                Err(RecvTimeoutError::Timeout) => {
                    debug!("Grace period of {:?} elapsed", after);
                    callback();
                }
                _ => debug!("Escalation disarmed"),
            })?;

        Ok(Self {
            cancel: Some(cancel),
            handle: Some(handle),
        })
    }

    /// Cancels the deadline if it has not passed yet, and waits for the
    /// timer thread to finish.
    pub fn disarm(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        // Disconnecting wakes the timer thread without firing.
        drop(self.cancel.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("escalation callback panicked");
            }
        }
    }
}

impl Drop for EscalationTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
