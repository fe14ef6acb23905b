#![allow(unsafe_code)]

//! Signals: the ones we receive, and the ones we send to children.

use std::fmt;
use std::io;
use std::sync::{Mutex, Once};

use crate::error::Result;

lazy_static! {
    static ref HANDLER: Mutex<Option<Box<dyn Fn(ShutdownSignal) + Send>>> = Mutex::new(None);
}

static LISTENER: Once = Once::new();

/// A signal asking the supervisor itself to shut down.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShutdownSignal {
    /// `SIGINT`, usually Ctrl-C.
    Interrupt,
    /// `SIGTERM`.
    Terminate,
}

impl ShutdownSignal {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Interrupt => "SIGINT",
            Self::Terminate => "SIGTERM",
        }
    }

    /// The exit status a shell would report for death by this signal.
    pub const fn returncode(self) -> i32 {
        match self {
            Self::Interrupt => 130,
            Self::Terminate => 143,
        }
    }
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A signal sent to a managed process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChildSignal {
    /// `SIGTERM`: please exit.
    Terminate,
    /// `SIGKILL`: exit now.
    Kill,
}

impl ChildSignal {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Terminate => "SIGTERM",
            Self::Kill => "SIGKILL",
        }
    }
}

impl fmt::Display for ChildSignal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Delivers signals to managed processes.
pub trait Signaller: Send {
    fn signal(&self, pid: u32, signal: ChildSignal) -> io::Result<()>;
}

/// Signals the whole process group led by the given pid.
///
/// Children are spawned as session leaders, so this reaches everything the
/// shell started too. Processes which are already gone are not an error.
#[derive(Clone, Copy, Debug, Default)]
pub struct GroupSignaller;

#[cfg(unix)]
impl Signaller for GroupSignaller {
    fn signal(&self, pid: u32, signal: ChildSignal) -> io::Result<()> {
        use nix::errno::Errno;
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;
        use std::convert::TryInto;

        let sig = match signal {
            ChildSignal::Terminate => Signal::SIGTERM,
            ChildSignal::Kill => Signal::SIGKILL,
        };

        let pgid: i32 = pid
            .try_into()
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;

        debug!("Sending {:?} to process group {}", sig, pgid);
        match killpg(Pid::from_raw(pgid), sig) {
            Ok(()) | Err(Errno::ESRCH) | Err(Errno::EPERM) => Ok(()),
            Err(errno) => Err(io::Error::from_raw_os_error(errno as i32)),
        }
    }
}

/// Routes this process's SIGINT and SIGTERM to a handler instead of the
/// default action, until dropped.
///
/// Both signals are blocked on the installing thread (and so in every thread
/// it starts afterwards), and a dedicated thread collects them with
/// `sigwait`. Only one bridge can be live at a time.
pub struct SignalBridge {
    #[cfg(unix)]
    previous: nix::sys::signal::SigSet,
}

#[cfg(unix)]
impl SignalBridge {
    pub fn install<F>(handler: F) -> Result<Self>
    where
        F: Fn(ShutdownSignal) + 'static + Send,
    {
        use nix::sys::signal::{pthread_sigmask, SigmaskHow};

        {
            let mut current = HANDLER.lock().expect("poisoned lock in signal::install");
            if current.is_some() {
                return Err(crate::error::Error::Config(
                    "a signal bridge is already installed".into(),
                ));
            }
            *current = Some(Box::new(handler));
        }

        let mut previous = nix::sys::signal::SigSet::empty();
        if let Err(err) = pthread_sigmask(SigmaskHow::SIG_BLOCK, Some(&mask()), Some(&mut previous))
        {
            clear_handler();
            return Err(err.into());
        }

        LISTENER.call_once(|| {
            // The listener outlives any single bridge; it is started from a
            // thread that already blocks both signals, so it inherits the mask.
            let spawned = std::thread::Builder::new()
                .name("procmux-signals".into())
                .spawn(listen);
            if let Err(err) = spawned {
                error!("unable to start signal listener: {}", err);
            }
        });

        debug!("Signal bridge installed");
        Ok(Self { previous })
    }
}

#[cfg(unix)]
impl Drop for SignalBridge {
    fn drop(&mut self) {
        use nix::sys::signal::{pthread_sigmask, SigmaskHow};

        clear_handler();
        let _ = pthread_sigmask(SigmaskHow::SIG_SETMASK, Some(&self.previous), None);
        debug!("Signal bridge removed");
    }
}

#[cfg(unix)]
fn mask() -> nix::sys::signal::SigSet {
    use nix::sys::signal::{SigSet, SIGINT, SIGTERM};

    let mut mask = SigSet::empty();
    mask.add(SIGINT);
    mask.add(SIGTERM);
    mask
}

/// Blocks SIGINT and SIGTERM on the calling thread only.
#[cfg(unix)]
pub fn block_on_current_thread() -> Result<()> {
    mask().thread_block().map_err(Into::into)
}

#[cfg(unix)]
fn listen() {
    use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, SIGINT, SIGTERM};

    let mask = mask();
    loop {
        let raw_signal = match mask.wait() {
            Ok(sig) => sig,
            Err(err) => {
                error!("unable to sigwait: {}", err);
                return;
            }
        };
        debug!("Received {:?}", raw_signal);

        let sig = match raw_signal {
            SIGINT => ShutdownSignal::Interrupt,
            SIGTERM => ShutdownSignal::Terminate,
            _ => continue,
        };

        if invoke(sig) {
            continue;
        }

        // Nobody is supervising: restore the default behaviour and re-raise.
        unsafe {
            let default_action = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
            let _ = sigaction(raw_signal, &default_action);
        }

        let mut new_mask = SigSet::empty();
        new_mask.add(raw_signal);
        let _ = new_mask.thread_unblock();
        let _ = nix::sys::signal::raise(raw_signal);
        let _ = new_mask.thread_block();
    }
}

fn invoke(sig: ShutdownSignal) -> bool {
    if let Some(ref handler) = *HANDLER.lock().expect("poisoned lock in signal::invoke") {
        handler(sig);
        true
    } else {
        false
    }
}

fn clear_handler() {
    *HANDLER.lock().expect("poisoned lock in signal::clear_handler") = None;
}
