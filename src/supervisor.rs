//! Runs a set of processes together, all or nothing.
//!
//! Every managed process runs on its own thread, which sends [`Event`]s into
//! one shared queue. The supervisor is the only consumer of that queue and
//! the only writer to the printer, so output needs no locking. The queue is
//! an unbounded `mpsc` channel: lines are small and consumed as fast as they
//! can be printed, so a slow consumer only costs memory, never blocks a child.
//!
//! As soon as any process stops, all the others are sent SIGTERM. Whatever is
//! still alive once the grace period is over gets SIGKILL. [`Supervisor::run`]
//! returns when every process has stopped and the queue is empty.
//!
//! ```no_run
//! # use procmux::{config::Config, printer::Printer, supervisor::Supervisor};
//! let mut supervisor = Supervisor::new(Config::default(), Printer::stdout(true));
//! supervisor.register("server", "ruby server.rb").unwrap();
//! supervisor.register("worker", "python worker.py").unwrap();
//! supervisor.run().unwrap();
//!
//! std::process::exit(supervisor.returncode().unwrap_or(0));
//! ```

use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};

use chrono::Local;

use crate::colour::Palette;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::event::{Control, Envelope, Event, EventKind, EventSink};
use crate::printer::{Message, OutputPrinter};
use crate::process::{ChildProcess, ManagedProcess};
use crate::signal::{ChildSignal, GroupSignaller, ShutdownSignal, SignalBridge, Signaller};
use crate::timer::EscalationTimer;

/// Name shown on the supervisor's own lines.
pub const SYSTEM_PRINTER_NAME: &str = "system";

/// Returncode recorded for a process that could not be started at all.
pub const SPAWN_FAILED_RC: i32 = 127;

type Launcher = Box<dyn Fn(&ManagedProcess) -> Box<dyn ChildProcess>>;

/// Where the supervisor is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Accepting registrations.
    Idle,
    /// Processes are running and nothing has stopped yet.
    Running,
    /// SIGTERM has been sent.
    Terminating,
    /// SIGKILL has been sent.
    Killing,
    /// Everything has stopped.
    Done,
}

/// Asks a supervisor to shut down, from any thread.
#[derive(Clone, Debug)]
pub struct Handle {
    tx: Sender<Envelope>,
}

impl Handle {
    /// Behaves as if `signal` had been delivered to this process.
    ///
    /// Returns `false` if the supervisor is gone.
    pub fn signal(&self, signal: ShutdownSignal) -> bool {
        self.tx
            .send(Envelope::Control(Control::Signal(signal)))
            .is_ok()
    }
}

struct Entry {
    process: ManagedProcess,
    pid: Option<u32>,
    returncode: Option<i32>,
}

impl Entry {
    const fn is_alive(&self) -> bool {
        self.pid.is_some() && self.returncode.is_none()
    }

    const fn is_stopped(&self) -> bool {
        self.returncode.is_some()
    }
}

fn launch(process: &ManagedProcess) -> Box<dyn ChildProcess> {
    Box::new(process.clone())
}

pub struct Supervisor<P: OutputPrinter> {
    config: Config,
    printer: P,
    palette: Palette,
    processes: Vec<Entry>,
    launcher: Launcher,
    signaller: Box<dyn Signaller>,
    tx: Sender<Envelope>,
    rx: Receiver<Envelope>,
    phase: Phase,
    returncode: Option<i32>,
    terminating: bool,
    killing: bool,
    timer: Option<EscalationTimer>,
}

impl<P: OutputPrinter> Supervisor<P> {
    pub fn new(config: Config, printer: P) -> Self {
        let mut printer = printer;
        let width = printer.width().max(SYSTEM_PRINTER_NAME.len());
        printer.set_width(width);

        let (tx, rx) = channel();
        Self {
            config,
            printer,
            palette: Palette::default(),
            processes: Vec::new(),
            launcher: Box::new(launch),
            signaller: Box::new(GroupSignaller),
            tx,
            rx,
            phase: Phase::Idle,
            returncode: None,
            terminating: false,
            killing: false,
            timer: None,
        }
    }

    /// Replaces how registered processes are turned into running children.
    pub fn with_launcher<F>(mut self, launcher: F) -> Self
    where
        F: Fn(&ManagedProcess) -> Box<dyn ChildProcess> + 'static,
    {
        self.launcher = Box::new(launcher);
        self
    }

    /// Replaces how signals are delivered to children.
    pub fn with_signaller(mut self, signaller: impl Signaller + 'static) -> Self {
        self.signaller = Box::new(signaller);
        self
    }

    /// Adds a process to be started by [`run`](Self::run).
    ///
    /// Names must be unique. The returned process can be adjusted further
    /// (quiet, environment, working directory) until `run` is called.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        command: impl Into<String>,
    ) -> Result<&mut ManagedProcess> {
        if self.phase != Phase::Idle {
            return Err(Error::AlreadyRan);
        }

        let name = name.into();
        if self.processes.iter().any(|e| e.process.name() == name) {
            return Err(Error::DuplicateProcess(name));
        }

        let width = self.printer.width().max(name.chars().count());
        self.printer.set_width(width);

        let mut process = ManagedProcess::new(name, command);
        process.with_colour(self.palette.next());
        debug!("Registered {}: {}", process.name(), process.command());

        self.processes.push(Entry {
            process,
            pid: None,
            returncode: None,
        });

        let entry = self.processes.len() - 1;
        Ok(&mut self.processes[entry].process)
    }

    pub fn handle(&self) -> Handle {
        Handle {
            tx: self.tx.clone(),
        }
    }

    /// The returncode of the first process to stop, or of the signal that
    /// shut us down. `None` until something has stopped.
    pub const fn returncode(&self) -> Option<i32> {
        self.returncode
    }

    pub const fn phase(&self) -> Phase {
        self.phase
    }

    pub const fn printer(&self) -> &P {
        &self.printer
    }

    /// Starts every registered process and multiplexes their output until
    /// all of them have stopped.
    ///
    /// Errors only come from setting up; whatever the children do is
    /// reflected in [`returncode`](Self::returncode) instead.
    pub fn run(&mut self) -> Result<()> {
        if self.phase != Phase::Idle {
            return Err(Error::AlreadyRan);
        }

        // Installed before any child thread exists, so that every one of
        // them inherits the blocked signal mask.
        let _bridge = if self.config.handle_signals {
            let handle = self.handle();
            Some(SignalBridge::install(move |sig| {
                handle.signal(sig);
            })?)
        } else {
            None
        };

        self.phase = Phase::Running;
        let threads = self.start();

        loop {
            match self.rx.recv_timeout(self.config.poll_interval) {
                Ok(envelope) => self.dispatch(envelope),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            if self.all_stopped() {
                // Pick up anything that raced with the last stop.
                while let Ok(envelope) = self.rx.try_recv() {
                    self.dispatch(envelope);
                }
                break;
            }

            if self.any_stopped() {
                self.terminate();
            }
        }

        self.phase = Phase::Done;
        if let Some(timer) = self.timer.take() {
            timer.disarm();
        }

        for thread in threads {
            if thread.join().is_err() {
                warn!("a process thread panicked");
            }
        }

        debug!("All processes stopped, returncode {:?}", self.returncode);
        Ok(())
    }

    fn start(&self) -> Vec<JoinHandle<()>> {
        let mut threads = Vec::with_capacity(self.processes.len());
        for entry in &self.processes {
            let child = (self.launcher)(&entry.process);
            let sink: Box<dyn EventSink> = Box::new(self.tx.clone());
            let ignore_signals = self.config.handle_signals;

            let spawned = thread::Builder::new()
                .name(child.name().to_string())
                .spawn(move || child.run(sink, ignore_signals));

            match spawned {
                Ok(thread) => threads.push(thread),
                Err(err) => {
                    warn!("Unable to start thread for {}: {}", entry.process.name(), err);
                    self.tx.emit(Event::new(
                        entry.process.name(),
                        entry.process.colour(),
                        EventKind::SpawnFailed {
                            error: err.to_string(),
                        },
                    ));
                }
            }
        }

        threads
    }

    fn dispatch(&mut self, envelope: Envelope) {
        match envelope {
            Envelope::Event(event) => self.handle_event(event),
            Envelope::Control(Control::Signal(sig)) => {
                self.system_print(&format!("{} received\n", sig));
                if self.returncode.is_none() {
                    self.returncode = Some(sig.returncode());
                }
                // Nothing left to stop when the signal is only drained now.
                if !self.all_stopped() {
                    self.terminate();
                }
            }
            Envelope::Control(Control::Escalate) => self.kill(),
        }
    }

    fn handle_event(&mut self, event: Event) {
        let index = match self
            .processes
            .iter()
            .position(|e| e.process.name() == event.name)
        {
            Some(index) => index,
            None => {
                warn!("Event from unknown process {}", event.name);
                return;
            }
        };

        match event.kind {
            EventKind::Started { pid } => {
                self.processes[index].pid = Some(pid);
                self.system_print(&format!("{} started (pid={})\n", event.name, pid));

                // Started after shutdown began: catch it up.
                if self.terminating {
                    self.signal(index, ChildSignal::Terminate);
                }
                if self.killing {
                    self.signal(index, ChildSignal::Kill);
                }
            }
            EventKind::Line(data) => {
                if self.processes[index].is_stopped() {
                    debug!("Dropping output of {} after it stopped", event.name);
                    return;
                }

                let message = Message::new(data, event.time, Some(event.name), event.colour);
                self.print(&message);
            }
            EventKind::Stopped { code } => {
                self.stopped(index, code);
                self.system_print(&format!("{} stopped (rc={})\n", event.name, code));
            }
            EventKind::SpawnFailed { error } => {
                self.stopped(index, SPAWN_FAILED_RC);
                self.system_print(&format!("{} failed to start: {}\n", event.name, error));
            }
        }
    }

    fn stopped(&mut self, index: usize, code: i32) {
        self.processes[index].returncode = Some(code);
        if self.returncode.is_none() {
            self.returncode = Some(code);
        }
    }

    /// Sends SIGTERM to everything still running and starts the grace period.
    fn terminate(&mut self) {
        if self.terminating {
            return;
        }
        self.terminating = true;
        self.phase = Phase::Terminating;

        self.system_print("sending SIGTERM to all processes\n");
        for index in 0..self.processes.len() {
            if self.processes[index].is_alive() {
                self.signal(index, ChildSignal::Terminate);
            }
        }

        let tx = self.tx.clone();
        let armed = EscalationTimer::arm(self.config.grace_period, move || {
            let _ = tx.send(Envelope::Control(Control::Escalate));
        });

        match armed {
            Ok(timer) => self.timer = Some(timer),
            Err(err) => {
                warn!("Unable to start escalation timer, killing now: {}", err);
                self.kill();
            }
        }
    }

    /// Sends SIGKILL to everything still running.
    fn kill(&mut self) {
        if self.killing {
            return;
        }
        self.killing = true;
        self.phase = Phase::Killing;

        for index in 0..self.processes.len() {
            if self.processes[index].is_alive() {
                self.signal(index, ChildSignal::Kill);
            }
        }
    }

    fn signal(&mut self, index: usize, signal: ChildSignal) {
        let pid = match self.processes[index].pid {
            Some(pid) => pid,
            None => return,
        };

        self.system_print(&format!("sending {} to pid {}\n", signal, pid));
        if let Err(err) = self.signaller.signal(pid, signal) {
            warn!(
                "Unable to send {} to {}: {}",
                signal,
                self.processes[index].process.name(),
                err
            );
        }
    }

    fn all_stopped(&self) -> bool {
        self.processes.iter().all(Entry::is_stopped)
    }

    fn any_stopped(&self) -> bool {
        self.processes.iter().any(Entry::is_stopped)
    }

    fn system_print(&mut self, text: &str) {
        let message = Message::new(
            text,
            Local::now(),
            Some(SYSTEM_PRINTER_NAME.to_string()),
            None,
        );
        self.print(&message);
    }

    fn print(&mut self, message: &Message) {
        if let Err(err) = self.printer.write(message) {
            warn!("Unable to print output: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Phase, Supervisor, SPAWN_FAILED_RC};
    use crate::config::{Config, ConfigBuilder};
    use crate::error::Error;
    use crate::event::{Control, Envelope, Event, EventKind, EventSink};
    use crate::printer::Printer;
    use crate::process::{ChildProcess, ManagedProcess};
    use crate::signal::{ChildSignal, ShutdownSignal, Signaller};
    use std::collections::HashMap;
    use std::io::{self, Write};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc::{channel, Sender};
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

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
        fn lines(&self) -> Vec<String> {
            String::from_utf8(self.0.lock().unwrap().clone())
                .unwrap()
                .lines()
                .map(String::from)
                .collect()
        }
    }

    /// How a fake child ends.
    #[derive(Clone, Copy, Debug)]
    enum Exit {
        /// Exits right away with this code.
        Code(i32),
        /// Exits with this code after a delay, ignoring SIGTERM.
        After(Duration, i32),
        /// Runs until SIGTERM or SIGKILL.
        OnSignal,
        /// Runs until SIGKILL.
        Stubborn,
        /// Never starts.
        FailSpawn,
    }

    #[derive(Clone, Debug)]
    struct Script {
        pid: u32,
        lines: Vec<&'static str>,
        exit: Exit,
    }

    type Registry = Arc<Mutex<HashMap<u32, Sender<ChildSignal>>>>;

    struct FakeChild {
        name: String,
        script: Script,
        registry: Registry,
    }

    impl ChildProcess for FakeChild {
        fn name(&self) -> &str {
            &self.name
        }

        fn run(self: Box<Self>, sink: Box<dyn EventSink>, _ignore_signals: bool) {
            assert_eq!(thread::current().name(), Some(self.name.as_str()));
            let emit = |kind| sink.emit(Event::new(self.name.clone(), None, kind));

            if let Exit::FailSpawn = self.script.exit {
                emit(EventKind::SpawnFailed {
                    error: "No such file or directory".into(),
                });
                return;
            }

            let (tx, rx) = channel();
            self.registry.lock().unwrap().insert(self.script.pid, tx);
            emit(EventKind::Started {
                pid: self.script.pid,
            });

            for line in &self.script.lines {
                emit(EventKind::Line(line.as_bytes().to_vec()));
            }

            let code = match self.script.exit {
                Exit::Code(code) => code,
                Exit::After(delay, code) => {
                    thread::sleep(delay);
                    code
                }
                Exit::OnSignal => match rx.recv() {
                    Ok(ChildSignal::Terminate) => -15,
                    _ => -9,
                },
                Exit::Stubborn => loop {
                    match rx.recv() {
                        Ok(ChildSignal::Terminate) => continue,
                        _ => break -9,
                    }
                },
                Exit::FailSpawn => unreachable!(),
            };

            emit(EventKind::Stopped { code });
        }
    }

    #[derive(Clone, Default)]
    struct FakeSignaller {
        registry: Registry,
        sent: Arc<Mutex<Vec<(u32, ChildSignal)>>>,
    }

    impl Signaller for FakeSignaller {
        fn signal(&self, pid: u32, signal: ChildSignal) -> io::Result<()> {
            self.sent.lock().unwrap().push((pid, signal));
            if let Some(tx) = self.registry.lock().unwrap().get(&pid) {
                let _ = tx.send(signal);
            }
            Ok(())
        }
    }

    struct Harness {
        supervisor: Supervisor<Printer<SharedBuffer>>,
        output: SharedBuffer,
        signaller: FakeSignaller,
        launched: Arc<AtomicUsize>,
    }

    impl Harness {
        fn new(grace: Duration, scripts: Vec<(&str, Script)>) -> Self {
            let config = ConfigBuilder::default()
                .grace_period(grace)
                .poll_interval(Duration::from_millis(10))
                .handle_signals(false)
                .build()
                .unwrap();
            Self::with_config(config, scripts)
        }

        fn with_config(config: Config, scripts: Vec<(&str, Script)>) -> Self {
            let output = SharedBuffer::default();
            let signaller = FakeSignaller::default();
            let launched = Arc::new(AtomicUsize::new(0));

            let table: HashMap<String, Script> = scripts
                .iter()
                .map(|(name, script)| (name.to_string(), script.clone()))
                .collect();
            let registry = signaller.registry.clone();
            let counter = launched.clone();

            let mut supervisor = Supervisor::new(config, Printer::new(output.clone()))
                .with_signaller(signaller.clone())
                .with_launcher(move |process: &ManagedProcess| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Box::new(FakeChild {
                        name: process.name().to_string(),
                        script: table[process.name()].clone(),
                        registry: registry.clone(),
                    }) as Box<dyn ChildProcess>
                });

            for (name, _) in &scripts {
                supervisor.register(*name, "fake").unwrap();
            }

            Self {
                supervisor,
                output,
                signaller,
                launched,
            }
        }

        fn sent(&self) -> Vec<(u32, ChildSignal)> {
            self.signaller.sent.lock().unwrap().clone()
        }

        fn has_line(&self, suffix: &str) -> bool {
            self.output.lines().iter().any(|l| l.ends_with(suffix))
        }

        fn position(&self, suffix: &str) -> usize {
            self.output
                .lines()
                .iter()
                .position(|l| l.ends_with(suffix))
                .unwrap_or_else(|| panic!("no line ending with {:?}", suffix))
        }
    }

    fn script(pid: u32, exit: Exit) -> Script {
        Script {
            pid,
            lines: vec![],
            exit,
        }
    }

    #[test]
    fn test_first_exit_terminates_the_rest() {
        let mut h = Harness::new(
            Duration::from_secs(10),
            vec![
                ("foo", script(100, Exit::OnSignal)),
                ("bar", script(200, Exit::Code(42))),
            ],
        );
        h.supervisor.run().unwrap();

        assert_eq!(h.supervisor.returncode(), Some(42));
        assert_eq!(h.supervisor.phase(), Phase::Done);
        assert!(h.has_line("system | foo started (pid=100)"));
        assert!(h.has_line("system | bar started (pid=200)"));
        assert!(h.has_line("system | bar stopped (rc=42)"));
        assert!(h.has_line("system | sending SIGTERM to all processes"));
        assert!(h.has_line("system | sending SIGTERM to pid 100"));
        assert!(h.has_line("system | foo stopped (rc=-15)"));
        assert_eq!(h.sent(), vec![(100, ChildSignal::Terminate)]);
    }

    #[test]
    fn test_all_survivors_get_sigterm() {
        let mut h = Harness::new(
            Duration::from_secs(10),
            vec![
                ("a", script(1, Exit::OnSignal)),
                ("b", script(2, Exit::OnSignal)),
                ("c", script(3, Exit::Code(0))),
            ],
        );
        h.supervisor.run().unwrap();

        let mut sent = h.sent();
        sent.sort_by_key(|(pid, _)| *pid);
        assert_eq!(
            sent,
            vec![(1, ChildSignal::Terminate), (2, ChildSignal::Terminate)]
        );
        assert!(h.has_line("sending SIGTERM to pid 1"));
        assert!(h.has_line("sending SIGTERM to pid 2"));
        assert_eq!(h.supervisor.returncode(), Some(0));
    }

    #[test]
    fn test_stragglers_are_killed_after_grace() {
        let mut h = Harness::new(
            Duration::from_millis(100),
            vec![
                ("stubborn", script(7, Exit::Stubborn)),
                ("quick", script(8, Exit::Code(1))),
            ],
        );
        h.supervisor.run().unwrap();

        assert_eq!(
            h.sent(),
            vec![(7, ChildSignal::Terminate), (7, ChildSignal::Kill)]
        );
        assert!(h.has_line("system | sending SIGKILL to pid 7"));
        assert!(h.has_line("system | stubborn stopped (rc=-9)"));
        assert_eq!(h.supervisor.returncode(), Some(1));
    }

    #[test]
    fn test_first_stop_wins() {
        let mut h = Harness::new(
            Duration::from_secs(10),
            vec![
                ("slow", script(1, Exit::After(Duration::from_millis(100), 5))),
                ("fast", script(2, Exit::Code(3))),
            ],
        );
        h.supervisor.run().unwrap();

        assert!(h.position("fast stopped (rc=3)") < h.position("slow stopped (rc=5)"));
        assert_eq!(h.supervisor.returncode(), Some(3));
    }

    #[test]
    fn test_lines_keep_their_order() {
        let mut h = Harness::new(
            Duration::from_secs(10),
            vec![(
                "foo",
                Script {
                    pid: 1,
                    lines: vec!["a\n", "b\n", "c\n"],
                    exit: Exit::Code(0),
                },
            )],
        );
        h.supervisor.run().unwrap();

        let a = h.position("foo    | a");
        let b = h.position("foo    | b");
        let c = h.position("foo    | c");
        assert!(a < b && b < c);
        assert!(h.position("foo started (pid=1)") < a);
        assert!(c < h.position("foo stopped (rc=0)"));
    }

    #[test]
    fn test_name_column_fits_longest_name() {
        let mut h = Harness::new(
            Duration::from_secs(10),
            vec![(
                "long-process-name",
                Script {
                    pid: 1,
                    lines: vec!["hi\n"],
                    exit: Exit::Code(0),
                },
            )],
        );
        h.supervisor.run().unwrap();

        assert!(h.has_line(" long-process-name | hi"));
        assert!(h.has_line(" system            | long-process-name started (pid=1)"));
    }

    #[test]
    fn test_duplicate_names_are_rejected_before_anything_runs() {
        let mut h = Harness::new(
            Duration::from_secs(10),
            vec![("foo", script(1, Exit::Code(0)))],
        );

        match h.supervisor.register("foo", "echo again") {
            Err(Error::DuplicateProcess(name)) => assert_eq!(name, "foo"),
            other => panic!("expected duplicate error, got {:?}", other.map(|p| p.name().to_string())),
        }
        assert_eq!(h.launched.load(Ordering::SeqCst), 0);
        assert_eq!(h.supervisor.phase(), Phase::Idle);
    }

    #[test]
    fn test_interrupt_sets_returncode_and_terminates_once() {
        let mut h = Harness::new(
            Duration::from_secs(10),
            vec![
                ("a", script(1, Exit::OnSignal)),
                ("b", script(2, Exit::OnSignal)),
            ],
        );
        let handle = h.supervisor.handle();
        assert!(handle.signal(ShutdownSignal::Interrupt));
        assert!(handle.signal(ShutdownSignal::Interrupt));
        h.supervisor.run().unwrap();

        assert_eq!(h.supervisor.returncode(), Some(130));
        let mut sent = h.sent();
        sent.sort_by_key(|(pid, _)| *pid);
        assert_eq!(
            sent,
            vec![(1, ChildSignal::Terminate), (2, ChildSignal::Terminate)]
        );
        assert_eq!(
            h.output
                .lines()
                .iter()
                .filter(|l| l.ends_with("system | SIGINT received"))
                .count(),
            2
        );
        assert_eq!(
            h.output
                .lines()
                .iter()
                .filter(|l| l.ends_with("sending SIGTERM to all processes"))
                .count(),
            1
        );
    }

    #[test]
    fn test_sigterm_returncode() {
        let mut h = Harness::new(
            Duration::from_secs(10),
            vec![("a", script(1, Exit::OnSignal))],
        );
        h.supervisor.handle().signal(ShutdownSignal::Terminate);
        h.supervisor.run().unwrap();

        assert!(h.has_line("system | SIGTERM received"));
        assert_eq!(h.supervisor.returncode(), Some(143));
    }

    #[test]
    fn test_repeated_escalation_kills_once() {
        let mut h = Harness::new(
            Duration::from_secs(10),
            vec![("stubborn", script(9, Exit::Stubborn))],
        );
        h.supervisor.handle().signal(ShutdownSignal::Interrupt);
        h.supervisor
            .tx
            .send(Envelope::Control(Control::Escalate))
            .unwrap();
        h.supervisor
            .tx
            .send(Envelope::Control(Control::Escalate))
            .unwrap();
        h.supervisor.run().unwrap();

        assert_eq!(
            h.sent(),
            vec![(9, ChildSignal::Terminate), (9, ChildSignal::Kill)]
        );
        assert_eq!(h.supervisor.returncode(), Some(130));
    }

    #[test]
    fn test_signal_after_everything_stopped_does_not_terminate() {
        let mut h = Harness::new(
            Duration::from_secs(10),
            vec![("solo", script(1, Exit::Code(0)))],
        );
        h.supervisor.processes[0].pid = Some(1);
        h.supervisor.processes[0].returncode = Some(0);
        h.supervisor.returncode = Some(0);

        h.supervisor
            .dispatch(Envelope::Control(Control::Signal(ShutdownSignal::Interrupt)));

        assert!(h.has_line("system | SIGINT received"));
        assert!(!h.has_line("sending SIGTERM to all processes"));
        assert!(h.supervisor.timer.is_none());
        assert_eq!(h.supervisor.phase(), Phase::Idle);
        assert_eq!(h.supervisor.returncode(), Some(0));
        assert!(h.sent().is_empty());
    }

    #[test]
    fn test_spawn_failure_counts_as_stop() {
        let mut h = Harness::new(
            Duration::from_secs(10),
            vec![
                ("broken", script(0, Exit::FailSpawn)),
                ("fine", script(5, Exit::OnSignal)),
            ],
        );
        h.supervisor.run().unwrap();

        assert_eq!(h.supervisor.returncode(), Some(SPAWN_FAILED_RC));
        assert!(h.has_line("system | broken failed to start: No such file or directory"));
        assert_eq!(h.sent(), vec![(5, ChildSignal::Terminate)]);
    }

    #[test]
    fn test_run_twice_is_an_error() {
        let mut h = Harness::new(
            Duration::from_secs(10),
            vec![("foo", script(1, Exit::Code(0)))],
        );
        h.supervisor.run().unwrap();

        assert!(matches!(h.supervisor.run(), Err(Error::AlreadyRan)));
        assert!(matches!(
            h.supervisor.register("bar", "true"),
            Err(Error::AlreadyRan)
        ));
    }

    #[test]
    fn test_nothing_registered() {
        let mut h = Harness::new(Duration::from_secs(10), vec![]);
        h.supervisor.run().unwrap();

        assert_eq!(h.supervisor.returncode(), None);
        assert!(h.output.lines().is_empty());
    }

    #[test]
    fn test_register_assigns_distinct_colours() {
        let mut supervisor = Supervisor::new(Config::default(), Printer::new(Vec::new()));
        let first = supervisor.register("one", "true").unwrap().colour();
        let second = supervisor.register("two", "true").unwrap().colour();

        assert!(first.is_some());
        assert_ne!(first, second);
    }
}
