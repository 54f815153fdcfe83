use super::command::Command;
use super::entry::TimerEntry;

use std::collections::BinaryHeap;
use std::io;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// Cloneable sender side of the timer driver.
#[derive(Clone)]
pub(crate) struct TimerHandle {
    sender: Sender<Command>,
}

impl TimerHandle {
    /// Sends a command to the driver.
    ///
    /// Fails only once the driver thread has exited; callers treat that
    /// as a runtime shutting down.
    pub(crate) fn send(&self, command: Command) -> Result<(), mpsc::SendError<Command>> {
        self.sender.send(command)
    }
}

/// The timer thread.
pub(crate) struct TimerDriver {
    receiver: Receiver<Command>,

    timers: BinaryHeap<TimerEntry>,
}

impl TimerDriver {
    /// Starts the driver on a thread named `{name}-timer`.
    pub(crate) fn start(name: &str) -> io::Result<(TimerHandle, JoinHandle<()>)> {
        let (sender, receiver) = mpsc::channel();

        let driver = TimerDriver {
            receiver,
            timers: BinaryHeap::new(),
        };

        let thread = thread::Builder::new()
            .name(format!("{name}-timer"))
            .spawn(move || driver.run())?;

        Ok((TimerHandle { sender }, thread))
    }

    fn run(mut self) {
        log::debug!("timer driver started");

        loop {
            self.fire_expired();

            let received = match self.timers.peek() {
                Some(next) => {
                    let wait = next.deadline.saturating_duration_since(Instant::now());
                    self.receiver.recv_timeout(wait)
                }
                None => self.receiver.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };

            match received {
                Ok(Command::SetTimer {
                    deadline,
                    waker,
                    cancelled,
                }) => self.timers.push(TimerEntry {
                    deadline,
                    waker,
                    cancelled,
                }),
                Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {}
            }
        }

        log::debug!("timer driver stopped with {} pending timers", self.timers.len());
    }

    fn fire_expired(&mut self) {
        let now = Instant::now();

        while self.timers.peek().is_some_and(|t| t.deadline <= now) {
            if let Some(entry) = self.timers.pop() {
                entry.fire();
            }
        }

        // Cancelled timers at the top would otherwise keep the thread
        // waking up for nothing.
        while self.timers.peek().is_some_and(TimerEntry::is_cancelled) {
            self.timers.pop();
        }
    }
}
