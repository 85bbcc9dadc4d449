//! Deadline and stop-signal handling.
//!
//! A [`Watcher`] runs on its own thread and closes a transport once a deadline passes or its
//! [`StopHandle`] is used, whichever comes first. Closing the transport is what ends
//! [`browser::run`](crate::browser::run).

use std::{
    io,
    sync::{Arc, Condvar, Mutex, PoisonError},
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::transport::CloseHandle;

#[derive(Default)]
struct Signal {
    stopped: Mutex<bool>,
    cvar: Condvar,
}

/// Stops a [`Watcher`] early, closing its transport immediately.
///
/// Dropping a handle does not stop the watcher.
#[derive(Clone)]
pub struct StopHandle {
    signal: Arc<Signal>,
}

impl StopHandle {
    /// Asks the watcher to close the transport now. Can be called from any thread, repeatedly.
    pub fn stop(&self) {
        let mut stopped = self
            .signal
            .stopped
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *stopped = true;
        self.signal.cvar.notify_all();
    }
}

/// Closes a transport when a deadline passes or a [`StopHandle`] is used.
pub struct Watcher {
    thread: JoinHandle<()>,
}

impl Watcher {
    /// Spawns a watcher thread that closes `close` after `deadline`, or only when stopped if
    /// `deadline` is `None`.
    pub fn spawn(
        deadline: Option<Duration>,
        close: CloseHandle,
    ) -> io::Result<(Watcher, StopHandle)> {
        let signal = Arc::new(Signal::default());
        let stop = StopHandle {
            signal: signal.clone(),
        };
        let thread = thread::Builder::new()
            .name("sdbrowse-watcher".into())
            .spawn(move || watch(&signal, deadline, &close))?;
        Ok((Watcher { thread }, stop))
    }

    /// Waits for the watcher thread to close the transport and exit.
    ///
    /// Without a deadline this blocks until [`StopHandle::stop`] is called.
    pub fn join(self) {
        if self.thread.join().is_err() {
            log::error!("watcher thread panicked");
        }
    }
}

fn watch(signal: &Signal, deadline: Option<Duration>, close: &CloseHandle) {
    let stopped = signal
        .stopped
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    match deadline {
        Some(deadline) => {
            let (stopped, res) = signal
                .cvar
                .wait_timeout_while(stopped, deadline, |stopped| !*stopped)
                .unwrap_or_else(PoisonError::into_inner);
            if res.timed_out() {
                log::debug!("deadline of {deadline:?} passed");
            }
            drop(stopped);
        }
        None => {
            let stopped = signal
                .cvar
                .wait_while(stopped, |stopped| !*stopped)
                .unwrap_or_else(PoisonError::into_inner);
            drop(stopped);
        }
    }
    log::debug!("stopping");
    close.close();
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    #[test]
    fn deadline_closes() {
        let close = CloseHandle::new();
        let start = Instant::now();
        let (watcher, _stop) =
            Watcher::spawn(Some(Duration::from_millis(50)), close.clone()).unwrap();
        watcher.join();
        assert!(close.is_closed());
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn stop_before_deadline() {
        let close = CloseHandle::new();
        let start = Instant::now();
        let (watcher, stop) =
            Watcher::spawn(Some(Duration::from_secs(60)), close.clone()).unwrap();
        stop.stop();
        watcher.join();
        assert!(close.is_closed());
        assert!(start.elapsed() < Duration::from_secs(60));
    }

    #[test]
    fn no_deadline_waits_for_stop() {
        let close = CloseHandle::new();
        let (watcher, stop) = Watcher::spawn(None, close.clone()).unwrap();
        thread::sleep(Duration::from_millis(100));
        assert!(!close.is_closed());

        // Dropping a clone does not count as a stop.
        drop(stop.clone());
        thread::sleep(Duration::from_millis(50));
        assert!(!close.is_closed());

        thread::spawn(move || stop.stop());
        watcher.join();
        assert!(close.is_closed());
    }

    #[test]
    fn stop_twice() {
        let close = CloseHandle::new();
        let (watcher, stop) = Watcher::spawn(None, close.clone()).unwrap();
        stop.stop();
        stop.stop();
        watcher.join();
        assert!(close.is_closed());
    }
}
