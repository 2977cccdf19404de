//! Example [`super::KillHandler`] that signals an OS process by pid.
//!
//! Not wired into [`super::Watchdog`] by default: the host browser
//! process is an external collaborator, so killing it is a caller
//! concern. This is provided as the concrete implementation a caller
//! would register for a browser-wide `restart-browser` recovery.

use std::future::Future;
use std::pin::Pin;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

use super::core::KillHandler;

pub struct ProcessKillHandler {
    pub pid: i32,
}

impl KillHandler for ProcessKillHandler {
    fn kill(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        Box::pin(async move { signal::kill(Pid::from_raw(self.pid), Signal::SIGTERM).is_ok() })
    }
}

impl ProcessKillHandler {
    /// True if the pid no longer answers the null signal, i.e. the
    /// process has actually exited.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        signal::kill(Pid::from_raw(self.pid), None).is_err()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_process_answers_the_null_signal() {
        let handler = ProcessKillHandler { pid: std::process::id() as i32 };
        assert!(!handler.is_dead());
    }
}
