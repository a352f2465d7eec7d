use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Periodic redraw driver.
pub trait Refresh {
    fn resume(&mut self);
    fn cancel(&mut self);
    fn is_active(&self) -> bool;
}

enum PumpOp {
    Start,
    Stop,
    Quit,
}

/// A ticker thread that calls `notify` every `interval` while started.
/// Dropping the pump stops and joins the thread.
pub struct Pump {
    control: Sender<PumpOp>,
    thread: Option<JoinHandle<()>>,
    running: bool,
}

impl Pump {
    /// `notify` returns false once nobody is listening, which ends the thread.
    pub fn spawn<F>(interval: Duration, notify: F) -> std::io::Result<Self>
    where
        F: Fn() -> bool + Send + 'static,
    {
        let (control, rx) = mpsc::channel();
        let thread = thread::Builder::new()
            .name("refresh-pump".into())
            .spawn(move || pump_thread(rx, interval, notify))?;
        Ok(Self { control, thread: Some(thread), running: false })
    }
}

impl Refresh for Pump {
    fn resume(&mut self) {
        if !self.running {
            self.running = true;
            self.control.send(PumpOp::Start).ok();
        }
    }

    fn cancel(&mut self) {
        if self.running {
            self.running = false;
            self.control.send(PumpOp::Stop).ok();
        }
    }

    fn is_active(&self) -> bool {
        self.running
    }
}

impl Drop for Pump {
    fn drop(&mut self) {
        self.control.send(PumpOp::Quit).ok();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("refresh pump panicked");
            }
        }
    }
}

fn pump_thread<F: Fn() -> bool>(rx: Receiver<PumpOp>, interval: Duration, notify: F) {
    let mut running = false;

    loop {
        // Block-wait when stopped, tick on timeout when running
        let op = if running {
            match rx.recv_timeout(interval) {
                Ok(op) => op,
                Err(RecvTimeoutError::Timeout) => {
                    if !notify() {
                        break;
                    }
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        } else {
            match rx.recv() {
                Ok(op) => op,
                Err(_) => break,
            }
        };

        match op {
            PumpOp::Start => running = true,
            PumpOp::Stop => running = false,
            PumpOp::Quit => break,
        }
    }
    log::debug!("refresh pump exiting");
}

#[cfg(test)]
pub use fake::FakeRefresh;
