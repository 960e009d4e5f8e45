//! Host-side I/O worker
//!
//! Runs a blocking datagram transport on its own thread and connects it to
//! the player through a [`NetworkLink`]. The player keeps calling
//! [`SharedNetwork`](super::SharedNetwork) methods, which never block.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use embassy_time::Instant;

use super::NetworkLink;
use super::NetworkStatus;

/// How long one receive call may block before the worker checks for
/// outbound messages and shutdown
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Blocking datagram transport driven by the worker.
pub trait DatagramSocket: Send + 'static {
    /// Open the underlying handle (bind, join multicast group, ...)
    fn connect(&mut self) -> io::Result<()>;

    /// Send one frame
    fn send(&mut self, frame: &[u8]) -> io::Result<()>;

    /// Wait up to `timeout` for a frame.
    ///
    /// Returns `Ok(None)` when nothing arrived in time.
    fn recv_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<Option<usize>>;

    /// Release the underlying handle
    fn close(&mut self);
}

/// Handle to a running worker.
///
/// Dropping the handle shuts the worker down.
pub struct WorkerHandle {
    stop: Arc<AtomicBool>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl WorkerHandle {
    /// Stop the worker, close its socket and wait for the thread.
    ///
    /// May be called from any thread; only the first call does anything.
    pub fn shutdown(&self) {
        self.stop.store(true, Ordering::Release);
        let thread = self
            .thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(thread) = thread {
            if thread.join().is_err() {
                warn!("network worker panicked");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|thread| !thread.is_finished())
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Start a worker thread moving frames between `socket` and `link`.
pub fn spawn<S: DatagramSocket, const SIZE: usize>(
    name: &str,
    socket: S,
    link: Arc<NetworkLink<SIZE>>,
    poll_interval: Duration,
) -> io::Result<WorkerHandle> {
    let stop = Arc::new(AtomicBool::new(false));
    let worker_stop = Arc::clone(&stop);
    let thread = thread::Builder::new()
        .name(std::format!("net-{name}"))
        .spawn(move || run(socket, &link, &worker_stop, poll_interval))?;
    Ok(WorkerHandle {
        stop,
        thread: Mutex::new(Some(thread)),
    })
}

fn run<S: DatagramSocket, const SIZE: usize>(
    mut socket: S,
    link: &NetworkLink<SIZE>,
    stop: &AtomicBool,
    poll_interval: Duration,
) {
    let mut buf = [0u8; 512];
    let mut open = false;

    while !stop.load(Ordering::Acquire) {
        if link.wanted_status() == NetworkStatus::Disconnected {
            if open {
                socket.close();
                open = false;
            }
            link.set_status(NetworkStatus::Disconnected);
            thread::sleep(poll_interval);
            continue;
        }

        if !open {
            link.set_status(NetworkStatus::Connecting);
            match socket.connect() {
                Ok(()) => {
                    open = true;
                    link.set_status(NetworkStatus::Connected);
                }
                Err(err) => {
                    warn!("network connect failed: {}", err);
                    thread::sleep(poll_interval);
                    continue;
                }
            }
        }

        if let Some(frame) = link.take_outbound() {
            if let Err(err) = socket.send(&frame) {
                warn!("network send failed: {}", err);
                socket.close();
                open = false;
                link.set_status(NetworkStatus::Connecting);
                continue;
            }
        }

        match socket.recv_timeout(&mut buf, poll_interval) {
            Ok(Some(len)) => link.deliver_frame(&buf[..len.min(buf.len())], Instant::now()),
            Ok(None) => {}
            Err(err) => {
                warn!("network receive failed: {}", err);
                socket.close();
                open = false;
                link.set_status(NetworkStatus::Connecting);
            }
        }
    }

    if open {
        socket.close();
    }
    link.set_status(NetworkStatus::Disconnected);
}
