use std::sync::mpsc::{self, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};
use xcplink_frame::FrameError;

use crate::dispatch::Dispatcher;
use crate::link::Inbound;

/// Pause between empty polls.
pub const IDLE_INTERVAL: Duration = Duration::from_millis(1);

const THREAD_NAME: &str = "xcplink-listener";

/// A running listener thread and its shutdown channel.
pub(crate) struct ListenerHandle {
    shutdown: Sender<()>,
    thread: JoinHandle<()>,
}

impl ListenerHandle {
    /// Start polling `inbound` and feeding `dispatcher`.
    pub(crate) fn spawn(
        mut inbound: Box<dyn Inbound>,
        dispatcher: Dispatcher,
    ) -> std::io::Result<Self> {
        let (shutdown, shutdown_rx) = mpsc::channel::<()>();

        let thread = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || {
                debug!("listener started");
                loop {
                    match shutdown_rx.try_recv() {
                        Ok(()) | Err(TryRecvError::Disconnected) => break,
                        Err(TryRecvError::Empty) => {}
                    }

                    match inbound.poll() {
                        Ok(Some(frame)) => {
                            if let Err(err) = dispatcher.process_frame(frame) {
                                warn!(error = %err, "dropping inbound frame");
                            }
                        }
                        Ok(None) => thread::sleep(IDLE_INTERVAL),
                        Err(FrameError::ConnectionClosed) => {
                            debug!("link closed by peer");
                            break;
                        }
                        Err(err) => {
                            warn!(error = %err, "receive failed");
                            thread::sleep(IDLE_INTERVAL);
                        }
                    }
                }
                debug!("listener stopped");
            })?;

        Ok(Self { shutdown, thread })
    }

    /// Signal the thread and wait for it to exit.
    pub(crate) fn stop(self) {
        let _ = self.shutdown.send(());
        if self.thread.join().is_err() {
            warn!("listener thread panicked");
        }
    }
}
