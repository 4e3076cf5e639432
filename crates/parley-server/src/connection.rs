//! Blocking driver for one share connection.
//!
//! A reader thread pulls raw frames off the socket and forwards them over a
//! channel; the calling thread owns the session and dispatches frames in
//! order. When the reader sees end of stream it clears the session's
//! running flag, which cancels any file still being streamed.

use std::net::TcpStream;
use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use parley_transfer::{FramedTransport, ShareContext, TransferSession};
use tracing::{debug, info, warn};

/// How often the dispatch loop notices an externally cancelled session.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

pub fn serve_connection(
    stream: TcpStream,
    context: ShareContext,
    max_frame_size: usize,
) -> anyhow::Result<()> {
    stream.set_nodelay(true)?;
    let transport = FramedTransport::new(stream, max_frame_size);
    let peer_addr = transport.peer_addr()?;
    let mut reader = transport.reader()?;

    let mut session = TransferSession::new(context, transport, None);
    let running = session.running_flag();
    info!(session = %session.id(), peer = %peer_addr, "Share connection accepted");

    let (tx, rx) = mpsc::channel::<Vec<u8>>();
    let session_id = session.id();
    let reader_thread = thread::Builder::new()
        .name(format!("parley-reader-{peer_addr}"))
        .spawn(move || {
            loop {
                match reader.read_frame() {
                    Ok(Some(frame)) => {
                        if tx.send(frame).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        debug!(session = %session_id, "Peer closed the connection");
                        break;
                    }
                    Err(e) => {
                        debug!(session = %session_id, error = %e, "Read side failed");
                        break;
                    }
                }
            }
            running.store(false, Ordering::SeqCst);
        })?;

    while session.is_running() {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(frame) => {
                if let Err(e) = session.handle_frame(&frame) {
                    warn!(session = %session.id(), error = %e, "Transport failed");
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    session.close();
    drop(rx);
    if reader_thread.join().is_err() {
        warn!(session = %session_id, "Reader thread panicked");
    }
    Ok(())
}
