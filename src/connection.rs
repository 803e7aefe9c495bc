//! TCP connection handler
//!
//! Each accepted socket gets one of these tasks. It frames inbound bytes
//! into lines for the server and writes the user's outbound queue back to
//! the socket. It holds no protocol state of its own.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{AppError, FrameError};
use crate::framer::LineFramer;
use crate::server::ServerCommand;
use crate::types::ClientId;

/// Reason reported when the peer closes its end
const REMOTE_CLOSED: &str = "Remote host closed the connection";

/// Time allowed to flush the last queued lines once the user is gone
const CLOSE_GRACE: Duration = Duration::from_secs(1);

type LineSink = FramedWrite<OwnedWriteHalf, LineFramer>;

/// Drive one connection until either side closes it
///
/// `close` is cancelled when the server drops the user. Lines queued
/// before that (including the final `ERROR`) get `CLOSE_GRACE` to reach
/// the peer, then both halves of the socket are dropped whether or not
/// the peer is reading.
pub async fn handle_connection(
    stream: TcpStream,
    client_id: ClientId,
    mut outbound: mpsc::Receiver<String>,
    close: CancellationToken,
    cmd_tx: mpsc::Sender<ServerCommand>,
    max_line_len: usize,
) -> Result<(), AppError> {
    let (reader, writer) = stream.into_split();
    let mut lines = FramedRead::new(reader, LineFramer::new(max_line_len));
    let mut sink = FramedWrite::new(writer, LineFramer::new(max_line_len));

    // Socket -> ServerCommand
    let cmd_tx_read = cmd_tx.clone();
    let mut read_task = tokio::spawn(async move {
        while let Some(frame) = lines.next().await {
            match frame {
                Ok(line) => {
                    let cmd = ServerCommand::Line { client_id, line };
                    if cmd_tx_read.send(cmd).await.is_err() {
                        debug!("Server closed, ending read task for {}", client_id);
                        return None;
                    }
                }
                Err(e) => {
                    debug!("Framing error for {}: {}", client_id, e);
                    return Some(e.to_string());
                }
            }
        }
        Some(REMOTE_CLOSED.to_string())
    });

    // Outbound queue -> socket
    let mut write_task = tokio::spawn(async move {
        let reason = tokio::select! {
            reason = pump(&mut sink, &mut outbound) => reason,
            _ = close.cancelled() => None,
        };
        if reason.is_none() {
            let flushed = time::timeout(CLOSE_GRACE, finish(&mut sink, &mut outbound)).await;
            if flushed.is_err() {
                debug!("Peer of {} stopped reading; closing without flush", client_id);
            }
        }
        reason
    });

    let (reason, write_done) = tokio::select! {
        reason = &mut read_task => {
            debug!("Read task completed for {}", client_id);
            (reason.ok().flatten(), false)
        }
        reason = &mut write_task => {
            debug!("Write task completed for {}", client_id);
            read_task.abort();
            (reason.ok().flatten(), true)
        }
    };

    if let Some(reason) = reason {
        if cmd_tx
            .send(ServerCommand::Disconnect { client_id, reason })
            .await
            .is_err()
        {
            warn!("Could not report disconnect of {}: server closed", client_id);
            return Err(AppError::ChannelSend);
        }
    }

    // Ends once the server drops the user
    if !write_done {
        if let Err(e) = write_task.await {
            warn!("Write task for {} failed: {}", client_id, e);
        }
    }
    debug!("Connection task ended for {}", client_id);

    Ok(())
}

/// Write queued lines in batches until the queue closes or a write fails
async fn pump(sink: &mut LineSink, outbound: &mut mpsc::Receiver<String>) -> Option<String> {
    while let Some(line) = outbound.recv().await {
        if let Err(e) = sink.feed(line).await {
            return Some(e.to_string());
        }
        while let Ok(line) = outbound.try_recv() {
            if let Err(e) = sink.feed(line).await {
                return Some(e.to_string());
            }
        }
        if let Err(e) = sink.flush().await {
            return Some(e.to_string());
        }
    }
    None
}

/// Write whatever is still queued, then shut down the write half
async fn finish(sink: &mut LineSink, outbound: &mut mpsc::Receiver<String>) -> Result<(), FrameError> {
    outbound.close();
    while let Ok(line) = outbound.try_recv() {
        sink.feed(line).await?;
    }
    sink.close().await
}
