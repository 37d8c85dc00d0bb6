/*
[INPUT]:  EventReceiver fed by the user stream session
[OUTPUT]: One JSON line per private event on the given writer
[POS]:    Consumer layer - output queue drain
[UPDATE]: When changing the output format
*/

use anyhow::{Context, Result};
use deribit_adapter::EventReceiver;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

/// Drain `events` into `out` until the session drops its sender.
///
/// Returns the number of events written.
pub async fn forward_events<W>(mut events: EventReceiver, mut out: W) -> Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut forwarded = 0u64;
    while let Some(event) = events.recv().await {
        debug!(kind = event.kind(), subject = event.subject(), "private event received");

        let mut line = serde_json::to_vec(&event.message).context("encode event")?;
        line.push(b'\n');
        out.write_all(&line).await.context("write event")?;
        out.flush().await.context("flush event")?;
        forwarded += 1;
    }

    info!(forwarded, "event queue closed");
    Ok(forwarded)
}
