//! Per-connection ACK writer task (§4.6, C6). Runs alongside the read
//! loop so a slow or silent client can't block acknowledgement of batches
//! it already sent.

use fwd_protocol::Ack;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use crate::config::BATCH_ACK_TIMEOUT;
use crate::stream::BoxedWrite;

pub const ACK_CHANNEL_CAPACITY: usize = 1000;

/// Spawns the writer and returns the sender the read loop feeds chunk IDs
/// into. Dropping the sender (read loop exit) ends the task.
pub fn spawn(mut writer: BoxedWrite) -> mpsc::Sender<String> {
    let (tx, mut rx) = mpsc::channel::<String>(ACK_CHANNEL_CAPACITY);
    tokio::spawn(async move {
        while let Some(chunk) = rx.recv().await {
            if let Err(e) = write_ack(&mut writer, &chunk).await {
                tracing::warn!(error = %e, "failed to write ack, ending ack writer");
                break;
            }
        }
    });
    tx
}

async fn write_ack(writer: &mut BoxedWrite, chunk: &str) -> Result<(), fwd_protocol::ProtocolError> {
    let bytes = Ack::new(chunk).encode()?;
    tokio::time::timeout(BATCH_ACK_TIMEOUT, async {
        writer.write_all(&bytes).await?;
        writer.flush().await
    })
    .await
    .map_err(|_| {
        fwd_protocol::ProtocolError::Framing(format!(
            "ack write exceeded {:?}",
            BATCH_ACK_TIMEOUT
        ))
    })?
    .map_err(fwd_protocol::ProtocolError::Io)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_an_ack_for_each_queued_chunk() {
        let (client, mut server) = tokio::io::duplex(4096);
        let (_read_half, write_half) = tokio::io::split(client);
        let tx = spawn(Box::new(write_half));

        tx.send("chunk-1".to_owned()).await.unwrap();
        drop(tx);

        let mut buf = vec![0u8; 4096];
        let n = tokio::io::AsyncReadExt::read(&mut server, &mut buf).await.unwrap();
        let value = rmpv::decode::read_value(&mut std::io::Cursor::new(&buf[..n])).unwrap();
        let map = value.as_map().unwrap();
        assert_eq!(map[0].1.as_str().unwrap(), "chunk-1");
    }
}
