//! Length-prefixed JSON framing over any async byte stream.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};

use crate::error::{WireError, WireResult};

/// Per-frame payload cap. Anything larger is treated as a protocol error.
pub const MAX_FRAME_LEN: usize = 10 * 1024 * 1024;

/// Marker for boxed transport streams (plain TCP or TLS).
pub trait Io: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Io for T {}

/// A type-erased transport stream.
pub type BoxedIo = Box<dyn Io>;

/// Reading half of a framed stream.
pub struct FrameReader<R> {
    inner: R,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Wrap a raw read half.
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Receive and decode the next frame.
    ///
    /// Returns `Ok(None)` on a clean end-of-stream (the peer shut down its
    /// write half between frames).
    ///
    /// # Errors
    ///
    /// Fails on I/O errors, truncated frames, oversized frames, and
    /// payloads that do not decode as `T`.
    pub async fn recv<T: DeserializeOwned>(&mut self) -> WireResult<Option<T>> {
        let Some(len) = self.read_len().await? else {
            return Ok(None);
        };
        let len = len as usize;
        if len > MAX_FRAME_LEN {
            return Err(WireError::FrameTooLarge(len));
        }

        let mut payload = vec![0u8; len];
        self.inner
            .read_exact(&mut payload)
            .await
            .map_err(|err| match err.kind() {
                std::io::ErrorKind::UnexpectedEof => WireError::UnexpectedEof,
                _ => WireError::Io(err),
            })?;

        let msg = serde_json::from_slice(&payload).map_err(WireError::Decode)?;
        Ok(Some(msg))
    }

    /// Read the 4-byte length prefix, distinguishing clean EOF (no bytes at
    /// all) from a truncated prefix.
    async fn read_len(&mut self) -> WireResult<Option<u32>> {
        let mut buf = [0u8; 4];
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.inner.read(&mut buf[filled..]).await?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(WireError::UnexpectedEof);
            }
            filled += n;
        }
        Ok(Some(u32::from_be_bytes(buf)))
    }
}

/// Writing half of a framed stream.
pub struct FrameWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Wrap a raw write half.
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Encode and send one frame.
    ///
    /// # Errors
    ///
    /// Fails on encode errors, oversized payloads, and I/O errors.
    pub async fn send<T: Serialize>(&mut self, msg: &T) -> WireResult<()> {
        let payload = serde_json::to_vec(msg).map_err(WireError::Encode)?;
        if payload.len() > MAX_FRAME_LEN {
            return Err(WireError::FrameTooLarge(payload.len()));
        }
        #[allow(clippy::cast_possible_truncation)]
        let len = payload.len() as u32;
        self.inner.write_all(&len.to_be_bytes()).await?;
        self.inner.write_all(&payload).await?;
        self.inner.flush().await?;
        Ok(())
    }

    /// Orderly half-close: flush and shut down the write side so the peer
    /// observes a clean end-of-stream.
    ///
    /// # Errors
    ///
    /// Fails if the underlying shutdown fails.
    pub async fn shutdown(&mut self) -> WireResult<()> {
        self.inner.shutdown().await?;
        Ok(())
    }
}

/// A framed bidirectional connection over a type-erased transport stream.
pub struct FramedConnection {
    reader: FrameReader<ReadHalf<BoxedIo>>,
    writer: FrameWriter<WriteHalf<BoxedIo>>,
}

impl FramedConnection {
    /// Frame an established transport stream.
    #[must_use]
    pub fn new(io: BoxedIo) -> Self {
        let (read_half, write_half) = tokio::io::split(io);
        Self {
            reader: FrameReader::new(read_half),
            writer: FrameWriter::new(write_half),
        }
    }

    /// Split into independently owned read and write halves.
    #[must_use]
    pub fn split(
        self,
    ) -> (
        FrameReader<ReadHalf<BoxedIo>>,
        FrameWriter<WriteHalf<BoxedIo>>,
    ) {
        (self.reader, self.writer)
    }

    /// Receive the next frame. See [`FrameReader::recv`].
    ///
    /// # Errors
    ///
    /// See [`FrameReader::recv`].
    pub async fn recv<T: DeserializeOwned>(&mut self) -> WireResult<Option<T>> {
        self.reader.recv().await
    }

    /// Send one frame. See [`FrameWriter::send`].
    ///
    /// # Errors
    ///
    /// See [`FrameWriter::send`].
    pub async fn send<T: Serialize>(&mut self, msg: &T) -> WireResult<()> {
        self.writer.send(msg).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Ping {
        seq: u32,
        note: String,
    }

    #[tokio::test]
    async fn test_roundtrip_preserves_boundaries() {
        let (client, server) = tokio::io::duplex(1024);
        let mut writer = FrameWriter::new(client);
        let mut reader = FrameReader::new(server);

        for seq in 0..3 {
            writer
                .send(&Ping {
                    seq,
                    note: "hello".into(),
                })
                .await
                .unwrap();
        }
        writer.shutdown().await.unwrap();

        for seq in 0..3 {
            let got: Ping = reader.recv().await.unwrap().unwrap();
            assert_eq!(got.seq, seq);
        }
        let eof: Option<Ping> = reader.recv().await.unwrap();
        assert!(eof.is_none());
    }

    #[tokio::test]
    async fn test_clean_eof_between_frames() {
        let (client, server) = tokio::io::duplex(64);
        drop(client);
        let mut reader = FrameReader::new(server);
        let got: Option<Ping> = reader.recv().await.unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn test_truncated_prefix_is_an_error() {
        let (mut client, server) = tokio::io::duplex(64);
        tokio::io::AsyncWriteExt::write_all(&mut client, &[0u8, 0])
            .await
            .unwrap();
        drop(client);

        let mut reader = FrameReader::new(server);
        let err = reader.recv::<Ping>().await.unwrap_err();
        assert!(matches!(err, WireError::UnexpectedEof));
    }

    #[tokio::test]
    async fn test_truncated_payload_is_an_error() {
        let (mut client, server) = tokio::io::duplex(64);
        // Prefix promises 8 bytes, only 3 arrive.
        tokio::io::AsyncWriteExt::write_all(&mut client, &8u32.to_be_bytes())
            .await
            .unwrap();
        tokio::io::AsyncWriteExt::write_all(&mut client, b"abc")
            .await
            .unwrap();
        drop(client);

        let mut reader = FrameReader::new(server);
        let err = reader.recv::<Ping>().await.unwrap_err();
        assert!(matches!(err, WireError::UnexpectedEof));
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let (mut client, server) = tokio::io::duplex(64);
        #[allow(clippy::cast_possible_truncation)]
        let len = (MAX_FRAME_LEN + 1) as u32;
        tokio::io::AsyncWriteExt::write_all(&mut client, &len.to_be_bytes())
            .await
            .unwrap();

        let mut reader = FrameReader::new(server);
        let err = reader.recv::<Ping>().await.unwrap_err();
        assert!(matches!(err, WireError::FrameTooLarge(_)));
    }
}
