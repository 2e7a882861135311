//! Client stream boundary traits and their framed-transport implementations.

use async_trait::async_trait;
use dragnet_core::{CaptureRequest, CaptureResponse, ClientFrame, Status};
use dragnet_wire::{BoxedIo, FrameReader, FrameWriter, WireResult};
use tokio::io::{ReadHalf, WriteHalf};

/// Client-to-server direction of a capture stream.
#[async_trait]
pub trait RequestSource: Send {
    /// Receive the next client request. `None` means the client half-closed.
    async fn recv(&mut self) -> WireResult<Option<CaptureRequest>>;
}

/// Server-to-client direction of a capture stream.
#[async_trait]
pub trait ResponseSink: Send {
    /// Deliver one in-band response to the client.
    async fn send(&mut self, response: CaptureResponse) -> WireResult<()>;

    /// Deliver the terminal status and close the stream.
    async fn close(&mut self, status: &Status) -> WireResult<()>;
}

/// [`RequestSource`] over a framed transport read half.
pub struct FramedRequestSource {
    inner: FrameReader<ReadHalf<BoxedIo>>,
}

impl FramedRequestSource {
    /// Wrap the read half of a framed client connection.
    #[must_use]
    pub fn new(inner: FrameReader<ReadHalf<BoxedIo>>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl RequestSource for FramedRequestSource {
    async fn recv(&mut self) -> WireResult<Option<CaptureRequest>> {
        self.inner.recv().await
    }
}

/// [`ResponseSink`] over a framed transport write half.
pub struct FramedResponseSink {
    inner: FrameWriter<WriteHalf<BoxedIo>>,
}

impl FramedResponseSink {
    /// Wrap the write half of a framed client connection.
    #[must_use]
    pub fn new(inner: FrameWriter<WriteHalf<BoxedIo>>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ResponseSink for FramedResponseSink {
    async fn send(&mut self, response: CaptureResponse) -> WireResult<()> {
        self.inner.send(&ClientFrame::Response(response)).await
    }

    async fn close(&mut self, status: &Status) -> WireResult<()> {
        self.inner
            .send(&ClientFrame::Trailer(status.clone()))
            .await?;
        self.inner.shutdown().await
    }
}
