//! The capture API server: listener, per-stream handlers, graceful drain.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dragnet_config::ApiConfig;
use dragnet_core::Target;
use dragnet_engine::{
    CaptureEngine, FramedRequestSource, FramedResponseSink, StaticResolver, WireDialer,
};
use dragnet_wire::{Listener, TlsPaths, WireError};
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Errors raised while bringing the server up.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Listener or TLS setup failed.
    #[error("unable to start server: {0}")]
    Wire(#[from] WireError),
}

/// The capture API service: one engine shared by all accepted streams.
pub struct Server {
    listener: Listener,
    engine: Arc<CaptureEngine<WireDialer>>,
    local_addr: SocketAddr,
}

impl Server {
    /// Bind the listener and assemble the engine from the configuration.
    ///
    /// # Errors
    ///
    /// Fails if the TLS material cannot be loaded or the address cannot be
    /// bound.
    pub async fn bind(config: &ApiConfig) -> Result<Self, ServerError> {
        let tls_paths = config.tls.as_ref().map(|tls| TlsPaths {
            certificate: tls.certificate.clone(),
            private_key: tls.private_key.clone(),
            ca: tls.ca.clone(),
        });

        let (server_tls, dialer) = match &tls_paths {
            None => (None, WireDialer::plaintext()),
            Some(paths) => (
                Some(dragnet_wire::server_config(paths)?),
                WireDialer::with_tls(dragnet_wire::client_config(paths)?),
            ),
        };

        let listener = Listener::bind(&config.listen.bind_addr(), server_tls).await?;
        let local_addr = listener.local_addr()?;

        let targets = config
            .agents
            .iter()
            .map(|entry| {
                let identifier = entry
                    .identifier
                    .clone()
                    .unwrap_or_else(|| entry.address.clone());
                Target::new(entry.address.clone(), identifier)
            })
            .collect();

        let engine = CaptureEngine::new(dialer, Arc::new(StaticResolver::new(targets)))
            .with_buffer(dragnet_engine::BufferPolicy {
                size: config.buffer.size,
                upper_limit: config.buffer.upper_limit,
                lower_limit: config.buffer.lower_limit,
            })
            .with_establish_timeout(Duration::from_secs(config.agent.connect_timeout_secs));

        Ok(Self {
            listener,
            engine: Arc::new(engine),
            local_addr,
        })
    }

    /// The bound address, useful when the configuration requested an
    /// ephemeral port.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept and serve streams until `shutdown` resolves, then stop
    /// accepting and let in-flight streams end naturally.
    pub async fn run(self, shutdown: impl Future<Output = ()>) {
        info!(address = %self.local_addr, "listening for capture streams");

        let mut streams = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((conn, peer)) => {
                        let engine = self.engine.clone();
                        streams.spawn(async move {
                            let (reader, writer) = conn.split();
                            let status = engine
                                .capture(
                                    FramedRequestSource::new(reader),
                                    FramedResponseSink::new(writer),
                                )
                                .await;
                            debug!(%peer, %status, "capture stream closed");
                        });
                    }
                    Err(err) => warn!(error = %err, "failed to accept connection"),
                },
            }
        }

        drop(self.listener);
        if !streams.is_empty() {
            info!(in_flight = streams.len(), "draining capture streams");
        }
        while streams.join_next().await.is_some() {}
        info!("server stopped");
    }
}
