use async_trait::async_trait;
use buildwatch_protocol::wire;
use serde_json::Value;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;

/// One established query/reply channel to the daemon.
///
/// A handle is owned exclusively by the establishment attempt that created
/// it and issues one round trip at a time.
#[async_trait]
pub trait DaemonClient: Send {
    /// Send one wire-encoded query and wait for its reply.
    async fn query(&mut self, query: &Value) -> wire::Result<Value>;
}

/// Strategy turning a discovered endpoint path into a connected client.
///
/// `None` means "no connection", which aborts establishment. Supplied as a
/// trait object so the negotiation, registration, and clock stages can be
/// driven against a scripted fake; see
/// [`testing::ScriptedConnector`](crate::testing::ScriptedConnector).
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, sockname: &Path) -> Option<Box<dyn DaemonClient>>;
}

/// Production connector: a unix stream to the daemon's socket endpoint.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnixConnector;

#[async_trait]
impl Connector for UnixConnector {
    async fn connect(&self, sockname: &Path) -> Option<Box<dyn DaemonClient>> {
        match UnixStream::connect(sockname).await {
            Ok(stream) => Some(Box::new(UnixDaemonClient { stream })),
            Err(err) => {
                log::debug!("connect to {} failed: {err}", sockname.display());
                None
            }
        }
    }
}

struct UnixDaemonClient {
    stream: UnixStream,
}

#[async_trait]
impl DaemonClient for UnixDaemonClient {
    async fn query(&mut self, query: &Value) -> wire::Result<Value> {
        let frame = wire::encode_frame(query)?;
        self.stream.write_all(&frame).await?;
        self.stream.flush().await?;
        let reply = wire::read_frame(&mut self.stream, wire::MAX_REPLY_FRAME_BYTES).await?;
        wire::decode_frame(&reply)
    }
}
