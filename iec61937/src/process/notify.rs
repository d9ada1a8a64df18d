use std::io::Write;
use std::net::{TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;

use log::{debug, warn};
use serde::Serialize;

use crate::structs::codec::CodecId;

/// Port the status listener is expected on.
pub const DEFAULT_NOTIFY_PORT: u16 = 8787;

/// Codec and channel count of the stream an output was opened for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StreamStatus {
    pub codec: CodecId,
    pub channels: u16,
}

impl StreamStatus {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Receives a status report each time the output device is (re)opened.
pub trait Notifier {
    /// Must not block the caller on delivery.
    fn notify(&mut self, status: StreamStatus);
}

impl<N: Notifier + ?Sized> Notifier for Box<N> {
    fn notify(&mut self, status: StreamStatus) {
        (**self).notify(status);
    }
}

/// Discards every report.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&mut self, _status: StreamStatus) {}
}

/// Sends one JSON line per report to a local TCP listener.
///
/// Each report is delivered from its own detached thread; failures are
/// logged there and never reach the pipeline.
#[derive(Debug, Clone)]
pub struct TcpNotifier {
    host: String,
    port: u16,
    timeout: Duration,
}

impl Default for TcpNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFY_PORT)
    }
}

impl TcpNotifier {
    pub fn new(port: u16) -> Self {
        Self {
            host: "localhost".to_string(),
            port,
            timeout: Duration::from_millis(500),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn send(host: &str, port: u16, timeout: Duration, message: &str) -> std::io::Result<()> {
        let mut last_err = None;
        for addr in (host, port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(mut stream) => {
                    stream.set_write_timeout(Some(timeout))?;
                    stream.write_all(message.as_bytes())?;
                    stream.write_all(b"\n")?;
                    return Ok(());
                }
                Err(e) => last_err = Some(e),
            }
        }

        Err(last_err.unwrap_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "no address resolved")
        }))
    }
}

impl Notifier for TcpNotifier {
    fn notify(&mut self, status: StreamStatus) {
        let message = match status.to_json() {
            Ok(message) => message,
            Err(e) => {
                warn!("cannot serialize stream status: {e}");
                return;
            }
        };

        let host = self.host.clone();
        let port = self.port;
        let timeout = self.timeout;

        let spawned = thread::Builder::new()
            .name("notify".into())
            .spawn(move || match Self::send(&host, port, timeout, &message) {
                Ok(()) => debug!("sent {message} to {host}:{port}"),
                Err(e) => debug!("status notification to {host}:{port} failed: {e}"),
            });

        if let Err(e) = spawned {
            warn!("cannot spawn notification thread: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;

    #[test]
    fn status_json_shape() -> anyhow::Result<()> {
        let status = StreamStatus {
            codec: CodecId::Ac3,
            channels: 6,
        };
        assert_eq!(status.to_json()?, r#"{"codec":"ac3","channels":6}"#);
        Ok(())
    }

    #[test]
    fn delivers_to_listener() -> anyhow::Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();

        let mut notifier = TcpNotifier::new(port).with_host("127.0.0.1");
        notifier.notify(StreamStatus {
            codec: CodecId::Pcm,
            channels: 2,
        });

        let (stream, _) = listener.accept()?;
        let mut line = String::new();
        BufReader::new(stream).read_line(&mut line)?;
        assert_eq!(line, "{\"codec\":\"pcm_s16le\",\"channels\":2}\n");
        Ok(())
    }

    #[test]
    fn unreachable_listener_is_silent() {
        let mut notifier = TcpNotifier::new(1)
            .with_host("127.0.0.1")
            .with_timeout(Duration::from_millis(10));
        notifier.notify(StreamStatus {
            codec: CodecId::Mp3,
            channels: 2,
        });
    }
}
