// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use crate::codec::ReportCodec;
use common::report::Report;
use futures::StreamExt;
use std::{
    io::{self, ErrorKind},
    time::Duration,
};
use tokio::{
    io::AsyncWriteExt,
    net::TcpStream,
    time::{Instant, sleep_until, timeout},
};
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

/// Connection parameters of a [`GpsdClient`].
#[derive(Clone, Debug)]
pub struct StreamConfig {
    /// `host:port` of the gpsd daemon.
    pub address: String,
    /// Upper bound for establishing the TCP connection.
    pub connect_timeout: Duration,
    /// Longest time a single read waits for data before reporting [`StreamEvent::Idle`].
    pub read_timeout: Duration,
    /// Wait time before the next attempt after a failed connect.
    pub connect_backoff: Duration,
    /// Wait time before reconnecting after a lost connection.
    pub read_backoff: Duration,
}

impl StreamConfig {
    pub fn new(address: impl Into<String>) -> Self {
        StreamConfig {
            address: address.into(),
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(5),
            connect_backoff: Duration::from_secs(2),
            read_backoff: Duration::from_secs(1),
        }
    }
}

/// The outcome of one [`GpsdClient::poll`] call.
#[derive(Debug)]
pub enum StreamEvent {
    /// The connection is established and the watch command was sent.
    Connected,
    /// Connecting failed, the next attempt is scheduled after the connect backoff.
    ConnectFailed(io::Error),
    /// A complete report was decoded.
    Report(Report),
    /// Nothing arrived before the read timeout or the caller's deadline. Not an error.
    Idle,
    /// The connection failed or was closed by gpsd. The partial line is dropped and
    /// a reconnect is scheduled after the read backoff.
    ConnectionLost(io::Error),
}

enum Connection {
    Disconnected { retry_at: Instant },
    Connected(Framed<TcpStream, ReportCodec>),
}

/// A never giving up client of the gpsd daemon.
///
/// The client is a two state machine. While `Disconnected` it waits for the retry
/// time and tries to connect. While `Connected` it reads reports. Every error moves
/// it back to `Disconnected` and drops the socket, so a connection is closed on every
/// reconnect path. All waiting is done with [`tokio::time`], tests can pause and
/// advance the clock to run through many reconnects instantly.
pub struct GpsdClient {
    config: StreamConfig,
    connection: Connection,
}

impl GpsdClient {
    /// Creates a disconnected client. The first [`GpsdClient::poll`] connects immediately.
    pub fn new(config: StreamConfig) -> Self {
        GpsdClient {
            config,
            connection: Connection::Disconnected {
                retry_at: Instant::now(),
            },
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.connection, Connection::Connected(_))
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Advances the client by one step.
    ///
    /// With a `deadline` the call returns [`StreamEvent::Idle`] at the latest when the
    /// deadline is reached. Reports that are already buffered are still returned when the
    /// deadline has passed. Without a deadline a connected client waits up to the read timeout.
    pub async fn poll(&mut self, deadline: Option<Instant>) -> StreamEvent {
        let read_wait = match deadline {
            Some(deadline) => deadline
                .saturating_duration_since(Instant::now())
                .min(self.config.read_timeout),
            None => self.config.read_timeout,
        };
        match &mut self.connection {
            Connection::Disconnected { retry_at } => {
                let retry_at = *retry_at;
                if let Some(deadline) = deadline
                    && deadline < retry_at
                {
                    sleep_until(deadline).await;
                    return StreamEvent::Idle;
                }
                sleep_until(retry_at).await;
                self.connect().await
            }
            Connection::Connected(framed) => match timeout(read_wait, framed.next()).await {
                Err(_) => StreamEvent::Idle,
                Ok(Some(Ok(report))) => StreamEvent::Report(report),
                Ok(Some(Err(e))) => self.lose_connection(e),
                Ok(None) => self.lose_connection(io::Error::new(
                    ErrorKind::UnexpectedEof,
                    "gpsd closed the connection",
                )),
            },
        }
    }

    async fn connect(&mut self) -> StreamEvent {
        match open_stream(&self.config).await {
            Ok(framed) => {
                info!("Connected to gpsd at {}", self.config.address);
                self.connection = Connection::Connected(framed);
                StreamEvent::Connected
            }
            Err(e) => {
                warn!("Failed to connect to gpsd at {}. Error: {e}", self.config.address);
                self.connection = Connection::Disconnected {
                    retry_at: Instant::now() + self.config.connect_backoff,
                };
                StreamEvent::ConnectFailed(e)
            }
        }
    }

    fn lose_connection(&mut self, error: io::Error) -> StreamEvent {
        warn!("Lost connection to gpsd. Error: {error}");
        self.connection = Connection::Disconnected {
            retry_at: Instant::now() + self.config.read_backoff,
        };
        StreamEvent::ConnectionLost(error)
    }
}

async fn open_stream(config: &StreamConfig) -> io::Result<Framed<TcpStream, ReportCodec>> {
    let mut stream = timeout(
        config.connect_timeout,
        TcpStream::connect(config.address.as_str()),
    )
    .await
    .map_err(|_| io::Error::new(ErrorKind::TimedOut, "connecting to gpsd timed out"))??;
    stream
        .write_all(gpsd_proto::ENABLE_WATCH_CMD.as_bytes())
        .await?;
    debug!("Enabled gpsd JSON watch mode");
    Ok(Framed::new(stream, ReportCodec::new()))
}
