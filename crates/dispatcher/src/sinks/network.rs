//! NetworkSink - one UDP datagram per snapshot record
//!
//! Delivery is best effort. A datagram that no one receives is not an error;
//! a record too large for one datagram is.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::str::FromStr;

use contracts::{AnalysisSnapshot, ContractError, ResultSink, SnapshotRecord};
use tokio::net::UdpSocket;
use tracing::{debug, instrument, warn};

use super::param;

/// Fits one IPv4 UDP datagram
const DEFAULT_MAX_DATAGRAM: usize = 65_000;

/// Wire encoding of the record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkFormat {
    #[default]
    Json,
    /// Compact, for receivers built against the same record types
    Bincode,
}

impl NetworkFormat {
    fn encode(self, record: &SnapshotRecord) -> Result<Vec<u8>, String> {
        match self {
            Self::Json => serde_json::to_vec(record).map_err(|e| e.to_string()),
            Self::Bincode => bincode::serialize(record).map_err(|e| e.to_string()),
        }
    }
}

impl FromStr for NetworkFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(Self::Json),
            "bincode" => Ok(Self::Bincode),
            other => Err(format!("expected json or bincode, got {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NetworkSinkConfig {
    /// Receiver address
    pub addr: SocketAddr,
    pub format: NetworkFormat,
    /// Records that encode larger than this are refused
    pub max_packet_size: usize,
}

impl NetworkSinkConfig {
    /// Read `addr` (required), `format` and `max_packet_size`
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, ContractError> {
        let addr = param(params, "addr")?.ok_or_else(|| {
            ContractError::config_validation("params.addr", "a network sink needs a receiver addr")
        })?;
        Ok(Self {
            addr,
            format: param(params, "format")?.unwrap_or_default(),
            max_packet_size: param(params, "max_packet_size")?.unwrap_or(DEFAULT_MAX_DATAGRAM),
        })
    }
}

/// Sends the pixel-free [`SnapshotRecord`] of every snapshot to one receiver
pub struct NetworkSink {
    name: String,
    config: NetworkSinkConfig,
    /// `None` once closed
    socket: Option<UdpSocket>,
}

impl NetworkSink {
    #[instrument(name = "network_sink_connect", skip(name, config), fields(target = %config.addr))]
    pub async fn new(name: impl Into<String>, config: NetworkSinkConfig) -> std::io::Result<Self> {
        let local: SocketAddr = if config.addr.is_ipv6() {
            ([0u16; 8], 0).into()
        } else {
            ([0u8; 4], 0).into()
        };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(config.addr).await?;

        let name = name.into();
        debug!(sink = %name, local = ?socket.local_addr().ok(), "NetworkSink ready");
        Ok(Self {
            name,
            config,
            socket: Some(socket),
        })
    }

    /// Build from a blueprint sink's params
    pub async fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config = NetworkSinkConfig::from_params(params)?;
        Self::new(name.clone(), config)
            .await
            .map_err(|e| ContractError::SinkConnection {
                sink_name: name,
                message: e.to_string(),
            })
    }

    fn datagram(&self, snapshot: &AnalysisSnapshot) -> Result<Vec<u8>, ContractError> {
        let bytes = self
            .config
            .format
            .encode(&snapshot.to_record())
            .map_err(|e| ContractError::sink_write(&self.name, format!("encode: {e}")))?;

        if bytes.len() > self.config.max_packet_size {
            return Err(ContractError::sink_write(
                &self.name,
                format!(
                    "{} tracks encode to {} bytes, limit is {}",
                    snapshot.tracks.len(),
                    bytes.len(),
                    self.config.max_packet_size
                ),
            ));
        }
        Ok(bytes)
    }
}

impl ResultSink for NetworkSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "network_sink_write",
        skip(self, snapshot),
        fields(sink = %self.name, sequence = snapshot.sequence)
    )]
    async fn write(&mut self, snapshot: &AnalysisSnapshot) -> Result<(), ContractError> {
        let Some(socket) = self.socket.as_ref() else {
            return Err(ContractError::sink_write(&self.name, "sink is closed"));
        };
        let datagram = self.datagram(snapshot)?;

        // refused or unreachable receivers only cost this one datagram
        match socket.send(&datagram).await {
            Ok(sent) => debug!(bytes = sent, tracks = snapshot.tracks.len(), "record sent"),
            Err(e) => warn!(sink = %self.name, error = %e, "record not sent"),
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "network_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        if self.socket.take().is_some() {
            debug!(sink = %self.name, "NetworkSink closed");
        }
        Ok(())
    }
}
