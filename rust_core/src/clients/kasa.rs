//! TP-Link Kasa smart-home client (legacy IOT protocol)
//!
//! Requests are JSON documents sent over TCP port 9999. Each message is
//! prefixed with its length as a big-endian u32 and obfuscated with an XOR
//! autokey cipher seeded with 171. A fresh connection is used per request.

use crate::error::DeviceError;
use serde_json::Value;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

pub const KASA_PORT: u16 = 9999;

const INITIAL_KEY: u8 = 171;

/// Responses larger than this are treated as garbage
const MAX_RESPONSE_LEN: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct KasaClient {
    host: String,
    port: u16,
    io_timeout: Duration,
}

impl KasaClient {
    pub fn new(host: &str, io_timeout: Duration) -> Self {
        let (host, port) = match host.rsplit_once(':') {
            Some((h, p)) => match p.parse::<u16>() {
                Ok(port) => (h.to_string(), port),
                Err(_) => (host.to_string(), KASA_PORT),
            },
            None => (host.to_string(), KASA_PORT),
        };
        Self {
            host,
            port,
            io_timeout,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Send one request document and return the decoded response
    pub async fn request(&self, payload: &Value) -> Result<Value, DeviceError> {
        let frame = encode_frame(payload.to_string().as_bytes());

        let response = timeout(self.io_timeout, self.round_trip(&frame))
            .await
            .map_err(|_| DeviceError::Timeout {
                host: self.host.clone(),
                timeout: self.io_timeout,
            })??;

        serde_json::from_slice(&response).map_err(|e| DeviceError::Protocol {
            host: self.host.clone(),
            reason: format!("response is not JSON: {}", e),
        })
    }

    async fn round_trip(&self, frame: &[u8]) -> Result<Vec<u8>, DeviceError> {
        let unreachable = |source: std::io::Error| DeviceError::Unreachable {
            host: self.host.clone(),
            source,
        };

        let mut stream = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(unreachable)?;
        stream.write_all(frame).await.map_err(unreachable)?;

        let mut len_buf = [0u8; 4];
        stream.read_exact(&mut len_buf).await.map_err(unreachable)?;
        let len = u32::from_be_bytes(len_buf) as usize;
        if len > MAX_RESPONSE_LEN {
            return Err(DeviceError::Protocol {
                host: self.host.clone(),
                reason: format!("response length {} exceeds limit", len),
            });
        }

        let mut body = vec![0u8; len];
        stream.read_exact(&mut body).await.map_err(unreachable)?;
        Ok(decrypt(&body))
    }
}

pub fn encrypt(plain: &[u8]) -> Vec<u8> {
    let mut key = INITIAL_KEY;
    plain
        .iter()
        .map(|&b| {
            key ^= b;
            key
        })
        .collect()
}

pub fn decrypt(cipher: &[u8]) -> Vec<u8> {
    let mut key = INITIAL_KEY;
    cipher
        .iter()
        .map(|&b| {
            let plain = key ^ b;
            key = b;
            plain
        })
        .collect()
}

/// Length-prefixed, encrypted frame ready to write to the socket
pub fn encode_frame(plain: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(plain.len() + 4);
    frame.extend_from_slice(&(plain.len() as u32).to_be_bytes());
    frame.extend_from_slice(&encrypt(plain));
    frame
}
