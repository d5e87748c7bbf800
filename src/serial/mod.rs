pub mod params;

pub use params::SerialParams;

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;
use tokio_serial::{FlowControl, SerialPort, SerialStream};

use crate::adapter::Transport;
use crate::Error;

const READ_BUFFER_SIZE: usize = 1024;
const READ_TIMEOUT: Duration = Duration::from_millis(1000);
const WRITE_TIMEOUT_BASE: Duration = Duration::from_millis(100);

/// Duplex byte channel to the adapter. Framing is fixed at open time;
/// the handle closes when the transport is dropped, on every exit path.
pub struct SerialTransport {
    port: SerialStream,
    read_timeout: Duration,
}

impl SerialTransport {
    pub fn open(path: &str, params: &SerialParams) -> crate::Result<Self> {
        log::debug!("opening {} at {}", path, params);
        let builder = tokio_serial::new(path, params.baud);
        let mut port = SerialStream::open(&builder).map_err(|source| Error::PortOpen {
            path: path.to_string(),
            source,
        })?;
        apply_params(&mut port, params).map_err(|source| Error::PortConfig {
            path: path.to_string(),
            source,
        })?;
        Ok(SerialTransport {
            port,
            read_timeout: READ_TIMEOUT,
        })
    }
}

fn apply_params(
    port: &mut SerialStream,
    params: &SerialParams,
) -> std::result::Result<(), tokio_serial::Error> {
    port.set_data_bits(params.data_bits.into())?;
    port.set_parity(params.parity.into())?;
    port.set_stop_bits(params.stop_bits.into())?;
    port.set_flow_control(FlowControl::None)
}

#[async_trait]
impl Transport for SerialTransport {
    async fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        // small constant plus a per-byte allowance
        let limit = WRITE_TIMEOUT_BASE + Duration::from_millis(bytes.len() as u64);
        match timeout(limit, AsyncWriteExt::write_all(&mut self.port, bytes)).await {
            Ok(x) => x,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "serial write timed out",
            )),
        }
    }

    /// One bounded read. An elapsed timeout window yields an empty chunk,
    /// which is not an error; a failed read call is.
    async fn read_chunk(&mut self) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        let fut = AsyncReadExt::read(&mut self.port, &mut buf);
        let num_read = match timeout(self.read_timeout, fut).await {
            Ok(x) => x?,
            Err(_) => 0,
        };
        buf.truncate(num_read);
        Ok(buf)
    }
}
