//! Command dialect of the serial-to-GPIB adapter. Every command is a bare
//! ASCII string terminated with a carriage return, no line feed.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;

use crate::address::GpibAddress;
use crate::Error;

/// Benign probe used to kick any half-finished transaction out of the
/// adapter before the real handshake starts.
const PROBE_PREAMBLE: &[u8] = b"\r\r+read\r";
const QUERY_VERSION: &[u8] = b"+ver\r";
const CONTINUE_READ: &[u8] = b"+read\r";
const TERMINATOR: &[u8] = b"\r";

const MODE_ADDRESSABLE: &str = "++mode 1";
const HARDCOPY_START: &str = "HARDC STAR";

const FLUSH_POLL: Duration = Duration::from_millis(10);
const VERSION_SETTLE: Duration = Duration::from_millis(100);

/// Byte channel the driver speaks over. Implemented by the serial
/// transport; tests substitute a scripted mock.
#[async_trait]
pub trait Transport: Send {
    async fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Returns whatever arrived within the transport's timeout window.
    /// Empty means "nothing yet", distinct from a hard I/O failure.
    async fn read_chunk(&mut self) -> io::Result<Vec<u8>>;
}

/// Addressing and hardcopy trigger, concatenated into one write.
pub fn capture_sequence(address: GpibAddress) -> String {
    format!(
        "++addr {}\r{}\r{}\r",
        address, MODE_ADDRESSABLE, HARDCOPY_START
    )
}

pub struct AdapterDriver<T> {
    transport: T,
    flush_poll: Duration,
    version_settle: Duration,
}

impl<T: Transport> AdapterDriver<T> {
    pub fn new(transport: T) -> Self {
        AdapterDriver {
            transport,
            flush_poll: FLUSH_POLL,
            version_settle: VERSION_SETTLE,
        }
    }

    /// Drain the adapter's inbound buffer until a read comes back empty.
    pub async fn flush_stale_input(&mut self) -> crate::Result<()> {
        log::debug!("clearing stale adapter input");
        self.transport
            .write_all(PROBE_PREAMBLE)
            .await
            .map_err(Error::CommandWrite)?;
        loop {
            sleep(self.flush_poll).await;
            let stale = self
                .transport
                .read_chunk()
                .await
                .map_err(Error::FlushRead)?;
            if stale.is_empty() {
                break;
            }
            log::debug!("discarded {} stale bytes", stale.len());
        }
        Ok(())
    }

    /// Liveness probe. A missing or empty reply means nobody is out there.
    pub async fn query_version(&mut self) -> crate::Result<String> {
        self.transport
            .write_all(QUERY_VERSION)
            .await
            .map_err(Error::CommandWrite)?;
        sleep(self.version_settle).await;
        let reply = self
            .transport
            .read_chunk()
            .await
            .map_err(|_| Error::AdapterUnresponsive)?;
        if reply.is_empty() {
            return Err(Error::AdapterUnresponsive);
        }
        Ok(String::from_utf8_lossy(&reply).trim().to_string())
    }

    pub async fn configure_and_trigger(&mut self, address: GpibAddress) -> crate::Result<()> {
        log::debug!("triggering hardcopy at address {}", address);
        let sequence = capture_sequence(address);
        self.transport
            .write_all(sequence.as_bytes())
            .await
            .map_err(Error::CommandWrite)
    }

    /// Initial request for the data phase.
    pub async fn start_read(&mut self) -> crate::Result<()> {
        self.transport
            .write_all(CONTINUE_READ)
            .await
            .map_err(Error::CommandWrite)
    }

    /// Keep-alive nudge when the stream has gone quiet.
    pub async fn nudge_read(&mut self) -> crate::Result<()> {
        self.transport
            .write_all(CONTINUE_READ)
            .await
            .map_err(Error::RetryWrite)
    }

    pub async fn read_data(&mut self) -> crate::Result<Vec<u8>> {
        self.transport.read_chunk().await.map_err(Error::StreamRead)
    }

    /// Courtesy terminator after a completed capture, best-effort only.
    pub async fn send_terminator(&mut self) {
        let _ = self.transport.write_all(TERMINATOR).await;
    }
}


#[cfg(test)]
mod tests {
    use super::testing::MockTransport;
    use super::*;

    #[test]
    fn capture_sequence_format() {
        let addr = GpibAddress::new(7).unwrap();
        assert_eq!(capture_sequence(addr), "++addr 7\r++mode 1\rHARDC STAR\r");
    }

    #[tokio::test(start_paused = true)]
    async fn flush_drains_until_empty() {
        let mut transport = MockTransport::new();
        transport.push_data(b"stale reply");
        transport.push_data(b"more");
        let writes = transport.writes();
        let mut driver = AdapterDriver::new(transport);

        driver.flush_stale_input().await.unwrap();

        let writes = writes.lock().unwrap();
        assert_eq!(writes.as_slice(), &[b"\r\r+read\r".to_vec()]);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_surfaces_read_failures() {
        let mut transport = MockTransport::new();
        transport.push_fail();
        let mut driver = AdapterDriver::new(transport);

        let err = driver.flush_stale_input().await.unwrap_err();
        assert!(matches!(err, Error::FlushRead(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn version_reply_is_trimmed() {
        let mut transport = MockTransport::new();
        transport.push_data(b"GPIB-SERIAL 488.1 bridge\r\n");
        let mut driver = AdapterDriver::new(transport);

        let version = driver.query_version().await.unwrap();
        assert_eq!(version, "GPIB-SERIAL 488.1 bridge");
    }

    #[tokio::test(start_paused = true)]
    async fn silent_adapter_is_unresponsive() {
        let transport = MockTransport::new();
        let mut driver = AdapterDriver::new(transport);

        let err = driver.query_version().await.unwrap_err();
        assert!(matches!(err, Error::AdapterUnresponsive));
    }
}
