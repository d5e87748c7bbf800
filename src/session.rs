//! Capture orchestration: probe the adapter, trigger the hardcopy, then
//! drain the instrument's byte stream into the sink.
//!
//! The stream carries no length header and no end-of-transmission marker
//! at this layer, so completion is inferred from silence: once a
//! keep-alive nudge goes unanswered for a full stall window, the transfer
//! is judged finished. The thresholds encode one instrument's known
//! timing and all live in [`CaptureConfig`].

use std::io::Write as _;
use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::adapter::{AdapterDriver, Transport};
use crate::address::GpibAddress;
use crate::output::Sink;
use crate::Error;

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Silence window after which a keep-alive nudge is sent.
    pub stall_window: Duration,
    /// Pacing delay between polls of the transport.
    pub poll_interval: Duration,
    /// Wait between the hardcopy trigger and the first read request, to
    /// let the instrument start producing the stream.
    pub trigger_settle: Duration,
    /// Consecutive unanswered nudges that end the capture.
    pub max_stall_retries: u32,
    /// Bytes per cosmetic progress mark.
    pub progress_chunk: usize,
    /// Wait before closing the port after a completed capture.
    pub linger: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        CaptureConfig {
            stall_window: Duration::from_millis(1000),
            poll_interval: Duration::from_millis(20),
            trigger_settle: Duration::from_millis(500),
            max_stall_retries: 1,
            progress_chunk: 1024,
            linger: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CaptureStats {
    pub bytes: u64,
    pub nudges: u32,
}

/// Terminal progress display: one dot per chunk of data, a colon per
/// stall nudge. Cosmetic only.
struct Progress {
    chunk: usize,
    since_mark: usize,
}

impl Progress {
    fn new(chunk: usize) -> Self {
        Progress {
            chunk,
            since_mark: 0,
        }
    }

    fn data(&mut self, count: usize) {
        self.since_mark += count;
        if self.since_mark > self.chunk {
            print!(".");
            let _ = std::io::stdout().flush();
            self.since_mark -= self.chunk;
        }
    }

    fn stall(&mut self) {
        print!(":");
        let _ = std::io::stdout().flush();
    }

    fn finish(&self) {
        println!();
    }
}

pub struct CaptureSession<T> {
    driver: AdapterDriver<T>,
    config: CaptureConfig,
}

impl<T: Transport> CaptureSession<T> {
    pub fn new(driver: AdapterDriver<T>, config: CaptureConfig) -> Self {
        CaptureSession { driver, config }
    }

    /// Clear stale adapter state and verify something answers the version
    /// probe. Returns the adapter's identification string.
    pub async fn probe(&mut self) -> crate::Result<String> {
        self.driver.flush_stale_input().await?;
        self.driver.query_version().await
    }

    /// Configure addressing, trigger the hardcopy and stream the result
    /// into `sink` until the stream is judged complete. Consumes the
    /// session; the transport closes when this returns, on every path.
    pub async fn capture<S: Sink>(
        mut self,
        address: GpibAddress,
        sink: &mut S,
    ) -> crate::Result<CaptureStats> {
        self.driver.configure_and_trigger(address).await?;
        sleep(self.config.trigger_settle).await;
        self.driver.start_read().await?;
        let stats = self.stream(sink).await?;
        log::debug!(
            "capture complete: {} bytes, {} keep-alive nudges",
            stats.bytes,
            stats.nudges
        );
        self.driver.send_terminator().await;
        sleep(self.config.linger).await;
        Ok(stats)
    }

    async fn stream<S: Sink>(&mut self, sink: &mut S) -> crate::Result<CaptureStats> {
        let mut stats = CaptureStats::default();
        let mut progress = Progress::new(self.config.progress_chunk);
        let mut idle_since = Instant::now();
        let mut stalls = 0u32;
        loop {
            let chunk = self.driver.read_data().await?;
            if !chunk.is_empty() {
                sink.append(&chunk).await.map_err(Error::OutputWrite)?;
                stats.bytes += chunk.len() as u64;
                stalls = 0;
                idle_since = Instant::now();
                progress.data(chunk.len());
            } else if idle_since.elapsed() > self.config.stall_window {
                // Quiet for a full window: kick the adapter with another
                // read request and see whether more data follows.
                self.driver.nudge_read().await?;
                stats.nudges += 1;
                stalls += 1;
                idle_since = Instant::now();
                progress.stall();
                if stalls > self.config.max_stall_retries {
                    break;
                }
            }
            sleep(self.config.poll_interval).await;
        }
        progress.finish();
        Ok(stats)
    }
}
