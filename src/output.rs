use std::io;
use std::path::Path;

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::Error;

/// Destination for captured bytes: append sequentially, report failure.
#[async_trait]
pub trait Sink: Send {
    async fn append(&mut self, bytes: &[u8]) -> io::Result<()>;
}

/// File-backed sink. The file is created if absent and opened for writing
/// without truncation; it is never rewound.
#[derive(Debug)]
pub struct FileSink {
    file: File,
}

impl FileSink {
    pub async fn create(path: &Path) -> crate::Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .open(path)
            .await
            .map_err(|source| Error::OutputOpen {
                path: path.display().to_string(),
                source,
            })?;
        Ok(FileSink { file })
    }

    pub async fn finish(mut self) -> crate::Result<()> {
        self.file.flush().await.map_err(Error::OutputWrite)
    }
}

#[async_trait]
impl Sink for FileSink {
    async fn append(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.file.write_all(bytes).await
    }
}

#[async_trait]
impl Sink for Vec<u8> {
    async fn append(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.extend_from_slice(bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_sink_appends_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.bmp");

        let mut sink = FileSink::create(&path).await.unwrap();
        sink.append(b"BM").await.unwrap();
        sink.append(b"header").await.unwrap();
        sink.append(b"pixels").await.unwrap();
        sink.finish().await.unwrap();

        let written = std::fs::read(&path).unwrap();
        assert_eq!(written, b"BMheaderpixels");
    }

    #[tokio::test]
    async fn create_fails_with_output_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no/such/dir/shot.bmp");

        let err = FileSink::create(&path).await.unwrap_err();
        assert!(matches!(err, Error::OutputOpen { .. }));
        assert_eq!(err.exit_code(), 7);
    }

    #[tokio::test]
    async fn vec_sink_collects_bytes() {
        let mut sink: Vec<u8> = Vec::new();
        Sink::append(&mut sink, &[1, 2, 3]).await.unwrap();
        Sink::append(&mut sink, &[4]).await.unwrap();
        assert_eq!(sink, vec![1, 2, 3, 4]);
    }
}
