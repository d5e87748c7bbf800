use std::io;

use thiserror::Error;

pub mod adapter;
pub mod address;
pub mod output;
pub mod serial;
pub mod session;

/// Failure taxonomy of a capture run. Every variant maps to a distinct,
/// stable process exit code via [`Error::exit_code`].
#[derive(Error, Debug)]
pub enum Error {
    #[error("output filename required")]
    MissingFilename,
    #[error("GPIB address {0} out of range (0..=30)")]
    AddressOutOfRange(String),
    #[error("baud rate {0} out of range (1..=6000000)")]
    BaudOutOfRange(String),
    #[error("cannot open port {path}: {source}")]
    PortOpen {
        path: String,
        source: tokio_serial::Error,
    },
    #[error("cannot configure port {path}: {source}")]
    PortConfig {
        path: String,
        source: tokio_serial::Error,
    },
    #[error("GPIB adapter did not answer the version probe")]
    AdapterUnresponsive,
    #[error("cannot open output file {path}: {source}")]
    OutputOpen { path: String, source: io::Error },
    #[error("command write failed: {0}")]
    CommandWrite(io::Error),
    #[error("read failed while capturing: {0}")]
    StreamRead(io::Error),
    #[error("output write failed: {0}")]
    OutputWrite(io::Error),
    #[error("keep-alive retry write failed: {0}")]
    RetryWrite(io::Error),
    #[error("clearing stale adapter input failed: {0}")]
    FlushRead(io::Error),
}

impl Error {
    /// Process exit code for this failure. Scripts depend on these values,
    /// so they must stay stable.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::MissingFilename => 1,
            Error::AddressOutOfRange(_) => 2,
            Error::BaudOutOfRange(_) => 3,
            Error::PortOpen { .. } => 4,
            Error::PortConfig { .. } => 5,
            Error::AdapterUnresponsive => 6,
            Error::OutputOpen { .. } => 7,
            Error::CommandWrite(_) => 8,
            Error::StreamRead(_) => 9,
            Error::OutputWrite(_) => 10,
            Error::RetryWrite(_) => 11,
            Error::FlushRead(_) => 12,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    fn io_err() -> io::Error {
        io::Error::new(io::ErrorKind::Other, "boom")
    }

    fn serial_err() -> tokio_serial::Error {
        tokio_serial::Error::new(tokio_serial::ErrorKind::Unknown, "boom")
    }

    #[test]
    fn exit_codes_are_stable() {
        let cases = vec![
            (Error::MissingFilename, 1),
            (Error::AddressOutOfRange("31".into()), 2),
            (Error::BaudOutOfRange("0".into()), 3),
            (
                Error::PortOpen {
                    path: "COM14".into(),
                    source: serial_err(),
                },
                4,
            ),
            (
                Error::PortConfig {
                    path: "COM14".into(),
                    source: serial_err(),
                },
                5,
            ),
            (Error::AdapterUnresponsive, 6),
            (
                Error::OutputOpen {
                    path: "shot.bmp".into(),
                    source: io_err(),
                },
                7,
            ),
            (Error::CommandWrite(io_err()), 8),
            (Error::StreamRead(io_err()), 9),
            (Error::OutputWrite(io_err()), 10),
            (Error::RetryWrite(io_err()), 11),
            (Error::FlushRead(io_err()), 12),
        ];
        let mut seen = std::collections::HashSet::new();
        for (err, code) in cases {
            assert_eq!(err.exit_code(), code);
            assert!(seen.insert(code), "exit code {} assigned twice", code);
            assert_ne!(code, 0);
        }
    }
}
