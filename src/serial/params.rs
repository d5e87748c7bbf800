use core::fmt;
use std::fmt::{Display, Formatter};

use crate::Error;

/// Highest baud rate the adapter link accepts.
pub const MAX_BAUD: u32 = 6_000_000;

#[derive(Debug, PartialEq, Clone, Copy, Hash)]
pub enum StopBits {
    One,
    Two,
}

#[derive(Debug, PartialEq, Clone, Copy, Hash)]
pub enum Parity {
    None,
    Odd,
    Even,
}

#[derive(Debug, PartialEq, Clone, Copy, Hash)]
pub enum DataBits {
    Seven,
    Eight,
}

#[derive(Debug, PartialEq, Clone, Hash)]
pub struct SerialParams {
    pub baud: u32,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
    pub parity: Parity,
}

impl SerialParams {
    /// The adapter link always runs 8N1; only the baud rate varies.
    pub fn gpib_default(baud: u32) -> Self {
        SerialParams {
            baud,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
        }
    }
}

/// Parse and range-check a baud rate from the command line.
pub fn parse_baud(value: &str) -> crate::Result<u32> {
    let baud: i64 = value
        .trim()
        .parse()
        .map_err(|_| Error::BaudOutOfRange(value.to_string()))?;
    if baud <= 0 || baud > MAX_BAUD as i64 {
        return Err(Error::BaudOutOfRange(value.to_string()));
    }
    Ok(baud as u32)
}

impl Display for SerialParams {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let x = format!(
            "{}::{}{}{}",
            self.baud, self.data_bits, self.parity, self.stop_bits
        );
        f.write_str(&x)
    }
}

#[allow(clippy::from_over_into)]
impl Into<tokio_serial::StopBits> for StopBits {
    fn into(self) -> tokio_serial::StopBits {
        match self {
            StopBits::One => tokio_serial::StopBits::One,
            StopBits::Two => tokio_serial::StopBits::Two,
        }
    }
}

#[allow(clippy::from_over_into)]
impl Into<tokio_serial::Parity> for Parity {
    fn into(self) -> tokio_serial::Parity {
        match self {
            Parity::None => tokio_serial::Parity::None,
            Parity::Odd => tokio_serial::Parity::Odd,
            Parity::Even => tokio_serial::Parity::Even,
        }
    }
}

#[allow(clippy::from_over_into)]
impl Into<tokio_serial::DataBits> for DataBits {
    fn into(self) -> tokio_serial::DataBits {
        match self {
            DataBits::Seven => tokio_serial::DataBits::Seven,
            DataBits::Eight => tokio_serial::DataBits::Eight,
        }
    }
}

impl Display for DataBits {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let x = match self {
            DataBits::Seven => "7",
            DataBits::Eight => "8",
        };
        f.write_str(x)
    }
}

impl Display for Parity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let x = match self {
            Parity::None => "N",
            Parity::Odd => "O",
            Parity::Even => "E",
        };
        f.write_str(x)
    }
}

impl Display for StopBits {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let x = match self {
            StopBits::One => "1",
            StopBits::Two => "2",
        };
        f.write_str(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpib_default_is_8n1() {
        let params = SerialParams::gpib_default(230400);
        assert_eq!(
            params,
            SerialParams {
                baud: 230400,
                data_bits: DataBits::Eight,
                stop_bits: StopBits::One,
                parity: Parity::None,
            }
        );
        assert_eq!(params.to_string(), "230400::8N1");
    }

    #[test]
    fn baud_bounds() {
        assert_eq!(parse_baud("230400").unwrap(), 230400);
        assert_eq!(parse_baud("6000000").unwrap(), 6_000_000);
        assert!(matches!(parse_baud("0"), Err(Error::BaudOutOfRange(_))));
        assert!(matches!(parse_baud("-9600"), Err(Error::BaudOutOfRange(_))));
        assert!(matches!(
            parse_baud("6000001"),
            Err(Error::BaudOutOfRange(_))
        ));
        assert!(matches!(parse_baud("fast"), Err(Error::BaudOutOfRange(_))));
    }
}
