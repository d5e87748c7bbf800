use std::path::{Path, PathBuf};
use std::process::exit;
use std::str::FromStr;
use std::time::Duration;

use clap::{crate_version, App as ClapApp, Arg};
use env_logger::Env;
use tokio::runtime::Builder;

use tekcap::adapter::AdapterDriver;
use tekcap::address::GpibAddress;
use tekcap::output::FileSink;
use tekcap::serial::params::parse_baud;
use tekcap::serial::{SerialParams, SerialTransport};
use tekcap::session::{CaptureConfig, CaptureSession, CaptureStats};
use tekcap::Error;

#[cfg(windows)]
const DEFAULT_PORT: &str = "COM14";
#[cfg(not(windows))]
const DEFAULT_PORT: &str = "/dev/ttyUSB0";

struct Options {
    port: String,
    baud: u32,
    address: GpibAddress,
    output: PathBuf,
    stall_ms: u64,
    max_stalls: u32,
}

impl Options {
    fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            stall_window: Duration::from_millis(self.stall_ms),
            max_stall_retries: self.max_stalls,
            ..CaptureConfig::default()
        }
    }
}

fn main() {
    let mut app = ClapApp::new("tekcap")
        .version(crate_version!())
        .about("GPIB-Serial Tektronix scope screenshot tool")
        .arg(
            Arg::with_name("port")
                .long("port")
                .short('p')
                .default_value(DEFAULT_PORT)
                .help("Serial port of the GPIB adapter; uses 8,N,1 framing."),
        )
        .arg(
            Arg::with_name("baud")
                .long("baud")
                .short('b')
                .default_value("230400")
                .help("Baud rate."),
        )
        .arg(
            Arg::with_name("address")
                .long("address")
                .short('a')
                .default_value("1")
                .help("Instrument GPIB address (0-30)."),
        )
        .arg(
            Arg::with_name("stall-ms")
                .long("stall-ms")
                .default_value("1000")
                .help("Silence window in milliseconds before a keep-alive nudge."),
        )
        .arg(
            Arg::with_name("max-stalls")
                .long("max-stalls")
                .default_value("1")
                .help("Consecutive unanswered nudges that end the capture."),
        )
        .arg(
            Arg::with_name("verbose")
                .long("verbose")
                .short('v')
                .help("Log verbose output"),
        )
        .arg(
            Arg::with_name("output")
                .help("Output file. `.bmp` is appended if no extension is given."),
        );

    // Invoked bare, show the usage text and leave quietly.
    if std::env::args().len() <= 1 {
        let _ = app.print_long_help();
        println!();
        return;
    }
    let matches = app.get_matches();

    if matches.is_present("verbose") {
        env_logger::Builder::from_env(Env::default().default_filter_or("tekcap=debug")).init();
    } else {
        env_logger::init();
    }

    let output = match matches.value_of("output") {
        Some(name) => default_extension(name),
        None => fail(Error::MissingFilename),
    };
    let address = match GpibAddress::parse(matches.value_of("address").unwrap()) {
        Ok(address) => address,
        Err(err) => fail(err),
    };
    let baud = match parse_baud(matches.value_of("baud").unwrap()) {
        Ok(baud) => baud,
        Err(err) => fail(err),
    };
    let opts = Options {
        port: matches.value_of("port").unwrap().to_string(),
        baud,
        address,
        output,
        stall_ms: parse_or_exit(matches.value_of("stall-ms").unwrap(), "a stall window"),
        max_stalls: parse_or_exit(matches.value_of("max-stalls").unwrap(), "a stall count"),
    };

    let rt = Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("cannot start IO runtime");
    match rt.block_on(run(&opts)) {
        Ok(stats) => {
            println!("Done. Wrote {} bytes to {}.", stats.bytes, opts.output.display());
        }
        Err(err) => fail(err),
    }
}

async fn run(opts: &Options) -> tekcap::Result<CaptureStats> {
    let params = SerialParams::gpib_default(opts.baud);
    let transport = SerialTransport::open(&device_path(&opts.port), &params)?;
    let mut session = CaptureSession::new(AdapterDriver::new(transport), opts.capture_config());

    let version = session.probe().await?;
    println!("GPIB adapter version: {}", version);

    let mut sink = FileSink::create(&opts.output).await?;
    let stats = session.capture(opts.address, &mut sink).await?;
    sink.finish().await?;
    Ok(stats)
}

fn fail(err: Error) -> ! {
    eprintln!("{}", err);
    exit(err.exit_code())
}

fn parse_or_exit<T: FromStr>(value: &str, what: &str) -> T {
    match value.parse() {
        Ok(x) => x,
        Err(_) => {
            eprintln!("Cannot parse `{}` as {}.", value, what);
            exit(1);
        }
    }
}

/// Append `.bmp` when the filename carries no extension. A trailing dot
/// counts as an (empty) extension and suppresses the default.
fn default_extension(name: &str) -> PathBuf {
    let has_extension = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.contains('.'))
        .unwrap_or(true);
    if has_extension {
        PathBuf::from(name)
    } else {
        PathBuf::from(format!("{}.bmp", name))
    }
}

#[cfg(windows)]
fn device_path(port: &str) -> String {
    // Keep the DOS device path specifier so COM10 and up resolve.
    if port.starts_with(r"\\.\") {
        port.to_string()
    } else {
        format!(r"\\.\{}", port)
    }
}

#[cfg(not(windows))]
fn device_path(port: &str) -> String {
    port.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bmp_extension_is_defaulted() {
        assert_eq!(default_extension("shot"), PathBuf::from("shot.bmp"));
        assert_eq!(default_extension("shot.png"), PathBuf::from("shot.png"));
        assert_eq!(default_extension("shot."), PathBuf::from("shot."));
        assert_eq!(
            default_extension("caps.d/shot"),
            PathBuf::from("caps.d/shot.bmp")
        );
    }

    #[cfg(not(windows))]
    #[test]
    fn device_path_is_verbatim() {
        assert_eq!(device_path("/dev/ttyUSB0"), "/dev/ttyUSB0");
    }
}
