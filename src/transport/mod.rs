//! Input and output endpoints of the emulator.
//!
//! Strategies are plain values: constructing one never touches the OS. The engine
//! opens them when emulation starts.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};

/// Output file used when `--output-type file` is given without `--output`.
pub const DEFAULT_OUTPUT_FILE: &str = "vemulator-output.txt";

/// Source of hex protocol requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    File(Option<String>),
    Serial(Option<String>),
}

impl Input {
    pub fn locator(&self) -> Option<&str> {
        match self {
            Input::File(path) | Input::Serial(path) => path.as_deref(),
        }
    }

    /// Open the input for reading. `Ok(None)` means no input is attached.
    pub fn open(&self) -> io::Result<Option<Box<dyn BufRead + Send>>> {
        let reader: Box<dyn BufRead + Send> = match self {
            Input::File(None) | Input::Serial(None) => return Ok(None),
            Input::File(Some(path)) => Box::new(BufReader::new(File::open(path)?)),
            Input::Serial(Some(port)) => {
                let device = OpenOptions::new().read(true).write(true).open(port)?;
                Box::new(BufReader::new(device))
            }
        };
        Ok(Some(reader))
    }
}

impl fmt::Display for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let locator = self.locator().unwrap_or("-");
        match self {
            Input::File(_) => write!(f, "file input ({locator})"),
            Input::Serial(_) => write!(f, "serial input ({locator})"),
        }
    }
}

/// Destination of protocol messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    File(String),
    Standard,
    Serial(String),
}

impl Output {
    pub fn locator(&self) -> Option<&str> {
        match self {
            Output::File(path) | Output::Serial(path) => Some(path),
            Output::Standard => None,
        }
    }

    pub fn open(&self) -> io::Result<Box<dyn Write + Send>> {
        Ok(match self {
            Output::File(path) => Box::new(File::create(path)?),
            Output::Standard => Box::new(io::stdout()),
            Output::Serial(port) => Box::new(OpenOptions::new().write(true).open(port)?),
        })
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Output::File(path) => write!(f, "file output ({path})"),
            Output::Standard => write!(f, "standard output"),
            Output::Serial(port) => write!(f, "serial output ({port})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn missing_input_locator_opens_nothing() {
        assert!(Input::Serial(None).open().unwrap().is_none());
        assert!(Input::File(None).open().unwrap().is_none());
    }

    #[test]
    fn file_transports_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frames.txt").to_string_lossy().into_owned();

        let output = Output::File(path.clone());
        output.open().unwrap().write_all(b"0100\n").unwrap();

        let mut reader = Input::File(Some(path)).open().unwrap().unwrap();
        let mut text = String::new();
        reader.read_to_string(&mut text).unwrap();
        assert_eq!(text, "0100\n");
    }

    #[test]
    fn missing_input_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent").to_string_lossy().into_owned();
        assert!(Input::File(Some(path)).open().is_err());
    }

    #[test]
    fn strategies_identify_themselves() {
        assert_eq!(Output::Standard.to_string(), "standard output");
        assert_eq!(Output::Standard.locator(), None);
        assert_eq!(
            Output::Serial("/dev/ttyUSB0".into()).to_string(),
            "serial output (/dev/ttyUSB0)"
        );
        assert_eq!(Input::File(Some("in.txt".into())).to_string(), "file input (in.txt)");
        assert_eq!(Input::Serial(None).locator(), None);
    }
}
