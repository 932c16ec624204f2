#[macro_use]
extern crate enum_primitive;
#[macro_use]
extern crate log;
extern crate num;

use std::error;
use std::fmt;
use std::io;

pub mod decode;
pub mod pipeline;
pub mod translate;

#[derive(Debug)]
pub enum Error {
    /// Cleaned line is not exactly 32 characters long.
    BadLength(String),
    /// Line has the right length but contains something other than `0`/`1`.
    BadDigit(String),
    /// Opcode text as written, which may not be binary.
    BadOpcode(String),
    BadFunct(u32),
    BadRegister(u32),
    Io(io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::BadLength(ref line) => write!(f, "Invalid opcode length: {}", line),
            Error::BadDigit(ref line) => write!(f, "Invalid binary digit: {}", line),
            Error::BadOpcode(ref op) => write!(f, "Unknown opcode: {}", op),
            Error::BadFunct(funct) => write!(f, "Unknown R-type funct: {:06b}", funct),
            Error::BadRegister(code) => write!(f, "Unknown register: {:05b}", code),
            Error::Io(ref e) => write!(f, "{}", e),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::Io(ref e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Error {
        Error::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn diagnostics_pad_binary_fields() {
        assert_eq!("Unknown opcode: 000111", Error::BadOpcode("000111".to_owned()).to_string());
        assert_eq!("Unknown R-type funct: 111111", Error::BadFunct(0b111111).to_string());
        assert_eq!("Unknown register: 10000", Error::BadRegister(16).to_string());
    }
}
