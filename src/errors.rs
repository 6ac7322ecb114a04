//! Contains most common errors that may be encountered in decoding a JPEG
//! image

use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

/// Common decode errors
#[allow(clippy::module_name_repetitions)]
pub enum DecodeErrors {
    /// Any other thing we do not know
    Format(String),
    /// Any other thing we do not know but we
    /// don't need to allocate space on the heap
    FormatStatic(&'static str),
    /// Illegal magic bytes, the file does not start with `0xffd8`
    IllegalMagicBytes(u16),
    /// Problems with the Huffman tables in a JPEG file
    HuffmanDecode(String),
    /// Image has zero width or height
    ZeroError,
    /// Image dimensions too large for the configured limits
    LargeDimensions(usize),
    /// Quantization table errors
    DqtError(String),
    /// Start of scan errors
    SosError(String),
    /// Start of frame errors
    SofError(String),
    /// Arithmetic coding conditioning errors
    DacError(String),
    /// Errors encountered while decoding MCU data
    MCUError(String),
    /// The data ended before we expected it to
    ExhaustedData,
    /// Unsupported encoding schemes
    Unsupported(UnsupportedSchemes)
}

impl From<&'static str> for DecodeErrors {
    fn from(data: &'static str) -> Self {
        return Self::FormatStatic(data);
    }
}

impl Debug for DecodeErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        return Display::fmt(self, f);
    }
}

impl Display for DecodeErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self {
            Self::Format(ref reason) => write!(f, "{reason}"),
            Self::FormatStatic(reason) => write!(f, "{reason}"),
            Self::IllegalMagicBytes(bytes) => {
                write!(f, "Error parsing image. Illegal start bytes:{bytes:#x}")
            }
            Self::HuffmanDecode(ref reason) => {
                write!(f, "Error decoding huffman values: {reason}")
            }
            Self::ZeroError => write!(f, "Image width or height is set to zero, cannot continue"),
            Self::LargeDimensions(dimensions) => write!(
                f,
                "Image dimensions {dimensions} larger than the configured limit"
            ),
            Self::DqtError(ref reason) => write!(f, "Error parsing DQT segment. Reason: {reason}"),
            Self::SosError(ref reason) => write!(f, "Error parsing SOS segment. Reason: {reason}"),
            Self::SofError(ref reason) => write!(f, "Error parsing SOF segment. Reason: {reason}"),
            Self::DacError(ref reason) => write!(f, "Error parsing DAC segment. Reason: {reason}"),
            Self::MCUError(ref reason) => write!(f, "Error in decoding MCU. Reason: {reason}"),
            Self::ExhaustedData => write!(f, "Exhausted data in the image"),
            Self::Unsupported(ref scheme) => write!(f, "{scheme:?}")
        }
    }
}

impl Error for DecodeErrors {}

/// Encoding schemes the decoder understands but will not decode.
#[derive(Eq, PartialEq, Copy, Clone)]
pub enum UnsupportedSchemes {
    /// Hierarchical progression, signalled by a DHP segment or a
    /// differential frame marker.
    Hierarchical,
    /// Arithmetic coded image in a build compiled without the
    /// arithmetic entropy decoder.
    Arithmetic
}

impl Debug for UnsupportedSchemes {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self {
            Self::Hierarchical => {
                write!(
                    f,
                    "The library does not decode images using hierarchical progression"
                )
            }
            Self::Arithmetic => {
                write!(
                    f,
                    "This build was compiled without the arithmetic entropy decoder, cannot decode arithmetic coded images"
                )
            }
        }
    }
}
