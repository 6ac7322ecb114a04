//! Miscellaneous stuff

use std::fmt;

/// Maximum number of components in a scan.
pub const MAX_COMPS_IN_SCAN: usize = 4;

/// Maximum number of 8x8 blocks in a single MCU, a JPEG specification
/// limit (B.2.3).
pub const MAX_BLOCKS_IN_MCU: usize = 10;

/// Undo run length encoding of coefficients by placing them in natural order
///
/// The extra 16 entries prevent indexing past the table when a corrupt
/// bitstream pushes the zig-zag position beyond 63.
#[rustfmt::skip]
pub const UN_ZIGZAG: [usize; 64 + 16] = [
     0,  1,  8, 16,  9,  2,  3, 10,
    17, 24, 32, 25, 18, 11,  4,  5,
    12, 19, 26, 33, 40, 48, 41, 34,
    27, 20, 13,  6,  7, 14, 21, 28,
    35, 42, 49, 56, 57, 50, 43, 36,
    29, 22, 15, 23, 30, 37, 44, 51,
    58, 59, 52, 45, 38, 31, 39, 46,
    53, 60, 61, 54, 47, 55, 62, 63,
    // Prevent overflowing
    63, 63, 63, 63, 63, 63, 63, 63,
    63, 63, 63, 63, 63, 63, 63, 63
];

/// Align data to a 32 byte boundary
#[repr(align(32))]
#[derive(Debug, Clone, Copy)]
pub struct Aligned32<T: ?Sized>(pub T);

impl<T> Default for Aligned32<T>
where
    T: Default
{
    fn default() -> Self {
        Aligned32(T::default())
    }
}

/// The Adobe APP14 color transform, which tells us how a three or four
/// component image should be interpreted.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AdobeColorSpace {
    /// No transform, raw C/M/Y/K samples
    Cmyk,
    /// Luminance/chrominance, the overwhelmingly common case
    YCbCr,
    /// YCbCr with an inverted K channel
    Ycck
}

impl AdobeColorSpace {
    pub fn from_transform(transform: u8) -> Option<AdobeColorSpace> {
        match transform {
            0 => Some(Self::Cmyk),
            1 => Some(Self::YCbCr),
            2 => Some(Self::Ycck),
            _ => None
        }
    }
}

/// The start of frame markers, which identify the coding process for
/// the whole frame.
///
/// The marker tells us whether the image is sequential or progressive,
/// lossy (DCT) or lossless, Huffman or arithmetic coded, and whether it
/// is a differential frame of a hierarchical image.
#[derive(Eq, PartialEq, Copy, Clone, Default)]
pub struct SOFMarkers(pub u8);

impl SOFMarkers {
    /// Check whether the frame uses progressive spectral selection
    #[must_use]
    pub fn is_progressive(self) -> bool {
        matches!(self.0, 2 | 6 | 10 | 14)
    }

    /// Check whether the frame is spatially (losslessly) coded
    #[must_use]
    pub fn is_lossless(self) -> bool {
        matches!(self.0, 3 | 7 | 11 | 15)
    }

    /// Check whether the frame is a differential frame of a
    /// hierarchical progression
    #[must_use]
    pub fn is_differential(self) -> bool {
        matches!(self.0, 5 | 6 | 7 | 13 | 14 | 15)
    }

    /// Check whether the entropy coded segments use arithmetic coding
    /// instead of Huffman codes
    #[must_use]
    pub fn is_arithmetic(self) -> bool {
        self.0 >= 9
    }

    /// Human readable name of the coding process
    #[must_use]
    pub fn encoding(self) -> &'static str {
        match self.0 {
            0 => "Baseline DCT",
            1 | 9 => "Extended sequential DCT",
            2 | 10 => "Progressive DCT",
            3 | 11 => "Lossless",
            5 | 13 => "Differential sequential DCT",
            6 | 14 => "Differential progressive DCT",
            7 | 15 => "Differential lossless",
            _ => "Unknown"
        }
    }
}

impl fmt::Debug for SOFMarkers {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}, {} coding",
            self.encoding(),
            if self.is_arithmetic() {
                "Arithmetic"
            } else {
                "Huffman"
            }
        )
    }
}

/// Scan `data` from `position` for the next 0xFF byte.
///
/// Returns `data.len()` when no 0xFF remains, which keeps all callers
/// on their slow path instead of reading past the buffer.
#[inline]
pub fn next_ff(data: &[u8], position: usize) -> usize {
    match data.get(position..) {
        Some(hay) => hay
            .iter()
            .position(|x| *x == 0xff)
            .map_or(data.len(), |x| x + position),
        None => data.len()
    }
}

/// Scan for the next marker, a `0xFF` byte followed by a non-zero,
/// non-`0xFF` byte, starting at `position`.
///
/// Returns the index of the `0xFF` byte, or `None` if the stream ends
/// first. Stuffed bytes (`FF 00`) and fill bytes (`FF FF`) are stepped
/// over.
pub fn seek_marker(data: &[u8], position: usize) -> Option<usize> {
    let mut pos = position;

    while pos + 1 < data.len() {
        pos = next_ff(data, pos);

        match data.get(pos + 1) {
            Some(0x00) => pos += 2,
            Some(0xff) => pos += 1,
            Some(_) => return Some(pos),
            None => return None
        }
    }
    None
}
