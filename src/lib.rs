#![allow(
    clippy::needless_return,
    clippy::similar_names,
    clippy::inline_always
)]
#![warn(clippy::correctness, clippy::perf, clippy::pedantic)]
//! A JPEG decoder.
//!
//! Supports baseline, extended sequential, progressive, multi-scan and
//! lossless images, Huffman or arithmetic coded, with pixel production
//! spread over a worker pool.
//!
//! The decoder is split into a marker parser which installs tables and
//! frame/scan descriptors, an entropy decoding stage which is inherently
//! serial, and a post-processing stage (dequantize, inverse DCT, color
//! conversion) which is parallelized over MCU row bands, or over whole
//! restart intervals when the image provides them.
#[macro_use]
extern crate log;

pub use crate::decoder::{ImageInfo, JpegDecoder};
pub use crate::errors::DecodeErrors;
pub use crate::options::DecoderOptions;
pub use crate::surface::{Bitmap, PixelFormat, SampleFormat, Surface};

#[cfg(feature = "arith")]
mod arith;
mod bitstream;
mod color_convert;
mod components;
mod decoder;
pub mod errors;
mod headers;
mod huffman;
mod idct;
mod lossless;
mod marker;
mod mcu;
mod mcu_prog;
mod misc;
mod options;
mod surface;
mod worker;
