//! MCU post processing: dequantize, inverse DCT and color conversion
//! into the output surface.
//!
//! The converter family is indexed by target sample layout and MCU
//! geometry. The generic path handles any sampling factors and partial
//! (clipped) MCUs on the last row and column; the fixed-geometry
//! monomorphizations cover the four common YCbCr layouts when the
//! component order is the standard one. CMYK and YCCK images always go
//! through the clipped BGRA path.
//!
//! YCbCr to RGB uses the ITU-T T.871 equations in 16 bit fixed point.

use crate::components::Frame;
use crate::idct::IdctFn;
use crate::misc::{AdobeColorSpace, Aligned32, MAX_BLOCKS_IN_MCU, MAX_COMPS_IN_SCAN};
use crate::surface::SampleFormat;

/// A pixel production function for one MCU.
///
/// `dest` starts at the MCU's top-left byte and extends to the end of
/// the writable region, rows are `stride` bytes apart. `width` and
/// `height` are the pixel extents to produce, smaller than the MCU
/// size on clipped edges.
pub(crate) type ProcessFn = fn(&mut [u8], usize, &[i16], &ProcessState, usize, usize);

/// The capability record driving post processing, frozen at the start
/// of a decode: quantization tables, per-block table assignment, frame
/// geometry and the function pointers chosen for this image.
pub(crate) struct ProcessState {
    /// Quantization tables in natural order
    pub qt:         [Aligned32<[u16; 64]>; MAX_COMPS_IN_SCAN],
    /// Per MCU block index into `qt`
    pub block_qt:   [usize; MAX_BLOCKS_IN_MCU],
    /// Blocks in one MCU
    pub blocks:     usize,
    pub frame:      [Frame; MAX_COMPS_IN_SCAN],
    pub frames:     usize,
    pub colorspace: AdobeColorSpace,
    pub idct:       IdctFn,
    pub process:    ProcessFn,
    pub clipped:    ProcessFn
}

// sample layout tags for the const generic kernels
const FMT_L8: u8 = 0;
const FMT_BGR: u8 = 1;
const FMT_RGB: u8 = 2;
const FMT_BGRA: u8 = 3;
const FMT_RGBA: u8 = 4;

const fn format_bytes(fmt: u8) -> usize {
    match fmt {
        FMT_L8 => 1,
        FMT_BGR | FMT_RGB => 3,
        _ => 4
    }
}

/// Limit values to 0 and 255
#[inline(always)]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn clamp(a: i32) -> u8 {
    a.clamp(0, 255) as u8
}

/// YCbCr to RGB with the T.871 constants scaled by 65536.
#[inline(always)]
fn ycbcr_to_rgb(y: i32, cb: i32, cr: i32) -> (u8, u8, u8) {
    let cb = cb - 128;
    let cr = cr - 128;

    let r = y + ((91881 * cr + 32768) >> 16);
    let g = y - ((22554 * cb + 46802 * cr + 32768) >> 16);
    let b = y + ((116130 * cb + 32768) >> 16);

    (clamp(r), clamp(g), clamp(b))
}

/// fast 0..255 * 0..255 => 0..255 rounded multiplication
///
/// Borrowed from stb
#[inline(always)]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn blinn_8x8(in_val: u8, y: u8) -> u8 {
    let t = i32::from(in_val) * i32::from(y) + 128;
    return ((t + (t >> 8)) >> 8) as u8;
}

#[inline(always)]
fn store_pixel<const FMT: u8>(out: &mut [u8], r: u8, g: u8, b: u8) {
    match FMT {
        FMT_BGR => {
            out[0] = b;
            out[1] = g;
            out[2] = r;
        }
        FMT_RGB => {
            out[0] = r;
            out[1] = g;
            out[2] = b;
        }
        FMT_BGRA => {
            out[0] = b;
            out[1] = g;
            out[2] = r;
            out[3] = 255;
        }
        FMT_RGBA => {
            out[0] = r;
            out[1] = g;
            out[2] = b;
            out[3] = 255;
        }
        _ => unreachable!()
    }
}

/// Dequantize and inverse transform every block of the MCU into 8 bit
/// samples.
#[inline]
fn idct_mcu(samples: &mut [u8; 64 * MAX_BLOCKS_IN_MCU], data: &[i16], state: &ProcessState) {
    for i in 0..state.blocks {
        let block: &[i16; 64] = data[i * 64..i * 64 + 64].try_into().unwrap();
        let dest: &mut [u8; 64] = (&mut samples[i * 64..i * 64 + 64]).try_into().unwrap();

        (state.idct)(dest, block, &state.qt[state.block_qt[i]].0);
    }
}

/// Fetch the sample of `frame` at MCU pixel `(x, y)`, applying the
/// component's subsampling shifts.
#[inline(always)]
fn sample_at(samples: &[u8; 64 * MAX_BLOCKS_IN_MCU], frame: &Frame, x: usize, y: usize) -> u8 {
    let sx = x >> frame.hshift;
    let sy = y >> frame.vshift;

    let block = frame.offset + (sy >> 3) * frame.horizontal_sample + (sx >> 3);

    samples[block * 64 + (sy & 7) * 8 + (sx & 7)]
}

/// Single component images, any target layout.
fn process_y<const FMT: u8>(
    dest: &mut [u8], stride: usize, data: &[i16], state: &ProcessState, width: usize,
    height: usize
) {
    let mut samples = [0_u8; 64 * MAX_BLOCKS_IN_MCU];

    idct_mcu(&mut samples, data, state);

    let frame = &state.frame[0];

    for y in 0..height {
        let row = &mut dest[y * stride..];

        for x in 0..width {
            let luma = sample_at(&samples, frame, x, y);
            let out = &mut row[x * format_bytes(FMT)..];

            if FMT == FMT_L8 {
                out[0] = luma;
            } else {
                store_pixel::<FMT>(out, luma, luma, luma);
            }
        }
    }
}

/// The general YCbCr path: any sampling factors, any clip. This is the
/// fall-back `clipped` member of the capability record.
fn process_ycbcr<const FMT: u8>(
    dest: &mut [u8], stride: usize, data: &[i16], state: &ProcessState, width: usize,
    height: usize
) {
    let mut samples = [0_u8; 64 * MAX_BLOCKS_IN_MCU];

    idct_mcu(&mut samples, data, state);

    for y in 0..height {
        let row = &mut dest[y * stride..];

        for x in 0..width {
            let luma = sample_at(&samples, &state.frame[0], x, y);
            let out = &mut row[x * format_bytes(FMT)..];

            if FMT == FMT_L8 {
                // grayscale target, chroma is not even sampled
                out[0] = luma;
                continue;
            }

            let cb = sample_at(&samples, &state.frame[1], x, y);
            let cr = sample_at(&samples, &state.frame[2], x, y);

            let (r, g, b) = ycbcr_to_rgb(i32::from(luma), i32::from(cb), i32::from(cr));

            store_pixel::<FMT>(out, r, g, b);
        }
    }
}

/// YCbCr with the standard block layout (Y blocks first, then one Cb
/// and one Cr block) and a fixed `8H x 8V` geometry. The shifts fold
/// into constants, which is what makes these worth monomorphizing.
fn process_ycbcr_fixed<const FMT: u8, const H: usize, const V: usize>(
    dest: &mut [u8], stride: usize, data: &[i16], state: &ProcessState, width: usize,
    height: usize
) {
    let mut samples = [0_u8; 64 * MAX_BLOCKS_IN_MCU];

    idct_mcu(&mut samples, data, state);

    let hshift = H.trailing_zeros() as usize;
    let vshift = V.trailing_zeros() as usize;

    let cb_base = H * V * 64;
    let cr_base = (H * V + 1) * 64;

    for y in 0..height {
        let row = &mut dest[y * stride..];
        let chroma_row = (y >> vshift) * 8;

        for x in 0..width {
            let block = (y >> 3) * H + (x >> 3);
            let luma = samples[block * 64 + (y & 7) * 8 + (x & 7)];

            let chroma = chroma_row + (x >> hshift);
            let cb = samples[cb_base + chroma];
            let cr = samples[cr_base + chroma];

            let (r, g, b) = ycbcr_to_rgb(i32::from(luma), i32::from(cb), i32::from(cr));

            store_pixel::<FMT>(&mut row[x * format_bytes(FMT)..], r, g, b);
        }
    }
}

/// CMYK and YCCK to BGRA. Four component images always route through
/// here, whatever the requested target, and always clipped.
fn process_cmyk_bgra(
    dest: &mut [u8], stride: usize, data: &[i16], state: &ProcessState, width: usize,
    height: usize
) {
    let mut samples = [0_u8; 64 * MAX_BLOCKS_IN_MCU];

    idct_mcu(&mut samples, data, state);

    let is_ycck = state.colorspace == AdobeColorSpace::Ycck;

    for y in 0..height {
        let row = &mut dest[y * stride..];

        for x in 0..width {
            let k = sample_at(&samples, &state.frame[3], x, y);

            let (r, g, b) = if is_ycck {
                let luma = sample_at(&samples, &state.frame[0], x, y);
                let cb = sample_at(&samples, &state.frame[1], x, y);
                let cr = sample_at(&samples, &state.frame[2], x, y);

                let (r, g, b) = ycbcr_to_rgb(i32::from(luma), i32::from(cb), i32::from(cr));

                // YCCK carries the inverted CMY channels through the
                // YCbCr transform
                (
                    blinn_8x8(255 - r, k),
                    blinn_8x8(255 - g, k),
                    blinn_8x8(255 - b, k)
                )
            } else {
                let c = sample_at(&samples, &state.frame[0], x, y);
                let m = sample_at(&samples, &state.frame[1], x, y);
                let y_ = sample_at(&samples, &state.frame[2], x, y);

                (blinn_8x8(c, k), blinn_8x8(m, k), blinn_8x8(y_, k))
            };

            let out = &mut row[x * 4..];

            out[0] = b;
            out[1] = g;
            out[2] = r;
            out[3] = 255;
        }
    }
}

/// Whether the frame layout matches what the fixed-geometry kernels
/// hard-code: three components, full resolution 1x1 chroma behind the
/// luma blocks.
fn is_standard_ycbcr_layout(
    frame: &[Frame; MAX_COMPS_IN_SCAN], frames: usize, blocks: usize, h_max: usize, v_max: usize
) -> bool {
    frames == 3
        && frame[0].horizontal_sample == h_max
        && frame[0].vertical_sample == v_max
        && frame[1].horizontal_sample == 1
        && frame[1].vertical_sample == 1
        && frame[2].horizontal_sample == 1
        && frame[2].vertical_sample == 1
        && blocks == h_max * v_max + 2
}

/// Pick `process` and `clipped` members of the capability record for
/// the target sample layout and the frame's MCU geometry.
pub(crate) fn choose_process_fns(
    frame: &[Frame; MAX_COMPS_IN_SCAN], frames: usize, blocks: usize, sample: SampleFormat,
    h_max: usize, v_max: usize
) -> (ProcessFn, ProcessFn) {
    if frames == 4 {
        // CMYK / YCCK is in the slow path anyway so force BGRA
        return (process_cmyk_bgra, process_cmyk_bgra);
    }

    if frames == 1 {
        let func = match sample {
            SampleFormat::Y => process_y::<FMT_L8>,
            SampleFormat::Bgr => process_y::<FMT_BGR>,
            SampleFormat::Rgb => process_y::<FMT_RGB>,
            SampleFormat::Bgra => process_y::<FMT_BGRA>,
            SampleFormat::Rgba => process_y::<FMT_RGBA>
        };
        return (func, func);
    }

    let clipped: ProcessFn = match sample {
        SampleFormat::Y => process_ycbcr::<FMT_L8>,
        SampleFormat::Bgr => process_ycbcr::<FMT_BGR>,
        SampleFormat::Rgb => process_ycbcr::<FMT_RGB>,
        SampleFormat::Bgra => process_ycbcr::<FMT_BGRA>,
        SampleFormat::Rgba => process_ycbcr::<FMT_RGBA>
    };

    if !is_standard_ycbcr_layout(frame, frames, blocks, h_max, v_max) {
        return (clipped, clipped);
    }

    macro_rules! fixed {
        ($fmt:expr) => {
            match (h_max, v_max) {
                (1, 1) => process_ycbcr_fixed::<{ $fmt }, 1, 1>,
                (2, 1) => process_ycbcr_fixed::<{ $fmt }, 2, 1>,
                (1, 2) => process_ycbcr_fixed::<{ $fmt }, 1, 2>,
                (2, 2) => process_ycbcr_fixed::<{ $fmt }, 2, 2>,
                _ => return (clipped, clipped)
            }
        };
    }

    let process: ProcessFn = match sample {
        SampleFormat::Y => clipped,
        SampleFormat::Bgr => fixed!(FMT_BGR),
        SampleFormat::Rgb => fixed!(FMT_RGB),
        SampleFormat::Bgra => fixed!(FMT_BGRA),
        SampleFormat::Rgba => fixed!(FMT_RGBA)
    };

    (process, clipped)
}
