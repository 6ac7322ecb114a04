//! The lossless (spatial) decoding process of annex H.
//!
//! No DCT, no quantization: every sample is a prediction from its
//! neighbours plus an entropy coded difference. Prediction makes the
//! process strictly serial per pixel, so this driver never touches the
//! worker pool.

use crate::bitstream::{DecodeState, DecodeTables};
use crate::decoder::JpegDecoder;
use crate::errors::DecodeErrors;
use crate::mcu::handle_restart;
use crate::misc::MAX_COMPS_IN_SCAN;
use crate::surface::Surface;

impl<'a> JpegDecoder<'a> {
    /// Decode a lossless scan straight into the surface.
    ///
    /// The scan header's `Ss` selects the predictor (0..7) and `Al` is
    /// the point transform. Output is L8 for single component images
    /// and BGRA for everything else; samples wider than 8 bits are
    /// scaled down on output.
    pub(crate) fn decode_lossless(
        &mut self, state: &mut DecodeState<'a>, surface: &mut Surface
    ) -> Result<(), DecodeErrors> {
        let tables = DecodeTables {
            dc: &self.dc_huffman_tables,
            ac: &self.ac_huffman_tables
        };

        let predictor = usize::from(state.spectral_start);
        let point_transform = state.successive_low;
        let comps = state.comps_in_scan;
        let precision = self.precision;

        info!("Lossless scan, predictor {predictor}, point transform {point_transform}");

        let width = self.xsize;
        let height = self.ysize.min(surface.height());

        let restart_interval = self.restart_interval;
        let mut todo = self.todo;

        let init_predictor = 1_i32 << (precision - point_transform - 1);

        let stride = surface.stride();
        let bpp = surface.format().bytes();
        let pixels = &mut surface.data[..];

        // one line of reconstructed samples per component for the
        // above/above-left predictors
        let mut prev_rows = vec![vec![0_i32; width]; comps];
        let mut cur_rows = vec![vec![0_i32; width]; comps];

        let mut diffs = [0_i16; MAX_COMPS_IN_SCAN];

        // the top-left corner behaves exactly like a fresh restart
        let mut restarted = true;
        let decode_fn = state.decode;

        let down_shift = precision.saturating_sub(8);

        for y in 0..height {
            for x in 0..width {
                // seed each component's predictor before pulling the
                // differences off the stream
                for c in 0..comps {
                    let ra = if x > 0 { cur_rows[c][x - 1] } else { 0 };
                    let rb = prev_rows[c][x];
                    let rc = if x > 0 { prev_rows[c][x - 1] } else { 0 };

                    let px = if restarted {
                        init_predictor
                    } else if y == 0 {
                        // the first line can only look left
                        ra
                    } else if x == 0 {
                        // the first column can only look up
                        rb
                    } else {
                        match predictor {
                            0 => 0,
                            1 => ra,
                            2 => rb,
                            3 => rc,
                            4 => ra + rb - rc,
                            5 => ra + ((rb - rc) >> 1),
                            6 => rb + ((ra - rc) >> 1),
                            7 => (ra + rb) >> 1,
                            _ => 0
                        }
                    };

                    state.set_predictor(c, px);
                }

                restarted = false;

                decode_fn(state, &tables, &mut diffs[..comps])?;

                for c in 0..comps {
                    // differences are modulo 2^16 by construction of
                    // the i16 they travel in
                    cur_rows[c][x] = i32::from(diffs[c]) & 0xffff;
                }

                if handle_restart(state, restart_interval, &mut todo) {
                    restarted = true;
                }

                // undo the point transform, scale to 8 bits and write
                let offset = y * stride + x * bpp;

                if comps == 1 {
                    let sample = (cur_rows[0][x] << point_transform) >> down_shift;

                    pixels[offset] = sample.clamp(0, 255) as u8;
                } else {
                    let r = (cur_rows[0][x] << point_transform) >> down_shift;
                    let g = (cur_rows[1][x] << point_transform) >> down_shift;
                    let b = (cur_rows[2][x] << point_transform) >> down_shift;

                    pixels[offset] = b.clamp(0, 255) as u8;
                    pixels[offset + 1] = g.clamp(0, 255) as u8;
                    pixels[offset + 2] = r.clamp(0, 255) as u8;
                    pixels[offset + 3] = 255;
                }
            }

            std::mem::swap(&mut prev_rows, &mut cur_rows);
        }

        self.todo = todo;

        Ok(())
    }
}
