//! Multi-pass decoding: progressive and multi-scan images.
//!
//! Both modes accumulate coefficients into a single contiguous arena
//! of `mcus * blocks_in_mcu * 64` values across all their scans; the
//! arena is the one source of truth for the frame's coefficients.
//! Pixels are produced only once, in the finish pass, which fans the
//! row bands out to the worker pool. The writer (scan decoding) is
//! strictly serial, the readers (finish workers) are read only, so no
//! locking is involved anywhere.

use crate::bitstream::{DecodeState, DecodeTables};
use crate::color_convert::ProcessState;
use crate::decoder::JpegDecoder;
use crate::errors::DecodeErrors;
use crate::mcu::{handle_restart, DCT_BLOCK};
use crate::surface::Surface;
use crate::worker::{band_height, render_band};

impl<'a> JpegDecoder<'a> {
    /// Decode one sequential scan that carries only a subset of the
    /// frame's components.
    ///
    /// The blocks land at their component offsets inside each MCU, so
    /// later scans fill the holes this one leaves.
    pub(crate) fn decode_multiscan(
        &mut self, state: &mut DecodeState<'a>, arena: &mut [i16]
    ) -> Result<(), DecodeErrors> {
        let tables = DecodeTables {
            dc: &self.dc_huffman_tables,
            ac: &self.ac_huffman_tables
        };

        let restart_interval = self.restart_interval;
        let mut todo = self.todo;

        let mcu_data = self.blocks_in_mcu * DCT_BLOCK;
        let decode_fn = state.decode;

        for i in 0..self.mcus {
            if state.stream.overread {
                warn!("Premature end of bitstream in multi-scan image");
                break;
            }

            decode_fn(state, &tables, &mut arena[i * mcu_data..(i + 1) * mcu_data])?;
            handle_restart(state, restart_interval, &mut todo);
        }

        self.todo = todo;

        Ok(())
    }

    /// Decode one progressive scan into the arena.
    pub(crate) fn decode_progressive(
        &mut self, state: &mut DecodeState<'a>, arena: &mut [i16]
    ) -> Result<(), DecodeErrors> {
        let tables = DecodeTables {
            dc: &self.dc_huffman_tables,
            ac: &self.ac_huffman_tables
        };

        let restart_interval = self.restart_interval;
        let mut todo = self.todo;

        let mcu_data = self.blocks_in_mcu * DCT_BLOCK;
        let dc_scan = state.spectral_start == 0;
        let decode_fn = state.decode;

        if dc_scan && !(state.comps_in_scan == 1 && state.blocks > 1) {
            // DC scans walk whole MCUs, interleaved or not
            for i in 0..self.mcus {
                if state.stream.overread {
                    warn!("Premature end of bitstream in progressive DC scan");
                    break;
                }

                decode_fn(state, &tables, &mut arena[i * mcu_data..(i + 1) * mcu_data])?;
                handle_restart(state, restart_interval, &mut todo);
            }

            self.todo = todo;

            return Ok(());
        }

        if dc_scan {
            // a single subsampled component: walk its blocks one by one
            // through the same per-block path AC scans use, the MCU
            // grouping of the blocks does not match the bitstream order
            state.block[0].offset = 0;
            state.blocks = 1;
        }

        // Non-interleaved scans cover the component's own block grid
        // over the *logical* image size; padding blocks exist in the
        // arena but are never coded.
        let frame = self.components[self.scan_frame];

        let hsize = 8 << frame.hshift;
        let vsize = 8 << frame.vshift;

        let xs = (self.xsize + hsize - 1) / hsize;
        let ys = (self.ysize + vsize - 1) / vsize;

        let hsf = frame.horizontal_sample;
        let vsf = frame.vertical_sample;

        trace!("Progressive scan over {xs} x {ys} blocks of component {}", frame.component_id);

        for y in 0..ys {
            if state.stream.overread {
                warn!("Premature end of bitstream in progressive scan");
                break;
            }

            let mcu_yoffset = (y / vsf) * self.xmcu;
            let block_yoffset = (y % vsf) * hsf + frame.offset;

            for x in 0..xs {
                let mcu_offset = (mcu_yoffset + x / hsf) * self.blocks_in_mcu;
                let block_offset = (x % hsf) + block_yoffset;

                let position = (mcu_offset + block_offset) * DCT_BLOCK;

                decode_fn(state, &tables, &mut arena[position..position + DCT_BLOCK])?;
                handle_restart(state, restart_interval, &mut todo);
            }
        }

        self.todo = todo;

        Ok(())
    }

    /// The finish pass: turn the accumulated coefficient arena into
    /// pixels, in parallel row bands when a pool is available.
    ///
    /// The arena is read only from here on; bands cover disjoint pixel
    /// rows, so workers don't contend on anything.
    pub(crate) fn finish_frame(
        &mut self, arena: &[i16], process_state: &ProcessState, surface: &mut Surface
    ) {
        let stride = surface.stride();
        let px_height = surface.height();
        let grid = self.grid(surface.format().bytes());

        let pixels = &mut surface.data[..px_height * stride];

        let workers = self.pool.as_ref().map_or(1, |p| p.thread_count() as usize);

        if workers <= 1 || grid.ymcu <= 1 {
            render_band(pixels, stride, arena, process_state, &grid, 0, grid.ymcu);
            return;
        }

        let pool = self.pool.as_mut().unwrap();
        let band_rows = band_height(grid.ymcu, workers);

        pool.scoped(|scope| {
            let mut pixels_rest = pixels;
            let mut consumed_px_rows = 0_usize;
            let mut row = 0_usize;

            while row < grid.ymcu {
                let rows = band_rows.min(grid.ymcu - row);
                let band_px_rows = (rows * grid.yblock).min(px_height - consumed_px_rows);

                if band_px_rows == 0 {
                    break;
                }

                let (band_pixels, rest) = pixels_rest.split_at_mut(band_px_rows * stride);

                pixels_rest = rest;

                let coeffs =
                    &arena[row * grid.xmcu * grid.mcu_data..(row + rows) * grid.xmcu * grid.mcu_data];

                let row0 = row;
                let g = grid;

                scope.execute(move || {
                    render_band(band_pixels, stride, coeffs, process_state, &g, row0, rows);
                });

                consumed_px_rows += band_px_rows;
                row += rows;
            }
        });
    }
}
