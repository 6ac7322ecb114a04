//! Scan orchestration and the sequential decoders.
//!
//! A sequential single-scan image can take one of three routes:
//!
//! - serial: decode an MCU, produce its pixels, repeat;
//! - row bands: entropy decoding stays serial (it has to, the code is
//!   variable length) but pixel production is fanned out to the worker
//!   pool one band of MCU rows at a time;
//! - restart intervals: when the image has restart markers every
//!   interval is a self contained entropy coded unit, so whole
//!   intervals (entropy decoding included) run on the pool.

use crate::bitstream::{
    huff_decode_ac_first, huff_decode_ac_refine, huff_decode_dc_first, huff_decode_dc_refine,
    huff_decode_mcu, huff_decode_mcu_lossless, DecodeBlock, DecodeFn, DecodeState, DecodeTables
};
use crate::color_convert::ProcessState;
use crate::decoder::JpegDecoder;
use crate::errors::DecodeErrors;
use crate::marker::Marker;
use crate::misc::{seek_marker, MAX_BLOCKS_IN_MCU, MAX_COMPS_IN_SCAN};
use crate::surface::Surface;
use crate::worker::{band_height, render_band, render_mcu_via_tile, SurfaceCell};

/// The size of a block for one MCU.
pub const DCT_BLOCK: usize = 64;

/// Count down the restart interval and, at zero, consume a restart
/// marker if one is present.
///
/// Any RST0..RST7 is accepted; encoders that get the modulo-8 cycle
/// wrong exist and the cycle carries no information we need. A missing
/// marker is tolerated as well, the decoder simply keeps going.
pub(crate) fn handle_restart(
    state: &mut DecodeState, restart_interval: usize, todo: &mut usize
) -> bool {
    if restart_interval > 0 {
        *todo -= 1;

        if *todo == 0 {
            *todo = restart_interval;

            if let Some(m) = state.stream.peek_restart_marker() {
                trace!("Restart marker RST{m}");

                state.stream.skip_marker();
                state.huffman.restart();
                #[cfg(feature = "arith")]
                state.arithmetic.restart();

                return true;
            }
        }
    }

    false
}

impl<'a> JpegDecoder<'a> {
    /// Drive every scan of the frame, then run the finish pass if the
    /// image accumulated coefficients instead of producing pixels
    /// directly.
    pub(crate) fn decode_scans(
        &mut self, surface: &mut Surface, process_state: &ProcessState
    ) -> Result<(), DecodeErrors> {
        self.set_position(self.scan_start());

        let mut coefficients: Option<Vec<i16>> = None;
        let mut seen_scans = 0_usize;

        while let Some(marker) = self.next_marker()? {
            match marker {
                Marker::SOS => {
                    seen_scans += 1;

                    if seen_scans > self.options.get_max_scans() {
                        return Err(DecodeErrors::Format(format!(
                            "Too many scans, exceeded limit of {}",
                            self.options.get_max_scans()
                        )));
                    }

                    let mut state = self.parse_sos()?;

                    if self.is_lossless {
                        self.decode_lossless(&mut state, surface)?;
                    } else if self.is_progressive || self.is_multiscan {
                        let len = self.mcus * self.blocks_in_mcu * DCT_BLOCK;
                        let arena = coefficients.get_or_insert_with(|| vec![0; len]);

                        if self.is_progressive {
                            self.decode_progressive(&mut state, arena)?;
                        } else {
                            self.decode_multiscan(&mut state, arena)?;
                        }
                    } else {
                        self.decode_sequential(&mut state, process_state, surface)?;
                    }

                    self.set_position(state.stream.position());
                }
                Marker::EOI => {
                    trace!("EOI marker found");
                    break;
                }
                Marker::SOF(_) => {
                    warn!("Another frame header inside the image, stopping at the first frame");
                    break;
                }
                _ => self.parse_marker_inner(marker)?
            }
        }

        // multi-scan images produce pixels only once every scan has
        // deposited its coefficients
        if let Some(arena) = coefficients.as_deref() {
            self.finish_frame(arena, process_state, surface);
        }

        Ok(())
    }

    /// **B.2.3 Scan header syntax**: bind scan components to frame
    /// descriptors, pick the decode function and anchor the bit buffer
    /// at the entropy coded segment.
    pub(crate) fn parse_sos(&mut self) -> Result<DecodeState<'a>, DecodeErrors> {
        let ls = self.get_u16()?;
        let ns = usize::from(self.get_u8()?);

        if !(1..=MAX_COMPS_IN_SCAN).contains(&ns) {
            return Err(DecodeErrors::SosError(format!(
                "Number of components in scan should be between 1 and 4, found {ns}"
            )));
        }

        if usize::from(ls) != 6 + 2 * ns {
            return Err(DecodeErrors::SosError(
                "Bad SOS length, corrupt jpeg".to_string()
            ));
        }

        let mut blocks = [DecodeBlock::default(); MAX_BLOCKS_IN_MCU];
        let mut num_blocks = 0_usize;

        for _ in 0..ns {
            let cs = self.get_u8()?;
            let tables = self.get_u8()?;

            let dc = usize::from(tables >> 4);
            let ac = usize::from(tables & 0x0f);

            if dc > 3 || ac > 3 {
                return Err(DecodeErrors::SosError(format!(
                    "Huffman table destinations ({dc}, {ac}) out of range"
                )));
            }

            let frame_index = self
                .components
                .iter()
                .position(|c| c.component_id == cs)
                .ok_or_else(|| {
                    DecodeErrors::SosError(format!("No frame component with id {cs}"))
                })?;

            let frame = self.components[frame_index];

            self.scan_frame = frame_index;

            // a lossless "MCU" is one sample per component
            let size = if self.is_lossless {
                1
            } else {
                frame.horizontal_sample * frame.vertical_sample
            };

            trace!("Scan component {cs}, DC {dc}, AC {ac}, {size} blocks at {}", frame.offset);

            for i in 0..size {
                if num_blocks >= MAX_BLOCKS_IN_MCU {
                    return Err(DecodeErrors::SosError(
                        "Too many blocks in scan, corrupt jpeg".to_string()
                    ));
                }

                blocks[num_blocks] = DecodeBlock {
                    offset: (frame.offset + i) * DCT_BLOCK,
                    pred:   frame_index,
                    dc,
                    ac
                };

                num_blocks += 1;
            }
        }

        let ss = self.get_u8()?;
        let se = self.get_u8()?;
        let approx = self.get_u8()?;

        let mut state = DecodeState::new(self.data, self.position());

        state.block = blocks;
        state.blocks = num_blocks;
        state.comps_in_scan = ns;
        state.spectral_start = ss & 63;
        state.spectral_end = se & 63;
        state.successive_high = approx >> 4;
        state.successive_low = approx & 0x0f;

        if self.is_progressive {
            if state.spectral_start == 0 && state.spectral_end != 0 {
                return Err(DecodeErrors::SosError(
                    "Cannot merge DC and AC in one progressive scan, corrupt jpeg".to_string()
                ));
            }

            if state.spectral_start != 0 && ns != 1 {
                return Err(DecodeErrors::SosError(format!(
                    "AC scans must carry a single component, found {ns}"
                )));
            }

            if state.spectral_start > state.spectral_end {
                return Err(DecodeErrors::SosError(
                    "Start of spectral selection beyond its end, corrupt jpeg".to_string()
                ));
            }
        }

        if self.is_lossless {
            if state.spectral_start > 7 {
                return Err(DecodeErrors::SosError(format!(
                    "Invalid lossless predictor {}",
                    state.spectral_start
                )));
            }

            if state.successive_low >= self.precision {
                return Err(DecodeErrors::SosError(format!(
                    "Point transform {} too large for {} bit samples",
                    state.successive_low, self.precision
                )));
            }
        }

        // a sequential scan with a partial component set means the
        // image spreads its components over several scans
        if !self.is_progressive && !self.is_lossless && ns != self.components.len() {
            self.is_multiscan = true;
        }

        state.decode = self.select_decode_fn(&state)?;

        self.check_tables(&state)?;

        #[cfg(feature = "arith")]
        {
            state.arithmetic.dc_l = self.arith_dc_l;
            state.arithmetic.dc_u = self.arith_dc_u;
            state.arithmetic.ac_k = self.arith_ac_k;
        }

        self.todo = if self.restart_interval == 0 {
            usize::MAX
        } else {
            self.restart_interval
        };

        Ok(state)
    }

    /// The mode table of the scan driver: sequential, lossless, or one
    /// of the four progressive variants, in the Huffman or arithmetic
    /// rendition.
    fn select_decode_fn(&self, state: &DecodeState) -> Result<DecodeFn, DecodeErrors> {
        let dc_scan = state.spectral_start == 0;
        let refining = state.successive_high != 0;

        if self.is_arithmetic {
            #[cfg(feature = "arith")]
            {
                use crate::arith::{
                    arith_decode_ac_first, arith_decode_ac_refine, arith_decode_dc_first,
                    arith_decode_dc_refine, arith_decode_mcu, arith_decode_mcu_lossless
                };

                let func: DecodeFn = if self.is_lossless {
                    arith_decode_mcu_lossless
                } else if self.is_progressive {
                    match (dc_scan, refining) {
                        (true, false) => arith_decode_dc_first,
                        (true, true) => arith_decode_dc_refine,
                        (false, false) => arith_decode_ac_first,
                        (false, true) => arith_decode_ac_refine
                    }
                } else {
                    arith_decode_mcu
                };

                return Ok(func);
            }

            #[cfg(not(feature = "arith"))]
            {
                // unreachable in practice, arithmetic frames are
                // rejected at SOF in these builds
                return Err(DecodeErrors::Unsupported(
                    crate::errors::UnsupportedSchemes::Arithmetic
                ));
            }
        }

        let func: DecodeFn = if self.is_lossless {
            huff_decode_mcu_lossless
        } else if self.is_progressive {
            match (dc_scan, refining) {
                (true, false) => huff_decode_dc_first,
                (true, true) => huff_decode_dc_refine,
                (false, false) => huff_decode_ac_first,
                (false, true) => huff_decode_ac_refine
            }
        } else {
            huff_decode_mcu
        };

        Ok(func)
    }

    /// Using a table destination no DHT has installed is a fatal parse
    /// error, catch it before the hot loop.
    fn check_tables(&self, state: &DecodeState) -> Result<(), DecodeErrors> {
        if self.is_arithmetic {
            // statistics bins always exist, conditioning has defaults
            return Ok(());
        }

        let dc_scan = state.spectral_start == 0;

        let needs_dc = if self.is_progressive {
            // refinement reads raw bits only
            dc_scan && state.successive_high == 0
        } else {
            true
        };

        let needs_ac = !self.is_lossless && (!self.is_progressive || !dc_scan);

        for block in &state.block[..state.blocks] {
            if needs_dc && self.dc_huffman_tables[block.dc].is_none() {
                return Err(DecodeErrors::HuffmanDecode(format!(
                    "Scan references DC table {} which was never installed",
                    block.dc
                )));
            }

            if needs_ac && self.ac_huffman_tables[block.ac].is_none() {
                return Err(DecodeErrors::HuffmanDecode(format!(
                    "Scan references AC table {} which was never installed",
                    block.ac
                )));
            }
        }

        Ok(())
    }

    /// Route a sequential single-scan image to one of its three
    /// drivers.
    fn decode_sequential(
        &mut self, state: &mut DecodeState<'a>, process_state: &ProcessState,
        surface: &mut Surface
    ) -> Result<(), DecodeErrors> {
        let workers = self.pool.as_ref().map_or(1, |p| p.thread_count() as usize);

        if workers > 1 {
            if self.restart_interval > 0 {
                return self.decode_sequential_intervals(state, process_state, surface);
            }
            if self.ymcu > 1 {
                return self.decode_sequential_bands(state, process_state, surface);
            }
        }

        self.decode_sequential_serial(state, process_state, surface)
    }

    /// Serial reference path: one MCU decoded, one MCU's pixels
    /// produced.
    fn decode_sequential_serial(
        &mut self, state: &mut DecodeState<'a>, process_state: &ProcessState,
        surface: &mut Surface
    ) -> Result<(), DecodeErrors> {
        let stride = surface.stride();
        let px_height = surface.height();
        let grid = self.grid(surface.format().bytes());

        let tables = DecodeTables {
            dc: &self.dc_huffman_tables,
            ac: &self.ac_huffman_tables
        };

        let restart_interval = self.restart_interval;
        let mut todo = self.todo;

        let xstride = grid.xblock * grid.bpp;
        let pixels = &mut surface.data[..px_height * stride];

        let mut scratch = [0_i16; MAX_BLOCKS_IN_MCU * DCT_BLOCK];
        let decode_fn = state.decode;

        'rows: for y in 0..grid.ymcu {
            if state.stream.overread {
                error!("Premature end of bitstream, zero filling from MCU row {y}");
                pixels[(y * grid.yblock).min(px_height) * stride..].fill(0);
                break 'rows;
            }

            for x in 0..grid.xmcu {
                decode_fn(state, &tables, &mut scratch[..grid.mcu_data])?;
                handle_restart(state, restart_interval, &mut todo);

                let mut process = process_state.process;
                let mut width = grid.xblock;
                let mut height = grid.yblock;

                if grid.yclip != 0 && y == grid.ymcu - 1 {
                    process = process_state.clipped;
                    height = grid.yclip;
                }

                if grid.xclip != 0 && x == grid.xmcu - 1 {
                    process = process_state.clipped;
                    width = grid.xclip;
                }

                let dest = &mut pixels[y * grid.yblock * stride + x * xstride..];

                process(dest, stride, &scratch[..grid.mcu_data], process_state, width, height);
            }
        }

        self.todo = todo;

        Ok(())
    }

    /// Row band pipeline: the main thread decodes coefficients band by
    /// band, workers turn finished bands into pixels behind it.
    fn decode_sequential_bands(
        &mut self, state: &mut DecodeState<'a>, process_state: &ProcessState,
        surface: &mut Surface
    ) -> Result<(), DecodeErrors> {
        let stride = surface.stride();
        let px_height = surface.height();
        let grid = self.grid(surface.format().bytes());

        let tables = DecodeTables {
            dc: &self.dc_huffman_tables,
            ac: &self.ac_huffman_tables
        };

        let restart_interval = self.restart_interval;
        let mut todo = self.todo;

        let mut arena = vec![0_i16; self.mcus * grid.mcu_data];

        let pool = self.pool.as_mut().unwrap();
        let band_rows = band_height(grid.ymcu, pool.thread_count() as usize);

        let pixels = &mut surface.data[..px_height * stride];
        let decode_fn = state.decode;

        pool.scoped(|scope| -> Result<(), DecodeErrors> {
            let mut pixels_rest = pixels;
            let mut arena_rest = &mut arena[..];
            let mut consumed_px_rows = 0_usize;
            let mut row = 0_usize;

            while row < grid.ymcu {
                let rows = band_rows.min(grid.ymcu - row);
                let band_px_rows = (rows * grid.yblock).min(px_height - consumed_px_rows);

                let (band_pixels, rest) = pixels_rest.split_at_mut(band_px_rows * stride);
                let (band_coeffs, arest) = arena_rest.split_at_mut(rows * grid.xmcu * grid.mcu_data);

                pixels_rest = rest;
                arena_rest = arest;

                // serial entropy decode of this band
                let mut good_rows = rows;

                'decode: for r in 0..rows {
                    if state.stream.overread {
                        good_rows = r;
                        break 'decode;
                    }

                    for x in 0..grid.xmcu {
                        let offset = (r * grid.xmcu + x) * grid.mcu_data;

                        decode_fn(state, &tables, &mut band_coeffs[offset..offset + grid.mcu_data])?;
                        handle_restart(state, restart_interval, &mut todo);
                    }
                }

                let row0 = row;
                let g = grid;

                scope.execute(move || {
                    render_band(band_pixels, stride, band_coeffs, process_state, &g, row0, good_rows);

                    if good_rows < rows {
                        band_pixels[(good_rows * g.yblock) * stride..].fill(0);
                    }
                });

                if good_rows < rows {
                    error!("Premature end of bitstream, zero filling from MCU row {}", row + good_rows);
                    pixels_rest.fill(0);
                    break;
                }

                consumed_px_rows += band_px_rows;
                row += rows;
            }

            Ok(())
        })?;

        self.todo = todo;

        Ok(())
    }

    /// Restart interval tasks: each interval is decoded and rendered
    /// wholly on a worker, anchored at a pre-scanned stream position.
    fn decode_sequential_intervals(
        &mut self, state: &mut DecodeState<'a>, process_state: &ProcessState,
        surface: &mut Surface
    ) -> Result<(), DecodeErrors> {
        let stride = surface.stride();
        let px_height = surface.height();
        let grid = self.grid(surface.format().bytes());

        let tables = DecodeTables {
            dc: &self.dc_huffman_tables,
            ac: &self.ac_huffman_tables
        };

        let interval = self.restart_interval;
        let mcus = self.mcus;
        let num_intervals = (mcus + interval - 1) / interval;

        // pre-scan the stream for the interval boundaries; each `FF Dn`
        // starts a self contained entropy coded unit
        let mut starts = Vec::with_capacity(num_intervals);
        let mut position = state.stream.position();

        starts.push(position);

        for _ in 1..num_intervals {
            match seek_marker(self.data, position) {
                Some(marker_pos) => {
                    position = marker_pos + 2;
                    starts.push(position);
                }
                None => break
            }
        }

        let scan_end =
            seek_marker(self.data, *starts.last().unwrap()).unwrap_or(self.data.len());

        if starts.len() < num_intervals {
            warn!(
                "Found {} of {} restart intervals, the stream is truncated",
                starts.len(),
                num_intervals
            );
        }

        let pixels = &mut surface.data[..px_height * stride];

        // zero anything not covered by a found interval
        let covered_mcus = (starts.len() * interval).min(mcus);

        if covered_mcus < mcus {
            let first_bad_row = covered_mcus / grid.xmcu;
            pixels[(first_bad_row * grid.yblock).min(px_height) * stride..].fill(0);
        }

        let cell = SurfaceCell::new(pixels);

        let pool = self.pool.as_mut().unwrap();

        pool.scoped(|scope| {
            for (index, &start) in starts.iter().enumerate() {
                let first_mcu = index * interval;
                let count = interval.min(mcus - first_mcu);

                let mut task_state = state.clone();

                task_state.stream.reset_at(start);
                task_state.huffman.restart();
                #[cfg(feature = "arith")]
                task_state.arithmetic.restart();

                let cell = &cell;
                let tables = &tables;
                let g = grid;

                scope.execute(move || {
                    let mut scratch = [0_i16; MAX_BLOCKS_IN_MCU * DCT_BLOCK];
                    let decode_fn = task_state.decode;

                    for j in 0..count {
                        let n = first_mcu + j;

                        if decode_fn(&mut task_state, tables, &mut scratch[..g.mcu_data]).is_err() {
                            break;
                        }

                        let x = n % g.xmcu;
                        let y = n / g.xmcu;

                        render_mcu_via_tile(cell, stride, &scratch[..g.mcu_data], process_state, &g, x, y);
                    }
                });
            }
        });

        // the interval tasks consumed the whole segment, re-anchor the
        // caller's stream after it
        state.stream.reset_at(scan_end);
        self.todo = interval;

        Ok(())
    }
}
