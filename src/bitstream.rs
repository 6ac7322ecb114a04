//! The entropy coded segment bit buffer and the Huffman decode
//! functions driven by it.
//!
//! The buffer is a 64 bit MSB-first shift register refilled six bytes
//! at a time. Refilling is the hot loop of the whole decoder, so we
//! keep a cached index of the next `0xFF` byte in the stream; while the
//! read pointer is comfortably before it we can load eight raw bytes
//! with no byte-unstuffing checks at all. Only near an `0xFF` do we
//! fall back to the careful path which drops stuffed zero bytes and
//! parks on markers.
//!
//! Once the stream is exhausted (or a marker is reached) the buffer
//! returns zero bits indefinitely; it is the scan drivers' job to check
//! for the marker or the end of the stream between MCUs.

#[cfg(feature = "arith")]
use crate::arith::Arithmetic;
use crate::errors::DecodeErrors;
use crate::huffman::{HuffmanTable, HUFF_LOOKAHEAD};
use crate::misc::{next_ff, MAX_BLOCKS_IN_MCU, MAX_COMPS_IN_SCAN, UN_ZIGZAG};

/// A bit buffer over one entropy coded segment.
#[derive(Clone)]
pub(crate) struct BitStream<'a> {
    data:         &'a [u8],
    /// Position of the next unread byte
    pos:          usize,
    /// Cached position of the next 0xFF byte at or after `pos`,
    /// `data.len()` when none remains
    next_ff:      usize,
    /// MSB first shift register, valid bits in the low `remain` bits
    buffer:       u64,
    remain:       i32,
    /// Set once a refill read past the end of the input
    pub overread: bool
}

impl<'a> BitStream<'a> {
    /// Create a bit buffer over `data`, starting at byte `start`.
    pub fn new(data: &'a [u8], start: usize) -> BitStream<'a> {
        BitStream {
            data,
            pos: start,
            next_ff: next_ff(data, start),
            buffer: 0,
            remain: 0,
            overread: false
        }
    }

    /// Current byte position in the stream
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Re-anchor the buffer at `start`, clearing all buffered bits.
    pub fn reset_at(&mut self, start: usize) {
        self.pos = start;
        self.restart();
    }

    /// Clear the shift register and recompute the 0xFF cache.
    ///
    /// Called when crossing a restart marker; buffered padding bits of
    /// the previous interval are discarded.
    pub fn restart(&mut self) {
        self.buffer = 0;
        self.remain = 0;
        self.next_ff = next_ff(self.data, self.pos);
    }

    /// Guarantee at least 16 valid bits in the register.
    ///
    /// Refills 48 bits at a time. The fast path runs when the read
    /// pointer is far enough from the next 0xFF that eight bytes can be
    /// loaded without any stuffing checks.
    #[inline(always)]
    pub fn refill_16(&mut self) {
        if self.remain < 16 {
            self.remain += 48;

            let bits = if self.pos + 8 < self.next_ff {
                let chunk: [u8; 8] = self.data[self.pos..self.pos + 8].try_into().unwrap();

                self.pos += 6;

                u64::from_be_bytes(chunk) >> 16
            } else {
                self.bytes(6)
            };

            self.buffer = (self.buffer << 48) | bits;
        }
    }

    /// Careful byte reader: performs ECS byte-unstuffing and parks on
    /// markers.
    ///
    /// After `0xFF` a `0x00` is discarded; any other byte is a marker
    /// and the read pointer rewinds onto the `0xFF` so every further
    /// read yields zero until the scan driver consumes the marker.
    #[cold]
    fn bytes(&mut self, count: usize) -> u64 {
        let mut bits = 0_u64;

        for _ in 0..count {
            let mut a = if self.pos < self.data.len() {
                let v = self.data[self.pos];
                self.pos += 1;
                u64::from(v)
            } else {
                self.overread = true;
                0
            };

            if a == 0xff {
                let b = self.data.get(self.pos).copied().unwrap_or(0);

                if b == 0 {
                    // stuffed byte, drop the zero
                    self.pos += 1;
                } else {
                    // a marker, park on its 0xFF and return zeros
                    // until someone handles it
                    self.pos -= 1;
                    a = 0;
                }
            }

            bits = (bits << 8) | a;
        }

        // When no 0xFF remains the stream is corrupt (EOI should always
        // be present); leaving the cache at the end pins us to this
        // path which guards every read.
        if self.next_ff < self.data.len() {
            self.next_ff = next_ff(self.data, self.pos);
        }

        return bits;
    }

    /// Top `count` bits of the register without consuming them.
    ///
    /// Requires `remain >= count`, which `refill_16` guarantees for
    /// any `count <= 16`.
    #[inline(always)]
    pub fn peek(&self, count: u8) -> u64 {
        (self.buffer >> (self.remain - i32::from(count))) & ((1 << count) - 1)
    }

    /// Discard the top `count` bits.
    #[inline(always)]
    pub fn consume(&mut self, count: u8) {
        self.remain -= i32::from(count);
    }

    /// Read and consume `count` bits, refilling as needed.
    #[inline(always)]
    pub fn get_bits(&mut self, count: u8) -> i32 {
        if count == 0 {
            return 0;
        }

        self.refill_16();

        let bits = self.peek(count) as i32;

        self.remain -= i32::from(count);

        bits
    }

    /// Read a single bit.
    #[inline(always)]
    pub fn get_bit(&mut self) -> bool {
        self.get_bits(1) != 0
    }

    /// Read `count` bits and sign extend them per F.2.2.1.
    #[inline(always)]
    pub fn receive_extend(&mut self, count: u8) -> i32 {
        huff_extend(self.get_bits(count), i32::from(count))
    }

    /// Decode one Huffman symbol.
    ///
    /// Corrupt codes (longer than 16 bits) decode to symbol zero; the
    /// stream is damaged beyond this point anyway and a zero symbol
    /// (EOB / zero DC difference) degrades most gracefully.
    #[inline(always)]
    pub fn decode_symbol(&mut self, table: &HuffmanTable) -> i32 {
        self.refill_16();

        let idx = self.peek(HUFF_LOOKAHEAD) as usize;
        let size = table.lookup_size[idx];

        if size != 0 {
            self.consume(size);
            return i32::from(table.lookup_value[idx]);
        }

        // longer than the lookahead, walk lengths 9..16
        let bits = self.peek(16) as i32;
        let mut length = i32::from(HUFF_LOOKAHEAD) + 1;

        while length <= 16 && (bits >> (16 - length)) > table.maxcode[length as usize] {
            length += 1;
        }

        if length > 16 {
            self.consume(16);
            return 0;
        }

        let code = bits >> (16 - length);

        self.consume(length as u8);

        i32::from(table.value[((code + table.value_offset[length as usize]) & 0xff) as usize])
    }

    /// Whether the next two bytes in the stream are a restart marker,
    /// returning its modulo-8 counter.
    pub fn peek_restart_marker(&self) -> Option<u8> {
        if self.data.get(self.pos) == Some(&0xff) {
            if let Some(id @ 0xd0..=0xd7) = self.data.get(self.pos + 1) {
                return Some(id - 0xd0);
            }
        }
        None
    }

    /// Step over a two-byte marker and restart the register.
    pub fn skip_marker(&mut self) {
        self.pos += 2;
        self.restart();
    }

    /// Byte reader for the arithmetic decoder, which consumes the
    /// entropy coded segment bytewise.
    ///
    /// Performs the same unstuffing and marker parking as the Huffman
    /// refill.
    #[cfg(feature = "arith")]
    pub fn read_arith_byte(&mut self) -> u8 {
        if self.pos >= self.data.len() {
            self.overread = true;
            return 0;
        }

        let b = self.data[self.pos];

        if b == 0xff {
            if self.data.get(self.pos + 1) == Some(&0x00) {
                self.pos += 2;
                return 0xff;
            }
            // marker, park and feed zeros
            return 0;
        }

        self.pos += 1;

        return b;
    }
}

/// Do the equivalent of JPEG HUFF_EXTEND
#[inline(always)]
fn huff_extend(x: i32, s: i32) -> i32 {
    if s == 0 {
        return x;
    }
    // if x < 1 << (s - 1), add (-1 << s) + 1
    x + (((x - (1 << (s - 1))) >> 31) & (((-1) << s) + 1))
}

/// Huffman side of the per-scan entropy state: DC predictors plus the
/// progressive end-of-band run counter.
#[derive(Clone, Default)]
pub(crate) struct HuffmanState {
    pub last_dc_value: [i32; MAX_COMPS_IN_SCAN],
    pub eob_run:       i32
}

impl HuffmanState {
    pub fn restart(&mut self) {
        self.last_dc_value = [0; MAX_COMPS_IN_SCAN];
        self.eob_run = 0;
    }
}

/// One 8x8 block's slot in the scan's MCU layout.
#[derive(Clone, Copy, Default)]
pub(crate) struct DecodeBlock {
    /// Coefficient offset of the block inside the MCU
    pub offset: usize,
    /// Frame component index, selects the DC predictor
    pub pred:   usize,
    /// DC entropy table destination
    pub dc:     usize,
    /// AC entropy table destination
    pub ac:     usize
}

/// Entropy tables frozen for the duration of one scan.
pub(crate) struct DecodeTables<'t> {
    pub dc: &'t [Option<HuffmanTable>; MAX_COMPS_IN_SCAN],
    pub ac: &'t [Option<HuffmanTable>; MAX_COMPS_IN_SCAN]
}

/// A scan decode function, one of the six Huffman or six arithmetic
/// variants, selected once per SOS.
pub(crate) type DecodeFn =
    fn(&mut DecodeState<'_>, &DecodeTables<'_>, &mut [i16]) -> Result<(), DecodeErrors>;

/// All the mutable state of one entropy coded segment.
///
/// This is a plain value: cloning it anchors an independent decoder at
/// the same stream position, which is what the restart-interval
/// parallel path does. Tables stay behind references.
#[derive(Clone)]
pub(crate) struct DecodeState<'a> {
    pub stream:          BitStream<'a>,
    pub huffman:         HuffmanState,
    #[cfg(feature = "arith")]
    pub arithmetic:      Arithmetic,
    pub block:           [DecodeBlock; MAX_BLOCKS_IN_MCU],
    pub blocks:          usize,
    pub comps_in_scan:   usize,
    pub spectral_start:  u8,
    pub spectral_end:    u8,
    pub successive_high: u8,
    pub successive_low:  u8,
    pub decode:          DecodeFn
}

impl<'a> DecodeState<'a> {
    pub fn new(data: &'a [u8], start: usize) -> DecodeState<'a> {
        DecodeState {
            stream: BitStream::new(data, start),
            huffman: HuffmanState::default(),
            #[cfg(feature = "arith")]
            arithmetic: Arithmetic::default(),
            block: [DecodeBlock::default(); MAX_BLOCKS_IN_MCU],
            blocks: 0,
            comps_in_scan: 0,
            spectral_start: 0,
            spectral_end: 63,
            successive_high: 0,
            successive_low: 0,
            decode: huff_decode_mcu
        }
    }

    /// Seed the predictor of scan component `index`, used by the
    /// lossless driver which recomputes the prediction per sample.
    pub fn set_predictor(&mut self, index: usize, value: i32) {
        self.huffman.last_dc_value[index] = value;
        #[cfg(feature = "arith")]
        {
            self.arithmetic.last_dc_value[index] = value;
        }
    }
}

fn dc_table<'t>(
    tables: &DecodeTables<'t>, index: usize
) -> Result<&'t HuffmanTable, DecodeErrors> {
    tables.dc[index & (MAX_COMPS_IN_SCAN - 1)]
        .as_ref()
        .ok_or_else(|| DecodeErrors::HuffmanDecode(format!("DC table {index} not installed")))
}

fn ac_table<'t>(
    tables: &DecodeTables<'t>, index: usize
) -> Result<&'t HuffmanTable, DecodeErrors> {
    tables.ac[index & (MAX_COMPS_IN_SCAN - 1)]
        .as_ref()
        .ok_or_else(|| DecodeErrors::HuffmanDecode(format!("AC table {index} not installed")))
}

/// Decode one full MCU of a sequential scan.
///
/// `output` holds `blocks * 64` coefficients; each block is zeroed here
/// and filled in natural order through the zig-zag table.
pub(crate) fn huff_decode_mcu(
    state: &mut DecodeState<'_>, tables: &DecodeTables<'_>, output: &mut [i16]
) -> Result<(), DecodeErrors> {
    for i in 0..state.blocks {
        let block = state.block[i];
        let dc = dc_table(tables, block.dc)?;
        let ac = ac_table(tables, block.ac)?;

        let out: &mut [i16; 64] = (&mut output[block.offset..block.offset + 64])
            .try_into()
            .unwrap();

        out.fill(0);

        // DC difference, F.2.2.1; a valid category is at most 16,
        // anything larger comes from a corrupt table
        let s = state.stream.decode_symbol(dc).min(16);
        let mut diff = 0;

        if s != 0 {
            diff = state.stream.receive_extend(s as u8);
        }

        state.huffman.last_dc_value[block.pred] += diff;
        out[0] = state.huffman.last_dc_value[block.pred] as i16;

        // AC run/size pairs, F.2.2.2
        let mut k = 1_usize;

        while k < 64 {
            let rs = state.stream.decode_symbol(ac);
            let r = rs >> 4;
            let s = rs & 15;

            if s == 0 {
                if r != 15 {
                    // EOB
                    break;
                }
                // ZRL, skip 16 zero coefficients
                k += 16;
            } else {
                k += r as usize;

                let value = state.stream.receive_extend(s as u8);

                out[UN_ZIGZAG[k.min(63)] & 63] = value as i16;
                k += 1;
            }
        }
    }

    Ok(())
}

/// Lossless scans emit one sign extended difference per component, no
/// dequantization and no iDCT; prediction happens in the driver which
/// seeds `last_dc_value` before every sample.
pub(crate) fn huff_decode_mcu_lossless(
    state: &mut DecodeState<'_>, tables: &DecodeTables<'_>, output: &mut [i16]
) -> Result<(), DecodeErrors> {
    for i in 0..state.comps_in_scan {
        let block = state.block[i];
        let dc = dc_table(tables, block.dc)?;

        let s = state.stream.decode_symbol(dc).min(16);
        let mut diff = 0;

        if s != 0 {
            diff = state.stream.receive_extend(s as u8);
        }

        state.huffman.last_dc_value[block.pred] += diff;
        output[i] = state.huffman.last_dc_value[block.pred] as i16;
    }

    Ok(())
}

/// First DC scan of a progressive frame: decode the difference and
/// store it shifted up by the successive approximation low bit.
pub(crate) fn huff_decode_dc_first(
    state: &mut DecodeState<'_>, tables: &DecodeTables<'_>, output: &mut [i16]
) -> Result<(), DecodeErrors> {
    let shift = state.successive_low;

    for i in 0..state.blocks {
        let block = state.block[i];
        let dc = dc_table(tables, block.dc)?;

        let s = state.stream.decode_symbol(dc).min(16);
        let mut diff = 0;

        if s != 0 {
            diff = state.stream.receive_extend(s as u8);
        }

        state.huffman.last_dc_value[block.pred] += diff;
        output[block.offset] = (state.huffman.last_dc_value[block.pred] << shift) as i16;
    }

    Ok(())
}

/// DC refinement scan: a single raw bit per block ORed into the
/// coefficient at the current bit position.
pub(crate) fn huff_decode_dc_refine(
    state: &mut DecodeState<'_>, _tables: &DecodeTables<'_>, output: &mut [i16]
) -> Result<(), DecodeErrors> {
    let bit = 1 << state.successive_low;

    for i in 0..state.blocks {
        let offset = state.block[i].offset;

        if state.stream.get_bit() {
            output[offset] |= bit;
        }
    }

    Ok(())
}

/// First AC scan over the band `[spectral_start, spectral_end]` of a
/// single 8x8 block.
pub(crate) fn huff_decode_ac_first(
    state: &mut DecodeState<'_>, tables: &DecodeTables<'_>, output: &mut [i16]
) -> Result<(), DecodeErrors> {
    if state.huffman.eob_run > 0 {
        state.huffman.eob_run -= 1;
        return Ok(());
    }

    let ac = ac_table(tables, state.block[0].ac)?;
    let shift = state.successive_low;
    let spec_end = usize::from(state.spectral_end);

    let mut k = usize::from(state.spectral_start);

    while k <= spec_end {
        let rs = state.stream.decode_symbol(ac);
        let r = rs >> 4;
        let s = rs & 15;

        if s == 0 {
            if r < 15 {
                // EOB-n: run length is 2^r plus the next r raw bits,
                // this block included
                state.huffman.eob_run = (1 << r) - 1;

                if r > 0 {
                    state.huffman.eob_run += state.stream.get_bits(r as u8);
                }
                break;
            }
            k += 16;
        } else {
            k += r as usize;

            let value = state.stream.receive_extend(s as u8) << shift;

            output[UN_ZIGZAG[k.min(63)] & 63] = value as i16;
            k += 1;
        }
    }

    Ok(())
}

/// Absorb a correction bit into every non-zero coefficient of the band
/// `k..=spec_end`, the tail phase of an AC refinement block.
fn refine_non_zeroes(
    stream: &mut BitStream, output: &mut [i16], mut k: usize, spec_end: usize, bit: i16
) {
    while k <= spec_end {
        let coef = &mut output[UN_ZIGZAG[k] & 63];
        k += 1;

        if *coef != 0 && stream.get_bit() && (*coef & bit) == 0 {
            if *coef >= 0 {
                *coef += bit;
            } else {
                *coef -= bit;
            }
        }
    }
}

/// AC refinement scan, the standard correction-bit state machine of
/// G.1.2.3: existing non-zero coefficients absorb one correction bit
/// each, newly non-zero ones are created with magnitude `1 << Al`.
pub(crate) fn huff_decode_ac_refine(
    state: &mut DecodeState<'_>, tables: &DecodeTables<'_>, output: &mut [i16]
) -> Result<(), DecodeErrors> {
    let ac = ac_table(tables, state.block[0].ac)?;

    let bit = 1_i16 << state.successive_low;
    let spec_end = usize::from(state.spectral_end);
    let mut k = usize::from(state.spectral_start);

    if state.huffman.eob_run > 0 {
        // inside an EOB run only correction bits for already non-zero
        // coefficients are present
        state.huffman.eob_run -= 1;
        refine_non_zeroes(&mut state.stream, output, k, spec_end, bit);
        return Ok(());
    }

    while k <= spec_end {
        let rs = state.stream.decode_symbol(ac);
        let mut r = rs >> 4;
        let s = rs & 15;

        let mut new_value = 0_i16;

        if s == 0 {
            if r < 15 {
                // EOB-n: the run excludes this block, whose tail still
                // carries correction bits
                state.huffman.eob_run = (1 << r) - 1;

                if r > 0 {
                    state.huffman.eob_run += state.stream.get_bits(r as u8);
                }

                refine_non_zeroes(&mut state.stream, output, k, spec_end, bit);
                return Ok(());
            }
            // r == 15, skip over 16 zero-history coefficients
        } else {
            if s != 1 {
                return Err(DecodeErrors::HuffmanDecode(
                    "Bad Huffman code in AC refinement scan".to_string()
                ));
            }

            new_value = if state.stream.get_bit() { bit } else { -bit };
        }

        // advance over `r` zero-history coefficients, refining any
        // non-zero ones we cross
        while k <= spec_end {
            let coef = &mut output[UN_ZIGZAG[k] & 63];
            k += 1;

            if *coef != 0 {
                if state.stream.get_bit() && (*coef & bit) == 0 {
                    if *coef >= 0 {
                        *coef += bit;
                    } else {
                        *coef -= bit;
                    }
                }
            } else {
                if r == 0 {
                    if new_value != 0 {
                        output[UN_ZIGZAG[k - 1] & 63] = new_value;
                    }
                    break;
                }
                r -= 1;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::BitStream;

    #[test]
    fn bits_come_out_msb_first() {
        let data = [0b1010_0000, 0x5a, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07];
        let mut stream = BitStream::new(&data, 0);

        stream.refill_16();
        assert_eq!(stream.peek(4), 0b1010);

        stream.consume(4);
        assert_eq!(stream.get_bits(8), 0x05);
        assert_eq!(stream.get_bits(4), 0xa);
    }

    #[test]
    fn stuffed_bytes_are_removed() {
        // 0xFF 0x00 in the ECS is a literal 0xFF byte
        let data = [0xff, 0x00, 0xff, 0x00, 0x12, 0x34, 0x56, 0x78, 0x9a];
        let mut stream = BitStream::new(&data, 0);

        assert_eq!(stream.get_bits(16), 0xffff);
        assert_eq!(stream.get_bits(16), 0x1234);
    }

    #[test]
    fn marker_parks_the_stream_and_feeds_zeros() {
        let data = [0xab, 0xff, 0xd9];
        let mut stream = BitStream::new(&data, 0);

        assert_eq!(stream.get_bits(8), 0xab);
        // everything after the marker reads as zero
        assert_eq!(stream.get_bits(16), 0);
        assert_eq!(stream.get_bits(16), 0);
        // and the stream is parked exactly on the marker
        assert_eq!(stream.position(), 1);
    }

    #[test]
    fn truncated_stream_sets_overread() {
        let data = [0x80];
        let mut stream = BitStream::new(&data, 0);

        assert_eq!(stream.get_bits(8), 0x80);
        assert_eq!(stream.get_bits(8), 0);
        assert!(stream.overread);
    }

    #[test]
    fn restart_marker_detection() {
        let data = [0xff, 0xd3, 0x00];
        let stream = BitStream::new(&data, 0);

        assert_eq!(stream.peek_restart_marker(), Some(3));
    }

    #[test]
    fn receive_extend_sign_extends() {
        // bit stream: 111 | 011 | 100 ...
        let data = [0b1110_1110, 0b0000_0000, 0, 0, 0, 0, 0, 0];
        let mut stream = BitStream::new(&data, 0);

        // 111 is already in the positive half for 3 bits
        assert_eq!(stream.receive_extend(3), 7);
        // 011 is below 1 << 2, extends to 3 - 7 = -4
        assert_eq!(stream.receive_extend(3), -4);
        // 100 is exactly 1 << 2, stays positive
        assert_eq!(stream.receive_extend(3), 4);
    }
}
