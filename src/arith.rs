//! The arithmetic entropy decoder of ISO/IEC 10918-1 annex F/G.
//!
//! This is the adaptive binary arithmetic coder with the standard
//! probability estimation state machine (Table D.3). The decoder state
//! is three registers `(C, A, CT)` plus one byte of coder state per
//! statistics bin: bit 7 is the current MPS sense, bits 0..6 index the
//! Qe table.
//!
//! DC coefficients condition on the previous difference's sign and
//! magnitude (bucketed by the L and U conditioning values), AC
//! coefficients on the spectral position relative to K. A fixed
//! equiprobable bin handles decisions with no useful context.
//!
//! Mirrors the Huffman side function for function; both produce
//! identical coefficients for identical images.

use crate::bitstream::{DecodeState, DecodeTables};
use crate::errors::DecodeErrors;
use crate::misc::{MAX_COMPS_IN_SCAN, UN_ZIGZAG};

/// Arithmetic conditioning tables are numbered 0..15
const NUM_ARITH_TABLES: usize = 16;
/// Statistics bins for DC coding, per table
const DC_STAT_BINS: usize = 64;
/// Statistics bins for AC coding, per table
const AC_STAT_BINS: usize = 256;

/// Index of the non-adapting, equiprobable Qe entry
const FIXED_BIN: u8 = 113;

struct QeEntry {
    qe:     u16,
    nmps:   u8,
    nlps:   u8,
    switch: bool
}

macro_rules! qe {
    ($qe:expr, $nmps:expr, $nlps:expr, $switch:expr) => {
        QeEntry {
            qe:     $qe,
            nmps:   $nmps,
            nlps:   $nlps,
            switch: $switch == 1
        }
    };
}

/// Table D.3: Qe values and the probability estimation state machine.
///
/// The final entry is the fixed 0.5 probability state which transitions
/// to itself.
#[rustfmt::skip]
static QE_TABLE: [QeEntry; 114] = [
    qe!(0x5a1d,   1,   1, 1), qe!(0x2586,  14,   2, 0), qe!(0x1114,  16,   3, 0),
    qe!(0x080b,  18,   4, 0), qe!(0x03d8,  20,   5, 0), qe!(0x01da,  23,   6, 0),
    qe!(0x00e5,  25,   7, 0), qe!(0x006f,  28,   8, 0), qe!(0x0036,  30,   9, 0),
    qe!(0x001a,  33,  10, 0), qe!(0x000d,  35,  11, 0), qe!(0x0006,   9,  12, 0),
    qe!(0x0003,  10,  13, 0), qe!(0x0001,  12,  13, 0), qe!(0x5a7f,  15,  15, 1),
    qe!(0x3f25,  36,  16, 0), qe!(0x2cf2,  38,  17, 0), qe!(0x207c,  39,  18, 0),
    qe!(0x17b9,  40,  19, 0), qe!(0x1182,  42,  20, 0), qe!(0x0cef,  43,  21, 0),
    qe!(0x09a1,  45,  22, 0), qe!(0x072f,  46,  23, 0), qe!(0x055c,  48,  24, 0),
    qe!(0x0406,  49,  25, 0), qe!(0x0303,  51,  26, 0), qe!(0x0240,  52,  27, 0),
    qe!(0x01b1,  54,  28, 0), qe!(0x0144,  56,  29, 0), qe!(0x00f5,  57,  30, 0),
    qe!(0x00b7,  59,  31, 0), qe!(0x008a,  60,  32, 0), qe!(0x0068,  62,  33, 0),
    qe!(0x004e,  63,  34, 0), qe!(0x003b,  32,  35, 0), qe!(0x002c,  33,   9, 0),
    qe!(0x5ae1,  37,  37, 1), qe!(0x484c,  64,  38, 0), qe!(0x3a0d,  65,  39, 0),
    qe!(0x2ef1,  67,  40, 0), qe!(0x261f,  68,  41, 0), qe!(0x1f33,  69,  42, 0),
    qe!(0x19a8,  70,  43, 0), qe!(0x1518,  72,  44, 0), qe!(0x1177,  73,  45, 0),
    qe!(0x0e74,  74,  46, 0), qe!(0x0bfb,  75,  47, 0), qe!(0x09f8,  77,  48, 0),
    qe!(0x0861,  78,  49, 0), qe!(0x0706,  79,  50, 0), qe!(0x05cd,  48,  51, 0),
    qe!(0x04de,  50,  52, 0), qe!(0x040f,  50,  53, 0), qe!(0x0363,  51,  54, 0),
    qe!(0x02d4,  52,  55, 0), qe!(0x025c,  53,  56, 0), qe!(0x01f8,  54,  57, 0),
    qe!(0x01a4,  55,  58, 0), qe!(0x0160,  56,  59, 0), qe!(0x0125,  57,  60, 0),
    qe!(0x00f6,  58,  61, 0), qe!(0x00cb,  59,  62, 0), qe!(0x00ab,  61,  63, 0),
    qe!(0x008f,  61,  32, 0), qe!(0x5b12,  65,  65, 1), qe!(0x4d04,  80,  66, 0),
    qe!(0x412c,  81,  67, 0), qe!(0x37d8,  82,  68, 0), qe!(0x2fe8,  83,  69, 0),
    qe!(0x293c,  84,  70, 0), qe!(0x2379,  86,  71, 0), qe!(0x1edf,  87,  72, 0),
    qe!(0x1aa9,  87,  73, 0), qe!(0x174e,  72,  74, 0), qe!(0x1424,  72,  75, 0),
    qe!(0x119c,  74,  76, 0), qe!(0x0f6b,  74,  77, 0), qe!(0x0d51,  75,  78, 0),
    qe!(0x0bb6,  77,  79, 0), qe!(0x0a40,  77,  48, 0), qe!(0x5832,  80,  81, 1),
    qe!(0x4d1c,  88,  82, 0), qe!(0x438e,  89,  83, 0), qe!(0x3bdd,  90,  84, 0),
    qe!(0x34ee,  91,  85, 0), qe!(0x2eae,  92,  86, 0), qe!(0x299a,  93,  87, 0),
    qe!(0x2516,  86,  71, 0), qe!(0x5570,  88,  89, 1), qe!(0x4ca9,  95,  90, 0),
    qe!(0x44d9,  96,  91, 0), qe!(0x3e22,  97,  92, 0), qe!(0x3824,  99,  93, 0),
    qe!(0x32b4,  99,  94, 0), qe!(0x2e17,  93,  86, 0), qe!(0x56a8,  95,  96, 1),
    qe!(0x4f46, 101,  97, 0), qe!(0x47e5, 102,  98, 0), qe!(0x41cf, 103,  99, 0),
    qe!(0x3c3d, 104, 100, 0), qe!(0x375e,  99,  93, 0), qe!(0x5231, 105, 102, 0),
    qe!(0x4c0f, 106, 103, 0), qe!(0x4639, 107, 104, 0), qe!(0x415e, 103,  99, 0),
    qe!(0x5627, 105, 106, 1), qe!(0x50e7, 108, 107, 0), qe!(0x4b85, 109, 103, 0),
    qe!(0x5597, 110, 109, 0), qe!(0x504f, 111, 107, 0), qe!(0x5a10, 110, 111, 1),
    qe!(0x5522, 112, 109, 0), qe!(0x59eb, 112, 111, 1), qe!(0x5a1d, 113, 113, 0)
];

/// The `(C, A, CT)` registers of the coder.
#[derive(Clone, Copy)]
pub(crate) struct Registers {
    c:  u32,
    a:  u32,
    ct: i32
}

impl Registers {
    fn init() -> Registers {
        // CT = -16 makes the renormalization loop pull the two
        // initialization bytes before the first decision
        Registers { c: 0, a: 0, ct: -16 }
    }

    /// Decode one binary decision against the statistics byte `st`.
    ///
    /// `st` packs the MPS sense in bit 7 and the Qe state index in the
    /// low bits; both are updated in place per the estimation state
    /// machine.
    #[inline(always)]
    fn decode(&mut self, stream: &mut crate::bitstream::BitStream, st: &mut u8) -> i32 {
        // Renormalization and data feeding, F.2.6.3. A is kept aligned
        // lazily: instead of shifting C on every renormalization we
        // shift A's comparison point by CT.
        while self.a < 0x8000 {
            self.ct -= 1;

            if self.ct < 0 {
                let data = u32::from(stream.read_arith_byte());

                self.c = (self.c << 8) | data;
                self.ct += 8;

                if self.ct < 0 {
                    self.ct += 1;

                    if self.ct == 0 {
                        // got the two initial bytes, A becomes 0x10000
                        // after the shift below
                        self.a = 0x8000;
                    }
                }
            }

            self.a <<= 1;
        }

        let mut sv = *st;
        let entry = &QE_TABLE[usize::from(sv & 0x7f)];
        let qe = u32::from(entry.qe);

        // Decode and estimation procedures, F.2.6.1 and F.2.6.2
        self.a -= qe;

        let threshold = self.a << self.ct;

        if self.c >= threshold {
            self.c -= threshold;

            // conditional LPS exchange
            if self.a < qe {
                *st = (sv & 0x80) ^ entry.nmps;
            } else {
                *st = (sv & 0x80) ^ entry.nlps ^ ((entry.switch as u8) << 7);
                sv ^= 0x80;
            }
            self.a = qe;
        } else if self.a < 0x8000 {
            // conditional MPS exchange
            if self.a < qe {
                *st = (sv & 0x80) ^ entry.nlps ^ ((entry.switch as u8) << 7);
                sv ^= 0x80;
            } else {
                *st = (sv & 0x80) ^ entry.nmps;
            }
        }

        i32::from(sv >> 7)
    }
}

/// Full arithmetic entropy state for one frame.
#[derive(Clone)]
pub(crate) struct Arithmetic {
    regs: Registers,

    /// Last DC value per scan component
    pub last_dc_value: [i32; MAX_COMPS_IN_SCAN],
    /// DC conditioning context per scan component
    dc_context:        [usize; MAX_COMPS_IN_SCAN],

    /// L values for the DC conditioning tables
    pub dc_l: [u8; NUM_ARITH_TABLES],
    /// U values for the DC conditioning tables
    pub dc_u: [u8; NUM_ARITH_TABLES],
    /// K values for the AC conditioning tables
    pub ac_k: [u8; NUM_ARITH_TABLES],

    dc_stats: [[u8; DC_STAT_BINS]; NUM_ARITH_TABLES],
    ac_stats: [[u8; AC_STAT_BINS]; NUM_ARITH_TABLES],

    /// Statistics bin for decisions coded with fixed 0.5 probability
    fixed_bin: u8
}

impl Default for Arithmetic {
    fn default() -> Self {
        Arithmetic {
            regs:          Registers::init(),
            last_dc_value: [0; MAX_COMPS_IN_SCAN],
            dc_context:    [0; MAX_COMPS_IN_SCAN],
            // conditioning defaults per F.1.4.4.1.4 / F.1.4.4.2
            dc_l:          [0; NUM_ARITH_TABLES],
            dc_u:          [1; NUM_ARITH_TABLES],
            ac_k:          [5; NUM_ARITH_TABLES],
            dc_stats:      [[0; DC_STAT_BINS]; NUM_ARITH_TABLES],
            ac_stats:      [[0; AC_STAT_BINS]; NUM_ARITH_TABLES],
            fixed_bin:     FIXED_BIN
        }
    }
}

impl Arithmetic {
    /// Reset the coder at a restart marker or scan start: statistics
    /// areas are zeroed and the registers re-initialize from the next
    /// stream bytes. Conditioning values persist, they belong to DAC.
    pub fn restart(&mut self) {
        self.regs = Registers::init();
        self.last_dc_value = [0; MAX_COMPS_IN_SCAN];
        self.dc_context = [0; MAX_COMPS_IN_SCAN];
        self.dc_stats = [[0; DC_STAT_BINS]; NUM_ARITH_TABLES];
        self.ac_stats = [[0; AC_STAT_BINS]; NUM_ARITH_TABLES];
        self.fixed_bin = FIXED_BIN;
    }
}

/// Decode a DC difference, figures F.19 and F.21..F.24, updating the
/// component's predictor and conditioning context.
fn decode_dc_diff(
    stream: &mut crate::bitstream::BitStream, regs: &mut Registers, stats: &mut [u8; DC_STAT_BINS],
    l: u8, u: u8, context: &mut usize, last_dc: &mut i32
) {
    let base = *context;

    if regs.decode(stream, &mut stats[base]) == 0 {
        *context = 0;
        return;
    }

    // non-zero difference: sign, then magnitude category
    let sign = regs.decode(stream, &mut stats[base + 1]) as usize;

    let mut m = regs.decode(stream, &mut stats[base + 2 + sign]);

    let mut st = 20; // Table F.4: X1

    if m != 0 {
        while regs.decode(stream, &mut stats[st]) != 0 {
            m <<= 1;

            if m == 0x8000 {
                warn!("Arithmetic DC magnitude overflow, corrupt stream");
                m = 0;
                break;
            }
            st += 1;
        }
    }

    // establish the conditioning category for the next difference
    if m < (1 << l) >> 1 {
        *context = 0;
    } else if m > (1 << u) >> 1 {
        *context = 12 + sign * 4;
    } else {
        *context = 4 + sign * 4;
    }

    // magnitude bits, figure F.24
    let mut v = m;

    st += 14;

    m >>= 1;
    while m != 0 {
        if regs.decode(stream, &mut stats[st]) != 0 {
            v |= m;
        }
        m >>= 1;
    }

    v += 1;

    *last_dc += if sign != 0 { -v } else { v };
}

/// Decode the AC coefficients `start..=end` of one block, figures F.20
/// and F.21..F.24. `shift` is the successive approximation low bit.
fn decode_ac_coefficients(
    stream: &mut crate::bitstream::BitStream, regs: &mut Registers, fixed_bin: &mut u8,
    stats: &mut [u8; AC_STAT_BINS], kx: u8, start: usize, end: usize, shift: u8, output: &mut [i16]
) {
    let mut k = start;

    while k <= end {
        // EOB decision at the current spectral position
        let mut st = 3 * (k - 1);

        if regs.decode(stream, &mut stats[st]) != 0 {
            break;
        }

        while regs.decode(stream, &mut stats[st + 1]) == 0 {
            st += 3;
            k += 1;

            if k > 63 {
                warn!("Arithmetic AC spectral overflow, corrupt stream");
                return;
            }
        }

        let sign = regs.decode(stream, fixed_bin);

        st += 2;

        let mut m = regs.decode(stream, &mut stats[st]);

        if m != 0 && regs.decode(stream, &mut stats[st]) != 0 {
            m <<= 1;

            // Table F.5: Xlo at 189, Xhi at 217 split by K
            let mut xst = if k <= usize::from(kx) { 189 } else { 217 };

            while regs.decode(stream, &mut stats[xst]) != 0 {
                m <<= 1;

                if m == 0x8000 {
                    warn!("Arithmetic AC magnitude overflow, corrupt stream");
                    m = 0;
                    break;
                }
                xst += 1;
            }

            st = xst;
        }

        let mut v = m;

        st += 14;

        m >>= 1;
        while m != 0 {
            if regs.decode(stream, &mut stats[st]) != 0 {
                v |= m;
            }
            m >>= 1;
        }

        v += 1;

        if sign != 0 {
            v = -v;
        }

        output[UN_ZIGZAG[k.min(63)] & 63] = (v << shift) as i16;

        k += 1;
    }
}

/// Sequential MCU decode, the arithmetic counterpart of
/// `huff_decode_mcu`.
pub(crate) fn arith_decode_mcu(
    state: &mut DecodeState<'_>, _tables: &DecodeTables<'_>, output: &mut [i16]
) -> Result<(), DecodeErrors> {
    for i in 0..state.blocks {
        let block = state.block[i];

        let out = &mut output[block.offset..block.offset + 64];

        out.fill(0);

        let arith = &mut state.arithmetic;

        decode_dc_diff(
            &mut state.stream,
            &mut arith.regs,
            &mut arith.dc_stats[block.dc],
            arith.dc_l[block.dc],
            arith.dc_u[block.dc],
            &mut arith.dc_context[block.pred],
            &mut arith.last_dc_value[block.pred]
        );

        out[0] = arith.last_dc_value[block.pred] as i16;

        decode_ac_coefficients(
            &mut state.stream,
            &mut arith.regs,
            &mut arith.fixed_bin,
            &mut arith.ac_stats[block.ac],
            arith.ac_k[block.ac],
            1,
            63,
            0,
            out
        );
    }

    Ok(())
}

/// Lossless scans: one DC-style difference per component.
pub(crate) fn arith_decode_mcu_lossless(
    state: &mut DecodeState<'_>, _tables: &DecodeTables<'_>, output: &mut [i16]
) -> Result<(), DecodeErrors> {
    for i in 0..state.comps_in_scan {
        let block = state.block[i];
        let arith = &mut state.arithmetic;

        decode_dc_diff(
            &mut state.stream,
            &mut arith.regs,
            &mut arith.dc_stats[block.dc],
            arith.dc_l[block.dc],
            arith.dc_u[block.dc],
            &mut arith.dc_context[block.pred],
            &mut arith.last_dc_value[block.pred]
        );

        output[i] = arith.last_dc_value[block.pred] as i16;
    }

    Ok(())
}

/// First DC scan of a progressive frame.
pub(crate) fn arith_decode_dc_first(
    state: &mut DecodeState<'_>, _tables: &DecodeTables<'_>, output: &mut [i16]
) -> Result<(), DecodeErrors> {
    let shift = state.successive_low;

    for i in 0..state.blocks {
        let block = state.block[i];
        let arith = &mut state.arithmetic;

        decode_dc_diff(
            &mut state.stream,
            &mut arith.regs,
            &mut arith.dc_stats[block.dc],
            arith.dc_l[block.dc],
            arith.dc_u[block.dc],
            &mut arith.dc_context[block.pred],
            &mut arith.last_dc_value[block.pred]
        );

        output[block.offset] = (arith.last_dc_value[block.pred] << shift) as i16;
    }

    Ok(())
}

/// DC refinement scan: the next two's-complement bit of each DC value,
/// coded with fixed probability.
pub(crate) fn arith_decode_dc_refine(
    state: &mut DecodeState<'_>, _tables: &DecodeTables<'_>, output: &mut [i16]
) -> Result<(), DecodeErrors> {
    let bit = 1_i16 << state.successive_low;

    for i in 0..state.blocks {
        let offset = state.block[i].offset;
        let arith = &mut state.arithmetic;

        if arith
            .regs
            .decode(&mut state.stream, &mut arith.fixed_bin)
            != 0
        {
            output[offset] |= bit;
        }
    }

    Ok(())
}

/// First AC scan over the spectral band of a single block.
pub(crate) fn arith_decode_ac_first(
    state: &mut DecodeState<'_>, _tables: &DecodeTables<'_>, output: &mut [i16]
) -> Result<(), DecodeErrors> {
    let block = state.block[0];
    let arith = &mut state.arithmetic;

    decode_ac_coefficients(
        &mut state.stream,
        &mut arith.regs,
        &mut arith.fixed_bin,
        &mut arith.ac_stats[block.ac],
        arith.ac_k[block.ac],
        usize::from(state.spectral_start),
        usize::from(state.spectral_end),
        state.successive_low,
        output
    );

    Ok(())
}

/// AC refinement scan, G.1.3.3.
pub(crate) fn arith_decode_ac_refine(
    state: &mut DecodeState<'_>, _tables: &DecodeTables<'_>, output: &mut [i16]
) -> Result<(), DecodeErrors> {
    let block = state.block[0];
    let arith = &mut state.arithmetic;

    let p1 = 1_i16 << state.successive_low;
    let m1 = -p1;

    let start = usize::from(state.spectral_start);
    let end = usize::from(state.spectral_end);

    let stats = &mut arith.ac_stats[block.ac];

    // establish the position of the last previously non-zero
    // coefficient, EOB decisions only appear beyond it
    let mut kex = end;

    while kex > 0 {
        if output[UN_ZIGZAG[kex] & 63] != 0 {
            break;
        }
        kex -= 1;
    }

    let mut k = start;

    while k <= end {
        let mut st = 3 * (k - 1);

        if k > kex && arith.regs.decode(&mut state.stream, &mut stats[st]) != 0 {
            break;
        }

        loop {
            let coef = &mut output[UN_ZIGZAG[k] & 63];

            if *coef != 0 {
                if arith.regs.decode(&mut state.stream, &mut stats[st + 2]) != 0
                    && (*coef & p1) == 0
                {
                    if *coef >= 0 {
                        *coef += p1;
                    } else {
                        *coef += m1;
                    }
                }
                break;
            }

            if arith.regs.decode(&mut state.stream, &mut stats[st + 1]) != 0 {
                let negative = arith
                    .regs
                    .decode(&mut state.stream, &mut arith.fixed_bin)
                    != 0;

                *coef = if negative { m1 } else { p1 };
                break;
            }

            st += 3;
            k += 1;

            if k > end {
                warn!("Arithmetic AC refinement overflow, corrupt stream");
                return Ok(());
            }
        }

        k += 1;
    }

    Ok(())
}
