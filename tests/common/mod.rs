//! A tiny JPEG stream builder so the tests carry no binary fixtures.
//!
//! The tables it installs are deliberately trivial:
//!
//! - DC (class 0): twelve symbols, the categories 0..11, all coded with
//!   four bits, so category `c` is simply the code `c`.
//! - AC (class 1): three symbols of three bits each, `000` is EOB,
//!   `001` is (run 0, size 1) and `010` is (run 0, size 2).
//!
//! That is enough to express every scan the tests need while keeping
//! the hand-assembled bitstreams easy to verify on paper.
#![allow(dead_code)]

/// MSB-first bit assembler with JPEG byte stuffing.
pub struct BitWriter {
    out:   Vec<u8>,
    bits:  u32,
    nbits: u32
}

impl BitWriter {
    pub fn new() -> BitWriter {
        BitWriter {
            out:   vec![],
            bits:  0,
            nbits: 0
        }
    }

    pub fn put_bits(&mut self, value: u32, count: u32) {
        assert!(count <= 24);

        self.bits = (self.bits << count) | (value & ((1 << count) - 1));
        self.nbits += count;

        while self.nbits >= 8 {
            let byte = ((self.bits >> (self.nbits - 8)) & 0xff) as u8;

            self.out.push(byte);

            if byte == 0xff {
                // stuff a zero so the byte is not mistaken for a marker
                self.out.push(0x00);
            }

            self.nbits -= 8;
        }
    }

    /// Pad the last byte with one-bits and return the stuffed stream.
    pub fn finish(mut self) -> Vec<u8> {
        if self.nbits > 0 {
            let pad = 8 - self.nbits;
            self.put_bits((1 << pad) - 1, pad);
        }

        self.out
    }
}

/// Magnitude category of a DC difference or AC value.
pub fn category(value: i32) -> u32 {
    (32 - value.unsigned_abs().leading_zeros()) as u32
}

/// Append the extra bits of `value` for its category, the inverse of
/// the decoder's receive-extend.
pub fn put_extend(w: &mut BitWriter, value: i32) {
    let cat = category(value);

    if cat > 0 {
        let bits = if value < 0 { value + (1 << cat) - 1 } else { value };

        w.put_bits(bits as u32, cat);
    }
}

/// Emit one DC difference: category code plus the extra bits.
pub fn put_dc(w: &mut BitWriter, diff: i32) {
    w.put_bits(category(diff), 4);
    put_extend(w, diff);
}

/// Emit the end-of-block symbol of the test AC table.
pub fn put_eob(w: &mut BitWriter) {
    w.put_bits(0b000, 3);
}

/// Emit an AC (run 0, size s) coefficient of the test AC table;
/// only sizes 1 and 2 exist in it.
pub fn put_ac(w: &mut BitWriter, value: i32) {
    let cat = category(value);

    assert!(cat == 1 || cat == 2);

    w.put_bits(cat, 3);
    put_extend(w, value);
}

/// Segment level stream assembly.
pub struct JpegBuilder {
    bytes: Vec<u8>
}

impl JpegBuilder {
    pub fn new() -> JpegBuilder {
        JpegBuilder { bytes: vec![0xff, 0xd8] }
    }

    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    pub fn marker(&mut self, id: u8) -> &mut Self {
        self.bytes.extend_from_slice(&[0xff, id]);
        self
    }

    pub fn segment(&mut self, id: u8, payload: &[u8]) -> &mut Self {
        self.marker(id);
        self.bytes
            .extend_from_slice(&((payload.len() as u16 + 2).to_be_bytes()));
        self.bytes.extend_from_slice(payload);
        self
    }

    /// An 8 bit quantization table; `values` are in zig-zag order as
    /// they would appear on the wire.
    pub fn dqt(&mut self, dest: u8, values: &[u8; 64]) -> &mut Self {
        let mut payload = vec![dest];
        payload.extend_from_slice(values);
        self.segment(0xdb, &payload)
    }

    /// A frame header: `SOFn` with `(id, sampling, qt)` per component,
    /// sampling packed as `(h << 4) | v`.
    pub fn sof(
        &mut self, n: u8, precision: u8, width: u16, height: u16, comps: &[(u8, u8, u8)]
    ) -> &mut Self {
        let mut payload = vec![precision];
        payload.extend_from_slice(&height.to_be_bytes());
        payload.extend_from_slice(&width.to_be_bytes());
        payload.push(comps.len() as u8);

        for &(id, sampling, qt) in comps {
            payload.extend_from_slice(&[id, sampling, qt]);
        }

        self.segment(0xc0 + n, &payload)
    }

    pub fn dht(&mut self, class: u8, dest: u8, counts: &[u8; 16], symbols: &[u8]) -> &mut Self {
        let mut payload = vec![(class << 4) | dest];
        payload.extend_from_slice(counts);
        payload.extend_from_slice(symbols);
        self.segment(0xc4, &payload)
    }

    /// The test DC table: categories 0..11 as four-bit codes.
    pub fn test_dc_table(&mut self, dest: u8) -> &mut Self {
        let mut counts = [0_u8; 16];
        counts[3] = 12; // twelve codes of length 4

        let symbols: Vec<u8> = (0..12).collect();

        self.dht(0, dest, &counts, &symbols)
    }

    /// The test AC table: EOB, (0,1) and (0,2) as three-bit codes.
    pub fn test_ac_table(&mut self, dest: u8) -> &mut Self {
        let mut counts = [0_u8; 16];
        counts[2] = 3; // three codes of length 3

        self.dht(1, dest, &counts, &[0x00, 0x01, 0x02])
    }

    pub fn dri(&mut self, interval: u16) -> &mut Self {
        self.segment(0xdd, &interval.to_be_bytes())
    }

    /// A scan header with `(id, (dc << 4) | ac)` per component.
    pub fn sos(&mut self, comps: &[(u8, u8)], ss: u8, se: u8, ah_al: u8) -> &mut Self {
        let mut payload = vec![comps.len() as u8];

        for &(id, tables) in comps {
            payload.extend_from_slice(&[id, tables]);
        }

        payload.extend_from_slice(&[ss, se, ah_al]);
        self.segment(0xda, &payload)
    }

    pub fn eoi(&mut self) -> &mut Self {
        self.marker(0xd9)
    }

    pub fn build(&self) -> Vec<u8> {
        self.bytes.clone()
    }
}

/// A baseline grayscale image of `xmcu * ymcu` MCUs whose DC
/// differences are given per MCU in raster order, flat blocks only.
pub fn gray_baseline(width: u16, height: u16, dc_diffs: &[i32]) -> Vec<u8> {
    let mut builder = JpegBuilder::new();

    builder
        .dqt(0, &[1; 64])
        .sof(0, 8, width, height, &[(1, 0x11, 0)])
        .test_dc_table(0)
        .test_ac_table(0);

    let mut writer = BitWriter::new();

    for &diff in dc_diffs {
        put_dc(&mut writer, diff);
        put_eob(&mut writer);
    }

    builder.sos(&[(1, 0x00)], 0, 63, 0);
    builder.raw(&writer.finish());
    builder.eoi();

    builder.build()
}
