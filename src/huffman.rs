//! Huffman table construction.
//!
//! A DHT segment gives us the number of codes of each length (1..16)
//! and the symbols in canonical order. From that we derive the
//! acceleration data the bitstream decoder needs:
//!
//! - an 8 bit lookahead table which resolves every code of up to 8 bits
//!   (which in practice is nearly all of them) in a single probe,
//! - `maxcode`/`value_offset` pairs for walking codes of 9..16 bits.
//!
//! Tables are rebuilt whenever a DHT marker reinstalls a destination.

use crate::errors::DecodeErrors;

/// Number of bits resolved by the lookahead table
pub(crate) const HUFF_LOOKAHEAD: u8 = 8;

/// A single Huffman table
#[derive(Debug)]
pub(crate) struct HuffmanTable {
    /// Decoded symbols in canonical code order
    pub(crate) value:        [u8; 256],
    /// Largest code of each bit length, -1 when a length has no codes
    /// so comparisons against it never match
    pub(crate) maxcode:      [i32; 18],
    /// `value[code + value_offset[length]]` is the symbol of `code`
    pub(crate) value_offset: [i32; 18],
    /// Code length for each 8-bit prefix, 0 when the code is longer
    /// than [`HUFF_LOOKAHEAD`] bits
    pub(crate) lookup_size:  [u8; 1 << HUFF_LOOKAHEAD],
    /// Symbol for each 8-bit prefix whose `lookup_size` is non-zero
    pub(crate) lookup_value: [u8; 1 << HUFF_LOOKAHEAD]
}

impl HuffmanTable {
    /// Build a table from DHT data.
    ///
    /// `counts[1..=16]` holds the number of codes per bit length,
    /// `values` the symbols in canonical order.
    pub fn new(counts: &[u8; 17], values: &[u8]) -> Result<HuffmanTable, DecodeErrors> {
        let mut table = HuffmanTable {
            value:        [0; 256],
            maxcode:      [-1; 18],
            value_offset: [0; 18],
            lookup_size:  [0; 1 << HUFF_LOOKAHEAD],
            lookup_value: [0; 1 << HUFF_LOOKAHEAD]
        };

        table.value[..values.len()].copy_from_slice(values);

        // Generate canonical codes per C.2, filling acceleration data
        // as we go.
        let mut code: u32 = 0;
        let mut k: usize = 0;

        for length in 1..=16_usize {
            table.value_offset[length] = k as i32 - code as i32;

            for _ in 0..counts[length] {
                if k >= values.len() {
                    return Err(DecodeErrors::HuffmanDecode(
                        "DHT code counts exceed the number of symbols".to_string()
                    ));
                }

                if length <= usize::from(HUFF_LOOKAHEAD) {
                    // every bit pattern starting with this code resolves
                    // to it in one probe
                    let first = (code << (usize::from(HUFF_LOOKAHEAD) - length)) as usize;
                    let fan_out = 1 << (usize::from(HUFF_LOOKAHEAD) - length);

                    for slot in first..first + fan_out {
                        table.lookup_size[slot] = length as u8;
                        table.lookup_value[slot] = values[k];
                    }
                }

                code += 1;
                k += 1;
            }

            if counts[length] > 0 {
                table.maxcode[length] = code as i32 - 1;
            }

            if code > (1 << length) {
                return Err(DecodeErrors::HuffmanDecode(
                    "Bad DHT segment, code lengths overflow the code space".to_string()
                ));
            }

            code <<= 1;
        }

        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::{HuffmanTable, HUFF_LOOKAHEAD};

    /// Resolve a code the slow way, one bit length at a time.
    fn slow_decode(table: &HuffmanTable, bits: u16) -> Option<(u8, u8)> {
        for length in 1..=16_usize {
            let code = i32::from(bits >> (16 - length));

            if table.maxcode[length] >= code {
                let index = (code + table.value_offset[length]) & 0xff;
                return Some((length as u8, table.value[index as usize]));
            }
        }
        None
    }

    /// The standard luminance DC table from T.81 annex K.3.
    fn annex_k_dc_table() -> HuffmanTable {
        let mut counts = [0_u8; 17];
        counts[1..=16].copy_from_slice(&[0, 1, 5, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0]);

        let values: Vec<u8> = (0..12).collect();

        HuffmanTable::new(&counts, &values).unwrap()
    }

    #[test]
    fn lookahead_agrees_with_slow_path() {
        let table = annex_k_dc_table();

        for prefix in 0..1_u32 << HUFF_LOOKAHEAD {
            let bits = (prefix << 8) as u16;
            let size = table.lookup_size[prefix as usize];

            let slow = slow_decode(&table, bits);

            if size != 0 {
                // lookahead resolves exactly the codes of length <= 8
                // and must match the slow walk
                let (slow_len, slow_value) = slow.unwrap();
                assert_eq!(size, slow_len);
                assert_eq!(table.lookup_value[prefix as usize], slow_value);
                assert!(size <= HUFF_LOOKAHEAD);
            } else {
                // either a longer code or an invalid prefix
                if let Some((slow_len, _)) = slow {
                    assert!(slow_len > HUFF_LOOKAHEAD);
                }
            }
        }
    }

    #[test]
    fn overfull_table_is_rejected() {
        let mut counts = [0_u8; 17];
        counts[1] = 3; // only two codes of length 1 exist

        assert!(HuffmanTable::new(&counts, &[0, 1, 2]).is_err());
    }
}
