//! Markers that identify segments of a JPEG stream.

/// Markers defined in ITU-T T.81 section B.1.1.3.
///
/// A marker in the wire format is `0xFF` followed by the byte carried
/// here. `RST`, `SOI`, `EOI` and `TEM` are stand-alone; every other
/// marker introduces a segment starting with a big-endian 16-bit
/// length.
#[derive(Eq, PartialEq, Copy, Clone, Debug)]
pub enum Marker {
    /// Start of frame, SOF0..SOF15 minus the non-frame codes.
    ///
    /// The parameter is `n` in `SOFn` and encodes the coding process:
    /// baseline(0), extended(1), progressive(2), lossless(3), plus the
    /// differential (5..7) and arithmetic (9..15) variants.
    SOF(u8),
    /// Define Huffman table(s)
    DHT,
    /// Define arithmetic coding conditioning(s)
    DAC,
    /// Restart with modulo-8 counter `m`
    RST(u8),
    /// Start of image
    SOI,
    /// End of image
    EOI,
    /// Start of scan
    SOS,
    /// Define quantization table(s)
    DQT,
    /// Define number of lines
    DNL,
    /// Define restart interval
    DRI,
    /// Define hierarchical progression
    DHP,
    /// Expand reference component(s)
    EXP,
    /// Reserved for application segments, APP0..APP15
    APP(u8),
    /// Reserved for JPEG extensions, JPG and JPG0..JPG13
    JPG(u8),
    /// Comment
    COM,
    /// For temporary private use in arithmetic coding
    TEM,
    /// Reserved markers 0x02..0xbf
    RES
}

impl Marker {
    /// Decode the second byte of a `0xFF ID` pair into a marker.
    ///
    /// Returns `None` for `0x00` (stuffed byte) and `0xFF` (fill byte),
    /// neither of which is a marker.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Marker> {
        use self::Marker::{
            APP, COM, DAC, DHP, DHT, DNL, DQT, DRI, EOI, EXP, JPG, RES, RST, SOF, SOI, SOS, TEM
        };
        match value {
            0x01 => Some(TEM),
            0x02..=0xbf => Some(RES),
            0xc0..=0xc3 | 0xc5..=0xc7 | 0xc9..=0xcb | 0xcd..=0xcf => Some(SOF(value - 0xc0)),
            0xc4 => Some(DHT),
            0xc8 => Some(JPG(0xff)),
            0xcc => Some(DAC),
            0xd0..=0xd7 => Some(RST(value - 0xd0)),
            0xd8 => Some(SOI),
            0xd9 => Some(EOI),
            0xda => Some(SOS),
            0xdb => Some(DQT),
            0xdc => Some(DNL),
            0xdd => Some(DRI),
            0xde => Some(DHP),
            0xdf => Some(EXP),
            0xe0..=0xef => Some(APP(value - 0xe0)),
            0xf0..=0xfd => Some(JPG(value - 0xf0)),
            0xfe => Some(COM),
            _ => None
        }
    }

    /// Whether the marker is a stand-alone marker, i.e. carries no
    /// segment payload.
    #[must_use]
    pub fn is_standalone(self) -> bool {
        matches!(
            self,
            Marker::SOI | Marker::EOI | Marker::TEM | Marker::RST(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::Marker;

    #[test]
    fn marker_round_trip() {
        assert_eq!(Marker::from_u8(0xd8), Some(Marker::SOI));
        assert_eq!(Marker::from_u8(0xc2), Some(Marker::SOF(2)));
        assert_eq!(Marker::from_u8(0xcf), Some(Marker::SOF(15)));
        assert_eq!(Marker::from_u8(0xd4), Some(Marker::RST(4)));
        assert_eq!(Marker::from_u8(0xee), Some(Marker::APP(14)));
        assert_eq!(Marker::from_u8(0x00), None);
        assert_eq!(Marker::from_u8(0xff), None);
    }

    #[test]
    fn standalone_markers() {
        assert!(Marker::SOI.is_standalone());
        assert!(Marker::RST(3).is_standalone());
        assert!(!Marker::DHT.is_standalone());
        assert!(!Marker::SOS.is_standalone());
    }
}
