//! Frame component descriptors, extracted from a SOF header.

use crate::errors::DecodeErrors;

/// One component of a frame.
///
/// After SOF processing the raw sampling factors are kept alongside
/// their normalized form: `hshift`/`vshift` are the base-2 logarithms
/// of the subsampling ratio against the frame maxima, so mapping an
/// image pixel to this component's sample grid is a shift right.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Frame {
    /// Component identifier as written in the stream
    pub component_id: u8,
    /// Horizontal sampling factor, 1..4
    pub horizontal_sample: usize,
    /// Vertical sampling factor, 1..4
    pub vertical_sample: usize,
    /// Quantization table destination selector
    pub quantization_table: usize,
    /// Block offset of this component inside an MCU
    pub offset: usize,
    /// log2 of the horizontal subsampling ratio (`Hmax / Hsf`)
    pub hshift: usize,
    /// log2 of the vertical subsampling ratio (`Vmax / Vsf`)
    pub vshift: usize
}

impl Frame {
    /// A placeholder for unused slots in fixed size frame arrays.
    pub const fn none() -> Frame {
        Frame {
            component_id:       0,
            horizontal_sample:  1,
            vertical_sample:    1,
            quantization_table: 0,
            offset:             0,
            hshift:             0,
            vshift:             0
        }
    }

    /// Create a component from its three SOF bytes.
    pub fn from_sof(bytes: [u8; 3], offset: usize) -> Result<Frame, DecodeErrors> {
        let horizontal_sample = usize::from(bytes[1] >> 4);
        let vertical_sample = usize::from(bytes[1] & 0x0f);
        let quantization_table = usize::from(bytes[2]);

        if horizontal_sample == 0 || horizontal_sample > 8 {
            return Err(DecodeErrors::SofError(format!(
                "Invalid horizontal sampling factor {horizontal_sample}, expected value between 1 and 8"
            )));
        }

        if vertical_sample == 0 || vertical_sample > 8 {
            return Err(DecodeErrors::SofError(format!(
                "Invalid vertical sampling factor {vertical_sample}, expected value between 1 and 8"
            )));
        }

        if quantization_table > 3 {
            return Err(DecodeErrors::SofError(format!(
                "Quantization table selector {quantization_table} out of range, expected value between 0 and 3"
            )));
        }

        Ok(Frame {
            component_id: bytes[0],
            horizontal_sample,
            vertical_sample,
            quantization_table,
            offset,
            // filled once the frame maxima are known
            hshift: 0,
            vshift: 0
        })
    }

    /// Compute the subsampling shifts once `h_max`/`v_max` are known.
    ///
    /// Non power-of-two ratios are rejected, a pixel-to-sample mapping
    /// by shifting cannot express them.
    pub fn normalize(&mut self, h_max: usize, v_max: usize) -> Result<(), DecodeErrors> {
        let h_ratio = h_max / self.horizontal_sample;
        let v_ratio = v_max / self.vertical_sample;

        if !h_ratio.is_power_of_two()
            || !v_ratio.is_power_of_two()
            || h_ratio * self.horizontal_sample != h_max
            || v_ratio * self.vertical_sample != v_max
        {
            return Err(DecodeErrors::SofError(format!(
                "Cannot handle sampling ratio {}x{} against maxima {}x{}",
                self.horizontal_sample, self.vertical_sample, h_max, v_max
            )));
        }

        self.hshift = h_ratio.trailing_zeros() as usize;
        self.vshift = v_ratio.trailing_zeros() as usize;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Frame;

    #[test]
    fn sof_bytes_parse() {
        let frame = Frame::from_sof([1, 0x22, 0], 0).unwrap();

        assert_eq!(frame.horizontal_sample, 2);
        assert_eq!(frame.vertical_sample, 2);
        assert_eq!(frame.quantization_table, 0);
    }

    #[test]
    fn zero_sampling_factor_is_rejected() {
        assert!(Frame::from_sof([1, 0x02, 0], 0).is_err());
        assert!(Frame::from_sof([1, 0x20, 0], 0).is_err());
    }

    #[test]
    fn normalization_computes_shifts() {
        let mut chroma = Frame::from_sof([2, 0x11, 1], 4).unwrap();

        chroma.normalize(2, 2).unwrap();

        assert_eq!(chroma.hshift, 1);
        assert_eq!(chroma.vshift, 1);
    }
}
