//! Decode JPEG segment payloads.
//!
//! Each handler is entered after its marker has been consumed and is
//! responsible for reading exactly its own segment, length field
//! included.

use crate::decoder::JpegDecoder;
use crate::errors::DecodeErrors;
use crate::huffman::HuffmanTable;
use crate::misc::{AdobeColorSpace, Aligned32, UN_ZIGZAG};

/// **B.2.4.2 Huffman table-specification syntax**
pub(crate) fn parse_huffman(decoder: &mut JpegDecoder) -> Result<(), DecodeErrors> {
    let dht_length = decoder.get_u16()?.checked_sub(2).ok_or_else(|| {
        DecodeErrors::HuffmanDecode("Invalid DHT length, corrupt jpeg".to_string())
    })?;

    let mut length_read: u16 = 0;

    // A single DHT marker may contain multiple Huffman tables.
    while length_read < dht_length {
        let ht_info = decoder.get_u8()?;

        // bit 4 indicates whether the table is DC or AC type
        let is_ac = (ht_info >> 4) & 1 == 1;
        let index = usize::from(ht_info & 0x0f);

        if (ht_info >> 5) != 0 || index > 3 {
            return Err(DecodeErrors::HuffmanDecode(format!(
                "Invalid DHT destination {index}, expected value between 0 and 3"
            )));
        }

        // number of codes per bit length, then the symbols in
        // increasing code length order
        let mut num_symbols = [0_u8; 17];

        decoder.read_into(&mut num_symbols[1..17])?;

        let symbols_sum: u16 = num_symbols.iter().map(|f| u16::from(*f)).sum();

        if symbols_sum > 256 {
            return Err(DecodeErrors::HuffmanDecode(
                "Encountered Huffman table with excessive length in DHT".to_string()
            ));
        }

        let mut symbols = [0_u8; 256];

        decoder.read_into(&mut symbols[..usize::from(symbols_sum)])?;

        length_read += 17 + symbols_sum;

        let table = HuffmanTable::new(&num_symbols, &symbols[..usize::from(symbols_sum)])?;

        if is_ac {
            decoder.ac_huffman_tables[index] = Some(table);
        } else {
            decoder.dc_huffman_tables[index] = Some(table);
        }
    }

    Ok(())
}

/// **B.2.4.1 Quantization table-specification syntax**
pub(crate) fn parse_dqt(decoder: &mut JpegDecoder) -> Result<(), DecodeErrors> {
    let qt_length = decoder
        .get_u16()?
        .checked_sub(2)
        .ok_or_else(|| DecodeErrors::DqtError("Invalid DQT length, corrupt jpeg".to_string()))?;

    let mut length_read: u16 = 0;

    // A single DQT segment may have multiple tables
    while length_read < qt_length {
        let qt_info = decoder.get_u8()?;

        // 0 => 8 bit, 1 => 16 bit entries
        let precision = qt_info >> 4;
        let table_position = usize::from(qt_info & 0x0f);

        if precision > 1 {
            return Err(DecodeErrors::DqtError(format!(
                "Expected QT precision of either 0 or 1, found {precision}"
            )));
        }

        if table_position > 3 {
            return Err(DecodeErrors::DqtError(format!(
                "Invalid QT destination {table_position}, expected value between 0 and 3"
            )));
        }

        // values are stored in zig-zag order, expand into the natural
        // order the iDCT consumes
        let mut table = [0_u16; 64];

        if precision == 0 {
            for i in 0..64 {
                table[UN_ZIGZAG[i]] = u16::from(decoder.get_u8()?);
            }
        } else {
            for i in 0..64 {
                table[UN_ZIGZAG[i]] = decoder.get_u16()?;
            }
        }

        trace!("Quantization table {table_position}, {} bit", 8 * (precision + 1));

        decoder.qt_tables[table_position] = Some(Aligned32(table));

        length_read += 1 + 64 * (u16::from(precision) + 1);
    }

    Ok(())
}

/// **B.2.4.3 Arithmetic conditioning table-specification syntax**
pub(crate) fn parse_dac(decoder: &mut JpegDecoder) -> Result<(), DecodeErrors> {
    let length = decoder
        .get_u16()?
        .checked_sub(2)
        .ok_or_else(|| DecodeErrors::DacError("Invalid DAC length, corrupt jpeg".to_string()))?;

    for _ in 0..length / 2 {
        let tc_tb = decoder.get_u8()?;
        let class = tc_tb >> 4;
        let index = usize::from(tc_tb & 0x0f);
        let value = decoder.get_u8()?;

        match class {
            0 => {
                // DC conditioning: L in the low nibble, U in the high
                let l = value & 0x0f;
                let u = value >> 4;

                if l > u {
                    return Err(DecodeErrors::DacError(format!(
                        "DC conditioning L {l} larger than U {u}"
                    )));
                }

                decoder.arith_dc_l[index] = l;
                decoder.arith_dc_u[index] = u;
            }
            1 => {
                if value == 0 || value > 63 {
                    return Err(DecodeErrors::DacError(format!(
                        "AC conditioning value {value} out of range 1..63"
                    )));
                }
                decoder.arith_ac_k[index] = value;
            }
            _ => {
                return Err(DecodeErrors::DacError(format!(
                    "Invalid arithmetic table class {class}"
                )));
            }
        }
    }

    Ok(())
}

/// **B.2.4.4 Restart interval definition syntax**
pub(crate) fn parse_dri(decoder: &mut JpegDecoder) -> Result<(), DecodeErrors> {
    if decoder.get_u16()? != 4 {
        return Err(DecodeErrors::Format(
            "Bad DRI length, corrupt jpeg".to_string()
        ));
    }

    decoder.restart_interval = usize::from(decoder.get_u16()?);
    decoder.todo = decoder.restart_interval;

    trace!("Restart interval: {}", decoder.restart_interval);

    Ok(())
}

/// **B.2.5 Define number of lines syntax**
///
/// A DNL segment after the first scan may redefine the image height.
/// We only ever tighten the frame, growing it after allocations have
/// been made is not worth supporting.
pub(crate) fn parse_dnl(decoder: &mut JpegDecoder) -> Result<(), DecodeErrors> {
    let length = decoder.get_u16()?;
    let lines = usize::from(decoder.get_u16()?);

    if length != 4 {
        return Err(DecodeErrors::Format(
            "Bad DNL length, corrupt jpeg".to_string()
        ));
    }

    if lines != 0 && lines < decoder.ysize {
        info!("DNL tightens image height from {} to {lines}", decoder.ysize);
        decoder.set_ysize(lines);
    }

    Ok(())
}

/// APP segments: JFIF/JFXX density and thumbnail header, Exif and ICC
/// byte ranges, the Adobe color transform. Everything else is skipped.
pub(crate) fn parse_app(decoder: &mut JpegDecoder, marker: u8) -> Result<(), DecodeErrors> {
    let length = usize::from(decoder.get_u16()?);

    if length < 2 {
        return Err(DecodeErrors::Format(format!(
            "Found APP{marker} segment with invalid length {length}"
        )));
    }

    let payload_start = decoder.position();
    let size = length - 2;

    match marker {
        0 => {
            if size >= 14 && (decoder.starts_with(b"JFIF\0") || decoder.starts_with(b"JFXX\0")) {
                decoder.skip(5)?;

                let _version = decoder.get_u16()?;
                let units = decoder.get_u8()?;
                let x_density = decoder.get_u16()?;
                let y_density = decoder.get_u16()?;
                let x_thumbnail = decoder.get_u8()?;
                let y_thumbnail = decoder.get_u8()?;

                decoder.info.pixel_density = units;
                decoder.info.x_density = x_density;
                decoder.info.y_density = y_density;

                trace!("JFIF density {x_density}x{y_density}, thumbnail {x_thumbnail}x{y_thumbnail}");

                // the payload is retained for the caller, the thumbnail
                // itself is never rendered
                decoder.jfif = Some((payload_start, size));
            }
        }
        1 => {
            if size >= 6
                && (decoder.starts_with(b"Exif\0\0") || decoder.starts_with(b"Exif\0\xff"))
            {
                decoder.skip(6)?;
                decoder.exif = Some((decoder.position(), size - 6));

                trace!("Exif block of {} bytes", size - 6);
            }
        }
        2 => {
            if size >= 14 && decoder.starts_with(b"ICC_PROFILE\0") {
                decoder.skip(12)?;

                // chunk sequence header; profiles larger than a marker
                // segment are split and concatenated in stream order
                let seq_no = decoder.get_u8()?;
                let seq_total = decoder.get_u8()?;

                trace!("ICC segment {seq_no}/{seq_total}, {} bytes", size - 14);

                let start = decoder.position();

                decoder.append_icc(start, size - 14)?;
            }
        }
        3 => {
            // some writers put Exif data into APP3 with a META magic
            if size >= 6 && (decoder.starts_with(b"META\0\0") || decoder.starts_with(b"Meta\0\0"))
            {
                decoder.skip(6)?;
                decoder.exif = Some((decoder.position(), size - 6));
            }
        }
        14 => {
            if size == 12 && decoder.starts_with(b"Adobe") {
                decoder.skip(5)?;

                let _version = decoder.get_u16()?;
                let _flags0 = decoder.get_u16()?;
                let _flags1 = decoder.get_u16()?;
                let transform = decoder.get_u8()?;

                if let Some(colorspace) = AdobeColorSpace::from_transform(transform) {
                    info!("Adobe color transform: {colorspace:?}");
                    decoder.colorspace = colorspace;
                } else {
                    warn!("Unknown Adobe color transform {transform}, ignored");
                }
            }
        }
        _ => {}
    }

    // consume whatever part of the payload the cases above left
    let consumed = decoder.position() - payload_start;

    decoder.skip(length - 2 - consumed)?;

    Ok(())
}
