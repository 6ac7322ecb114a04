//! Main decoder logic: marker dispatch, frame setup and the decode
//! entry points.

use scoped_threadpool::Pool;

use crate::color_convert::{choose_process_fns, ProcessState};
use crate::components::Frame;
use crate::errors::{DecodeErrors, UnsupportedSchemes};
use crate::headers::{parse_app, parse_dac, parse_dnl, parse_dqt, parse_dri, parse_huffman};
use crate::huffman::HuffmanTable;
use crate::idct::choose_idct_func;
use crate::marker::Marker;
use crate::misc::{
    seek_marker, AdobeColorSpace, Aligned32, SOFMarkers, MAX_BLOCKS_IN_MCU, MAX_COMPS_IN_SCAN
};
use crate::options::DecoderOptions;
use crate::surface::{Bitmap, PixelFormat, SampleFormat, Surface};

/// Maximum image dimensions supported.
pub(crate) const MAX_DIMENSIONS: usize = 1 << 27;

/// A struct representing image information
#[derive(Debug, Default, Clone, Eq, PartialEq)]
#[allow(clippy::module_name_repetitions)]
pub struct ImageInfo {
    /// Width of the image
    pub width:         u16,
    /// Height of image
    pub height:        u16,
    /// Sample precision in bits, 8 or 12 (2..16 for lossless frames)
    pub precision:     u8,
    /// Start of frame marker
    pub sof:           SOFMarkers,
    /// JFIF density unit
    pub pixel_density: u8,
    /// Horizontal pixel density
    pub x_density:     u16,
    /// Vertical pixel density
    pub y_density:     u16,
    /// Number of components
    pub components:    u8
}

/// Static geometry of the MCU grid, bundled for the scan drivers and
/// the post processing workers.
#[derive(Copy, Clone)]
pub(crate) struct McuGrid {
    pub xmcu:     usize,
    pub ymcu:     usize,
    /// MCU pixel width, `8 * h_max`
    pub xblock:   usize,
    /// MCU pixel height, `8 * v_max`
    pub yblock:   usize,
    /// Pixel width of the last MCU column, 0 when none is clipped
    pub xclip:    usize,
    /// Pixel height of the last MCU row, 0 when none is clipped
    pub yclip:    usize,
    /// Coefficients per MCU, `blocks_in_mcu * 64`
    pub mcu_data: usize,
    /// Bytes per output pixel
    pub bpp:      usize
}

/// A JPEG decoder instance over a borrowed byte buffer.
#[allow(clippy::upper_case_acronyms)]
pub struct JpegDecoder<'a> {
    pub(crate) data: &'a [u8],
    position:        usize,

    pub(crate) info: ImageInfo,

    /// Quantization tables in natural order, installed by DQT
    pub(crate) qt_tables:         [Option<Aligned32<[u16; 64]>>; MAX_COMPS_IN_SCAN],
    /// DC Huffman tables, installed by DHT
    pub(crate) dc_huffman_tables: [Option<HuffmanTable>; MAX_COMPS_IN_SCAN],
    /// AC Huffman tables, installed by DHT
    pub(crate) ac_huffman_tables: [Option<HuffmanTable>; MAX_COMPS_IN_SCAN],

    /// Frame components from SOF
    pub(crate) components: Vec<Frame>,
    /// Component of the current progressive AC scan
    pub(crate) scan_frame: usize,

    // geometry, padding rules per T.81 A.1.1
    pub(crate) h_max:         usize,
    pub(crate) v_max:         usize,
    pub(crate) blocks_in_mcu: usize,
    /// Logical image width
    pub(crate) xsize:         usize,
    /// Logical image height
    pub(crate) ysize:         usize,
    /// Width padded to an MCU boundary
    pub(crate) width:         usize,
    /// Height padded to an MCU boundary
    pub(crate) height:        usize,
    pub(crate) xblock:        usize,
    pub(crate) yblock:        usize,
    pub(crate) xmcu:          usize,
    pub(crate) ymcu:          usize,
    pub(crate) mcus:          usize,
    pub(crate) xclip:         usize,
    pub(crate) yclip:         usize,
    pub(crate) precision:     u8,

    pub(crate) is_progressive: bool,
    pub(crate) is_multiscan:   bool,
    pub(crate) is_lossless:    bool,
    pub(crate) is_arithmetic:  bool,
    sof_seen:                  bool,
    seen_dhp:                  bool,

    pub(crate) restart_interval: usize,
    pub(crate) todo:             usize,

    /// Retained Exif byte range
    pub(crate) exif:        Option<(usize, usize)>,
    /// Retained JFIF APP0 payload range
    pub(crate) jfif:        Option<(usize, usize)>,
    /// ICC profile, concatenated over its APP2 segments
    pub(crate) icc:         Vec<u8>,
    pub(crate) colorspace:  AdobeColorSpace,

    /// Arithmetic conditioning installed by DAC
    #[cfg_attr(not(feature = "arith"), allow(dead_code))]
    pub(crate) arith_dc_l: [u8; 16],
    #[cfg_attr(not(feature = "arith"), allow(dead_code))]
    pub(crate) arith_dc_u: [u8; 16],
    #[cfg_attr(not(feature = "arith"), allow(dead_code))]
    pub(crate) arith_ac_k: [u8; 16],

    /// Byte offset where the post-SOF stream begins
    scan_start: usize,

    pub(crate) options: DecoderOptions,
    pub(crate) pool:    Option<Pool>
}

impl<'a> core::fmt::Debug for JpegDecoder<'a> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("JpegDecoder")
            .field("position", &self.position)
            .field("info", &self.info)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<'a> JpegDecoder<'a> {
    /// Create a decoder over `data` and parse the headers.
    ///
    /// Only the marker stream up to the frame header is read; entropy
    /// coded data is untouched until [`decode_into`](Self::decode_into).
    ///
    /// # Errors
    /// If the buffer is not a JPEG stream or its headers are malformed.
    pub fn new(data: &'a [u8]) -> Result<JpegDecoder<'a>, DecodeErrors> {
        JpegDecoder::new_with_options(data, DecoderOptions::default())
    }

    /// Create a decoder with explicit options.
    ///
    /// # Errors
    /// See [`new`](Self::new)
    pub fn new_with_options(
        data: &'a [u8], options: DecoderOptions
    ) -> Result<JpegDecoder<'a>, DecodeErrors> {
        let mut decoder = JpegDecoder::bare(data, options, None);

        decoder.decode_headers()?;

        Ok(decoder)
    }

    /// Create a decoder that schedules post processing onto `pool`
    /// instead of a pool of its own.
    ///
    /// # Errors
    /// See [`new`](Self::new)
    pub fn new_with_pool(
        data: &'a [u8], options: DecoderOptions, pool: Pool
    ) -> Result<JpegDecoder<'a>, DecodeErrors> {
        let mut decoder = JpegDecoder::bare(data, options, Some(pool));

        decoder.decode_headers()?;

        Ok(decoder)
    }

    fn bare(data: &'a [u8], options: DecoderOptions, pool: Option<Pool>) -> JpegDecoder<'a> {
        JpegDecoder {
            data,
            position: 0,
            info: ImageInfo::default(),
            qt_tables: [None, None, None, None],
            dc_huffman_tables: [None, None, None, None],
            ac_huffman_tables: [None, None, None, None],
            components: vec![],
            scan_frame: 0,
            h_max: 1,
            v_max: 1,
            blocks_in_mcu: 0,
            xsize: 0,
            ysize: 0,
            width: 0,
            height: 0,
            xblock: 0,
            yblock: 0,
            xmcu: 0,
            ymcu: 0,
            mcus: 0,
            xclip: 0,
            yclip: 0,
            precision: 0,
            is_progressive: false,
            is_multiscan: false,
            is_lossless: false,
            is_arithmetic: false,
            sof_seen: false,
            seen_dhp: false,
            restart_interval: 0,
            todo: usize::MAX,
            exif: None,
            jfif: None,
            icc: vec![],
            colorspace: AdobeColorSpace::Cmyk,
            arith_dc_l: [0; 16],
            arith_dc_u: [1; 16],
            arith_ac_k: [5; 16],
            scan_start: 0,
            options,
            pool
        }
    }

    // ------------------------------------------------------------------
    // byte cursor over the marker stream
    // ------------------------------------------------------------------

    #[inline]
    pub(crate) fn get_u8(&mut self) -> Result<u8, DecodeErrors> {
        let byte = *self
            .data
            .get(self.position)
            .ok_or(DecodeErrors::ExhaustedData)?;

        self.position += 1;

        Ok(byte)
    }

    #[inline]
    pub(crate) fn get_u16(&mut self) -> Result<u16, DecodeErrors> {
        let bytes = self
            .data
            .get(self.position..self.position + 2)
            .ok_or(DecodeErrors::ExhaustedData)?;

        self.position += 2;

        Ok(u16::from_be_bytes(bytes.try_into().unwrap()))
    }

    pub(crate) fn read_into(&mut self, buf: &mut [u8]) -> Result<(), DecodeErrors> {
        let bytes = self
            .data
            .get(self.position..self.position + buf.len())
            .ok_or(DecodeErrors::ExhaustedData)?;

        buf.copy_from_slice(bytes);
        self.position += buf.len();

        Ok(())
    }

    pub(crate) fn skip(&mut self, count: usize) -> Result<(), DecodeErrors> {
        if self.position + count > self.data.len() {
            self.position = self.data.len();
            return Err(DecodeErrors::ExhaustedData);
        }

        self.position += count;

        Ok(())
    }

    pub(crate) fn starts_with(&self, magic: &[u8]) -> bool {
        self.data[self.position.min(self.data.len())..].starts_with(magic)
    }

    pub(crate) fn position(&self) -> usize {
        self.position
    }

    pub(crate) fn set_position(&mut self, position: usize) {
        self.position = position;
    }

    pub(crate) fn append_icc(&mut self, start: usize, len: usize) -> Result<(), DecodeErrors> {
        let bytes = self
            .data
            .get(start..start + len)
            .ok_or(DecodeErrors::ExhaustedData)?;

        self.icc.extend_from_slice(bytes);

        Ok(())
    }

    // ------------------------------------------------------------------
    // marker stream
    // ------------------------------------------------------------------

    /// Read the next marker, stepping over fill bytes and resyncing
    /// across garbage.
    ///
    /// Returns `None` once the stream ends; a missing EOI is common
    /// enough in the wild that it cannot be an error.
    pub(crate) fn next_marker(&mut self) -> Result<Option<Marker>, DecodeErrors> {
        loop {
            if self.position + 2 > self.data.len() {
                return Ok(None);
            }

            let high = self.get_u8()?;

            if high != 0xff {
                // after SOF unconsumed entropy padding precedes markers
                // all the time, only headers are held to the standard
                if self.options.get_strict_mode() && !self.sof_seen {
                    return Err(DecodeErrors::FormatStatic(
                        "[strict-mode]: Extra bytes between segments"
                    ));
                }

                warn!("Extra byte {high:#x} before marker, resyncing");

                match seek_marker(self.data, self.position - 1) {
                    Some(pos) => {
                        self.position = pos;
                        continue;
                    }
                    None => return Ok(None)
                }
            }

            let id = self.get_u8()?;

            if id == 0xff {
                // ancient encoders occasionally emit FF FF ID, step one
                // byte and try again
                self.position -= 1;
                continue;
            }

            match Marker::from_u8(id) {
                Some(marker) => return Ok(Some(marker)),
                // FF 00 is a stuffed byte, not a marker
                None => continue
            }
        }
    }

    /// Skip a segment whose payload we do not interpret.
    fn skip_segment(&mut self, marker: Marker) -> Result<(), DecodeErrors> {
        let length = self.get_u16()?;

        if length < 2 {
            return Err(DecodeErrors::Format(format!(
                "Found {marker:?} segment with invalid length {length}"
            )));
        }

        self.skip(usize::from(length) - 2)?;

        Ok(())
    }

    /// Handle every marker that may appear both before the frame header
    /// and between scans.
    pub(crate) fn parse_marker_inner(&mut self, marker: Marker) -> Result<(), DecodeErrors> {
        match marker {
            Marker::DHT => parse_huffman(self)?,
            Marker::DQT => parse_dqt(self)?,
            Marker::DAC => parse_dac(self)?,
            Marker::DRI => parse_dri(self)?,
            Marker::DNL => parse_dnl(self)?,
            Marker::APP(n) => parse_app(self, n)?,
            Marker::COM | Marker::JPG(_) | Marker::EXP => self.skip_segment(marker)?,
            Marker::DHP => {
                // hierarchical progression is parsed but never applied
                warn!("DHP segment found, hierarchical progression is not supported");
                self.seen_dhp = true;
                self.skip_segment(marker)?;
            }
            Marker::TEM | Marker::RES | Marker::RST(_) | Marker::SOI => {}
            _ => {
                warn!("Capabilities for processing marker {marker:?} not implemented");
                self.skip_segment(marker)?;
            }
        }

        Ok(())
    }

    /// Parse the marker stream up to and including the frame header.
    fn decode_headers(&mut self) -> Result<(), DecodeErrors> {
        let magic_bytes = self.get_u16()?;

        if magic_bytes != 0xffd8 {
            return Err(DecodeErrors::IllegalMagicBytes(magic_bytes));
        }

        while let Some(marker) = self.next_marker()? {
            match marker {
                Marker::SOF(n) => {
                    self.parse_sof(n)?;
                    // everything from here is tables, scans and entropy
                    // coded data, left for decode time
                    self.scan_start = self.position;
                    return Ok(());
                }
                Marker::EOI => {
                    return Err(DecodeErrors::FormatStatic(
                        "Premature end of image, no frame header found"
                    ));
                }
                Marker::SOS => {
                    return Err(DecodeErrors::SosError(
                        "SOS marker before any frame header, corrupt jpeg".to_string()
                    ));
                }
                _ => self.parse_marker_inner(marker)?
            }
        }

        Err(DecodeErrors::FormatStatic(
            "Reached end of stream without finding a frame header"
        ))
    }

    /// **B.2.2 Frame header syntax**
    fn parse_sof(&mut self, n: u8) -> Result<(), DecodeErrors> {
        let sof = SOFMarkers(n);

        info!("Image encoding scheme = `{sof:?}`");

        if self.sof_seen {
            return Err(DecodeErrors::SofError(
                "Multiple frame headers in one image".to_string()
            ));
        }

        if sof.is_differential() {
            return Err(DecodeErrors::Unsupported(UnsupportedSchemes::Hierarchical));
        }

        if sof.is_arithmetic() && cfg!(not(feature = "arith")) {
            return Err(DecodeErrors::Unsupported(UnsupportedSchemes::Arithmetic));
        }

        let length = self.get_u16()?;
        let precision = self.get_u8()?;

        let ysize = usize::from(self.get_u16()?);
        let xsize = usize::from(self.get_u16()?);
        let num_components = self.get_u8()?;

        if sof.is_lossless() {
            if !(2..=16).contains(&precision) {
                return Err(DecodeErrors::SofError(format!(
                    "Unknown precision {precision} for a lossless frame"
                )));
            }
        } else if precision != 8 && precision != 12 {
            return Err(DecodeErrors::SofError(format!(
                "Unknown sample precision {precision}, expected 8 or 12"
            )));
        }

        if xsize == 0 || ysize == 0 {
            return Err(DecodeErrors::ZeroError);
        }

        if xsize > self.options.get_max_width()
            || ysize > self.options.get_max_height()
            || xsize * ysize > MAX_DIMENSIONS
        {
            return Err(DecodeErrors::LargeDimensions(xsize * ysize));
        }

        if !(1..=4).contains(&num_components) {
            return Err(DecodeErrors::SofError(format!(
                "Incorrect number of components {num_components}, expected value between 1 and 4"
            )));
        }

        if length != 8 + 3 * u16::from(num_components) {
            return Err(DecodeErrors::SofError(format!(
                "Length of start of frame differs from expected {}, value is {length}",
                8 + 3 * u16::from(num_components)
            )));
        }

        let mut components = Vec::with_capacity(usize::from(num_components));
        let mut offset = 0;

        for _ in 0..num_components {
            let mut bytes = [0_u8; 3];

            self.read_into(&mut bytes)?;

            if num_components == 1 {
                // force the block size to 8x8 with grayscale images,
                // some encoders write nonsense sampling factors there
                bytes[1] = 0x11;
            }

            let frame = Frame::from_sof(bytes, offset)?;

            trace!(
                "Component id: {}, sampling factors {}x{}, QT {}",
                frame.component_id,
                frame.horizontal_sample,
                frame.vertical_sample,
                frame.quantization_table
            );

            offset += frame.horizontal_sample * frame.vertical_sample;

            components.push(frame);
        }

        if offset > MAX_BLOCKS_IN_MCU {
            return Err(DecodeErrors::SofError(format!(
                "Too many blocks in MCU, {offset} exceeds the limit of {MAX_BLOCKS_IN_MCU}"
            )));
        }

        let h_max = components.iter().map(|c| c.horizontal_sample).max().unwrap();
        let v_max = components.iter().map(|c| c.vertical_sample).max().unwrap();

        for component in &mut components {
            component.normalize(h_max, v_max)?;
        }

        self.h_max = h_max;
        self.v_max = v_max;
        self.blocks_in_mcu = offset;

        self.xblock = 8 * h_max;
        self.yblock = 8 * v_max;

        self.xsize = xsize;
        self.ysize = ysize;

        // align to the next MCU boundary; block sizes are not
        // necessarily powers of two (3x1 sampling exists)
        self.width = ((xsize + self.xblock - 1) / self.xblock) * self.xblock;
        self.height = ((ysize + self.yblock - 1) / self.yblock) * self.yblock;

        self.xmcu = self.width / self.xblock;
        self.ymcu = self.height / self.yblock;
        self.mcus = self.xmcu * self.ymcu;

        self.xclip = xsize % self.xblock;
        self.yclip = ysize % self.yblock;

        trace!(
            "{} MCUs ({} x {}), MCU size {} x {}, clip {} x {}",
            self.mcus,
            self.xmcu,
            self.ymcu,
            self.xblock,
            self.yblock,
            self.xclip,
            self.yclip
        );

        self.precision = precision;
        self.is_progressive = sof.is_progressive();
        self.is_lossless = sof.is_lossless();
        self.is_arithmetic = sof.is_arithmetic();
        self.sof_seen = true;

        self.info.width = xsize as u16;
        self.info.height = ysize as u16;
        self.info.precision = precision;
        self.info.components = num_components;
        self.info.sof = sof;

        self.components = components;

        Ok(())
    }

    /// Re-derive the vertical geometry after a DNL segment.
    pub(crate) fn set_ysize(&mut self, ysize: usize) {
        self.ysize = ysize;
        self.height = ((ysize + self.yblock - 1) / self.yblock) * self.yblock;
        self.ymcu = self.height / self.yblock;
        self.mcus = self.xmcu * self.ymcu;
        self.yclip = ysize % self.yblock;
        self.info.height = ysize as u16;
    }

    // ------------------------------------------------------------------
    // public surface
    // ------------------------------------------------------------------

    /// Get the width of the image
    #[must_use]
    pub fn width(&self) -> u16 {
        self.info.width
    }

    /// Get the height of the image
    #[must_use]
    pub fn height(&self) -> u16 {
        self.info.height
    }

    /// Returns the image information parsed from the headers
    #[must_use]
    pub fn info(&self) -> ImageInfo {
        self.info.clone()
    }

    /// The natural output format discovered from the headers: `L8` for
    /// single component images, `BGRA8` for everything else.
    #[must_use]
    pub fn output_format(&self) -> PixelFormat {
        if self.components.len() == 1 {
            PixelFormat::L8
        } else {
            PixelFormat::BGRA8
        }
    }

    /// The raw Exif block, if one was present
    #[must_use]
    pub fn exif(&self) -> Option<&[u8]> {
        self.exif
            .and_then(|(start, len)| self.data.get(start..start + len))
    }

    /// The raw JFIF APP0 payload, if one was present
    #[must_use]
    pub fn jfif(&self) -> Option<&[u8]> {
        self.jfif
            .and_then(|(start, len)| self.data.get(start..start + len))
    }

    /// The ICC profile, reassembled from its APP2 segments
    #[must_use]
    pub fn icc_profile(&self) -> Option<&[u8]> {
        if self.icc.is_empty() {
            return None;
        }
        Some(&self.icc)
    }

    /// Human readable encoding summary, e.g.
    /// `"Progressive DCT, Huffman coding"`
    #[must_use]
    pub fn encoding_info(&self) -> String {
        format!("{:?}", self.info.sof)
    }

    /// Decode the image into `target`.
    ///
    /// When the target's dimensions or pixel format differ from the
    /// natural ones, the image is decoded into an internal surface of
    /// the natural format and blitted into the target.
    ///
    /// # Errors
    /// On malformed headers or unsupported coding processes. Errors in
    /// the entropy coded data itself are soft: the decoder prefers
    /// producing a partial image over failing.
    pub fn decode_into(&mut self, target: &mut Surface) -> Result<(), DecodeErrors> {
        if !self.sof_seen {
            return Err(DecodeErrors::FormatStatic("No frame header was parsed"));
        }

        if self.seen_dhp {
            return Err(DecodeErrors::Unsupported(UnsupportedSchemes::Hierarchical));
        }

        // spin the pool up lazily so header-only users never pay for it
        if self.pool.is_none() && self.options.get_num_threads() > 1 {
            self.pool = Some(Pool::new(self.options.get_num_threads() as u32));
        }

        let mut sample = SampleFormat::from_format(target.format());

        if self.is_lossless {
            // lossless only supports L8 and BGRA
            sample = if self.components.len() == 1 {
                SampleFormat::Y
            } else {
                SampleFormat::Bgra
            };
        } else if self.components.len() == 4 {
            // CMYK / YCCK is in the slow path anyway so force BGRA
            sample = SampleFormat::Bgra;
        }

        let natural = sample.format();
        let process_state = self.build_process_state(sample)?;

        let direct = target.width() == self.xsize
            && target.height() == self.ysize
            && target.format() == natural;

        if direct {
            self.decode_scans(target, &process_state)?;
        } else {
            // decode at MCU padded size in the natural format, then
            // blit: a lossless intermediate copy
            let mut temp = Bitmap::new(self.width, self.height, natural);

            {
                let mut surface = temp.surface_mut();
                self.decode_scans(&mut surface, &process_state)?;
            }

            target.blit(0, 0, &temp.surface_mut());
        }

        Ok(())
    }

    /// Decode the image into a freshly allocated bitmap in the format
    /// chosen by [`DecoderOptions::set_out_format`].
    ///
    /// # Errors
    /// See [`decode_into`](Self::decode_into)
    pub fn decode(&mut self) -> Result<Bitmap, DecodeErrors> {
        let format = self.options.get_out_format();

        let mut bitmap = Bitmap::new(self.xsize, self.ysize, format);

        {
            let mut surface = bitmap.surface_mut();
            self.decode_into(&mut surface)?;
        }

        Ok(bitmap)
    }

    /// Build the capability record for this decode: quantization
    /// tables, frame layout and the function pointers for iDCT and
    /// pixel production.
    fn build_process_state(&self, sample: SampleFormat) -> Result<ProcessState, DecodeErrors> {
        let mut qt = [Aligned32([0_u16; 64]); MAX_COMPS_IN_SCAN];
        let mut block_qt = [0_usize; MAX_BLOCKS_IN_MCU];
        let mut frame = [Frame::none(); MAX_COMPS_IN_SCAN];

        for (i, component) in self.components.iter().enumerate() {
            frame[i] = *component;

            // lossless frames carry no quantization tables at all
            if !self.is_lossless {
                let table = self.qt_tables[component.quantization_table]
                    .as_ref()
                    .ok_or_else(|| {
                        DecodeErrors::DqtError(format!(
                            "No quantization table for component {}",
                            component.component_id
                        ))
                    })?;

                qt[component.quantization_table] = *table;
            }

            for block in 0..component.horizontal_sample * component.vertical_sample {
                block_qt[component.offset + block] = component.quantization_table;
            }
        }

        let (process, clipped) = choose_process_fns(
            &frame,
            self.components.len(),
            self.blocks_in_mcu,
            sample,
            self.h_max,
            self.v_max
        );

        Ok(ProcessState {
            qt,
            block_qt,
            blocks: self.blocks_in_mcu,
            frame,
            frames: self.components.len(),
            colorspace: self.colorspace,
            idct: choose_idct_func(self.precision),
            process,
            clipped
        })
    }

    /// Offset of the first post-SOF byte, where decoding starts.
    pub(crate) fn scan_start(&self) -> usize {
        self.scan_start
    }

    /// Bundle the grid geometry for the drivers.
    pub(crate) fn grid(&self, bpp: usize) -> McuGrid {
        McuGrid {
            xmcu: self.xmcu,
            ymcu: self.ymcu,
            xblock: self.xblock,
            yblock: self.yblock,
            xclip: self.xclip,
            yclip: self.yclip,
            mcu_data: self.blocks_in_mcu * 64,
            bpp
        }
    }
}
