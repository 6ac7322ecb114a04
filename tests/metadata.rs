//! Marker-level behavior: metadata retention, tolerated deviations and
//! rejection of broken or unsupported streams.

mod common;

use common::{put_dc, put_eob, BitWriter, JpegBuilder};
use presto_jpeg::errors::DecodeErrors;
use presto_jpeg::{DecoderOptions, JpegDecoder, PixelFormat};

/// APP segment payload helper.
fn app_payload(magic: &[u8], rest: &[u8]) -> Vec<u8> {
    let mut payload = magic.to_vec();
    payload.extend_from_slice(rest);
    payload
}

#[test]
fn icc_profile_reassembles_across_segments() {
    let mut builder = JpegBuilder::new();

    builder
        .segment(0xe2, &app_payload(b"ICC_PROFILE\0", &[1, 2, b'H', b'e', b'l', b'l', b'o']))
        .segment(0xe2, &app_payload(b"ICC_PROFILE\0", &[2, 2, b'W', b'o', b'r', b'l', b'd']))
        .dqt(0, &[1; 64])
        .sof(0, 8, 8, 8, &[(1, 0x11, 0)]);

    let data = builder.build();
    let decoder = JpegDecoder::new(&data).unwrap();

    assert_eq!(decoder.icc_profile(), Some(&b"HelloWorld"[..]));
}

#[test]
fn exif_range_is_retained() {
    let mut builder = JpegBuilder::new();

    builder
        .segment(0xe1, &app_payload(b"Exif\0\0", b"raw tiff here"))
        .dqt(0, &[1; 64])
        .sof(0, 8, 8, 8, &[(1, 0x11, 0)]);

    let data = builder.build();
    let decoder = JpegDecoder::new(&data).unwrap();

    assert_eq!(decoder.exif(), Some(&b"raw tiff here"[..]));
}

#[test]
fn jfif_density_is_parsed() {
    let mut builder = JpegBuilder::new();

    // version 1.2, dpi, 300x150, no thumbnail
    let payload = app_payload(b"JFIF\0", &[1, 2, 1, 0x01, 0x2c, 0x00, 0x96, 0, 0]);

    builder
        .segment(0xe0, &payload)
        .dqt(0, &[1; 64])
        .sof(0, 8, 8, 8, &[(1, 0x11, 0)]);

    let data = builder.build();
    let decoder = JpegDecoder::new(&data).unwrap();
    let info = decoder.info();

    assert_eq!(info.pixel_density, 1);
    assert_eq!(info.x_density, 300);
    assert_eq!(info.y_density, 150);
    assert!(decoder.jfif().is_some());
}

#[test]
fn missing_eoi_is_accepted() {
    let full = common::gray_baseline(1, 1, &[1016]);
    // drop the EOI marker entirely
    let data = &full[..full.len() - 2];

    let options = DecoderOptions::new()
        .set_out_format(PixelFormat::L8)
        .set_num_threads(1);

    let pixels = JpegDecoder::new_with_options(data, options)
        .unwrap()
        .decode()
        .unwrap();

    assert_eq!(pixels.data(), &[255]);
}

#[test]
fn double_ff_marker_padding_is_tolerated() {
    let mut builder = JpegBuilder::new();

    // an extra fill byte before the DQT marker, as some ancient
    // encoders write
    builder.raw(&[0xff]);
    builder.dqt(0, &[1; 64]);
    builder.raw(&[0xff]);
    builder.sof(0, 8, 8, 8, &[(1, 0x11, 0)]);

    let data = builder.build();
    let decoder = JpegDecoder::new(&data).unwrap();

    assert_eq!(decoder.width(), 8);
}

#[test]
fn bad_magic_bytes_are_rejected() {
    let err = JpegDecoder::new(&[0x89, 0x50, 0x4e, 0x47, 0, 0, 0, 0]).unwrap_err();

    assert!(matches!(err, DecodeErrors::IllegalMagicBytes(0x8950)));
}

#[test]
fn scan_with_uninstalled_table_is_fatal() {
    // a valid frame whose scan references Huffman tables that no DHT
    // ever installed
    let mut builder = JpegBuilder::new();

    builder
        .dqt(0, &[1; 64])
        .sof(0, 8, 8, 8, &[(1, 0x11, 0)])
        .sos(&[(1, 0x00)], 0, 63, 0);
    builder.raw(&[0x0f]);
    builder.eoi();

    let data = builder.build();
    let err = JpegDecoder::new(&data).unwrap().decode().unwrap_err();

    assert!(matches!(err, DecodeErrors::HuffmanDecode(_)));
}

#[test]
fn strict_mode_rejects_stray_header_bytes() {
    let mut builder = JpegBuilder::new();

    builder.dqt(0, &[1; 64]);
    builder.raw(&[0x42]); // garbage between segments
    builder.sof(0, 8, 8, 8, &[(1, 0x11, 0)]);

    let data = builder.build();

    // lenient mode resyncs
    assert!(JpegDecoder::new(&data).is_ok());

    // strict mode refuses
    let strict = DecoderOptions::new().set_strict_mode(true);
    assert!(JpegDecoder::new_with_options(&data, strict).is_err());
}

#[test]
fn sixteen_bit_quantization_tables() {
    let mut builder = JpegBuilder::new();

    // 16 bit DQT with every entry 1
    let mut payload = vec![0x10];
    for _ in 0..64 {
        payload.extend_from_slice(&[0, 1]);
    }
    builder.segment(0xdb, &payload);

    builder
        .sof(0, 8, 1, 1, &[(1, 0x11, 0)])
        .test_dc_table(0)
        .test_ac_table(0);

    let mut writer = BitWriter::new();
    put_dc(&mut writer, 1016);
    put_eob(&mut writer);

    builder.sos(&[(1, 0x00)], 0, 63, 0);
    builder.raw(&writer.finish());
    builder.eoi();

    let options = DecoderOptions::new()
        .set_out_format(PixelFormat::L8)
        .set_num_threads(1);

    let data = builder.build();
    let pixels = JpegDecoder::new_with_options(&data, options)
        .unwrap()
        .decode()
        .unwrap();

    assert_eq!(pixels.data(), &[255]);
}

#[test]
fn hierarchical_progression_is_refused() {
    let mut builder = JpegBuilder::new();

    builder
        .segment(0xde, &[8, 0, 8, 0, 8, 1, 1, 0x11, 0]) // DHP
        .dqt(0, &[1; 64])
        .sof(0, 8, 8, 8, &[(1, 0x11, 0)]);

    let data = builder.build();
    let err = JpegDecoder::new(&data).unwrap().decode().unwrap_err();

    assert!(matches!(err, DecodeErrors::Unsupported(_)));
}

/// Build a flat four component image; `diffs` are the DC differences
/// of the C/Y, M/Cb, Y/Cr and K channels.
fn four_component_image(adobe_transform: Option<u8>, diffs: [i32; 4]) -> Vec<u8> {
    let mut builder = JpegBuilder::new();

    if let Some(transform) = adobe_transform {
        let mut payload = b"Adobe".to_vec();
        payload.extend_from_slice(&[0, 100, 0, 0, 0, 0, transform]);
        builder.segment(0xee, &payload);
    }

    builder.dqt(0, &[1; 64]).sof(
        0,
        8,
        8,
        8,
        &[(1, 0x11, 0), (2, 0x11, 0), (3, 0x11, 0), (4, 0x11, 0)]
    );
    builder.test_dc_table(0).test_ac_table(0);

    let mut writer = BitWriter::new();

    for &diff in &diffs {
        put_dc(&mut writer, diff);
        put_eob(&mut writer);
    }

    builder.sos(&[(1, 0x00), (2, 0x00), (3, 0x00), (4, 0x00)], 0, 63, 0);
    builder.raw(&writer.finish());
    builder.eoi();

    builder.build()
}

#[test]
fn cmyk_without_adobe_marker() {
    // inverted-CMYK convention: full C/M/Y with full K multiplies out
    // to white
    let data = four_component_image(None, [1016, 1016, 1016, 1016]);

    let options = DecoderOptions::new().set_num_threads(1);
    let pixels = JpegDecoder::new_with_options(&data, options)
        .unwrap()
        .decode()
        .unwrap();

    assert_eq!(pixels.format(), PixelFormat::BGRA8);
    assert!(pixels.data().chunks_exact(4).all(|p| p == [255, 255, 255, 255]));
}

#[test]
fn adobe_ycck_transform_changes_interpretation() {
    // Y=255, neutral chroma, K=255: through the YCCK inversion this is
    // solid black, where plain CMYK would have been white
    let data = four_component_image(Some(2), [1016, 0, 0, 1016]);

    let options = DecoderOptions::new().set_num_threads(1);
    let pixels = JpegDecoder::new_with_options(&data, options)
        .unwrap()
        .decode()
        .unwrap();

    assert!(pixels.data().chunks_exact(4).all(|p| p == [0, 0, 0, 255]));
}

#[cfg(feature = "arith")]
#[test]
fn arithmetic_frames_decode_without_panicking() {
    // an arithmetic coded frame whose entropy data is all zero bytes;
    // not a meaningful image but it must decode to *something* rather
    // than error or panic
    let mut builder = JpegBuilder::new();

    builder
        .dqt(0, &[1; 64])
        .sof(9, 8, 8, 8, &[(1, 0x11, 0)])
        .sos(&[(1, 0x00)], 0, 63, 0);
    builder.raw(&[0x00; 16]);
    builder.eoi();

    let options = DecoderOptions::new()
        .set_out_format(PixelFormat::L8)
        .set_num_threads(1);

    let data = builder.build();
    let pixels = JpegDecoder::new_with_options(&data, options)
        .unwrap()
        .decode()
        .unwrap();

    assert_eq!(pixels.data().len(), 64);
}
