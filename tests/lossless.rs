//! Lossless (annex H) decoding.

mod common;

use common::{put_dc, BitWriter, JpegBuilder};
use presto_jpeg::{DecoderOptions, JpegDecoder, PixelFormat};

/// Emit one lossless difference: same coding as a DC difference but
/// with no end-of-block.
fn put_diff(w: &mut BitWriter, diff: i32) {
    put_dc(w, diff);
}

#[test]
fn predictor_one_reproduces_the_input() {
    // 4x2 single component image of {10, 20, 30, 40; 50, 60, 70, 80},
    // predictor 1 (left neighbour), point transform 0.
    //
    // The first sample is predicted from 1 << (8 - 1) = 128, the rest
    // of the first row from the left, the first sample of row two from
    // above, the rest again from the left.
    let samples: [[i32; 4]; 2] = [[10, 20, 30, 40], [50, 60, 70, 80]];

    let mut writer = BitWriter::new();

    put_diff(&mut writer, 10 - 128);
    put_diff(&mut writer, 10);
    put_diff(&mut writer, 10);
    put_diff(&mut writer, 10);

    put_diff(&mut writer, 50 - 10); // above
    put_diff(&mut writer, 10);
    put_diff(&mut writer, 10);
    put_diff(&mut writer, 10);

    let mut builder = JpegBuilder::new();

    builder
        .sof(3, 8, 4, 2, &[(1, 0x11, 0)])
        .test_dc_table(0)
        .sos(&[(1, 0x00)], 1, 0, 0x00);
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

    let expected: Vec<u8> = samples.iter().flatten().map(|s| *s as u8).collect();

    assert_eq!(pixels.data(), &expected[..]);
}

#[test]
fn point_transform_scales_the_output() {
    // point transform 1: the coded samples are halved, the decoder
    // shifts them back up on output
    let mut writer = BitWriter::new();

    // init predictor is 1 << (8 - 1 - 1) = 64
    put_diff(&mut writer, 5 - 64);
    put_diff(&mut writer, 1); // left is 5, sample 6

    let mut builder = JpegBuilder::new();

    builder
        .sof(3, 8, 2, 1, &[(1, 0x11, 0)])
        .test_dc_table(0)
        .sos(&[(1, 0x00)], 1, 0, 0x01);
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

    assert_eq!(pixels.data(), &[10, 12]);
}

#[test]
fn three_component_lossless_lands_in_bgra() {
    // 2x1 image, components decode to r=100, g=150, b=200 flat
    let mut writer = BitWriter::new();

    for x in 0..2 {
        for value in [100, 150, 200] {
            // predictor: 128 at the corner, the left sample afterwards
            put_diff(&mut writer, if x == 0 { value - 128 } else { 0 });
        }
    }

    let mut builder = JpegBuilder::new();

    builder
        .sof(3, 8, 2, 1, &[(1, 0x11, 0), (2, 0x11, 0), (3, 0x11, 0)])
        .test_dc_table(0)
        .sos(&[(1, 0x00), (2, 0x00), (3, 0x00)], 1, 0, 0x00);
    builder.raw(&writer.finish());
    builder.eoi();

    let data = builder.build();
    let mut decoder = JpegDecoder::new(&data).unwrap();
    let pixels = decoder.decode().unwrap();

    // lossless forces BGRA output for color images
    assert_eq!(pixels.format(), PixelFormat::BGRA8);
    assert_eq!(pixels.data(), &[200, 150, 100, 255, 200, 150, 100, 255]);
}
