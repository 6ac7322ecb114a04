//! Baseline sequential decoding against hand-assembled streams.

mod common;

use common::{put_dc, put_eob, BitWriter, JpegBuilder};
use presto_jpeg::{Bitmap, DecoderOptions, JpegDecoder, PixelFormat, Surface};

fn decode_with_threads(data: &[u8], format: PixelFormat, threads: usize) -> Bitmap {
    let options = DecoderOptions::new()
        .set_out_format(format)
        .set_num_threads(threads);

    JpegDecoder::new_with_options(data, options)
        .unwrap()
        .decode()
        .unwrap()
}

#[test]
fn single_white_pixel_to_bgra() {
    // 1x1 white pixel: flat block at Y=255, so the dequantized DC is
    // 8 * (255 - 128) = 1016
    let data = common::gray_baseline(1, 1, &[1016]);

    let mut decoder = JpegDecoder::new(&data).unwrap();

    assert_eq!(decoder.width(), 1);
    assert_eq!(decoder.height(), 1);
    assert_eq!(decoder.output_format(), PixelFormat::L8);

    let mut pixels = [0_u8; 4];
    let mut surface = Surface::new(&mut pixels, 1, 1, 4, PixelFormat::BGRA8);

    decoder.decode_into(&mut surface).unwrap();

    assert_eq!(pixels, [255, 255, 255, 255]);
}

#[test]
fn solid_gray_with_chroma_subsampling() {
    // 16x16 solid mid-gray, 2x2 chroma subsampling. Every block is
    // flat at the level shift, so every DC difference is zero.
    let mut builder = JpegBuilder::new();

    builder
        .dqt(0, &[1; 64])
        .dqt(1, &[1; 64])
        .sof(0, 8, 16, 16, &[(1, 0x22, 0), (2, 0x11, 1), (3, 0x11, 1)])
        .test_dc_table(0)
        .test_ac_table(0);

    // one MCU: four luma blocks, one Cb, one Cr
    let mut writer = BitWriter::new();

    for _ in 0..6 {
        put_dc(&mut writer, 0);
        put_eob(&mut writer);
    }

    builder.sos(&[(1, 0x00), (2, 0x00), (3, 0x00)], 0, 63, 0);
    builder.raw(&writer.finish());
    builder.eoi();

    let data = builder.build();
    let pixels = decode_with_threads(&data, PixelFormat::RGB8, 1);

    assert_eq!(pixels.data().len(), 16 * 16 * 3);

    for channel in pixels.data() {
        assert!(
            (127..=129).contains(channel),
            "expected mid-gray, found {channel}"
        );
    }
}

#[test]
fn restart_markers_match_plain_encoding() {
    // 64x8 grayscale: eight MCUs in one row, MCU i a flat block at
    // 128 + 8i, i.e. dequantized DC 64 * i.
    let dc_values: Vec<i32> = (0..8).map(|i| 64 * i).collect();

    // plain: DC differences chain across the whole scan
    let diffs: Vec<i32> = dc_values
        .iter()
        .scan(0, |pred, &dc| {
            let diff = dc - *pred;
            *pred = dc;
            Some(diff)
        })
        .collect();

    let plain = common::gray_baseline(64, 8, &diffs);

    // restart interval 1: every MCU is its own interval, predictors
    // reset so each difference is the absolute DC value
    let mut builder = JpegBuilder::new();

    builder
        .dqt(0, &[1; 64])
        .sof(0, 8, 64, 8, &[(1, 0x11, 0)])
        .test_dc_table(0)
        .test_ac_table(0)
        .dri(1)
        .sos(&[(1, 0x00)], 0, 63, 0);

    for (i, &dc) in dc_values.iter().enumerate() {
        let mut writer = BitWriter::new();

        put_dc(&mut writer, dc);
        put_eob(&mut writer);

        builder.raw(&writer.finish());

        if i != dc_values.len() - 1 {
            builder.marker(0xd0 + (i as u8 % 8));
        }
    }

    builder.eoi();
    let with_restarts = builder.build();

    let reference = decode_with_threads(&plain, PixelFormat::L8, 1);

    // expected content while we are at it
    for (i, mcu) in (0..8).zip(reference.data().chunks_exact(8)) {
        assert!(mcu.iter().all(|p| i32::from(*p) == 128 + 8 * i));
    }

    // serial restart handling
    let serial = decode_with_threads(&with_restarts, PixelFormat::L8, 1);
    assert_eq!(serial.data(), reference.data());

    // parallel restart-interval scheduling must be confluent with it
    let parallel = decode_with_threads(&with_restarts, PixelFormat::L8, 4);
    assert_eq!(parallel.data(), reference.data());
}

#[test]
fn parallel_and_serial_band_decoding_agree() {
    // 16x64: two MCU columns, eight MCU rows, a gradient of flat MCUs
    let diffs: Vec<i32> = (0..16)
        .scan(0, |pred, i| {
            let dc = 48 * (i % 5) - 64;
            let diff = dc - *pred;
            *pred = dc;
            Some(diff)
        })
        .collect();

    let data = common::gray_baseline(16, 64, &diffs);

    let serial = decode_with_threads(&data, PixelFormat::L8, 1);
    let parallel = decode_with_threads(&data, PixelFormat::L8, 4);

    assert_eq!(serial.data().len(), 16 * 64);
    assert_eq!(serial.data(), parallel.data());
}

#[test]
fn clipped_edges_produce_exact_dimensions() {
    // 11x13 image: both edges clip inside the last MCU
    let diffs = [256, 0, 0, 0];

    let data = common::gray_baseline(11, 13, &diffs);
    let pixels = decode_with_threads(&data, PixelFormat::L8, 1);

    assert_eq!(pixels.data().len(), 11 * 13);
    // the whole image is covered by the decoded MCUs
    assert!(pixels.data().iter().all(|p| *p == 160));
}

#[test]
fn truncated_stream_zero_fills_the_tail() {
    // cut the entropy coded segment to almost nothing: the decoder
    // must still return an image, with everything past the point of
    // truncation zero filled in the target format
    let diffs: Vec<i32> = (0..6).map(|_| 0).collect();
    let full = common::gray_baseline(16, 24, &diffs);

    // the stream ends with six bytes of entropy coded data and the EOI
    // marker; keep only the first two ECS bytes
    let truncated = &full[..full.len() - 6];

    let mut decoder = JpegDecoder::new(truncated).unwrap();
    let pixels = decoder.decode().unwrap();

    assert_eq!(pixels.data().len(), 16 * 24 * 4);

    // MCU rows 1 and 2 never decoded: zero filled, not gray
    let row_bytes = 16 * 4;
    assert!(pixels.data()[8 * row_bytes..].iter().all(|p| *p == 0));
}

#[test]
fn truncation_after_first_row_keeps_it_intact() {
    // 16x24, three MCU rows of flat blocks: row 0 at 160, rows below
    // darker. The truncated variant carries only row 0's bits.
    let head = |builder: &mut JpegBuilder| {
        builder
            .dqt(0, &[1; 64])
            .sof(0, 8, 16, 24, &[(1, 0x11, 0)])
            .test_dc_table(0)
            .test_ac_table(0)
            .sos(&[(1, 0x00)], 0, 63, 0);
    };

    let row0 = [256, 0];
    let below = [-512, 0, 0, 0];

    let mut full = JpegBuilder::new();
    head(&mut full);
    let mut writer = BitWriter::new();
    for &diff in row0.iter().chain(below.iter()) {
        put_dc(&mut writer, diff);
        put_eob(&mut writer);
    }
    full.raw(&writer.finish());
    full.eoi();

    let mut truncated = JpegBuilder::new();
    head(&mut truncated);
    let mut writer = BitWriter::new();
    for &diff in &row0 {
        put_dc(&mut writer, diff);
        put_eob(&mut writer);
    }
    // the stream simply stops after row 0, no restart, no EOI
    truncated.raw(&writer.finish());

    let reference = decode_with_threads(&full.build(), PixelFormat::L8, 1);

    let data = truncated.build();
    let partial = decode_with_threads(&data, PixelFormat::L8, 1);

    // the first complete MCU row survives and matches the reference
    assert_eq!(&partial.data()[..16 * 8], &reference.data()[..16 * 8]);
    assert!(reference.data()[..16 * 8].iter().all(|p| *p == 160));

    // every row past the truncation point is zero filled
    assert!(partial.data()[16 * 8..].iter().all(|p| *p == 0));
}
