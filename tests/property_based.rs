use pixelsmith::engine::{
    calc_resize_dimensions, crop, decode, diff, encode, inspect_header, resize,
};
use pixelsmith::{CropSpec, FormatKind, RasterBuffer, ResizeSpec};
use proptest::prelude::*;

fn create_test_image(width: u32, height: u32) -> RasterBuffer {
    RasterBuffer::from_fn(width, height, |x, y| {
        [(x % 256) as u8, (y % 256) as u8, 128, 255]
    })
    .unwrap()
}

fn valid_crop_strategy() -> impl Strategy<Value = (u32, u32, u32, u32, u32, u32)> {
    (1u32..=64, 1u32..=64)
        .prop_flat_map(|(img_w, img_h)| {
            let crop_w = 1u32..=img_w;
            let crop_h = 1u32..=img_h;
            (Just(img_w), Just(img_h), crop_w, crop_h)
        })
        .prop_flat_map(|(img_w, img_h, crop_w, crop_h)| {
            let max_x = img_w - crop_w;
            let max_y = img_h - crop_h;
            (
                Just(img_w),
                Just(img_h),
                Just(crop_w),
                Just(crop_h),
                0u32..=max_x,
                0u32..=max_y,
            )
        })
}

fn invalid_crop_strategy() -> impl Strategy<Value = (u32, u32, u32, u32, u32, u32)> {
    (1u32..=64, 1u32..=64)
        .prop_flat_map(|(img_w, img_h)| {
            let crop_w = 1u32..=img_w;
            let crop_h = 1u32..=img_h;
            (Just(img_w), Just(img_h), crop_w, crop_h)
        })
        .prop_flat_map(|(img_w, img_h, crop_w, crop_h)| {
            let min_x = img_w - crop_w + 1;
            let min_y = img_h - crop_h + 1;
            prop_oneof![
                (
                    Just(img_w),
                    Just(img_h),
                    Just(crop_w),
                    Just(crop_h),
                    min_x..=img_w,
                    Just(0u32),
                ),
                (
                    Just(img_w),
                    Just(img_h),
                    Just(crop_w),
                    Just(crop_h),
                    Just(0u32),
                    min_y..=img_h,
                ),
            ]
        })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_crop_within_bounds_succeeds(
        params in valid_crop_strategy(),
    ) {
        let (img_w, img_h, crop_w, crop_h, x, y) = params;
        let img = create_test_image(img_w, img_h);
        let result = crop(&img, &CropSpec::new(x, y, crop_w, crop_h)).unwrap();
        prop_assert_eq!(result.dimensions(), (crop_w, crop_h));
        prop_assert_eq!(result.pixel(0, 0), img.pixel(x, y));
        prop_assert_eq!(
            result.pixel(crop_w - 1, crop_h - 1),
            img.pixel(x + crop_w - 1, y + crop_h - 1)
        );
    }

    #[test]
    fn prop_crop_out_of_bounds_errors(
        params in invalid_crop_strategy(),
    ) {
        let (img_w, img_h, crop_w, crop_h, x, y) = params;
        let img = create_test_image(img_w, img_h);
        let result = crop(&img, &CropSpec::new(x, y, crop_w, crop_h));
        prop_assert!(result.is_err());
    }

    #[test]
    fn prop_fit_stays_in_box_and_binds_one_axis(
        orig_w in 1u32..=4096,
        orig_h in 1u32..=4096,
        target_w in 1u32..=2048,
        target_h in 1u32..=2048,
    ) {
        let (w, h) = calc_resize_dimensions(orig_w, orig_h, target_w, target_h).unwrap();
        prop_assert!(w >= 1 && h >= 1);
        prop_assert!(w <= target_w && h <= target_h);
        prop_assert!(w == target_w || h == target_h);
    }

    #[test]
    fn prop_fit_keeps_ratio_within_one_pixel(
        orig_w in 1u32..=4096,
        orig_h in 1u32..=4096,
        target_w in 1u32..=2048,
        target_h in 1u32..=2048,
    ) {
        let (w, h) = calc_resize_dimensions(orig_w, orig_h, target_w, target_h).unwrap();
        if w == target_w {
            let exact = orig_h as f64 * target_w as f64 / orig_w as f64;
            prop_assert!((h as f64 - exact).abs() <= 1.0, "h={} exact={}", h, exact);
        } else {
            let exact = orig_w as f64 * target_h as f64 / orig_h as f64;
            prop_assert!((w as f64 - exact).abs() <= 1.0, "w={} exact={}", w, exact);
        }
    }

    #[test]
    fn prop_resize_matches_calc(
        orig_w in 1u32..=48,
        orig_h in 1u32..=48,
        target_w in 1u32..=48,
        target_h in 1u32..=48,
    ) {
        let img = create_test_image(orig_w, orig_h);
        let expected = calc_resize_dimensions(orig_w, orig_h, target_w, target_h).unwrap();
        let fitted = resize(&img, &ResizeSpec::fit(target_w, target_h)).unwrap();
        prop_assert_eq!(fitted.dimensions(), expected);

        let exact = resize(&img, &ResizeSpec::exact(target_w, target_h)).unwrap();
        prop_assert_eq!(exact.dimensions(), (target_w, target_h));
    }

    #[test]
    fn prop_resize_of_flat_image_stays_flat(
        orig_w in 1u32..=32,
        orig_h in 1u32..=32,
        target_w in 1u32..=64,
        target_h in 1u32..=64,
        rgba in any::<[u8; 4]>(),
    ) {
        let img = RasterBuffer::filled(orig_w, orig_h, rgba).unwrap();
        let out = resize(&img, &ResizeSpec::exact(target_w, target_h)).unwrap();
        prop_assert!(out.pixels().chunks_exact(4).all(|p| p == rgba));
    }

    #[test]
    fn prop_diff_of_self_is_white(
        w in 1u32..=40,
        h in 1u32..=40,
        seed in any::<u8>(),
    ) {
        let img = RasterBuffer::from_fn(w, h, |x, y| {
            let v = (x as u8).wrapping_mul(seed) ^ (y as u8);
            [v, v.wrapping_add(seed), seed, v | 1]
        })
        .unwrap();
        let out = diff(&img, &img).unwrap();
        prop_assert_eq!(out.changed_pixels, 0);
        prop_assert!(out.buffer.pixels().iter().all(|&v| v == 255));
    }

    #[test]
    fn prop_diff_size_is_larger_input(
        w1 in 1u32..=32,
        h1 in 1u32..=32,
        w2 in 1u32..=32,
        h2 in 1u32..=32,
    ) {
        let a = create_test_image(w1, h1);
        let b = create_test_image(w2, h2);
        let expected = if (w1 as u64 * h1 as u64, w1) >= (w2 as u64 * h2 as u64, w2) {
            (w1, h1)
        } else {
            (w2, h2)
        };
        prop_assert_eq!(diff(&a, &b).unwrap().buffer.dimensions(), expected);
    }

    #[test]
    fn prop_png_roundtrip_is_lossless(
        w in 1u32..=24,
        h in 1u32..=24,
        seed in any::<u8>(),
    ) {
        let img = RasterBuffer::from_fn(w, h, |x, y| {
            [x as u8 ^ seed, y as u8, seed, (x + y) as u8]
        })
        .unwrap();
        let png = encode(&img, FormatKind::Png, None).unwrap();
        prop_assert_eq!(decode(&png.data).unwrap(), img);
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_decode_never_panics(data in proptest::collection::vec(any::<u8>(), 0..512)) {
        let _ = decode(&data);
        let _ = inspect_header(&data);
    }

    #[test]
    fn prop_decode_never_panics_behind_signatures(
        prefix in prop_oneof![
            Just(vec![0x89u8, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]),
            Just(vec![0xFFu8, 0xD8, 0xFF, 0xE0]),
            Just(b"RIFF\x00\x00\x00\x00WEBPVP8 ".to_vec()),
            Just(b"BM".to_vec()),
            Just(b"GIF89a".to_vec()),
        ],
        tail in proptest::collection::vec(any::<u8>(), 0..256),
    ) {
        let mut data = prefix;
        data.extend_from_slice(&tail);
        let _ = decode(&data);
        let _ = inspect_header(&data);
    }
}
