use super::*;

#[test]
fn extension_lookup_is_case_insensitive() {
    assert_eq!(ImageFormat::from_extension("PNG"), ImageFormat::Png);
    assert_eq!(ImageFormat::from_extension(".Jpeg"), ImageFormat::Jpeg);
    assert_eq!(ImageFormat::from_extension("jpg"), ImageFormat::Jpeg);
    assert_eq!(ImageFormat::from_extension("GiF"), ImageFormat::Gif);
    assert_eq!(ImageFormat::from_extension("bmp"), ImageFormat::Unknown);
    assert_eq!(
        ImageFormat::from_path(Path::new("26/01/02/1-001.WEBP")),
        ImageFormat::Webp
    );
    assert_eq!(
        ImageFormat::from_path(Path::new("no_extension")),
        ImageFormat::Unknown
    );
}

#[test]
fn mime_table_defaults_to_jpeg() {
    assert_eq!(ImageFormat::Png.mime(), "image/png");
    assert_eq!(ImageFormat::Gif.mime(), "image/gif");
    assert_eq!(ImageFormat::Svg.mime(), "image/svg+xml");
    assert_eq!(ImageFormat::Jpeg.mime(), "image/jpeg");
    assert_eq!(ImageFormat::Unknown.mime(), "image/jpeg");
}

#[test]
fn only_gif_is_animation_capable() {
    assert!(ImageFormat::Gif.is_animation_capable());
    assert!(!ImageFormat::Webp.is_animation_capable());
    assert!(!ImageFormat::Png.is_animation_capable());
}

#[test]
fn sweepable_formats() {
    for f in [
        ImageFormat::Jpeg,
        ImageFormat::Png,
        ImageFormat::Gif,
        ImageFormat::Webp,
    ] {
        assert!(f.is_sweepable(), "{f} should be swept");
    }
    assert!(!ImageFormat::Svg.is_sweepable());
    assert!(!ImageFormat::Unknown.is_sweepable());
}

#[test]
fn quality_bounds() {
    assert!(Quality::new(0).is_err());
    assert!(Quality::new(101).is_err());
    assert_eq!(Quality::new(1).unwrap().get(), 1);
    assert_eq!(Quality::new(100).unwrap().get(), 100);
    assert_eq!(Quality::clamped(-5).get(), 1);
    assert_eq!(Quality::clamped(500).get(), 100);
    assert_eq!(Quality::default().get(), 80);
}

#[test]
fn quality_serde_rejects_out_of_range() {
    let q: Quality = serde_json::from_str("75").unwrap();
    assert_eq!(q.get(), 75);
    assert!(serde_json::from_str::<Quality>("0").is_err());
    assert_eq!(serde_json::to_string(&q).unwrap(), "75");
}

#[test]
fn sniff_gif_marker_wins_over_extension() {
    assert_eq!(sniff(b"GIF89a\x01\x00"), Sniffed::Gif);
    assert_eq!(served_derivative_mime(b"GIF87a"), "image/gif");
}

#[test]
fn sniff_webp_container() {
    let head = b"RIFF\x24\x00\x00\x00WEBPVP8L";
    assert_eq!(sniff(head), Sniffed::Webp);
    assert_eq!(served_derivative_mime(head), "image/webp");
}

#[test]
fn sniff_other_bytes_keep_derivative_type() {
    let png_head = b"\x89PNG\r\n\x1a\n";
    assert_eq!(sniff(png_head), Sniffed::Other);
    assert_eq!(served_derivative_mime(png_head), "image/webp");
    assert_eq!(served_derivative_mime(b""), "image/webp");
}
