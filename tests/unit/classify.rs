use super::*;

use crate::testutil::{gif_bytes, png_bytes, temp_dir, write};

#[test]
fn multi_frame_gif_is_animated() {
    let tmp = temp_dir("classify_anim");
    let path = tmp.join("a.gif");
    write(&path, &gif_bytes(3));

    assert_eq!(count_gif_frames(&path), Some(3));
    let c = classify(&path);
    assert_eq!(c.format, ImageFormat::Gif);
    assert!(c.animated);

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn single_frame_gif_is_static() {
    let tmp = temp_dir("classify_static_gif");
    let path = tmp.join("still.GIF");
    write(&path, &gif_bytes(1));

    let c = classify(&path);
    assert_eq!(c.format, ImageFormat::Gif);
    assert!(!c.animated);

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn corrupt_or_missing_gif_is_not_animated() {
    let tmp = temp_dir("classify_corrupt");
    let corrupt = tmp.join("broken.gif");
    write(&corrupt, b"GIF89a\x00garbage");

    assert!(!classify(&corrupt).animated);
    assert!(!classify(&tmp.join("missing.gif")).animated);
    assert_eq!(count_gif_frames(&tmp.join("missing.gif")), None);

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn format_comes_from_extension_not_content() {
    let tmp = temp_dir("classify_ext");
    // GIF bytes under a .png name are still classified as PNG and never decoded as GIF.
    let path = tmp.join("liar.png");
    write(&path, &gif_bytes(2));
    let c = classify(&path);
    assert_eq!(c.format, ImageFormat::Png);
    assert!(!c.animated);

    let real_png = tmp.join("ok.PNG");
    write(&real_png, &png_bytes(2, 2));
    assert_eq!(classify(&real_png).format, ImageFormat::Png);

    std::fs::remove_dir_all(&tmp).ok();
}
