use super::*;

use std::path::PathBuf;

fn temp_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "webp_cache_{name}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ))
}

#[test]
fn timestamp_parsing() {
    let expected = DateTime::from_timestamp(1_767_312_000, 0)
        .unwrap()
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string();
    assert_eq!(format_timestamp_from_filename("1767312000-042.webp"), expected);
    assert_eq!(format_timestamp_from_filename("1767312000.webp"), expected);
    assert_eq!(format_timestamp_from_filename("holiday-photo.webp"), "");
    assert_eq!(format_timestamp_from_filename("-42.webp"), "");
    assert_eq!(format_timestamp_from_filename(""), "");
}

#[test]
fn lists_subdirectories_and_webp_files_only() {
    let tmp = temp_dir("listing_root");
    std::fs::create_dir_all(tmp.join("26").join("01")).unwrap();
    std::fs::create_dir_all(tmp.join("25")).unwrap();
    std::fs::write(tmp.join("1767312000-001.webp"), b"x").unwrap();
    std::fs::write(tmp.join("notes.txt"), b"x").unwrap();
    std::fs::write(tmp.join("legacy.png"), b"x").unwrap();

    let listing = list_derivatives(&tmp, None).unwrap();
    let dirs: Vec<_> = listing.directories.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(dirs, vec!["25", "26"]);
    assert_eq!(listing.images.len(), 1);
    let img = &listing.images[0];
    assert_eq!(img.url, "/img/1767312000-001.webp");
    assert_eq!(img.thumbnail_url, img.url);
    assert_eq!(img.directory, "");
    assert!(!img.upload_date.is_empty());

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn lists_nested_directory_with_prefixed_urls() {
    let tmp = temp_dir("listing_nested");
    let day = tmp.join("26").join("01").join("02");
    std::fs::create_dir_all(&day).unwrap();
    std::fs::write(day.join("b-name.webp"), b"x").unwrap();
    std::fs::write(day.join("1767312000-001.WEBP"), b"x").unwrap();

    let listing = list_derivatives(&tmp, Some("26/01/02")).unwrap();
    assert_eq!(listing.directory, "26/01/02");
    assert!(listing.directories.is_empty());
    let urls: Vec<_> = listing.images.iter().map(|i| i.url.as_str()).collect();
    assert_eq!(
        urls,
        vec!["/img/26/01/02/1767312000-001.WEBP", "/img/26/01/02/b-name.webp"]
    );
    assert_eq!(listing.images[1].upload_date, "");

    let parent = list_derivatives(&tmp, Some("26")).unwrap();
    assert_eq!(parent.directories[0].path, "26/01");

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn rejects_traversal_and_reports_missing_directories() {
    let tmp = temp_dir("listing_errors");
    std::fs::create_dir_all(&tmp).unwrap();

    assert!(matches!(
        list_derivatives(&tmp, Some("../etc")),
        Err(CacheError::Validation(_))
    ));
    assert!(list_derivatives(&tmp, Some("99/99")).unwrap_err().is_not_found());

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn listing_serializes_with_camel_case_image_fields() {
    let listing = Listing {
        directory: String::new(),
        directories: vec![],
        images: vec![ImageInfo {
            url: "/img/a.webp".to_string(),
            thumbnail_url: "/img/a.webp".to_string(),
            original_name: "a.webp".to_string(),
            upload_date: String::new(),
            directory: String::new(),
        }],
    };
    let json = serde_json::to_value(&listing).unwrap();
    assert_eq!(json["images"][0]["thumbnailUrl"], "/img/a.webp");
    assert_eq!(json["images"][0]["originalName"], "a.webp");
}
