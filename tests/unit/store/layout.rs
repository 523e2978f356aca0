use super::*;

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
fn allocated_paths_differ_only_in_root_and_extension() {
    let tmp = temp_dir("layout_alloc");
    let layout = StoreLayout::new(tmp.join("pics"), tmp.join("webp"));

    for ext in ["png", ".jpg", "jpeg", "GIF", "webp"] {
        let alloc = layout.allocate_key(ext).unwrap();
        let orig_rel = alloc.original_path.strip_prefix(tmp.join("pics")).unwrap();
        let deriv_rel = alloc.derivative_path.strip_prefix(tmp.join("webp")).unwrap();

        assert_eq!(orig_rel.with_extension(""), deriv_rel.with_extension(""));
        assert_eq!(deriv_rel.extension().unwrap(), "webp");
        assert!(alloc.original_path.parent().unwrap().is_dir());
        assert!(alloc.derivative_path.parent().unwrap().is_dir());
        assert_eq!(layout.original_path(&alloc.key), alloc.original_path);
        assert_eq!(layout.derivative_path(&alloc.key), alloc.derivative_path);
    }

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn allocate_at_uses_the_given_date_partition() {
    let tmp = temp_dir("layout_partition");
    let layout = StoreLayout::new(tmp.join("pics"), tmp.join("webp"));
    let at = Local.with_ymd_and_hms(2025, 12, 31, 12, 0, 0).unwrap();

    let alloc = layout.allocate_key_at(&at, "png").unwrap();
    assert!(alloc.key.as_str().starts_with("25/12/31/"));
    assert!(tmp.join("pics").join("25").join("12").join("31").is_dir());
    assert!(tmp.join("webp").join("25").join("12").join("31").is_dir());

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn allocated_keys_never_decrease() {
    let tmp = temp_dir("layout_monotonic");
    let layout = StoreLayout::new(tmp.join("pics"), tmp.join("webp"));

    let mut prev: Option<i64> = None;
    for _ in 0..20 {
        let alloc = layout.allocate_key("png").unwrap();
        let stem = alloc.key.file_name().trim_end_matches(".png");
        let (secs, millis) = stem.split_once('-').unwrap();
        let ms = secs.parse::<i64>().unwrap() * 1000 + millis.parse::<i64>().unwrap();
        if let Some(p) = prev {
            assert!(ms >= p);
        }
        prev = Some(ms);
    }

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn directory_creation_failure_is_an_error() {
    let tmp = temp_dir("layout_blocked");
    std::fs::create_dir_all(&tmp).unwrap();
    std::fs::write(tmp.join("pics"), b"not a dir").unwrap();
    let layout = StoreLayout::new(tmp.join("pics"), tmp.join("webp"));

    assert!(layout.allocate_key("png").is_err());
    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn key_for_original_round_trips() {
    let layout = StoreLayout::new("/srv/pics", "/srv/webp");
    let key = AssetKey::parse("26/01/02/1-001.gif").unwrap();
    let path = layout.original_path(&key);
    assert_eq!(layout.key_for_original(&path).unwrap(), key);
    assert!(layout.key_for_original(Path::new("/elsewhere/x.gif")).is_err());
}
