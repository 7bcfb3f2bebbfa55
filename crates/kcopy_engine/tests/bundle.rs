mod support;

use kcopy_engine::{bundle_entries, BundleError, BundleFixer, MARKER_FILE};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use support::{as_refs, export_entries, write_bundle};

#[test]
fn bundle_without_marker_is_returned_unchanged() {
    let temp = TempDir::new().unwrap();
    let bundle = write_bundle(
        temp.path(),
        "m1.zip",
        &[("m1/", ""), ("m1/index.cnxml", "<document/>")],
    );
    let fixer = BundleFixer::new(temp.path().to_path_buf());

    let first = fixer.fix(&bundle).unwrap();
    let second = fixer.fix(&first).unwrap();

    assert_eq!(first, bundle);
    assert_eq!(second, bundle);
    assert!(!fixer.fixed_path(&bundle).exists());
}

#[test]
fn marker_is_stripped_and_other_entries_kept() {
    let temp = TempDir::new().unwrap();
    let entries = export_entries("m2");
    let bundle = write_bundle(temp.path(), "m2.zip", &as_refs(&entries));
    let fixer = BundleFixer::new(temp.path().to_path_buf());

    let fixed = fixer.fix(&bundle).unwrap();

    assert_eq!(fixed, temp.path().join("m2_fixed.zip"));
    let mut expected: Vec<String> = entries
        .iter()
        .map(|(name, _)| name.clone())
        .filter(|name| !name.ends_with(MARKER_FILE))
        .collect();
    expected.sort();
    assert_eq!(bundle_entries(&fixed).unwrap(), expected);
    // The download itself is left alone.
    assert!(bundle_entries(&bundle)
        .unwrap()
        .contains(&"m2/index.cnxml.html".to_string()));
}

#[test]
fn fixing_a_fixed_bundle_is_a_no_op() {
    let temp = TempDir::new().unwrap();
    let bundle = write_bundle(temp.path(), "m3.zip", &as_refs(&export_entries("m3")));
    let fixer = BundleFixer::new(temp.path().to_path_buf());

    let fixed = fixer.fix(&bundle).unwrap();
    let again = fixer.fix(&fixed).unwrap();
    assert_eq!(again, fixed);
}

#[test]
fn fixed_copy_lands_in_configured_directory() {
    let temp = TempDir::new().unwrap();
    let out = temp.path().join("fixed");
    let bundle = write_bundle(temp.path(), "m4.zip", &as_refs(&export_entries("m4")));
    let fixer = BundleFixer::new(out.clone());

    let fixed = fixer.fix(&bundle).unwrap();
    assert_eq!(fixed, out.join("m4_fixed.zip"));
    assert!(fixed.is_file());
}

#[test]
fn file_named_like_marker_prefix_is_kept() {
    let temp = TempDir::new().unwrap();
    let bundle = write_bundle(
        temp.path(),
        "m5.zip",
        &[("m5/old_index.cnxml.html", "x"), ("m5/index.cnxml", "y")],
    );
    let fixer = BundleFixer::new(temp.path().to_path_buf());
    assert_eq!(fixer.fix(&bundle).unwrap(), bundle);
}

#[test]
fn not_a_zip_is_reported() {
    let temp = TempDir::new().unwrap();
    let bogus = temp.path().join("m6.zip");
    std::fs::write(&bogus, "definitely not a zip").unwrap();
    let fixer = BundleFixer::new(temp.path().to_path_buf());

    assert!(matches!(fixer.fix(&bogus), Err(BundleError::Zip { .. })));
}
