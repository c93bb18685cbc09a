use std::fs;
use std::path::PathBuf;

use crate::android::attributes::{
    ATTR_ALLOW_BACKUP, ATTR_EXTRACT_NATIVE_LIBS, ATTR_LARGE_HEAP, ATTR_NAME, ATTR_VERSION_CODE,
    ATTR_VERSION_NAME,
};
use crate::android::document::AxmlDocument;
use crate::android::editor::{EditOptions, ManifestEditor};
use crate::android::error::AxmlError;
use crate::android::patch::PatchOutcome;
use crate::android::value::ResValue;
use crate::tests::fixtures::{attr, FixtureElement, ManifestFixture};

fn write_manifest(dir: &tempfile::TempDir, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join("AndroidManifest.xml");
    fs::write(&path, bytes).expect("write fixture manifest");
    path
}

fn full_manifest() -> Vec<u8> {
    ManifestFixture::new(
        FixtureElement::new("manifest")
            .attr(attr::id_int("versionCode", ATTR_VERSION_CODE, 3))
            .attr(attr::raw("package", "com.example"))
            .child(FixtureElement::new("uses-sdk"))
            .child(
                FixtureElement::new("application")
                    .attr(attr::id("label", 0x0101_0001, "Demo"))
                    .attr(attr::id("name", ATTR_NAME, "com.example.App"))
                    .child(FixtureElement::new("activity")),
            ),
    )
    .with_resource_name("extractNativeLibs", ATTR_EXTRACT_NATIVE_LIBS)
    .with_resource_name("versionName", ATTR_VERSION_NAME)
    .build()
}

#[test]
fn edits_land_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_manifest(&dir, &full_manifest());
    let mut editor = ManifestEditor::open(&path).unwrap();

    let outcome = editor.set_extract_native_libs(false).unwrap();
    assert!(matches!(outcome, PatchOutcome::Inserted { .. }));

    let on_disk = AxmlDocument::read_from_file(&path).unwrap();
    assert_eq!(&on_disk, editor.document());
    on_disk.validate().unwrap();
    assert_eq!(
        on_disk
            .attribute_value("application", ATTR_EXTRACT_NATIVE_LIBS)
            .unwrap(),
        Some(ResValue::String("false".into()))
    );
}

#[test]
fn sequential_edits_accumulate() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_manifest(&dir, &full_manifest());
    let options = EditOptions::default().with_sync_before_rename(false);
    let mut editor = ManifestEditor::with_options(&path, options).unwrap();

    editor.set_package_name("com.example.patched").unwrap();
    editor.set_version_code(42).unwrap();
    editor.set_version_name("4.2.0").unwrap();
    editor.set_application_name("com.example.PatchedApp").unwrap();
    editor.set_extract_native_libs(true).unwrap();
    editor.set_extract_native_libs(false).unwrap();
    // Neither name is compiled into this manifest.
    editor.set_allow_backup(false).unwrap();
    editor.set_large_heap(true).unwrap();

    let document = AxmlDocument::read_from_file(&path).unwrap();
    document.validate().unwrap();
    let text = |element: &str, key: crate::android::patch::AttributeKey| {
        document
            .attribute_value(element, key)
            .unwrap()
            .map(|value| value.to_string())
    };
    assert_eq!(text("manifest", "package".into()), Some("com.example.patched".into()));
    assert_eq!(text("manifest", ATTR_VERSION_CODE.into()), Some("42".into()));
    assert_eq!(text("manifest", ATTR_VERSION_NAME.into()), Some("4.2.0".into()));
    assert_eq!(text("application", ATTR_NAME.into()), Some("com.example.PatchedApp".into()));
    assert_eq!(
        text("application", ATTR_EXTRACT_NATIVE_LIBS.into()),
        Some("false".into())
    );
    assert_eq!(text("application", ATTR_ALLOW_BACKUP.into()), Some("false".into()));
    assert_eq!(text("application", ATTR_LARGE_HEAP.into()), Some("true".into()));
}

#[test]
fn each_edit_starts_from_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_manifest(&dir, &full_manifest());
    let mut editor = ManifestEditor::open(&path).unwrap();

    // Someone else rewrites the manifest between two edits.
    let mut external = AxmlDocument::read_from_file(&path).unwrap();
    external.set_attribute("application", 0x0101_0001u32, "Renamed").unwrap();
    fs::write(&path, external.to_bytes().unwrap()).unwrap();

    editor.set_extract_native_libs(false).unwrap();

    let document = AxmlDocument::read_from_file(&path).unwrap();
    assert_eq!(
        document.attribute_value("application", 0x0101_0001u32).unwrap(),
        Some(ResValue::String("Renamed".into()))
    );
}

#[test]
fn failed_edit_leaves_file_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let bytes = full_manifest();
    let path = write_manifest(&dir, &bytes);
    let mut editor = ManifestEditor::open(&path).unwrap();
    let document = editor.document().clone();

    assert!(matches!(
        editor.set_attribute("application", 0x0101_0000u32, "x"),
        Err(AxmlError::AttributeNameUnresolved { .. })
    ));
    assert!(matches!(
        editor.set_attribute("service", ATTR_NAME, "com.example.Service"),
        Err(AxmlError::ElementNotFound { .. })
    ));
    assert_eq!(fs::read(&path).unwrap(), bytes);
    assert_eq!(editor.document(), &document);
}

#[test]
fn missing_schema_uri_leaves_file_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let bytes = ManifestFixture::application(vec![attr::raw("theme", "dark")])
        .without_android_namespace()
        .build();
    let path = write_manifest(&dir, &bytes);
    let mut editor = ManifestEditor::open(&path).unwrap();
    let document = editor.document().clone();

    assert!(matches!(
        editor.set_extract_native_libs(false),
        Err(AxmlError::SchemaUriMissing)
    ));
    assert_eq!(fs::read(&path).unwrap(), bytes);
    assert_eq!(editor.document(), &document);

    // Raw names still go through.
    editor.set_attribute("application", "theme", "light").unwrap();
    assert_eq!(
        AxmlDocument::read_from_file(&path)
            .unwrap()
            .attribute_value("application", "theme")
            .unwrap(),
        Some(ResValue::String("light".into()))
    );
}

#[test]
fn corrupt_file_is_rejected_and_kept() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_manifest(&dir, &full_manifest());
    let mut editor = ManifestEditor::open(&path).unwrap();

    let mut bytes = full_manifest();
    bytes.truncate(bytes.len() - 10);
    fs::write(&path, &bytes).unwrap();

    assert!(matches!(
        editor.set_package_name("com.example.patched"),
        Err(AxmlError::MalformedChunk { .. })
    ));
    assert_eq!(fs::read(&path).unwrap(), bytes);
    assert!(editor.reload().is_err());
}

#[test]
fn reuse_option_reaches_the_patcher() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_manifest(&dir, &full_manifest());
    let options = EditOptions::default().with_reuse_pooled_values(true);
    let mut editor = ManifestEditor::with_options(&path, options).unwrap();
    let pool_len = editor.document().string_pool().len();

    editor.set_application_name("Demo").unwrap();

    assert_eq!(editor.document().string_pool().len(), pool_len);
    assert!(editor.options().reuse_pooled_values);
    assert_eq!(editor.path(), path.as_path());
}
