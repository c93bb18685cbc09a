use crate::android::document::AxmlDocument;
use crate::android::error::AxmlResult;
use log::{debug, info};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Replaces `destination` with `bytes` without ever exposing a partially written file.
///
/// The data goes to a temporary file next to the destination, which is then renamed
/// over it. Permissions of an existing destination are carried over.
pub fn write_atomic(destination: &Path, bytes: &[u8], sync: bool) -> AxmlResult<()> {
    let parent = match destination.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut staged = tempfile::Builder::new()
        .prefix(".axml_patch_")
        .tempfile_in(parent)?;
    staged.write_all(bytes)?;
    staged.flush()?;
    if sync {
        staged.as_file().sync_all()?;
    }
    if let Ok(metadata) = fs::metadata(destination) {
        staged.as_file().set_permissions(metadata.permissions())?;
    }
    debug!(
        "Staged {} bytes at {} for {}",
        bytes.len(),
        staged.path().display(),
        destination.display()
    );
    staged.persist(destination).map_err(|e| e.error)?;
    Ok(())
}

/// Encodes `document` and atomically writes it to `destination`.
pub fn write_document(document: &AxmlDocument, destination: &Path, sync: bool) -> AxmlResult<()> {
    let bytes = document.to_bytes()?;
    write_atomic(destination, &bytes, sync)?;
    info!("Wrote {} bytes to {}", bytes.len(), destination.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fixtures::{attr, ManifestFixture};

    #[test]
    fn replaces_existing_file_and_leaves_no_staging_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("AndroidManifest.xml");
        fs::write(&path, b"old contents").unwrap();

        let bytes = ManifestFixture::application(vec![attr::id("label", 0x0101_0001, "Demo")])
            .build();
        let document = AxmlDocument::from_bytes(&bytes).unwrap();
        write_document(&document, &path, true).unwrap();

        assert_eq!(fs::read(&path).unwrap(), bytes);
        let entries = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[cfg(unix)]
    #[test]
    fn keeps_permissions_of_replaced_file() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("AndroidManifest.xml");
        fs::write(&path, b"old").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();

        write_atomic(&path, b"new", false).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o640);
        assert_eq!(fs::read(&path).unwrap(), b"new");
    }

    #[test]
    fn missing_directory_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("AndroidManifest.xml");
        assert!(matches!(
            write_atomic(&path, b"data", false),
            Err(crate::android::error::AxmlError::Io(_))
        ));
    }
}
