use crate::android::attributes::WellKnownAttribute;
use crate::android::document::AxmlDocument;
use crate::android::error::AxmlResult;
use crate::android::patch::{AttributeKey, AttributePatcher, PatchOutcome};
use crate::android::serializer::write_document;
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Knobs for an edit session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditOptions {
    /// Point patched records at an existing equal pool string instead of appending one.
    pub reuse_pooled_values: bool,
    /// `sync_all` the staged file before renaming it over the manifest.
    pub sync_before_rename: bool,
}

impl Default for EditOptions {
    fn default() -> Self {
        EditOptions {
            reuse_pooled_values: false,
            sync_before_rename: true,
        }
    }
}

impl EditOptions {
    pub fn with_reuse_pooled_values(mut self, reuse: bool) -> Self {
        self.reuse_pooled_values = reuse;
        self
    }

    pub fn with_sync_before_rename(mut self, sync: bool) -> Self {
        self.sync_before_rename = sync;
        self
    }
}

/// Patches a compiled `AndroidManifest.xml` on disk, one attribute at a time.
///
/// Every edit re-reads the file, patches the fresh copy and atomically replaces the
/// file with the result. A failed edit leaves both the file and [`document`](Self::document)
/// as they were.
pub struct ManifestEditor {
    path: PathBuf,
    options: EditOptions,
    document: AxmlDocument,
}

impl ManifestEditor {
    pub fn open(path: impl AsRef<Path>) -> AxmlResult<Self> {
        Self::with_options(path, EditOptions::default())
    }

    pub fn with_options(path: impl AsRef<Path>, options: EditOptions) -> AxmlResult<Self> {
        let path = path.as_ref().to_path_buf();
        let document = AxmlDocument::read_from_file(&path)?;
        Ok(ManifestEditor {
            path,
            options,
            document,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> &EditOptions {
        &self.options
    }

    /// The document as of the last successful edit or reload.
    pub fn document(&self) -> &AxmlDocument {
        &self.document
    }

    pub fn reload(&mut self) -> AxmlResult<()> {
        self.document = AxmlDocument::read_from_file(&self.path)?;
        Ok(())
    }

    pub fn set_attribute(
        &mut self,
        element: &str,
        key: impl Into<AttributeKey>,
        value: &str,
    ) -> AxmlResult<PatchOutcome> {
        let key = key.into();
        let mut document = AxmlDocument::read_from_file(&self.path)?;
        let outcome = AttributePatcher::new(&mut document)
            .reuse_pooled_values(self.options.reuse_pooled_values)
            .set_attribute(element, &key, value)?;
        write_document(&document, &self.path, self.options.sync_before_rename)?;
        debug!("Set `{key}` on <{element}> in {}: {outcome:?}", self.path.display());
        self.document = document;
        Ok(outcome)
    }

    pub fn set_well_known(
        &mut self,
        attribute: WellKnownAttribute,
        value: &str,
    ) -> AxmlResult<PatchOutcome> {
        self.set_attribute(attribute.element(), attribute.key(), value)
    }

    pub fn set_package_name(&mut self, package: &str) -> AxmlResult<PatchOutcome> {
        self.set_well_known(WellKnownAttribute::Package, package)
    }

    pub fn set_version_code(&mut self, version_code: u32) -> AxmlResult<PatchOutcome> {
        self.set_well_known(WellKnownAttribute::VersionCode, &version_code.to_string())
    }

    pub fn set_version_name(&mut self, version_name: &str) -> AxmlResult<PatchOutcome> {
        self.set_well_known(WellKnownAttribute::VersionName, version_name)
    }

    pub fn set_compile_sdk_version(&mut self, version: u32) -> AxmlResult<PatchOutcome> {
        self.set_well_known(WellKnownAttribute::CompileSdkVersion, &version.to_string())
    }

    pub fn set_compile_sdk_version_codename(&mut self, codename: &str) -> AxmlResult<PatchOutcome> {
        self.set_well_known(WellKnownAttribute::CompileSdkVersionCodename, codename)
    }

    pub fn set_application_name(&mut self, class_name: &str) -> AxmlResult<PatchOutcome> {
        self.set_well_known(WellKnownAttribute::Name, class_name)
    }

    pub fn set_app_component_factory(&mut self, class_name: &str) -> AxmlResult<PatchOutcome> {
        self.set_well_known(WellKnownAttribute::AppComponentFactory, class_name)
    }

    pub fn set_extract_native_libs(&mut self, extract: bool) -> AxmlResult<PatchOutcome> {
        self.set_flag(WellKnownAttribute::ExtractNativeLibs, extract)
    }

    pub fn set_allow_backup(&mut self, allow: bool) -> AxmlResult<PatchOutcome> {
        self.set_flag(WellKnownAttribute::AllowBackup, allow)
    }

    pub fn set_large_heap(&mut self, large_heap: bool) -> AxmlResult<PatchOutcome> {
        self.set_flag(WellKnownAttribute::LargeHeap, large_heap)
    }

    pub fn set_supports_rtl(&mut self, supports: bool) -> AxmlResult<PatchOutcome> {
        self.set_flag(WellKnownAttribute::SupportsRtl, supports)
    }

    pub fn set_uses_cleartext_traffic(&mut self, allow: bool) -> AxmlResult<PatchOutcome> {
        self.set_flag(WellKnownAttribute::UsesCleartextTraffic, allow)
    }

    pub fn set_request_legacy_external_storage(
        &mut self,
        request: bool,
    ) -> AxmlResult<PatchOutcome> {
        self.set_flag(WellKnownAttribute::RequestLegacyExternalStorage, request)
    }

    pub fn set_preserve_legacy_external_storage(
        &mut self,
        preserve: bool,
    ) -> AxmlResult<PatchOutcome> {
        self.set_flag(WellKnownAttribute::PreserveLegacyExternalStorage, preserve)
    }

    fn set_flag(&mut self, attribute: WellKnownAttribute, value: bool) -> AxmlResult<PatchOutcome> {
        self.set_well_known(attribute, if value { "true" } else { "false" })
    }
}
