//! Platform attributes the manifest editor knows by name.

use crate::android::patch::AttributeKey;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Namespace URI of `android:` attributes.
pub const ANDROID_SCHEMA_URI: &str = "http://schemas.android.com/apk/res/android";

pub const ATTR_NAME: u32 = 0x0101_0003;
pub const ATTR_VERSION_CODE: u32 = 0x0101_021b;
pub const ATTR_VERSION_NAME: u32 = 0x0101_021c;
pub const ATTR_ALLOW_BACKUP: u32 = 0x0101_0280;
pub const ATTR_LARGE_HEAP: u32 = 0x0101_035a;
pub const ATTR_SUPPORTS_RTL: u32 = 0x0101_03af;
pub const ATTR_EXTRACT_NATIVE_LIBS: u32 = 0x0101_04ea;
pub const ATTR_USES_CLEARTEXT_TRAFFIC: u32 = 0x0101_04ec;
pub const ATTR_COMPILE_SDK_VERSION: u32 = 0x0101_0572;
pub const ATTR_COMPILE_SDK_VERSION_CODENAME: u32 = 0x0101_0573;
pub const ATTR_APP_COMPONENT_FACTORY: u32 = 0x0101_057a;
pub const ATTR_REQUEST_LEGACY_EXTERNAL_STORAGE: u32 = 0x0101_0603;
pub const ATTR_PRESERVE_LEGACY_EXTERNAL_STORAGE: u32 = 0x0101_0614;

pub const MANIFEST_ELEMENT: &str = "manifest";
pub const APPLICATION_ELEMENT: &str = "application";

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WellKnownAttribute {
    Package,
    VersionCode,
    VersionName,
    CompileSdkVersion,
    CompileSdkVersionCodename,
    Name,
    AppComponentFactory,
    ExtractNativeLibs,
    AllowBackup,
    LargeHeap,
    SupportsRtl,
    UsesCleartextTraffic,
    RequestLegacyExternalStorage,
    PreserveLegacyExternalStorage,
}

static BY_NAME: Lazy<BTreeMap<&'static str, WellKnownAttribute>> = Lazy::new(|| {
    WellKnownAttribute::ALL
        .iter()
        .map(|attribute| (attribute.attribute_name(), *attribute))
        .collect()
});

impl WellKnownAttribute {
    pub const ALL: [WellKnownAttribute; 14] = [
        WellKnownAttribute::Package,
        WellKnownAttribute::VersionCode,
        WellKnownAttribute::VersionName,
        WellKnownAttribute::CompileSdkVersion,
        WellKnownAttribute::CompileSdkVersionCodename,
        WellKnownAttribute::Name,
        WellKnownAttribute::AppComponentFactory,
        WellKnownAttribute::ExtractNativeLibs,
        WellKnownAttribute::AllowBackup,
        WellKnownAttribute::LargeHeap,
        WellKnownAttribute::SupportsRtl,
        WellKnownAttribute::UsesCleartextTraffic,
        WellKnownAttribute::RequestLegacyExternalStorage,
        WellKnownAttribute::PreserveLegacyExternalStorage,
    ];

    /// Attribute name as written in a text manifest, without the `android:` prefix.
    pub fn attribute_name(&self) -> &'static str {
        match self {
            WellKnownAttribute::Package => "package",
            WellKnownAttribute::VersionCode => "versionCode",
            WellKnownAttribute::VersionName => "versionName",
            WellKnownAttribute::CompileSdkVersion => "compileSdkVersion",
            WellKnownAttribute::CompileSdkVersionCodename => "compileSdkVersionCodename",
            WellKnownAttribute::Name => "name",
            WellKnownAttribute::AppComponentFactory => "appComponentFactory",
            WellKnownAttribute::ExtractNativeLibs => "extractNativeLibs",
            WellKnownAttribute::AllowBackup => "allowBackup",
            WellKnownAttribute::LargeHeap => "largeHeap",
            WellKnownAttribute::SupportsRtl => "supportsRtl",
            WellKnownAttribute::UsesCleartextTraffic => "usesCleartextTraffic",
            WellKnownAttribute::RequestLegacyExternalStorage => "requestLegacyExternalStorage",
            WellKnownAttribute::PreserveLegacyExternalStorage => "preserveLegacyExternalStorage",
        }
    }

    /// Element the attribute belongs on.
    pub fn element(&self) -> &'static str {
        match self {
            WellKnownAttribute::Package
            | WellKnownAttribute::VersionCode
            | WellKnownAttribute::VersionName
            | WellKnownAttribute::CompileSdkVersion
            | WellKnownAttribute::CompileSdkVersionCodename => MANIFEST_ELEMENT,
            _ => APPLICATION_ELEMENT,
        }
    }

    /// Resource id of the attribute; `None` for `package`, which is matched by name.
    pub fn resource_id(&self) -> Option<u32> {
        match self {
            WellKnownAttribute::Package => None,
            WellKnownAttribute::VersionCode => Some(ATTR_VERSION_CODE),
            WellKnownAttribute::VersionName => Some(ATTR_VERSION_NAME),
            WellKnownAttribute::CompileSdkVersion => Some(ATTR_COMPILE_SDK_VERSION),
            WellKnownAttribute::CompileSdkVersionCodename => {
                Some(ATTR_COMPILE_SDK_VERSION_CODENAME)
            }
            WellKnownAttribute::Name => Some(ATTR_NAME),
            WellKnownAttribute::AppComponentFactory => Some(ATTR_APP_COMPONENT_FACTORY),
            WellKnownAttribute::ExtractNativeLibs => Some(ATTR_EXTRACT_NATIVE_LIBS),
            WellKnownAttribute::AllowBackup => Some(ATTR_ALLOW_BACKUP),
            WellKnownAttribute::LargeHeap => Some(ATTR_LARGE_HEAP),
            WellKnownAttribute::SupportsRtl => Some(ATTR_SUPPORTS_RTL),
            WellKnownAttribute::UsesCleartextTraffic => Some(ATTR_USES_CLEARTEXT_TRAFFIC),
            WellKnownAttribute::RequestLegacyExternalStorage => {
                Some(ATTR_REQUEST_LEGACY_EXTERNAL_STORAGE)
            }
            WellKnownAttribute::PreserveLegacyExternalStorage => {
                Some(ATTR_PRESERVE_LEGACY_EXTERNAL_STORAGE)
            }
        }
    }

    pub fn key(&self) -> AttributeKey {
        match self.resource_id() {
            Some(id) => AttributeKey::ResourceId(id),
            None => AttributeKey::Name(self.attribute_name().to_string()),
        }
    }

    pub fn from_resource_id(resource_id: u32) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|attribute| attribute.resource_id() == Some(resource_id))
    }

    /// Looks an attribute up by manifest name, with or without the `android:` prefix.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.strip_prefix("android:").unwrap_or(name);
        BY_NAME.get(name).copied()
    }
}
