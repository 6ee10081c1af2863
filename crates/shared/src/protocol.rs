use serde::{Deserialize, Serialize};

use crate::domain::{ExtType, ExtensionName};

/// Collection path of the extension store, relative to the server root.
pub const EXTENSIONS_ROUTE: &str = "/api/fix/extensions";

/// One blocked extension as the store holds it. Used both as a snapshot entry
/// and as the body of an add request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionItem {
    pub ext_name: ExtensionName,
    pub ext_type: ExtType,
}

impl ExtensionItem {
    pub fn fixed(ext_name: ExtensionName) -> Self {
        Self {
            ext_name,
            ext_type: ExtType::Fixed,
        }
    }

    pub fn custom(ext_name: ExtensionName) -> Self {
        Self {
            ext_name,
            ext_type: ExtType::Custom,
        }
    }
}

/// Snapshot item as it arrives on the wire, before name validation. The
/// client keeps raw names so one malformed entry does not void the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawExtensionItem {
    pub ext_name: String,
    pub ext_type: ExtType,
}

impl From<ExtensionItem> for RawExtensionItem {
    fn from(item: ExtensionItem) -> Self {
        Self {
            ext_name: item.ext_name.into_inner(),
            ext_type: item.ext_type,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtensionListResponse {
    pub items: Vec<RawExtensionItem>,
}
