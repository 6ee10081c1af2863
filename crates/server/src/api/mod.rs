use std::sync::Arc;

use shared::{
    domain::{ExtType, ExtensionName},
    error::{ApiError, ErrorCode},
    protocol::{ExtensionItem, RawExtensionItem},
};
use tokio::sync::RwLock;

/// In-memory extension list, kept in insertion order. Not durable; the
/// process is a development stand-in for the real store.
#[derive(Clone, Default)]
pub struct ApiContext {
    items: Arc<RwLock<Vec<ExtensionItem>>>,
}

impl ApiContext {
    pub fn with_items(items: Vec<ExtensionItem>) -> Self {
        Self {
            items: Arc::new(RwLock::new(items)),
        }
    }
}

pub async fn list_extensions(ctx: &ApiContext) -> Vec<RawExtensionItem> {
    ctx.items
        .read()
        .await
        .iter()
        .cloned()
        .map(RawExtensionItem::from)
        .collect()
}

pub async fn add_extension(ctx: &ApiContext, item: RawExtensionItem) -> Result<(), ApiError> {
    let ext_name = ExtensionName::parse(&item.ext_name)
        .map_err(|err| ApiError::new(ErrorCode::Validation, err.to_string()))?;
    let mut items = ctx.items.write().await;
    if let Some(existing) = items.iter().find(|entry| entry.ext_name == ext_name) {
        return Err(ApiError::new(
            ErrorCode::Conflict,
            format!(
                "extension \"{}\" is already registered as {}",
                ext_name, existing.ext_type
            ),
        ));
    }
    items.push(ExtensionItem {
        ext_name,
        ext_type: item.ext_type,
    });
    Ok(())
}

/// Deletes the entry named `ext_name`, whatever its type.
pub async fn remove_extension(ctx: &ApiContext, ext_name: &str) -> Result<ExtType, ApiError> {
    let not_found = || {
        ApiError::new(
            ErrorCode::NotFound,
            format!("extension \"{ext_name}\" not found"),
        )
    };
    let ext_name = ExtensionName::parse(ext_name).map_err(|_| not_found())?;
    let mut items = ctx.items.write().await;
    let position = items
        .iter()
        .position(|entry| entry.ext_name == ext_name)
        .ok_or_else(not_found)?;
    Ok(items.remove(position).ext_type)
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
