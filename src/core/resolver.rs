use crate::core::catalog::CatalogStore;
use crate::core::error::ScaffoldError;

/// Resolve a user token to a catalog language id.
///
/// Matching is exact and case-sensitive; the first matching entry wins. The
/// supported-name listing is fetched only when nothing matched.
pub fn resolve(store: &dyn CatalogStore, language_token: &str) -> Result<i64, ScaffoldError> {
    if let Some(entry) = store
        .languages()?
        .into_iter()
        .find(|entry| entry.short_name == language_token)
    {
        return Ok(entry.language_id);
    }

    Err(ScaffoldError::LanguageUnsupported {
        token: language_token.to_string(),
        supported: store.short_names()?,
    })
}
