//! Document schema adapter: which query capability each indexed field
//! carries. The document is a read-optimized projection owned by the
//! indexing pipeline; anything not declared here is treated as a plain
//! keyword so an unknown field can never produce an analyzer error.

/// Engine index holding the product documents.
pub const INDEX_NAME: &str = "products";

/// Fields covered by full-text search when no field is named explicitly.
pub const FULLTEXT_FIELDS: &[&str] = &["title", "description"];

pub const TITLE: &str = "title";
pub const DESCRIPTION: &str = "description";
pub const CATEGORY: &str = "category";
pub const PRICE: &str = "price";
pub const BRAND: &str = "brand";
pub const SKU: &str = "sku";
pub const THUMBNAIL: &str = "thumbnail";
pub const LOCATION: &str = "location";
pub const TAGS: &str = "tags";
pub const BRAND_NAME: &str = "brand_name";

/// Query capability class of an indexed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Analyzed free text (match / phrase / fuzzy).
    Text,
    /// Exact-match keyword, not analyzed.
    Keyword,
    /// Numeric, supports range queries and sorting.
    Numeric,
    /// Embedded object list queried with nested semantics.
    Nested,
    /// Geo point.
    Geo,
}

/// Capability of a top-level document field. Undeclared fields default
/// to `Keyword` (safe non-analyzed policy).
pub fn field_kind(field: &str) -> FieldKind {
    match field {
        TITLE | DESCRIPTION => FieldKind::Text,
        PRICE => FieldKind::Numeric,
        TAGS | BRAND_NAME => FieldKind::Nested,
        LOCATION => FieldKind::Geo,
        _ => FieldKind::Keyword,
    }
}

/// True for paths that must be queried through a nested clause. A term
/// against one embedded object must never match a sibling field of a
/// different embedded object in the same document.
pub fn is_nested_path(path: &str) -> bool {
    matches!(field_kind(path), FieldKind::Nested)
}

/// Fully qualified sub-field of a nested object, e.g. `tags.tag`.
/// Sub-fields of the embedded objects are all keywords.
pub fn nested_field(path: &str, sub: &str) -> String {
    format!("{path}.{sub}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_capabilities() {
        assert_eq!(field_kind("title"), FieldKind::Text);
        assert_eq!(field_kind("description"), FieldKind::Text);
        assert_eq!(field_kind("category"), FieldKind::Keyword);
        assert_eq!(field_kind("sku"), FieldKind::Keyword);
        assert_eq!(field_kind("price"), FieldKind::Numeric);
        assert_eq!(field_kind("tags"), FieldKind::Nested);
        assert_eq!(field_kind("brand_name"), FieldKind::Nested);
        assert_eq!(field_kind("location"), FieldKind::Geo);
    }

    #[test]
    fn undeclared_field_falls_back_to_keyword() {
        assert_eq!(field_kind("warehouse_code"), FieldKind::Keyword);
    }

    #[test]
    fn nested_paths() {
        assert!(is_nested_path("tags"));
        assert!(!is_nested_path("title"));
        assert_eq!(nested_field("tags", "tag"), "tags.tag");
    }
}
