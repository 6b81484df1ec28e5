//! Well-known names of the built-in content model.

use crate::core::types::QName;

pub const CM: &str = "cm";
pub const SYS: &str = "sys";

pub fn type_base() -> QName {
    QName::new(SYS, "base")
}

pub fn type_store_root() -> QName {
    QName::new(SYS, "store_root")
}

pub fn type_folder() -> QName {
    QName::new(CM, "folder")
}

pub fn type_content() -> QName {
    QName::new(CM, "content")
}

pub fn type_category() -> QName {
    QName::new(CM, "category")
}

pub fn assoc_children() -> QName {
    QName::new(SYS, "children")
}

pub fn assoc_contains() -> QName {
    QName::new(CM, "contains")
}

pub fn assoc_subcategories() -> QName {
    QName::new(CM, "subcategories")
}

pub fn aspect_classifiable() -> QName {
    QName::new(CM, "classifiable")
}

pub fn aspect_titled() -> QName {
    QName::new(CM, "titled")
}

pub fn prop_categories() -> QName {
    QName::new(CM, "categories")
}

pub fn prop_name() -> QName {
    QName::new(CM, "name")
}

pub fn prop_content() -> QName {
    QName::new(CM, "content")
}

pub fn prop_title() -> QName {
    QName::new(CM, "title")
}

pub fn prop_description() -> QName {
    QName::new(CM, "description")
}

pub fn prop_created() -> QName {
    QName::new(CM, "created")
}

pub fn prop_locale() -> QName {
    QName::new(SYS, "locale")
}

pub fn prop_exclude_from_index() -> QName {
    QName::new(SYS, "excludeFromIndex")
}

/// Element name appended to category paths for the classified node.
pub fn category_member() -> QName {
    QName::new(CM, "member")
}
