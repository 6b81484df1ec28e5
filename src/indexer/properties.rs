use crate::analysis::locale::with_locale;
use crate::content::service::{ContentService, MIMETYPE_TEXT_PLAIN};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{ContentData, NodeRef, PropertyValue, QName};
use crate::index::document::{fields, not_indexed, Document, FieldOptions};
use crate::schema::dictionary::{DataType, PropertyDefinition, TokeniseMode};

const DATE_SORT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// Per-node inputs shared by every property of one generation pass
pub struct EmitContext<'a> {
    pub node: &'a NodeRef,
    pub content: &'a dyn ContentService,
    /// Locale of the node's text values
    pub locale: &'a str,
    /// Only atomic properties are materialized in this pass
    pub atomic_only: bool,
    pub max_transformation_cost: u64,
}

/// How one property turns into fields, chosen once from its data type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyHandler {
    Content,
    MultilingualText,
    Text,
    DateTime,
    Default,
}

impl PropertyHandler {
    pub fn for_type(data_type: DataType) -> Self {
        match data_type {
            DataType::Content => PropertyHandler::Content,
            DataType::MlText => PropertyHandler::MultilingualText,
            DataType::Text => PropertyHandler::Text,
            DataType::DateTime => PropertyHandler::DateTime,
            DataType::Category | DataType::NodeRef | DataType::Other => PropertyHandler::Default,
        }
    }

    /// Adds the property's fields to `doc`.
    ///
    /// Returns false when some part was left for the full-text backlog.
    pub fn emit(
        &self,
        ctx: &EmitContext<'_>,
        def: &PropertyDefinition,
        value: &PropertyValue,
        doc: &mut Document,
    ) -> Result<bool> {
        if !def.indexed && !def.stored {
            return Ok(true);
        }
        if value.is_null() {
            return Ok(true);
        }
        if ctx.atomic_only && !def.atomic {
            return Ok(false);
        }

        let attr = fields::property(&def.name);
        let mut complete = true;
        for value in value.values() {
            let done = match self {
                PropertyHandler::Content => emit_content(ctx, def, &attr, value, doc)?,
                PropertyHandler::MultilingualText => emit_ml_text(ctx, def, &attr, value, doc),
                PropertyHandler::Text => emit_text(ctx, def, &attr, value, doc),
                PropertyHandler::DateTime => emit_datetime(def, &attr, value, doc),
                PropertyHandler::Default => emit_default(def, &attr, value, doc),
            };
            complete &= done;
        }
        Ok(complete)
    }
}

fn options(def: &PropertyDefinition, tokenized: bool) -> FieldOptions {
    FieldOptions {
        stored: def.stored,
        indexed: def.indexed,
        tokenized,
    }
}

/// Converts a value or records that it could not be converted.
fn convert(def: &PropertyDefinition, attr: &str, value: &PropertyValue, doc: &mut Document) -> Option<String> {
    match value.to_index_string() {
        Ok(converted) => converted,
        Err(err) => {
            tracing::debug!(property = %def.name, error = %err, "value not indexed");
            doc.add(attr, not_indexed::NO_TYPE_CONVERSION, options(def, false));
            None
        }
    }
}

fn emit_content(
    ctx: &EmitContext<'_>,
    def: &PropertyDefinition,
    attr: &str,
    value: &PropertyValue,
    doc: &mut Document,
) -> Result<bool> {
    let PropertyValue::Content(data) = value else {
        if let Some(text) = convert(def, attr, value, doc) {
            doc.add(attr, with_locale(ctx.locale, &text), options(def, true));
        }
        return Ok(true);
    };
    let ContentData { mimetype: Some(mimetype), .. } = data else {
        return Ok(true);
    };
    if !def.indexed {
        return Ok(true);
    }

    let locale = data.locale.as_deref().unwrap_or(ctx.locale);
    doc.add(format!("{}.mimetype", attr), mimetype.as_str(), FieldOptions::KEYWORD);
    doc.add(format!("{}.size", attr), data.size.to_string(), FieldOptions::TEXT);
    doc.add(format!("{}.locale", attr), locale.to_lowercase(), FieldOptions::KEYWORD);

    if ctx.atomic_only && ctx.max_transformation_cost == 0 {
        return Ok(false);
    }

    let reader = match ctx.content.reader(ctx.node, &def.name) {
        Ok(reader) => reader,
        Err(err) if ctx.atomic_only => {
            tracing::warn!(node = %ctx.node, property = %def.name, error = %err, "content unreadable, deferring");
            return Ok(false);
        }
        Err(err) => {
            return Err(Error::with_source(
                ErrorKind::Extraction,
                format!("cannot read {} of {}", def.name, ctx.node),
                err,
            ));
        }
    };
    let Some(reader) = reader else {
        doc.add(attr, not_indexed::CONTENT_MISSING, options(def, false));
        return Ok(true);
    };

    let text = if reader.is_plain_utf8() {
        reader.to_text()
    } else {
        let Some(transformer) = ctx.content.transformer(&reader.mimetype, MIMETYPE_TEXT_PLAIN) else {
            doc.add(attr, not_indexed::NO_TRANSFORMATION, options(def, false));
            return Ok(false);
        };
        if ctx.atomic_only && transformer.cost() > ctx.max_transformation_cost {
            return Ok(false);
        }
        match transformer.transform(&reader) {
            Ok(text) => text,
            Err(err) if ctx.atomic_only => {
                tracing::warn!(node = %ctx.node, property = %def.name, error = %err, "content transformation failed, deferring");
                return Ok(false);
            }
            Err(err) => {
                tracing::warn!(node = %ctx.node, property = %def.name, error = %err, "content transformation failed");
                doc.add(attr, not_indexed::TRANSFORMATION_FAILED, options(def, false));
                return Ok(true);
            }
        }
    };

    doc.add(attr, with_locale(locale, &text), FieldOptions { stored: false, ..options(def, true) });
    Ok(true)
}

fn emit_ml_text(
    ctx: &EmitContext<'_>,
    def: &PropertyDefinition,
    attr: &str,
    value: &PropertyValue,
    doc: &mut Document,
) -> bool {
    let entries: Vec<(String, String)> = match value {
        PropertyValue::MlText(values) => values.iter().map(|(l, t)| (l.clone(), t.clone())).collect(),
        other => match convert(def, attr, other, doc) {
            Some(text) => vec![(ctx.locale.to_string(), text)],
            None => return true,
        },
    };

    for (locale, text) in entries {
        let tokenized = matches!(def.tokenise, TokeniseMode::True | TokeniseMode::Both);
        let untokenized = matches!(def.tokenise, TokeniseMode::False | TokeniseMode::Both);
        if tokenized {
            doc.add(attr, with_locale(&locale, &text), options(def, true));
        }
        if untokenized {
            doc.add(attr, format!("{{{}}}{}", locale, text), options(def, false));
            doc.add(format!("{}.{}.sort", attr, locale), text, FieldOptions::UNSTORED_KEYWORD);
        }
    }
    true
}

fn emit_text(
    ctx: &EmitContext<'_>,
    def: &PropertyDefinition,
    attr: &str,
    value: &PropertyValue,
    doc: &mut Document,
) -> bool {
    let Some(text) = convert(def, attr, value, doc) else {
        return true;
    };
    match def.tokenise {
        TokeniseMode::True => doc.add(attr, with_locale(ctx.locale, &text), options(def, true)),
        TokeniseMode::False => {
            doc.add(attr, text.as_str(), options(def, false));
            doc.add(format!("{}.{}.sort", attr, ctx.locale), text, FieldOptions::UNSTORED_KEYWORD);
        }
        TokeniseMode::Both => {
            doc.add(attr, with_locale(ctx.locale, &text), options(def, true));
            doc.add(format!("{}.sort", attr), text, FieldOptions::UNSTORED_KEYWORD);
        }
    }
    true
}

fn emit_datetime(def: &PropertyDefinition, attr: &str, value: &PropertyValue, doc: &mut Document) -> bool {
    let PropertyValue::DateTime(dt) = value else {
        return emit_default(def, attr, value, doc);
    };
    let sortable = dt.format(DATE_SORT_FORMAT).to_string();
    match def.tokenise {
        TokeniseMode::True => doc.add(attr, dt.to_rfc3339(), options(def, true)),
        TokeniseMode::False => doc.add(attr, sortable, options(def, false)),
        TokeniseMode::Both => {
            doc.add(attr, dt.to_rfc3339(), options(def, true));
            doc.add(format!("{}.sort", attr), sortable, FieldOptions::UNSTORED_KEYWORD);
        }
    }
    true
}

fn emit_default(def: &PropertyDefinition, attr: &str, value: &PropertyValue, doc: &mut Document) -> bool {
    let Some(text) = convert(def, attr, value, doc) else {
        return true;
    };
    match def.tokenise {
        TokeniseMode::True => doc.add(attr, text, options(def, true)),
        TokeniseMode::False => doc.add(attr, text, options(def, false)),
        TokeniseMode::Both => {
            doc.add(attr, text.as_str(), options(def, true));
            doc.add(format!("{}.sort", attr), text, FieldOptions::UNSTORED_KEYWORD);
        }
    }
    true
}

/// Definition used for properties the dictionary does not know.
pub fn residual_definition(name: &QName) -> PropertyDefinition {
    PropertyDefinition::new(name.clone(), DataType::Other)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use chrono::TimeZone;
    use crate::content::memory::{InMemoryContentStore, LossyTextTransformer};
    use crate::content::service::ContentReader;
    use crate::core::types::StoreRef;
    use crate::schema::model;

    fn node() -> NodeRef {
        NodeRef::new(StoreRef::new("workspace", "s"), "n")
    }

    fn ctx<'a>(node: &'a NodeRef, content: &'a InMemoryContentStore, atomic_only: bool) -> EmitContext<'a> {
        EmitContext {
            node,
            content,
            locale: "en",
            atomic_only,
            max_transformation_cost: 20,
        }
    }

    #[test]
    fn non_atomic_property_is_deferred_in_atomic_pass() {
        let node = node();
        let content = InMemoryContentStore::new();
        let def = PropertyDefinition::new(model::prop_description(), DataType::Text).with_atomic(false);
        let mut doc = Document::new();

        let done = PropertyHandler::Text
            .emit(&ctx(&node, &content, true), &def, &PropertyValue::text("later"), &mut doc)
            .unwrap();
        assert!(!done);
        assert!(doc.fields.is_empty());

        let done = PropertyHandler::Text
            .emit(&ctx(&node, &content, false), &def, &PropertyValue::text("later"), &mut doc)
            .unwrap();
        assert!(done);
        assert_eq!(doc.get("@{cm}description"), Some(with_locale("en", "later").as_str()));
    }

    #[test]
    fn ml_text_both_emits_tokenized_and_exact_forms() {
        let node = node();
        let content = InMemoryContentStore::new();
        let def = PropertyDefinition::new(model::prop_title(), DataType::MlText).with_tokenise(TokeniseMode::Both);
        let mut values = BTreeMap::new();
        values.insert("fr".to_string(), "Bonjour".to_string());
        let mut doc = Document::new();

        PropertyHandler::MultilingualText
            .emit(&ctx(&node, &content, false), &def, &PropertyValue::MlText(values), &mut doc)
            .unwrap();

        let titles: Vec<&str> = doc.get_all("@{cm}title").collect();
        assert_eq!(titles, vec!["\u{0}fr\u{0}Bonjour", "{fr}Bonjour"]);
        assert_eq!(doc.get("@{cm}title.fr.sort"), Some("Bonjour"));
    }

    #[test]
    fn unconvertible_value_is_marked() {
        let node = node();
        let content = InMemoryContentStore::new();
        let def = PropertyDefinition::new(QName::new("cm", "blob"), DataType::Other);
        let mut doc = Document::new();

        let done = PropertyHandler::Default
            .emit(&ctx(&node, &content, false), &def, &PropertyValue::Binary(vec![1, 2]), &mut doc)
            .unwrap();
        assert!(done);
        assert_eq!(doc.get("@{cm}blob"), Some(not_indexed::NO_TYPE_CONVERSION));
    }

    #[test]
    fn datetime_false_uses_sortable_form() {
        let node = node();
        let content = InMemoryContentStore::new();
        let def = PropertyDefinition::new(model::prop_created(), DataType::DateTime).with_tokenise(TokeniseMode::False);
        let dt = chrono::Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        let mut doc = Document::new();

        PropertyHandler::DateTime
            .emit(&ctx(&node, &content, false), &def, &PropertyValue::DateTime(dt), &mut doc)
            .unwrap();
        assert_eq!(doc.get("@{cm}created"), Some("2024-03-01T12:30:00.000"));
    }

    #[test]
    fn content_without_transformer_is_deferred_and_marked() {
        let node = node();
        let content = InMemoryContentStore::new();
        content.put(&node, &model::prop_content(), ContentReader::new("application/pdf", "UTF-8", b"%PDF".to_vec()));
        let def = PropertyDefinition::new(model::prop_content(), DataType::Content).with_atomic(true);
        let value = PropertyValue::Content(ContentData::new("store://1", "application/pdf", 4));
        let mut doc = Document::new();

        let done = PropertyHandler::Content
            .emit(&ctx(&node, &content, true), &def, &value, &mut doc)
            .unwrap();
        assert!(!done);
        assert_eq!(doc.get("@{cm}content"), Some(not_indexed::NO_TRANSFORMATION));
        assert_eq!(doc.get("@{cm}content.mimetype"), Some("application/pdf"));
        assert_eq!(doc.get("@{cm}content.locale"), Some("en"));
    }

    #[test]
    fn expensive_transformer_waits_for_full_pass() {
        let node = node();
        let content = InMemoryContentStore::new();
        content.put(&node, &model::prop_content(), ContentReader::new("text/html", "UTF-8", b"<p>hi</p>".to_vec()));
        content.register_transformer("text/html", Arc::new(LossyTextTransformer { cost: 500 }));
        let def = PropertyDefinition::new(model::prop_content(), DataType::Content).with_atomic(true);
        let value = PropertyValue::Content(ContentData::new("store://2", "text/html", 9));

        let mut doc = Document::new();
        let done = PropertyHandler::Content
            .emit(&ctx(&node, &content, true), &def, &value, &mut doc)
            .unwrap();
        assert!(!done);
        assert!(doc.get("@{cm}content").is_none());

        let mut doc = Document::new();
        let done = PropertyHandler::Content
            .emit(&ctx(&node, &content, false), &def, &value, &mut doc)
            .unwrap();
        assert!(done);
        assert!(doc.get("@{cm}content").is_some());
    }

    #[test]
    fn missing_bytes_are_marked() {
        let node = node();
        let content = InMemoryContentStore::new();
        let def = PropertyDefinition::new(model::prop_content(), DataType::Content);
        let value = PropertyValue::Content(ContentData::new("store://3", "text/plain", 0));
        let mut doc = Document::new();

        let done = PropertyHandler::Content
            .emit(&ctx(&node, &content, false), &def, &value, &mut doc)
            .unwrap();
        assert!(done);
        assert_eq!(doc.get("@{cm}content"), Some(not_indexed::CONTENT_MISSING));
    }
}
