use std::collections::HashMap;
use roaring::RoaringBitmap;
use crate::analysis::analyzer::Analyzer;
use crate::core::types::DocId;
use crate::index::document::{fields, DeletionScope, DocType, Document};

/// Term representation: field plus indexed text
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Term {
    pub field: String,
    pub text: String,
}

impl Term {
    pub fn new(field: &str, text: &str) -> Self {
        Term {
            field: field.to_string(),
            text: text.to_string(),
        }
    }
}

/// In-memory inverted index over one segment or one delta.
///
/// Documents are addressed by insertion ordinal; postings are roaring
/// bitmaps of ordinals. Removal is the caller's job (tombstone bitmaps).
#[derive(Debug, Clone, Default)]
pub struct InvertedIndex {
    docs: Vec<Document>,
    postings: HashMap<Term, RoaringBitmap>,
    total_terms: usize,
}

impl InvertedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_documents(docs: Vec<Document>, analyzer: &Analyzer) -> Self {
        let mut index = InvertedIndex::new();
        for doc in docs {
            index.add_document(doc, analyzer);
        }
        index
    }

    pub fn add_document(&mut self, doc: Document, analyzer: &Analyzer) -> DocId {
        let id = self.docs.len() as u32;

        for field in doc.fields.iter().filter(|f| f.options.indexed) {
            if field.options.tokenized {
                for token in analyzer.analyze(&field.value) {
                    self.insert(Term { field: field.name.clone(), text: token.text }, id);
                }
            } else {
                self.insert(Term::new(&field.name, &field.value), id);
            }
        }

        self.docs.push(doc);
        DocId(id)
    }

    fn insert(&mut self, term: Term, id: u32) {
        let docs = self.postings.entry(term).or_default();
        if docs.insert(id) {
            self.total_terms += 1;
        }
    }

    pub fn term_docs(&self, field: &str, text: &str) -> RoaringBitmap {
        self.postings
            .get(&Term::new(field, text))
            .cloned()
            .unwrap_or_default()
    }

    /// Documents of `node_id` that a deletion of the given scope masks.
    pub fn scope_docs(&self, node_id: &str, scope: DeletionScope) -> RoaringBitmap {
        let mut types = RoaringBitmap::new();
        for doc_type in [DocType::Node, DocType::Container, DocType::Marker] {
            if scope.covers(doc_type) {
                types |= self.term_docs(fields::DOCTYPE, doc_type.as_str());
            }
        }
        self.term_docs(fields::ID, node_id) & types
    }

    pub fn document(&self, id: DocId) -> Option<&Document> {
        self.docs.get(id.0 as usize)
    }

    pub fn documents(&self) -> &[Document] {
        &self.docs
    }

    pub fn all_docs(&self) -> RoaringBitmap {
        let mut all = RoaringBitmap::new();
        all.insert_range(0..self.docs.len() as u32);
        all
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn distinct_terms(&self) -> usize {
        self.postings.len()
    }

    pub fn total_terms(&self) -> usize {
        self.total_terms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::document::FieldOptions;

    #[test]
    fn keyword_and_text_fields_index_differently() {
        let analyzer = Analyzer::standard();
        let mut index = InvertedIndex::new();

        let mut doc = Document::of_type(DocType::Node, "workspace://s/1");
        doc.add("@{cm}name", "Budget Plan", FieldOptions::TEXT);
        doc.add(fields::TYPE, "{cm}content", FieldOptions::KEYWORD);
        let id = index.add_document(doc, &analyzer);

        assert!(index.term_docs("@{cm}name", "budget").contains(id.0));
        assert!(index.term_docs("@{cm}name", "Budget Plan").is_empty());
        assert!(index.term_docs(fields::TYPE, "{cm}content").contains(id.0));
        assert_eq!(index.all_docs().len(), 1);
    }

    #[test]
    fn deletion_scopes_split_leaf_and_container_documents() {
        let analyzer = Analyzer::standard();
        let mut index = InvertedIndex::new();
        let leaf = index.add_document(Document::of_type(DocType::Node, "n"), &analyzer);
        let container = index.add_document(Document::of_type(DocType::Container, "n"), &analyzer);
        let marker = index.add_document(Document::of_type(DocType::Marker, "n"), &analyzer);
        index.add_document(Document::of_type(DocType::Node, "other"), &analyzer);

        let leaves = index.scope_docs("n", DeletionScope::Leaf);
        assert_eq!(leaves.iter().collect::<Vec<_>>(), vec![leaf.0, marker.0]);
        let containers = index.scope_docs("n", DeletionScope::Container);
        assert_eq!(containers.iter().collect::<Vec<_>>(), vec![container.0]);
    }

    #[test]
    fn unindexed_fields_are_only_kept_on_the_document() {
        let analyzer = Analyzer::standard();
        let mut index = InvertedIndex::new();
        let mut doc = Document::new();
        doc.add("hidden", "value", FieldOptions { stored: true, indexed: false, tokenized: false });
        let id = index.add_document(doc, &analyzer);

        assert!(index.term_docs("hidden", "value").is_empty());
        assert_eq!(index.document(id).unwrap().get("hidden"), Some("value"));
    }
}
