//! JSON:API document model and builder.
//!
//! The types in this module serialize to the JSON:API wire format with
//! members in a fixed order, so two renderings of the same data are
//! byte-identical. [`DocumentBuilder`] turns stored records into documents,
//! resolving `include` requests into a de-duplicated `included` array.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::{Map, Value};
use storefront_persistence::core::ResourceStorage;
use storefront_persistence::types::StoredRecord;

use crate::error::JsonApiResult;
use crate::projector::project;
use crate::query::PageRequest;
use crate::registry::{Cardinality, RelationshipDef, ResourceSchema, SchemaRegistry};

/// Sparse fieldsets keyed by resource type.
pub type Fieldsets = BTreeMap<String, Vec<String>>;

/// A `{id, type}` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResourceIdentifier {
    pub id: String,
    #[serde(rename = "type")]
    pub resource_type: String,
}

impl ResourceIdentifier {
    pub fn of(record: &StoredRecord) -> Self {
        Self {
            id: record.id().to_string(),
            resource_type: record.resource_type().to_string(),
        }
    }
}

/// `links` of a resource object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceLinks {
    #[serde(rename = "self")]
    pub self_link: String,
}

/// `links` of a relationship object and of a relationship document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationshipLinks {
    #[serde(rename = "self")]
    pub self_link: String,
    pub related: String,
}

/// Resource linkage of a relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Linkage {
    ToOne(Option<ResourceIdentifier>),
    ToMany(Vec<ResourceIdentifier>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationshipObject {
    pub links: RelationshipLinks,
    /// Only present when the relationship was included.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Linkage>,
}

/// Relationship objects in schema declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relationships(pub Vec<(String, RelationshipObject)>);

impl Relationships {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&RelationshipObject> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, r)| r)
    }
}

impl Serialize for Relationships {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, relationship) in &self.0 {
            map.serialize_entry(name, relationship)?;
        }
        map.end()
    }
}

/// A rendered resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceObject {
    pub id: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub attributes: Map<String, Value>,
    #[serde(skip_serializing_if = "Relationships::is_empty")]
    pub relationships: Relationships,
    pub links: ResourceLinks,
}

/// Primary data of a document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PrimaryData {
    Resource(Box<ResourceObject>),
    Collection(Vec<ResourceObject>),
    Identifier(ResourceIdentifier),
    Identifiers(Vec<ResourceIdentifier>),
    Null,
}

/// Pagination links. `prev` and `next` are `null` at the edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageLinks {
    pub first: String,
    pub last: String,
    pub prev: Option<String>,
    pub next: Option<String>,
}

/// Top-level `links` of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DocumentLinks {
    Page(PageLinks),
    Relationship(RelationshipLinks),
}

/// Pagination metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub current_page: usize,
    pub from: Option<usize>,
    pub last_page: usize,
    pub path: String,
    pub per_page: usize,
    pub to: Option<usize>,
    pub total: usize,
}

/// A top-level JSON:API document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub data: PrimaryData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub included: Option<Vec<ResourceObject>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<DocumentLinks>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<PageMeta>,
}

impl Document {
    fn new(data: PrimaryData) -> Self {
        Self {
            data,
            included: None,
            links: None,
            meta: None,
        }
    }

    /// The single primary resource, if the document carries one.
    pub fn resource(&self) -> Option<&ResourceObject> {
        match &self.data {
            PrimaryData::Resource(resource) => Some(resource),
            _ => None,
        }
    }

    /// The primary resources of a collection document.
    pub fn resources(&self) -> &[ResourceObject] {
        match &self.data {
            PrimaryData::Collection(items) => items,
            PrimaryData::Resource(resource) => std::slice::from_ref(resource.as_ref()),
            _ => &[],
        }
    }
}

/// A page of a collection together with the match count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageInfo {
    pub request: PageRequest,
    pub total: usize,
}

impl PageInfo {
    pub fn last_page(&self) -> usize {
        self.total.div_ceil(self.request.size).max(1)
    }
}

/// Related records resolved for included relationships, keyed by
/// (primary record index, relationship name).
type RelatedCache = HashMap<(usize, String), Vec<StoredRecord>>;

/// Renders stored records as JSON:API documents.
pub struct DocumentBuilder<'a, S: ?Sized> {
    storage: &'a S,
    registry: &'a SchemaRegistry,
    base_url: &'a str,
}

impl<'a, S> DocumentBuilder<'a, S>
where
    S: ResourceStorage + ?Sized,
{
    /// `base_url` is the absolute API root, e.g. `http://localhost:8080/api/v1`.
    pub fn new(storage: &'a S, registry: &'a SchemaRegistry, base_url: &'a str) -> Self {
        Self {
            storage,
            registry,
            base_url: base_url.trim_end_matches('/'),
        }
    }

    fn resource_url(&self, resource_type: &str, id: &str) -> String {
        format!("{}/{}/{}", self.base_url, resource_type, id)
    }

    fn relationship_links(&self, owner: &StoredRecord, name: &str) -> RelationshipLinks {
        let url = self.resource_url(owner.resource_type(), owner.id());
        RelationshipLinks {
            self_link: format!("{}/relationships/{}", url, name),
            related: format!("{}/{}", url, name),
        }
    }

    /// Resolves every included relationship of every primary record.
    async fn resolve_includes(
        &self,
        records: &[StoredRecord],
        schema: &ResourceSchema,
        include: &[String],
    ) -> JsonApiResult<RelatedCache> {
        let mut cache = RelatedCache::new();
        for name in include {
            let Some(relationship) = schema.relationship(name) else {
                continue;
            };
            for (index, record) in records.iter().enumerate() {
                let related = self
                    .storage
                    .related(record, &relationship.accessor)
                    .await?;
                cache.insert((index, name.clone()), related);
            }
        }
        Ok(cache)
    }

    /// Builds one resource object. `data_for` supplies the linkage of the
    /// relationships that were included.
    fn resource_object(
        &self,
        record: &StoredRecord,
        schema: &ResourceSchema,
        fields: &Fieldsets,
        data_for: impl Fn(&RelationshipDef) -> Option<Linkage>,
    ) -> ResourceObject {
        let relationships = schema
            .relationships
            .iter()
            .map(|relationship| {
                (
                    relationship.name.clone(),
                    RelationshipObject {
                        links: self.relationship_links(record, &relationship.name),
                        data: data_for(relationship),
                    },
                )
            })
            .collect();

        ResourceObject {
            id: record.id().to_string(),
            resource_type: record.resource_type().to_string(),
            attributes: project(
                record,
                schema,
                fields.get(record.resource_type()).map(Vec::as_slice),
            ),
            relationships: Relationships(relationships),
            links: ResourceLinks {
                self_link: self.resource_url(record.resource_type(), record.id()),
            },
        }
    }

    /// Renders a record without linkage data.
    fn plain_object(&self, record: &StoredRecord, fields: &Fieldsets) -> JsonApiResult<ResourceObject> {
        let schema = self.registry.get(record.resource_type())?;
        Ok(self.resource_object(record, schema, fields, |_| None))
    }

    fn render_primary(
        &self,
        records: &[StoredRecord],
        schema: &ResourceSchema,
        fields: &Fieldsets,
        cache: &RelatedCache,
    ) -> Vec<ResourceObject> {
        records
            .iter()
            .enumerate()
            .map(|(index, record)| {
                self.resource_object(record, schema, fields, |relationship| {
                    cache
                        .get(&(index, relationship.name.clone()))
                        .map(|related| linkage(relationship, related))
                })
            })
            .collect()
    }

    /// Collects related records into `included`, in include order then
    /// primary data order. The first occurrence of a `(type, id)` wins.
    fn render_included(
        &self,
        records: &[StoredRecord],
        include: &[String],
        fields: &Fieldsets,
        cache: &RelatedCache,
    ) -> JsonApiResult<Vec<ResourceObject>> {
        let mut seen = HashSet::new();
        let mut included = Vec::new();
        for name in include {
            for index in 0..records.len() {
                let Some(related) = cache.get(&(index, name.clone())) else {
                    continue;
                };
                for record in related {
                    if seen.insert(ResourceIdentifier::of(record)) {
                        included.push(self.plain_object(record, fields)?);
                    }
                }
            }
        }
        Ok(included)
    }

    /// Resolves and renders the `included` member for a set of primary records.
    pub async fn build_included(
        &self,
        primary: &[StoredRecord],
        schema: &ResourceSchema,
        include: &[String],
        fields: &Fieldsets,
    ) -> JsonApiResult<Vec<ResourceObject>> {
        let cache = self.resolve_includes(primary, schema, include).await?;
        self.render_included(primary, include, fields, &cache)
    }

    /// A document whose primary data is one resource.
    pub async fn build_single(
        &self,
        record: &StoredRecord,
        include: &[String],
        fields: &Fieldsets,
    ) -> JsonApiResult<Document> {
        let schema = self.registry.get(record.resource_type())?;
        let records = std::slice::from_ref(record);
        let cache = self.resolve_includes(records, schema, include).await?;

        let mut data = self.render_primary(records, schema, fields, &cache);
        let mut document = match data.pop() {
            Some(object) => Document::new(PrimaryData::Resource(Box::new(object))),
            None => Document::new(PrimaryData::Null),
        };
        if !include.is_empty() {
            document.included = Some(self.render_included(records, include, fields, &cache)?);
        }
        Ok(document)
    }

    /// A document whose primary data is a collection. Records keep their order.
    pub async fn build_collection(
        &self,
        resource_type: &str,
        records: &[StoredRecord],
        include: &[String],
        fields: &Fieldsets,
        page: Option<PageInfo>,
    ) -> JsonApiResult<Document> {
        let schema = self.registry.get(resource_type)?;
        let cache = self.resolve_includes(records, schema, include).await?;

        let mut document = Document::new(PrimaryData::Collection(
            self.render_primary(records, schema, fields, &cache),
        ));
        if !include.is_empty() {
            document.included = Some(self.render_included(records, include, fields, &cache)?);
        }
        if let Some(page) = page {
            let path = format!("{}/{}", self.base_url, resource_type);
            document.links = Some(DocumentLinks::Page(page_links(&path, &page)));
            document.meta = Some(page_meta(path, &page, records.len()));
        }
        Ok(document)
    }

    /// Identifiers of the related records plus the relationship links.
    pub async fn build_relationship_document(
        &self,
        owner: &StoredRecord,
        relationship: &RelationshipDef,
    ) -> JsonApiResult<Document> {
        let related = self.storage.related(owner, &relationship.accessor).await?;
        let data = match linkage(relationship, &related) {
            Linkage::ToOne(Some(identifier)) => PrimaryData::Identifier(identifier),
            Linkage::ToOne(None) => PrimaryData::Null,
            Linkage::ToMany(identifiers) => PrimaryData::Identifiers(identifiers),
        };
        let mut document = Document::new(data);
        document.links = Some(DocumentLinks::Relationship(
            self.relationship_links(owner, &relationship.name),
        ));
        Ok(document)
    }

    /// Full resource objects of the related records.
    pub async fn build_related_document(
        &self,
        owner: &StoredRecord,
        relationship: &RelationshipDef,
        fields: &Fieldsets,
    ) -> JsonApiResult<Document> {
        let related = self.storage.related(owner, &relationship.accessor).await?;
        let data = match relationship.cardinality {
            Cardinality::ToOne => match related.first() {
                Some(record) => PrimaryData::Resource(Box::new(self.plain_object(record, fields)?)),
                None => PrimaryData::Null,
            },
            Cardinality::ToMany => PrimaryData::Collection(
                related
                    .iter()
                    .map(|record| self.plain_object(record, fields))
                    .collect::<JsonApiResult<_>>()?,
            ),
        };
        Ok(Document::new(data))
    }
}

fn linkage(relationship: &RelationshipDef, related: &[StoredRecord]) -> Linkage {
    match relationship.cardinality {
        Cardinality::ToOne => Linkage::ToOne(related.first().map(ResourceIdentifier::of)),
        Cardinality::ToMany => Linkage::ToMany(related.iter().map(ResourceIdentifier::of).collect()),
    }
}

fn page_url(path: &str, size: usize, number: usize) -> String {
    format!("{}?page[size]={}&page[number]={}", path, size, number)
}

fn page_links(path: &str, page: &PageInfo) -> PageLinks {
    let size = page.request.size;
    let number = page.request.number;
    let last = page.last_page();
    PageLinks {
        first: page_url(path, size, 1),
        last: page_url(path, size, last),
        prev: (number > 1).then(|| page_url(path, size, (number - 1).min(last))),
        next: (number < last).then(|| page_url(path, size, number + 1)),
    }
}

fn page_meta(path: String, page: &PageInfo, count: usize) -> PageMeta {
    let offset = page.request.offset();
    PageMeta {
        current_page: page.request.number,
        from: (count > 0).then_some(offset + 1),
        last_page: page.last_page(),
        path,
        per_page: page.request.size,
        to: (count > 0).then_some(offset + count),
        total: page.total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(size: usize, number: usize, total: usize) -> PageInfo {
        PageInfo {
            request: PageRequest { size, number },
            total,
        }
    }

    #[test]
    fn test_identifier_key_order() {
        let identifier = ResourceIdentifier {
            id: "1".into(),
            resource_type: "shops".into(),
        };
        assert_eq!(
            serde_json::to_string(&identifier).unwrap(),
            r#"{"id":"1","type":"shops"}"#
        );
    }

    #[test]
    fn test_relationships_keep_order() {
        let object = |n: &str| RelationshipObject {
            links: RelationshipLinks {
                self_link: format!("s/{}", n),
                related: format!("r/{}", n),
            },
            data: None,
        };
        let relationships = Relationships(vec![
            ("shops".into(), object("shops")),
            ("users".into(), object("users")),
        ]);
        let text = serde_json::to_string(&relationships).unwrap();
        assert!(text.find("shops").unwrap() < text.find("users").unwrap());
        assert!(!text.contains("data"));
    }

    #[test]
    fn test_to_one_linkage_null() {
        let object = RelationshipObject {
            links: RelationshipLinks {
                self_link: "s".into(),
                related: "r".into(),
            },
            data: Some(Linkage::ToOne(None)),
        };
        assert_eq!(
            serde_json::to_value(&object).unwrap(),
            json!({"links": {"self": "s", "related": "r"}, "data": null})
        );
    }

    #[test]
    fn test_null_document() {
        let document = Document::new(PrimaryData::Null);
        assert_eq!(serde_json::to_value(&document).unwrap(), json!({"data": null}));
    }

    #[test]
    fn test_page_links_middle() {
        let links = page_links("http://x/api/v1/shops", &page(2, 2, 5));
        assert_eq!(links.first, "http://x/api/v1/shops?page[size]=2&page[number]=1");
        assert_eq!(links.last, "http://x/api/v1/shops?page[size]=2&page[number]=3");
        assert_eq!(
            links.prev.as_deref(),
            Some("http://x/api/v1/shops?page[size]=2&page[number]=1")
        );
        assert_eq!(
            links.next.as_deref(),
            Some("http://x/api/v1/shops?page[size]=2&page[number]=3")
        );
    }

    #[test]
    fn test_page_links_edges() {
        let links = page_links("p", &page(10, 1, 3));
        assert_eq!(links.prev, None);
        assert_eq!(links.next, None);
        assert_eq!(links.last, "p?page[size]=10&page[number]=1");
    }

    #[test]
    fn test_page_meta() {
        let meta = page_meta("p".into(), &page(2, 3, 5), 1);
        assert_eq!(meta.from, Some(5));
        assert_eq!(meta.to, Some(5));
        assert_eq!(meta.last_page, 3);

        let empty = page_meta("p".into(), &page(2, 9, 5), 0);
        assert_eq!(empty.from, None);
        assert_eq!(empty.to, None);
        assert_eq!(page(15, 1, 0).last_page(), 1);
    }
}
