//! Object metadata and attributes.

use chrono::{DateTime, Utc};
use object_store::{Attribute, AttributeValue, Attributes, ObjectMeta};

/// Metadata fields that can be attached to an object when it is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataField {
    ContentType,
    ContentLanguage,
    ContentEncoding,
    ContentDisposition,
    CacheControl,
}

impl MetadataField {
    fn attribute(self) -> Attribute {
        match self {
            MetadataField::ContentType => Attribute::ContentType,
            MetadataField::ContentLanguage => Attribute::ContentLanguage,
            MetadataField::ContentEncoding => Attribute::ContentEncoding,
            MetadataField::ContentDisposition => Attribute::ContentDisposition,
            MetadataField::CacheControl => Attribute::CacheControl,
        }
    }
}

/// Pending metadata for a write.
///
/// Unset fields are left out of the upload so the store applies its own
/// default. An empty string is a value like any other.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub content_type: Option<String>,
    pub content_language: Option<String>,
    pub content_encoding: Option<String>,
    pub content_disposition: Option<String>,
    pub cache_control: Option<String>,
}

impl ObjectMetadata {
    pub fn set(&mut self, field: MetadataField, value: impl Into<String>) {
        *self.slot(field) = Some(value.into());
    }

    pub fn get(&self, field: MetadataField) -> Option<&str> {
        match field {
            MetadataField::ContentType => self.content_type.as_deref(),
            MetadataField::ContentLanguage => self.content_language.as_deref(),
            MetadataField::ContentEncoding => self.content_encoding.as_deref(),
            MetadataField::ContentDisposition => self.content_disposition.as_deref(),
            MetadataField::CacheControl => self.cache_control.as_deref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn slot(&mut self, field: MetadataField) -> &mut Option<String> {
        match field {
            MetadataField::ContentType => &mut self.content_type,
            MetadataField::ContentLanguage => &mut self.content_language,
            MetadataField::ContentEncoding => &mut self.content_encoding,
            MetadataField::ContentDisposition => &mut self.content_disposition,
            MetadataField::CacheControl => &mut self.cache_control,
        }
    }

    fn fields(&self) -> impl Iterator<Item = (MetadataField, &str)> {
        [
            MetadataField::ContentType,
            MetadataField::ContentLanguage,
            MetadataField::ContentEncoding,
            MetadataField::ContentDisposition,
            MetadataField::CacheControl,
        ]
        .into_iter()
        .filter_map(move |field| self.get(field).map(|value| (field, value)))
    }
}

impl From<&ObjectMetadata> for Attributes {
    fn from(metadata: &ObjectMetadata) -> Self {
        let mut attributes = Attributes::new();
        for (field, value) in metadata.fields() {
            attributes.insert(field.attribute(), AttributeValue::from(value.to_string()));
        }
        attributes
    }
}

impl From<&Attributes> for ObjectMetadata {
    fn from(attributes: &Attributes) -> Self {
        let mut metadata = ObjectMetadata::default();
        for field in [
            MetadataField::ContentType,
            MetadataField::ContentLanguage,
            MetadataField::ContentEncoding,
            MetadataField::ContentDisposition,
            MetadataField::CacheControl,
        ] {
            if let Some(value) = attributes.get(&field.attribute()) {
                metadata.set(field, value.to_string());
            }
        }
        metadata
    }
}

/// Attributes of a stored object, as returned by a stat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectAttributes {
    pub size_bytes: u64,
    pub etag: Option<String>,
    pub last_modified: DateTime<Utc>,
    pub metadata: ObjectMetadata,
}

impl ObjectAttributes {
    pub(crate) fn new(meta: ObjectMeta, attributes: &Attributes) -> Self {
        Self {
            size_bytes: meta.size as u64,
            etag: meta.e_tag,
            last_modified: meta.last_modified,
            metadata: attributes.into(),
        }
    }
}
