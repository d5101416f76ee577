//! Tag References
//!
//! Operations accept tags by name, by id or as already-loaded records.
//! Each operation normalises its input to `Tag`s before touching links.

use super::tag::Tag;

/// A single way of pointing at a tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagReference {
    Name(String),
    Identity(i64),
    Resolved(Tag),
}

impl TagReference {
    pub fn as_name(&self) -> Option<&str> {
        match self {
            TagReference::Name(name) => Some(name),
            _ => None,
        }
    }

    /// Id when known without a lookup
    pub fn known_id(&self) -> Option<i64> {
        match self {
            TagReference::Identity(id) => Some(*id),
            TagReference::Resolved(tag) => Some(tag.id),
            TagReference::Name(_) => None,
        }
    }
}

impl From<&str> for TagReference {
    fn from(name: &str) -> Self {
        TagReference::Name(name.to_string())
    }
}

impl From<String> for TagReference {
    fn from(name: String) -> Self {
        TagReference::Name(name)
    }
}

impl From<&String> for TagReference {
    fn from(name: &String) -> Self {
        TagReference::Name(name.clone())
    }
}

impl From<i64> for TagReference {
    fn from(id: i64) -> Self {
        TagReference::Identity(id)
    }
}

impl From<Tag> for TagReference {
    fn from(tag: Tag) -> Self {
        TagReference::Resolved(tag)
    }
}

impl From<&Tag> for TagReference {
    fn from(tag: &Tag) -> Self {
        TagReference::Resolved(tag.clone())
    }
}

/// One reference or a sequence of them
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagValues {
    One(TagReference),
    Many(Vec<TagReference>),
}

impl TagValues {
    pub fn into_references(self) -> Vec<TagReference> {
        match self {
            TagValues::One(reference) => vec![reference],
            TagValues::Many(references) => references,
        }
    }

    pub fn is_single(&self) -> bool {
        matches!(self, TagValues::One(_))
    }
}

impl From<TagReference> for TagValues {
    fn from(reference: TagReference) -> Self {
        TagValues::One(reference)
    }
}

impl From<&str> for TagValues {
    fn from(name: &str) -> Self {
        TagValues::One(name.into())
    }
}

impl From<String> for TagValues {
    fn from(name: String) -> Self {
        TagValues::One(name.into())
    }
}

impl From<i64> for TagValues {
    fn from(id: i64) -> Self {
        TagValues::One(id.into())
    }
}

impl From<Tag> for TagValues {
    fn from(tag: Tag) -> Self {
        TagValues::One(tag.into())
    }
}

impl From<&Tag> for TagValues {
    fn from(tag: &Tag) -> Self {
        TagValues::One(tag.into())
    }
}

impl<T: Into<TagReference>> From<Vec<T>> for TagValues {
    fn from(values: Vec<T>) -> Self {
        TagValues::Many(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<TagReference> + Clone> From<&Vec<T>> for TagValues {
    fn from(values: &Vec<T>) -> Self {
        TagValues::Many(values.iter().cloned().map(Into::into).collect())
    }
}

impl<T: Into<TagReference> + Clone> From<&[T]> for TagValues {
    fn from(values: &[T]) -> Self {
        TagValues::Many(values.iter().cloned().map(Into::into).collect())
    }
}

impl<T: Into<TagReference>, const N: usize> From<[T; N]> for TagValues {
    fn from(values: [T; N]) -> Self {
        TagValues::Many(values.into_iter().map(Into::into).collect())
    }
}

/// Result of a batch find-or-create, shaped like its input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagBatch {
    One(Tag),
    Many(Vec<Tag>),
}

impl TagBatch {
    pub fn into_vec(self) -> Vec<Tag> {
        match self {
            TagBatch::One(tag) => vec![tag],
            TagBatch::Many(tags) => tags,
        }
    }

    /// The single tag, or the first of many
    pub fn first(self) -> Option<Tag> {
        self.into_vec().into_iter().next()
    }

    pub fn len(&self) -> usize {
        match self {
            TagBatch::One(_) => 1,
            TagBatch::Many(tags) => tags.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
