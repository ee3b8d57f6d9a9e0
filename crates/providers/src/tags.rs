use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Tags of one post grouped by category.
///
/// Categories keep the order in which the service returned them, and so do
/// the tags inside each category. The category names are not validated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostTagSet {
    categories: Vec<(String, Vec<String>)>,
}

impl PostTagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the tags of `category`, replacing an earlier entry in place.
    pub fn insert(&mut self, category: impl Into<String>, tags: Vec<String>) {
        let category = category.into();
        match self.categories.iter_mut().find(|(c, _)| *c == category) {
            Some((_, existing)) => *existing = tags,
            None => self.categories.push((category, tags)),
        }
    }

    pub fn get(&self, category: &str) -> Option<&[String]> {
        self.categories
            .iter()
            .find(|(c, _)| c == category)
            .map(|(_, tags)| tags.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.categories
            .iter()
            .map(|(c, tags)| (c.as_str(), tags.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

impl<C, T> FromIterator<(C, Vec<T>)> for PostTagSet
where
    C: Into<String>,
    T: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (C, Vec<T>)>>(iter: I) -> Self {
        let mut set = PostTagSet::new();
        for (category, tags) in iter {
            set.insert(category, tags.into_iter().map(Into::into).collect());
        }
        set
    }
}

impl Serialize for PostTagSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.categories.len()))?;
        for (category, tags) in &self.categories {
            map.serialize_entry(category, tags)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for PostTagSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TagSetVisitor;

        impl<'de> Visitor<'de> for TagSetVisitor {
            type Value = PostTagSet;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of tag category to a list of tags")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<PostTagSet, A::Error> {
                let mut set = PostTagSet::new();
                while let Some((category, tags)) = access.next_entry::<String, Vec<String>>()? {
                    set.insert(category, tags);
                }
                Ok(set)
            }
        }

        deserializer.deserialize_map(TagSetVisitor)
    }
}
