use std::collections::BTreeMap;

/// Tags added by field collection tooling that never belong in map data.
pub const CLIENT_ARTIFACT_KEYS: [&str; 2] = ["title", "label"];

/// Keys that describe processing rather than the mapped object. They are ignored when deciding
/// whether two tag sets are identical.
const BOOKKEEPING_KEYS: [&str; 3] = ["debug", "title", "label"];

/// The tags compared when deciding whether two features denote the same object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityKey {
    Name,
    Ref,
    UsfsRef,
}

impl IdentityKey {
    pub const ALL: [IdentityKey; 3] = [IdentityKey::Name, IdentityKey::Ref, IdentityKey::UsfsRef];

    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityKey::Name => "name",
            IdentityKey::Ref => "ref",
            IdentityKey::UsfsRef => "ref:usfs",
        }
    }

    /// `ref` and `ref:usfs` form the reference family.
    pub fn is_ref(&self) -> bool {
        matches!(self, IdentityKey::Ref | IdentityKey::UsfsRef)
    }
}

/// Tags of a feature. The well-known keys live in dedicated fields, everything else is passed
/// through untouched in `other`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tags {
    pub id: Option<i64>,
    pub version: Option<u32>,
    pub name: Option<String>,
    pub reference: Option<String>,
    pub usfs_ref: Option<String>,
    pub highway: Option<String>,
    pub other: BTreeMap<String, String>,
}

impl Tags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build tags from key/value pairs, routing each key like [`Tags::insert`].
    pub fn from_pairs<K: AsRef<str>, V: Into<String>>(
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        let mut tags = Self::new();
        for (key, value) in pairs {
            tags.insert(key.as_ref(), value);
        }
        tags
    }

    pub fn identity(&self, key: IdentityKey) -> Option<&str> {
        match key {
            IdentityKey::Name => self.name.as_deref(),
            IdentityKey::Ref => self.reference.as_deref(),
            IdentityKey::UsfsRef => self.usfs_ref.as_deref(),
        }
    }

    pub fn set_identity(&mut self, key: IdentityKey, value: Option<String>) {
        match key {
            IdentityKey::Name => self.name = value,
            IdentityKey::Ref => self.reference = value,
            IdentityKey::UsfsRef => self.usfs_ref = value,
        }
    }

    /// Insert a tag. `id` and `version` are parsed as numbers; values that do not parse are kept
    /// in the passthrough bag.
    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match key {
            "id" => match value.trim().parse() {
                Ok(id) => self.id = Some(id),
                Err(_) => {
                    self.other.insert(key.to_string(), value);
                }
            },
            "version" => match value.trim().parse() {
                Ok(version) => self.version = Some(version),
                Err(_) => {
                    self.other.insert(key.to_string(), value);
                }
            },
            "name" => self.name = Some(value),
            "ref" => self.reference = Some(value),
            "ref:usfs" => self.usfs_ref = Some(value),
            "highway" => self.highway = Some(value),
            _ => {
                self.other.insert(key.to_string(), value);
            }
        }
    }

    /// Look up a tag value by key. `id` and `version` are not tags, use the fields.
    pub fn get(&self, key: &str) -> Option<&str> {
        match key {
            "name" => self.name.as_deref(),
            "ref" => self.reference.as_deref(),
            "ref:usfs" => self.usfs_ref.as_deref(),
            "highway" => self.highway.as_deref(),
            _ => self.other.get(key).map(|value| value.as_str()),
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// All tags as key/value pairs, well-known keys first. `id` and `version` are attributes of
    /// the OSM object and are not included.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        let well_known = [
            ("name", &self.name),
            ("ref", &self.reference),
            ("ref:usfs", &self.usfs_ref),
            ("highway", &self.highway),
        ];
        well_known
            .into_iter()
            .filter_map(|(key, value)| value.as_deref().map(|value| (key, value)))
            .chain(
                self.other
                    .iter()
                    .map(|(key, value)| (key.as_str(), value.as_str())),
            )
    }

    /// Whether both tag sets describe the object the same way, ignoring `id`, `version` and the
    /// bookkeeping keys.
    pub fn same_content(&self, other: &Tags) -> bool {
        let content = |tags: &Tags| -> BTreeMap<String, String> {
            tags.iter()
                .filter(|(key, _)| !BOOKKEEPING_KEYS.contains(key))
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect()
        };
        content(self) == content(other)
    }
}
