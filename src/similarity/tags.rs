use crate::geofile::tags::{IdentityKey, Tags, CLIENT_ARTIFACT_KEYS};

/// State and county designations in `ref` that sit on top of the forest road number and must
/// never be overwritten by it.
pub const REGIONAL_REF_PREFIXES: [&str; 5] = ["UT", "CR", "WY", "CO", "US"];

/// Values that fuzzily match must also have about the same length, otherwise a single shared word
/// is enough for a ratio in the low 80s.
pub const MAX_LENGTH_DIFFERENCE: usize = 3;

/// An existing `ref:usfs` like "FS 123" differs from "FR 123" only by its prefix. Such changes
/// are not worth keeping the old value for.
const PREFIX_ONLY_SECONDARY: &str = "FS ";
const PREFIX_ONLY_MAX_RATIO: u8 = 90;

/// The tag side of comparing a primary feature with one secondary candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct TagComparison {
    /// Number of identity tag matches, 0 to 3.
    pub hits: u8,
    pub name_ratio: u8,
    /// Best ratio of `ref` and `ref:usfs`.
    pub ref_ratio: u8,
    /// Merged tags of both features.
    pub tags: Tags,
}

fn common_subsequence_len(a: &[char], b: &[char]) -> usize {
    let mut previous = vec![0; b.len() + 1];
    for ca in a {
        let mut current = vec![0; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            current[j + 1] = if ca == cb {
                previous[j] + 1
            } else {
                previous[j + 1].max(current[j])
            };
        }
        previous = current;
    }
    previous[b.len()]
}

/// Case insensitive similarity of two strings, 0 to 100.
///
/// Only insertions and deletions count as edits, normalized by the combined length of both
/// strings: "Elk Rd" against "Elk Road" scores 86.
pub fn fuzzy_ratio(a: &str, b: &str) -> u8 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 0;
    }
    let common = common_subsequence_len(&a, &b);
    (200.0 * common as f64 / total as f64).round() as u8
}

fn is_hit(primary: &str, secondary: &str, ratio: u8, match_threshold: u8) -> bool {
    let length_difference = primary.chars().count().abs_diff(secondary.chars().count());
    ratio > match_threshold && length_difference <= MAX_LENGTH_DIFFERENCE
}

/// The number of a forest road reference like "FR 123".
fn usfs_number(usfs_ref: Option<&str>) -> Option<String> {
    let mut parts = usfs_ref?.split_whitespace();
    let _road_type = parts.next()?;
    parts.next().map(|number| number.to_uppercase())
}

fn has_regional_prefix(reference: &str) -> bool {
    REGIONAL_REF_PREFIXES
        .iter()
        .any(|prefix| reference.starts_with(prefix))
}

/// Start of the merged tag set: all tags of both sides, the secondary winning collisions, with
/// identity and classification taken from the secondary.
fn union_tags(primary: &Tags, secondary: &Tags) -> Tags {
    let mut tags = Tags::new();
    tags.other = primary.other.clone();
    tags.other.extend(
        secondary
            .other
            .iter()
            .map(|(key, value)| (key.clone(), value.clone())),
    );
    for key in CLIENT_ARTIFACT_KEYS {
        tags.other.remove(key);
    }

    tags.id = secondary.id;
    tags.version = Some(secondary.version.unwrap_or(1));
    tags.highway = secondary
        .highway
        .clone()
        .or_else(|| primary.highway.clone());
    for key in IdentityKey::ALL {
        let value = secondary.identity(key).or_else(|| primary.identity(key));
        tags.set_identity(key, value.map(str::to_string));
    }
    tags
}

/// Compare the identity tags of two features and merge their tag sets.
///
/// Every identity key present on both sides adds a hit when the fuzzy ratio is above
/// `match_threshold` and the lengths are close. The secondary keeps its name; a partial name
/// match records the primary's name as `alt_name`. A near match of a reference adopts the
/// primary's value, counts an extra hit when the forest road numbers agree, and keeps the old
/// value as `old_<key>` unless only the "FS" prefix changed.
pub fn compare_tags(primary: &Tags, secondary: &Tags, match_threshold: u8) -> TagComparison {
    let mut tags = union_tags(primary, secondary);
    let mut hits: u8 = 0;
    let mut name_ratio = 0;
    let mut ref_ratio = 0;

    for key in IdentityKey::ALL {
        if key == IdentityKey::Ref
            && secondary
                .reference
                .as_deref()
                .map_or(false, has_regional_prefix)
        {
            continue;
        }
        let (Some(ours), Some(theirs)) = (primary.identity(key), secondary.identity(key)) else {
            continue;
        };

        let ratio = fuzzy_ratio(ours, theirs);
        if key.is_ref() {
            ref_ratio = ref_ratio.max(ratio);
        } else {
            name_ratio = ratio;
        }

        if is_hit(ours, theirs, ratio, match_threshold) {
            hits += 1;
            if key.is_ref() && ratio < 100 {
                tags.set_identity(key, Some(ours.to_string()));
                let numbers_agree = match (
                    usfs_number(primary.usfs_ref.as_deref()),
                    usfs_number(secondary.usfs_ref.as_deref()),
                ) {
                    (Some(ours), Some(theirs)) => ours == theirs,
                    _ => false,
                };
                if numbers_agree {
                    hits += 1;
                }
                let prefix_only = numbers_agree
                    && ratio < PREFIX_ONLY_MAX_RATIO
                    && secondary
                        .usfs_ref
                        .as_deref()
                        .map_or(false, |value| value.starts_with(PREFIX_ONLY_SECONDARY));
                if !prefix_only {
                    tags.insert(&format!("old_{}", key.as_str()), theirs);
                }
            }
        } else if key == IdentityKey::Name && ratio > 0 && ratio <= match_threshold {
            tags.insert("alt_name", ours);
        }
    }

    TagComparison {
        hits: hits.min(3),
        name_ratio,
        ref_ratio,
        tags,
    }
}
