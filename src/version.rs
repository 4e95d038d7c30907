//! Tag parsing and version ordering.
//!
//! Registry tags are free-form strings. Only purely numeric, dot-separated
//! tags (`46`, `46.0`, `2.1.1`) are treated as browser versions; everything
//! else (`latest`, `edge`, `47.0-beta`) is dropped from selection.

use std::cmp::Ordering;

/// Comparable form of a numeric tag.
///
/// Missing trailing components compare as zero, so `46` and `46.0` are equal.
#[derive(Debug, Clone)]
pub struct VersionKey {
    components: Vec<u64>,
}

impl VersionKey {
    /// Key for `tag`, or `None` when it is not a version.
    pub fn parse(tag: &str) -> Option<Self> {
        match parse_tag(tag) {
            ParsedTag::Version(key) => Some(key),
            ParsedTag::Unparseable(_) => None,
        }
    }

    /// Numeric components in the order they appeared in the tag.
    pub fn components(&self) -> &[u64] {
        &self.components
    }
}

impl PartialEq for VersionKey {
    fn eq(&self, other: &Self) -> bool {
        compare(self, other) == Ordering::Equal
    }
}

impl Eq for VersionKey {}

impl PartialOrd for VersionKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VersionKey {
    fn cmp(&self, other: &Self) -> Ordering {
        compare(self, other)
    }
}

/// Result of parsing a registry tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedTag<'a> {
    /// The tag is a numeric version.
    Version(VersionKey),
    /// The tag is not a version and must not be selected.
    Unparseable(&'a str),
}

/// Parse a tag into a [`VersionKey`].
pub fn parse_tag(tag: &str) -> ParsedTag<'_> {
    if tag.is_empty() {
        return ParsedTag::Unparseable(tag);
    }

    let mut components = Vec::new();
    for part in tag.split('.') {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return ParsedTag::Unparseable(tag);
        }
        match part.parse::<u64>() {
            Ok(n) => components.push(n),
            Err(_) => return ParsedTag::Unparseable(tag),
        }
    }

    ParsedTag::Version(VersionKey { components })
}

/// Compare two version keys component-wise, padding the shorter with zeros.
pub fn compare(a: &VersionKey, b: &VersionKey) -> Ordering {
    let len = a.components.len().max(b.components.len());
    for i in 0..len {
        let x = a.components.get(i).copied().unwrap_or(0);
        let y = b.components.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

/// Keep only version tags and order them newest first.
///
/// The sort is stable: tags with equal keys keep their input order.
pub fn sort_descending<S: AsRef<str>>(tags: &[S]) -> Vec<String> {
    let mut parsed: Vec<(VersionKey, &str)> = tags
        .iter()
        .filter_map(|tag| match parse_tag(tag.as_ref()) {
            ParsedTag::Version(key) => Some((key, tag.as_ref())),
            ParsedTag::Unparseable(raw) => {
                tracing::trace!("Skipping non-version tag '{}'", raw);
                None
            }
        })
        .collect();

    parsed.sort_by(|(a, _), (b, _)| compare(b, a));
    parsed.into_iter().map(|(_, tag)| tag.to_string()).collect()
}

/// Return the highest version among `tags`, if any parses.
///
/// Tags with equal keys (`46`, `46.0`) are all maximal; the first one in
/// iteration order is returned, matching [`sort_descending`]. Callers that
/// iterate a sorted map get its key order as the tiebreak, so compare the
/// result by key rather than by string.
pub fn max_version<'a, I>(tags: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    tags.into_iter()
        .filter_map(|tag| match parse_tag(tag) {
            ParsedTag::Version(key) => Some((key, tag)),
            ParsedTag::Unparseable(_) => None,
        })
        .reduce(|best, next| if next.0 > best.0 { next } else { best })
        .map(|(_, tag)| tag)
}
