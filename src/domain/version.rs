use std::cmp::Ordering;
use std::fmt;

/// Dotted numeric version such as `4.2.10`.
///
/// Each component keeps only its leading digits (`3-beta` reads as `3`, an
/// empty or non-numeric component reads as `0`). Comparison pads the shorter
/// side with zeros, so `1.2` and `1.2.0` are equal.
///
/// Digits after a suffix are dropped rather than glued on: `3rc1` is `3`, not
/// `31`.
#[derive(Debug, Clone)]
pub struct VersionTag {
    raw: String,
    components: Vec<u64>,
}

impl VersionTag {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let components: Vec<u64> = raw
            .split('.')
            .map(|part| {
                let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
                digits.parse::<u64>().unwrap_or(0)
            })
            .collect();

        Self {
            raw: raw.to_string(),
            components,
        }
    }

    /// Parses a release tag, dropping any leading non-numeric prefix such as `v`.
    pub fn from_release_tag(tag: &str) -> Self {
        Self::parse(tag.trim().trim_start_matches(|c: char| !c.is_ascii_digit()))
    }

    pub fn components(&self) -> &[u64] {
        &self.components
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Ord for VersionTag {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.components.len().max(other.components.len());
        (0..len)
            .map(|i| {
                let a = self.components.get(i).copied().unwrap_or(0);
                let b = other.components.get(i).copied().unwrap_or(0);
                a.cmp(&b)
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for VersionTag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for VersionTag {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for VersionTag {}
