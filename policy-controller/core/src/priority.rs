use chrono::{offset::Utc, DateTime};
use std::cmp::Ordering;

/// Orders competing claims on a singleton-per-target policy.
///
/// The earliest creation timestamp wins; a claim without a timestamp sorts
/// after every timestamped claim. Ties are broken by namespace and then by
/// name so that the order is total.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClaimPriority {
    pub creation_timestamp: Option<DateTime<Utc>>,
    pub namespace: String,
    pub name: String,
}

impl ClaimPriority {
    pub fn new(
        creation_timestamp: Option<DateTime<Utc>>,
        namespace: impl ToString,
        name: impl ToString,
    ) -> Self {
        Self {
            creation_timestamp,
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    /// Returns true if this claim takes precedence over `other`.
    pub fn wins_over(&self, other: &Self) -> bool {
        self < other
    }
}

impl Ord for ClaimPriority {
    fn cmp(&self, other: &Self) -> Ordering {
        let by_time = match (&self.creation_timestamp, &other.creation_timestamp) {
            (Some(a), Some(b)) => a.cmp(b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_time
            .then_with(|| self.namespace.cmp(&other.namespace))
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl PartialOrd for ClaimPriority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
