// ⏰ Validity windows
// Every stored row is one version of an identity (uuid). A version is
// current while `validity_to` is unset; closing it turns it into history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// VALIDITY
// ============================================================================

/// Version number plus the time range in which that version was the truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Validity {
    /// Monotonically increasing, starts at 1
    pub version: i64,

    /// When this version became current
    pub validity_from: DateTime<Utc>,

    /// When this version stopped being current (None = still current)
    pub validity_to: Option<DateTime<Utc>>,
}

impl Validity {
    /// First version, current from `at`
    pub fn new(at: DateTime<Utc>) -> Self {
        Validity {
            version: 1,
            validity_from: at,
            validity_to: None,
        }
    }

    /// Check if this version is current (no validity_to)
    pub fn is_current(&self) -> bool {
        self.validity_to.is_none()
    }

    /// Check if this version was valid at a specific time
    pub fn was_valid_at(&self, time: DateTime<Utc>) -> bool {
        self.validity_from <= time && self.validity_to.map_or(true, |to| to > time)
    }

    /// Close this version at `at`
    pub fn close(&mut self, at: DateTime<Utc>) {
        self.validity_to = Some(at);
    }

    /// The window of the version that replaces this one
    pub fn next(&self, at: DateTime<Utc>) -> Validity {
        Validity {
            version: self.version + 1,
            validity_from: at,
            validity_to: None,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_new_validity_is_current() {
        let now = Utc::now();
        let validity = Validity::new(now);

        assert_eq!(validity.version, 1);
        assert!(validity.is_current());
        assert!(validity.was_valid_at(now));
    }

    #[test]
    fn test_closed_validity() {
        let t0 = Utc::now();
        let t1 = t0 + Duration::seconds(10);
        let mut validity = Validity::new(t0);

        validity.close(t1);

        assert!(!validity.is_current());
        assert!(validity.was_valid_at(t0 + Duration::seconds(5)));
        assert!(!validity.was_valid_at(t1));
        assert!(!validity.was_valid_at(t0 - Duration::seconds(1)));
    }

    #[test]
    fn test_next_version_starts_where_previous_ends() {
        let t0 = Utc::now();
        let t1 = t0 + Duration::minutes(1);
        let mut v1 = Validity::new(t0);
        v1.close(t1);
        let v2 = v1.next(t1);

        assert_eq!(v2.version, 2);
        assert!(v2.is_current());
        assert!(!v1.was_valid_at(t1));
        assert!(v2.was_valid_at(t1));
    }
}
