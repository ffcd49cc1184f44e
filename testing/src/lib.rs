//! # Gatepass Testing
//!
//! Test doubles and fixtures for Gatepass.
//!
//! This crate provides:
//! - [`FixedClock`]: deterministic time
//! - [`InMemoryStore`]: every storage trait, with the same atomicity as the
//!   `PostgreSQL` store (one lock per operation)
//! - [`fixtures`]: tiers, buyers, codecs and a fully wired [`fixtures::Harness`]
//!
//! ## Example
//!
//! ```
//! use gatepass_testing::fixtures::Harness;
//!
//! # async fn example() {
//! let harness = Harness::new();
//! let tiers = harness.ledger.tiers().await.unwrap_or_default();
//! assert_eq!(tiers.len(), 5);
//! # }
//! ```

pub mod fixtures;
pub mod memory;

use chrono::{DateTime, Utc};
use gatepass_core::environment::Clock;

/// Mock implementations of environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use gatepass_testing::mocks::FixedClock;
    /// use gatepass_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Default fixed clock for tests (2026-02-01 12:00:00 UTC, during presale)
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded timestamp fails to parse, which should never
    /// happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2026-02-01T12:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

pub use memory::InMemoryStore;
pub use mocks::{FixedClock, test_clock};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
    }
}
