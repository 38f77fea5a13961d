//! Version arithmetic for release candidates.
//!
//! Versions are plain `major.minor.patch` triples; build numbers are
//! non-negative decimal integers. Anything else is rejected with
//! [`MalformedVersion`] instead of being guessed at.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Manifest data that cannot be interpreted as a version or build number.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedVersion {
    #[error("`{0}` is not a major.minor.patch version")]
    Version(String),

    #[error("`{0}` is not a build number")]
    BuildNumber(String),
}

/// A `major.minor.patch` version.
///
/// Field order gives the derived ordering: major, then minor, then patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SemanticVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl SemanticVersion {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    pub fn next_patch(self) -> Result<Self, MalformedVersion> {
        let patch = self.patch.checked_add(1).ok_or_else(|| self.overflow())?;
        Ok(Self::new(self.major, self.minor, patch))
    }

    pub fn next_minor(self) -> Result<Self, MalformedVersion> {
        let minor = self.minor.checked_add(1).ok_or_else(|| self.overflow())?;
        Ok(Self::new(self.major, minor, 0))
    }

    pub fn next_major(self) -> Result<Self, MalformedVersion> {
        let major = self.major.checked_add(1).ok_or_else(|| self.overflow())?;
        Ok(Self::new(major, 0, 0))
    }

    fn overflow(self) -> MalformedVersion {
        MalformedVersion::Version(self.to_string())
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for SemanticVersion {
    type Err = MalformedVersion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || MalformedVersion::Version(s.to_string());

        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 3 {
            return Err(malformed());
        }

        if parts.iter().any(|p| p.len() > 1 && p.starts_with('0')) {
            return Err(malformed());
        }

        let major = parse_component(parts[0]).ok_or_else(malformed)?;
        let minor = parse_component(parts[1]).ok_or_else(malformed)?;
        let patch = parse_component(parts[2]).ok_or_else(malformed)?;

        Ok(Self::new(major, minor, patch))
    }
}

/// Digits only: `u64::from_str` would also accept a leading `+`.
fn parse_component(part: &str) -> Option<u64> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

pub fn next_patch(version: &str) -> Result<String, MalformedVersion> {
    Ok(version.parse::<SemanticVersion>()?.next_patch()?.to_string())
}

pub fn next_minor(version: &str) -> Result<String, MalformedVersion> {
    Ok(version.parse::<SemanticVersion>()?.next_minor()?.to_string())
}

pub fn next_major(version: &str) -> Result<String, MalformedVersion> {
    Ok(version.parse::<SemanticVersion>()?.next_major()?.to_string())
}

pub fn parse_build_number(build: &str) -> Result<u64, MalformedVersion> {
    parse_component(build).ok_or_else(|| MalformedVersion::BuildNumber(build.to_string()))
}

/// Parses a build number and returns the following one without leading zeros.
pub fn next_build_number(build: &str) -> Result<String, MalformedVersion> {
    let next = parse_build_number(build)?
        .checked_add(1)
        .ok_or_else(|| MalformedVersion::BuildNumber(build.to_string()))?;
    Ok(next.to_string())
}

/// The `count` build numbers following `build`, in order.
pub fn following_build_numbers(build: &str, count: usize) -> Result<Vec<String>, MalformedVersion> {
    let mut numbers = Vec::with_capacity(count);
    let mut current = build.to_string();
    for _ in 0..count {
        current = next_build_number(&current)?;
        numbers.push(current.clone());
    }
    Ok(numbers)
}

/// Every value the version prompt offers, derived from one manifest snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseCandidates {
    pub current_version: String,
    pub current_build_number: String,
    pub next_patch: String,
    pub next_minor: String,
    pub next_major: String,
    pub next_build_number: String,
}

impl ReleaseCandidates {
    pub fn derive(version: &str, build: &str) -> Result<Self, MalformedVersion> {
        let parsed: SemanticVersion = version.parse()?;
        Ok(Self {
            current_version: version.to_string(),
            current_build_number: build.to_string(),
            next_patch: parsed.next_patch()?.to_string(),
            next_minor: parsed.next_minor()?.to_string(),
            next_major: parsed.next_major()?.to_string(),
            next_build_number: next_build_number(build)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ─── Parsing ────────────────────────────────────────────────────────────

    #[test]
    fn test_parse_valid() {
        assert_eq!(
            "1.2.3".parse::<SemanticVersion>(),
            Ok(SemanticVersion::new(1, 2, 3))
        );
        assert_eq!(
            "10.20.30".parse::<SemanticVersion>(),
            Ok(SemanticVersion::new(10, 20, 30))
        );
        assert_eq!(
            "0.1.10".parse::<SemanticVersion>(),
            Ok(SemanticVersion::new(0, 1, 10))
        );
    }

    #[test]
    fn test_parse_invalid() {
        for input in [
            "1.0", "1", "1.0.0.0", "abc.def.ghi", "", "1.+2.3", "1..3", "1.2.-3", "v1.2.3",
            " 1.2.3 ", "1.2.3\n", "01.2.3", "1.02.3", "1.2.00",
        ] {
            assert_eq!(
                input.parse::<SemanticVersion>(),
                Err(MalformedVersion::Version(input.to_string())),
                "{input} should be rejected"
            );
        }
    }

    #[test]
    fn test_ordering_is_major_then_minor_then_patch() {
        let v = |s: &str| s.parse::<SemanticVersion>().unwrap();
        assert!(v("2.0.0") > v("1.99.99"));
        assert!(v("1.3.0") > v("1.2.99"));
        assert!(v("1.2.4") > v("1.2.3"));
        assert_eq!(v("1.2.3"), v("1.2.3"));
    }

    // ─── Increments ─────────────────────────────────────────────────────────

    #[test]
    fn test_next_patch_changes_only_patch() {
        assert_eq!(next_patch("1.2.3").unwrap(), "1.2.4");
        assert_eq!(next_patch("0.0.9").unwrap(), "0.0.10");
    }

    #[test]
    fn test_next_minor_resets_patch() {
        assert_eq!(next_minor("1.2.3").unwrap(), "1.3.0");
        assert_eq!(next_minor("0.9.0").unwrap(), "0.10.0");
    }

    #[test]
    fn test_next_major_resets_minor_and_patch() {
        assert_eq!(next_major("1.2.3").unwrap(), "2.0.0");
        assert_eq!(next_major("0.0.1").unwrap(), "1.0.0");
    }

    #[test]
    fn test_increments_reject_malformed_input() {
        assert!(next_patch("1.2").is_err());
        assert!(next_minor("one.two.three").is_err());
        assert!(next_major("").is_err());
    }

    #[test]
    fn test_increments_reject_overflow() {
        let max = u64::MAX;
        assert_eq!(
            next_patch(&format!("1.2.{max}")),
            Err(MalformedVersion::Version(format!("1.2.{max}")))
        );
        assert!(next_minor(&format!("1.{max}.3")).is_err());
        assert!(next_major(&format!("{max}.0.0")).is_err());
        // The components that do not overflow still increment
        assert_eq!(next_major(&format!("1.{max}.{max}")).unwrap(), "2.0.0");
    }

    #[test]
    fn test_next_build_number() {
        assert_eq!(next_build_number("40").unwrap(), "41");
        assert_eq!(next_build_number("0").unwrap(), "1");
        assert_eq!(next_build_number("99").unwrap(), "100");
        // Leading zeros are dropped from the result
        assert_eq!(next_build_number("007").unwrap(), "8");
    }

    #[test]
    fn test_next_build_number_round_trips_through_string_form() {
        for b in [0_u64, 1, 9, 41, 1234, 999_999] {
            let next = next_build_number(&b.to_string()).unwrap();
            assert_eq!(next.parse::<u64>().unwrap(), b + 1);
            assert_eq!(next, (b + 1).to_string());
        }
    }

    #[test]
    fn test_next_build_number_rejects_garbage() {
        for input in ["", "abc", "-1", "+1", "1.0", "18446744073709551615", " 40 ", "40\n"] {
            assert_eq!(
                next_build_number(input),
                Err(MalformedVersion::BuildNumber(input.to_string())),
                "{input} should be rejected"
            );
        }
    }

    #[test]
    fn test_following_build_numbers() {
        assert_eq!(
            following_build_numbers("41", 5).unwrap(),
            vec!["42", "43", "44", "45", "46"]
        );
        assert!(following_build_numbers("41", 0).unwrap().is_empty());
        assert!(following_build_numbers("x", 2).is_err());
        assert!(parse_build_number(" 40 ").is_err());
    }

    // ─── Candidates ─────────────────────────────────────────────────────────

    #[test]
    fn test_candidates_from_manifest_values() {
        let candidates = ReleaseCandidates::derive("1.2.3", "40").unwrap();
        assert_eq!(candidates.current_version, "1.2.3");
        assert_eq!(candidates.current_build_number, "40");
        assert_eq!(candidates.next_patch, "1.2.4");
        assert_eq!(candidates.next_minor, "1.3.0");
        assert_eq!(candidates.next_major, "2.0.0");
        assert_eq!(candidates.next_build_number, "41");
    }

    #[test]
    fn test_candidates_fail_on_bad_build_number() {
        assert_eq!(
            ReleaseCandidates::derive("1.2.3", "forty"),
            Err(MalformedVersion::BuildNumber("forty".to_string()))
        );
    }

    #[test]
    fn test_candidates_fail_on_overflowing_version() {
        let version = format!("1.2.{}", u64::MAX);
        assert_eq!(
            ReleaseCandidates::derive(&version, "40"),
            Err(MalformedVersion::Version(version.clone()))
        );
        assert!(ReleaseCandidates::derive(&format!("{}.0.0", u64::MAX), "40").is_err());
    }

    #[test]
    fn test_candidates_reject_prefixed_version() {
        assert_eq!(
            ReleaseCandidates::derive("v1.2.3", "40"),
            Err(MalformedVersion::Version("v1.2.3".to_string()))
        );
    }

    #[test]
    fn test_display_is_canonical() {
        let v: SemanticVersion = "3.4.5".parse().unwrap();
        assert_eq!(v.to_string(), "3.4.5");
    }
}
