//! Kubernetes control-plane version parsing
//!
//! Versions follow the `vMAJOR[.MINOR[.PATCH]][-PRERELEASE][+BUILD]` form
//! used by Kubernetes release tags. The leading `v` is mandatory. Missing
//! minor/patch components default to zero, and a pre-release sorts before
//! the release it precedes.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Lowest control-plane version the provisioner accepts by default
pub const DEFAULT_MIN_CONTROL_PLANE_VERSION: &str = "v1.28.0";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KubeVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre: Option<String>,
}

impl FromStr for KubeVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::invalid(format!("version {:?} is not a valid semver", s));

        let rest = s.strip_prefix('v').ok_or_else(invalid)?;
        // build metadata never takes part in ordering
        let rest = rest.split_once('+').map(|(v, _)| v).unwrap_or(rest);
        let (core, pre) = match rest.split_once('-') {
            Some((core, pre)) => (core, Some(pre)),
            None => (rest, None),
        };

        if let Some(pre) = pre {
            let valid = !pre.is_empty()
                && pre.split('.').all(|part| {
                    !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
                });
            if !valid {
                return Err(invalid());
            }
        }

        let parts: Vec<&str> = core.split('.').collect();
        if parts.is_empty() || parts.len() > 3 {
            return Err(invalid());
        }
        let mut numbers = [0u64; 3];
        for (i, part) in parts.iter().enumerate() {
            if part.is_empty()
                || !part.chars().all(|c| c.is_ascii_digit())
                || (part.len() > 1 && part.starts_with('0'))
            {
                return Err(invalid());
            }
            numbers[i] = part.parse().map_err(|_| invalid())?;
        }
        // shorthand forms cannot carry a pre-release
        if parts.len() < 3 && pre.is_some() {
            return Err(invalid());
        }

        Ok(KubeVersion {
            major: numbers[0],
            minor: numbers[1],
            patch: numbers[2],
            pre: pre.map(str::to_string),
        })
    }
}

impl fmt::Display for KubeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.pre {
            write!(f, "-{}", pre)?;
        }
        Ok(())
    }
}

impl PartialOrd for KubeVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KubeVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (&self.pre, &other.pre) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => compare_prerelease(a, b),
            })
    }
}

fn compare_prerelease(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
                    (Ok(x), Ok(y)) => x.cmp(&y),
                    (Ok(_), Err(_)) => Ordering::Less,
                    (Err(_), Ok(_)) => Ordering::Greater,
                    (Err(_), Err(_)) => x.cmp(y),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

/// Check that `version` parses and is not lower than `minimum`.
pub fn ensure_supported(version: &str, minimum: &KubeVersion) -> Result<KubeVersion, Error> {
    let parsed: KubeVersion = version.parse()?;
    if &parsed < minimum {
        return Err(Error::invalid(format!(
            "version field must be >= {}",
            minimum
        )));
    }
    Ok(parsed)
}
