//! Branch types and their expansion into branch name patterns.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::keys;
use crate::{ConfigurationError, ConfigurationResult};

#[cfg(test)]
#[path = "branch_types_tests.rs"]
mod tests;

/// Symbolic branch category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BranchType {
    Production,
    Development,
    Feature,
    Release,
    Hotfix,
}

/// Branch name patterns protected for each branch type, in declaration order.
const BRANCH_TYPE_MAPPING: &[(BranchType, &[&str])] = &[
    (BranchType::Production, &["production", "main", "master"]),
    (BranchType::Development, &["development", "develop"]),
    (BranchType::Feature, &["feature/*"]),
    (BranchType::Release, &["release/*"]),
    (BranchType::Hotfix, &["hotfix/*"]),
];

impl BranchType {
    pub const ALL: [BranchType; 5] = [
        BranchType::Production,
        BranchType::Development,
        BranchType::Feature,
        BranchType::Release,
        BranchType::Hotfix,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BranchType::Production => "production",
            BranchType::Development => "development",
            BranchType::Feature => "feature",
            BranchType::Release => "release",
            BranchType::Hotfix => "hotfix",
        }
    }

    /// Concrete patterns for this type.
    pub fn patterns(&self) -> &'static [&'static str] {
        BRANCH_TYPE_MAPPING
            .iter()
            .find(|(branch_type, _)| branch_type == self)
            .map(|(_, patterns)| *patterns)
            .unwrap_or(&[])
    }
}

impl fmt::Display for BranchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BranchType {
    type Err = ConfigurationError;

    /// Parses a type name, ignoring case and surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        BranchType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ConfigurationError::UnknownBranchType {
                name: keys::BRANCH_TYPES.name.to_string(),
                value: wanted.to_string(),
            })
    }
}

/// Which branches to protect: explicit patterns, or branch types to expand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchSelection {
    Patterns(Vec<String>),
    Types(Vec<BranchType>),
}

/// Produces the ordered, duplicate-free list of patterns to protect.
///
/// Explicit patterns keep their first-occurrence order. Types expand in the
/// order given, patterns within a type in mapping order.
///
/// ```rust
/// use config_manager::{expand_branch_patterns, BranchSelection, BranchType};
///
/// let selection = BranchSelection::Types(vec![BranchType::Production, BranchType::Development]);
/// assert_eq!(
///     expand_branch_patterns(&selection),
///     vec!["production", "main", "master", "development", "develop"]
/// );
/// ```
pub fn expand_branch_patterns(selection: &BranchSelection) -> Vec<String> {
    match selection {
        BranchSelection::Patterns(patterns) => dedup_in_order(patterns.iter().map(|p| p.trim())),
        BranchSelection::Types(types) => {
            dedup_in_order(types.iter().flat_map(|t| t.patterns().iter().copied()))
        }
    }
}

/// Parses comma-separated branch type names, as read from BRANCH_TYPES.
///
/// # Errors
///
/// Returns `ConfigurationError::UnknownBranchType` for the first name that is
/// not a known type. No name is ever silently dropped.
pub fn parse_branch_types<S: AsRef<str>>(names: &[S]) -> ConfigurationResult<Vec<BranchType>> {
    names
        .iter()
        .map(|name| name.as_ref().parse::<BranchType>())
        .collect()
}

fn dedup_in_order<'a>(patterns: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    patterns
        .filter(|p| !p.is_empty())
        .filter(|p| seen.insert(*p))
        .map(str::to_string)
        .collect()
}
