//! Equality-based label selectors.
//!
//! Supports the forms the API server accepts in `labelSelector`:
//! `key`, `!key`, `key=value`, `key==value`, `key!=value`, joined by commas.
//! An empty selector matches everything.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Label selector parse errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    #[error("empty requirement in label selector {0:?}")]
    EmptyRequirement(String),

    #[error("invalid label key {0:?}")]
    InvalidKey(String),

    #[error("invalid label value {0:?}")]
    InvalidValue(String),
}

/// A single selector requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    Exists(String),
    NotExists(String),
    Equals(String, String),
    NotEquals(String, String),
}

impl Requirement {
    /// Returns true if the label set satisfies this requirement.
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        match self {
            Self::Exists(key) => labels.contains_key(key),
            Self::NotExists(key) => !labels.contains_key(key),
            Self::Equals(key, value) => labels.get(key) == Some(value),
            // A missing key satisfies `!=`, as on the API server.
            Self::NotEquals(key, value) => labels.get(key) != Some(value),
        }
    }

    fn parse(raw: &str) -> Result<Self, SelectorError> {
        if let Some(key) = raw.strip_prefix('!') {
            return Ok(Self::NotExists(valid_key(key.trim())?));
        }
        if let Some((key, value)) = raw.split_once("!=") {
            return Ok(Self::NotEquals(valid_key(key.trim())?, valid_value(value.trim())?));
        }
        if let Some((key, value)) = raw.split_once("==").or_else(|| raw.split_once('=')) {
            return Ok(Self::Equals(valid_key(key.trim())?, valid_value(value.trim())?));
        }
        Ok(Self::Exists(valid_key(raw)?))
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exists(key) => write!(f, "{key}"),
            Self::NotExists(key) => write!(f, "!{key}"),
            Self::Equals(key, value) => write!(f, "{key}={value}"),
            Self::NotEquals(key, value) => write!(f, "{key}!={value}"),
        }
    }
}

/// Conjunction of label requirements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    requirements: Vec<Requirement>,
}

impl LabelSelector {
    /// Selector matching every resource.
    pub fn everything() -> Self {
        Self::default()
    }

    /// Selector matching resources that carry `key`, whatever its value.
    pub fn exists(key: impl Into<String>) -> Self {
        Self {
            requirements: vec![Requirement::Exists(key.into())],
        }
    }

    /// Builder method to add a requirement.
    pub fn and(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    /// The requirements, in order.
    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    /// Returns true if the selector has no requirements.
    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    /// Returns true if the label set satisfies every requirement.
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }
}

impl FromStr for LabelSelector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Ok(Self::everything());
        }

        let requirements = s
            .split(',')
            .map(|part| {
                let part = part.trim();
                if part.is_empty() {
                    return Err(SelectorError::EmptyRequirement(s.to_string()));
                }
                Requirement::parse(part)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { requirements })
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, requirement) in self.requirements.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{requirement}")?;
        }
        Ok(())
    }
}

fn valid_key(key: &str) -> Result<String, SelectorError> {
    let ok = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'));
    if ok {
        Ok(key.to_string())
    } else {
        Err(SelectorError::InvalidKey(key.to_string()))
    }
}

fn valid_value(value: &str) -> Result<String, SelectorError> {
    let ok = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        Ok(value.to_string())
    } else {
        Err(SelectorError::InvalidValue(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_forms() {
        let selector: LabelSelector = "tekton.dev/ttl, !skip,env=prod,tier==web,zone!=b"
            .parse()
            .unwrap();

        assert_eq!(
            selector.requirements(),
            &[
                Requirement::Exists("tekton.dev/ttl".to_string()),
                Requirement::NotExists("skip".to_string()),
                Requirement::Equals("env".to_string(), "prod".to_string()),
                Requirement::Equals("tier".to_string(), "web".to_string()),
                Requirement::NotEquals("zone".to_string(), "b".to_string()),
            ]
        );
        assert_eq!(
            selector.to_string(),
            "tekton.dev/ttl,!skip,env=prod,tier=web,zone!=b"
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            "a,,b".parse::<LabelSelector>(),
            Err(SelectorError::EmptyRequirement("a,,b".to_string()))
        );
        assert!(matches!(
            "bad key".parse::<LabelSelector>(),
            Err(SelectorError::InvalidKey(_))
        ));
        assert!(matches!(
            "=value".parse::<LabelSelector>(),
            Err(SelectorError::InvalidKey(_))
        ));
        assert!(matches!(
            "env=a b".parse::<LabelSelector>(),
            Err(SelectorError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_empty_selector_matches_everything() {
        let selector: LabelSelector = "".parse().unwrap();
        assert!(selector.is_empty());
        assert!(selector.matches(&labels(&[])));
        assert_eq!(selector.to_string(), "");
    }

    #[test]
    fn test_matching() {
        let selector = LabelSelector::exists("tekton.dev/ttl")
            .and(Requirement::NotEquals("env".to_string(), "prod".to_string()));

        assert!(selector.matches(&labels(&[("tekton.dev/ttl", "60")])));
        assert!(selector.matches(&labels(&[("tekton.dev/ttl", "x"), ("env", "dev")])));
        assert!(!selector.matches(&labels(&[("tekton.dev/ttl", "60"), ("env", "prod")])));
        assert!(!selector.matches(&labels(&[("env", "dev")])));
    }
}
