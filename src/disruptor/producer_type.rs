//! Producer Type
//!
//! Selects the claim strategy of a ring buffer. The choice is fixed when the
//! buffer is built.

use serde::{Deserialize, Serialize};

/// Whether one thread or many will publish into the ring buffer
///
/// # Examples
/// ```
/// use ringway::disruptor::ProducerType;
///
/// assert!(ProducerType::Single.is_single());
/// assert!(ProducerType::Multi.is_multi());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProducerType {
    /// Exactly one publishing thread; claims need no atomic read-modify-write
    Single,

    /// Any number of publishing threads; claims race on the cursor with CAS
    #[default]
    Multi,
}

impl ProducerType {
    /// Returns true if this is `ProducerType::Single`
    pub fn is_single(&self) -> bool {
        matches!(self, ProducerType::Single)
    }

    /// Returns true if this is `ProducerType::Multi`
    pub fn is_multi(&self) -> bool {
        matches!(self, ProducerType::Multi)
    }
}

impl std::fmt::Display for ProducerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProducerType::Single => write!(f, "single"),
            ProducerType::Multi => write!(f, "multi"),
        }
    }
}

impl std::str::FromStr for ProducerType {
    type Err = String;

    /// Accepts "single" or "multi" in any case
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single" => Ok(ProducerType::Single),
            "multi" => Ok(ProducerType::Multi),
            _ => Err(format!(
                "Invalid producer type: '{s}'. Valid values are 'single' or 'multi'"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_producer_type_predicates() {
        assert!(ProducerType::Single.is_single());
        assert!(!ProducerType::Single.is_multi());
        assert!(ProducerType::Multi.is_multi());
        assert!(!ProducerType::Multi.is_single());
    }

    #[test]
    fn test_producer_type_default_is_multi() {
        assert_eq!(ProducerType::default(), ProducerType::Multi);
    }

    #[test]
    fn test_producer_type_from_str() {
        assert_eq!(ProducerType::from_str("single").unwrap(), ProducerType::Single);
        assert_eq!(ProducerType::from_str("SINGLE").unwrap(), ProducerType::Single);
        assert_eq!(ProducerType::from_str("Multi").unwrap(), ProducerType::Multi);

        assert!(ProducerType::from_str("both").is_err());
        assert!(ProducerType::from_str("").is_err());
    }

    #[test]
    fn test_producer_type_display_parses_back() {
        for producer_type in [ProducerType::Single, ProducerType::Multi] {
            let text = producer_type.to_string();
            assert_eq!(ProducerType::from_str(&text).unwrap(), producer_type);
        }
    }

    #[test]
    fn test_producer_type_serde() {
        assert_eq!(serde_json::to_string(&ProducerType::Single).unwrap(), "\"single\"");
        let parsed: ProducerType = serde_json::from_str("\"multi\"").unwrap();
        assert_eq!(parsed, ProducerType::Multi);
        assert!(serde_json::from_str::<ProducerType>("\"Multi\"").is_err());
    }
}
