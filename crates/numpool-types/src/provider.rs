//! Mobile network providers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::TypesError;

/// A mobile network provider. Raw Pool scans and allocations are scoped to one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Tsel,
    Isat,
    Xl,
    Three,
    Other,
}

/// Number prefixes that identify a provider.
const PREFIXES: &[(&str, Provider)] = &[
    ("0812", Provider::Tsel),
    ("0857", Provider::Isat),
    ("0819", Provider::Xl),
];

impl Provider {
    /// All providers, in wire-name order.
    pub const ALL: [Provider; 5] = [
        Provider::Tsel,
        Provider::Isat,
        Provider::Xl,
        Provider::Three,
        Provider::Other,
    ];

    /// Detect the provider of a phone number from its prefix.
    ///
    /// Numbers with no known prefix map to [`Provider::Other`].
    pub fn detect(phone_number: &str) -> Self {
        let phone = phone_number.trim();
        PREFIXES
            .iter()
            .find(|(prefix, _)| phone.starts_with(prefix))
            .map(|(_, provider)| *provider)
            .unwrap_or(Provider::Other)
    }

    /// Lowercase wire/storage name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Tsel => "tsel",
            Provider::Isat => "isat",
            Provider::Xl => "xl",
            Provider::Three => "three",
            Provider::Other => "other",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Provider::ALL
            .iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .copied()
            .ok_or_else(|| TypesError::UnknownProvider(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_known_prefixes() {
        assert_eq!(Provider::detect("081234567890"), Provider::Tsel);
        assert_eq!(Provider::detect("085712345678"), Provider::Isat);
        assert_eq!(Provider::detect("081998765432"), Provider::Xl);
    }

    #[test]
    fn test_detect_unknown_prefix() {
        assert_eq!(Provider::detect("089612345678"), Provider::Other);
        assert_eq!(Provider::detect(""), Provider::Other);
    }

    #[test]
    fn test_parse_names() {
        for provider in Provider::ALL {
            let parsed: Provider = provider.as_str().parse().expect("parse");
            assert_eq!(parsed, provider);
        }
        assert_eq!("TSEL".parse::<Provider>().expect("parse"), Provider::Tsel);
        assert!("smartfren".parse::<Provider>().is_err());
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&Provider::Isat).expect("serialize");
        assert_eq!(json, "\"isat\"");
        let back: Provider = serde_json::from_str("\"xl\"").expect("deserialize");
        assert_eq!(back, Provider::Xl);
    }
}
