//! Configuration of the cryptographic primitives handed out by the facades

use crate::config::{PoolConfig, Properties};

use std::collections::HashMap;

/// Message digest configuration
///
/// # Examples
///
/// ```
/// use cryptopool::DigestSpec;
///
/// let spec = DigestSpec::default();
/// assert_eq!(spec.algorithm_name(), Some("SHA-256"));
/// assert_eq!(spec.provider_name(), None);
///
/// let spec = DigestSpec::new("SHA-512").with_provider("RustCrypto");
/// assert_eq!(spec.algorithm_name(), Some("SHA-512"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DigestSpec {
    algorithm_name: Option<String>,
    provider_name: Option<String>,
    additional_properties: HashMap<String, String>,
}

impl DigestSpec {
    pub const DEFAULT_ALGORITHM_NAME: &'static str = "SHA-256";
    const ALGORITHM_KEYS: [&'static str; 2] = ["algorithmName", "md.algorithmName"];
    const PROVIDER_KEYS: [&'static str; 2] = ["providerName", "md.providerName"];

    pub fn new(algorithm_name: impl Into<String>) -> Self {
        Self {
            algorithm_name: Some(algorithm_name.into()),
            ..Self::default()
        }
    }

    pub fn with_provider(mut self, provider_name: impl Into<String>) -> Self {
        self.provider_name = Some(provider_name.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.additional_properties.insert(key.into(), value.into());
        self
    }

    pub fn algorithm_name(&self) -> Option<&str> {
        self.algorithm_name.as_deref()
    }

    pub fn provider_name(&self) -> Option<&str> {
        self.provider_name.as_deref()
    }

    /// Properties that are not part of the digest configuration itself
    pub fn additional_properties(&self) -> &HashMap<String, String> {
        &self.additional_properties
    }

    /// Pool configuration carried in the additional properties
    ///
    /// ```
    /// use cryptopool::DigestSpec;
    ///
    /// let spec = DigestSpec::default().with_property("maxTotal", "2");
    /// assert_eq!(spec.pool_config().max_total, 2);
    /// ```
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig::from_properties(&self.additional_properties)
    }

    /// Build a spec from a property map
    ///
    /// Missing or blank values keep the defaults; every other key is kept as
    /// an additional property.
    pub fn from_properties(properties: &HashMap<String, String>) -> Self {
        let props = Properties(properties);
        let defaults = Self::default();
        let algorithm_name = take_or_default(&props, &Self::ALGORITHM_KEYS, defaults.algorithm_name);
        let provider_name = take_or_default(&props, &Self::PROVIDER_KEYS, defaults.provider_name);

        Self {
            algorithm_name,
            provider_name,
            additional_properties: remaining(properties, &[&Self::ALGORITHM_KEYS, &Self::PROVIDER_KEYS]),
        }
    }
}

impl Default for DigestSpec {
    fn default() -> Self {
        Self {
            algorithm_name: Some(Self::DEFAULT_ALGORITHM_NAME.to_string()),
            provider_name: None,
            additional_properties: HashMap::new(),
        }
    }
}

/// Secure random generator configuration
///
/// Both names default to unset, which selects the default provider and
/// algorithm.
///
/// ```
/// use cryptopool::PrngSpec;
/// use std::collections::HashMap;
///
/// let mut props = HashMap::new();
/// props.insert("algorithmName".to_string(), "OsRng".to_string());
/// props.insert("maxTotal".to_string(), "4".to_string());
///
/// let spec = PrngSpec::from_properties(&props);
/// assert_eq!(spec.algorithm_name(), Some("OsRng"));
/// assert_eq!(spec.provider_name(), None);
/// assert_eq!(spec.pool_config().max_total, 4);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PrngSpec {
    algorithm_name: Option<String>,
    provider_name: Option<String>,
    additional_properties: HashMap<String, String>,
}

impl PrngSpec {
    const ALGORITHM_KEYS: [&'static str; 2] = ["algorithmName", "prng.algorithmName"];
    const PROVIDER_KEYS: [&'static str; 2] = ["providerName", "prng.providerName"];

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_algorithm(mut self, algorithm_name: impl Into<String>) -> Self {
        self.algorithm_name = Some(algorithm_name.into());
        self
    }

    pub fn with_provider(mut self, provider_name: impl Into<String>) -> Self {
        self.provider_name = Some(provider_name.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.additional_properties.insert(key.into(), value.into());
        self
    }

    pub fn algorithm_name(&self) -> Option<&str> {
        self.algorithm_name.as_deref()
    }

    pub fn provider_name(&self) -> Option<&str> {
        self.provider_name.as_deref()
    }

    pub fn additional_properties(&self) -> &HashMap<String, String> {
        &self.additional_properties
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig::from_properties(&self.additional_properties)
    }

    pub fn from_properties(properties: &HashMap<String, String>) -> Self {
        let props = Properties(properties);
        Self {
            algorithm_name: take_or_default(&props, &Self::ALGORITHM_KEYS, None),
            provider_name: take_or_default(&props, &Self::PROVIDER_KEYS, None),
            additional_properties: remaining(properties, &[&Self::ALGORITHM_KEYS, &Self::PROVIDER_KEYS]),
        }
    }
}

fn take_or_default(props: &Properties<'_>, keys: &[&str], default: Option<String>) -> Option<String> {
    match props.get(keys) {
        Some(value) => Some(value.to_string()),
        None => {
            tracing::debug!(key = keys[0], default = ?default, "property not set, using the default");
            default
        }
    }
}

fn remaining(properties: &HashMap<String, String>, consumed: &[&[&str]]) -> HashMap<String, String> {
    properties
        .iter()
        .filter(|(key, _)| !consumed.iter().any(|keys| keys.contains(&key.as_str())))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_digest_spec_from_properties() {
        let spec = DigestSpec::from_properties(&props(&[
            ("md.algorithmName", "SHA-512"),
            ("providerName", "RustCrypto"),
            ("maxIdle", "3"),
        ]));
        assert_eq!(spec.algorithm_name(), Some("SHA-512"));
        assert_eq!(spec.provider_name(), Some("RustCrypto"));
        assert_eq!(spec.additional_properties().len(), 1);
        assert_eq!(spec.pool_config().max_idle, 3);
    }

    #[test]
    fn test_digest_spec_blank_values_keep_defaults() {
        let spec = DigestSpec::from_properties(&props(&[("algorithmName", "  "), ("providerName", "")]));
        assert_eq!(spec, DigestSpec::default());
    }

    #[test]
    fn test_prng_spec_defaults_are_unset() {
        let spec = PrngSpec::from_properties(&HashMap::new());
        assert_eq!(spec.algorithm_name(), None);
        assert_eq!(spec.provider_name(), None);
        assert!(spec.additional_properties().is_empty());
    }

    #[test]
    fn test_specs_are_independent_copies() {
        let original = DigestSpec::default().with_property("maxTotal", "1");
        let mut copy = original.clone();
        copy = copy.with_property("maxTotal", "9");
        assert_eq!(original.pool_config().max_total, 1);
        assert_eq!(copy.pool_config().max_total, 9);
    }
}
