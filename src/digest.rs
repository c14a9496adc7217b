//! Message digests backed by the RustCrypto `sha2` implementations

use crate::config::PoolConfig;
use crate::errors::{PoolError, PoolResult};
use crate::facade::MessageDigestFactory;
use crate::factory::ResourceFactory;
use crate::spec::DigestSpec;

use parking_lot::Mutex;
use sha2::digest::DynDigest;
use sha2::{Sha224, Sha256, Sha384, Sha512, Sha512_224, Sha512_256};
use std::fmt;
use unicode_normalization::UnicodeNormalization;

/// Name of the provider digests come from
pub const DEFAULT_DIGEST_PROVIDER: &str = "RustCrypto";

/// Digest algorithms the default provider supports
pub const DIGEST_ALGORITHMS: [&str; 6] = ["SHA-224", "SHA-256", "SHA-384", "SHA-512", "SHA-512/224", "SHA-512/256"];

/// A stateful message digest
///
/// The hashing state sits behind a lock so a single instance can be shared,
/// although interleaved updates from several threads produce meaningless
/// hashes. Borrow a pooled instance per computation instead.
///
/// # Examples
///
/// ```
/// use cryptopool::{DigestSpec, MessageDigestFactory};
///
/// let facade = MessageDigestFactory::new();
/// let digest = facade.get_instance(&DigestSpec::default()).unwrap();
///
/// digest.update(b"ab");
/// digest.update(b"c");
/// let hash = digest.digest();
/// assert_eq!(hash.len(), 32);
/// assert_eq!(hash[..4], [0xbau8, 0x78, 0x16, 0xbf]);
/// ```
pub struct MessageDigest {
    algorithm: &'static str,
    provider: &'static str,
    state: Mutex<Box<dyn DynDigest + Send>>,
}

impl MessageDigest {
    /// Feed more input into the digest
    pub fn update(&self, input: &[u8]) {
        self.state.lock().update(input);
    }

    /// Finish the computation and return the hash
    ///
    /// The digest is reset afterwards and can be reused right away.
    pub fn digest(&self) -> Vec<u8> {
        self.state.lock().finalize_reset().into_vec()
    }

    /// Hash `input` in one go, discarding any earlier input
    pub fn digest_of(&self, input: &[u8]) -> Vec<u8> {
        let mut state = self.state.lock();
        state.reset();
        state.update(input);
        state.finalize_reset().into_vec()
    }

    /// Discard any input fed so far
    pub fn reset(&self) {
        self.state.lock().reset();
    }

    /// Length of the hash in bytes
    pub fn output_size(&self) -> usize {
        self.state.lock().output_size()
    }

    pub fn algorithm(&self) -> &str {
        self.algorithm
    }

    pub fn provider(&self) -> &str {
        self.provider
    }
}

impl fmt::Debug for MessageDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageDigest")
            .field("algorithm", &self.algorithm)
            .field("provider", &self.provider)
            .finish_non_exhaustive()
    }
}

/// Builds [`MessageDigest`] instances for one provider and algorithm
///
/// The lookup happens once, in [`DigestFactory::new`]; a factory that exists
/// always creates successfully.
#[derive(Debug, Clone, Copy)]
pub struct DigestFactory {
    algorithm: &'static str,
    provider: &'static str,
}

impl DigestFactory {
    pub fn new(spec: &DigestSpec) -> PoolResult<Self> {
        let provider = match spec.provider_name() {
            None | Some("") => {
                tracing::info!(provider = DEFAULT_DIGEST_PROVIDER, "no digest provider given, using the default");
                DEFAULT_DIGEST_PROVIDER
            }
            Some(name) if name.eq_ignore_ascii_case(DEFAULT_DIGEST_PROVIDER) => DEFAULT_DIGEST_PROVIDER,
            Some(name) => {
                tracing::warn!(provider = name, "unknown digest provider");
                return Err(PoolError::ProviderUnavailable(name.to_string()));
            }
        };

        let requested = spec.algorithm_name().unwrap_or_default();
        let algorithm = DIGEST_ALGORITHMS
            .iter()
            .find(|known| known.eq_ignore_ascii_case(requested))
            .copied()
            .ok_or_else(|| {
                tracing::warn!(algorithm = requested, provider, "unknown digest algorithm");
                PoolError::AlgorithmUnavailable(requested.to_string())
            })?;

        Ok(Self { algorithm, provider })
    }

    pub fn algorithm(&self) -> &'static str {
        self.algorithm
    }

    fn new_state(&self) -> Box<dyn DynDigest + Send> {
        match self.algorithm {
            "SHA-224" => Box::new(Sha224::default()),
            "SHA-384" => Box::new(Sha384::default()),
            "SHA-512" => Box::new(Sha512::default()),
            "SHA-512/224" => Box::new(Sha512_224::default()),
            "SHA-512/256" => Box::new(Sha512_256::default()),
            _ => Box::new(Sha256::default()),
        }
    }
}

impl ResourceFactory<MessageDigest> for DigestFactory {
    fn create(&self) -> PoolResult<MessageDigest> {
        Ok(MessageDigest {
            algorithm: self.algorithm,
            provider: self.provider,
            state: Mutex::new(self.new_state()),
        })
    }

    fn reset(&self, digest: &mut MessageDigest) {
        digest.state.get_mut().reset();
    }
}

/// Hash `payload` with a digest borrowed from `facade`
///
/// The pool is configured from the additional properties of `spec`. The digest
/// is reset before and after use, then returned to its pool.
///
/// ```
/// use cryptopool::{digest_bytes, DigestSpec, MessageDigestFactory};
///
/// let facade = MessageDigestFactory::new();
/// let hash = digest_bytes(&facade, b"", &DigestSpec::new("SHA-512")).unwrap();
/// assert_eq!(hash.len(), 64);
/// ```
pub fn digest_bytes(facade: &MessageDigestFactory, payload: &[u8], spec: &DigestSpec) -> PoolResult<Vec<u8>> {
    digest_bytes_with_config(facade, payload, spec, &spec.pool_config())
}

/// Hash the UTF-8 bytes of `payload` in Unicode normalization form C, see
/// [`digest_bytes`]
///
/// Precomposed and decomposed spellings of the same text hash alike.
///
/// ```
/// use cryptopool::{digest_str, DigestSpec, MessageDigestFactory};
///
/// let facade = MessageDigestFactory::new();
/// let spec = DigestSpec::default();
/// assert_eq!(
///     digest_str(&facade, "caf\u{e9}", &spec).unwrap(),
///     digest_str(&facade, "cafe\u{301}", &spec).unwrap(),
/// );
/// ```
pub fn digest_str(facade: &MessageDigestFactory, payload: &str, spec: &DigestSpec) -> PoolResult<Vec<u8>> {
    let normalized: String = payload.nfc().collect();
    digest_bytes(facade, normalized.as_bytes(), spec)
}

/// Like [`digest_bytes`] with an explicit pool configuration
///
/// The configuration only matters when the pool for this spec does not
/// exist yet.
pub fn digest_bytes_with_config(
    facade: &MessageDigestFactory,
    payload: &[u8],
    spec: &DigestSpec,
    config: &PoolConfig,
) -> PoolResult<Vec<u8>> {
    let digest = facade.get_pooled_instance(spec, config)?;
    let hash = digest.digest_of(payload);
    digest.reset();
    facade.return_pooled_instance(spec, digest)?;
    Ok(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    #[test]
    fn test_digest_str_normalizes_composition() {
        let facade = MessageDigestFactory::new();
        let spec = DigestSpec::default();

        let precomposed = digest_str(&facade, "\u{e9}", &spec).unwrap();
        let decomposed = digest_str(&facade, "e\u{301}", &spec).unwrap();
        assert_eq!(precomposed, decomposed);
        assert_eq!(precomposed, digest_bytes(&facade, "\u{e9}".as_bytes(), &spec).unwrap());
        assert_ne!(decomposed, digest_bytes(&facade, "e\u{301}".as_bytes(), &spec).unwrap());
    }

    #[test]
    fn test_sha256_known_answer() {
        let digest = DigestFactory::new(&DigestSpec::default()).unwrap().create().unwrap();
        digest.update(b"abc");
        assert_eq!(
            hex(&digest.digest()),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_every_algorithm_is_available() {
        let expected_sizes = [28, 32, 48, 64, 28, 32];
        for (name, size) in DIGEST_ALGORITHMS.iter().zip(expected_sizes) {
            let digest = DigestFactory::new(&DigestSpec::new(*name)).unwrap().create().unwrap();
            assert_eq!(digest.output_size(), size, "{name}");
            assert_eq!(digest.digest().len(), size, "{name}");
        }
    }

    #[test]
    fn test_algorithm_names_ignore_case() {
        let factory = DigestFactory::new(&DigestSpec::new("sha-384")).unwrap();
        assert_eq!(factory.algorithm(), "SHA-384");
    }

    #[test]
    fn test_unknown_algorithm() {
        let err = DigestFactory::new(&DigestSpec::new("MD4")).unwrap_err();
        assert_eq!(err, PoolError::AlgorithmUnavailable("MD4".to_string()));

        let err = DigestFactory::new(&DigestSpec::new("")).unwrap_err();
        assert_eq!(err, PoolError::AlgorithmUnavailable(String::new()));
    }

    #[test]
    fn test_unknown_provider() {
        let err = DigestFactory::new(&DigestSpec::default().with_provider("SUN")).unwrap_err();
        assert_eq!(err, PoolError::ProviderUnavailable("SUN".to_string()));
    }

    #[test]
    fn test_default_provider_is_substituted() {
        let digest = DigestFactory::new(&DigestSpec::default().with_provider(""))
            .unwrap()
            .create()
            .unwrap();
        assert_eq!(digest.provider(), DEFAULT_DIGEST_PROVIDER);
    }

    #[test]
    fn test_factory_reset_discards_input() {
        let factory = DigestFactory::new(&DigestSpec::default()).unwrap();
        let mut dirty = factory.create().unwrap();
        dirty.update(b"left over");
        factory.reset(&mut dirty);

        let clean = factory.create().unwrap();
        assert_eq!(dirty.digest(), clean.digest());
    }

    #[test]
    fn test_digest_of_ignores_pending_input() {
        let digest = DigestFactory::new(&DigestSpec::default()).unwrap().create().unwrap();
        digest.update(b"noise");
        let hash = digest.digest_of(b"abc");
        assert_eq!(hex(&hash[..4]), "ba7816bf");
    }
}
