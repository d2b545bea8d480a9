//! Hash implementations using RustCrypto.

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};

use crate::crypto::provider::{HashContext, HashProvider};
use crate::types::HashAlgorithm;

/// Hash context implementation using RustCrypto.
#[derive(Clone)]
enum RustCryptoHashContext {
    Md5(Md5),
    Sha1(Sha1),
    Sha224(Sha224),
    Sha256(Sha256),
    Sha384(Sha384),
    Sha512(Sha512),
}

impl std::fmt::Debug for RustCryptoHashContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RustCryptoHashContext({:?})", self.algorithm())
    }
}

impl HashContext for RustCryptoHashContext {
    fn update(&mut self, data: &[u8]) {
        match self {
            RustCryptoHashContext::Md5(ctx) => ctx.update(data),
            RustCryptoHashContext::Sha1(ctx) => ctx.update(data),
            RustCryptoHashContext::Sha224(ctx) => ctx.update(data),
            RustCryptoHashContext::Sha256(ctx) => ctx.update(data),
            RustCryptoHashContext::Sha384(ctx) => ctx.update(data),
            RustCryptoHashContext::Sha512(ctx) => ctx.update(data),
        }
    }

    fn clone_and_finalize(&self) -> Vec<u8> {
        match self.clone() {
            RustCryptoHashContext::Md5(ctx) => ctx.finalize().to_vec(),
            RustCryptoHashContext::Sha1(ctx) => ctx.finalize().to_vec(),
            RustCryptoHashContext::Sha224(ctx) => ctx.finalize().to_vec(),
            RustCryptoHashContext::Sha256(ctx) => ctx.finalize().to_vec(),
            RustCryptoHashContext::Sha384(ctx) => ctx.finalize().to_vec(),
            RustCryptoHashContext::Sha512(ctx) => ctx.finalize().to_vec(),
        }
    }

    fn algorithm(&self) -> HashAlgorithm {
        match self {
            RustCryptoHashContext::Md5(_) => HashAlgorithm::MD5,
            RustCryptoHashContext::Sha1(_) => HashAlgorithm::SHA1,
            RustCryptoHashContext::Sha224(_) => HashAlgorithm::SHA224,
            RustCryptoHashContext::Sha256(_) => HashAlgorithm::SHA256,
            RustCryptoHashContext::Sha384(_) => HashAlgorithm::SHA384,
            RustCryptoHashContext::Sha512(_) => HashAlgorithm::SHA512,
        }
    }
}

/// Hash provider implementation.
#[derive(Debug)]
pub(super) struct RustCryptoHashProvider;

impl HashProvider for RustCryptoHashProvider {
    fn create_hash(&self, algorithm: HashAlgorithm) -> Result<Box<dyn HashContext>, String> {
        let ctx = match algorithm {
            HashAlgorithm::MD5 => RustCryptoHashContext::Md5(Md5::new()),
            HashAlgorithm::SHA1 => RustCryptoHashContext::Sha1(Sha1::new()),
            HashAlgorithm::SHA224 => RustCryptoHashContext::Sha224(Sha224::new()),
            HashAlgorithm::SHA256 => RustCryptoHashContext::Sha256(Sha256::new()),
            HashAlgorithm::SHA384 => RustCryptoHashContext::Sha384(Sha384::new()),
            HashAlgorithm::SHA512 => RustCryptoHashContext::Sha512(Sha512::new()),
            _ => return Err(format!("Unsupported hash algorithm: {:?}", algorithm)),
        };
        Ok(Box::new(ctx))
    }
}

/// Static instance of the hash provider.
pub(super) static HASH_PROVIDER: RustCryptoHashProvider = RustCryptoHashProvider;
