//! Key exchange group implementations using RustCrypto.

use p256::{ecdh::EphemeralSecret, PublicKey as P256PublicKey};
use p384::{ecdh::EphemeralSecret as P384EphemeralSecret, PublicKey as P384PublicKey};
use rand::rngs::OsRng;

use crate::crypto::dh::{DhKeyPair, DhParams};
use crate::crypto::provider::{ActiveKeyExchange, SupportedKxGroup};
use crate::types::NamedGroup;

/// (EC)DHE key exchange implementation.
enum KeyExchange {
    X25519 {
        secret: x25519_dalek::EphemeralSecret,
        public_key: Vec<u8>,
    },
    P256 {
        secret: EphemeralSecret,
        public_key: Vec<u8>,
    },
    P384 {
        secret: P384EphemeralSecret,
        public_key: Vec<u8>,
    },
    Ffdhe2048 {
        pair: DhKeyPair,
        public_key: Vec<u8>,
    },
}

impl std::fmt::Debug for KeyExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyExchange")
            .field("group", &self.group())
            .field("public_key_len", &self.pub_key().len())
            .finish_non_exhaustive()
    }
}

impl KeyExchange {
    fn new(group: NamedGroup) -> Result<Self, String> {
        match group {
            NamedGroup::X25519 => {
                let secret = x25519_dalek::EphemeralSecret::random_from_rng(OsRng);
                let public_key = x25519_dalek::PublicKey::from(&secret).as_bytes().to_vec();
                Ok(KeyExchange::X25519 { secret, public_key })
            }
            NamedGroup::Secp256r1 => {
                let secret = EphemeralSecret::random(&mut OsRng);
                let public_key = P256PublicKey::from(&secret).to_sec1_bytes().to_vec();
                Ok(KeyExchange::P256 { secret, public_key })
            }
            NamedGroup::Secp384r1 => {
                let secret = P384EphemeralSecret::random(&mut OsRng);
                let public_key = P384PublicKey::from(&secret).to_sec1_bytes().to_vec();
                Ok(KeyExchange::P384 { secret, public_key })
            }
            NamedGroup::Ffdhe2048 => {
                let pair = DhKeyPair::generate(DhParams::ffdhe2048());
                let public_key = pair.public_padded();
                Ok(KeyExchange::Ffdhe2048 { pair, public_key })
            }
            _ => Err("Unsupported group".to_string()),
        }
    }
}

impl ActiveKeyExchange for KeyExchange {
    fn pub_key(&self) -> &[u8] {
        match self {
            KeyExchange::X25519 { public_key, .. } => public_key,
            KeyExchange::P256 { public_key, .. } => public_key,
            KeyExchange::P384 { public_key, .. } => public_key,
            KeyExchange::Ffdhe2048 { public_key, .. } => public_key,
        }
    }

    fn complete(self: Box<Self>, peer_pub: &[u8]) -> Result<Vec<u8>, String> {
        match *self {
            KeyExchange::X25519 { secret, .. } => {
                let peer: [u8; 32] = peer_pub
                    .try_into()
                    .map_err(|_| "Invalid X25519 public key".to_string())?;
                let shared = secret.diffie_hellman(&x25519_dalek::PublicKey::from(peer));
                if !shared.was_contributory() {
                    return Err("Non-contributory X25519 exchange".to_string());
                }
                Ok(shared.as_bytes().to_vec())
            }
            KeyExchange::P256 { secret, .. } => {
                let peer_key = P256PublicKey::from_sec1_bytes(peer_pub)
                    .map_err(|_| "Invalid P-256 public key".to_string())?;
                let shared_secret = secret.diffie_hellman(&peer_key);
                Ok(shared_secret.raw_secret_bytes().to_vec())
            }
            KeyExchange::P384 { secret, .. } => {
                let peer_key = P384PublicKey::from_sec1_bytes(peer_pub)
                    .map_err(|_| "Invalid P-384 public key".to_string())?;
                let shared_secret = secret.diffie_hellman(&peer_key);
                Ok(shared_secret.raw_secret_bytes().to_vec())
            }
            KeyExchange::Ffdhe2048 { pair, .. } => {
                // Named finite field groups keep the secret at the length of p.
                let z = pair.agree(peer_pub, true)?;
                Ok(z.as_bytes().to_vec())
            }
        }
    }

    fn group(&self) -> NamedGroup {
        match self {
            KeyExchange::X25519 { .. } => NamedGroup::X25519,
            KeyExchange::P256 { .. } => NamedGroup::Secp256r1,
            KeyExchange::P384 { .. } => NamedGroup::Secp384r1,
            KeyExchange::Ffdhe2048 { .. } => NamedGroup::Ffdhe2048,
        }
    }
}

/// A key exchange group backed by [`KeyExchange`].
#[derive(Debug)]
struct Group(NamedGroup);

impl SupportedKxGroup for Group {
    fn name(&self) -> NamedGroup {
        self.0
    }

    fn start_exchange(&self) -> Result<Box<dyn ActiveKeyExchange>, String> {
        Ok(Box::new(KeyExchange::new(self.0)?))
    }
}

static KX_GROUP_X25519: Group = Group(NamedGroup::X25519);
static KX_GROUP_P256: Group = Group(NamedGroup::Secp256r1);
static KX_GROUP_P384: Group = Group(NamedGroup::Secp384r1);
static KX_GROUP_FFDHE2048: Group = Group(NamedGroup::Ffdhe2048);

/// All supported key exchange groups.
pub(super) static ALL_KX_GROUPS: &[&dyn SupportedKxGroup] = &[
    &KX_GROUP_X25519,
    &KX_GROUP_P256,
    &KX_GROUP_P384,
    &KX_GROUP_FFDHE2048,
];

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn every_group_agrees() {
        for g in ALL_KX_GROUPS {
            let a = g.start_exchange().unwrap();
            let b = g.start_exchange().unwrap();
            let a_pub = a.pub_key().to_vec();
            let b_pub = b.pub_key().to_vec();
            let za = a.complete(&b_pub).unwrap();
            let zb = b.complete(&a_pub).unwrap();
            assert_eq!(za, zb, "{:?}", g.name());
        }
    }
}
