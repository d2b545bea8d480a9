//! Owned secret byte buffers.

use std::fmt;

use zeroize::Zeroize;

/// Key material with deterministic destruction.
///
/// Move-only. The bytes are overwritten by [`Secret::destroy`] or, at the latest, on drop.
pub struct Secret(Vec<u8>);

impl Secret {
    pub fn new(bytes: Vec<u8>) -> Self {
        Secret(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Self {
        Secret(bytes.to_vec())
    }

    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Zero and release the secret.
    pub fn destroy(self) {
        drop(self)
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secret").field("len", &self.0.len()).finish()
    }
}

impl From<Vec<u8>> for Secret {
    fn from(value: Vec<u8>) -> Self {
        Secret(value)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn debug_hides_bytes() {
        let s = Secret::from_slice(&[0xAB; 4]);
        assert_eq!(format!("{:?}", s), "Secret { len: 4 }");
        assert_eq!(s.as_bytes(), &[0xAB; 4]);
        s.destroy();
    }
}
