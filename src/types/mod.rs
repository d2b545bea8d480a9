//! Registry types shared by every layer: versions, cipher suites, groups,
//! signature schemes, alerts and record content types.

mod alert;
pub use alert::{Alert, AlertDescription, AlertLevel};

mod cipher_suite;
pub use cipher_suite::{Auth, BulkCipher, CipherSuite, CipherSuiteParams};
pub use cipher_suite::{KeyExchangeKind, KeyExchangeType};

mod content_type;
pub use content_type::{CompressionMethod, ContentType};

mod named_group;
pub use named_group::NamedGroup;

mod signature;
pub use signature::{HashAlgorithm, SignatureAlgorithm, SignatureScheme};

pub(crate) mod version;
pub use version::{ProtocolVersion, TlsVersion, Transport};
