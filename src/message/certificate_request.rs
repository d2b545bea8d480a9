use nom::error::{Error, ErrorKind};
use nom::{Err, IResult};

use crate::codec::{len16, len8, WriteExt};
use crate::context::Role;
use crate::extension::Extension;
use crate::types::{SignatureScheme, TlsVersion};

/// ClientCertificateType rsa_sign.
pub const RSA_SIGN: u8 = 1;
/// ClientCertificateType ecdsa_sign.
pub const ECDSA_SIGN: u8 = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateRequest {
    Legacy {
        certificate_types: Vec<u8>,
        /// Only on the wire from TLS 1.2.
        signature_schemes: Vec<SignatureScheme>,
        /// DER distinguished names.
        authorities: Vec<Vec<u8>>,
    },
    Tls13 {
        context: Vec<u8>,
        extensions: Vec<Extension>,
    },
}

impl CertificateRequest {
    pub fn parse(input: &[u8], version: TlsVersion) -> IResult<&[u8], CertificateRequest> {
        if version.is_tls13() {
            let (input, context) = len8(input)?;
            let (input, extensions) = Extension::parse_list(input, Role::Server)?;
            return Ok((
                input,
                CertificateRequest::Tls13 {
                    context: context.to_vec(),
                    extensions,
                },
            ));
        }

        let (input, types) = len8(input)?;
        if types.is_empty() {
            return Err(Err::Failure(Error::new(types, ErrorKind::LengthValue)));
        }

        let (input, signature_schemes) = if version.is_at_least(TlsVersion::Tls12) {
            let (input, schemes) = len16(input)?;
            if schemes.len() % 2 != 0 {
                return Err(Err::Failure(Error::new(schemes, ErrorKind::LengthValue)));
            }
            let schemes = schemes
                .chunks_exact(2)
                .map(|c| SignatureScheme::from_u16(u16::from_be_bytes([c[0], c[1]])))
                .collect();
            (input, schemes)
        } else {
            (input, Vec::new())
        };

        let (input, mut names) = len16(input)?;
        let mut authorities = Vec::new();
        while !names.is_empty() {
            let (rest, name) = len16(names)?;
            authorities.push(name.to_vec());
            names = rest;
        }

        Ok((
            input,
            CertificateRequest::Legacy {
                certificate_types: types.to_vec(),
                signature_schemes,
                authorities,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>, version: TlsVersion) {
        match self {
            CertificateRequest::Legacy {
                certificate_types,
                signature_schemes,
                authorities,
            } => {
                output.put_bytes8(certificate_types);
                if version.is_at_least(TlsVersion::Tls12) {
                    output.with_len16(|out| {
                        for s in signature_schemes {
                            s.serialize(out);
                        }
                    });
                }
                output.with_len16(|out| {
                    for name in authorities {
                        out.put_bytes16(name);
                    }
                });
            }
            CertificateRequest::Tls13 {
                context,
                extensions,
            } => {
                output.put_bytes8(context);
                Extension::serialize_list(extensions, output);
            }
        }
    }

    /// Schemes the server accepts for the client's CertificateVerify.
    pub fn signature_schemes(&self) -> Vec<SignatureScheme> {
        match self {
            CertificateRequest::Legacy {
                signature_schemes, ..
            } => signature_schemes.clone(),
            CertificateRequest::Tls13 { extensions, .. } => extensions
                .iter()
                .find_map(|e| match e {
                    Extension::SignatureAlgorithms(s) => Some(s.clone()),
                    _ => None,
                })
                .unwrap_or_default(),
        }
    }

    /// TLS 1.3 context echoed in the client's Certificate.
    pub fn context(&self) -> &[u8] {
        match self {
            CertificateRequest::Legacy { .. } => &[],
            CertificateRequest::Tls13 { context, .. } => context,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const MESSAGE: &[u8] = &[
        0x02, // CertificateTypes length
        0x01, 0x40, // rsa_sign, ecdsa_sign
        0x00, 0x04, // SignatureSchemes length
        0x04, 0x03, // ecdsa_secp256r1_sha256
        0x08, 0x04, // rsa_pss_rsae_sha256
        0x00, 0x06, // CertificateAuthorities length
        0x00, 0x04, // DistinguishedName length
        0x30, 0x02, 0x31, 0x00, // DistinguishedName
    ];

    fn request() -> CertificateRequest {
        CertificateRequest::Legacy {
            certificate_types: vec![RSA_SIGN, ECDSA_SIGN],
            signature_schemes: vec![
                SignatureScheme::ECDSA_SECP256R1_SHA256,
                SignatureScheme::RSA_PSS_RSAE_SHA256,
            ],
            authorities: vec![vec![0x30, 0x02, 0x31, 0x00]],
        }
    }

    #[test]
    fn roundtrip() {
        let request = request();

        let mut serialized = Vec::new();
        request.serialize(&mut serialized, TlsVersion::Tls12);
        assert_eq!(serialized, MESSAGE);

        let (rest, parsed) = CertificateRequest::parse(&serialized, TlsVersion::Tls12).unwrap();
        assert_eq!(parsed, request);
        assert!(rest.is_empty());
    }

    #[test]
    fn tls10_has_no_schemes() {
        let mut serialized = Vec::new();
        request().serialize(&mut serialized, TlsVersion::Tls10);
        assert_eq!(serialized.len(), MESSAGE.len() - 6);

        let (_, parsed) = CertificateRequest::parse(&serialized, TlsVersion::Tls10).unwrap();
        assert!(parsed.signature_schemes().is_empty());
    }

    #[test]
    fn tls13_schemes_from_extension() {
        let request = CertificateRequest::Tls13 {
            context: Vec::new(),
            extensions: vec![Extension::SignatureAlgorithms(vec![
                SignatureScheme::ED25519,
            ])],
        };

        let mut serialized = Vec::new();
        request.serialize(&mut serialized, TlsVersion::Tls13);
        let (rest, parsed) = CertificateRequest::parse(&serialized, TlsVersion::Tls13).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed.signature_schemes(), vec![SignatureScheme::ED25519]);
        assert!(parsed.context().is_empty());
    }
}
