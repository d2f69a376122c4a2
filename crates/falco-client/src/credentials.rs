//! TLS credential assembly for network connections.
//!
//! Falco's gRPC server requires mutual TLS when it listens on a TCP port:
//! 1. The client presents its own certificate and private key.
//! 2. The server certificate is verified against the configured CA root,
//!    and ONLY that root.
//! 3. The server name checked during the handshake is the configured hostname.
//!
//! Everything is read and parsed up front so that bad material is reported as
//! a [`CredentialError`] before any dial is attempted. That includes a private
//! key that does not belong to the client certificate: the key signs a fixed
//! message and the certificate's public key has to verify it.

use std::fs;
use std::path::Path;

use rustls::sign::any_supported_type;
use rustls::{PrivateKey, SignatureScheme};
use rustls_pemfile::Item;
use tonic::transport::{Certificate, ClientTlsConfig, Identity};

use crate::error::CredentialError;

/// Load the client certificate/private-key pair.
///
/// The certificate file must contain at least one PEM certificate and the key
/// file at least one PEM private key (PKCS#8, PKCS#1 RSA, or SEC1 EC). The
/// first key must decode and belong to the leaf (first) certificate.
pub fn load_key_pair(cert_file: &Path, key_file: &Path) -> Result<Identity, CredentialError> {
    let cert_pem = fs::read(cert_file).map_err(|e| {
        CredentialError::key_pair(cert_file, key_file, format!("cannot read certificate: {e}"))
    })?;
    let key_pem = fs::read(key_file).map_err(|e| {
        CredentialError::key_pair(cert_file, key_file, format!("cannot read private key: {e}"))
    })?;

    let certs = rustls_pemfile::certs(&mut cert_pem.as_slice()).map_err(|e| {
        CredentialError::key_pair(cert_file, key_file, format!("malformed certificate: {e}"))
    })?;
    let Some(leaf) = certs.first() else {
        return Err(CredentialError::key_pair(
            cert_file,
            key_file,
            "no PEM certificate found",
        ));
    };

    let items = rustls_pemfile::read_all(&mut key_pem.as_slice()).map_err(|e| {
        CredentialError::key_pair(cert_file, key_file, format!("malformed private key: {e}"))
    })?;
    let Some(key_der) = items.into_iter().find_map(|item| match item {
        Item::PKCS8Key(der) | Item::RSAKey(der) | Item::ECKey(der) => Some(der),
        _ => None,
    }) else {
        return Err(CredentialError::key_pair(
            cert_file,
            key_file,
            "no PEM private key found",
        ));
    };

    check_key_matches(leaf, &PrivateKey(key_der))
        .map_err(|reason| CredentialError::key_pair(cert_file, key_file, reason))?;

    tracing::debug!(
        cert = %cert_file.display(),
        key = %key_file.display(),
        chain_len = certs.len(),
        "Loaded client key pair"
    );
    Ok(Identity::from_pem(cert_pem, key_pem))
}

/// Signatures the client key may be asked to produce, with the matching
/// verification algorithm for the certificate's public key.
static MATCH_SCHEMES: [(SignatureScheme, &webpki::SignatureAlgorithm); 4] = [
    (SignatureScheme::ECDSA_NISTP256_SHA256, &webpki::ECDSA_P256_SHA256),
    (SignatureScheme::ECDSA_NISTP384_SHA384, &webpki::ECDSA_P384_SHA384),
    (SignatureScheme::ED25519, &webpki::ED25519),
    (SignatureScheme::RSA_PKCS1_SHA256, &webpki::RSA_PKCS1_2048_8192_SHA256),
];

const MATCH_MESSAGE: &[u8] = b"falco client key pair check";

/// Sign with `key` and verify the signature with the public key in `leaf`.
fn check_key_matches(leaf: &[u8], key: &PrivateKey) -> Result<(), String> {
    let signing_key =
        any_supported_type(key).map_err(|e| format!("malformed private key: {e}"))?;

    let offered: Vec<SignatureScheme> = MATCH_SCHEMES.iter().map(|(scheme, _)| *scheme).collect();
    let signer = signing_key
        .choose_scheme(&offered)
        .ok_or_else(|| "unsupported private key type".to_string())?;
    let signature = signer
        .sign(MATCH_MESSAGE)
        .map_err(|e| format!("private key cannot sign: {e}"))?;

    let alg = MATCH_SCHEMES
        .iter()
        .find(|(scheme, _)| *scheme == signer.scheme())
        .map(|(_, alg)| *alg)
        .ok_or_else(|| "unsupported private key type".to_string())?;
    let cert = webpki::EndEntityCert::try_from(leaf)
        .map_err(|e| format!("malformed certificate: {e:?}"))?;

    cert.verify_signature(alg, MATCH_MESSAGE, &signature)
        .map_err(|_| "private key does not match certificate".to_string())
}

/// Read the CA root bundle that server certificates are verified against.
pub fn load_ca_root(ca_root_file: &Path) -> Result<Certificate, CredentialError> {
    let ca_pem = fs::read(ca_root_file).map_err(|source| CredentialError::ReadCaRoot {
        path: ca_root_file.to_path_buf(),
        source,
    })?;

    // A file that is readable but yields no certificate is as useless as an
    // empty trust pool.
    let roots = rustls_pemfile::certs(&mut ca_pem.as_slice()).unwrap_or_default();
    if roots.is_empty() {
        return Err(CredentialError::AppendCaRoot {
            path: ca_root_file.to_path_buf(),
        });
    }

    tracing::debug!(
        ca_root = %ca_root_file.display(),
        roots = roots.len(),
        "Loaded CA root certificates"
    );
    Ok(Certificate::from_pem(ca_pem))
}

/// Build the mutual-TLS client configuration for `hostname`.
///
/// The key pair is loaded before the CA root, so a broken key pair is
/// reported even when the CA root is broken too.
pub fn client_tls_config(
    hostname: &str,
    cert_file: &Path,
    key_file: &Path,
    ca_root_file: &Path,
) -> Result<ClientTlsConfig, CredentialError> {
    let identity = load_key_pair(cert_file, key_file)?;
    let ca_root = load_ca_root(ca_root_file)?;

    Ok(ClientTlsConfig::new()
        .domain_name(hostname)
        .ca_certificate(ca_root)
        .identity(identity))
}
