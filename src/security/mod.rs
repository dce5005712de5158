/// Security utilities.
///
/// TLS support (gated behind the `tls` feature). Client certificate pinning
/// and envelope-encrypted secrets, which the original app-credential model
/// relied on, have no counterpart here: every user authenticates with a
/// single bearer credential (§6) validated by
/// [`crate::external::AuthProvider`].
pub mod tls;

pub use tls::{ClientCertificateFingerprint, CLIENT_FINGERPRINT_HEADER_CANDIDATES};

#[cfg(feature = "tls")]
pub use tls::build_rustls_config;
