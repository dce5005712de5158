//! Security and authentication configuration types.

use super::defaults::{default_cors_origins, default_max_connections_per_user, default_require_auth};
use serde::{Deserialize, Serialize};

/// Security configuration.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SecurityConfig {
    /// Allowed CORS origins (comma-separated, or "*" for any).
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,
    /// Require a valid bearer credential on every duplex connection (§6
    /// AuthenticationFailed otherwise). The auth provider itself is an
    /// external collaborator (§6); this only gates whether it is consulted.
    #[serde(default = "default_require_auth")]
    pub require_auth: bool,
    /// Require authentication for the metrics endpoint.
    #[serde(default = "default_require_auth")]
    pub require_metrics_auth: bool,
    /// Shared bearer token for the metrics endpoint (if required).
    #[serde(default)]
    pub metrics_auth_token: Option<String>,
    /// Maximum concurrent connections accepted per user identity.
    #[serde(default = "default_max_connections_per_user")]
    pub max_connections_per_user: usize,
    /// Transport-level security configuration (TLS termination).
    #[serde(default)]
    pub transport: TransportSecurityConfig,
    /// Signing secret for the built-in stand-in auth provider used in
    /// development/test deployments (§6 collaborator: Auth provider).
    #[serde(default)]
    pub auth_secret: AuthSecretConfig,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            cors_origins: default_cors_origins(),
            require_auth: default_require_auth(),
            require_metrics_auth: default_require_auth(),
            metrics_auth_token: None,
            max_connections_per_user: default_max_connections_per_user(),
            transport: TransportSecurityConfig::default(),
            auth_secret: AuthSecretConfig::default(),
        }
    }
}

/// Transport-level security configuration.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct TransportSecurityConfig {
    #[serde(default)]
    pub tls: TlsServerConfig,
}

/// TLS server configuration.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct TlsServerConfig {
    /// Enable HTTPS/TLS termination for the HTTP + WebSocket listener.
    #[serde(default)]
    pub enabled: bool,
    /// Path to the PEM-encoded certificate chain presented to clients.
    #[serde(default)]
    pub certificate_path: Option<String>,
    /// Path to the PEM-encoded private key corresponding to the certificate chain.
    #[serde(default)]
    pub private_key_path: Option<String>,
}

/// Secret used by the bundled stand-in `AuthProvider` (HMAC-signed opaque
/// bearer tokens). Production deployments are expected to swap in a real
/// auth provider (§6); this keeps the seam testable without one.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AuthSecretConfig {
    #[serde(default)]
    pub hmac_key: Option<String>,
}

impl Default for AuthSecretConfig {
    fn default() -> Self {
        Self { hmac_key: None }
    }
}
