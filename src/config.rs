//! # Configuration Management
//!
//! Startup configuration for a kernel instance.
//!
//! A kernel needs three things before it can serve: where to bind its
//! endpoints and how to sign messages (the connection descriptor), what to
//! advertise in `kernel_info_reply` (the kernel identity), and how to log.
//!
//! ## Configuration Sources
//! - Connection files in the standard JSON layout via
//!   [`ConnectionInfo::from_connection_file`]
//! - TOML files via [`KernelConfig::from_file`]
//! - Environment overrides via [`KernelConfig::apply_env`]
//!
//! ## Security Considerations
//! - An empty `key` turns message signing off entirely
//! - Hosts other than loopback expose unauthenticated heartbeats to the network

use crate::core::signer::{SignatureScheme, Signer, DEFAULT_SIGNATURE_SCHEME};
use crate::error::{KernelError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::Level;

/// Kernel messaging protocol version advertised by default
pub const PROTOCOL_VERSION: [u32; 2] = [4, 1];

/// Default transport scheme for endpoint addresses
pub const DEFAULT_TRANSPORT: &str = "tcp";

/// Main kernel configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct KernelConfig {
    /// Endpoint addresses and signing parameters
    #[serde(default)]
    pub connection: ConnectionInfo,

    /// Identity reported by `kernel_info_reply`
    #[serde(default)]
    pub identity: KernelIdentity,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl KernelConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| KernelError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| KernelError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| KernelError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Defaults plus a connection descriptor read from a JSON connection file
    pub fn with_connection_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            connection: ConnectionInfo::from_connection_file(path)?,
            ..Self::default()
        })
    }

    /// Override connection settings from environment variables
    pub fn apply_env(&mut self) {
        if let Ok(ip) = std::env::var("KERNEL_PROTOCOL_IP") {
            self.connection.ip = ip;
        }

        if let Ok(key) = std::env::var("KERNEL_PROTOCOL_KEY") {
            self.connection.key = key;
        }

        if let Ok(scheme) = std::env::var("KERNEL_PROTOCOL_SIGNATURE_SCHEME") {
            self.connection.signature_scheme = scheme;
        }
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.connection.validate());
        errors.extend(self.identity.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(KernelError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Connection descriptor, field-compatible with kernel connection files.
///
/// Ports of `0` ask the OS for an ephemeral port.
#[derive(Clone, Deserialize, Serialize)]
pub struct ConnectionInfo {
    /// Transport scheme, e.g. `tcp`
    #[serde(default = "default_transport")]
    pub transport: String,

    /// Host the endpoints bind to
    pub ip: String,

    /// Request/response endpoint port
    pub shell_port: u16,

    /// Broadcast endpoint port
    pub iopub_port: u16,

    /// Heartbeat endpoint port
    pub hb_port: u16,

    /// MAC scheme name, e.g. `hmac-sha256`
    #[serde(default = "default_signature_scheme")]
    pub signature_scheme: String,

    /// Shared secret; empty disables signing
    #[serde(default)]
    pub key: String,
}

fn default_transport() -> String {
    DEFAULT_TRANSPORT.to_string()
}

fn default_signature_scheme() -> String {
    DEFAULT_SIGNATURE_SCHEME.to_string()
}

impl Default for ConnectionInfo {
    fn default() -> Self {
        Self {
            transport: default_transport(),
            ip: String::from("127.0.0.1"),
            shell_port: 0,
            iopub_port: 0,
            hb_port: 0,
            signature_scheme: default_signature_scheme(),
            key: String::new(),
        }
    }
}

// Keep the key out of logs.
impl std::fmt::Debug for ConnectionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionInfo")
            .field("transport", &self.transport)
            .field("ip", &self.ip)
            .field("shell_port", &self.shell_port)
            .field("iopub_port", &self.iopub_port)
            .field("hb_port", &self.hb_port)
            .field("signature_scheme", &self.signature_scheme)
            .field("signed", &!self.key.is_empty())
            .finish()
    }
}

impl ConnectionInfo {
    /// Read a JSON connection file. Unknown fields are ignored.
    pub fn from_connection_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            KernelError::ConfigError(format!("Failed to read connection file: {e}"))
        })?;
        Self::from_json(&contents)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| KernelError::ConfigError(format!("Failed to parse connection file: {e}")))
    }

    pub fn shell_address(&self) -> String {
        self.address(self.shell_port)
    }

    pub fn iopub_address(&self) -> String {
        self.address(self.iopub_port)
    }

    pub fn heartbeat_address(&self) -> String {
        self.address(self.hb_port)
    }

    fn address(&self, port: u16) -> String {
        format!("{}://{}:{}", self.transport, self.ip, port)
    }

    /// Build the message signer described by this descriptor
    pub fn signer(&self) -> Result<Signer> {
        Signer::from_config(&self.signature_scheme, &self.key)
    }

    /// Validate connection configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.transport != "tcp" {
            errors.push(format!(
                "Unsupported transport: '{}' (expected 'tcp')",
                self.transport
            ));
        }

        if self.ip.is_empty() {
            errors.push("Connection ip cannot be empty".to_string());
        } else if self.ip.parse::<std::net::IpAddr>().is_err() && self.ip != "localhost" {
            errors.push(format!(
                "Invalid connection ip: '{}' (expected an IP address)",
                self.ip
            ));
        }

        let ports = [self.shell_port, self.iopub_port, self.hb_port];
        let fixed: Vec<u16> = ports.into_iter().filter(|p| *p != 0).collect();
        let unique: HashSet<u16> = fixed.iter().copied().collect();
        if unique.len() != fixed.len() {
            errors.push(format!(
                "Endpoint ports must be distinct: shell={}, iopub={}, hb={}",
                self.shell_port, self.iopub_port, self.hb_port
            ));
        }

        if self.signature_scheme.parse::<SignatureScheme>().is_err() {
            errors.push(format!(
                "Unsupported signature scheme: '{}'",
                self.signature_scheme
            ));
        }

        errors
    }
}

/// What the kernel reports about itself in `kernel_info_reply`
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct KernelIdentity {
    /// Name of the evaluated language
    pub language: String,

    /// Version of the evaluated language, most significant part first
    pub language_version: Vec<u32>,

    /// Messaging protocol version spoken by this kernel
    #[serde(default = "default_protocol_version")]
    pub protocol_version: Vec<u32>,
}

fn default_protocol_version() -> Vec<u32> {
    PROTOCOL_VERSION.to_vec()
}

impl Default for KernelIdentity {
    fn default() -> Self {
        Self {
            language: String::from("javascript"),
            language_version: vec![0, 0, 0],
            protocol_version: default_protocol_version(),
        }
    }
}

impl KernelIdentity {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.language.is_empty() {
            errors.push("Kernel language cannot be empty".to_string());
        }

        if self.protocol_version.is_empty() {
            errors.push("Protocol version cannot be empty".to_string());
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("kernel-protocol"),
            log_level: Level::INFO,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
