// portero-config/src/config.rs
// ============================================================================
// Module: Portero Configuration Documents
// Description: Loading and validation for backends, replacements, policies.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: portero-core, serde, toml
// ============================================================================

//! ## Overview
//! Three documents describe a deployment: `backends.toml` (the providers and
//! their pinned tool sets), `replacements.toml` (anonymizer rules), and
//! `policies.toml` (static policy plus grant settings). Documents are loaded
//! with size limits and validated fail-closed; secrets stay in the
//! environment and enter documents only through `${VAR}` placeholders.
//! An unresolved placeholder skips the owning backend or replacement rule
//! with a stderr warning and leaves the rest of the configuration usable.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::io::Write;
use std::path::Path;

use portero_core::PolicyAction;
use portero_core::ReplacementRule;
use portero_core::StaticPatternRule;
use portero_core::StaticPolicy;
use portero_core::ToolPattern;
use portero_core::core::replacement::validate_rules;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::env::substitute;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Backends document filename.
const BACKENDS_FILE: &str = "backends.toml";
/// Replacements document filename.
const REPLACEMENTS_FILE: &str = "replacements.toml";
/// Policies document filename.
const POLICIES_FILE: &str = "policies.toml";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;
/// Maximum number of configured backends.
pub(crate) const MAX_BACKENDS: usize = 64;
/// Maximum backend name length.
pub(crate) const MAX_BACKEND_NAME_LENGTH: usize = 64;
/// Maximum number of replacement rules.
pub(crate) const MAX_REPLACEMENT_RULES: usize = 256;
/// Maximum number of static policy entries (exact plus patterns).
pub(crate) const MAX_POLICY_ENTRIES: usize = 1024;
/// Default short grant lifetime (one hour).
pub(crate) const DEFAULT_SHORT_GRANT_TTL_MS: i64 = 60 * 60 * 1000;
/// Default long grant lifetime (one day).
pub(crate) const DEFAULT_LONG_GRANT_TTL_MS: i64 = 24 * 60 * 60 * 1000;

/// Environment variable holding the HTTP bearer token.
pub const BEARER_TOKEN_ENV: &str = "PORTERO_BEARER_TOKEN";
/// Environment variable holding the TLS certificate path.
pub const TLS_CERT_ENV: &str = "PORTERO_TLS_CERT";
/// Environment variable holding the TLS private key path.
pub const TLS_KEY_ENV: &str = "PORTERO_TLS_KEY";
/// Environment variable holding the approval-channel bot token.
pub const CHANNEL_TOKEN_ENV: &str = "PORTERO_CHANNEL_TOKEN";
/// Environment variable holding the admin pairing secret.
pub const PAIRING_SECRET_ENV: &str = "PORTERO_PAIRING_SECRET";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading and validation errors. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required document is missing.
    #[error("missing configuration document: {0}")]
    Missing(String),
    /// A document could not be read.
    #[error("config read failed for {0}: {1}")]
    Read(String, String),
    /// A document exceeds the size limit.
    #[error("config document too large: {0}")]
    TooLarge(String),
    /// A document failed to parse.
    #[error("config parse failed for {0}: {1}")]
    Parse(String, String),
    /// A document failed validation.
    #[error("config invalid: {0}")]
    Validate(String),
    /// A required environment variable is missing.
    #[error("missing environment variable: {0}")]
    MissingEnv(String),
}

// ============================================================================
// SECTION: Documents
// ============================================================================

/// One configured backend provider.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Registry key used as the namespace prefix.
    pub name: String,
    /// JSON-RPC endpoint URL.
    pub url: String,
    /// Optional bearer token sent to the backend.
    #[serde(default)]
    pub bearer_token: Option<String>,
    /// Pinned local tool names; absent means the backend does not pin.
    #[serde(default)]
    pub pinned_tools: Option<Vec<String>>,
}

/// Backends document shape.
#[derive(Debug, Default, Deserialize)]
struct BackendsDocument {
    /// Configured backends.
    #[serde(default)]
    backends: Vec<BackendConfig>,
}

/// Replacements document shape.
#[derive(Debug, Default, Deserialize)]
struct ReplacementsDocument {
    /// Anonymizer rules in application order.
    #[serde(default)]
    replacements: Vec<ReplacementRule>,
}

/// Grant lifetimes and optional pending-approval expiry.
#[derive(Debug, Clone, Deserialize)]
pub struct GrantSettings {
    /// Lifetime of `approve+grant-short` grants in milliseconds.
    #[serde(default = "default_short_ttl")]
    pub short_ttl_ms: i64,
    /// Lifetime of `approve+grant-long` grants in milliseconds.
    #[serde(default = "default_long_ttl")]
    pub long_ttl_ms: i64,
    /// Optional age after which pending approvals expire; absent means
    /// tasks persist until admin action.
    #[serde(default)]
    pub approval_ttl_ms: Option<i64>,
}

impl Default for GrantSettings {
    fn default() -> Self {
        Self {
            short_ttl_ms: default_short_ttl(),
            long_ttl_ms: default_long_ttl(),
            approval_ttl_ms: None,
        }
    }
}

const fn default_short_ttl() -> i64 {
    DEFAULT_SHORT_GRANT_TTL_MS
}

const fn default_long_ttl() -> i64 {
    DEFAULT_LONG_GRANT_TTL_MS
}

/// Policies document shape.
#[derive(Debug, Clone, Deserialize)]
pub struct PoliciesConfig {
    /// Action when no entry matches.
    #[serde(default = "default_action")]
    pub default_action: PolicyAction,
    /// Exact tool-name entries.
    #[serde(default)]
    pub tools: BTreeMap<String, PolicyAction>,
    /// Pattern entries in document order.
    #[serde(default)]
    pub patterns: Vec<StaticPatternRule>,
    /// Grant lifetimes and approval expiry.
    #[serde(default)]
    pub grants: GrantSettings,
}

impl Default for PoliciesConfig {
    fn default() -> Self {
        Self {
            default_action: default_action(),
            tools: BTreeMap::new(),
            patterns: Vec::new(),
            grants: GrantSettings::default(),
        }
    }
}

const fn default_action() -> PolicyAction {
    PolicyAction::RequireApproval
}

impl PoliciesConfig {
    /// Converts the document into the resolver's static policy.
    #[must_use]
    pub fn to_static_policy(&self) -> StaticPolicy {
        StaticPolicy {
            exact: self.tools.clone(),
            patterns: self.patterns.clone(),
            default_action: self.default_action,
        }
    }
}

// ============================================================================
// SECTION: Environment
// ============================================================================

/// TLS material paths.
#[derive(Debug, Clone)]
pub struct TlsPaths {
    /// PEM certificate chain path.
    pub cert_path: String,
    /// PEM private key path.
    pub key_path: String,
}

/// Secrets and transport settings read from the environment.
#[derive(Debug, Clone)]
pub struct ServerEnv {
    /// Bearer token required on `/mcp/message`.
    pub bearer_token: String,
    /// Optional TLS material; plain HTTP when absent.
    pub tls: Option<TlsPaths>,
    /// Optional approval-channel bot token.
    pub channel_token: Option<String>,
    /// Optional admin pairing secret.
    pub pairing_secret: Option<String>,
}

impl ServerEnv {
    /// Reads server settings from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnv`] when the bearer token is absent
    /// or the TLS variables are only partially set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let bearer_token = env::var(BEARER_TOKEN_ENV)
            .map_err(|_| ConfigError::MissingEnv(BEARER_TOKEN_ENV.to_string()))?;
        let cert = env::var(TLS_CERT_ENV).ok();
        let key = env::var(TLS_KEY_ENV).ok();
        let tls = match (cert, key) {
            (Some(cert_path), Some(key_path)) => Some(TlsPaths {
                cert_path,
                key_path,
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::MissingEnv(TLS_KEY_ENV.to_string())),
            (None, Some(_)) => return Err(ConfigError::MissingEnv(TLS_CERT_ENV.to_string())),
        };
        Ok(Self {
            bearer_token,
            tls,
            channel_token: env::var(CHANNEL_TOKEN_ENV).ok(),
            pairing_secret: env::var(PAIRING_SECRET_ENV).ok(),
        })
    }
}

// ============================================================================
// SECTION: Gateway Configuration
// ============================================================================

/// Fully loaded and validated gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Backends with resolved placeholders.
    pub backends: Vec<BackendConfig>,
    /// Backend names skipped for unresolved placeholders.
    pub skipped_backends: Vec<String>,
    /// Anonymizer rules with resolved placeholders, in document order.
    pub replacements: Vec<ReplacementRule>,
    /// Static policy and grant settings.
    pub policies: PoliciesConfig,
}

impl GatewayConfig {
    /// Loads and validates the three documents from `config_dir`, resolving
    /// placeholders from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a document is missing, unreadable,
    /// oversized, unparsable, or invalid.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        Self::load_with(config_dir, &|name| env::var(name).ok())
    }

    /// Loads with an explicit environment lookup; used by tests.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a document is missing, unreadable,
    /// oversized, unparsable, or invalid.
    pub fn load_with(
        config_dir: &Path,
        lookup: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let backends_path = config_dir.join(BACKENDS_FILE);
        if !backends_path.exists() {
            return Err(ConfigError::Missing(BACKENDS_FILE.to_string()));
        }
        let backends: BackendsDocument = load_document(&backends_path)?;
        let replacements: ReplacementsDocument =
            load_optional_document(&config_dir.join(REPLACEMENTS_FILE))?;
        let policies: PoliciesConfig = load_optional_document(&config_dir.join(POLICIES_FILE))?;

        let (backends, skipped_backends) = resolve_backends(backends.backends, lookup)?;
        let replacements = resolve_replacements(replacements.replacements, lookup)?;
        let config = Self {
            backends,
            skipped_backends,
            replacements,
            policies,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validates cross-field constraints fail-closed.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validate`] naming the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backends.len() > MAX_BACKENDS {
            return Err(ConfigError::Validate(format!("more than {MAX_BACKENDS} backends")));
        }
        let mut names = BTreeSet::new();
        for backend in &self.backends {
            if backend.name.is_empty() || backend.name.len() > MAX_BACKEND_NAME_LENGTH {
                return Err(ConfigError::Validate(format!(
                    "backend name invalid: {:?}",
                    backend.name
                )));
            }
            if backend.name.contains('/') || backend.name.contains(':') {
                return Err(ConfigError::Validate(format!(
                    "backend name must not contain namespace separators: {}",
                    backend.name
                )));
            }
            if !names.insert(backend.name.as_str()) {
                return Err(ConfigError::Validate(format!(
                    "duplicate backend name: {}",
                    backend.name
                )));
            }
            if backend.url.is_empty() {
                return Err(ConfigError::Validate(format!(
                    "backend {} requires a url",
                    backend.name
                )));
            }
            if let Some(pinned) = &backend.pinned_tools
                && pinned.iter().any(String::is_empty)
            {
                return Err(ConfigError::Validate(format!(
                    "backend {} has an empty pinned tool name",
                    backend.name
                )));
            }
        }
        if self.replacements.len() > MAX_REPLACEMENT_RULES {
            return Err(ConfigError::Validate(format!(
                "more than {MAX_REPLACEMENT_RULES} replacement rules"
            )));
        }
        validate_rules(&self.replacements)
            .map_err(|err| ConfigError::Validate(err.to_string()))?;
        let entry_count = self.policies.tools.len() + self.policies.patterns.len();
        if entry_count > MAX_POLICY_ENTRIES {
            return Err(ConfigError::Validate(format!(
                "more than {MAX_POLICY_ENTRIES} policy entries"
            )));
        }
        for entry in &self.policies.patterns {
            ToolPattern::new(entry.pattern.as_str()).map_err(|err| {
                ConfigError::Validate(format!("policy pattern {:?}: {err}", entry.pattern))
            })?;
        }
        if self.policies.grants.short_ttl_ms <= 0 || self.policies.grants.long_ttl_ms <= 0 {
            return Err(ConfigError::Validate("grant ttls must be positive".to_string()));
        }
        if let Some(ttl) = self.policies.grants.approval_ttl_ms
            && ttl <= 0
        {
            return Err(ConfigError::Validate("approval_ttl_ms must be positive".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Loading Helpers
// ============================================================================

/// Loads a document enforcing the size limit.
fn load_document<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let name = path.display().to_string();
    let metadata =
        fs::metadata(path).map_err(|err| ConfigError::Read(name.clone(), err.to_string()))?;
    if metadata.len() > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::TooLarge(name));
    }
    let content =
        fs::read_to_string(path).map_err(|err| ConfigError::Read(name.clone(), err.to_string()))?;
    toml::from_str(&content).map_err(|err| ConfigError::Parse(name, err.to_string()))
}

/// Loads a document that may be absent, substituting its default shape.
fn load_optional_document<T: DeserializeOwned + Default>(path: &Path) -> Result<T, ConfigError> {
    if path.exists() { load_document(path) } else { Ok(T::default()) }
}

/// Resolves placeholders per backend; unresolved variables skip the backend.
fn resolve_backends(
    backends: Vec<BackendConfig>,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<(Vec<BackendConfig>, Vec<String>), ConfigError> {
    let mut resolved = Vec::with_capacity(backends.len());
    let mut skipped = Vec::new();
    for mut backend in backends {
        let outcome = substitute(&backend.url, lookup).and_then(|url| {
            backend.url = url;
            match backend.bearer_token.take() {
                Some(token) => substitute(&token, lookup).map(|token| {
                    backend.bearer_token = Some(token);
                }),
                None => Ok(()),
            }
        });
        match outcome {
            Ok(()) => resolved.push(backend),
            Err(variable) => {
                warn_skipped("backend", &backend.name, &variable);
                skipped.push(backend.name.clone());
            }
        }
    }
    Ok((resolved, skipped))
}

/// Resolves placeholders per replacement rule; unresolved variables skip the
/// rule.
fn resolve_replacements(
    replacements: Vec<ReplacementRule>,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<Vec<ReplacementRule>, ConfigError> {
    let mut resolved = Vec::with_capacity(replacements.len());
    for (index, mut rule) in replacements.into_iter().enumerate() {
        let outcome = substitute(&rule.fake, lookup)
            .and_then(|fake| {
                rule.fake = fake;
                substitute(&rule.real, lookup)
            })
            .and_then(|real| {
                rule.real = real;
                match rule.response_replacement.take() {
                    Some(replacement) => substitute(&replacement, lookup).map(|replacement| {
                        rule.response_replacement = Some(replacement);
                    }),
                    None => Ok(()),
                }
            });
        match outcome {
            Ok(()) => resolved.push(rule),
            Err(variable) => warn_skipped("replacement rule", &index.to_string(), &variable),
        }
    }
    Ok(resolved)
}

/// Warns on stderr that an entry was skipped for an unresolved variable.
fn warn_skipped(kind: &str, name: &str, variable: &str) {
    let _ = writeln!(
        std::io::stderr(),
        "portero: WARNING: skipping {kind} {name}: unresolved placeholder ${{{variable}}}"
    );
}

// ============================================================================
// SECTION: Tests
// ============================================================================
