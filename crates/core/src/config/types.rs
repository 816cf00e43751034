use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub carrier: CarrierConfig,
    #[serde(default)]
    pub labels: LabelConfig,
    #[serde(default)]
    pub print_queue: PrintQueueConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("postagem.db")
}

/// Correios API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CarrierConfig {
    /// API root (e.g., "https://api.correios.com.br")
    #[serde(default = "default_carrier_url")]
    pub base_url: String,
    /// Account user for the token endpoint
    #[serde(default)]
    pub user: String,
    /// Account access code (secret)
    #[serde(default)]
    pub access_code: String,
    /// Postage card number sent with every token request and pre-posting
    #[serde(default)]
    pub postage_card: String,
    /// Contract number, informational
    #[serde(default)]
    pub contract: Option<String>,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
    /// Service used for return shipments
    #[serde(default = "default_reverse_service")]
    pub reverse_service_code: String,
    /// Value sent as `logisticaReversa` on return shipments
    #[serde(default = "default_reverse_flag")]
    pub reverse_flag: String,
    /// Content declaration for outgoing orders
    #[serde(default = "default_declared_content")]
    pub declared_content: String,
    /// Content declaration for returns
    #[serde(default = "default_return_content")]
    pub return_content: String,
    /// Store address and contact
    #[serde(default)]
    pub sender: SenderConfig,
}

impl Default for CarrierConfig {
    fn default() -> Self {
        Self {
            base_url: default_carrier_url(),
            user: String::new(),
            access_code: String::new(),
            postage_card: String::new(),
            contract: None,
            timeout_secs: default_timeout(),
            reverse_service_code: default_reverse_service(),
            reverse_flag: default_reverse_flag(),
            declared_content: default_declared_content(),
            return_content: default_return_content(),
            sender: SenderConfig::default(),
        }
    }
}

impl CarrierConfig {
    /// Whether account credentials were provided.
    pub fn has_credentials(&self) -> bool {
        !self.user.is_empty() && !self.access_code.is_empty()
    }
}

fn default_carrier_url() -> String {
    "https://api.correios.com.br".to_string()
}

fn default_timeout() -> u32 {
    30
}

fn default_reverse_service() -> String {
    "03220".to_string()
}

fn default_reverse_flag() -> String {
    "N".to_string()
}

fn default_declared_content() -> String {
    "Pecas e Acessorios Automotivos".to_string()
}

fn default_return_content() -> String {
    "Devolucao de Pecas e Acessorios".to_string()
}

/// The store, as it appears on shipments.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SenderConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tax_id: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub number: String,
    #[serde(default)]
    pub complement: Option<String>,
    #[serde(default)]
    pub neighborhood: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
}

/// Label storage and polling
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LabelConfig {
    /// Directory label PDFs are written to
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,
    /// Prefix of the path recorded on each label
    #[serde(default = "default_public_prefix")]
    pub public_prefix: String,
    /// Waits before each poll of an automatic label job
    #[serde(default = "default_poll_delays")]
    pub poll_delays_ms: Vec<u64>,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            public_prefix: default_public_prefix(),
            poll_delays_ms: default_poll_delays(),
        }
    }
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("labels")
}

fn default_public_prefix() -> String {
    "/rotulos".to_string()
}

fn default_poll_delays() -> Vec<u64> {
    vec![3000, 5000]
}

/// Print queue behavior
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PrintQueueConfig {
    /// Failures tolerated before an item is parked in error
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Items handed to workers per pending poll
    #[serde(default = "default_pending_batch")]
    pub pending_batch: u32,
}

impl Default for PrintQueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            pending_batch: default_pending_batch(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_pending_batch() -> u32 {
    10
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub carrier: SanitizedCarrierConfig,
    pub labels: LabelConfig,
    pub print_queue: PrintQueueConfig,
}

/// Sanitized carrier config (access code hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedCarrierConfig {
    pub base_url: String,
    pub user: String,
    pub access_code_configured: bool,
    pub postage_card: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract: Option<String>,
    pub timeout_secs: u32,
    pub reverse_service_code: String,
    pub reverse_flag: String,
    pub sender_name: String,
    pub sender_postal_code: String,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        let carrier = &config.carrier;
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            carrier: SanitizedCarrierConfig {
                base_url: carrier.base_url.clone(),
                user: carrier.user.clone(),
                access_code_configured: !carrier.access_code.is_empty(),
                postage_card: carrier.postage_card.clone(),
                contract: carrier.contract.clone(),
                timeout_secs: carrier.timeout_secs,
                reverse_service_code: carrier.reverse_service_code.clone(),
                reverse_flag: carrier.reverse_flag.clone(),
                sender_name: carrier.sender.name.clone(),
                sender_postal_code: carrier.sender.postal_code.clone(),
            },
            labels: config.labels.clone(),
            print_queue: config.print_queue.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.database.path, PathBuf::from("postagem.db"));
        assert_eq!(config.carrier.reverse_service_code, "03220");
        assert_eq!(config.carrier.reverse_flag, "N");
        assert_eq!(config.labels.poll_delays_ms, vec![3000, 5000]);
        assert_eq!(config.print_queue.max_attempts, 3);
        assert_eq!(config.print_queue.pending_batch, 10);
    }

    #[test]
    fn test_deserialize_carrier_section() {
        let toml = r#"
[carrier]
base_url = "https://apihom.correios.com.br"
user = "loja"
access_code = "s3cret"
postage_card = "0067599079"

[carrier.sender]
name = "Moto Pecas"
postal_code = "72910-000"
city = "Aguas Lindas de Goias"
state = "GO"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.carrier.base_url, "https://apihom.correios.com.br");
        assert!(config.carrier.has_credentials());
        assert_eq!(config.carrier.sender.state, "GO");
        assert_eq!(config.carrier.timeout_secs, 30);
    }

    #[test]
    fn test_sanitized_config_hides_access_code() {
        let mut config = Config::default();
        config.carrier.user = "loja".to_string();
        config.carrier.access_code = "s3cret".to_string();

        let sanitized = SanitizedConfig::from(&config);
        assert!(sanitized.carrier.access_code_configured);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("s3cret"));
    }

    #[test]
    fn test_sanitized_config_without_access_code() {
        let sanitized = SanitizedConfig::from(&Config::default());
        assert!(!sanitized.carrier.access_code_configured);
    }
}
