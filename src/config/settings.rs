use std::collections::HashMap;
use std::env;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub otel: OtelConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

/// Options recognized by the notification dispatcher.
///
/// Every field has a default, so `DispatcherConfig::default()` yields a
/// working dispatcher.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatcherConfig {
    /// Title used for incident types without a catalog entry
    #[serde(default = "default_incident_title")]
    pub default_incident_title: String,
    /// Body used when an incident has no description and no type-specific text
    #[serde(default = "default_incident_body")]
    pub default_incident_body: String,
    /// Topic that incident broadcasts are published to
    #[serde(default = "default_topic_name")]
    pub topic_name: String,
    /// Android notification channel id registered by the mobile client
    #[serde(default = "default_channel_id")]
    pub channel_id: String,
    /// Upper bound for each collaborator call in milliseconds
    #[serde(default = "default_collaborator_timeout_ms")]
    pub collaborator_timeout_ms: u64,
    /// How geofence notifications are rendered
    #[serde(default)]
    pub geofence_payload: GeofencePayloadPolicy,
    /// Additional incident label to title mappings
    #[serde(default)]
    pub incident_titles: HashMap<String, String>,
}

/// Rendering policy for geofence notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeofencePayloadPolicy {
    /// Structured data only; the client renders display text
    #[default]
    Structured,
    /// Structured data plus a pre-rendered title and body
    Rendered,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryConfig {
    /// Backend type: "memory" or "redis"
    #[serde(default = "default_directory_backend")]
    pub backend: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// Pub/Sub channels (or glob patterns) carrying domain events
    #[serde(default)]
    pub channels: Vec<String>,
    /// Whether the Pub/Sub event trigger runs
    #[serde(default)]
    pub subscriber_enabled: bool,
    /// Key prefix of user hashes (`{prefix}:{user_id}`)
    #[serde(default = "default_user_key_prefix")]
    pub user_key_prefix: String,
    /// Key prefix of geofence hashes (`{prefix}:{geofence_id}`)
    #[serde(default = "default_geofence_key_prefix")]
    pub geofence_key_prefix: String,
    /// Pub/Sub events handled concurrently before the subscriber stops reading
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    /// Backend type: "log", "memory" or "fcm"
    #[serde(default = "default_transport_backend")]
    pub backend: String,
    #[serde(default)]
    pub fcm: FcmConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FcmConfig {
    #[serde(default)]
    pub project_id: String,
    /// Pre-issued OAuth bearer token
    #[serde(default)]
    pub access_token: String,
    #[serde(default = "default_fcm_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_fcm_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_otel_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_sampling_ratio")]
    pub sampling_ratio: f64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_incident_title() -> String {
    "Security Alert".to_string()
}

fn default_incident_body() -> String {
    "New security incident reported nearby.".to_string()
}

fn default_topic_name() -> String {
    "incidents".to_string()
}

fn default_channel_id() -> String {
    "harkai_channel_id".to_string()
}

fn default_collaborator_timeout_ms() -> u64 {
    5_000
}

fn default_directory_backend() -> String {
    "memory".to_string()
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_user_key_prefix() -> String {
    "users".to_string()
}

fn default_geofence_key_prefix() -> String {
    "geofences".to_string()
}

fn default_max_in_flight() -> usize {
    256
}

fn default_transport_backend() -> String {
    "log".to_string()
}

fn default_fcm_endpoint() -> String {
    "https://fcm.googleapis.com".to_string()
}

fn default_fcm_request_timeout_ms() -> u64 {
    10_000
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_service_name() -> String {
    "harkai-notifier".to_string()
}

fn default_sampling_ratio() -> f64 {
    1.0
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", i64::from(default_port()))?
            .set_default("redis.url", default_redis_url())?
            .set_default("transport.backend", default_transport_backend())?
            .set_default("directory.backend", default_directory_backend())?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // SERVER__PORT, DISPATCHER__TOPIC_NAME, TRANSPORT__FCM__PROJECT_ID, ...
            .add_source(
                Environment::default()
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("redis.channels")
                    .with_list_parse_key("server.cors_origins"),
            );

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl DispatcherConfig {
    pub fn collaborator_timeout(&self) -> Duration {
        Duration::from_millis(self.collaborator_timeout_ms)
    }
}

impl FcmConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl RedisConfig {
    /// Channels to subscribe to, falling back to the default event channel
    pub fn event_channels(&self) -> Vec<String> {
        if self.channels.is_empty() {
            vec!["harkai:events".to_string()]
        } else {
            self.channels.clone()
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            dispatcher: DispatcherConfig::default(),
            directory: DirectoryConfig::default(),
            redis: RedisConfig::default(),
            transport: TransportConfig::default(),
            otel: OtelConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
        }
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            default_incident_title: default_incident_title(),
            default_incident_body: default_incident_body(),
            topic_name: default_topic_name(),
            channel_id: default_channel_id(),
            collaborator_timeout_ms: default_collaborator_timeout_ms(),
            geofence_payload: GeofencePayloadPolicy::default(),
            incident_titles: HashMap::new(),
        }
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            backend: default_directory_backend(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            channels: vec![],
            subscriber_enabled: false,
            user_key_prefix: default_user_key_prefix(),
            geofence_key_prefix: default_geofence_key_prefix(),
            max_in_flight: default_max_in_flight(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            backend: default_transport_backend(),
            fcm: FcmConfig::default(),
        }
    }
}

impl Default for FcmConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            access_token: String::new(),
            endpoint: default_fcm_endpoint(),
            request_timeout_ms: default_fcm_request_timeout_ms(),
        }
    }
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_otel_endpoint(),
            service_name: default_service_name(),
            sampling_ratio: default_sampling_ratio(),
        }
    }
}
