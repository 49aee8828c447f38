mod settings;

pub use settings::{
    DirectoryConfig, DispatcherConfig, FcmConfig, GeofencePayloadPolicy, OtelConfig, RedisConfig,
    ServerConfig, Settings, TransportConfig,
};
