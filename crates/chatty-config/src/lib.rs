pub mod loader;
pub mod provider;
pub mod schema;

pub use loader::{
    find_config_path, find_config_path_from, load_config, save_config, LEGACY_CONFIG_FILE,
    LOCAL_CONFIG_FILE,
};
pub use provider::{ConfigProvider, JsonFileProvider};
pub use schema::{
    Config, DedupScope, DeliveryFailurePolicy, RelaySettings, StartMode, WebhooksConfig,
};
