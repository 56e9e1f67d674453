pub mod api_observability;
pub mod app_config;
pub mod egress;
pub mod governance;
pub mod upstream;

// Re-export main types for easier imports
pub use api_observability::{ApiConfig, ObservabilityConfig};
pub use app_config::AppConfig;
pub use egress::EgressConfig;
pub use governance::{
    BlockSignalConfig, FallbackPolicy, GovernanceConfig, PacingConfig, SelectionStrategyKind,
};
pub use upstream::{AuditConfig, UpstreamConfig};
