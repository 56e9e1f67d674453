pub mod health;
pub mod metrics;
pub mod paths;
pub mod relay;
pub mod root;
