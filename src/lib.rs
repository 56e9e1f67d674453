//! 搜索接口中继服务
//!
//! 启动、日志初始化与优雅关闭。业务逻辑位于 `crates/` 下的各个工作区成员。

pub mod app;
pub mod common;
pub mod shutdown;

pub use app::Application;
pub use shutdown::ShutdownManager;
