//! # 数据模型
//!
//! 出口治理核心的数据结构：出口路径、健康记录、冷却策略、调用结果与审计记录。
//!
//! - 出口路径构造后不可变，直连用 `None` 表示
//! - 时间字段统一使用 `DateTime<Utc>`
//! - 健康状态只在内存中保存，进程重启后清空

pub mod audit;
pub mod egress_path;
pub mod health;
pub mod outcome;

pub use audit::AuditRecord;
pub use egress_path::{EgressPath, EgressPool, ProxyCredentials};
pub use health::{BlockKind, BlockSignalMap, CooldownPolicy, PathHealth, PathHealthSnapshot};
pub use outcome::{CallFailure, CallOutcome, CallResult, CallSuccess};
