//! 配置监视器模块
//!
//! 提供单键监视器和分组监视器

pub mod definition;
pub mod group;
pub mod single;

// 重新导出主要类型
pub use definition::GroupDefinition;
pub use group::{GroupItems, GroupWatcher, ItemOutcome, MembershipDiff};
pub use single::{ChangeType, Watcher};
