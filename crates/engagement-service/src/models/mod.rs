//! 数据模型定义
//!
//! 故事与分类由内容平台维护，本服务只读；其余实体由本服务写入。

mod badge;
mod content;
mod story_extras;
mod user;

pub use badge::*;
pub use content::*;
pub use story_extras::*;
pub use user::*;
