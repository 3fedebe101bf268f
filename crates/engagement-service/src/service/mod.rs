//! 业务服务层
//!
//! 处理器只与服务交互；服务依赖仓储 Trait，便于替换为 mock 或内存实现

mod badge_award;
mod badge_service;
mod engagement_service;
mod story_service;
mod user_service;

pub use badge_award::{BadgeAwarder, select_earned};
pub use badge_service::BadgeService;
pub use engagement_service::{EngagementService, StoryActionInput, action_value};
pub use story_service::StoryService;
pub use user_service::{UserService, split_full_name};
