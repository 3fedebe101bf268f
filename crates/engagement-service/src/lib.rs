//! U-Report 互动服务
//!
//! 为内容平台上的故事提供用户互动能力：收藏、评分、阅读记录、奖励积分，
//! 以及按阅读数量发放的成就徽章。对外提供 `/api/v1` 下的 REST 接口。

pub mod auth;
pub mod dto;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod routes;
pub mod service;
pub mod state;

pub use error::{ApiError, Result};
pub use routes::create_router;
pub use state::{AppState, Repositories};
