//! 请求与响应 DTO

mod pagination;
mod request;
mod response;

pub use pagination::*;
pub use request::*;
pub use response::*;
