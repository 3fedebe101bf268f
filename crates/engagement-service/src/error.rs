//! 互动服务错误类型定义
//!
//! 字段级校验错误以 `errors` 映射返回，键为字段名（或 `non_field_errors`），
//! 值为该字段的错误信息列表。

use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use ureport_shared::error::SharedError;

/// 跨字段错误使用的键
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// 字段错误映射
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// 互动服务错误类型
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    // 认证与权限
    #[error("未认证: {0}")]
    Unauthorized(String),
    #[error("无权执行该操作")]
    Forbidden,

    // 请求格式
    #[error("不支持的媒体类型: \"{0}\"")]
    UnsupportedMediaType(String),

    // 校验
    #[error("参数验证失败")]
    Validation(FieldErrors),

    // 资源不存在
    #[error("故事不存在: {0}")]
    StoryNotFound(i64),
    #[error("用户不存在: {0}")]
    UserNotFound(i64),
    #[error("资源不存在: {0}")]
    NotFound(String),

    // 系统错误
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),
    #[error("基础设施错误: {0}")]
    Shared(#[from] SharedError),
    #[error("内部错误: {0}")]
    Internal(String),
}

impl ApiError {
    /// 单字段校验错误
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![message.into()]);
        Self::Validation(errors)
    }

    /// 跨字段校验错误
    pub fn non_field(message: impl Into<String>) -> Self {
        Self::field(NON_FIELD_ERRORS, message)
    }

    /// 唯一约束冲突，`fields` 为组成唯一键的字段，例如 "story, user"
    pub fn unique_set(fields: &str) -> Self {
        Self::non_field(format!("The fields {fields} must make a unique set."))
    }

    /// 外键字段指向的对象不存在
    pub fn invalid_pk(field: &str, pk: i64) -> Self {
        Self::field(field, format!("Invalid pk \"{pk}\" - object does not exist."))
    }

    /// 必填字段缺失
    pub fn required(field: &str) -> Self {
        Self::field(field, "This field is required.")
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::StoryNotFound(_) | Self::UserNotFound(_) | Self::NotFound(_) => {
                StatusCode::NOT_FOUND
            }
            Self::Database(_) | Self::Shared(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "NOT_AUTHENTICATED",
            Self::Forbidden => "PERMISSION_DENIED",
            Self::UnsupportedMediaType(_) => "UNSUPPORTED_MEDIA_TYPE",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::StoryNotFound(_) => "STORY_NOT_FOUND",
            Self::UserNotFound(_) => "USER_NOT_FOUND",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Shared(_) => "INFRASTRUCTURE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 校验错误的字段映射，其它错误返回 None
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 系统级错误只返回通用提示，详细信息仅记录日志
        let message = match &self {
            Self::Database(e) => {
                tracing::error!(error = %e, "数据库操作失败");
                "服务内部错误，请稍后重试".to_string()
            }
            Self::Shared(e) => {
                tracing::error!(error = %e, code = e.code(), "基础设施操作失败");
                "服务内部错误，请稍后重试".to_string()
            }
            Self::Internal(e) => {
                tracing::error!(error = %e, "内部错误");
                "服务内部错误，请稍后重试".to_string()
            }
            other => other.to_string(),
        };

        let mut body = json!({
            "success": false,
            "code": self.error_code(),
            "message": message,
        });
        if let Some(errors) = self.field_errors() {
            body["errors"] = json!(errors);
        }

        (status, axum::Json(body)).into_response()
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields = FieldErrors::new();
        for (field, errs) in errors.field_errors() {
            let messages = errs
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string())
                })
                .collect();
            fields.insert(field.to_string(), messages);
        }
        Self::Validation(fields)
    }
}

impl From<jsonwebtoken::errors::Error> for ApiError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::Internal(format!("JWT 处理错误: {err}"))
    }
}

impl From<bcrypt::BcryptError> for ApiError {
    fn from(err: bcrypt::BcryptError) -> Self {
        Self::Internal(format!("密码哈希错误: {err}"))
    }
}

/// 是否为唯一约束冲突（SQLSTATE 23505）
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|e| e.code())
        .is_some_and(|code| code == "23505")
}

/// 是否为外键约束冲突（SQLSTATE 23503）
pub fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|e| e.code())
        .is_some_and(|code| code == "23503")
}

/// 服务层 Result 类型别名
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn test_status_codes() {
        let cases = vec![
            (ApiError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (ApiError::Forbidden, StatusCode::FORBIDDEN),
            (
                ApiError::UnsupportedMediaType("text/plain".into()),
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ),
            (ApiError::required("story"), StatusCode::BAD_REQUEST),
            (ApiError::StoryNotFound(1), StatusCode::NOT_FOUND),
            (ApiError::UserNotFound(1), StatusCode::NOT_FOUND),
            (ApiError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (
                ApiError::Internal("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.status_code(), expected, "{err:?}");
        }
    }

    #[test]
    fn test_unique_set_message() {
        let err = ApiError::unique_set("story, user");
        let errors = err.field_errors().unwrap();
        assert_eq!(
            errors[NON_FIELD_ERRORS],
            vec!["The fields story, user must make a unique set.".to_string()]
        );
    }

    #[test]
    fn test_invalid_pk_message() {
        let err = ApiError::invalid_pk("story", 42);
        assert_eq!(
            err.field_errors().unwrap()["story"],
            vec!["Invalid pk \"42\" - object does not exist.".to_string()]
        );
    }

    #[derive(Validate)]
    struct Sample {
        #[validate(length(max = 3, message = "too long"))]
        name: String,
    }

    #[test]
    fn test_from_validation_errors_keeps_field_messages() {
        let sample = Sample {
            name: "abcdef".into(),
        };
        let err: ApiError = sample.validate().unwrap_err().into();
        assert_eq!(err.field_errors().unwrap()["name"], vec!["too long"]);
    }

    #[tokio::test]
    async fn test_validation_response_body() {
        let response = ApiError::required("story").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(body["errors"]["story"][0], "This field is required.");
    }
}
