//! JSON 请求体提取器
//!
//! 解析失败转换为字段级校验错误，字段路径取自反序列化出错的位置；
//! 空请求体按 `{}` 处理。

use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
    http::{HeaderMap, header},
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{ApiError, NON_FIELD_ERRORS};

/// 以 [`ApiError`] 作为拒绝类型的 JSON 提取器
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = content_type(req.headers());
        let body = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::non_field(rejection.body_text()))?;

        if body.iter().all(u8::is_ascii_whitespace) {
            return parse_value(Value::Object(Default::default())).map(Self);
        }
        if !is_json(content_type.as_deref()) {
            return Err(ApiError::UnsupportedMediaType(
                content_type.unwrap_or_default(),
            ));
        }

        let value: Value = serde_json::from_slice(&body)
            .map_err(|e| ApiError::non_field(format!("JSON parse error - {e}")))?;
        parse_value(value).map(Self)
    }
}

fn content_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn is_json(content_type: Option<&str>) -> bool {
    let Some(content_type) = content_type else {
        return false;
    };
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || essence.ends_with("+json")
}

/// 反序列化为目标类型，出错字段作为错误键，根级错误归入 `non_field_errors`
pub fn parse_value<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_path_to_error::deserialize(value).map_err(|err| {
        let path = err.path().to_string();
        let field = if path == "." {
            NON_FIELD_ERRORS.to_string()
        } else {
            path
        };
        ApiError::field(&field, err.into_inner().to_string())
    })
}
