//! 列表查询参数与分页响应
//!
//! 响应格式 `{"count", "next", "previous", "results"}`，翻页链接为相对路径，
//! 保留原查询参数并替换 `page`

use axum::http::Uri;
use serde::{Deserialize, Serialize};
use ureport_shared::config::ApiConfig;

use crate::error::{ApiError, Result};
use crate::repository::{PageRequest, StoryUserFilter, UserBadgeFilter};

/// 列表查询参数，不同资源只使用其中的部分过滤条件
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub user: Option<i64>,
    pub story: Option<i64>,
    pub org: Option<i64>,
    pub badge_type: Option<i64>,
}

impl ListQuery {
    /// 页码从 1 开始；页大小缺省取配置值，超过上限时截断
    pub fn page_request(&self, api: &ApiConfig) -> Result<PageRequest> {
        let page = self.page.unwrap_or(1);
        if page < 1 {
            return Err(ApiError::NotFound("Invalid page.".to_string()));
        }

        let page_size = match self.page_size {
            Some(size) if size >= 1 => size.min(api.max_page_size),
            _ => api.default_page_size,
        };

        let request = PageRequest { page, page_size };
        // 页码过大导致偏移量溢出时等同于越界页
        if request
            .checked_offset()
            .and_then(|offset| offset.checked_add(page_size))
            .is_none()
        {
            return Err(ApiError::NotFound("Invalid page.".to_string()));
        }
        Ok(request)
    }

    pub fn story_user_filter(&self) -> StoryUserFilter {
        StoryUserFilter {
            user: self.user,
            story: self.story,
        }
    }

    pub fn user_badge_filter(&self) -> UserBadgeFilter {
        UserBadgeFilter {
            user: self.user,
            badge_type: self.badge_type,
            org: self.org,
        }
    }
}

/// 分页响应
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// 请求页超出范围时返回 404（空结果的第一页除外）
    pub fn new(results: Vec<T>, count: i64, request: PageRequest, uri: &Uri) -> Result<Self> {
        if request.page > 1 && request.offset() >= count {
            return Err(ApiError::NotFound("Invalid page.".to_string()));
        }

        let has_next = request.offset().saturating_add(request.page_size) < count;
        let next = has_next.then(|| page_link(uri, request.page + 1));
        let previous = (request.page > 1).then(|| page_link(uri, request.page - 1));

        Ok(Self {
            count,
            next,
            previous,
            results,
        })
    }
}

/// 以当前请求路径为基础生成指定页的链接
fn page_link(uri: &Uri, page: i64) -> String {
    let page_param = format!("page={page}");
    let mut params: Vec<&str> = uri
        .query()
        .unwrap_or_default()
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| pair.split('=').next() != Some("page"))
        .collect();

    params.push(&page_param);
    format!("{}?{}", uri.path(), params.join("&"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(page: i64, page_size: i64) -> PageRequest {
        PageRequest { page, page_size }
    }

    #[test]
    fn test_page_request_defaults_and_limits() {
        let api = ApiConfig::default();

        let query = ListQuery::default();
        assert_eq!(query.page_request(&api).unwrap(), request(1, 20));

        let query = ListQuery {
            page: Some(2),
            page_size: Some(1000),
            ..Default::default()
        };
        assert_eq!(query.page_request(&api).unwrap(), request(2, 100));

        let query = ListQuery {
            page: Some(0),
            ..Default::default()
        };
        assert!(query.page_request(&api).is_err());
    }

    #[test]
    fn test_huge_page_is_not_found() {
        let query = ListQuery {
            page: Some(i64::MAX),
            ..Default::default()
        };
        assert!(matches!(
            query.page_request(&ApiConfig::default()),
            Err(ApiError::NotFound(_))
        ));
    }

    #[test]
    fn test_links_keep_filters() {
        let uri: Uri = "/api/v1/storyreads/?user=3&page=2&page_size=10".parse().unwrap();
        let page = Page::new(vec![1, 2, 3], 35, request(2, 10), &uri).unwrap();

        assert_eq!(page.count, 35);
        assert_eq!(
            page.next.as_deref(),
            Some("/api/v1/storyreads/?user=3&page_size=10&page=3")
        );
        assert_eq!(
            page.previous.as_deref(),
            Some("/api/v1/storyreads/?user=3&page_size=10&page=1")
        );
    }

    #[test]
    fn test_single_page_has_no_links() {
        let uri: Uri = "/api/v1/badgetypes/".parse().unwrap();
        let page = Page::new(vec!["a"], 1, request(1, 20), &uri).unwrap();
        assert!(page.next.is_none());
        assert!(page.previous.is_none());

        let empty: Page<i32> = Page::new(vec![], 0, request(1, 20), &uri).unwrap();
        assert_eq!(empty.count, 0);
    }

    #[test]
    fn test_page_beyond_range_is_not_found() {
        let uri: Uri = "/api/v1/badgetypes/".parse().unwrap();
        let result = Page::<i32>::new(vec![], 5, request(2, 20), &uri);
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }
}
