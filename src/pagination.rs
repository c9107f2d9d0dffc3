use crate::config::AnalyticsSettings;
use crate::error::{CoreError, CoreResult};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub page_size: i64,
}

impl PageRequest {
    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }

    pub fn limit_offset(&self) -> (i64, i64) {
        (self.page_size, self.offset())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub last_page: i64,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, req: PageRequest, total: i64) -> Self {
        let last_page = if total == 0 {
            1
        } else {
            (total + req.page_size - 1) / req.page_size
        };
        Self {
            items,
            page: req.page,
            page_size: req.page_size,
            total,
            last_page,
        }
    }
}

fn parse_positive(params: &serde_json::Value, key: &str) -> CoreResult<Option<i64>> {
    let Some(value) = params.get(key) else {
        return Ok(None);
    };
    if value.is_null() {
        return Ok(None);
    }
    let Some(n) = value.as_i64() else {
        return Err(CoreError::bad_params(format!(
            "{} must be a positive integer",
            key
        )));
    };
    if n < 1 {
        return Err(CoreError::bad_params(format!("{} must be >= 1", key)));
    }
    Ok(Some(n))
}

pub fn parse_page_request(
    params: &serde_json::Value,
    settings: &AnalyticsSettings,
) -> CoreResult<PageRequest> {
    let page = parse_positive(params, "page")?.unwrap_or(1);
    let page_size = parse_positive(params, "pageSize")?.unwrap_or(settings.default_page_size);
    if page_size > settings.max_page_size {
        return Err(CoreError::bad_params(format!(
            "pageSize must be in range 1..={}",
            settings.max_page_size
        )));
    }
    // Keeps the OFFSET arithmetic far away from overflow.
    if page > 1_000_000 {
        return Err(CoreError::bad_params("page must be <= 1000000"));
    }
    Ok(PageRequest { page, page_size })
}
