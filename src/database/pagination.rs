use serde::Serialize;

use super::{error::ApiError, form::get_number};
use crate::constants::MAX_PAGE_SIZE;

/// Page-number pagination parsed from `?page=N&limit=M`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    pub fn from_query(query: &[(String, String)], default_limit: i64) -> Self {
        let lookup = |key: &str| {
            query
                .iter()
                .rev()
                .find(|(k, _)| k == key)
                .and_then(|(_, v)| get_number(&serde_json::Value::String(v.to_owned())))
        };

        let page = lookup("page").filter(|p| *p > 0).unwrap_or(1);
        let limit = lookup("limit")
            .filter(|l| *l > 0)
            .map(|l| l.min(MAX_PAGE_SIZE))
            .unwrap_or(default_limit);

        Self { page, limit }
    }

    /// Rows to skip. A page too far out to address is reported as missing.
    pub fn offset(&self) -> Result<i64, potion::Error> {
        (self.page - 1)
            .checked_mul(self.limit)
            .ok_or_else(invalid_page)
    }
}

fn invalid_page() -> potion::Error {
    ApiError::NotFound(String::from("Invalid page.")).into()
}

#[derive(Serialize, Debug)]
pub struct PageContext<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> PageContext<T> {
    /// Builds a page; `path` and `query` are used to render the neighbour links.
    pub fn from_rows(
        results: Vec<T>,
        count: i64,
        request: PageRequest,
        path: &str,
        query: &[(String, String)],
    ) -> Result<Self, potion::Error> {
        let page_count = ((count + request.limit - 1) / request.limit).max(1);
        if request.page > page_count {
            return Err(invalid_page());
        }

        let link = |page: i64| -> Result<String, potion::Error> {
            let mut params: Vec<(&str, String)> = query
                .iter()
                .filter(|(k, _)| k != "page")
                .map(|(k, v)| (k.as_str(), v.to_owned()))
                .collect();
            params.push(("page", page.to_string()));

            let encoded = serde_urlencoded::to_string(&params).map_err(|e| {
                log::error!("Failed to encode page link: {e}");
                potion::Error {
                    code: 500,
                    info: Some(String::from("Failed to encode page link")),
                    redirect: None,
                }
            })?;
            Ok(format!("{path}?{encoded}"))
        };

        let next = (request.page < page_count)
            .then(|| link(request.page + 1))
            .transpose()?;
        let previous = (request.page > 1)
            .then(|| link(request.page - 1))
            .transpose()?;

        Ok(Self {
            count,
            next,
            previous,
            results,
        })
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PageContext<U> {
        PageContext {
            count: self.count,
            next: self.next,
            previous: self.previous,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}
