//! `GET /tokens` handler.

use std::num::NonZeroUsize;

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use serde::Deserialize;

use super::{ApiError, AppState};
use crate::application::services::TokenQuery;
use crate::domain::query::{Page, SortField, SortOrder};
use crate::infrastructure::config::QuerySettings;

/// Raw query parameters, validated by [`TokensParams::into_query`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokensParams {
    /// Search term.
    pub q: Option<String>,
    /// Sort field name.
    pub sort_by: Option<String>,
    /// `asc` or `desc`.
    pub sort_order: Option<String>,
    /// Page size.
    pub limit: Option<String>,
    /// Address to resume after.
    pub cursor: Option<String>,
}

impl TokensParams {
    /// Apply defaults and validate.
    ///
    /// Unknown sort fields and orders fall back to volume, descending.
    /// `limit` above the configured maximum is clamped.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidParameter` if `limit` is not a positive
    /// integer.
    pub fn into_query(
        self,
        settings: &QuerySettings,
        default_query: &str,
    ) -> Result<TokenQuery, ApiError> {
        let search = present(self.q).unwrap_or_else(|| default_query.to_string());

        let sort_field = present(self.sort_by)
            .map(|s| SortField::from_str_case_insensitive(&s))
            .unwrap_or_default();
        let sort_order = present(self.sort_order)
            .map(|s| SortOrder::from_str_case_insensitive(&s))
            .unwrap_or_default();

        let limit = match present(self.limit) {
            None => settings.default_page_size,
            Some(raw) => raw
                .parse::<NonZeroUsize>()
                .map_err(|_| ApiError::InvalidParameter {
                    name: "limit",
                    reason: format!("expected a positive integer, got {raw:?}"),
                })?,
        }
        .min(settings.max_page_size);

        Ok(TokenQuery {
            search,
            sort_field,
            sort_order,
            limit,
            cursor: present(self.cursor),
        })
    }
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub(super) async fn list_tokens(
    State(state): State<AppState>,
    params: Result<Query<TokensParams>, QueryRejection>,
) -> Result<Json<Page>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::InvalidQuery(e.body_text()))?;
    let query = params.into_query(&state.query_settings, &state.default_query)?;

    tracing::debug!(
        search = %query.search,
        sort_by = query.sort_field.as_str(),
        sort_order = query.sort_order.as_str(),
        limit = query.limit.get(),
        "Listing tokens"
    );

    Ok(Json(state.query_service.execute(&query).await))
}
