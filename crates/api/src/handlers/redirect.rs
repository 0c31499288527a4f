use actix_web::{http::header::LOCATION, web, HttpResponse};
use fixit_domain::model::DailyMetric;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::state::AppState;

#[derive(Debug, Deserialize, Serialize)]
pub struct RedirectQuery {
    pub target: Option<String>,
}

/// Affiliate redirect. Never fails: unknown or missing targets land on `/`.
pub async fn redirect_handler(
    state: web::Data<AppState>,
    query: web::Query<RedirectQuery>,
) -> HttpResponse {
    let target = query.target.as_deref().map(str::trim).unwrap_or_default();
    let link = state.affiliates().resolve(target).await;

    state.sink().increment(DailyMetric::ClicksAffiliate);
    counter!("api_redirects_total", "origin" => link.origin.as_str()).increment(1);
    debug!(key = target, origin = link.origin.as_str(), "affiliate redirect");

    HttpResponse::Found()
        .insert_header((LOCATION, link.url))
        .finish()
}
