use std::time::Instant;

use actix_web::{web, HttpRequest, HttpResponse, ResponseError};
use fixit_domain::model::{ContactDetails, ProviderId};
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

use super::ApiError;

#[derive(Debug, Deserialize, Serialize)]
pub struct RevealQuery {
    pub id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RevealResponse {
    pub contacts: ContactDetails,
}

pub async fn reveal_contact_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<RevealQuery>,
) -> Result<HttpResponse, ApiError> {
    let started = Instant::now();
    let result = reveal(&state, &req, query.into_inner()).await;

    let status = match &result {
        Ok(_) => "success".to_string(),
        Err(err) => err.status_code().as_u16().to_string(),
    };
    counter!("api_reveal_requests_total", "status" => status).increment(1);
    histogram!("api_reveal_duration_seconds").record(started.elapsed().as_secs_f64());

    result
}

async fn reveal(
    state: &AppState,
    req: &HttpRequest,
    query: RevealQuery,
) -> Result<HttpResponse, ApiError> {
    let id = ProviderId::parse(query.id.as_deref().unwrap_or_default())?;
    let actor_ip = req
        .connection_info()
        .realip_remote_addr()
        .map(str::to_owned);

    let disclosure = state
        .disclosure()
        .reveal(&id, actor_ip.as_deref())
        .await?;

    Ok(HttpResponse::Ok().json(RevealResponse {
        contacts: disclosure.contacts,
    }))
}
