use std::future::{ready, Ready};

use actix_web::{
    dev::Payload, http::header::AUTHORIZATION, web, FromRequest, HttpRequest, HttpResponse,
};
use chrono::Utc;
use fixit_domain::model::{
    validate_config_key, AuditAction, ConfigEntry, DailyStat, NewAuditEntry, NewConfigEntry,
    ProviderId, ProviderOverview,
};
use fixit_domain::services::AdminPrincipal;
use fixit_domain::storage::{ConfigStore, ProviderStore, StatsStore};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::state::AppState;

use super::ApiError;

/// Rows returned by the dashboard statistics endpoint.
pub const RECENT_STATS_LIMIT: u64 = 30;

/// Extractor that admits only the configured administrator.
#[derive(Debug)]
pub struct AdminSession(pub AdminPrincipal);

impl FromRequest for AdminSession {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let result = match req.app_data::<web::Data<AppState>>() {
            Some(state) => {
                let header = req
                    .headers()
                    .get(AUTHORIZATION)
                    .and_then(|value| value.to_str().ok());
                state
                    .authenticator()
                    .verify(header)
                    .map(AdminSession)
                    .map_err(ApiError::from)
            }
            None => Err(ApiError::Internal("application state not configured")),
        };
        ready(result)
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ConfigUpdateRequest {
    pub key: Option<String>,
    pub value: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigUpdateResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct VerifyProviderRequest {
    pub id: Option<String>,
    pub is_premium: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyProviderResponse {
    pub success: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminStatsResponse {
    pub stats: Vec<DailyStat>,
    pub providers: ProviderOverview,
}

pub async fn list_config_handler(
    state: web::Data<AppState>,
    _session: AdminSession,
) -> Result<HttpResponse, ApiError> {
    let entries: Vec<ConfigEntry> = state.storage().list_config().await?;
    Ok(HttpResponse::Ok().json(entries))
}

pub async fn update_config_handler(
    state: web::Data<AppState>,
    session: AdminSession,
    req: HttpRequest,
    payload: web::Json<ConfigUpdateRequest>,
) -> Result<HttpResponse, ApiError> {
    let request = payload.into_inner();
    let key = non_blank(request.key);
    let value = non_blank(request.value);
    let (Some(key), Some(value)) = (key, value) else {
        return Err(ApiError::BadRequest("key and value are required".into()));
    };
    validate_config_key(&key)?;
    let description = non_blank(request.description);

    let saved = state
        .storage()
        .upsert_config(NewConfigEntry {
            key,
            value,
            description,
            updated_at: Utc::now(),
        })
        .await?;
    // Only after the write is durable; readers must not cache the old value.
    state.config_cache().invalidate();

    let actor_ip = req
        .connection_info()
        .realip_remote_addr()
        .map(str::to_owned);
    state.sink().audit(NewAuditEntry::now(
        AuditAction::UpdateConfig,
        json!({
            "key": saved.key,
            "value": saved.value,
            "principal": session.0.as_str(),
        }),
        actor_ip,
    ));
    info!(key = %saved.key, principal = session.0.as_str(), "config updated");

    Ok(HttpResponse::Ok().json(ConfigUpdateResponse {
        success: true,
        message: format!("Config {} updated", saved.key),
    }))
}

pub async fn verify_provider_handler(
    state: web::Data<AppState>,
    session: AdminSession,
    req: HttpRequest,
    payload: web::Json<VerifyProviderRequest>,
) -> Result<HttpResponse, ApiError> {
    let request = payload.into_inner();
    let Some(raw_id) = non_blank(request.id) else {
        return Err(ApiError::BadRequest("provider id is required".into()));
    };
    let id = ProviderId::parse(&raw_id)?;
    let is_premium = request.is_premium.unwrap_or(false);

    if !state.storage().verify_provider(&id, is_premium).await? {
        return Err(ApiError::NotFound("Provider not found"));
    }

    let actor_ip = req
        .connection_info()
        .realip_remote_addr()
        .map(str::to_owned);
    state.sink().audit(NewAuditEntry::now(
        AuditAction::VerifyMaster,
        json!({
            "id": id.as_str(),
            "is_premium": is_premium,
            "principal": session.0.as_str(),
        }),
        actor_ip,
    ));
    info!(provider = %id, is_premium, principal = session.0.as_str(), "provider verified");

    Ok(HttpResponse::Ok().json(VerifyProviderResponse { success: true }))
}

/// Daily counters are best-effort; an unreadable stats table still yields
/// the provider overview.
pub async fn admin_stats_handler(
    state: web::Data<AppState>,
    _session: AdminSession,
) -> Result<HttpResponse, ApiError> {
    let stats = state
        .storage()
        .recent_daily_stats(RECENT_STATS_LIMIT)
        .await
        .unwrap_or_else(|err| {
            warn!(error = %err, "daily stats unavailable");
            Vec::new()
        });
    let providers = state.storage().provider_overview().await?;
    Ok(HttpResponse::Ok().json(AdminStatsResponse { stats, providers }))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
