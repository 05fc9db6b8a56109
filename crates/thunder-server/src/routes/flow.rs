//! `/flow/*` routes (§4.8 C8): start and continue authentication/registration
//! flows, and the aggregate metadata endpoint the login UI polls.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thunder_model::{FlowStep, Value};
use uuid::Uuid;

use crate::error_response::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartFlowRequest {
    pub application_id: String,
    #[serde(default)]
    pub inputs: BTreeMap<String, Value>,
    /// Which flow definition to run; defaults to the route's conventional
    /// handle (`login` / `register`) when omitted.
    #[serde(default)]
    pub flow_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteFlowRequest {
    pub flow_id: Uuid,
    #[serde(default)]
    pub inputs: BTreeMap<String, Value>,
    #[serde(default)]
    pub action_ref: Option<String>,
}

pub async fn start_authn(
    State(state): State<AppState>,
    Json(req): Json<StartFlowRequest>,
) -> Result<Json<FlowStep>, ApiError> {
    let handle = req.flow_id.as_deref().unwrap_or("login");
    let step = state
        .flow_engine
        .start(handle, &req.application_id, None, req.inputs)
        .await?;
    Ok(Json(step))
}

pub async fn start_register(
    State(state): State<AppState>,
    Json(req): Json<StartFlowRequest>,
) -> Result<Json<FlowStep>, ApiError> {
    let handle = req.flow_id.as_deref().unwrap_or("register");
    let step = state
        .flow_engine
        .start(handle, &req.application_id, None, req.inputs)
        .await?;
    Ok(Json(step))
}

pub async fn execute(
    State(state): State<AppState>,
    Json(req): Json<ExecuteFlowRequest>,
) -> Result<Json<FlowStep>, ApiError> {
    let step = state
        .flow_engine
        .continue_flow(req.flow_id, req.inputs, req.action_ref)
        .await?;
    Ok(Json(step))
}

#[derive(Debug, Deserialize)]
pub struct MetaQuery {
    #[serde(rename = "type")]
    pub resource_type: Option<String>,
    pub id: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MetaError {
    pub code: &'static str,
    pub message: &'static str,
}

impl IntoResponse for MetaError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, Json(&self)).into_response()
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum MetaResponse {
    App {
        client_id: String,
        scopes: Vec<String>,
        redirect_uris: Vec<String>,
    },
    Ou {
        handle: String,
        name: String,
        description: Option<String>,
        logo_url: Option<String>,
        tos_uri: Option<String>,
        policy_uri: Option<String>,
        cookie_policy_uri: Option<String>,
    },
}

/// `GET /flow/meta?type=APP|OU&id=<id>`. Error codes per §4.8: `FM-1001`
/// invalid type, `FM-1002/1003` not found, `FM-1004/1005` missing params.
pub async fn meta(
    State(state): State<AppState>,
    Query(query): Query<MetaQuery>,
) -> Result<Json<MetaResponse>, MetaError> {
    let resource_type = query.resource_type.ok_or(MetaError {
        code: "FM-1004",
        message: "missing required query parameter 'type'",
    })?;
    let id = query.id.ok_or(MetaError {
        code: "FM-1005",
        message: "missing required query parameter 'id'",
    })?;

    match resource_type.as_str() {
        "APP" => {
            let app = state.applications.get(&id).await.map_err(|_| MetaError {
                code: "FM-1002",
                message: "application not found",
            })?;
            Ok(Json(MetaResponse::App {
                client_id: app.client_id,
                scopes: app.scopes,
                redirect_uris: app.redirect_uris,
            }))
        }
        "OU" => {
            let ou = state.ous.get(&id).await.map_err(|_| MetaError {
                code: "FM-1003",
                message: "organization unit not found",
            })?;
            Ok(Json(MetaResponse::Ou {
                handle: ou.handle,
                name: ou.name,
                description: ou.description,
                logo_url: ou.logo_url,
                tos_uri: ou.tos_uri,
                policy_uri: ou.policy_uri,
                cookie_policy_uri: ou.cookie_policy_uri,
            }))
        }
        _ => Err(MetaError {
            code: "FM-1001",
            message: "type must be APP or OU",
        }),
    }
}
