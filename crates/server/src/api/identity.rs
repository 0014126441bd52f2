//! Who is calling, as seen through the Databricks Apps proxy headers.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use lakedash_warehouse::{WarehouseError, WorkspaceClient};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::state::AppState;

const SCIM_ME_PATH: &str = "/api/2.0/preview/scim/v2/Me";
const ORG_ID_HEADER: &str = "x-databricks-org-id";

#[derive(Debug, Default, Serialize)]
pub struct ForwardedIdentity {
    pub email: String,
    pub username: String,
    pub user_id: String,
    pub ip: String,
}

#[derive(Debug, Serialize)]
pub struct UserDetails {
    pub id: Option<String>,
    pub display_name: Option<String>,
    pub active: bool,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub groups: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct WorkspaceInfo {
    pub host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IdentityResponse {
    #[serde(flatten)]
    pub forwarded: ForwardedIdentity,
    /// Whether the proxy forwarded a user token (on-behalf-of auth).
    pub has_user_token: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<WorkspaceInfo>,
    /// Why details are missing when a token was present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail_error: Option<String>,
    /// Request headers minus anything token- or secret-like, sorted by name.
    pub headers: BTreeMap<String, String>,
}

// ── SCIM wire types ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScimUser {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    active: Option<bool>,
    #[serde(default)]
    name: Option<ScimName>,
    #[serde(default)]
    groups: Vec<ScimGroup>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScimName {
    #[serde(default)]
    given_name: Option<String>,
    #[serde(default)]
    family_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScimGroup {
    #[serde(default)]
    display: Option<String>,
}

impl From<ScimUser> for UserDetails {
    fn from(me: ScimUser) -> Self {
        let (given_name, family_name) = me
            .name
            .map(|n| (n.given_name, n.family_name))
            .unwrap_or_default();
        UserDetails {
            id: me.id,
            display_name: me.display_name,
            active: me.active.unwrap_or(false),
            given_name,
            family_name,
            groups: me
                .groups
                .into_iter()
                .filter_map(|g| g.display.filter(|d| !d.is_empty()))
                .collect(),
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────

fn header(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

pub fn forwarded_identity(headers: &HeaderMap) -> ForwardedIdentity {
    ForwardedIdentity {
        email: header(headers, "x-forwarded-email"),
        username: header(headers, "x-forwarded-preferred-username"),
        user_id: header(headers, "x-forwarded-user"),
        ip: header(headers, "x-real-ip"),
    }
}

/// Headers safe to echo back: names containing `token` or `secret` are dropped.
pub fn safe_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter(|(name, _)| {
            let name = name.as_str().to_ascii_lowercase();
            !name.contains("token") && !name.contains("secret")
        })
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

/// Look the caller up with their own token.
async fn fetch_details(
    workspace: &WorkspaceClient,
    token: &str,
) -> Result<(UserDetails, WorkspaceInfo), WarehouseError> {
    let as_user = workspace.with_token(token);
    let (me, headers): (ScimUser, _) = as_user.get_with_headers(SCIM_ME_PATH, &[]).await?;
    let workspace_id = headers
        .get(ORG_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    Ok((
        me.into(),
        WorkspaceInfo {
            host: as_user.base_url().to_string(),
            workspace_id,
        },
    ))
}

// ── Handler ──────────────────────────────────────────────────────

/// Identity page data. Never fails: missing details are reported inline.
pub async fn identity(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<IdentityResponse> {
    let token = header(&headers, "x-forwarded-access-token");
    let mut response = IdentityResponse {
        forwarded: forwarded_identity(&headers),
        has_user_token: !token.is_empty(),
        user: None,
        workspace: None,
        detail_error: None,
        headers: safe_headers(&headers),
    };

    if token.is_empty() {
        return Json(response);
    }

    let lookup = match state.workspace() {
        Ok(workspace) => fetch_details(workspace, &token).await,
        Err(e) => Err(e),
    };
    match lookup {
        Ok((user, workspace)) => {
            response.user = Some(user);
            response.workspace = Some(workspace);
        }
        Err(e) => {
            warn!(error = %e, "Could not fetch user details");
            response.detail_error = Some(format!("Could not fetch detailed user info: {e}"));
        }
    }
    Json(response)
}
