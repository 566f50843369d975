//! Connection validation performed before any surface is started.

use reqwest::Url;
use tracing::{error, info};

use crate::catalog::Catalog;
use crate::error::{CatalogError, SetupError};

/// Outcome of a successful connection check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// Human-readable label, `"<user> @ <hostname>"`.
    pub title: String,
    pub host: String,
}

/// Canonical form of a user-entered server address: a scheme is always
/// present and trailing slashes are dropped.
pub fn normalize_host(raw: &str) -> String {
    let trimmed = raw.trim();
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };
    with_scheme.trim_end_matches('/').to_string()
}

pub async fn validate_connection<C: Catalog>(
    host: &str,
    catalog: &C,
) -> Result<ConnectionInfo, SetupError> {
    let host = normalize_host(host);
    let hostname = Url::parse(&host)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .ok_or_else(|| SetupError::CannotConnect(host.clone()))?;

    match catalog.authenticate().await {
        Ok(true) => {}
        Ok(false) => return Err(SetupError::InvalidAuth),
        Err(err) => return Err(map_catalog_error(&host, err)),
    }

    let user = catalog
        .current_user()
        .await
        .map_err(|err| map_catalog_error(&host, err))?;
    info!(user = %user.name, host = %hostname, "connected to catalog");

    Ok(ConnectionInfo {
        title: format!("{} @ {}", user.name, hostname),
        host,
    })
}

fn map_catalog_error(host: &str, err: CatalogError) -> SetupError {
    match err {
        CatalogError::CannotConnect(_) => SetupError::CannotConnect(host.to_string()),
        CatalogError::InvalidAuth => SetupError::InvalidAuth,
        other => {
            error!(error = %other, "unexpected error while validating connection");
            SetupError::Unknown(other.to_string())
        }
    }
}
