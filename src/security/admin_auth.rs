use super::{credentials, Credentials};
use crate::config::Config;
use crate::error::{RegistryError, Result};
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use ipnetwork::IpNetwork;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

#[derive(Clone)]
pub struct AdminAuthConfig {
    pub admin_token: Option<String>,
    pub allowed_ips: Vec<IpNetwork>,
}

impl AdminAuthConfig {
    pub fn new(admin_token: Option<String>, allowed_ips: Vec<IpNetwork>) -> Self {
        Self {
            admin_token,
            allowed_ips,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.admin_token.clone(), config.allowed_admin_ips.clone())
    }

    pub fn is_enabled(&self) -> bool {
        self.admin_token.is_some()
    }
}

/// Guards the `/admin` routes.
///
/// Disabled (503) without `ADMIN_TOKEN`. Otherwise the caller must come from
/// loopback or an allowed network (403) and present the admin token as a
/// Bearer credential (401).
pub async fn admin_auth_middleware(
    State(config): State<Arc<AdminAuthConfig>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    mut req: Request,
    next: Next,
) -> Result<Response> {
    let Some(admin_token) = &config.admin_token else {
        tracing::warn!("Admin endpoint accessed but ADMIN_TOKEN not configured");
        return Err(RegistryError::AdminDisabled);
    };

    let source_ip = extract_client_ip(&req, addr.ip());

    if !is_ip_allowed(&config.allowed_ips, source_ip) {
        tracing::warn!(
            "Admin request from unauthorized IP: {} (allowed networks: {:?})",
            source_ip,
            config.allowed_ips
        );
        return Err(RegistryError::PermissionDenied);
    }

    let token = match credentials(req.headers(), &["Bearer"]) {
        Credentials::Key(token) => token,
        Credentials::Missing | Credentials::Empty => {
            tracing::warn!("Admin request without a bearer token from IP: {}", source_ip);
            return Err(RegistryError::InvalidToken);
        }
    };

    if !constant_time_compare(token, admin_token) {
        tracing::warn!("Invalid admin token from IP: {}", source_ip);
        return Err(RegistryError::InvalidToken);
    }

    tracing::info!("Admin authenticated from IP: {}", source_ip);

    // Audit trail for handlers
    req.extensions_mut().insert(source_ip);

    Ok(next.run(req).await)
}

/// X-Forwarded-For, then X-Real-IP, then the peer address.
fn extract_client_ip(req: &Request, conn_ip: IpAddr) -> IpAddr {
    if let Some(forwarded) = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
    {
        return forwarded;
    }

    if let Some(real_ip) = req
        .headers()
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
    {
        return real_ip;
    }

    conn_ip
}

fn is_ip_allowed(allowed_networks: &[IpNetwork], ip: IpAddr) -> bool {
    // Loopback is always allowed for local administration
    ip.is_loopback() || allowed_networks.iter().any(|network| network.contains(ip))
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
