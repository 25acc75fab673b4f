use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, MatchedPath, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};

use super::{Result, state::AppState};
use crate::{
    admission::AdmissionKey,
    affinity::{REGION_COOKIE_NAME, RegionRequest},
};

/// Client key used when neither the socket peer nor a trusted hop is known.
pub const ANONYMOUS_CLIENT: &str = "anonymous";

/// Rejects requests whose route/client bucket is empty.
pub async fn admission(
    State(state): State<AppState>,
    matched: Option<MatchedPath>,
    request: Request,
    next: Next,
) -> Result<Response> {
    let route = matched
        .as_ref()
        .map(MatchedPath::as_str)
        .unwrap_or_else(|| request.uri().path());
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_key(request.headers(), peer, state.trusted_proxy_hops);
    let key = AdmissionKey::route(route).with_client(client);

    state.admission.admit_with(&key, &state.policy)?;
    Ok(next.run(request).await)
}

/// Resolves the session's region and pins it into the request extensions.
///
/// A newly issued identifier is handed back to the client as a cookie.
pub async fn region_affinity(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let edge_location = request
        .headers()
        .get(&state.edge_header)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);
    let session_token = jar
        .get(REGION_COOKIE_NAME)
        .map(|cookie| cookie.value().to_string());

    let resolution = state
        .affinity
        .resolve(&RegionRequest::new(session_token, edge_location))?;
    request.extensions_mut().insert(resolution.identifier);

    let response = next.run(request).await;
    match resolution.issued_token {
        Some(token) => {
            let cookie = Cookie::build((REGION_COOKIE_NAME, token))
                .path("/")
                .http_only(true);
            Ok((jar.add(cookie), response).into_response())
        }
        None => Ok(response),
    }
}

/// Identifies the client for admission.
///
/// With `trusted_hops == 0` only the socket peer IP counts and
/// `X-Forwarded-For` is ignored. Otherwise each trusted proxy appended one
/// entry, so the client is the entry `trusted_hops` from the right; anything
/// left of it is client-controlled. A header with fewer entries than trusted
/// hops did not pass through every proxy and falls back to the peer.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trusted_hops: usize) -> String {
    let peer_ip = || peer.map(|addr| addr.ip().to_string());
    if trusted_hops == 0 {
        return peer_ip().unwrap_or_else(|| ANONYMOUS_CLIENT.to_string());
    }

    let hops: Vec<&str> = headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .collect();

    hops.len()
        .checked_sub(trusted_hops)
        .map(|index| hops[index].to_string())
        .or_else(peer_ip)
        .unwrap_or_else(|| ANONYMOUS_CLIENT.to_string())
}
