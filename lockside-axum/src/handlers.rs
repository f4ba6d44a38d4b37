use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use lockside_core::error::AuthError;
use lockside_core::user::{User, UserSummary};
use lockside_session::{Session, SessionConfig, SessionStore as _};
use log::{error, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_cookies::cookie::time::Duration as CookieDuration;
use tower_cookies::cookie::SameSite as CookieSameSite;
use tower_cookies::{Cookie, Cookies};

use crate::error::{error_redirect, found, twitter_error_code, ApiError};
use crate::extract::AuthSession;
use crate::AppState;

/// Short-lived cookie holding the PKCE verifier of a delegated flow, named
/// by the state token so concurrent flows cannot collide.
const FLOW_COOKIE_PREFIX: &str = "lockside_flow_";
/// Companion cookie holding the post-login destination.
const RETURN_COOKIE_PREFIX: &str = "lockside_return_";
/// Lifetime of the two flow cookies, in minutes.
const FLOW_COOKIE_MINUTES: i64 = 15;

const FALLBACK_KEY: &str = "twitter_fallback";

#[derive(Deserialize, Default)]
pub(crate) struct RegisterRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Deserialize, Default)]
pub(crate) struct LoginRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpdateDisplayNameRequest {
    #[serde(default)]
    display_name: String,
}

#[derive(Deserialize)]
pub(crate) struct BeginParams {
    #[serde(rename = "returnTo")]
    return_to: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StatusResponse {
    is_authenticated: bool,
    user: Option<UserSummary>,
}

// ---------------------------------------------------------------------------
// session plumbing

/// Load the live session referenced by the request's cookie, if any.
pub(crate) async fn load_session(
    state: &AppState,
    cookies: &Cookies,
) -> Result<Option<Session>, AuthError> {
    match cookies.get(&state.session_config.cookie_name) {
        Some(cookie) => state.sessions.load(cookie.value()).await,
        None => Ok(None),
    }
}

fn to_cookie_same_site(same_site: lockside_session::SameSite) -> CookieSameSite {
    match same_site {
        lockside_session::SameSite::Lax => CookieSameSite::Lax,
        lockside_session::SameSite::Strict => CookieSameSite::Strict,
        lockside_session::SameSite::None => CookieSameSite::None,
    }
}

fn session_cookie(config: &SessionConfig, value: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(config.cookie_name.clone(), value);
    cookie.set_path(config.path.clone());
    cookie.set_http_only(config.http_only);
    cookie.set_secure(config.secure);
    cookie.set_same_site(to_cookie_same_site(config.same_site));
    cookie.set_max_age(CookieDuration::seconds(config.max_age.num_seconds()));
    cookie
}

fn flow_cookie(config: &SessionConfig, name: String, value: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, value);
    cookie.set_path("/".to_string());
    cookie.set_http_only(true);
    cookie.set_secure(config.secure);
    cookie.set_same_site(CookieSameSite::Lax);
    cookie.set_max_age(CookieDuration::minutes(FLOW_COOKIE_MINUTES));
    cookie
}

fn remove_cookie(cookies: &Cookies, name: String, path: String) {
    let mut cookie = Cookie::new(name, "");
    cookie.set_path(path);
    cookies.remove(cookie);
}

/// Attach a fresh authenticated session to the browser, rotating away any
/// existing one.
async fn establish_session(
    state: &AppState,
    cookies: &Cookies,
    user: User,
) -> Result<Session, AuthError> {
    if let Some(old) = cookies.get(&state.session_config.cookie_name) {
        state.sessions.delete(old.value()).await?;
    }
    let session = Session::for_user(user, state.session_config.max_age);
    state.sessions.save(&session).await?;
    cookies.add(session_cookie(&state.session_config, session.id.clone()));
    Ok(session)
}

/// Only ever redirect back into our own application.
fn sanitize_return_to(raw: Option<String>) -> Option<String> {
    raw.filter(|path| path.starts_with('/') && !path.starts_with("//"))
}

// ---------------------------------------------------------------------------
// local JSON endpoints

pub(crate) async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<Response, ApiError> {
    let user = state
        .verifier
        .register(&body.username, &body.email, &body.password)
        .await?;
    Ok((StatusCode::CREATED, Json(user.summary())).into_response())
}

pub(crate) async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(body): Json<LoginRequest>,
) -> Result<Json<UserSummary>, ApiError> {
    let user = state.verifier.login(&body.username, &body.password).await?;
    establish_session(&state, &cookies, user.clone()).await?;
    Ok(Json(user.summary()))
}

pub(crate) async fn logout(
    State(state): State<AppState>,
    cookies: Cookies,
) -> Result<Json<serde_json::Value>, ApiError> {
    if let Some(cookie) = cookies.get(&state.session_config.cookie_name) {
        state.sessions.delete(cookie.value()).await?;
    }
    remove_cookie(
        &cookies,
        state.session_config.cookie_name.clone(),
        state.session_config.path.clone(),
    );
    Ok(Json(json!({ "message": "Logged out" })))
}

pub(crate) async fn me(auth: AuthSession) -> Json<UserSummary> {
    Json(auth.user.summary())
}

pub(crate) async fn status(
    State(state): State<AppState>,
    cookies: Cookies,
) -> Json<StatusResponse> {
    let user = match load_session(&state, &cookies).await {
        Ok(session) => session.and_then(|s| s.user),
        Err(err) => {
            // The probe never fails; an unreadable session is just "not
            // authenticated".
            warn!("status probe could not load session: {err}");
            None
        }
    };
    Json(StatusResponse {
        is_authenticated: user.is_some(),
        user: user.map(|u| u.summary()),
    })
}

pub(crate) async fn update_display_name(
    State(state): State<AppState>,
    auth: AuthSession,
    Json(body): Json<UpdateDisplayNameRequest>,
) -> Result<Json<UserSummary>, ApiError> {
    let updated = state
        .resolver
        .update_display_name(auth.user.id, &body.display_name)
        .await?;

    // Keep the session's cached copy consistent for the rest of its lifetime.
    let mut session = auth.session;
    session.user = Some(updated.clone());
    state.sessions.save(&session).await?;

    Ok(Json(updated.summary()))
}

// ---------------------------------------------------------------------------
// Twitter PKCE flow

pub(crate) async fn twitter_begin(
    State(state): State<AppState>,
    cookies: Cookies,
    Query(params): Query<BeginParams>,
) -> Response {
    // Fail fast, before any handshake state is generated.
    let Some(engine) = state.twitter_pkce.clone() else {
        warn!("twitter login requested but consumer credentials are not configured");
        return error_redirect("twitter_config_missing");
    };

    // The handshake rides on the session; reuse the browser's session or
    // start an anonymous one.
    let mut session = match load_session(&state, &cookies).await {
        Ok(Some(session)) => session,
        Ok(None) => Session::anonymous(state.session_config.max_age),
        Err(err) => {
            error!("could not load session for twitter initiation: {err}");
            return error_redirect("twitter_init_failed");
        }
    };

    let (authorize_url, handshake) = engine.initiate(sanitize_return_to(params.return_to));
    session.handshake = Some(handshake);

    if let Err(err) = state.sessions.save(&session).await {
        error!("could not persist twitter handshake: {err}");
        return error_redirect("twitter_init_failed");
    }
    cookies.add(session_cookie(&state.session_config, session.id.clone()));

    found(&authorize_url)
}

pub(crate) async fn twitter_callback(
    State(state): State<AppState>,
    cookies: Cookies,
    Query(params): Query<CallbackParams>,
) -> Response {
    let session_id = cookies
        .get(&state.session_config.cookie_name)
        .map(|c| c.value().to_string());

    // Provider-signalled error: discard any pending handshake and bail.
    if let Some(provider_error) = &params.error {
        warn!("twitter denied the authorization request: {provider_error}");
        if let Some(id) = &session_id {
            if let Err(err) = state.sessions.take_handshake(id).await {
                error!("could not discard handshake: {err}");
            }
        }
        return error_redirect("twitter_auth_failed");
    }

    // Missing parameters are rejected without consulting the handshake.
    let (Some(code), Some(received_state)) = (params.code.as_deref(), params.state.as_deref())
    else {
        return error_redirect("twitter_missing_params");
    };

    let Some(engine) = state.twitter_pkce.clone() else {
        return error_redirect("twitter_config_missing");
    };

    // Atomic read-then-delete: whatever happens next, this handshake is
    // spent and a replayed callback will find nothing.
    let handshake = match &session_id {
        Some(id) => match state.sessions.take_handshake(id).await {
            Ok(handshake) => handshake,
            Err(err) => {
                error!("could not consume handshake: {err}");
                return error_redirect("twitter_auth_failed");
            }
        },
        None => None,
    };

    let Some(handshake) = handshake else {
        warn!("twitter callback with no pending handshake");
        return error_redirect("twitter_state_mismatch");
    };
    if handshake.state != received_state {
        warn!("twitter callback state mismatch");
        return error_redirect("twitter_state_mismatch");
    }
    if handshake.is_expired() {
        warn!("twitter callback against an expired handshake");
        return error_redirect("twitter_state_mismatch");
    }

    let profile = match engine.complete(code, &handshake.code_verifier).await {
        Ok(profile) => profile,
        Err(err) => {
            warn!("twitter handshake failed: {err}");
            return error_redirect(twitter_error_code(&err));
        }
    };

    let user = match state.resolver.resolve_federated(&profile).await {
        Ok(user) => user,
        Err(err) => {
            error!("could not resolve twitter identity: {err}");
            return error_redirect("twitter_auth_failed");
        }
    };

    match establish_session(&state, &cookies, user).await {
        Ok(_) => {
            let destination = handshake.return_to.as_deref().unwrap_or("/");
            found(destination)
        }
        Err(err) => {
            error!("could not establish session after twitter login: {err}");
            error_redirect("twitter_auth_failed")
        }
    }
}

// ---------------------------------------------------------------------------
// delegated flows (Google, Facebook, Twitter fallback)

pub(crate) async fn delegated_begin(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(provider): Path<String>,
    Query(params): Query<BeginParams>,
) -> Response {
    begin_delegated(&state, &cookies, &provider, params.return_to)
}

pub(crate) async fn delegated_callback(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
) -> Response {
    complete_delegated(&state, &cookies, &provider, params).await
}

pub(crate) async fn twitter_fallback_begin(
    State(state): State<AppState>,
    cookies: Cookies,
    Query(params): Query<BeginParams>,
) -> Response {
    begin_delegated(&state, &cookies, FALLBACK_KEY, params.return_to)
}

pub(crate) async fn twitter_fallback_callback(
    State(state): State<AppState>,
    cookies: Cookies,
    Query(params): Query<CallbackParams>,
) -> Response {
    complete_delegated(&state, &cookies, FALLBACK_KEY, params).await
}

fn begin_delegated(
    state: &AppState,
    cookies: &Cookies,
    key: &str,
    return_to: Option<String>,
) -> Response {
    let Some(registered) = state.delegated.get(key) else {
        return unknown_provider(key);
    };

    let (authorize_url, flow_state, pkce) = registered.flow.initiate();

    // The verifier stays server-adjacent in an HttpOnly cookie named by the
    // state token; the callback can only redeem it from the browser that
    // initiated the flow. Entirely separate from the PKCE session handshake.
    cookies.add(flow_cookie(
        &state.session_config,
        format!("{FLOW_COOKIE_PREFIX}{flow_state}"),
        pkce.code_verifier,
    ));
    if let Some(destination) = sanitize_return_to(return_to) {
        cookies.add(flow_cookie(
            &state.session_config,
            format!("{RETURN_COOKIE_PREFIX}{flow_state}"),
            destination,
        ));
    }

    found(&authorize_url)
}

async fn complete_delegated(
    state: &AppState,
    cookies: &Cookies,
    key: &str,
    params: CallbackParams,
) -> Response {
    let Some(registered) = state.delegated.get(key) else {
        return unknown_provider(key);
    };
    let flow = registered.flow.clone();
    let failure_code = registered.failure_code;

    if let Some(provider_error) = &params.error {
        warn!("{key} denied the authorization request: {provider_error}");
        return error_redirect(failure_code);
    }
    let (Some(code), Some(received_state)) = (params.code.as_deref(), params.state.as_deref())
    else {
        warn!("{key} callback missing code or state");
        return error_redirect(failure_code);
    };

    let flow_cookie_name = format!("{FLOW_COOKIE_PREFIX}{received_state}");
    let Some(verifier_cookie) = cookies.get(&flow_cookie_name) else {
        warn!("{key} callback with no matching flow cookie");
        return error_redirect(failure_code);
    };
    let code_verifier = verifier_cookie.value().to_string();
    remove_cookie(cookies, flow_cookie_name, "/".to_string());

    let return_cookie_name = format!("{RETURN_COOKIE_PREFIX}{received_state}");
    let destination = cookies
        .get(&return_cookie_name)
        .map(|c| c.value().to_string());
    remove_cookie(cookies, return_cookie_name, "/".to_string());

    let profile = match flow
        .finalize(code, received_state, received_state, &code_verifier)
        .await
    {
        Ok(profile) => profile,
        Err(err) => {
            warn!("{key} flow failed: {err}");
            return error_redirect(failure_code);
        }
    };

    let user = match state.resolver.resolve_federated(&profile).await {
        Ok(user) => user,
        Err(err) => {
            error!("could not resolve {key} identity: {err}");
            return error_redirect(failure_code);
        }
    };

    match establish_session(state, cookies, user).await {
        Ok(_) => {
            let destination = sanitize_return_to(destination);
            found(destination.as_deref().unwrap_or("/"))
        }
        Err(err) => {
            error!("could not establish session after {key} login: {err}");
            error_redirect(failure_code)
        }
    }
}

fn unknown_provider(key: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "message": format!("Unknown provider: {key}") })),
    )
        .into_response()
}
