//! Route table for the HTTP surface

use std::convert::Infallible;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use warp::filters::BoxedFilter;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

use crate::config::ServerConfig;
use crate::constants::{MAX_FORM_BYTES, SESSION_COOKIE_NAME};
use crate::core::session::Sessions;
use crate::core::tracker::SharedTracker;
use crate::error::TrackerError;
use crate::handlers::responses::error_page;
use crate::handlers::{auth, projects, tickets, RequestContext, RequestMeta};
use crate::security::{add_security_headers, CSRFProtection};

/// Everything a handler may need, shared by all requests
pub struct AppState {
    pub tracker: SharedTracker,
    pub sessions: Sessions,
    pub csrf: CSRFProtection,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(tracker: SharedTracker, sessions: Sessions, config: ServerConfig) -> Self {
        let csrf = CSRFProtection::new(
            config.csrf_secret.clone(),
            config.csrf_token_ttl,
            config.development_mode,
        );
        Self {
            tracker,
            sessions,
            csrf,
            config,
        }
    }
}

pub type SharedState = Arc<AppState>;

/// Request context could not be established (session store failure)
#[derive(Debug)]
struct ContextRejection(TrackerError);

impl warp::reject::Reject for ContextRejection {}

fn with_state(state: SharedState) -> impl Filter<Extract = (SharedState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn request_meta() -> impl Filter<Extract = (RequestMeta,), Error = Rejection> + Clone {
    warp::cookie::optional::<String>(SESSION_COOKIE_NAME)
        .and(warp::header::optional::<String>("origin"))
        .and(warp::header::optional::<String>("host"))
        .and(warp::method())
        .and(warp::path::full())
        .map(
            |session_cookie, origin, host, method, path: warp::path::FullPath| RequestMeta {
                session_cookie,
                origin,
                host,
                method,
                path: path.as_str().to_string(),
            },
        )
}

/// Resolve the caller's session; must come after path and method filters
fn with_context(state: SharedState) -> impl Filter<Extract = (RequestContext,), Error = Rejection> + Clone {
    request_meta().and_then(move |meta| {
        let state = state.clone();
        async move {
            RequestContext::resolve(&state, meta)
                .await
                .map_err(|e| warp::reject::custom(ContextRejection(e)))
        }
    })
}

fn form<T: DeserializeOwned + Send + 'static>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(MAX_FORM_BYTES).and(warp::body::form())
}

/// Build the complete filter tree
pub fn routes(state: SharedState) -> BoxedFilter<(Response,)> {
    let s = || with_state(state.clone());
    let ctx = || with_context(state.clone());

    let health = warp::path!("health")
        .and(warp::get())
        .and(s())
        .and_then(health_check);

    // Accounts
    let register_page = warp::path!("register")
        .and(warp::get())
        .and(s())
        .and(ctx())
        .and_then(auth::register_page);
    let register = warp::path!("register")
        .and(warp::post())
        .and(s())
        .and(ctx())
        .and(form())
        .and_then(auth::register);
    let login_page = warp::path!("login")
        .and(warp::get())
        .and(s())
        .and(ctx())
        .and(warp::query())
        .and_then(auth::login_page);
    let login = warp::path!("login")
        .and(warp::post())
        .and(s())
        .and(ctx())
        .and(warp::query())
        .and(form())
        .and_then(auth::login);
    let logout = warp::path!("logout")
        .and(warp::get())
        .and(s())
        .and(ctx())
        .and_then(auth::logout);
    let create_user_page = warp::path!("admin" / "create_user")
        .and(warp::get())
        .and(s())
        .and(ctx())
        .and_then(auth::create_user_page);
    let create_user = warp::path!("admin" / "create_user")
        .and(warp::post())
        .and(s())
        .and(ctx())
        .and(form())
        .and_then(auth::create_user);

    let account_routes = register_page
        .or(register)
        .unify()
        .or(login_page)
        .unify()
        .or(login)
        .unify()
        .or(logout)
        .unify()
        .or(create_user_page)
        .unify()
        .or(create_user)
        .unify()
        .boxed();

    // Projects
    let home = warp::path::end()
        .or(warp::path!("home"))
        .unify()
        .and(warp::get())
        .and(s())
        .and(ctx())
        .and_then(projects::home);
    let new_project_page = warp::path!("project" / "new")
        .and(warp::get())
        .and(s())
        .and(ctx())
        .and_then(projects::new_project_page);
    let create_project = warp::path!("project" / "new")
        .and(warp::post())
        .and(s())
        .and(ctx())
        .and(form())
        .and_then(projects::create_project);
    let project_page = warp::path!("project" / u64)
        .and(warp::get())
        .and(s())
        .and(ctx())
        .and_then(projects::project_page);
    let assign_member = warp::path!("project" / u64)
        .and(warp::post())
        .and(s())
        .and(ctx())
        .and(form())
        .and_then(projects::assign_member);
    let delete_project = warp::path!("project" / u64 / "delete")
        .and(warp::post())
        .and(s())
        .and(ctx())
        .and(form())
        .and_then(projects::delete_project);
    let remove_member = warp::path!("project" / u64 / "remove_user" / u64)
        .and(warp::post())
        .and(s())
        .and(ctx())
        .and(form())
        .and_then(projects::remove_member);

    let project_routes = home
        .or(new_project_page)
        .unify()
        .or(create_project)
        .unify()
        .or(project_page)
        .unify()
        .or(assign_member)
        .unify()
        .or(delete_project)
        .unify()
        .or(remove_member)
        .unify()
        .boxed();

    // Tickets
    let new_ticket_page = warp::path!("project" / u64 / "ticket" / "new")
        .and(warp::get())
        .and(s())
        .and(ctx())
        .and_then(tickets::new_ticket_page);
    let create_ticket = warp::path!("project" / u64 / "ticket" / "new")
        .and(warp::post())
        .and(s())
        .and(ctx())
        .and(form())
        .and_then(tickets::create_ticket);
    let ticket_page = warp::path!("ticket" / u64)
        .and(warp::get())
        .and(s())
        .and(ctx())
        .and_then(tickets::ticket_page);
    let update_ticket_page = warp::path!("ticket" / u64 / "update")
        .and(warp::get())
        .and(s())
        .and(ctx())
        .and_then(tickets::update_ticket_page);
    let update_ticket = warp::path!("ticket" / u64 / "update")
        .and(warp::post())
        .and(s())
        .and(ctx())
        .and(form())
        .and_then(tickets::update_ticket);
    let delete_ticket = warp::path!("ticket" / u64 / "delete")
        .and(warp::post())
        .and(s())
        .and(ctx())
        .and(form())
        .and_then(tickets::delete_ticket);

    let ticket_routes = new_ticket_page
        .or(create_ticket)
        .unify()
        .or(ticket_page)
        .unify()
        .or(update_ticket_page)
        .unify()
        .or(update_ticket)
        .unify()
        .or(delete_ticket)
        .unify()
        .boxed();

    health
        .or(account_routes)
        .unify()
        .or(project_routes)
        .unify()
        .or(ticket_routes)
        .unify()
        .recover(handle_rejection)
        .unify()
        .boxed()
}

async fn health_check(state: SharedState) -> Result<Response, Rejection> {
    match state.tracker.storage().health_check().await {
        Ok(true) => Ok(warp::reply::html("OK").into_response()),
        Ok(false) => Ok(warp::reply::with_status("UNAVAILABLE", StatusCode::SERVICE_UNAVAILABLE).into_response()),
        Err(e) => {
            log::error!("Storage health check failed: {}", e);
            Ok(warp::reply::with_status("UNAVAILABLE", StatusCode::SERVICE_UNAVAILABLE).into_response())
        }
    }
}

/// Map unmatched or malformed requests to error pages
async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let response = if err.is_not_found() {
        error_page(StatusCode::NOT_FOUND, "The requested page does not exist.")
    } else if let Some(ContextRejection(e)) = err.find::<ContextRejection>() {
        log::error!("Could not establish request context: {}", e);
        error_page(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong on our side.")
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        error_page(StatusCode::PAYLOAD_TOO_LARGE, "The submitted form is too large.")
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        error_page(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed.")
    } else if err.find::<warp::reject::InvalidQuery>().is_some()
        || err.find::<warp::reject::UnsupportedMediaType>().is_some()
    {
        error_page(StatusCode::BAD_REQUEST, "The request could not be understood.")
    } else {
        log::debug!("Unhandled rejection: {:?}", err);
        error_page(StatusCode::BAD_REQUEST, "The request could not be understood.")
    };

    Ok(add_security_headers(response))
}
