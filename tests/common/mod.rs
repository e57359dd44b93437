#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use warp::filters::BoxedFilter;
use warp::hyper::body::Bytes;
use warp::reply::Response;

use ticket_tracker::auth::User;
use ticket_tracker::config::ServerConfig;
use ticket_tracker::constants::SESSION_COOKIE_NAME;
use ticket_tracker::core::project::{NewProject, Project};
use ticket_tracker::core::session::create_session_manager;
use ticket_tracker::core::tracker::TrackerService;
use ticket_tracker::routes::{routes, AppState, SharedState};
use ticket_tracker::storage::MemoryStorageProvider;

pub const PASSWORD: &str = "hunter22";

pub fn service() -> Arc<TrackerService> {
    Arc::new(
        TrackerService::new(Arc::new(MemoryStorageProvider::new()))
            .with_login_min_duration(Duration::ZERO),
    )
}

pub async fn admin(tracker: &TrackerService) -> User {
    tracker.ensure_admin("admin", PASSWORD).await.unwrap()
}

pub async fn regular(tracker: &TrackerService, name: &str) -> User {
    tracker.register(name, PASSWORD).await.unwrap()
}

pub async fn project(tracker: &TrackerService, admin: &User, name: &str) -> Project {
    tracker
        .create_project(
            admin,
            NewProject {
                name: name.to_string(),
                description: None,
            },
        )
        .await
        .unwrap()
}

pub fn app() -> (SharedState, BoxedFilter<(Response,)>) {
    let state = Arc::new(AppState::new(
        service(),
        create_session_manager(Duration::from_secs(3600)),
        ServerConfig::for_testing(),
    ));
    let filter = routes(state.clone());
    (state, filter)
}

/// Drives the filter like a browser: keeps the session cookie between requests
pub struct Browser {
    filter: BoxedFilter<(Response,)>,
    pub cookie: Option<String>,
}

pub struct Page {
    pub status: u16,
    pub location: Option<String>,
    pub body: String,
}

impl Page {
    /// The anti-forgery token embedded in the page's forms
    pub fn csrf_token(&self) -> String {
        let marker = r#"name="csrf_token" value=""#;
        let start = self.body.find(marker).expect("page has no csrf field") + marker.len();
        let end = start + self.body[start..].find('"').unwrap();
        self.body[start..end].replace("&#x3D;", "=")
    }
}

impl Browser {
    pub fn new(filter: BoxedFilter<(Response,)>) -> Self {
        Self { filter, cookie: None }
    }

    fn request(&self, method: &str, path: &str) -> warp::test::RequestBuilder {
        let request = warp::test::request().method(method).path(path);
        match &self.cookie {
            Some(cookie) => request.header("cookie", format!("{}={}", SESSION_COOKIE_NAME, cookie)),
            None => request,
        }
    }

    fn receive(&mut self, response: warp::http::Response<Bytes>) -> Page {
        for value in response.headers().get_all("set-cookie") {
            let value = value.to_str().unwrap();
            if let Some(rest) = value.strip_prefix(&format!("{}=", SESSION_COOKIE_NAME)) {
                self.cookie = Some(rest.split(';').next().unwrap().to_string());
            }
        }
        Page {
            status: response.status().as_u16(),
            location: response
                .headers()
                .get("location")
                .map(|v| v.to_str().unwrap().to_string()),
            body: String::from_utf8_lossy(response.body()).to_string(),
        }
    }

    pub async fn get(&mut self, path: &str) -> Page {
        let response = self.request("GET", path).reply(&self.filter).await;
        self.receive(response)
    }

    pub async fn post(&mut self, path: &str, fields: &[(&str, &str)]) -> Page {
        self.post_with(path, fields, None).await
    }

    pub async fn post_with(&mut self, path: &str, fields: &[(&str, &str)], origin: Option<&str>) -> Page {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        let mut request = self
            .request("POST", path)
            .header("content-type", "application/x-www-form-urlencoded")
            .header("host", "localhost:5000");
        if let Some(origin) = origin {
            request = request.header("origin", origin);
        }
        let response = request.body(body).reply(&self.filter).await;
        self.receive(response)
    }

    /// GET `form_path` for a fresh token, then POST `fields` with it to `action`
    pub async fn submit(&mut self, form_path: &str, action: &str, fields: &[(&str, &str)]) -> Page {
        let token = self.get(form_path).await.csrf_token();
        let mut fields = fields.to_vec();
        fields.push(("csrf_token", &token));
        self.post(action, &fields).await
    }

    pub async fn login(&mut self, username: &str, password: &str) -> Page {
        self.submit("/login", "/login", &[("username", username), ("password", password)])
            .await
    }
}
