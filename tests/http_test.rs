mod common;

use common::{app, Browser, PASSWORD};
use ticket_tracker::core::project::NewProject;

#[tokio::test]
async fn test_health_and_unknown_paths() {
    let (_state, filter) = app();
    let mut browser = Browser::new(filter);

    let page = browser.get("/health").await;
    assert_eq!(page.status, 200);
    assert_eq!(page.body, "OK");

    assert_eq!(browser.get("/no/such/page").await.status, 404);
}

#[tokio::test]
async fn test_unauthenticated_request_resumes_after_login() {
    let (state, filter) = app();
    let admin = common::admin(&state.tracker).await;
    common::project(&state.tracker, &admin, "Apollo").await;
    common::regular(&state.tracker, "alice").await;

    let mut browser = Browser::new(filter);
    let page = browser.get("/project/1").await;
    assert_eq!(page.status, 303);
    assert_eq!(page.location.as_deref(), Some("/login?next=%2Fproject%2F1"));

    let login_page = browser.get("/login?next=%2Fproject%2F1").await;
    assert_eq!(login_page.status, 200);
    assert!(login_page.body.contains("Please log in to access this page."));
    assert!(login_page.body.contains("%2Fproject%2F1"));

    let anonymous_cookie = browser.cookie.clone();
    let token = login_page.csrf_token();
    let page = browser
        .post(
            "/login?next=%2Fproject%2F1",
            &[("username", "alice"), ("password", PASSWORD), ("csrf_token", &token)],
        )
        .await;
    assert_eq!(page.status, 303);
    assert_eq!(page.location.as_deref(), Some("/project/1"));
    assert_ne!(browser.cookie, anonymous_cookie, "session id rotates on login");

    let project = browser.get("/project/1").await;
    assert_eq!(project.status, 200);
    assert!(project.body.contains("Apollo"));
    assert!(project.body.contains("You have been logged in!"));
}

#[tokio::test]
async fn test_login_rejects_foreign_next_target() {
    let (state, filter) = app();
    common::regular(&state.tracker, "alice").await;
    let mut browser = Browser::new(filter.clone());

    let token = browser.get("/login").await.csrf_token();
    let page = browser
        .post(
            "/login?next=%2F%2Fevil.example",
            &[("username", "alice"), ("password", PASSWORD), ("csrf_token", &token)],
        )
        .await;
    assert_eq!(page.location.as_deref(), Some("/home"));

    for target in ["%2F%09%2Fevil.example", "%2F%0A%2Fevil.example", "%2F%0D%0A%2Fevil.example"] {
        let mut browser = Browser::new(filter.clone());
        let token = browser.get("/login").await.csrf_token();
        let page = browser
            .post(
                &format!("/login?next={}", target),
                &[("username", "alice"), ("password", PASSWORD), ("csrf_token", &token)],
            )
            .await;
        assert_eq!(page.status, 303);
        assert_eq!(page.location.as_deref(), Some("/home"), "next={}", target);
    }
}

#[tokio::test]
async fn test_wrong_password_rerenders_login() {
    let (state, filter) = app();
    common::regular(&state.tracker, "alice").await;
    let mut browser = Browser::new(filter);

    let page = browser.login("alice", "not-the-password").await;
    assert_eq!(page.status, 200);
    assert!(page.body.contains("Login unsuccessful. Please check username and password."));

    let unknown = browser.login("mallory", PASSWORD).await;
    assert_eq!(unknown.status, 200);
    assert!(unknown.body.contains("Login unsuccessful. Please check username and password."));

    assert_eq!(browser.get("/home").await.status, 303);
}

#[tokio::test]
async fn test_registration_flow() {
    let (_state, filter) = app();
    let mut browser = Browser::new(filter);

    let mismatch = browser
        .submit(
            "/register",
            "/register",
            &[("username", "alice"), ("password", PASSWORD), ("confirm_password", "different")],
        )
        .await;
    assert_eq!(mismatch.status, 200);
    assert!(mismatch.body.contains("Field must be equal to password."));

    let fields = [("username", "alice"), ("password", PASSWORD), ("confirm_password", PASSWORD)];
    let created = browser.submit("/register", "/register", &fields).await;
    assert_eq!(created.status, 303);
    assert_eq!(created.location.as_deref(), Some("/login"));
    assert!(browser.get("/login").await.body.contains("The account has been created!"));

    let duplicate = browser.submit("/register", "/register", &fields).await;
    assert_eq!(duplicate.status, 200);
    assert!(duplicate.body.contains("That username is taken. Please choose a different one."));

    assert_eq!(browser.login("alice", PASSWORD).await.status, 303);
    let again = browser.get("/register").await;
    assert_eq!(again.location.as_deref(), Some("/home"));
}

#[tokio::test]
async fn test_regular_user_is_forbidden_from_admin_pages() {
    let (state, filter) = app();
    common::regular(&state.tracker, "alice").await;
    let mut browser = Browser::new(filter);
    browser.login("alice", PASSWORD).await;

    assert_eq!(browser.get("/project/new").await.status, 403);
    assert_eq!(browser.get("/admin/create_user").await.status, 403);

    let session_id = browser.cookie.clone().unwrap();
    let token = state.csrf.generate_csrf_token(&session_id);
    let page = browser
        .post("/project/new", &[("name", "Sneaky"), ("csrf_token", &token)])
        .await;
    assert_eq!(page.status, 403);

    let admin = common::admin(&state.tracker).await;
    assert!(state.tracker.list_projects(&admin).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_forged_submissions_are_rejected() {
    let (state, filter) = app();
    let admin = common::admin(&state.tracker).await;
    let mut browser = Browser::new(filter);
    browser.login("admin", PASSWORD).await;

    let missing = browser.post("/project/new", &[("name", "NoToken")]).await;
    assert_eq!(missing.status, 403);

    let token = browser.get("/project/new").await.csrf_token();
    let foreign = browser
        .post_with(
            "/project/new",
            &[("name", "Foreign"), ("csrf_token", &token)],
            Some("https://evil.example"),
        )
        .await;
    assert_eq!(foreign.status, 403);

    let other_session = state.csrf.generate_csrf_token("someone-else");
    let stolen = browser
        .post("/project/new", &[("name", "Stolen"), ("csrf_token", &other_session)])
        .await;
    assert_eq!(stolen.status, 403);

    assert!(state.tracker.list_projects(&admin).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_admin_manages_projects_and_members() {
    let (state, filter) = app();
    common::admin(&state.tracker).await;
    common::regular(&state.tracker, "bob").await;
    let mut browser = Browser::new(filter);
    browser.login("admin", PASSWORD).await;

    let created = browser
        .submit(
            "/project/new",
            "/project/new",
            &[("name", "Apollo"), ("description", "Moon shot")],
        )
        .await;
    assert_eq!(created.location.as_deref(), Some("/home"));
    let home = browser.get("/home").await;
    assert!(home.body.contains("New project has been created!"));
    assert!(home.body.contains("Apollo"));

    let duplicate = browser
        .submit("/project/new", "/project/new", &[("name", "Apollo")])
        .await;
    assert_eq!(duplicate.status, 200);
    assert!(duplicate.body.contains("A project with that name already exists."));

    let assigned = browser.submit("/project/1", "/project/1", &[("username", "bob")]).await;
    assert_eq!(assigned.location.as_deref(), Some("/project/1"));
    assert!(browser
        .get("/project/1")
        .await
        .body
        .contains("User bob has been assigned to the project."));

    browser.submit("/project/1", "/project/1", &[("username", "bob")]).await;
    assert!(browser
        .get("/project/1")
        .await
        .body
        .contains("User bob is already assigned to this project."));

    browser.submit("/project/1", "/project/1", &[("username", "nobody")]).await;
    assert!(browser
        .get("/project/1")
        .await
        .body
        .contains("User nobody does not exist."));

    let removed = browser.submit("/project/1", "/project/1/remove_user/2", &[]).await;
    assert_eq!(removed.location.as_deref(), Some("/project/1"));
    assert!(browser
        .get("/project/1")
        .await
        .body
        .contains("User bob has been removed from the project."));

    browser.submit("/project/1", "/project/1/remove_user/2", &[]).await;
    assert!(browser
        .get("/project/1")
        .await
        .body
        .contains("User bob is not assigned to this project."));

    let deleted = browser.submit("/project/1", "/project/1/delete", &[]).await;
    assert_eq!(deleted.location.as_deref(), Some("/home"));
    assert_eq!(browser.get("/project/1").await.status, 404);
}

#[tokio::test]
async fn test_ticket_lifecycle_over_http() {
    let (state, filter) = app();
    let admin = common::admin(&state.tracker).await;
    let bob = common::regular(&state.tracker, "bob").await;
    common::regular(&state.tracker, "carol").await;
    let project = state
        .tracker
        .create_project(
            &admin,
            NewProject {
                name: "Apollo".to_string(),
                description: None,
            },
        )
        .await
        .unwrap();
    state.tracker.assign_member(&admin, project.id, "bob").await.unwrap();

    let mut bob_browser = Browser::new(filter.clone());
    bob_browser.login("bob", PASSWORD).await;
    let created = bob_browser
        .submit(
            "/project/1/ticket/new",
            "/project/1/ticket/new",
            &[("subject", "Broken hatch"), ("description", "It leaks"), ("status", "Open")],
        )
        .await;
    assert_eq!(created.location.as_deref(), Some("/project/1"));

    let form = bob_browser.get("/ticket/1/update").await;
    assert!(form.body.contains(r#"value="Broken hatch""#));
    let token = form.csrf_token();
    let updated = bob_browser
        .post(
            "/ticket/1/update",
            &[
                ("subject", "Broken hatch"),
                ("description", "It leaks badly"),
                ("status", "In Progress"),
                ("csrf_token", &token),
            ],
        )
        .await;
    assert_eq!(updated.location.as_deref(), Some("/ticket/1"));
    let view = bob_browser.get("/ticket/1").await;
    assert!(view.body.contains("Your ticket has been updated!"));
    assert!(view.body.contains("In Progress"));

    let mut carol_browser = Browser::new(filter.clone());
    carol_browser.login("carol", PASSWORD).await;
    assert_eq!(carol_browser.get("/ticket/1").await.status, 200);
    assert_eq!(carol_browser.get("/project/1/ticket/new").await.status, 403);
    assert_eq!(carol_browser.get("/ticket/1/update").await.status, 403);
    let carol_session = carol_browser.cookie.clone().unwrap();
    let token = state.csrf.generate_csrf_token(&carol_session);
    let denied = carol_browser.post("/ticket/1/delete", &[("csrf_token", &token)]).await;
    assert_eq!(denied.status, 403);

    let mut admin_browser = Browser::new(filter);
    admin_browser.login("admin", PASSWORD).await;
    let deleted = admin_browser.submit("/ticket/1", "/ticket/1/delete", &[]).await;
    assert_eq!(deleted.location.as_deref(), Some("/project/1"));
    assert_eq!(admin_browser.get("/ticket/1").await.status, 404);

    let remaining = state
        .tracker
        .project_detail(&bob, project.id)
        .await
        .unwrap();
    assert!(remaining.tickets.is_empty());
}

#[tokio::test]
async fn test_logout_ends_session() {
    let (state, filter) = app();
    common::regular(&state.tracker, "alice").await;
    let mut browser = Browser::new(filter);
    browser.login("alice", PASSWORD).await;
    assert_eq!(browser.get("/home").await.status, 200);

    let page = browser.get("/logout").await;
    assert_eq!(page.location.as_deref(), Some("/login"));
    assert!(browser.get("/login").await.body.contains("You have been logged out."));
    assert_eq!(browser.get("/home").await.status, 303);
}

#[tokio::test]
async fn test_unauthenticated_form_action_resumes_at_parent_page() {
    let (_state, filter) = app();
    let mut browser = Browser::new(filter);

    let page = browser.post("/ticket/1/delete", &[("csrf_token", "stale")]).await;
    assert_eq!(page.status, 303);
    assert_eq!(page.location.as_deref(), Some("/login?next=%2Fticket%2F1"));

    let page = browser
        .post("/project/4/remove_user/2", &[("csrf_token", "stale")])
        .await;
    assert_eq!(page.location.as_deref(), Some("/login?next=%2Fproject%2F4"));

    let page = browser
        .post("/ticket/1/update", &[("csrf_token", "stale")])
        .await;
    assert_eq!(page.location.as_deref(), Some("/login?next=%2Fticket%2F1%2Fupdate"));
}
