//! Account handlers: registration, login, logout and admin user creation

use serde::Deserialize;
use warp::reply::Response;
use warp::Rejection;

use crate::auth::policy;
use crate::constants::{HOME_PATH, LOGIN_PATH};
use crate::core::session::FlashCategory;
use crate::core::validation::{FieldErrors, LoginForm, RegistrationForm};
use crate::error::{Result, TrackerError};
use crate::handlers::context::RequestContext;
use crate::handlers::responses::{self, html, redirect};
use crate::handlers::form_errors;
use crate::routes::SharedState;
use crate::views;

const ALREADY_LOGGED_IN: &str = "You are already logged in.";
const LOGIN_FAILED: &str = "Login unsuccessful. Please check username and password.";

/// `?next=` on the login page
#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

pub async fn register_page(state: SharedState, ctx: RequestContext) -> std::result::Result<Response, Rejection> {
    let result = if !policy::can_register(ctx.user()).is_allowed() {
        already_logged_in(&state, &ctx)
    } else {
        render_register(&state, &ctx, &RegistrationForm::default(), &FieldErrors::new(), false)
    };
    Ok(ctx.finish(&state, result))
}

pub async fn register(
    state: SharedState,
    ctx: RequestContext,
    form: RegistrationForm,
) -> std::result::Result<Response, Rejection> {
    let result = submit_register(&state, &ctx, form).await;
    Ok(ctx.finish(&state, result))
}

async fn submit_register(state: &SharedState, ctx: &RequestContext, form: RegistrationForm) -> Result<Response> {
    if !policy::can_register(ctx.user()).is_allowed() {
        return already_logged_in(state, ctx);
    }
    ctx.verify_csrf(state, &form.csrf_token).await?;

    let registration = match form.validate() {
        Ok(registration) => registration,
        Err(errors) => return render_register(state, ctx, &form, &errors, false),
    };

    match state
        .tracker
        .register(&registration.username, &registration.password)
        .await
    {
        Ok(_) => {
            ctx.flash(state, FlashCategory::Success, "The account has been created!")?;
            Ok(redirect(LOGIN_PATH))
        }
        Err(err) => render_register(state, ctx, &form, &form_errors(err)?, false),
    }
}

fn already_logged_in(state: &SharedState, ctx: &RequestContext) -> Result<Response> {
    ctx.flash(state, FlashCategory::Info, ALREADY_LOGGED_IN)?;
    Ok(redirect(HOME_PATH))
}

fn render_register(
    state: &SharedState,
    ctx: &RequestContext,
    form: &RegistrationForm,
    errors: &FieldErrors,
    admin_form: bool,
) -> Result<Response> {
    let title = if admin_form { "Create User" } else { "Register" };
    let page = ctx.page(state, title)?;
    Ok(html(views::register(&page, form, errors, admin_form)))
}

pub async fn login_page(
    state: SharedState,
    ctx: RequestContext,
    query: NextQuery,
) -> std::result::Result<Response, Rejection> {
    let result = if ctx.user().is_some() {
        Ok(redirect(HOME_PATH))
    } else {
        render_login(&state, &ctx, &LoginForm::default(), &FieldErrors::new(), query.next.as_deref())
    };
    Ok(ctx.finish(&state, result))
}

pub async fn login(
    state: SharedState,
    mut ctx: RequestContext,
    query: NextQuery,
    form: LoginForm,
) -> std::result::Result<Response, Rejection> {
    let result = submit_login(&state, &mut ctx, query, form).await;
    Ok(ctx.finish(&state, result))
}

async fn submit_login(
    state: &SharedState,
    ctx: &mut RequestContext,
    query: NextQuery,
    form: LoginForm,
) -> Result<Response> {
    if ctx.user().is_some() {
        return Ok(redirect(HOME_PATH));
    }
    ctx.verify_csrf(state, &form.csrf_token).await?;
    let next = responses::safe_next(query.next.as_deref()).map(str::to_string);

    let credentials = match form.validate() {
        Ok(credentials) => credentials,
        Err(errors) => return render_login(state, ctx, &form, &errors, next.as_deref()),
    };

    match state
        .tracker
        .authenticate(&credentials.username, &credentials.password)
        .await
    {
        Ok(user) => {
            ctx.login(state, user)?;
            ctx.flash(state, FlashCategory::Success, "You have been logged in!")?;
            Ok(redirect(next.as_deref().unwrap_or(HOME_PATH)))
        }
        Err(TrackerError::InvalidCredentials) => {
            ctx.flash(state, FlashCategory::Danger, LOGIN_FAILED)?;
            render_login(state, ctx, &form, &FieldErrors::new(), next.as_deref())
        }
        Err(err) => Err(err),
    }
}

fn render_login(
    state: &SharedState,
    ctx: &RequestContext,
    form: &LoginForm,
    errors: &FieldErrors,
    next: Option<&str>,
) -> Result<Response> {
    let page = ctx.page(state, "Login")?;
    Ok(html(views::login(&page, form, errors, responses::safe_next(next))))
}

/// `GET /logout`; harmless to forge since it only ends the session
pub async fn logout(state: SharedState, mut ctx: RequestContext) -> std::result::Result<Response, Rejection> {
    let result: Result<Response> = async {
        ctx.logout(&state).await?;
        ctx.flash(&state, FlashCategory::Info, "You have been logged out.")?;
        Ok(redirect(LOGIN_PATH))
    }
    .await;
    Ok(ctx.finish(&state, result))
}

pub async fn create_user_page(state: SharedState, ctx: RequestContext) -> std::result::Result<Response, Rejection> {
    let result: Result<Response> = async {
        let user = ctx.require_user(&state).await?;
        policy::can_create_user(&user).into_result()?;
        render_register(&state, &ctx, &RegistrationForm::default(), &FieldErrors::new(), true)
    }
    .await;
    Ok(ctx.finish(&state, result))
}

pub async fn create_user(
    state: SharedState,
    ctx: RequestContext,
    form: RegistrationForm,
) -> std::result::Result<Response, Rejection> {
    let result = submit_create_user(&state, &ctx, form).await;
    Ok(ctx.finish(&state, result))
}

async fn submit_create_user(state: &SharedState, ctx: &RequestContext, form: RegistrationForm) -> Result<Response> {
    let caller = ctx.require_user(state).await?;
    ctx.verify_csrf(state, &form.csrf_token).await?;
    policy::can_create_user(&caller).into_result()?;

    let registration = match form.validate_for_admin() {
        Ok(registration) => registration,
        Err(errors) => return render_register(state, ctx, &form, &errors, true),
    };

    match state
        .tracker
        .admin_create_user(&caller, &registration.username, &registration.password, registration.role)
        .await
    {
        Ok(user) => {
            ctx.flash(
                state,
                FlashCategory::Success,
                format!("User '{}' has been created successfully!", user.username),
            )?;
            Ok(redirect(HOME_PATH))
        }
        Err(err) => render_register(state, ctx, &form, &form_errors(err)?, true),
    }
}
