//! Project handlers: listing, creation, membership and deletion

use warp::reply::Response;
use warp::Rejection;

use crate::auth::{policy, UserId};
use crate::constants::HOME_PATH;
use crate::core::project::{MembershipChange, ProjectId};
use crate::core::session::FlashCategory;
use crate::core::validation::{AssignUserForm, CsrfForm, FieldErrors, ProjectForm};
use crate::error::{Result, TrackerError};
use crate::handlers::context::RequestContext;
use crate::handlers::form_errors;
use crate::handlers::responses::{html, redirect};
use crate::routes::SharedState;
use crate::views;

/// `GET /` and `GET /home`
pub async fn home(state: SharedState, ctx: RequestContext) -> std::result::Result<Response, Rejection> {
    let result: Result<Response> = async {
        let user = ctx.require_user(&state).await?;
        let projects = state.tracker.list_projects(&user).await?;
        let page = ctx.page(&state, "Projects")?;
        Ok(html(views::home(&page, &projects)))
    }
    .await;
    Ok(ctx.finish(&state, result))
}

pub async fn new_project_page(state: SharedState, ctx: RequestContext) -> std::result::Result<Response, Rejection> {
    let result: Result<Response> = async {
        let user = ctx.require_user(&state).await?;
        policy::can_create_project(&user).into_result()?;
        render_project_form(&state, &ctx, &ProjectForm::default(), &FieldErrors::new())
    }
    .await;
    Ok(ctx.finish(&state, result))
}

pub async fn create_project(
    state: SharedState,
    ctx: RequestContext,
    form: ProjectForm,
) -> std::result::Result<Response, Rejection> {
    let result = submit_project(&state, &ctx, form).await;
    Ok(ctx.finish(&state, result))
}

async fn submit_project(state: &SharedState, ctx: &RequestContext, form: ProjectForm) -> Result<Response> {
    let user = ctx.require_user(state).await?;
    ctx.verify_csrf(state, &form.csrf_token).await?;
    policy::can_create_project(&user).into_result()?;

    let project = match form.validate() {
        Ok(project) => project,
        Err(errors) => return render_project_form(state, ctx, &form, &errors),
    };

    match state.tracker.create_project(&user, project).await {
        Ok(_) => {
            ctx.flash(state, FlashCategory::Success, "New project has been created!")?;
            Ok(redirect(HOME_PATH))
        }
        Err(err) => render_project_form(state, ctx, &form, &form_errors(err)?),
    }
}

fn render_project_form(
    state: &SharedState,
    ctx: &RequestContext,
    form: &ProjectForm,
    errors: &FieldErrors,
) -> Result<Response> {
    let page = ctx.page(state, "New Project")?;
    Ok(html(views::project_form(&page, form, errors)))
}

/// `GET /project/<id>`
pub async fn project_page(
    project_id: u64,
    state: SharedState,
    ctx: RequestContext,
) -> std::result::Result<Response, Rejection> {
    let result = render_project(&state, &ctx, ProjectId(project_id), "", &FieldErrors::new()).await;
    Ok(ctx.finish(&state, result))
}

async fn render_project(
    state: &SharedState,
    ctx: &RequestContext,
    project_id: ProjectId,
    assign_username: &str,
    errors: &FieldErrors,
) -> Result<Response> {
    let user = ctx.require_user(state).await?;
    let detail = state.tracker.project_detail(&user, project_id).await?;
    let page = ctx.page(state, &detail.project.name)?;
    Ok(html(views::project_detail(&page, &detail, assign_username, errors)))
}

/// `POST /project/<id>` with a username assigns that user
pub async fn assign_member(
    project_id: u64,
    state: SharedState,
    ctx: RequestContext,
    form: AssignUserForm,
) -> std::result::Result<Response, Rejection> {
    let result = submit_assign(&state, &ctx, ProjectId(project_id), form).await;
    Ok(ctx.finish(&state, result))
}

async fn submit_assign(
    state: &SharedState,
    ctx: &RequestContext,
    project_id: ProjectId,
    form: AssignUserForm,
) -> Result<Response> {
    let user = ctx.require_user(state).await?;
    ctx.verify_csrf(state, &form.csrf_token).await?;
    // Resolves the project first so a missing project is a 404, not a flash
    state.tracker.project_detail(&user, project_id).await?;
    policy::can_manage_membership(&user).into_result()?;

    let username = match form.validate() {
        Ok(username) => username,
        Err(errors) => return render_project(state, ctx, project_id, &form.username, &errors).await,
    };

    let (category, message) = match state.tracker.assign_member(&user, project_id, &username).await {
        Ok((member, MembershipChange::Assigned)) => (
            FlashCategory::Success,
            format!("User {} has been assigned to the project.", member.username),
        ),
        Ok((member, _)) => (
            FlashCategory::Info,
            format!("User {} is already assigned to this project.", member.username),
        ),
        Err(TrackerError::NotFound(_)) => (FlashCategory::Danger, format!("User {} does not exist.", username)),
        Err(err) => return Err(err),
    };

    ctx.flash(state, category, message)?;
    Ok(redirect(&format!("/project/{}", project_id)))
}

/// `POST /project/<id>/delete`
pub async fn delete_project(
    project_id: u64,
    state: SharedState,
    ctx: RequestContext,
    form: CsrfForm,
) -> std::result::Result<Response, Rejection> {
    let result: Result<Response> = async {
        let user = ctx.require_user(&state).await?;
        ctx.verify_csrf(&state, &form.csrf_token).await?;
        state.tracker.delete_project(&user, ProjectId(project_id)).await?;
        ctx.flash(&state, FlashCategory::Success, "The project has been deleted.")?;
        Ok(redirect(HOME_PATH))
    }
    .await;
    Ok(ctx.finish(&state, result))
}

/// `POST /project/<id>/remove_user/<user_id>`
pub async fn remove_member(
    project_id: u64,
    user_id: u64,
    state: SharedState,
    ctx: RequestContext,
    form: CsrfForm,
) -> std::result::Result<Response, Rejection> {
    let result: Result<Response> = async {
        let user = ctx.require_user(&state).await?;
        ctx.verify_csrf(&state, &form.csrf_token).await?;

        let project_id = ProjectId(project_id);
        let (member, change) = state
            .tracker
            .remove_member(&user, project_id, UserId(user_id))
            .await?;
        let (category, message) = match change {
            MembershipChange::Removed => (
                FlashCategory::Success,
                format!("User {} has been removed from the project.", member.username),
            ),
            _ => (
                FlashCategory::Info,
                format!("User {} is not assigned to this project.", member.username),
            ),
        };

        ctx.flash(&state, category, message)?;
        Ok(redirect(&format!("/project/{}", project_id)))
    }
    .await;
    Ok(ctx.finish(&state, result))
}
