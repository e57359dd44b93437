//! Ticket handlers

use warp::reply::Response;
use warp::Rejection;

use crate::auth::policy;
use crate::core::project::ProjectId;
use crate::core::session::FlashCategory;
use crate::core::ticket::{TicketChanges, TicketId};
use crate::core::validation::{CsrfForm, FieldErrors, TicketForm};
use crate::error::Result;
use crate::handlers::context::RequestContext;
use crate::handlers::form_errors;
use crate::handlers::responses::{html, redirect};
use crate::routes::SharedState;
use crate::views;

fn render_form(
    state: &SharedState,
    ctx: &RequestContext,
    title: &str,
    action: &str,
    form: &TicketForm,
    errors: &FieldErrors,
) -> Result<Response> {
    let page = ctx.page(state, title)?;
    Ok(html(views::ticket_form(&page, action, form, errors)))
}

fn new_ticket_action(project_id: ProjectId) -> String {
    format!("/project/{}/ticket/new", project_id)
}

fn update_ticket_action(ticket_id: TicketId) -> String {
    format!("/ticket/{}/update", ticket_id)
}

/// `GET /project/<id>/ticket/new`
pub async fn new_ticket_page(
    project_id: u64,
    state: SharedState,
    ctx: RequestContext,
) -> std::result::Result<Response, Rejection> {
    let result: Result<Response> = async {
        let user = ctx.require_user(&state).await?;
        let project_id = ProjectId(project_id);
        state.tracker.authorize_ticket_creation(&user, project_id).await?;

        let form = TicketForm::from_changes(&TicketChanges::default());
        render_form(&state, &ctx, "New Ticket", &new_ticket_action(project_id), &form, &FieldErrors::new())
    }
    .await;
    Ok(ctx.finish(&state, result))
}

pub async fn create_ticket(
    project_id: u64,
    state: SharedState,
    ctx: RequestContext,
    form: TicketForm,
) -> std::result::Result<Response, Rejection> {
    let result = submit_new_ticket(&state, &ctx, ProjectId(project_id), form).await;
    Ok(ctx.finish(&state, result))
}

async fn submit_new_ticket(
    state: &SharedState,
    ctx: &RequestContext,
    project_id: ProjectId,
    form: TicketForm,
) -> Result<Response> {
    let user = ctx.require_user(state).await?;
    ctx.verify_csrf(state, &form.csrf_token).await?;
    state.tracker.authorize_ticket_creation(&user, project_id).await?;

    let action = new_ticket_action(project_id);
    let changes = match form.validate() {
        Ok(changes) => changes,
        Err(errors) => return render_form(state, ctx, "New Ticket", &action, &form, &errors),
    };

    match state.tracker.create_ticket(&user, project_id, changes).await {
        Ok(ticket) => {
            ctx.flash(state, FlashCategory::Success, "Your ticket has been created!")?;
            Ok(redirect(&format!("/project/{}", ticket.project_id)))
        }
        Err(err) => render_form(state, ctx, "New Ticket", &action, &form, &form_errors(err)?),
    }
}

/// `GET /ticket/<id>`
pub async fn ticket_page(
    ticket_id: u64,
    state: SharedState,
    ctx: RequestContext,
) -> std::result::Result<Response, Rejection> {
    let result: Result<Response> = async {
        let user = ctx.require_user(&state).await?;
        let detail = state.tracker.ticket_detail(&user, TicketId(ticket_id)).await?;

        let is_member = state
            .tracker
            .storage()
            .project_storage()
            .is_member(detail.project.id, user.id)
            .await?;
        let can_update = policy::can_update_ticket(&user, is_member).is_allowed();
        let can_delete = policy::can_delete_ticket(&user, detail.ticket.author_id).is_allowed();

        let page = ctx.page(&state, &detail.ticket.subject)?;
        Ok(html(views::ticket_detail(&page, &detail, can_update, can_delete)))
    }
    .await;
    Ok(ctx.finish(&state, result))
}

/// `GET /ticket/<id>/update`, pre-filled with the current values
pub async fn update_ticket_page(
    ticket_id: u64,
    state: SharedState,
    ctx: RequestContext,
) -> std::result::Result<Response, Rejection> {
    let result: Result<Response> = async {
        let user = ctx.require_user(&state).await?;
        let ticket_id = TicketId(ticket_id);
        let ticket = state.tracker.authorize_ticket_update(&user, ticket_id).await?;

        let form = TicketForm::from_changes(&TicketChanges {
            subject: ticket.subject,
            description: ticket.description,
            status: ticket.status,
        });
        render_form(&state, &ctx, "Update Ticket", &update_ticket_action(ticket_id), &form, &FieldErrors::new())
    }
    .await;
    Ok(ctx.finish(&state, result))
}

pub async fn update_ticket(
    ticket_id: u64,
    state: SharedState,
    ctx: RequestContext,
    form: TicketForm,
) -> std::result::Result<Response, Rejection> {
    let result = submit_update(&state, &ctx, TicketId(ticket_id), form).await;
    Ok(ctx.finish(&state, result))
}

async fn submit_update(
    state: &SharedState,
    ctx: &RequestContext,
    ticket_id: TicketId,
    form: TicketForm,
) -> Result<Response> {
    let user = ctx.require_user(state).await?;
    ctx.verify_csrf(state, &form.csrf_token).await?;
    state.tracker.authorize_ticket_update(&user, ticket_id).await?;

    let action = update_ticket_action(ticket_id);
    let changes = match form.validate() {
        Ok(changes) => changes,
        Err(errors) => return render_form(state, ctx, "Update Ticket", &action, &form, &errors),
    };

    match state.tracker.update_ticket(&user, ticket_id, changes).await {
        Ok(ticket) => {
            ctx.flash(state, FlashCategory::Success, "Your ticket has been updated!")?;
            Ok(redirect(&format!("/ticket/{}", ticket.id)))
        }
        Err(err) => render_form(state, ctx, "Update Ticket", &action, &form, &form_errors(err)?),
    }
}

/// `POST /ticket/<id>/delete`
pub async fn delete_ticket(
    ticket_id: u64,
    state: SharedState,
    ctx: RequestContext,
    form: CsrfForm,
) -> std::result::Result<Response, Rejection> {
    let result: Result<Response> = async {
        let user = ctx.require_user(&state).await?;
        ctx.verify_csrf(&state, &form.csrf_token).await?;
        let ticket = state.tracker.delete_ticket(&user, TicketId(ticket_id)).await?;
        ctx.flash(&state, FlashCategory::Success, "The ticket has been deleted.")?;
        Ok(redirect(&format!("/project/{}", ticket.project_id)))
    }
    .await;
    Ok(ctx.finish(&state, result))
}
