//! Server-rendered HTML pages
//!
//! Deliberately plain: every page is a `String` built from the layout below.
//! All user-supplied text goes through [`encode_html`].

use std::fmt::Write;

use crate::auth::User;
use crate::constants::CSRF_FIELD_NAME;
use crate::core::project::{Project, ProjectDetail};
use crate::core::session::Flash;
use crate::core::ticket::{TicketDetail, TicketStatus};
use crate::core::validation::{FieldErrors, LoginForm, ProjectForm, RegistrationForm, TicketForm};
use crate::security::encode_html;

/// Per-request data every page needs
pub struct Page<'a> {
    pub title: &'a str,
    pub user: Option<&'a User>,
    pub flashes: Vec<Flash>,
    pub csrf_token: String,
}

impl Page<'_> {
    fn csrf_field(&self) -> String {
        format!(
            r#"<input type="hidden" name="{}" value="{}">"#,
            CSRF_FIELD_NAME,
            encode_html(&self.csrf_token)
        )
    }

    /// A form holding nothing but a submit button
    fn button_form(&self, action: &str, label: &str) -> String {
        format!(
            r#"<form method="post" action="{}" class="inline">{}<button type="submit">{}</button></form>"#,
            encode_html(action),
            self.csrf_field(),
            label
        )
    }
}

fn layout(page: &Page<'_>, content: &str) -> String {
    let mut nav = String::from(r#"<a href="/home">Home</a>"#);
    match page.user {
        Some(user) => {
            if user.is_admin() {
                nav.push_str(r#" <a href="/project/new">New Project</a>"#);
                nav.push_str(r#" <a href="/admin/create_user">Create User</a>"#);
            }
            let _ = write!(
                nav,
                r#" <span class="user">{} ({})</span> <a href="/logout">Logout</a>"#,
                encode_html(&user.username),
                user.role
            );
        }
        None => nav.push_str(r#" <a href="/login">Login</a> <a href="/register">Register</a>"#),
    }

    let mut flashes = String::new();
    for flash in &page.flashes {
        let _ = write!(
            flashes,
            r#"<div class="alert alert-{}">{}</div>"#,
            flash.category.as_str(),
            encode_html(&flash.message)
        );
    }

    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{title} - Ticket Tracker</title></head>\
         <body><nav>{nav}</nav><main>{flashes}<h1>{title}</h1>{content}</main></body></html>",
        title = encode_html(page.title),
        nav = nav,
        flashes = flashes,
        content = content
    )
}

fn field_errors(errors: &FieldErrors, field: &str) -> String {
    errors
        .get(field)
        .iter()
        .map(|message| format!(r#"<span class="error">{}</span>"#, encode_html(message)))
        .collect()
}

fn text_input(name: &str, label: &str, kind: &str, value: &str, errors: &FieldErrors) -> String {
    format!(
        r#"<p><label for="{name}">{label}</label><input type="{kind}" id="{name}" name="{name}" value="{value}">{errors}</p>"#,
        name = name,
        label = label,
        kind = kind,
        value = encode_html(value),
        errors = field_errors(errors, name)
    )
}

fn textarea(name: &str, label: &str, value: &str, errors: &FieldErrors) -> String {
    format!(
        r#"<p><label for="{name}">{label}</label><textarea id="{name}" name="{name}">{value}</textarea>{errors}</p>"#,
        name = name,
        label = label,
        value = encode_html(value),
        errors = field_errors(errors, name)
    )
}

pub fn login(page: &Page<'_>, form: &LoginForm, errors: &FieldErrors, next: Option<&str>) -> String {
    let action = match next {
        Some(next) => format!(
            "/login?next={}",
            url::form_urlencoded::byte_serialize(next.as_bytes()).collect::<String>()
        ),
        None => "/login".to_string(),
    };

    let content = format!(
        r#"<form method="post" action="{action}">{csrf}{username}{password}<button type="submit">Login</button></form>
<p>Need an account? <a href="/register">Register</a></p>"#,
        action = encode_html(&action),
        csrf = page.csrf_field(),
        username = text_input("username", "Username", "text", &form.username, errors),
        // Never echo a submitted password back
        password = text_input("password", "Password", "password", "", errors),
    );
    layout(page, &content)
}

/// Self-service registration, or admin account creation when `admin_form` is set
pub fn register(page: &Page<'_>, form: &RegistrationForm, errors: &FieldErrors, admin_form: bool) -> String {
    let (action, button) = if admin_form {
        ("/admin/create_user", "Create User")
    } else {
        ("/register", "Sign Up")
    };

    let admin_checkbox = if admin_form {
        format!(
            r#"<p><label><input type="checkbox" name="is_admin" value="y"{}> Is Admin</label></p>"#,
            if form.is_admin.is_some() { " checked" } else { "" }
        )
    } else {
        String::new()
    };

    let content = format!(
        r#"<form method="post" action="{action}">{csrf}{username}{password}{confirm}{admin}<button type="submit">{button}</button></form>"#,
        action = action,
        csrf = page.csrf_field(),
        username = text_input("username", "Username", "text", &form.username, errors),
        password = text_input("password", "Password", "password", "", errors),
        confirm = text_input("confirm_password", "Confirm Password", "password", "", errors),
        admin = admin_checkbox,
        button = button,
    );
    layout(page, &content)
}

pub fn home(page: &Page<'_>, projects: &[Project]) -> String {
    let mut content = String::new();
    if projects.is_empty() {
        content.push_str("<p>No projects yet.</p>");
    } else {
        content.push_str("<ul class=\"projects\">");
        for project in projects {
            let _ = write!(
                content,
                r#"<li><a href="/project/{}">{}</a>{}</li>"#,
                project.id,
                encode_html(&project.name),
                project
                    .description
                    .as_deref()
                    .map(|d| format!(" - {}", encode_html(d)))
                    .unwrap_or_default()
            );
        }
        content.push_str("</ul>");
    }
    layout(page, &content)
}

pub fn project_form(page: &Page<'_>, form: &ProjectForm, errors: &FieldErrors) -> String {
    let content = format!(
        r#"<form method="post" action="/project/new">{csrf}{name}{description}<button type="submit">Create Project</button></form>"#,
        csrf = page.csrf_field(),
        name = text_input("name", "Name", "text", &form.name, errors),
        description = textarea("description", "Description", &form.description, errors),
    );
    layout(page, &content)
}

/// Project page; admin controls are shown to admins only
pub fn project_detail(
    page: &Page<'_>,
    detail: &ProjectDetail,
    assign_username: &str,
    errors: &FieldErrors,
) -> String {
    let project = &detail.project;
    let is_admin = page.user.map_or(false, User::is_admin);
    let can_file = is_admin || page.user.map_or(false, |user| detail.has_member(user));
    let mut content = String::new();

    if let Some(description) = &project.description {
        let _ = write!(content, "<p>{}</p>", encode_html(description));
    }
    let _ = write!(
        content,
        "<p class=\"meta\">Created {}</p>",
        project.created_at.format("%Y-%m-%d %H:%M")
    );

    content.push_str("<h2>Tickets</h2>");
    if can_file {
        let _ = write!(content, r#"<p><a href="/project/{}/ticket/new">New Ticket</a></p>"#, project.id);
    }
    if detail.tickets.is_empty() {
        content.push_str("<p>No tickets.</p>");
    } else {
        content.push_str("<ul class=\"tickets\">");
        for ticket in &detail.tickets {
            let _ = write!(
                content,
                r#"<li><a href="/ticket/{}">{}</a> <span class="status">{}</span></li>"#,
                ticket.id,
                encode_html(&ticket.subject),
                ticket.status
            );
        }
        content.push_str("</ul>");
    }

    content.push_str("<h2>Members</h2><ul class=\"members\">");
    for member in &detail.members {
        let remove = if is_admin {
            page.button_form(&format!("/project/{}/remove_user/{}", project.id, member.id), "Remove")
        } else {
            String::new()
        };
        let _ = write!(content, "<li>{} {}</li>", encode_html(&member.username), remove);
    }
    content.push_str("</ul>");

    if is_admin {
        let _ = write!(
            content,
            r#"<form method="post" action="/project/{id}">{csrf}{username}<button type="submit">Assign User</button></form>"#,
            id = project.id,
            csrf = page.csrf_field(),
            username = text_input("username", "Username", "text", assign_username, errors),
        );
        content.push_str(&page.button_form(&format!("/project/{}/delete", project.id), "Delete Project"));
    }

    layout(page, &content)
}

/// Ticket create/update form
pub fn ticket_form(page: &Page<'_>, action: &str, form: &TicketForm, errors: &FieldErrors) -> String {
    let mut options = String::new();
    for status in TicketStatus::ALL {
        let _ = write!(
            options,
            r#"<option value="{value}"{selected}>{value}</option>"#,
            value = status.as_str(),
            selected = if form.status == status.as_str() { " selected" } else { "" }
        );
    }

    let content = format!(
        r#"<form method="post" action="{action}">{csrf}{subject}{description}<p><label for="status">Status</label><select id="status" name="status">{options}</select>{status_errors}</p><button type="submit">Save Ticket</button></form>"#,
        action = encode_html(action),
        csrf = page.csrf_field(),
        subject = text_input("subject", "Subject", "text", &form.subject, errors),
        description = textarea("description", "Description", &form.description, errors),
        options = options,
        status_errors = field_errors(errors, "status"),
    );
    layout(page, &content)
}

pub fn ticket_detail(page: &Page<'_>, detail: &TicketDetail, can_update: bool, can_delete: bool) -> String {
    let ticket = &detail.ticket;
    let mut content = format!(
        r#"<p class="meta">Project <a href="/project/{pid}">{project}</a> &middot; by {author} &middot; {created} &middot; <span class="status">{status}</span></p><div class="description">{description}</div>"#,
        pid = detail.project.id,
        project = encode_html(&detail.project.name),
        author = encode_html(&detail.author.username),
        created = ticket.created_at.format("%Y-%m-%d %H:%M"),
        status = ticket.status,
        description = encode_html(&ticket.description),
    );

    if can_update {
        let _ = write!(content, r#"<p><a href="/ticket/{}/update">Update</a></p>"#, ticket.id);
    }
    if can_delete {
        content.push_str(&page.button_form(&format!("/ticket/{}/delete", ticket.id), "Delete"));
    }
    layout(page, &content)
}

/// Standalone error page; no session data is needed to render it
pub fn error_page(status: u16, title: &str, message: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{status} {title}</title></head>\
         <body><main><h1>{status} {title}</h1><p>{message}</p><p><a href=\"/home\">Back to home</a></p></main></body></html>",
        status = status,
        title = encode_html(title),
        message = encode_html(message)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{UserId, UserRole};
    use crate::core::session::FlashCategory;

    fn user(role: UserRole) -> User {
        User {
            id: UserId(1),
            username: "<alice>".to_string(),
            password_hash: String::new(),
            role,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_layout_escapes_user_content() {
        let alice = user(UserRole::Regular);
        let page = Page {
            title: "Home",
            user: Some(&alice),
            flashes: vec![Flash {
                category: FlashCategory::Success,
                message: "<b>hi</b>".to_string(),
            }],
            csrf_token: "tok".to_string(),
        };
        let html = home(&page, &[]);
        assert!(html.contains("&lt;alice&gt;"));
        assert!(html.contains(r#"class="alert alert-success""#));
        assert!(html.contains("&lt;b&gt;hi&lt;&#x2F;b&gt;"));
        assert!(!html.contains("Create User"));
    }

    #[test]
    fn test_admin_nav_and_login_next() {
        let admin = user(UserRole::Admin);
        let page = Page {
            title: "Home",
            user: Some(&admin),
            flashes: Vec::new(),
            csrf_token: "tok".to_string(),
        };
        assert!(home(&page, &[]).contains("/admin/create_user"));

        let anonymous = Page {
            title: "Login",
            user: None,
            flashes: Vec::new(),
            csrf_token: "tok".to_string(),
        };
        let html = login(&anonymous, &LoginForm::default(), &FieldErrors::new(), Some("/project/1"));
        assert!(html.contains("?next&#x3D;%2Fproject%2F1"));
        assert!(html.contains(r#"name="csrf_token" value="tok""#));
    }

    #[test]
    fn test_field_errors_are_rendered() {
        let page = Page {
            title: "Register",
            user: None,
            flashes: Vec::new(),
            csrf_token: String::new(),
        };
        let errors = FieldErrors::single("username", "That username is taken.");
        let html = register(&page, &RegistrationForm::default(), &errors, false);
        assert!(html.contains("That username is taken."));
        assert!(!html.contains("is_admin"));
    }
}
