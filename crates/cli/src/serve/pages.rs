//! Server-rendered pages: login, the two dashboards.

use axum::response::{Html, IntoResponse, Redirect, Response};
use hoi_storage::Role;
use hoi_workflow::{AuthMode, Identity};

use super::session::MaybeViewer;

pub(crate) fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Where a signed-in identity lands.
pub(crate) fn home_for(identity: &Identity) -> &'static str {
    match identity.role {
        Role::Reviewer => "/dashboard",
        Role::Submitter => "/submitter_dashboard",
    }
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{}</title>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        escape_html(title),
        body
    )
}

const OTP_SCRIPT: &str = r#"<script>
async function sendCode() {
  const email = document.getElementById('email').value;
  const res = await fetch('/api/send_otp', {
    method: 'POST',
    headers: {'Content-Type': 'application/json'},
    body: JSON.stringify({email})
  });
  const data = await res.json();
  document.getElementById('status').textContent = data.message || data.error || '';
}
</script>"#;

pub(crate) fn login_page(mode: AuthMode, error: Option<&str>) -> String {
    let error_html = error
        .map(|e| format!("<p class=\"error\" role=\"alert\">{}</p>\n", escape_html(e)))
        .unwrap_or_default();
    let form = match mode {
        AuthMode::Otp => format!(
            "<form method=\"post\" action=\"/\">\n\
             <label>Email <input id=\"email\" name=\"email\" type=\"email\" required></label>\n\
             <button type=\"button\" onclick=\"sendCode()\">Send code</button>\n\
             <p id=\"status\"></p>\n\
             <label>Code <input name=\"otp\" inputmode=\"numeric\" maxlength=\"6\" required></label>\n\
             <button type=\"submit\">Sign in</button>\n\
             </form>\n{}",
            OTP_SCRIPT
        ),
        AuthMode::Password => "<form method=\"post\" action=\"/\">\n\
             <label>Username <input name=\"username\" required></label>\n\
             <label>Password <input name=\"password\" type=\"password\" required></label>\n\
             <button type=\"submit\">Sign in</button>\n\
             </form>"
            .to_string(),
    };
    page(
        "HOI Dashboard Login",
        &format!("<h1>HOI Dashboard</h1>\n{}{}", error_html, form),
    )
}

/// GET /dashboard
pub(crate) async fn handle_dashboard(MaybeViewer(viewer): MaybeViewer) -> Response {
    match viewer {
        Some(identity) if identity.is_reviewer() => Html(page(
            "HOI Dashboard",
            &format!(
                "<h1>HOI Dashboard</h1>\n<p>Signed in as {}.</p>\n\
                 <ul>\n<li><a href=\"/api/summary\">Summary</a></li>\n\
                 <li><a href=\"/api/submissions?status=pending\">Pending submissions</a></li>\n\
                 <li><a href=\"/api/activity\">Recent activity</a></li>\n</ul>\n\
                 <p><a href=\"/logout\">Sign out</a></p>",
                escape_html(&identity.user)
            ),
        ))
        .into_response(),
        _ => Redirect::to("/").into_response(),
    }
}

/// GET /submitter_dashboard
pub(crate) async fn handle_submitter_dashboard(MaybeViewer(viewer): MaybeViewer) -> Response {
    match viewer {
        Some(identity) if !identity.is_reviewer() => {
            let form_link = identity
                .form_access
                .as_deref()
                .map(|form| {
                    format!(
                        "<p>Your form: <a href=\"/forms/{0}\">{0}</a></p>\n",
                        escape_html(form)
                    )
                })
                .unwrap_or_else(|| "<p>No form is assigned to you.</p>\n".to_string());
            Html(page(
                "Submitter Dashboard",
                &format!(
                    "<h1>Submitter Dashboard</h1>\n<p>Signed in as {}.</p>\n{}\
                     <p><a href=\"/api/my_submissions\">My submissions</a></p>\n\
                     <p><a href=\"/logout\">Sign out</a></p>",
                    escape_html(&identity.user),
                    form_link
                ),
            ))
            .into_response()
        }
        _ => Redirect::to("/").into_response(),
    }
}
