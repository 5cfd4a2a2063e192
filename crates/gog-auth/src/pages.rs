//! HTML pages served by the manage server.
//!
//! Pages are self-contained (inline CSS and script). Every interpolated value
//! goes through [`html_escape`].

use gog_core::html_escape;

const STYLE: &str = r#"<style>
body { font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", sans-serif; max-width: 640px; margin: 48px auto; padding: 0 16px; color: #202124; }
h1 { font-size: 1.5rem; }
table { width: 100%; border-collapse: collapse; }
td, th { text-align: left; padding: 8px 4px; border-bottom: 1px solid #e0e0e0; }
button, a.button { font: inherit; padding: 6px 12px; border-radius: 4px; border: 1px solid #dadce0; background: #fff; cursor: pointer; text-decoration: none; color: inherit; }
.primary { background: #1a73e8; color: #fff; border-color: #1a73e8; }
.muted { color: #5f6368; }
.error { color: #c5221f; }
</style>"#;

fn page(title: &str, body: &str) -> String {
    format!(
        "<!doctype html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n{style}\n</head>\n<body>\n{body}\n</body>\n</html>\n",
        title = html_escape(title),
        style = STYLE,
        body = body,
    )
}

/// Account management page.
///
/// The CSRF token is embedded in a meta tag; the script sends it back in the
/// `X-CSRF-Token` header of every state-changing request.
pub fn render_accounts_page(csrf_token: &str) -> String {
    let body = format!(
        r#"<meta name="csrf-token" content="{csrf}">
<h1>gog accounts</h1>
<p class="muted">Google accounts authorized for the gog CLI.</p>
<table>
<thead><tr><th>Account</th><th>Services</th><th></th></tr></thead>
<tbody id="accounts"><tr><td colspan="3" class="muted">Loading…</td></tr></tbody>
</table>
<p><a class="button primary" href="/auth/start">Add account</a></p>
<p id="status" class="error"></p>
<script>
const csrf = document.querySelector('meta[name="csrf-token"]').content;
function esc(s) {{ const d = document.createElement('div'); d.textContent = s; return d.innerHTML; }}
async function post(path, email) {{
  const res = await fetch(path, {{ method: 'POST', headers: {{ 'Content-Type': 'application/json', 'X-CSRF-Token': csrf }}, body: JSON.stringify({{ email }}) }});
  if (!res.ok) {{ document.getElementById('status').textContent = await res.text(); }}
  await load();
}}
async function load() {{
  const res = await fetch('/api/accounts');
  const data = await res.json();
  const rows = data.accounts.map(a => `<tr><td>${{esc(a.email)}}${{a.default ? ' <span class="muted">(default)</span>' : ''}}</td><td>${{esc(a.services.join(', '))}}</td><td>${{a.default ? '' : `<button data-default="${{esc(a.email)}}">Make default</button> `}}<button data-remove="${{esc(a.email)}}">Remove</button></td></tr>`);
  document.getElementById('accounts').innerHTML = rows.length ? rows.join('') : '<tr><td colspan="3" class="muted">No accounts yet.</td></tr>';
  document.querySelectorAll('[data-default]').forEach(b => b.onclick = () => post('/api/default', b.dataset.default));
  document.querySelectorAll('[data-remove]').forEach(b => b.onclick = () => post('/api/remove', b.dataset.remove));
}}
load();
</script>"#,
        csrf = html_escape(csrf_token),
    );
    page("gog accounts", &body)
}

/// Page shown after a successful login.
pub fn render_success_page(email: &str, services: &[String]) -> String {
    let services = if services.is_empty() {
        "<li class=\"muted\">none</li>".to_string()
    } else {
        services
            .iter()
            .map(|s| format!("<li>{}</li>", html_escape(s)))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let body = format!(
        "<h1>Signed in</h1>\n<p>gog is now authorized for <strong>{email}</strong>.</p>\n<p>Services:</p>\n<ul>\n{services}\n</ul>\n<p class=\"muted\">You can close this window and return to the terminal.</p>",
        email = html_escape(email),
        services = services,
    );
    page("gog: signed in", &body)
}

/// Page shown when the login failed.
pub fn render_error_page(message: &str) -> String {
    let body = format!(
        "<h1>Authorization failed</h1>\n<p class=\"error\">{}</p>\n<p><a class=\"button\" href=\"/\">Back to accounts</a></p>",
        html_escape(message)
    );
    page("gog: authorization failed", &body)
}
