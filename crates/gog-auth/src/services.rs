//! Google services gog can be authorized for, and their OAuth scopes.

use std::fmt;
use std::str::FromStr;

use crate::error::{AuthError, AuthResult};

/// Scopes requested with every service so the account email can be read.
pub const IDENTITY_SCOPES: &[&str] = &["openid", "email"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    Gmail,
    Calendar,
    Tasks,
}

impl Service {
    /// Every service, in display order.
    pub const ALL: [Service; 3] = [Service::Gmail, Service::Calendar, Service::Tasks];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gmail => "gmail",
            Self::Calendar => "calendar",
            Self::Tasks => "tasks",
        }
    }

    /// Human-readable name.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Gmail => "Gmail",
            Self::Calendar => "Google Calendar",
            Self::Tasks => "Google Tasks",
        }
    }

    pub fn scopes(&self) -> &'static [&'static str] {
        match self {
            Self::Gmail => &[
                "https://www.googleapis.com/auth/gmail.modify",
                "https://www.googleapis.com/auth/gmail.settings.basic",
            ],
            Self::Calendar => &["https://www.googleapis.com/auth/calendar"],
            Self::Tasks => &["https://www.googleapis.com/auth/tasks"],
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Service {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|svc| svc.as_str() == name)
            .ok_or_else(|| AuthError::UnknownService(s.trim().to_string()))
    }
}

/// Parses a comma separated service list.
///
/// Empty input and `all` select every service. Duplicates are dropped and
/// the first occurrence keeps its position.
pub fn parse_services(value: &str) -> AuthResult<Vec<Service>> {
    let mut services = Vec::new();
    for part in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        if part.eq_ignore_ascii_case("all") {
            return Ok(Service::ALL.to_vec());
        }
        let svc: Service = part.parse()?;
        if !services.contains(&svc) {
            services.push(svc);
        }
    }
    if services.is_empty() {
        return Ok(Service::ALL.to_vec());
    }
    Ok(services)
}

/// OAuth scopes for `services`: the identity scopes first, then each
/// service's scopes, without duplicates.
pub fn scopes_for(services: &[Service]) -> Vec<String> {
    let mut scopes: Vec<String> = Vec::new();
    let all = IDENTITY_SCOPES
        .iter()
        .chain(services.iter().flat_map(|s| s.scopes().iter()));
    for scope in all {
        if !scopes.iter().any(|s| s == scope) {
            scopes.push((*scope).to_string());
        }
    }
    scopes
}

/// Service names as stored on a token.
pub fn service_names(services: &[Service]) -> Vec<String> {
    services.iter().map(|s| s.as_str().to_string()).collect()
}

/// Markdown table of services and scopes, for the README.
pub fn services_markdown_table() -> String {
    let mut out = String::from("| Service | Name | Scopes |\n|---|---|---|\n");
    for svc in Service::ALL {
        let scopes = svc
            .scopes()
            .iter()
            .map(|s| format!("`{}`", s))
            .collect::<Vec<_>>()
            .join("<br>");
        out.push_str(&format!("| `{}` | {} | {} |\n", svc, svc.label(), scopes));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_list() {
        assert_eq!(
            parse_services("gmail, Calendar").unwrap(),
            vec![Service::Gmail, Service::Calendar]
        );
        assert_eq!(
            parse_services("tasks,gmail,tasks").unwrap(),
            vec![Service::Tasks, Service::Gmail]
        );
        assert_eq!(parse_services("").unwrap(), Service::ALL.to_vec());
        assert_eq!(parse_services("all").unwrap(), Service::ALL.to_vec());
    }

    #[test]
    fn unknown_service_rejected() {
        let err = parse_services("gmail,drive").unwrap_err();
        insta::assert_snapshot!(
            err.to_string(),
            @r#"unknown service "drive" (expected one of: gmail, calendar, tasks)"#
        );
    }

    #[test]
    fn scopes_start_with_identity() {
        let scopes = scopes_for(&[Service::Tasks]);
        assert_eq!(
            scopes,
            vec!["openid", "email", "https://www.googleapis.com/auth/tasks"]
        );
        assert_eq!(scopes_for(&[Service::Tasks, Service::Tasks]).len(), 3);
    }

    #[test]
    fn markdown_table() {
        insta::assert_snapshot!(services_markdown_table(), @r"
        | Service | Name | Scopes |
        |---|---|---|
        | `gmail` | Gmail | `https://www.googleapis.com/auth/gmail.modify`<br>`https://www.googleapis.com/auth/gmail.settings.basic` |
        | `calendar` | Google Calendar | `https://www.googleapis.com/auth/calendar` |
        | `tasks` | Google Tasks | `https://www.googleapis.com/auth/tasks` |
        ");
    }
}
