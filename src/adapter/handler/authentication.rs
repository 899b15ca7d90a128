//! Accept-time checks for a new WebSocket connection (§6.1, §7's
//! "Resource exhaustion" and "Authorization failure" kinds).

use crate::app::App;
use crate::protocol::error_codes;

pub enum AcceptDecision {
    Accept,
    Reject { code: u16, message: &'static str },
}

/// Validates origin and the app's connection limit before the upgrade
/// completes. App lookup itself (key → `App`, 4001 if unknown) happens in
/// the caller, since only it has the `AppManager`.
pub fn check_accept(app: &App, origin: Option<&str>, current_connections: usize) -> AcceptDecision {
    if !app.origin_allowed(origin) {
        return AcceptDecision::Reject {
            code: error_codes::ORIGIN_NOT_ALLOWED,
            message: "Origin not allowed",
        };
    }
    if let Some(max) = app.max_connections {
        if current_connections as u64 >= max {
            return AcceptDecision::Reject {
                code: error_codes::CONNECTION_LIMIT_REACHED,
                message: "Connection limit reached",
            };
        }
    }
    AcceptDecision::Accept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> App {
        App {
            app_id: "1".to_string(),
            key: "key".to_string(),
            secret: "secret".to_string(),
            allowed_origins: vec!["https://example.com".to_string()],
            ping_interval: 120,
            activity_timeout: 60,
            max_connections: Some(1),
            max_message_size: None,
        }
    }

    #[test]
    fn rejects_disallowed_origin() {
        let decision = check_accept(&app(), Some("https://evil.example"), 0);
        assert!(matches!(decision, AcceptDecision::Reject { code: 4003, .. }));
    }

    #[test]
    fn rejects_over_connection_limit() {
        let decision = check_accept(&app(), Some("https://example.com"), 1);
        assert!(matches!(decision, AcceptDecision::Reject { code: 4004, .. }));
    }

    #[test]
    fn accepts_within_limits() {
        let decision = check_accept(&app(), Some("https://example.com"), 0);
        assert!(matches!(decision, AcceptDecision::Accept));
    }
}
