use crate::session::SessionState;
use crate::types::Role;

pub const LOGIN_ROUTE: &str = "/login";
/// Default landing page for an authenticated user whose role does not match.
pub const HOME_ROUTE: &str = "/home";

/// What a route demands of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAccess {
    Public,
    Authenticated,
    Role(Role),
}

/// Outcome of one navigation attempt. Terminal per navigation; recomputed on
/// every route change and on every session publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// Session state not resolved yet: render a placeholder, no redirect.
    Placeholder,
    RedirectToLogin,
    RedirectToHome,
    Render,
}

pub fn evaluate(state: &SessionState, access: RouteAccess) -> GuardDecision {
    let required = match access {
        RouteAccess::Public => return GuardDecision::Render,
        RouteAccess::Authenticated => None,
        RouteAccess::Role(role) => Some(role),
    };

    match state {
        SessionState::Loading => GuardDecision::Placeholder,
        // Unreachable carries no user either; callers can tell the two apart
        // from the session state itself.
        SessionState::SignedOut | SessionState::Unreachable => GuardDecision::RedirectToLogin,
        SessionState::SignedIn(current) => match required {
            Some(role) if current.profile.role != role => GuardDecision::RedirectToHome,
            _ => GuardDecision::Render,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{CurrentUser, SessionOrigin};
    use crate::types::User;

    fn signed_in(role: Role) -> SessionState {
        SessionState::SignedIn(CurrentUser {
            profile: User {
                id: "u-1".to_string(),
                full_name: "Asha Omar".to_string(),
                email: "asha@example.com".to_string(),
                role,
                phone: None,
                avatar_url: None,
            },
            origin: SessionOrigin::Remote,
        })
    }

    #[test]
    fn test_placeholder_while_loading_regardless_of_route() {
        assert_eq!(
            evaluate(&SessionState::Loading, RouteAccess::Authenticated),
            GuardDecision::Placeholder
        );
        assert_eq!(
            evaluate(&SessionState::Loading, RouteAccess::Role(Role::Admin)),
            GuardDecision::Placeholder
        );
    }

    #[test]
    fn test_login_redirect_iff_no_user_after_loading() {
        assert_eq!(
            evaluate(&SessionState::SignedOut, RouteAccess::Authenticated),
            GuardDecision::RedirectToLogin
        );
        assert_eq!(
            evaluate(&SessionState::Unreachable, RouteAccess::Role(Role::Admin)),
            GuardDecision::RedirectToLogin
        );
        // Any published user means no login redirect.
        assert_ne!(
            evaluate(&signed_in(Role::User), RouteAccess::Role(Role::Admin)),
            GuardDecision::RedirectToLogin
        );
        assert_ne!(
            evaluate(&signed_in(Role::User), RouteAccess::Authenticated),
            GuardDecision::RedirectToLogin
        );
    }

    #[test]
    fn test_home_redirect_iff_role_mismatch() {
        assert_eq!(
            evaluate(&signed_in(Role::User), RouteAccess::Role(Role::Admin)),
            GuardDecision::RedirectToHome
        );
        assert_eq!(
            evaluate(&signed_in(Role::Admin), RouteAccess::Role(Role::Admin)),
            GuardDecision::Render
        );
        assert_eq!(
            evaluate(&signed_in(Role::Admin), RouteAccess::Authenticated),
            GuardDecision::Render
        );
        assert_eq!(
            evaluate(&SessionState::SignedOut, RouteAccess::Role(Role::Admin)),
            GuardDecision::RedirectToLogin
        );
    }

    #[test]
    fn test_public_routes_always_render() {
        assert_eq!(
            evaluate(&SessionState::Loading, RouteAccess::Public),
            GuardDecision::Render
        );
        assert_eq!(
            evaluate(&SessionState::SignedOut, RouteAccess::Public),
            GuardDecision::Render
        );
        assert_eq!(
            evaluate(&signed_in(Role::User), RouteAccess::Public),
            GuardDecision::Render
        );
    }
}
