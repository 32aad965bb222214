//! Session Continuation Link Builder.

use loginflow_core::AuthContext;

use crate::step::Step;

/// Builds the next navigable URL. The query string is the only state that
/// survives between pages, so every non-empty context field is carried.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkBuilder {
    base_path: String,
}

impl LinkBuilder {
    /// `base_path` is the mount point of the login pages, e.g. `/ui/v2/login`.
    pub fn new(base_path: impl Into<String>) -> Self {
        let base_path = base_path.into();
        let trimmed = base_path.trim().trim_end_matches('/');
        let base_path = match trimmed {
            "" => String::new(),
            p if p.starts_with('/') => p.to_string(),
            p => format!("/{p}"),
        };
        Self { base_path }
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Path of a step page under the base path, without query.
    pub fn path(&self, step: Step) -> String {
        format!("{}{}", self.base_path, step.path())
    }

    /// `base_path + step path + ?query`; the `?` is omitted for an empty context.
    pub fn next_url(&self, step: Step, ctx: &AuthContext) -> String {
        let query = ctx.to_query();
        if query.is_empty() {
            self.path(step)
        } else {
            format!("{}?{query}", self.path(step))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loginflow_core::{OrganizationId, SessionId};
    use proptest::prelude::*;

    #[test]
    fn carries_every_non_empty_field() {
        let ctx = AuthContext::new()
            .with_login_name("admin@example.com")
            .with_session_id(Some(SessionId::new("s1").unwrap()))
            .with_organization(Some(OrganizationId::new("o1").unwrap()));

        let url = LinkBuilder::default().next_url(Step::ChooseMfa, &ctx);
        assert_eq!(url, "/mfa?loginName=admin%40example.com&sessionId=s1&organization=o1");
    }

    #[test]
    fn empty_context_has_no_query() {
        let links = LinkBuilder::new("ui/v2/login/");
        assert_eq!(links.next_url(Step::EnterLoginName, &AuthContext::new()), "/ui/v2/login/loginname");
    }

    #[test]
    fn link_decodes_back_to_context() {
        let ctx = AuthContext::new()
            .with_login_name("a b&c=d")
            .with_code("123456")
            .with_submit(true);
        let url = LinkBuilder::default().next_url(Step::VerifyEmail, &ctx);
        let (_, query) = url.split_once('?').unwrap();
        assert_eq!(AuthContext::from_query(query), ctx);
    }

    proptest! {
        #[test]
        fn next_url_is_idempotent(name in "[ -~]{0,32}", session in "[ -~]{1,16}", step_idx in 0usize..8) {
            let ctx = AuthContext::new()
                .with_login_name(name)
                .with_session_id(SessionId::new(session).ok());
            let links = LinkBuilder::new("/base");
            let step = Step::ALL[step_idx];
            prop_assert_eq!(links.next_url(step, &ctx), links.next_url(step, &ctx.clone()));
        }
    }
}
