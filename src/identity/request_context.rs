use super::Role;

/// Identity attached to a request once the route guard has allowed it.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub request_id: String,
    pub role: Option<Role>,
    pub token: Option<String>,
    pub path: String,
}

impl RequestContext {
    pub fn is_authenticated(&self) -> bool { self.token.is_some() && self.role.is_some() }
}
