//! Access-control rule configuration evaluated by [`crate::acl_engine`].

use serde::{Deserialize, Serialize};

/// The effect a matching rule has on a request or response.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum AclAction {
    Allow,
    Deny,
    AddHeader { name: String, value: String },
    RemoveHeader { name: String },
    ReplaceHeader { name: String, value: String },
    AddCookie { name: String, value: String },
    RemoveCookie { name: String },
    ReplaceCookie { name: String, value: String },
}

/// One ACL directive: a match predicate plus the action to take when it
/// matches.
///
/// Match fields are optional; an unset field matches unconditionally. When
/// both a header and a cookie predicate are set, both must match. Values may
/// contain `###VAR###` tokens resolved by [`crate::resolver`] before the
/// comparison is made.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AclRule {
    #[serde(default)]
    pub header_name: Option<String>,
    #[serde(default)]
    pub header_value: Option<String>,
    #[serde(default)]
    pub cookie_name: Option<String>,
    #[serde(default)]
    pub cookie_value: Option<String>,
    pub action: AclAction,
}

impl AclRule {
    pub fn is_allow(&self) -> bool {
        matches!(self.action, AclAction::Allow)
    }

    pub fn is_deny(&self) -> bool {
        matches!(self.action, AclAction::Deny)
    }
}
