//! ACL engine: request/response header and cookie directives.
//!
//! Rules are evaluated in declaration order. `Allow`/`Deny` only ever
//! contribute to the hit/allow/deny counts the director uses to decide
//! whether to let a request through (see [`crate::director`]); the
//! header/cookie mutation actions (`AddHeader`, `RemoveHeader`, ...) are
//! applied immediately to the header map passed in whenever their predicate
//! matches, independent of the allow/deny verdict.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::models::acl::{AclAction, AclRule};
use crate::resolver::{self, VariableContext};

/// Static tally of how an ACL list is configured, independent of whether any
/// individual request matches. Used by the director before evaluating
/// `process_request` for its own fast-path check ("no deny rules at all ->
/// skip evaluation").
pub fn count_actions(rules: &[AclRule]) -> (u32, u32) {
    let allow = rules.iter().filter(|r| r.is_allow()).count() as u32;
    let deny = rules.iter().filter(|r| r.is_deny()).count() as u32;
    (allow, deny)
}

/// Parses a raw `Cookie` header value into `(name, value)` pairs.
fn parse_cookies(header_value: &str) -> Vec<(&str, &str)> {
    header_value
        .split(';')
        .filter_map(|kv| {
            let kv = kv.trim();
            kv.split_once('=')
        })
        .collect()
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(reqwest::header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|raw| {
            parse_cookies(raw)
                .into_iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v)
        })
}

fn rule_matches(rule: &AclRule, headers: &HeaderMap, ctx: &VariableContext) -> bool {
    let header_ok = match (&rule.header_name, &rule.header_value) {
        (Some(name), Some(expected)) => {
            let expected = resolver::expand(expected, ctx);
            headers
                .get(name.as_str())
                .and_then(|v| v.to_str().ok())
                .map(|actual| actual == expected)
                .unwrap_or(false)
        }
        (Some(name), None) => headers.contains_key(name.as_str()),
        _ => true,
    };

    let cookie_ok = match (&rule.cookie_name, &rule.cookie_value) {
        (Some(name), Some(expected)) => {
            let expected = resolver::expand(expected, ctx);
            cookie_value(headers, name)
                .map(|actual| actual == expected)
                .unwrap_or(false)
        }
        (Some(name), None) => cookie_value(headers, name).is_some(),
        _ => true,
    };

    header_ok && cookie_ok
}

fn apply_action(action: &AclAction, headers: &mut HeaderMap, ctx: &VariableContext) {
    match action {
        AclAction::Allow | AclAction::Deny => {}
        AclAction::AddHeader { name, value } | AclAction::ReplaceHeader { name, value } => {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(&resolver::expand(value, ctx)),
            ) {
                headers.insert(name, value);
            }
        }
        AclAction::RemoveHeader { name } => {
            if let Ok(name) = HeaderName::from_bytes(name.as_bytes()) {
                headers.remove(name);
            }
        }
        AclAction::AddCookie { name, value } | AclAction::ReplaceCookie { name, value } => {
            if let Ok(v) = HeaderValue::from_str(&format!(
                "{}={}",
                name,
                resolver::expand(value, ctx)
            )) {
                headers.append(reqwest::header::SET_COOKIE, v);
            }
        }
        AclAction::RemoveCookie { name } => {
            if let Ok(v) = HeaderValue::from_str(&format!("{name}=; Max-Age=0")) {
                headers.append(reqwest::header::SET_COOKIE, v);
            }
        }
    }
}

/// Evaluates `rules` against `headers`, applying any matching mutation
/// actions in place. Returns the number of rules whose predicate matched
/// AND whose action is `Allow`/`Deny`, used by the director's allow/deny
/// decision -- a matching `AddHeader`/`RemoveCookie`/etc. rule still mutates
/// the header map but must never itself count toward the allow/deny tally.
pub fn process(rules: &[AclRule], headers: &mut HeaderMap, ctx: &VariableContext) -> u32 {
    let mut hits = 0;
    for rule in rules {
        if rule_matches(rule, headers, ctx) {
            if matches!(rule.action, AclAction::Allow | AclAction::Deny) {
                hits += 1;
            }
            apply_action(&rule.action, headers, ctx);
        }
    }
    hits
}

/// The director's allow/deny decision given static and per-request counts.
///
/// - both `allow` and `deny` rules configured and both fire: a contradictory
///   configuration, logged by the caller, but treated as allow (the deny
///   branch below only triggers when there are zero configured allow rules).
/// - an allow list exists and nothing matched it: deny.
/// - no allow list exists, a deny list exists, and something matched it:
///   deny.
/// - otherwise: allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    DenyNoAllowMatch,
    DenyMatchedDeny,
}

pub fn decide(allow_count: u32, deny_count: u32, hits: u32) -> Decision {
    if allow_count > 0 && hits == 0 {
        Decision::DenyNoAllowMatch
    } else if allow_count == 0 && deny_count > 0 && hits > 0 {
        Decision::DenyMatchedDeny
    } else {
        Decision::Allow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::topology::{HttpProto, ListenMode, Listener, ListenerStatistics};
    use actix_web::test::TestRequest;
    use std::net::{IpAddr, Ipv4Addr};

    fn ctx_fixture<'a>(listener: &'a Listener, req: &'a actix_web::HttpRequest) -> VariableContext<'a> {
        VariableContext {
            listener,
            node: None,
            request: req,
        }
    }

    fn listener_fixture() -> Listener {
        Listener {
            name: "l1".to_string(),
            bind_ip: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            port: 8080,
            mode: ListenMode::Http,
            http_proto: HttpProto::One,
            source_ip: None,
            default_error_page: None,
            default_maintenance_page: None,
            statistics: ListenerStatistics::default(),
            backends: ahash::HashMap::default(),
        }
    }

    #[test]
    fn deny_without_allow_denies_on_match() {
        let rules = vec![AclRule {
            header_name: Some("x-block".to_string()),
            header_value: Some("1".to_string()),
            cookie_name: None,
            cookie_value: None,
            action: AclAction::Deny,
        }];
        let (allow, deny) = count_actions(&rules);
        let listener = listener_fixture();
        let req = TestRequest::default()
            .insert_header(("x-block", "1"))
            .to_http_request();
        let ctx = ctx_fixture(&listener, &req);
        let mut headers = HeaderMap::new();
        headers.insert("x-block", HeaderValue::from_static("1"));
        let hits = process(&rules, &mut headers, &ctx);
        assert_eq!(decide(allow, deny, hits), Decision::DenyMatchedDeny);
    }

    #[test]
    fn allow_list_denies_when_nothing_matches() {
        let rules = vec![AclRule {
            header_name: Some("x-allow".to_string()),
            header_value: Some("yes".to_string()),
            cookie_name: None,
            cookie_value: None,
            action: AclAction::Allow,
        }];
        let (allow, deny) = count_actions(&rules);
        let listener = listener_fixture();
        let req = TestRequest::default().to_http_request();
        let ctx = ctx_fixture(&listener, &req);
        let mut headers = HeaderMap::new();
        let hits = process(&rules, &mut headers, &ctx);
        assert_eq!(decide(allow, deny, hits), Decision::DenyNoAllowMatch);
    }

    #[test]
    fn add_header_action_mutates_map_on_match() {
        let rules = vec![AclRule {
            header_name: Some("x-flag".to_string()),
            header_value: None,
            cookie_name: None,
            cookie_value: None,
            action: AclAction::AddHeader {
                name: "x-added".to_string(),
                value: "yes".to_string(),
            },
        }];
        let listener = listener_fixture();
        let req = TestRequest::default().to_http_request();
        let ctx = ctx_fixture(&listener, &req);
        let mut headers = HeaderMap::new();
        headers.insert("x-flag", HeaderValue::from_static("present"));
        process(&rules, &mut headers, &ctx);
        assert_eq!(headers.get("x-added").unwrap(), "yes");
    }
}
