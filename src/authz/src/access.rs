//! Request-level access policy
//!
//! An ordered rule list; the first rule whose matcher accepts the request
//! decides. A request no rule matches is denied.

use crate::decision::is_authorized;
use crate::error::Result;
use crate::hierarchy::RoleHierarchy;
use crate::matcher::{MultiMethodMatcher, PathPattern};
use chrono::{DateTime, Utc};
use http::Method;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;
use uuid::Uuid;

/// What a matched rule demands of the principal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    PermitAll,
    Authenticated,
    /// Principal role must equal or imply this role
    Role(String),
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PermitAll => write!(f, "permitAll"),
            Self::Authenticated => write!(f, "authenticated"),
            Self::Role(role) => write!(f, "hasRole({})", role),
        }
    }
}

/// Request selector of a rule
#[derive(Debug, Clone)]
pub enum RuleMatcher {
    AnyRequest,
    /// Path only, every method
    Path(PathPattern),
    Methods(MultiMethodMatcher),
}

impl RuleMatcher {
    pub fn matches(&self, path: &str, method: &Method) -> bool {
        match self {
            Self::AnyRequest => true,
            Self::Path(pattern) => pattern.matches(path),
            Self::Methods(matcher) => matcher.matches(path, method),
        }
    }
}

impl fmt::Display for RuleMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AnyRequest => write!(f, "anyRequest"),
            Self::Path(pattern) => write!(f, "{}", pattern),
            Self::Methods(matcher) => write!(f, "{}", matcher),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AccessRule {
    pub matcher: RuleMatcher,
    pub requirement: Requirement,
}

impl AccessRule {
    pub fn new(matcher: RuleMatcher, requirement: Requirement) -> Self {
        Self {
            matcher,
            requirement,
        }
    }
}

impl fmt::Display for AccessRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.matcher, self.requirement)
    }
}

/// Serializable rule source, as found in configuration
///
/// No pattern means any request. No methods means every method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDeclaration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<String>,

    pub requirement: Requirement,
}

impl RuleDeclaration {
    pub fn path(pattern: &str, requirement: Requirement) -> Self {
        Self {
            pattern: Some(pattern.to_string()),
            methods: Vec::new(),
            requirement,
        }
    }

    pub fn methods(pattern: &str, methods: &[&str], requirement: Requirement) -> Self {
        Self {
            pattern: Some(pattern.to_string()),
            methods: methods.iter().map(|m| m.to_string()).collect(),
            requirement,
        }
    }

    pub fn any_request(requirement: Requirement) -> Self {
        Self {
            pattern: None,
            methods: Vec::new(),
            requirement,
        }
    }

    pub fn into_rule(self) -> Result<AccessRule> {
        let matcher = match (self.pattern, self.methods.is_empty()) {
            (None, true) => RuleMatcher::AnyRequest,
            (None, false) => {
                RuleMatcher::Methods(MultiMethodMatcher::from_method_names("/**", &self.methods)?)
            }
            (Some(pattern), true) => RuleMatcher::Path(PathPattern::new(&pattern)?),
            (Some(pattern), false) => {
                RuleMatcher::Methods(MultiMethodMatcher::from_method_names(&pattern, &self.methods)?)
            }
        };
        Ok(AccessRule::new(matcher, self.requirement))
    }
}

/// Incoming request to authorize
#[derive(Debug, Clone)]
pub struct AccessRequest {
    pub path: String,
    pub method: Method,
    /// Role of the authenticated principal; `None` when anonymous
    pub principal_role: Option<String>,
}

impl AccessRequest {
    pub fn anonymous(method: Method, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method,
            principal_role: None,
        }
    }

    pub fn as_role(method: Method, path: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method,
            principal_role: Some(role.into()),
        }
    }
}

/// Access decision with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessDecision {
    /// Unique decision ID
    pub id: Uuid,

    pub allowed: bool,

    /// Rule that decided, if any matched
    pub rule: Option<String>,

    pub reason: String,

    pub timestamp: DateTime<Utc>,
}

impl AccessDecision {
    fn new(allowed: bool, rule: Option<String>, reason: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            allowed,
            rule,
            reason,
            timestamp: Utc::now(),
        }
    }
}

/// Ordered access rules
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    rules: Vec<AccessRule>,
}

impl AccessPolicy {
    pub fn new(rules: Vec<AccessRule>) -> Self {
        Self { rules }
    }

    pub fn from_declarations(declarations: impl IntoIterator<Item = RuleDeclaration>) -> Result<Self> {
        let rules = declarations
            .into_iter()
            .map(RuleDeclaration::into_rule)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(rules))
    }

    /// Rule table of the role/user/airport API
    pub fn default_declarations() -> Vec<RuleDeclaration> {
        const WRITE: &[&str] = &["POST", "PUT", "DELETE"];
        let role = |name: &str| Requirement::Role(name.to_string());

        vec![
            RuleDeclaration::path("/error", Requirement::PermitAll),
            RuleDeclaration::path("/api/auth/**", Requirement::PermitAll),
            RuleDeclaration::methods("/api/roles/**", WRITE, role("ADMIN")),
            RuleDeclaration::methods("/api/roles/**", &["GET"], role("EMPLOYEE")),
            RuleDeclaration::methods("/api/users/**", WRITE, role("ADMIN")),
            RuleDeclaration::methods("/api/users/**", &["GET"], role("EMPLOYEE")),
            RuleDeclaration::methods("/api/airports/**", WRITE, role("ADMIN")),
            RuleDeclaration::methods("/api/airports/**", &["GET"], role("GUEST")),
            RuleDeclaration::any_request(Requirement::Authenticated),
        ]
    }

    pub fn default_api_rules() -> Result<Self> {
        Self::from_declarations(Self::default_declarations())
    }

    pub fn rules(&self) -> &[AccessRule] {
        &self.rules
    }

    /// Decide a request; the first matching rule wins
    ///
    /// Errors only when a matched role rule names a role the hierarchy
    /// does not know.
    pub fn evaluate(&self, request: &AccessRequest, hierarchy: &RoleHierarchy) -> Result<AccessDecision> {
        let Some(rule) = self
            .rules
            .iter()
            .find(|rule| rule.matcher.matches(&request.path, &request.method))
        else {
            debug!("No access rule matches {} {}", request.method, request.path);
            return Ok(AccessDecision::new(false, None, "No rule matches request".to_string()));
        };

        let described = Some(rule.to_string());
        let principal = request.principal_role.as_deref();

        let (allowed, reason) = match (&rule.requirement, principal) {
            (Requirement::PermitAll, _) => (true, "Permitted to all".to_string()),
            (_, None) => (false, "Authentication required".to_string()),
            (Requirement::Authenticated, Some(_)) => (true, "Authenticated".to_string()),
            (Requirement::Role(required), Some(held)) => {
                if is_authorized(held, required, hierarchy)? {
                    (true, format!("Role '{}' satisfies '{}'", held, required))
                } else {
                    (false, format!("Role '{}' does not satisfy '{}'", held, required))
                }
            }
        };

        debug!(
            "{} {} -> {} ({})",
            request.method,
            request.path,
            if allowed { "allow" } else { "deny" },
            rule
        );
        Ok(AccessDecision::new(allowed, described, reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthzError;

    fn hierarchy() -> RoleHierarchy {
        RoleHierarchy::from_edges([
            ("ADMIN", "EMPLOYEE"),
            ("EMPLOYEE", "USER"),
            ("USER", "GUEST"),
        ])
    }

    fn allowed(policy: &AccessPolicy, request: AccessRequest) -> bool {
        policy.evaluate(&request, &hierarchy()).unwrap().allowed
    }

    #[test]
    fn test_default_rules_permit_all() {
        let policy = AccessPolicy::default_api_rules().unwrap();
        assert!(allowed(&policy, AccessRequest::anonymous(Method::GET, "/error")));
        assert!(allowed(&policy, AccessRequest::anonymous(Method::POST, "/api/auth/login")));
    }

    #[test]
    fn test_default_rules_role_writes() {
        let policy = AccessPolicy::default_api_rules().unwrap();

        assert!(allowed(&policy, AccessRequest::as_role(Method::PUT, "/api/roles/5", "ADMIN")));
        assert!(!allowed(&policy, AccessRequest::as_role(Method::PUT, "/api/roles/5", "EMPLOYEE")));
        assert!(!allowed(&policy, AccessRequest::anonymous(Method::DELETE, "/api/users/1")));
    }

    #[test]
    fn test_default_rules_reads_follow_hierarchy() {
        let policy = AccessPolicy::default_api_rules().unwrap();

        assert!(allowed(&policy, AccessRequest::as_role(Method::GET, "/api/roles", "ADMIN")));
        assert!(allowed(&policy, AccessRequest::as_role(Method::GET, "/api/users/3", "EMPLOYEE")));
        assert!(!allowed(&policy, AccessRequest::as_role(Method::GET, "/api/users/3", "USER")));
        assert!(allowed(&policy, AccessRequest::as_role(Method::GET, "/api/airports", "GUEST")));
        assert!(allowed(&policy, AccessRequest::as_role(Method::GET, "/api/airports", "USER")));
    }

    #[test]
    fn test_default_rules_fallback_authenticated() {
        let policy = AccessPolicy::default_api_rules().unwrap();

        let decision = policy
            .evaluate(&AccessRequest::as_role(Method::GET, "/api/flights", "GUEST"), &hierarchy())
            .unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.rule.as_deref(), Some("anyRequest -> authenticated"));

        assert!(!allowed(&policy, AccessRequest::anonymous(Method::GET, "/api/flights")));
    }

    #[test]
    fn test_no_match_denies() {
        let policy = AccessPolicy::from_declarations([RuleDeclaration::path("/public", Requirement::PermitAll)])
            .unwrap();
        let decision = policy
            .evaluate(&AccessRequest::anonymous(Method::GET, "/private"), &hierarchy())
            .unwrap();
        assert!(!decision.allowed);
        assert!(decision.rule.is_none());
    }

    #[test]
    fn test_unknown_required_role_is_error() {
        let policy = AccessPolicy::from_declarations([RuleDeclaration::path("/x", Requirement::Role("ROOT".into()))])
            .unwrap();
        let result = policy.evaluate(&AccessRequest::as_role(Method::GET, "/x", "ADMIN"), &hierarchy());
        assert!(matches!(result, Err(AuthzError::UnknownRole(_))));
    }

    #[test]
    fn test_declaration_json() {
        let json = r#"[
            {"pattern": "/api/roles/**", "methods": ["get"], "requirement": {"role": "EMPLOYEE"}},
            {"requirement": "authenticated"}
        ]"#;
        let declarations: Vec<RuleDeclaration> = serde_json::from_str(json).unwrap();
        let policy = AccessPolicy::from_declarations(declarations).unwrap();

        assert_eq!(policy.rules().len(), 2);
        assert_eq!(policy.rules()[0].to_string(), "GET /api/roles/** -> hasRole(EMPLOYEE)");
    }

    #[test]
    fn test_invalid_declaration() {
        let result = AccessPolicy::from_declarations([RuleDeclaration::methods(
            "/api/**/x",
            &["GET"],
            Requirement::PermitAll,
        )]);
        assert!(matches!(result, Err(AuthzError::InvalidPattern(_))));
    }
}
