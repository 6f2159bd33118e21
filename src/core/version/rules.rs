// ─── Rule Engine ───
// Evaluates the allow/disallow rules attached to libraries and argument tokens.

use serde::{Deserialize, Serialize};

use crate::core::platform::Platform;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LibraryRule {
    pub action: RuleAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<OsRule>,
    /// Launcher feature flags (demo user, custom resolution, ...). None are enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Disallow,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct OsRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
    /// OS version regex. Not evaluated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl LibraryRule {
    pub fn allow() -> Self {
        Self {
            action: RuleAction::Allow,
            os: None,
            features: None,
        }
    }

    pub fn disallow() -> Self {
        Self {
            action: RuleAction::Disallow,
            os: None,
            features: None,
        }
    }

    pub fn for_os(mut self, name: &str) -> Self {
        self.os = Some(OsRule {
            name: Some(name.to_string()),
            ..OsRule::default()
        });
        self
    }

    /// A rule applies when its predicate is absent or matches the platform.
    fn applies_to(&self, platform: &Platform) -> bool {
        if self.features.as_ref().is_some_and(|f| !f.is_empty()) {
            return false;
        }

        let Some(os) = &self.os else {
            return true;
        };

        let name_matches = os
            .name
            .as_deref()
            .map_or(true, |name| platform.os.matches_name(name));
        let arch_matches = os
            .arch
            .as_deref()
            .map_or(true, |arch| platform.matches_arch(arch));

        name_matches && arch_matches
    }
}

/// Evaluate a rule list for `platform`.
///
/// Starts disallowed; every applicable rule overwrites the result, so the
/// last applicable rule in list order decides. A more specific rule earlier
/// in the list does not take precedence over a later general one.
pub fn evaluate(rules: &[LibraryRule], platform: &Platform) -> bool {
    let mut allowed = false;

    for rule in rules {
        if rule.applies_to(platform) {
            allowed = rule.action == RuleAction::Allow;
        }
    }

    allowed
}

/// Call-site convenience: a missing rule list always includes.
pub fn is_included(rules: Option<&[LibraryRule]>, platform: &Platform) -> bool {
    match rules {
        None => true,
        Some(rules) if rules.is_empty() => true,
        Some(rules) => evaluate(rules, platform),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::platform::OsFamily;

    fn linux() -> Platform {
        Platform::new(OsFamily::Linux, "x86_64")
    }

    #[test]
    fn no_rules_means_allowed() {
        assert!(is_included(None, &linux()));
        assert!(is_included(Some(&[]), &linux()));
    }

    #[test]
    fn allow_only_current_os() {
        let rules = [LibraryRule::allow().for_os("linux")];
        assert!(evaluate(&rules, &linux()));
        assert!(!evaluate(&rules, &Platform::new(OsFamily::Windows, "x86_64")));
    }

    #[test]
    fn disallow_current_os() {
        let rules = [LibraryRule::allow(), LibraryRule::disallow().for_os("linux")];
        assert!(!evaluate(&rules, &linux()));
        assert!(evaluate(&rules, &Platform::new(OsFamily::Osx, "aarch64")));
    }

    #[test]
    fn last_matching_rule_wins_over_earlier_specific_rule() {
        // A specific disallow followed by a general allow ends up allowed.
        let rules = [LibraryRule::disallow().for_os("linux"), LibraryRule::allow()];
        assert!(evaluate(&rules, &linux()));
    }

    #[test]
    fn non_matching_rules_leave_result_untouched() {
        let rules = [
            LibraryRule::allow(),
            LibraryRule::disallow().for_os("linux"),
            LibraryRule::allow().for_os("windows"),
        ];
        assert!(!evaluate(&rules, &linux()));
    }

    #[test]
    fn feature_gated_rules_never_apply() {
        let rule: LibraryRule = serde_json::from_value(serde_json::json!({
            "action": "allow",
            "features": { "is_demo_user": true }
        }))
        .unwrap();
        assert!(!evaluate(&[rule], &linux()));
    }

    #[test]
    fn arch_predicate_is_checked() {
        let rule: LibraryRule = serde_json::from_value(serde_json::json!({
            "action": "allow",
            "os": { "arch": "x86" }
        }))
        .unwrap();
        assert!(!evaluate(std::slice::from_ref(&rule), &linux()));
        assert!(evaluate(&[rule], &Platform::new(OsFamily::Windows, "x86")));
    }
}
