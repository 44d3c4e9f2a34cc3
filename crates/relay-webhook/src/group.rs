//! Named webhook groups and their resolution.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::strategy::StrategyKind;
use crate::{Error, Result, StrategyRegistry, TargetConfig};

/// Group used when the caller names none.
pub const DEFAULT_GROUP_NAME: &str = "default";

fn default_group_name() -> String {
    DEFAULT_GROUP_NAME.to_owned()
}

/// Read-only mapping from group name to group definition.
///
/// Each group is a mapping with a `targets` list of target descriptors:
///
/// ```json
/// {
///   "default": { "targets": [{ "url": "https://example.com/webhook" }] },
///   "ops": { "targets": [{ "url": "https://discord.com/api/webhooks/1", "strategy": "discord" }] }
/// }
/// ```
///
/// Definitions are kept as raw JSON so that malformed groups and targets
/// surface as typed errors at dispatch time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRegistry {
    #[serde(default = "default_group_name")]
    default_group: String,
    #[serde(default)]
    groups: Map<String, Value>,
}

impl Default for GroupRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_GROUP_NAME)
    }
}

/// A successfully resolved group.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedGroup<'a> {
    name: String,
    targets: &'a [Value],
}

impl ResolvedGroup<'_> {
    /// Name the group was resolved under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw target descriptors in declared order; never empty.
    pub fn targets(&self) -> &[Value] {
        self.targets
    }

    /// Number of targets in the group.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Always `false`; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// A configuration defect found by [`GroupRegistry::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigIssue {
    /// Group the defect belongs to.
    pub group: String,
    /// Zero-based target index, when the defect is target-scoped.
    pub target: Option<usize>,
    /// Human-readable description.
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target {
            Some(index) => write!(f, "group '{}' target #{index}: {}", self.group, self.message),
            None => write!(f, "group '{}': {}", self.group, self.message),
        }
    }
}

impl GroupRegistry {
    /// Creates an empty registry with the given default group name.
    pub fn new(default_group: impl Into<String>) -> Self {
        Self {
            default_group: default_group.into(),
            groups: Map::new(),
        }
    }

    /// Creates a registry from raw group definitions.
    pub fn from_groups(default_group: impl Into<String>, groups: Map<String, Value>) -> Self {
        Self {
            default_group: default_group.into(),
            groups,
        }
    }

    /// Adds or replaces a raw group definition.
    pub fn with_group(mut self, name: impl Into<String>, definition: Value) -> Self {
        self.groups.insert(name.into(), definition);
        self
    }

    /// Adds or replaces a group built from typed target descriptors.
    pub fn with_targets(
        self,
        name: impl Into<String>,
        targets: impl IntoIterator<Item = TargetConfig>,
    ) -> Self {
        let targets = targets.into_iter().map(|t| t.to_value()).collect();
        let mut definition = Map::new();
        definition.insert("targets".into(), Value::Array(targets));
        self.with_group(name, Value::Object(definition))
    }

    /// Overrides the default group name.
    pub fn with_default_group(mut self, name: impl Into<String>) -> Self {
        self.default_group = name.into();
        self
    }

    /// Returns the default group name.
    pub fn default_group(&self) -> &str {
        &self.default_group
    }

    /// Iterates over the defined group names.
    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    /// Returns the number of defined groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Returns whether no group is defined.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Resolves a group name to its ordered target list.
    ///
    /// An absent or blank name selects the default group.
    ///
    /// # Errors
    ///
    /// - [`Error::GroupNotFound`] when the name is not defined.
    /// - [`Error::InvalidGroupShape`] when `targets` is missing or not a list.
    /// - [`Error::EmptyTargetList`] when `targets` is empty.
    pub fn resolve(&self, group_name: Option<&str>) -> Result<ResolvedGroup<'_>> {
        let name = match group_name {
            Some(name) if !name.trim().is_empty() => name,
            _ => self.default_group.as_str(),
        };

        let definition = self
            .groups
            .get(name)
            .ok_or_else(|| Error::group_not_found(name))?;

        let targets = definition
            .get("targets")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::invalid_group_shape(name))?;

        if targets.is_empty() {
            return Err(Error::empty_target_list(name));
        }

        Ok(ResolvedGroup {
            name: name.to_owned(),
            targets,
        })
    }

    /// Checks every group and target without sending anything.
    ///
    /// Intended for startup; dispatch still enforces the same rules per call.
    pub fn validate(
        &self,
        strategies: &StrategyRegistry,
        default_timeout: Duration,
    ) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if !self.groups.contains_key(&self.default_group) {
            issues.push(ConfigIssue {
                group: self.default_group.clone(),
                target: None,
                message: "default group is not defined".to_owned(),
            });
        }

        for name in self.groups.keys() {
            let group = match self.resolve(Some(name)) {
                Ok(group) => group,
                Err(error) => {
                    issues.push(ConfigIssue {
                        group: name.clone(),
                        target: None,
                        message: error.to_string(),
                    });
                    continue;
                }
            };

            for (index, raw) in group.targets().iter().enumerate() {
                if let Err(error) = validate_target(raw, strategies, default_timeout) {
                    issues.push(ConfigIssue {
                        group: name.clone(),
                        target: Some(index),
                        message: error.to_string(),
                    });
                }
            }
        }

        issues
    }
}

fn validate_target(
    raw: &Value,
    strategies: &StrategyRegistry,
    default_timeout: Duration,
) -> Result<()> {
    let target = TargetConfig::from_value(raw)?;
    strategies.resolve(target.strategy_id())?;

    target.resolve_url()?;
    target.resolve_timeout(default_timeout)?;

    // Only the generic strategy honours method and headers.
    if target.strategy_id().trim().eq_ignore_ascii_case(StrategyKind::Generic.as_ref()) {
        target.resolve_method()?;
        target.resolve_headers()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::ErrorKind;
    use crate::mock::MockTransport;

    fn registry() -> GroupRegistry {
        GroupRegistry::new("default")
            .with_targets("default", [TargetConfig::new("https://x.test/default")])
            .with_targets(
                "custom-group",
                [
                    TargetConfig::new("https://a.test/hook"),
                    TargetConfig::new("https://b.test/hook").with_method("PUT"),
                ],
            )
            .with_group("missing-targets", json!({}))
            .with_group("scalar-targets", json!({"targets": "https://a.test"}))
            .with_group("empty-targets", json!({"targets": []}))
            .with_group("not-a-mapping", json!("https://a.test"))
    }

    #[test]
    fn test_resolves_named_group_in_order() {
        let registry = registry();
        let group = registry.resolve(Some("custom-group")).unwrap();

        assert_eq!(group.name(), "custom-group");
        assert_eq!(group.len(), 2);
        assert_eq!(group.targets()[0]["url"], "https://a.test/hook");
        assert_eq!(group.targets()[1]["url"], "https://b.test/hook");
    }

    #[test]
    fn test_blank_names_use_default_group() {
        let registry = registry();

        for name in [None, Some(""), Some("   "), Some("\t\n")] {
            let group = registry.resolve(name).unwrap();
            assert_eq!(group.name(), "default", "name {name:?}");
            assert_eq!(group.targets()[0]["url"], "https://x.test/default");
        }
    }

    #[test]
    fn test_unknown_group() {
        let error = registry().resolve(Some("ghost")).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::GroupNotFound);
        assert!(error.to_string().contains("'ghost'"));
    }

    #[test]
    fn test_missing_default_group() {
        let registry = GroupRegistry::new("main");
        let error = registry.resolve(None).unwrap_err();
        assert!(matches!(error, Error::GroupNotFound { group } if group == "main"));
    }

    #[test]
    fn test_malformed_groups() {
        let registry = registry();

        for name in ["missing-targets", "scalar-targets", "not-a-mapping"] {
            let error = registry.resolve(Some(name)).unwrap_err();
            assert_eq!(error.kind(), ErrorKind::InvalidGroupShape, "group {name}");
        }

        let error = registry.resolve(Some("empty-targets")).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::EmptyTargetList);
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let registry: GroupRegistry = serde_json::from_value(json!({
            "groups": {"default": {"targets": [{"url": "https://x.test/hook"}]}}
        }))
        .unwrap();

        assert_eq!(registry.default_group(), DEFAULT_GROUP_NAME);
        assert_eq!(registry.len(), 1);
        assert!(registry.resolve(None).is_ok());
    }

    #[test]
    fn test_validate_reports_every_defect() {
        let strategies =
            StrategyRegistry::builtin(Arc::new(MockTransport::new()), Duration::from_secs(30));
        let registry = registry()
            .with_group(
                "bad-targets",
                json!({"targets": [
                    {"url": "https://ok.test/hook"},
                    {"url": "invalid-url"},
                    {"url": "https://ok.test/hook", "strategy": "slack"},
                    {"url": "https://ok.test/hook", "method": "NOPE", "strategy": "discord"},
                    {"url": "https://ok.test/hook", "timeout": 0},
                ]}),
            );

        let issues = registry.validate(&strategies, Duration::from_secs(30));
        let bad_targets: Vec<_> = issues
            .iter()
            .filter(|issue| issue.group == "bad-targets")
            .map(|issue| issue.target)
            .collect();

        assert_eq!(bad_targets, vec![Some(1), Some(2), Some(4)]);
        assert!(issues.iter().any(|i| i.group == "empty-targets" && i.target.is_none()));
        assert!(issues.iter().any(|i| i.group == "missing-targets"));
        assert!(!issues.iter().any(|i| i.group == "default"));
    }

    #[cfg(feature = "reqwest")]
    #[test]
    fn test_validate_flags_invalid_header_syntax() {
        let strategies =
            StrategyRegistry::builtin(Arc::new(MockTransport::new()), Duration::from_secs(30));
        let registry = GroupRegistry::new("default").with_group(
            "default",
            json!({"targets": [
                {"url": "https://ok.test/hook", "headers": {"X Bad": "1"}},
                {"url": "https://ok.test/hook", "headers": {"X-Ok": "1"}},
            ]}),
        );

        let issues = registry.validate(&strategies, Duration::from_secs(30));

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].target, Some(0));
        assert!(issues[0].message.contains("'X Bad'"));
    }

    #[test]
    fn test_config_issue_display() {
        let issue = ConfigIssue {
            group: "ops".into(),
            target: Some(2),
            message: "bad".into(),
        };
        assert_eq!(issue.to_string(), "group 'ops' target #2: bad");
    }
}
