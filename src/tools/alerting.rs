/// Alert rule tools, backed by the Grafana alerting provisioning API.

use std::collections::BTreeMap;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::context::ToolContext;
use crate::core::error::RegistrationError;
use crate::core::output::Json;
use crate::core::registry::ToolRegistry;
use crate::core::schema::ToolArgs;
use crate::tools::ToolError;

const DEFAULT_RULES_LIMIT: usize = 100;

/// One Prometheus-style label matcher.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(default)]
pub struct LabelMatcher {
    /// The name of the label to match against
    pub name: String,
    /// The value to match against
    pub value: String,
    /// One of '=' or '!=' or '=~' or '!~'
    #[serde(rename = "type")]
    pub kind: String,
}

/// A set of matchers that must all hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(default)]
pub struct Selector {
    /// Label matchers, all of which must match
    pub filters: Vec<LabelMatcher>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ListAlertRulesParams {
    /// The maximum number of results to return. Default is 100
    pub limit: i64,
    /// The page number to return, starting at 1
    pub page: i64,
    /// Optionally, a list of label selectors to filter alert rules by; a rule must match all of them
    pub label_selectors: Vec<Selector>,
}

impl ToolArgs for ListAlertRulesParams {
    const REQUIRED: &'static [&'static str] = &[];
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct GetAlertRuleByUidParams {
    /// The uid of the alert rule
    pub uid: String,
}

impl ToolArgs for GetAlertRuleByUidParams {
    const REQUIRED: &'static [&'static str] = &["uid"];
}

/// Short form of a rule returned by `list_alert_rules`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertRuleSummary {
    pub uid: String,
    pub title: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl AlertRuleSummary {
    fn from_rule(rule: &Value) -> Self {
        let text = |field: &str| rule[field].as_str().unwrap_or_default().to_string();
        let labels = rule["labels"]
            .as_object()
            .map(|labels| {
                labels
                    .iter()
                    .filter_map(|(name, value)| Some((name.clone(), value.as_str()?.to_string())))
                    .collect()
            })
            .unwrap_or_default();
        Self {
            uid: text("uid"),
            title: text("title"),
            labels,
        }
    }
}

enum MatchKind {
    Equal,
    NotEqual,
    Regex(Regex),
    NotRegex(Regex),
}

/// A matcher checked and compiled once per call.
struct CompiledMatcher<'a> {
    name: &'a str,
    value: &'a str,
    kind: MatchKind,
}

impl<'a> CompiledMatcher<'a> {
    fn compile(matcher: &'a LabelMatcher) -> Result<Self, ToolError> {
        // Label regexes match the whole value.
        let anchored = || {
            Regex::new(&format!("^(?:{})$", matcher.value)).map_err(|e| {
                ToolError::invalid(
                    "label_selectors",
                    format!("invalid regex '{}': {e}", matcher.value),
                )
            })
        };
        let kind = match matcher.kind.as_str() {
            "=" => MatchKind::Equal,
            "!=" => MatchKind::NotEqual,
            "=~" => MatchKind::Regex(anchored()?),
            "!~" => MatchKind::NotRegex(anchored()?),
            other => {
                return Err(ToolError::invalid(
                    "label_selectors",
                    format!("unknown matcher type '{other}'"),
                ));
            }
        };
        Ok(Self {
            name: &matcher.name,
            value: &matcher.value,
            kind,
        })
    }

    /// A missing label matches as the empty string.
    fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let actual = labels.get(self.name).map(String::as_str).unwrap_or_default();
        match &self.kind {
            MatchKind::Equal => actual == self.value,
            MatchKind::NotEqual => actual != self.value,
            MatchKind::Regex(re) => re.is_match(actual),
            MatchKind::NotRegex(re) => !re.is_match(actual),
        }
    }
}

fn compile_selectors(selectors: &[Selector]) -> Result<Vec<CompiledMatcher<'_>>, ToolError> {
    selectors
        .iter()
        .flat_map(|selector| &selector.filters)
        .map(CompiledMatcher::compile)
        .collect()
}

fn page_bounds(limit: i64, page: i64) -> Result<(usize, usize), ToolError> {
    let limit = usize::try_from(limit)
        .map_err(|_| ToolError::invalid("limit", "must be greater than or equal to 0"))?;
    let page = usize::try_from(page)
        .map_err(|_| ToolError::invalid("page", "must be greater than or equal to 0"))?;
    let limit = if limit == 0 { DEFAULT_RULES_LIMIT } else { limit };
    let start = (page.max(1) - 1).saturating_mul(limit);
    Ok((start, limit))
}

pub async fn list_alert_rules(
    ctx: ToolContext,
    params: ListAlertRulesParams,
) -> Result<Json<Vec<AlertRuleSummary>>, ToolError> {
    let (start, limit) = page_bounds(params.limit, params.page)?;
    let matchers = compile_selectors(&params.label_selectors)?;

    let rules = ctx.grafana().list_alert_rules().await?;
    let total = rules.len();
    let summaries: Vec<_> = rules
        .iter()
        .map(AlertRuleSummary::from_rule)
        .filter(|rule| matchers.iter().all(|m| m.matches(&rule.labels)))
        .skip(start)
        .take(limit)
        .collect();
    tracing::debug!(total, returned = summaries.len(), "listed alert rules");
    Ok(Json(summaries))
}

pub async fn get_alert_rule_by_uid(
    ctx: ToolContext,
    params: GetAlertRuleByUidParams,
) -> Result<Value, ToolError> {
    if params.uid.is_empty() {
        return Err(ToolError::invalid("uid", "must not be empty"));
    }
    Ok(ctx.grafana().get_alert_rule_by_uid(&params.uid).await?)
}

pub fn register(registry: &mut ToolRegistry) -> Result<(), RegistrationError> {
    registry.add(
        "list_alert_rules",
        "Lists Grafana alert rules, returning a summary with the UID, title and labels of each. Filter by label selectors and page through the results with limit and page.",
        list_alert_rules,
    )?;
    registry.add(
        "get_alert_rule_by_uid",
        "Retrieves the full configuration of a single alert rule identified by its UID.",
        get_alert_rule_by_uid,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::GrafanaConfig;
    use crate::core::context::RequestContext;
    use crate::core::output::CallToolResult;
    use httpmock::prelude::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    const RULES: &str = "/api/v1/provisioning/alert-rules";

    fn context(server: &MockServer) -> ToolContext {
        let config = GrafanaConfig {
            url: server.base_url(),
            api_key: String::new(),
        };
        ToolContext::new(
            Arc::new(RequestContext::new(config, &reqwest::Client::new())),
            "alerting",
        )
    }

    fn matcher(name: &str, kind: &str, value: &str) -> LabelMatcher {
        LabelMatcher {
            name: name.to_string(),
            value: value.to_string(),
            kind: kind.to_string(),
        }
    }

    fn rules() -> Value {
        serde_json::json!([
            {"uid": "r1", "title": "High CPU", "labels": {"severity": "critical", "team": "infra"}},
            {"uid": "r2", "title": "Disk full", "labels": {"severity": "warning", "team": "infra"}},
            {"uid": "r3", "title": "Slow API", "labels": {"severity": "critical", "team": "api"}},
            {"uid": "r4", "title": "Heartbeat"}
        ])
    }

    fn uids(summaries: &[AlertRuleSummary]) -> Vec<&str> {
        summaries.iter().map(|rule| rule.uid.as_str()).collect()
    }

    #[test]
    fn matchers_follow_label_semantics() {
        let labels = BTreeMap::from([("severity".to_string(), "critical".to_string())]);
        let check = |m: LabelMatcher| {
            let compiled = CompiledMatcher::compile(&m).expect("valid matcher");
            compiled.matches(&labels)
        };

        assert!(check(matcher("severity", "=", "critical")));
        assert!(check(matcher("severity", "!=", "warning")));
        assert!(check(matcher("severity", "=~", "crit.*")));
        assert!(!check(matcher("severity", "=~", "crit")));
        assert!(check(matcher("severity", "!~", "warn|info")));
        assert!(check(matcher("team", "=", "")));
        assert!(!check(matcher("team", "=~", ".+")));
    }

    #[test]
    fn rejects_bad_matchers() {
        assert!(matches!(
            CompiledMatcher::compile(&matcher("a", "~", "b")),
            Err(ToolError::InvalidArgument { name: "label_selectors", .. })
        ));
        assert!(matches!(
            CompiledMatcher::compile(&matcher("a", "=~", "(")),
            Err(ToolError::InvalidArgument { name: "label_selectors", .. })
        ));
    }

    #[test]
    fn zero_limit_and_page_use_defaults() {
        assert_eq!(page_bounds(0, 0).unwrap(), (0, 100));
        assert_eq!(page_bounds(10, 3).unwrap(), (20, 10));
        assert!(matches!(
            page_bounds(-1, 1),
            Err(ToolError::InvalidArgument { name: "limit", .. })
        ));
        assert!(matches!(
            page_bounds(10, -2),
            Err(ToolError::InvalidArgument { name: "page", .. })
        ));
    }

    #[tokio::test]
    async fn filters_rules_by_every_selector() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path(RULES);
            then.status(200).json_body(rules());
        });

        let Json(summaries) = list_alert_rules(
            context(&server),
            ListAlertRulesParams {
                label_selectors: vec![
                    Selector {
                        filters: vec![matcher("severity", "=", "critical")],
                    },
                    Selector {
                        filters: vec![matcher("team", "!~", "api|web")],
                    },
                ],
                ..Default::default()
            },
        )
        .await
        .expect("rules listed");

        mock.assert();
        assert_eq!(
            summaries,
            [AlertRuleSummary {
                uid: "r1".to_string(),
                title: "High CPU".to_string(),
                labels: BTreeMap::from([
                    ("severity".to_string(), "critical".to_string()),
                    ("team".to_string(), "infra".to_string()),
                ]),
            }]
        );
    }

    #[tokio::test]
    async fn pages_through_rules() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(RULES);
            then.status(200).json_body(rules());
        });

        let page = |limit, page| {
            list_alert_rules(
                context(&server),
                ListAlertRulesParams {
                    limit,
                    page,
                    ..Default::default()
                },
            )
        };

        let Json(first) = page(3, 0).await.expect("first page");
        let Json(second) = page(3, 2).await.expect("second page");
        let Json(all) = page(0, 1).await.expect("default limit");

        assert_eq!(uids(&first), ["r1", "r2", "r3"]);
        assert_eq!(uids(&second), ["r4"]);
        assert_eq!(all.len(), 4);
    }

    #[tokio::test]
    async fn summary_omits_empty_labels() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(RULES);
            then.status(200).json_body(rules());
        });

        let mut registry = ToolRegistry::new();
        register(&mut registry).expect("alerting tools register");
        let arguments = serde_json::json!({
            "label_selectors": [{"filters": [{"name": "severity", "type": "=", "value": ""}]}]
        });
        let result = registry
            .call(
                Arc::clone(context(&server).request()),
                "list_alert_rules",
                arguments.as_object().cloned().unwrap(),
            )
            .await
            .expect("tool found")
            .expect("rules returned");

        assert_eq!(
            result,
            CallToolResult::text(r#"[{"uid":"r4","title":"Heartbeat"}]"#)
        );
    }

    #[tokio::test]
    async fn invalid_selector_fails_before_fetching() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path(RULES);
            then.status(200).json_body(rules());
        });

        let error = list_alert_rules(
            context(&server),
            ListAlertRulesParams {
                label_selectors: vec![Selector {
                    filters: vec![matcher("team", "=~", "[")],
                }],
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(error, ToolError::InvalidArgument { .. }));
        mock.assert_hits(0);
    }

    #[tokio::test]
    async fn fetches_single_rule() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path(format!("{RULES}/r2"));
            then.status(200).json_body(serde_json::json!({
                "uid": "r2",
                "title": "Disk full",
                "condition": "C"
            }));
        });

        let rule = get_alert_rule_by_uid(
            context(&server),
            GetAlertRuleByUidParams {
                uid: "r2".to_string(),
            },
        )
        .await
        .expect("rule found");

        mock.assert();
        assert_eq!(rule["condition"], "C");
        assert!(matches!(
            get_alert_rule_by_uid(context(&server), GetAlertRuleByUidParams::default()).await,
            Err(ToolError::InvalidArgument { name: "uid", .. })
        ));
    }
}
