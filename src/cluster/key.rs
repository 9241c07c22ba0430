use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::ir::ResourceNode;

pub const OTHER_PROVIDER: &str = "other";
pub const UNKNOWN_KEY: &str = "unknown";

static PROVIDER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(aws|google|gcp|azurerm|azuread|azure|kubernetes|k8s|helm|github|cloudflare|datadog|oci|alicloud|digitalocean)(?:::|[_:./])",
    )
    .unwrap()
});

/// Caller-supplied grouping key. Returning `None` leaves the node ungrouped.
pub type CustomKeyFn = dyn Fn(&ResourceNode) -> Option<String> + Send + Sync;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum GroupBy {
    #[default]
    Type,
    Provider,
    Severity,
    Custom,
}

impl GroupBy {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "type" | "kind" => Some(Self::Type),
            "provider" => Some(Self::Provider),
            "severity" => Some(Self::Severity),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }
}

/// Provider prefix of a resource kind, e.g. `aws_s3_bucket` -> `aws`,
/// `google_compute_instance` -> `gcp`, `AWS::S3::Bucket` -> `aws`.
pub fn provider_of(kind: &str) -> &'static str {
    let Some(caps) = PROVIDER_RE.captures(kind) else {
        return OTHER_PROVIDER;
    };
    match caps[1].to_ascii_lowercase().as_str() {
        "aws" => "aws",
        "google" | "gcp" => "gcp",
        "azurerm" | "azuread" | "azure" => "azure",
        "kubernetes" | "k8s" => "k8s",
        "helm" => "helm",
        "github" => "github",
        "cloudflare" => "cloudflare",
        "datadog" => "datadog",
        "oci" => "oci",
        "alicloud" => "alicloud",
        "digitalocean" => "digitalocean",
        _ => OTHER_PROVIDER,
    }
}

pub fn group_key(
    node: &ResourceNode,
    group_by: GroupBy,
    custom: Option<&CustomKeyFn>,
) -> Option<String> {
    match group_by {
        GroupBy::Type => {
            let kind = node.kind.trim();
            Some(if kind.is_empty() { UNKNOWN_KEY } else { kind }.to_string())
        }
        GroupBy::Provider => Some(provider_of(&node.kind).to_string()),
        GroupBy::Severity => Some(
            node.severity
                .map(|severity| severity.as_str())
                .unwrap_or(UNKNOWN_KEY)
                .to_string(),
        ),
        GroupBy::Custom => custom.and_then(|key_fn| key_fn(node)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Severity;

    #[test]
    fn provider_prefixes() {
        assert_eq!(provider_of("aws_s3_bucket"), "aws");
        assert_eq!(provider_of("AWS::S3::Bucket"), "aws");
        assert_eq!(provider_of("google_compute_instance"), "gcp");
        assert_eq!(provider_of("azurerm_subnet"), "azure");
        assert_eq!(provider_of("kubernetes_deployment"), "k8s");
        assert_eq!(provider_of("k8s.io/Pod"), "k8s");
    }

    #[test]
    fn unknown_provider_falls_back_to_other() {
        assert_eq!(provider_of("Deployment"), OTHER_PROVIDER);
        assert_eq!(provider_of("awsome_thing"), OTHER_PROVIDER);
        assert_eq!(provider_of(""), OTHER_PROVIDER);
    }

    #[test]
    fn severity_key_defaults_to_unknown() {
        let plain = ResourceNode::new("a", "aws_iam_role");
        let hot = ResourceNode::new("b", "aws_iam_role").with_severity(Severity::Critical);
        assert_eq!(group_key(&plain, GroupBy::Severity, None).as_deref(), Some("unknown"));
        assert_eq!(group_key(&hot, GroupBy::Severity, None).as_deref(), Some("critical"));
    }

    #[test]
    fn custom_key_delegates() {
        let node = ResourceNode::new("a", "aws_iam_role").with_attribute("team", "core");
        let by_team = |node: &ResourceNode| {
            node.attributes
                .get("team")
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };
        assert_eq!(
            group_key(&node, GroupBy::Custom, Some(&by_team as &CustomKeyFn)).as_deref(),
            Some("core")
        );
        assert_eq!(group_key(&node, GroupBy::Custom, None), None);
    }
}
