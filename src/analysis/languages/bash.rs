//! Shell script analyzer.
//!
//! Scripts orchestrate other programs, so this analyzer reports what they
//! touch: CLI tools, listeners, files and the environment they read. Shell
//! functions are not data models and no models are extracted.

use once_cell::sync::Lazy;

use super::{register, Language};
use crate::analysis::blocks::LineIndex;
use crate::analysis::context::{AnalyzerContext, SourceFile};
use crate::analysis::model::{
    ExtractedConfig, ExtractedEndpoint, ExtractedModel, ExtractedSideEffect, SideEffectCategory,
};
use crate::analysis::patterns::{
    capture, config_rules, scan_config, scan_side_effects, side_effect_rules, ConfigRule, Dedup,
    Pattern, SideEffectRule, MAX_FILES_PER_CATEGORY,
};
use crate::analysis::LanguageAnalyzer;

static LISTENERS: Lazy<Vec<(Pattern, &'static str)>> = Lazy::new(|| {
    vec![
        (Pattern::new(r"\b(?:nc|ncat|netcat)\s+(?:-[a-zA-Z]*l[a-zA-Z]*\s+)(?:-[a-zA-Z]+\s+)*(?:-p\s+)?(?P<port>\d+)"), "netcat"),
        (Pattern::new(r"\bsocat\s+(?:-\S+\s+)*TCP(?:4|6)?-LISTEN:(?P<port>\d+)"), "socat"),
        (Pattern::new(r"\bpython3?\s+-m\s+http\.server(?:\s+(?P<port>\d+))?"), "http_server"),
    ]
});

static SIDE_EFFECTS: Lazy<Vec<SideEffectRule>> = Lazy::new(|| {
    use SideEffectCategory::*;
    side_effect_rules(&[
        (r"\baws\s+(?:--\S+\s+)*(?P<target>s3|s3api)\s+(?P<op>[\w-]+)", CloudService, "aws", ""),
        (r"\baws\s+(?:--\S+\s+)*(?P<target>dynamodb)\s+(?P<op>[\w-]+)", Database, "aws", ""),
        (r"\baws\s+(?:--\S+\s+)*(?P<target>sqs)\s+(?P<op>[\w-]+)", Queue, "aws", ""),
        (r"\baws\s+(?:--\S+\s+)*(?P<target>sns)\s+(?P<op>[\w-]+)", Notification, "aws", ""),
        (
            r"\baws\s+(?:--\S+\s+)*(?P<target>lambda|ec2|ecs|eks|cloudformation|ssm|secretsmanager|route53|iam|logs)\s+(?P<op>[\w-]+)",
            CloudService,
            "aws",
            "",
        ),
        (r"\bgcloud\s+(?P<target>[\w-]+)\s+(?P<op>[\w-]+)", CloudService, "gcloud", ""),
        (r"\bgsutil\s+(?P<op>cp|rm|mv|rsync|ls)\b", CloudService, "gsutil", "gcs"),
        (r"\baz\s+(?P<target>storage|vm|functionapp|webapp|aks)\s+(?P<op>[\w-]+)", CloudService, "az", ""),
        (
            r"\bdocker(?:-compose|\s+compose)?\s+(?P<op>run|build|push|pull|exec|up|down|start|stop|rm)\b",
            ExternalApi,
            "docker",
            "docker",
        ),
        (r"\bkubectl\s+(?:-\S+\s+)*(?P<op>apply|delete|create|rollout|scale|exec|set|patch)\b", CloudService, "kubectl", "kubernetes"),
        (r"\bhelm\s+(?P<op>install|upgrade|uninstall|rollback|template)\b", CloudService, "helm", "helm"),
        (
            r#"\b(?P<op>curl|wget)\b(?:[^\n|;]*?(?P<target>https?://[^\s"'|;)]+))?"#,
            Http,
            "request",
            "",
        ),
        (r"\b(?P<op>psql|pg_dump|pg_restore|mysql|mysqldump|sqlite3|mongosh|mongo)\s", Database, "client", ""),
        (
            r"(?i)\bredis-cli\b(?:[^\n|;]*?\s(?P<op>GET|SET|DEL|FLUSHALL|FLUSHDB|KEYS|HSET|HGET|PUBLISH|INCR|EXPIRE)\b)?",
            Cache,
            "redis_cli",
            "redis",
        ),
        (r"(?m)(?:^|[|;&])\s*(?P<op>mail|mailx|sendmail)\s", Email, "mail", ""),
        (
            r"(?:>>?|\btee\s+(?:-a\s+)?)\s*(?P<target>/(?:var|etc|tmp|opt|srv|home|data|mnt|usr/local)/[^\s;|&)]+)",
            File,
            "write",
            "",
        ),
        (r"\b(?P<op>rsync|scp)\s", File, "copy", ""),
    ])
});

static CONFIG: Lazy<Vec<ConfigRule>> = Lazy::new(|| {
    config_rules(&[
        (r"\$\{(?P<key>[A-Za-z_]\w*):\?[^}]*\}", "env"),
        (r"\$\{(?P<key>[A-Za-z_]\w*):?[-=](?P<default>[^}]*)\}", "env"),
        (r"(?m)^\s*export\s+(?P<key>[A-Za-z_]\w*)=(?P<default>\S*)", "export"),
        // Literal values only; `X="${Y:-z}"` is already reported through `Y`.
        (
            r#"(?m)^(?:readonly\s+|declare\s+-r\s+)?(?P<key>[A-Z_][A-Z0-9_]*)=(?P<default>"[^"$]*"|'[^']*'|[^\s;"'$`][^\s;]*)(?:[ \t;]|$)"#,
            "constant",
        ),
    ])
});

/// Bash / POSIX shell analyzer.
pub struct BashAnalyzer {
    ctx: AnalyzerContext,
}

impl BashAnalyzer {
    pub fn new(ctx: AnalyzerContext) -> Self {
        Self { ctx }
    }

    fn files(&self) -> Vec<SourceFile> {
        self.ctx
            .source_files(self.file_extensions())
            .into_iter()
            .take(MAX_FILES_PER_CATEGORY)
            .collect()
    }
}

impl LanguageAnalyzer for BashAnalyzer {
    fn language_id(&self) -> &'static str {
        "bash"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["sh", "bash"]
    }

    fn context(&self) -> &AnalyzerContext {
        &self.ctx
    }

    fn extract_models(&self) -> anyhow::Result<Vec<ExtractedModel>> {
        Ok(Vec::new())
    }

    fn extract_endpoints(&self) -> anyhow::Result<Vec<ExtractedEndpoint>> {
        let mut endpoints = Vec::new();
        for file in self.files() {
            let index = LineIndex::new(&file.content);
            for (pattern, tool) in LISTENERS.iter() {
                for caps in pattern.captures_iter(&file.content) {
                    let Some(whole) = caps.get(0) else { continue };
                    let line = index.line_of(whole.start());
                    let port = capture(&caps, "port").unwrap_or_else(|| "8000".to_string());
                    let mut ep = ExtractedEndpoint::new("LISTEN", format!(":{}", port), &file.rel, line)
                        .with_decorator(tool);
                    ep.source_link = self.ctx.source_link(&file.rel, Some(line));
                    endpoints.push(ep);
                }
            }
        }
        endpoints.sort_by(|a, b| (&a.file, a.line).cmp(&(&b.file, b.line)));
        Ok(endpoints)
    }

    fn extract_side_effects(&self) -> anyhow::Result<Vec<ExtractedSideEffect>> {
        let mut effects = Vec::new();
        for file in self.files() {
            let mut dedup = Dedup::new();
            scan_side_effects(&self.ctx, &file, &SIDE_EFFECTS, &mut dedup, &mut effects);
        }
        Ok(effects)
    }

    fn extract_config(&self) -> anyhow::Result<Vec<ExtractedConfig>> {
        let mut config = Vec::new();
        for file in self.files() {
            let mut dedup = Dedup::new();
            scan_config(&self.ctx, &file, &CONFIG, &mut dedup, &mut config);
        }
        Ok(config)
    }
}

pub(super) fn install() {
    register(Language::Bash, |ctx| Box::new(BashAnalyzer::new(ctx)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const DEPLOY: &str = r#"#!/usr/bin/env bash
set -euo pipefail

BUCKET="${DEPLOY_BUCKET:?bucket required}"
REGION="${AWS_REGION:-us-east-1}"
export APP_ENV=production
RETRIES=3

deploy() {
    aws s3 cp ./dist "s3://$BUCKET/" --recursive
    aws sqs send-message --queue-url "$QUEUE" --message-body done
    docker push registry.example.com/app:latest
    kubectl apply -f k8s/
    curl -fsS https://hooks.example.com/deployed
    echo "deployed" >> /var/log/deploy.log
}

nc -lk 9000 &
"#;

    fn analyzer(content: &str) -> (TempDir, BashAnalyzer) {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("deploy.sh"), content).unwrap();
        let ctx = AnalyzerContext::new(temp.path());
        (temp, BashAnalyzer::new(ctx))
    }

    #[test]
    fn test_no_models() {
        let (_temp, analyzer) = analyzer(DEPLOY);
        assert!(analyzer.extract_models().unwrap().is_empty());
    }

    #[test]
    fn test_listener() {
        let (_temp, analyzer) = analyzer(DEPLOY);
        let endpoints = analyzer.extract_endpoints().unwrap();
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].method, "LISTEN");
        assert_eq!(endpoints[0].path, ":9000");
        assert_eq!(endpoints[0].decorators, vec!["netcat"]);
    }

    #[test]
    fn test_cli_side_effects() {
        let (_temp, analyzer) = analyzer(DEPLOY);
        let effects = analyzer.extract_side_effects().unwrap();
        let summary: Vec<_> = effects
            .iter()
            .map(|e| (e.category, e.operation.as_str(), e.target.as_deref()))
            .collect();
        assert!(summary.contains(&(SideEffectCategory::CloudService, "cp", Some("s3"))));
        assert!(summary.contains(&(SideEffectCategory::Queue, "send_message", Some("sqs"))));
        assert!(summary.contains(&(SideEffectCategory::ExternalApi, "push", Some("docker"))));
        assert!(summary.contains(&(SideEffectCategory::CloudService, "apply", Some("kubernetes"))));
        assert!(summary.contains(&(SideEffectCategory::Http, "curl", Some("https://hooks.example.com/deployed"))));
        assert!(summary.contains(&(SideEffectCategory::File, "write", Some("/var/log/deploy.log"))));
    }

    #[test]
    fn test_config_forms() {
        let (_temp, analyzer) = analyzer(DEPLOY);
        let config = analyzer.extract_config().unwrap();
        let found: Vec<_> = config
            .iter()
            .map(|c| (c.key.as_str(), c.source.as_str(), c.required, c.default.as_deref()))
            .collect();
        assert_eq!(
            found,
            vec![
                ("DEPLOY_BUCKET", "env", true, None),
                ("AWS_REGION", "env", false, Some("us-east-1")),
                ("APP_ENV", "export", false, Some("production")),
                ("RETRIES", "constant", false, Some("3")),
            ]
        );
    }
}
