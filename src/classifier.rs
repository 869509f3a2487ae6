//! Subject → curricular group classification.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupDef {
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub color: String,
    pub order: u32,
}

/// Group definitions as supplied by configuration.
///
/// `groups` is evaluated in declaration order; the first group with a matching
/// keyword wins, so the order is part of the configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectGroupConfig {
    pub catch_all: String,
    pub groups: Vec<GroupDef>,
    #[serde(default)]
    pub exact_matches: BTreeMap<String, String>,
}

fn group(name: &str, keywords: &[&str], color: &str, order: u32) -> GroupDef {
    GroupDef {
        name: name.to_string(),
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
        color: color.to_string(),
        order,
    }
}

impl Default for SubjectGroupConfig {
    fn default() -> Self {
        let groups = vec![
            group(
                "국어",
                &["국어", "문학", "독서", "화법", "작문", "언어와 매체", "고전"],
                "#E57373",
                1,
            ),
            group(
                "수학",
                &["수학", "미적분", "확률과 통계", "기하", "대수"],
                "#64B5F6",
                2,
            ),
            group("영어", &["영어", "영미", "English"], "#81C784", 3),
            group(
                "사회",
                &["사회", "역사", "지리", "윤리", "정치", "경제", "법과"],
                "#FFB74D",
                4,
            ),
            group(
                "과학",
                &["과학", "물리", "화학", "생명", "지구"],
                "#BA68C8",
                5,
            ),
            group("기타", &[], "#90A4AE", 6),
        ];

        let exact_matches = [
            ("한국사", "사회"),
            ("세계사", "사회"),
            ("동아시아사", "사회"),
            ("통합사회", "사회"),
            ("통합과학", "과학"),
            ("과학탐구실험", "과학"),
            ("영어 독해와 작문", "영어"),
            ("영어 작문", "영어"),
            ("영미 문학 읽기", "영어"),
            ("경제 수학", "수학"),
        ]
        .into_iter()
        .map(|(s, g)| (s.to_string(), g.to_string()))
        .collect();

        Self {
            catch_all: "기타".to_string(),
            groups,
            exact_matches,
        }
    }
}

impl SubjectGroupConfig {
    pub fn load_from_file(file_path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(file_path)?;
        let config: SubjectGroupConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file(&self, file_path: &str) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(file_path, content)?;
        Ok(())
    }

    /// Loads the configured groups, falling back to the built-in set when the
    /// file is missing or unreadable.
    pub fn load_or_default(file_path: Option<&str>) -> Self {
        let Some(path) = file_path else {
            return Self::default();
        };
        if !Path::new(path).exists() {
            warn!("subject group file {} not found, using built-in groups", path);
            return Self::default();
        }
        match Self::load_from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("failed to load subject groups from {}: {}, using built-in groups", path, e);
                Self::default()
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubjectClassifier {
    config: SubjectGroupConfig,
    catch_all_index: usize,
}

impl SubjectClassifier {
    pub fn new(mut config: SubjectGroupConfig) -> Self {
        if !config.groups.iter().any(|g| g.name == config.catch_all) {
            let next_order = config.groups.iter().map(|g| g.order).max().unwrap_or(0) + 1;
            warn!("catch-all group {} is not declared, adding it", config.catch_all);
            config.groups.push(GroupDef {
                name: config.catch_all.clone(),
                keywords: Vec::new(),
                color: "#90A4AE".to_string(),
                order: next_order,
            });
        }

        let known: Vec<String> = config.groups.iter().map(|g| g.name.clone()).collect();
        config.exact_matches.retain(|subject, group| {
            let ok = known.contains(group);
            if !ok {
                warn!("exact match {} → {} names an unknown group, ignoring", subject, group);
            }
            ok
        });

        let catch_all_index = config
            .groups
            .iter()
            .position(|g| g.name == config.catch_all)
            .unwrap_or(config.groups.len() - 1);

        Self {
            config,
            catch_all_index,
        }
    }

    /// Group name for a subject: exact match, then first keyword hit in group order, then catch-all.
    pub fn classify(&self, subject: &str) -> &str {
        if let Some(group) = self.config.exact_matches.get(subject) {
            return group;
        }

        self.config
            .groups
            .iter()
            .filter(|g| g.name != self.config.catch_all)
            .find(|g| g.keywords.iter().any(|k| subject.contains(k.as_str())))
            .map(|g| g.name.as_str())
            .unwrap_or(self.config.catch_all.as_str())
    }

    pub fn group_of(&self, subject: &str) -> &GroupDef {
        let name = self.classify(subject);
        self.group(name)
            .unwrap_or(&self.config.groups[self.catch_all_index])
    }

    pub fn group(&self, name: &str) -> Option<&GroupDef> {
        self.config.groups.iter().find(|g| g.name == name)
    }

    /// Groups sorted by their display order.
    pub fn groups(&self) -> Vec<&GroupDef> {
        let mut groups: Vec<&GroupDef> = self.config.groups.iter().collect();
        groups.sort_by_key(|g| g.order);
        groups
    }

    pub fn catch_all(&self) -> &str {
        &self.config.catch_all
    }
}

impl Default for SubjectClassifier {
    fn default() -> Self {
        Self::new(SubjectGroupConfig::default())
    }
}
