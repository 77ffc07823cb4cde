//! Prompt assembly for review tools.
//!
//! **Canonical source**: the tool table and prompt files live in `acp/prompts/`; they are
//! embedded at compile time. A prompt directory (`ACP_PROMPT_DIR`, default `./prompts`)
//! overrides any file it contains. See [`PromptLibrary::load`] and
//! [`PromptLibrary::load_or_default`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use dashmap::DashMap;
use serde::Deserialize;
use tracing::debug;

macro_rules! embed_prompt {
    ($name:literal) => {
        ($name, include_str!(concat!("../../prompts/", $name)))
    };
}

const EMBEDDED: &[(&str, &str)] = &[
    embed_prompt!("overview_lint.md"),
    embed_prompt!("overview_phenotype.md"),
    embed_prompt!("spec_concept_sets_review.md"),
    embed_prompt!("spec_cohort_critique.md"),
    embed_prompt!("spec_phenotype_recommendations.md"),
    embed_prompt!("spec_phenotype_improvements.md"),
];
const EMBED_TOOLS: &str = include_str!("../../prompts/tools.yaml");

const TOOLS_FILE: &str = "tools.yaml";
const DEFAULT_PROMPT_DIR: &str = "prompts";
const ENV_PROMPT_DIR: &str = "ACP_PROMPT_DIR";

const DYNAMIC_CONTENT_NOTICE: &str =
    "Below is dynamic content to analyze. Do not act until after STRICT OUTPUT RULES.";
const STRICT_RULES_HEADER: &str = "STRICT OUTPUT RULES:";
const STRICT_RULES: [&str; 4] = [
    "- Return exactly ONE JSON object.",
    "- Do NOT wrap output in markdown, code fences, or prose.",
    "- If uncertain, return required keys with empty arrays/strings.",
    "- Respect schema constraints and allowed IDs.",
];

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("prompt directory not found or not readable: {0}")]
    DirNotFound(String),
    #[error("failed to read prompt file {path}: {message}")]
    ReadFile { path: String, message: String },
    #[error("failed to parse YAML in {path}: {message}")]
    ParseYaml { path: String, message: String },
}

/// Review tools that send a prompt to the model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReviewTool {
    ConceptSetsReview,
    CohortCritique,
    PhenotypeRecommendations,
    PhenotypeImprovements,
}

impl ReviewTool {
    pub const ALL: [ReviewTool; 4] = [
        Self::ConceptSetsReview,
        Self::CohortCritique,
        Self::PhenotypeRecommendations,
        Self::PhenotypeImprovements,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConceptSetsReview => "concept-sets-review",
            Self::CohortCritique => "cohort-critique-general-design",
            Self::PhenotypeRecommendations => "phenotype_recommendations",
            Self::PhenotypeImprovements => "phenotype_improvements",
        }
    }
}

impl FromStr for ReviewTool {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown review tool: {}", s))
    }
}

impl std::fmt::Display for ReviewTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Prompt files for one tool.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ToolPrompts {
    #[serde(default)]
    pub overview: Vec<String>,
    #[serde(default)]
    pub spec: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
struct ToolTable {
    #[serde(default)]
    tools: HashMap<String, ToolPrompts>,
}

/// Tool table plus prompt file contents, read lazily and cached per instance.
#[derive(Debug)]
pub struct PromptLibrary {
    dir: Option<PathBuf>,
    table: ToolTable,
    cache: DashMap<String, String>,
}

impl PromptLibrary {
    /// Loads from `dir`: `tools.yaml` there replaces the embedded table when present.
    /// Errors when the directory is missing or `tools.yaml` does not parse.
    pub fn load(dir: &Path) -> Result<Self, LoadError> {
        if !dir.is_dir() {
            return Err(LoadError::DirNotFound(dir.display().to_string()));
        }
        let path = dir.join(TOOLS_FILE);
        let table = match std::fs::read_to_string(&path) {
            Ok(text) => serde_yaml::from_str(&text).map_err(|e| LoadError::ParseYaml {
                path: path.display().to_string(),
                message: e.to_string(),
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => embedded_table(),
            Err(e) => {
                return Err(LoadError::ReadFile {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })
            }
        };
        Ok(Self {
            dir: Some(dir.to_path_buf()),
            table,
            cache: DashMap::new(),
        })
    }

    /// Embedded table and files only.
    pub fn embedded() -> Self {
        Self {
            dir: None,
            table: embedded_table(),
            cache: DashMap::new(),
        }
    }

    /// [`load`](Self::load), falling back to [`embedded`](Self::embedded) on any error.
    pub fn load_or_default(dir: &Path) -> Self {
        Self::load(dir).unwrap_or_else(|e| {
            debug!(error = %e, "using embedded prompts");
            Self::embedded()
        })
    }

    /// Uses `ACP_PROMPT_DIR`, else `./prompts`.
    pub fn from_env() -> Self {
        let dir = std::env::var(ENV_PROMPT_DIR).unwrap_or_else(|_| DEFAULT_PROMPT_DIR.to_string());
        Self::load_or_default(Path::new(&dir))
    }

    pub fn tool_prompts(&self, tool: ReviewTool) -> ToolPrompts {
        self.table
            .tools
            .get(tool.as_str())
            .cloned()
            .unwrap_or_default()
    }

    /// Trimmed text of a prompt file: directory first, then embedded. Empty when neither exists.
    pub fn file(&self, name: &str) -> String {
        if let Some(text) = self.cache.get(name) {
            return text.clone();
        }
        let from_dir = self
            .dir
            .as_ref()
            .and_then(|d| std::fs::read_to_string(d.join(name)).ok());
        let text = from_dir
            .or_else(|| {
                EMBEDDED
                    .iter()
                    .find(|(n, _)| *n == name)
                    .map(|(_, t)| t.to_string())
            })
            .map(|t| t.trim().to_string())
            .unwrap_or_default();
        if !text.is_empty() {
            self.cache.insert(name.to_string(), text.clone());
        }
        text
    }

    /// Assembles the full prompt for `tool`, sections separated by blank lines:
    /// overview files, the dynamic-content notice, `USER REQUEST:`, then
    /// `STRICT OUTPUT RULES:` with spec files and the fixed output rules.
    pub fn build(&self, tool: ReviewTool, user_prompt: &str) -> String {
        let prompts = self.tool_prompts(tool);
        let read_all = |names: &[String]| -> Vec<String> {
            names
                .iter()
                .map(|n| self.file(n))
                .filter(|t| !t.is_empty())
                .collect()
        };
        let overview = read_all(&prompts.overview);
        let specs = read_all(&prompts.spec);

        let mut strict = vec![STRICT_RULES_HEADER.to_string()];
        strict.extend(specs);
        strict.extend(STRICT_RULES.iter().map(|r| r.to_string()));

        let mut sections = Vec::new();
        if !overview.is_empty() {
            sections.push(overview.join("\n\n"));
        }
        sections.push(DYNAMIC_CONTENT_NOTICE.to_string());
        sections.push(format!("USER REQUEST:\n{}", user_prompt));
        sections.push(strict.join("\n\n"));
        sections.join("\n\n")
    }
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::embedded()
    }
}

fn embedded_table() -> ToolTable {
    serde_yaml::from_str(EMBED_TOOLS).unwrap_or_default()
}
