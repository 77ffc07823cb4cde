//! # acp
//!
//! Assistant core for clinical-study artifacts (concept sets, cohort definitions). The model
//! proposes structured actions; this crate decides what is allowed, applies it, and reports
//! exactly what changed.
//!
//! ## Flow
//!
//! 1. Load an artifact from a local path or `http(s)://` URL ([`artifact::load_json`]).
//! 2. View its items in canonical form regardless of source casing ([`artifact::canonicalize`]).
//! 3. Validate proposed actions and apply the single supported mutation,
//!    `set_include_descendants` ([`actions::apply_actions`]).
//! 4. Optionally write the result: overwrite with backup, or a versioned sibling file
//!    ([`artifact::WriteController`]).
//!
//! [`ActionEngine::execute`] drives steps 1–4. Review tools ([`Assistant`]) run deterministic rules
//! and ask the model through [`ModelInvoker`], which tries an OpenAI-compatible HTTP endpoint and
//! then a local command, and degrades to rules-only output when neither answers.
//! Model-suggested cohort ids are filtered against the catalog by the Allow-list Guard
//! ([`catalog::filter_by_allowlist`]).
//!
//! ## Main modules
//!
//! - [`artifact`]: references, loading, canonical view, mutation primitive, write controller.
//! - [`actions`]: action parsing, [`ActionEngine`].
//! - [`llm`]: [`ModelBackend`] trait, [`HttpChatBackend`], [`CommandBackend`], [`MockBackend`], [`ModelInvoker`].
//! - [`catalog`]: cohort catalog CSV, [`AllowList`] and its filters.
//! - [`prompts`]: [`PromptLibrary`] (per-tool prompt files, embedded defaults).
//! - [`review`]: [`Assistant`] tools (concept-set review, cohort lint, phenotype tools, assist analyze).

pub mod actions;
pub mod artifact;
pub mod catalog;
pub mod error;
pub mod llm;
pub mod prompts;
pub mod review;

pub use actions::{
    apply_actions, parse_action, Action, ActionEngine, ApplyReport, ConceptSetEditRequest,
    ConceptSetEditResult, ExecutionCounts, ExecutionRequest, ExecutionResult, IgnoredAction,
};
pub use artifact::{
    canonicalize, load_json, ArtifactRef, CanonicalItem, ChangeRecord, Filter, WriteController,
    WriteOptions, WriteOutcome,
};
pub use catalog::{load_catalog, AllowList, CatalogEntry, Recommendation};
pub use error::AssistError;
pub use llm::{
    BackendError, CommandBackend, HttpChatBackend, MockBackend, ModelBackend, ModelConfig,
    ModelInvoker,
};
pub use prompts::{PromptLibrary, ReviewTool};
pub use review::{
    AnalyzeRequest, AnalyzeResponse, Assistant, CohortLintRequest, ConceptSetReviewRequest,
    PhenotypeImprovements, PhenotypeImprovementsRequest, PhenotypeRecommendations,
    PhenotypeRecommendationsRequest, ReviewLimits, ReviewMode, ReviewReport,
};
