//! Token-bounded greedy batch splitter (§4.8 "Common splitter"), ported
//! field-for-field from `base_context_generator.py::create_batches`: a
//! synthetic empty-prompt cost charged once per batch, a flat separator cost
//! between files, never splitting a single file across batches.

use ca_common::model::{ColumnAccess, ModificationContext};
use std::path::{Path, PathBuf};

/// The schema version `ModificationContext::generated_at_schema` stamps —
/// bumped if this artifact's shape changes, independent of `ca_config`'s own
/// config-file schema version.
pub const CONTEXT_SCHEMA_VERSION: u32 = 1;

/// Measures the token cost of a piece of prompt text. There is no real LLM
/// tokenizer dependency in this pipeline (the core only ever needs relative
/// prompt sizing, per §6's "consumes `calculate_token_size` as an opaque
/// callable"); [`HeuristicTokenCounter`] is the concrete stand-in.
pub trait TokenCounter {
    fn count(&self, text: &str) -> usize;
}

/// Roughly 4 characters per token, the same ballpark every `tiktoken`-free
/// estimator in this space converges on. Errs high (ceiling division) so the
/// splitter is conservative rather than overpacking a batch.
pub struct HeuristicTokenCounter;

impl TokenCounter for HeuristicTokenCounter {
    fn count(&self, text: &str) -> usize {
        (text.chars().count() + 3) / 4
    }
}

pub struct PromptCostModel<'a> {
    counter: &'a dyn TokenCounter,
    empty_prompt_tokens: usize,
    separator_tokens: usize,
}

impl<'a> PromptCostModel<'a> {
    /// `empty_prompt` is the configured code-generator's template rendered
    /// with no file bodies — the per-batch fixed overhead every batch pays
    /// once.
    pub fn new(counter: &'a dyn TokenCounter, empty_prompt: &str) -> Self {
        PromptCostModel {
            counter,
            empty_prompt_tokens: counter.count(empty_prompt),
            separator_tokens: counter.count("\n\n"),
        }
    }

    pub fn empty_prompt_tokens(&self) -> usize {
        self.empty_prompt_tokens
    }

    /// The cost of one file's rendered snippet, `"=== File Path (Absolute):
    /// <path> ===\n<content>"`, not including the inter-file separator.
    pub fn snippet_tokens(&self, path: &Path, content: &str) -> usize {
        let formatted = format!("=== File Path (Absolute): {} ===\n{content}", path.display());
        self.counter.count(&formatted)
    }

    pub fn separator_tokens(&self) -> usize {
        self.separator_tokens
    }
}

/// Greedily packs `file_paths` into batches bounded by `max_tokens`, reading
/// each file's content via `read_file` (a file that can't be read is skipped
/// with a warning, matching the original's per-file try/except). Every
/// resulting batch carries the same `context_files` list untouched — the
/// grouping strategy decides what's context, this only decides how many
/// batches the modifiable set needs.
pub fn create_batches(
    file_paths: &[PathBuf],
    table_name: &str,
    columns: &[ColumnAccess],
    layer: &str,
    context_files: &[PathBuf],
    cost_model: &PromptCostModel,
    max_tokens_per_batch: usize,
    read_file: impl Fn(&Path) -> Option<String>,
) -> Vec<ModificationContext> {
    if file_paths.is_empty() {
        return Vec::new();
    }

    let mut batches = Vec::new();
    let mut current_paths: Vec<PathBuf> = Vec::new();
    let mut current_tokens = cost_model.empty_prompt_tokens();

    for file_path in file_paths {
        let Some(content) = read_file(file_path) else {
            tracing::warn!("file not found during batch creation: {}", file_path.display());
            continue;
        };

        let snippet_tokens = cost_model.snippet_tokens(file_path, &content);
        let tokens_to_add = if current_paths.is_empty() {
            snippet_tokens
        } else {
            snippet_tokens + cost_model.separator_tokens()
        };

        if !current_paths.is_empty() && current_tokens + tokens_to_add > max_tokens_per_batch {
            batches.push(finalize(&current_paths, table_name, columns, layer, context_files));
            current_paths = vec![file_path.clone()];
            current_tokens = cost_model.empty_prompt_tokens() + snippet_tokens;
        } else {
            current_paths.push(file_path.clone());
            current_tokens += tokens_to_add;
        }
    }

    if !current_paths.is_empty() {
        batches.push(finalize(&current_paths, table_name, columns, layer, context_files));
    }

    batches
}

fn finalize(
    file_paths: &[PathBuf],
    table_name: &str,
    columns: &[ColumnAccess],
    layer: &str,
    context_files: &[PathBuf],
) -> ModificationContext {
    ModificationContext {
        file_paths: file_paths.to_vec(),
        context_files: context_files.to_vec(),
        table_name: table_name.to_string(),
        columns: columns.to_vec(),
        file_count: file_paths.len(),
        layer: layer.to_string(),
        generated_at_schema: CONTEXT_SCHEMA_VERSION,
    }
}

/// Caps `context_files` to a secondary token budget (§4.8), dropping files
/// from the end (never splitting one) and logging each drop.
pub fn cap_context_files(
    context_files: &[PathBuf],
    budget_tokens: usize,
    cost_model: &PromptCostModel,
    read_file: impl Fn(&Path) -> Option<String>,
) -> Vec<PathBuf> {
    let mut kept = Vec::new();
    let mut spent = 0usize;
    for path in context_files {
        let Some(content) = read_file(path) else {
            continue;
        };
        let cost = cost_model.snippet_tokens(path, &content);
        if spent + cost > budget_tokens {
            tracing::warn!("dropping context file over secondary token budget: {}", path.display());
            continue;
        }
        spent += cost;
        kept.push(path.clone());
    }
    kept
}
