//! Turns one `TableAccessInfo` into the `ModificationContext` batches an LLM
//! code-generation stage consumes one at a time (§4.8): pick a file-grouping
//! strategy by framework/modification type, cap each group's context files
//! to the secondary token budget, then greedily token-split the modifiable
//! set via [`cost::create_batches`].

mod cost;
mod strategies;

pub use cost::{HeuristicTokenCounter, PromptCostModel, TokenCounter, CONTEXT_SCHEMA_VERSION};
pub use strategies::FileGroup;

use ca_common::model::{ClassInfo, ModificationContext, TableAccessInfo};
use ca_config::{Config, FrameworkType, ModificationType, SqlWrappingType};
use std::path::Path;

pub struct ContextBatcher<'a> {
    config: &'a Config,
    classes: &'a [ClassInfo],
    cost_model: PromptCostModel<'a>,
}

impl<'a> ContextBatcher<'a> {
    pub fn new(config: &'a Config, classes: &'a [ClassInfo], cost_model: PromptCostModel<'a>) -> Self {
        ContextBatcher { config, classes, cost_model }
    }

    /// Groups `info` per the configured framework/modification type, caps
    /// each group's context files, and token-splits the modifiable set into
    /// one or more `ModificationContext`s.
    pub fn generate(&self, info: &TableAccessInfo, read_file: impl Fn(&Path) -> Option<String>) -> Vec<ModificationContext> {
        let groups = self.select_groups(info);
        let banka = self.config.framework_type == FrameworkType::AnyframeBanka;

        let mut out = Vec::new();
        for group in groups {
            if group.files.is_empty() {
                continue;
            }
            let context_files = cost::cap_context_files(
                &group.context_files,
                self.config.context_file_token_budget,
                &self.cost_model,
                &read_file,
            );

            let label = if group.label.is_empty() { info.layer.clone() } else { group.label.clone() };

            let read_for_group = |path: &Path| -> Option<String> {
                let content = read_file(path)?;
                if !banka {
                    return Some(content);
                }
                match self.classes.iter().find(|c| c.file_path == path) {
                    Some(class) if strategies::is_biz_file(path) => {
                        Some(strategies::banka_biz_content(class, info, &content))
                    }
                    _ => Some(content),
                }
            };

            let batches = cost::create_batches(
                &group.files,
                &info.table_name,
                &info.columns,
                &label,
                &context_files,
                &self.cost_model,
                self.config.max_tokens_per_batch,
                read_for_group,
            );
            out.extend(batches);
        }
        out
    }

    fn select_groups(&self, info: &TableAccessInfo) -> Vec<FileGroup> {
        match self.config.modification_type {
            ModificationType::TypeHandler => strategies::type_handler(info, self.classes),
            ModificationType::ServiceImplOrBiz | ModificationType::ControllerOrService => {
                match (self.config.framework_type, self.config.sql_wrapping_type) {
                    (_, SqlWrappingType::MyBatisCcsBatch) => {
                        strategies::mybatis_ccs_batch(info, self.classes, |p| p.exists())
                    }
                    (FrameworkType::AnyframeJdbc | FrameworkType::AnyframeBanka, _) => {
                        strategies::jdbc_anyframe(info, self.classes)
                    }
                    (FrameworkType::SpringMvc, SqlWrappingType::MyBatis | SqlWrappingType::MyBatisCcs) => {
                        strategies::mybatis_spring_mvc(info, self.classes)
                    }
                    _ => strategies::per_layer(info),
                }
            }
        }
    }
}
