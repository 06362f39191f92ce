//! Application context: holds stacks and writes the cloud assembly.

use crate::core::error::Result;
use crate::core::synth;
use crate::core::types::{StackConfig, Template};
use crate::tripwire::hasher;
use indexmap::IndexMap;
use serde_json::json;
use std::path::{Path, PathBuf};

/// One stack written by [`App::synth`].
#[derive(Debug, Clone)]
pub struct SynthOutput {
    pub stack: String,
    pub template: Template,
    pub template_path: PathBuf,
    pub template_hash: String,
}

/// Top-level application: an ordered set of stack declarations.
#[derive(Debug, Default)]
pub struct App {
    stacks: IndexMap<String, StackConfig>,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a stack. A later stack with the same name replaces the earlier.
    pub fn add_stack(&mut self, config: StackConfig) {
        self.stacks.insert(config.stack.clone(), config);
    }

    /// Synthesize every stack without writing anything.
    pub fn synthesize(&self) -> Result<Vec<(String, Template)>> {
        self.stacks
            .values()
            .map(|c| Ok((c.stack.clone(), synth::synthesize(c)?)))
            .collect()
    }

    /// Synthesize every stack, then write `<stack>.template.json` and
    /// `manifest.json` under `outdir`. Nothing is written if any stack fails.
    pub fn synth(&self, outdir: &Path) -> Result<Vec<SynthOutput>> {
        let templates = self.synthesize()?;
        std::fs::create_dir_all(outdir)?;

        let mut outputs = Vec::with_capacity(templates.len());
        let mut artifacts = serde_json::Map::new();
        for (stack, template) in templates {
            let file_name = template_file_name(&stack);
            let path = outdir.join(&file_name);
            let body = render_template(&template)?;
            std::fs::write(&path, &body)?;
            tracing::info!(path = %path.display(), "wrote template");

            artifacts.insert(
                stack.clone(),
                json!({
                    "type": "aws:cloudformation:stack",
                    "environment": "aws://unknown-account/unknown-region",
                    "properties": { "templateFile": file_name },
                }),
            );
            outputs.push(SynthOutput {
                stack,
                template,
                template_path: path,
                template_hash: hasher::hash_string(&body),
            });
        }

        let manifest = json!({
            "version": format!("musabi-{}", env!("CARGO_PKG_VERSION")),
            "artifacts": artifacts,
        });
        std::fs::write(
            outdir.join("manifest.json"),
            serde_json::to_string_pretty(&manifest)?,
        )?;
        Ok(outputs)
    }
}

/// `<stack>.template.json`
pub fn template_file_name(stack: &str) -> String {
    format!("{}.template.json", stack)
}

/// Pretty-printed template body, newline-terminated.
pub fn render_template(template: &Template) -> Result<String> {
    let mut body = serde_json::to_string_pretty(template)?;
    body.push('\n');
    Ok(body)
}
