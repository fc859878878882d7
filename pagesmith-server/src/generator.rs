//! Content generator: brief (and prior page) in, complete HTML document out.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::GenerationError;

/// A single-shot text completion provider.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_text(&self, system: &str, prompt: &str) -> anyhow::Result<String>;
}

const SYSTEM_PROMPT: &str = r#"You are a front-end developer who builds single-page static websites.

Rules:
- Output ONLY the final HTML document. No explanations, no Markdown, no code fences.
- The very first characters of your reply must be <!DOCTYPE html>.
- Everything lives in one file: inline CSS and JavaScript, or CDN links if a library is needed.
- The page must work when served as static files from GitHub Pages.
- Implement every requirement in the brief and satisfy every listed check."#;

const DOCTYPE: &str = "<!doctype html";

pub struct ContentGenerator {
    backend: Arc<dyn TextGenerator>,
}

impl ContentGenerator {
    pub fn new(backend: Arc<dyn TextGenerator>) -> Self {
        Self { backend }
    }

    /// Produce a new document, or a revision of `prior` when given.
    pub async fn generate(
        &self,
        brief: &str,
        checks: &[serde_json::Value],
        prior: Option<&str>,
    ) -> Result<String, GenerationError> {
        let prompt = build_prompt(brief, checks, prior);
        let text = self
            .backend
            .generate_text(SYSTEM_PROMPT, &prompt)
            .await
            .map_err(GenerationError::Provider)?;
        validate_document(text)
    }
}

fn render_check(check: &serde_json::Value) -> String {
    match check {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn build_prompt(brief: &str, checks: &[serde_json::Value], prior: Option<&str>) -> String {
    let mut prompt = match prior {
        None => format!("Build a website for this brief:\n\n{brief}\n"),
        Some(current) => format!(
            "Here is the current index.html of the site:\n\n{current}\n\n\
             Revise it to apply this new brief, keeping everything that already works:\n\n{brief}\n\n\
             Return the complete revised document.\n"
        ),
    };
    if !checks.is_empty() {
        prompt.push_str("\nThe page will be evaluated against these checks:\n");
        for check in checks {
            prompt.push_str("- ");
            prompt.push_str(&render_check(check));
            prompt.push('\n');
        }
    }
    prompt
}

/// Accept only output that is a whole HTML document.
fn validate_document(text: String) -> Result<String, GenerationError> {
    let trimmed = text.trim_start_matches('\u{feff}').trim();
    if trimmed.is_empty() {
        return Err(GenerationError::Empty);
    }
    let head: String = trimmed.chars().take(DOCTYPE.len()).collect();
    if !head.eq_ignore_ascii_case(DOCTYPE) {
        return Err(GenerationError::NotADocument {
            preview: trimmed.chars().take(40).collect(),
        });
    }
    let mut doc = trimmed.to_string();
    doc.push('\n');
    Ok(doc)
}
