//! `{{ name }}` placeholder rendering for commands and settings

use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use thiserror::Error;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("placeholder regex is valid")
});

/// Error raised while rendering a template
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unresolved placeholder '{{{{ {name} }}}}' in \"{template}\"")]
    Unresolved { name: String, template: String },
}

/// Names of all placeholders used in a template, in order of appearance
pub fn placeholders(template: &str) -> Vec<String> {
    PLACEHOLDER
        .captures_iter(template)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Substitute every placeholder in `template` with its value from `variables`
pub fn render(template: &str, variables: &BTreeMap<String, String>) -> Result<String, TemplateError> {
    if let Some(missing) = placeholders(template)
        .into_iter()
        .find(|name| !variables.contains_key(name))
    {
        return Err(TemplateError::Unresolved {
            name: missing,
            template: template.to_string(),
        });
    }

    let rendered = PLACEHOLDER.replace_all(template, |caps: &Captures| {
        variables
            .get(&caps[1])
            .cloned()
            .unwrap_or_default()
    });

    Ok(rendered.into_owned())
}
