//! Prompt templates: lookup by name or path, variable rendering and merging
//! with the `--input` text.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, anyhow, bail};
use handlebars::{Handlebars, handlebars_helper, no_escape};

const PROMPT_EXTENSIONS: [&str; 3] = ["txt", "md", "prompt"];
const INPUT_PLACEHOLDER: &str = "{{input}}";

handlebars_helper!(to_lower_case: |s: str| s.to_lowercase());
handlebars_helper!(to_upper_case: |s: str| s.to_uppercase());
handlebars_helper!(replace: |old: str, new: str, s: str| s.replace(old, new));
handlebars_helper!(trim: |s: str| s.trim());
handlebars_helper!(split: |s: str, sep: str| s.split(sep).map(str::to_string).collect::<Vec<_>>());
handlebars_helper!(join: |items: array, sep: str| items
    .iter()
    .map(|item| match item {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    })
    .collect::<Vec<_>>()
    .join(sep));
handlebars_helper!(contains: |s: str, sub: str| s.contains(sub));
handlebars_helper!(has_prefix: |s: str, prefix: str| s.starts_with(prefix));
handlebars_helper!(has_suffix: |s: str, suffix: str| s.ends_with(suffix));

pub struct PromptManager {
    dirs: Vec<PathBuf>,
    registry: Handlebars<'static>,
}

impl Default for PromptManager {
    fn default() -> Self {
        Self::with_dirs(default_prompt_dirs())
    }
}

/// `./prompts`, `~/.agent-invoke/prompts`, then the shared system directory.
pub fn default_prompt_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![PathBuf::from("prompts")];
    if let Some(home) = dirs::home_dir() {
        dirs.push(home.join(".agent-invoke").join("prompts"));
    }
    dirs.push(PathBuf::from("/usr/local/share/agent-invoke/prompts"));
    dirs
}

impl PromptManager {
    pub fn with_dirs(dirs: Vec<PathBuf>) -> Self {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(no_escape);
        registry.register_helper("toLowerCase", Box::new(to_lower_case));
        registry.register_helper("toUpperCase", Box::new(to_upper_case));
        registry.register_helper("replace", Box::new(replace));
        registry.register_helper("trim", Box::new(trim));
        registry.register_helper("split", Box::new(split));
        registry.register_helper("join", Box::new(join));
        registry.register_helper("contains", Box::new(contains));
        registry.register_helper("hasPrefix", Box::new(has_prefix));
        registry.register_helper("hasSuffix", Box::new(has_suffix));
        Self { dirs, registry }
    }

    /// Prompt names available across all directories. The first directory
    /// defining a name wins.
    pub fn available(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut names = Vec::new();
        for dir in &self.dirs {
            let Ok(entries) = std::fs::read_dir(dir) else {
                continue;
            };
            let mut files: Vec<PathBuf> = entries
                .filter_map(Result::ok)
                .filter(|entry| entry.file_type().is_ok_and(|t| !t.is_dir()))
                .map(|entry| entry.path())
                .collect();
            files.sort();
            for path in files {
                let supported = path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| PROMPT_EXTENSIONS.contains(&ext));
                if !supported {
                    continue;
                }
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str())
                    && seen.insert(stem.to_string())
                {
                    names.push(stem.to_string());
                }
            }
        }
        names
    }

    /// Reads a prompt from an explicit file, or by name from the prompt
    /// directories. A name without an extension is also tried with each
    /// supported extension.
    pub fn load(&self, name: Option<&str>, file: Option<&Path>) -> anyhow::Result<Option<String>> {
        if let Some(file) = file {
            let content = std::fs::read_to_string(file)
                .with_context(|| format!("failed to load prompt file {}", file.display()))?;
            return Ok(Some(content));
        }
        let Some(name) = name.filter(|n| !n.is_empty()) else {
            return Ok(None);
        };
        let candidates: Vec<String> = if name.contains('.') {
            vec![name.to_string()]
        } else {
            std::iter::once(name.to_string())
                .chain(PROMPT_EXTENSIONS.iter().map(|ext| format!("{name}.{ext}")))
                .collect()
        };
        for candidate in &candidates {
            for dir in &self.dirs {
                if let Ok(content) = std::fs::read_to_string(dir.join(candidate)) {
                    tracing::debug!(path = %dir.join(candidate).display(), "loaded prompt");
                    return Ok(Some(content));
                }
            }
        }
        Err(anyhow!(
            "prompt '{name}' not found in {:?}",
            self.dirs
        ))
        .with_context(|| format!("failed to find prompt '{name}'"))
    }

    /// Renders `key=value` variables into the template. Without variables the
    /// template is returned unchanged.
    pub fn render(&self, template: &str, vars: &[String]) -> anyhow::Result<String> {
        if vars.is_empty() {
            return Ok(template.to_string());
        }
        let mut data = serde_json::Map::new();
        for var in vars {
            let (key, value) = var
                .split_once('=')
                .ok_or_else(|| anyhow!("invalid variable format '{var}', expected 'key=value'"))?;
            data.insert(key.to_string(), coerce_value(value));
        }
        // Keep the input placeholder for the merge step unless it is a variable.
        data.entry("input")
            .or_insert_with(|| serde_json::Value::String(INPUT_PLACEHOLDER.to_string()));

        self.registry
            .render_template(template, &serde_json::Value::Object(data))
            .context("failed to apply template variables")
    }

    /// Loads, renders and merges the prompt with `input`. Returns `None` when
    /// no prompt was requested.
    pub fn resolve(
        &self,
        name: Option<&str>,
        file: Option<&Path>,
        vars: &[String],
        input: Option<&str>,
    ) -> anyhow::Result<Option<String>> {
        let Some(template) = self.load(name, file)? else {
            return Ok(None);
        };
        let rendered = self.render(&template, vars)?;
        if rendered.is_empty() {
            bail!("loaded prompt is empty");
        }
        Ok(Some(merge_input(rendered, input)))
    }
}

/// `true`/`false` become booleans and numeric strings numbers.
fn coerce_value(raw: &str) -> serde_json::Value {
    match raw.to_ascii_lowercase().as_str() {
        "true" => return serde_json::Value::Bool(true),
        "false" => return serde_json::Value::Bool(false),
        _ => {}
    }
    if let Ok(int) = raw.parse::<i64>() {
        return serde_json::Value::from(int);
    }
    raw.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(serde_json::Value::Number)
        .unwrap_or_else(|| serde_json::Value::String(raw.to_string()))
}

fn merge_input(prompt: String, input: Option<&str>) -> String {
    match input.filter(|i| !i.is_empty()) {
        Some(input) if prompt.contains(INPUT_PLACEHOLDER) => {
            prompt.replace(INPUT_PLACEHOLDER, input)
        }
        Some(input) => format!("{prompt}\n{input}"),
        None => prompt,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager_with(files: &[(&str, &str)]) -> (tempfile::TempDir, PromptManager) {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in files {
            std::fs::write(dir.path().join(name), content).unwrap();
        }
        let manager = PromptManager::with_dirs(vec![dir.path().to_path_buf()]);
        (dir, manager)
    }

    #[test]
    fn loads_by_name_with_extension_fallback() {
        let (_dir, manager) = manager_with(&[("review.md", "Review this")]);
        assert_eq!(
            manager.load(Some("review"), None).unwrap().as_deref(),
            Some("Review this")
        );
        assert_eq!(
            manager.load(Some("review.md"), None).unwrap().as_deref(),
            Some("Review this")
        );
        let err = manager.load(Some("missing"), None).unwrap_err();
        assert!(format!("{err:#}").starts_with("failed to find prompt 'missing'"));
    }

    #[test]
    fn no_prompt_requested_is_none() {
        let (_dir, manager) = manager_with(&[]);
        assert!(manager.resolve(None, None, &[], Some("hi")).unwrap().is_none());
    }

    #[test]
    fn renders_vars_without_html_escaping() {
        let (_dir, manager) = manager_with(&[]);
        let out = manager
            .render(
                "Translate to {{toUpperCase lang}}: {{text}}{{#if formal}} (formal){{/if}} x{{n}}",
                &[
                    "lang=fr".into(),
                    "text=<b>&</b>".into(),
                    "formal=TRUE".into(),
                    "n=3".into(),
                ],
            )
            .unwrap();
        assert_eq!(out, "Translate to FR: <b>&</b> (formal) x3");
    }

    #[test]
    fn string_helpers_follow_argument_order() {
        let (_dir, manager) = manager_with(&[]);
        let out = manager
            .render(
                "{{replace \"-\" \" \" s}}|{{#if (hasPrefix s \"a-\")}}yes{{/if}}|{{trim pad}}",
                &["s=a-b-c".into(), "pad=  x  ".into()],
            )
            .unwrap();
        assert_eq!(out, "a b c|yes|x");
    }

    #[test]
    fn split_and_join_compose() {
        let (_dir, manager) = manager_with(&[]);
        let out = manager
            .render(
                "{{join (split tags \";\") \" | \"}}|{{#each (split tags \";\")}}[{{this}}]{{/each}}",
                &["tags=rust;cli;agents".into()],
            )
            .unwrap();
        assert_eq!(out, "rust | cli | agents|[rust][cli][agents]");
    }

    #[test]
    fn var_without_equals_is_rejected() {
        let (_dir, manager) = manager_with(&[]);
        let err = manager.render("x", &["novalue".into()]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid variable format 'novalue', expected 'key=value'"
        );
    }

    #[test]
    fn input_replaces_placeholder_or_is_appended() {
        let (_dir, manager) = manager_with(&[
            ("wrap.txt", "Before {{input}} after {{tone}}"),
            ("plain.txt", "System prompt"),
        ]);
        let out = manager
            .resolve(Some("wrap"), None, &["tone=calm".into()], Some("question"))
            .unwrap();
        assert_eq!(out.as_deref(), Some("Before question after calm"));

        let out = manager
            .resolve(Some("plain"), None, &[], Some("question"))
            .unwrap();
        assert_eq!(out.as_deref(), Some("System prompt\nquestion"));
    }

    #[test]
    fn empty_prompt_is_an_error() {
        let (_dir, manager) = manager_with(&[("empty.txt", "")]);
        let err = manager.resolve(Some("empty"), None, &[], None).unwrap_err();
        assert_eq!(err.to_string(), "loaded prompt is empty");
    }

    #[test]
    fn lists_prompts_once_in_directory_order() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        std::fs::write(first.path().join("b.txt"), "").unwrap();
        std::fs::write(first.path().join("a.md"), "").unwrap();
        std::fs::write(first.path().join("notes.json"), "").unwrap();
        std::fs::write(second.path().join("a.prompt"), "").unwrap();
        std::fs::write(second.path().join("c.prompt"), "").unwrap();
        let manager = PromptManager::with_dirs(vec![
            first.path().to_path_buf(),
            first.path().join("missing"),
            second.path().to_path_buf(),
        ]);
        assert_eq!(manager.available(), ["a", "b", "c"]);
    }

    #[test]
    fn coerces_values() {
        assert_eq!(coerce_value("false"), serde_json::json!(false));
        assert_eq!(coerce_value("42"), serde_json::json!(42));
        assert_eq!(coerce_value("1.5"), serde_json::json!(1.5));
        assert_eq!(coerce_value("NaN"), serde_json::json!("NaN"));
        assert_eq!(coerce_value("hello"), serde_json::json!("hello"));
    }
}
