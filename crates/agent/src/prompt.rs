//! Prompt templates.
//!
//! Placeholders are written `{{name}}`. A template declares the variables the
//! caller must provide per render and may carry partial variables that are
//! fixed at construction (the tool names and descriptions).

use parallax_core::error::PromptError;
use parallax_core::tool::ToolRegistry;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::warn;

/// Variable the rendered step history is injected under.
pub const SCRATCHPAD_VAR: &str = "agent_scratchpad";
/// Variable the current date is injected under.
pub const TODAY_VAR: &str = "today";
/// Partial variable holding the comma-separated tool names.
pub const TOOL_NAMES_VAR: &str = "tool_names";
/// Partial variable holding one description line per tool.
pub const TOOL_DESCRIPTIONS_VAR: &str = "tool_descriptions";

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("placeholder pattern is valid")
});

pub const DEFAULT_PREFIX: &str = "Today is {{today}}.
Answer the following questions to the best of your ability. You can use the following tools:
{{tool_descriptions}}
";

pub const DEFAULT_FORMAT_INSTRUCTIONS: &str = r#"Respond with a single JSON object and nothing else: no prose, no markdown, no trailing characters.
Content requirements:
  - If several actions can be executed in parallel, put all of them in the "Actions" field.
  - If the next action depends on the result of another, put only one action in the "Actions" field.
  - Once you know the answer, put it in "FinalAnswer" and leave "Actions" empty.
Output example:
{
  "Question": "the input question you must answer",
  "Thought": "what needs to be done next and what can be executed concurrently",
  "FinalAnswer": "the final answer to the original input question, an empty string if not done yet",
  "Actions": [{
    "Action": "the action to take, one of [ {{tool_names}} ]",
    "ActionInput": "the input to the action"
  }, {
    "Action": "the action to take, one of [ {{tool_names}} ]",
    "ActionInput": "the input to the action"
  }]
}
"#;

pub const DEFAULT_SUFFIX: &str = "Begin!

Question: {{input}}
{{agent_scratchpad}}";

/// One section of a composed prompt and the variables it consumes.
#[derive(Debug, Clone)]
pub struct PromptSection {
    pub template: String,
    pub input_variables: Vec<String>,
}

impl PromptSection {
    pub fn new(template: impl Into<String>, input_variables: &[&str]) -> Self {
        Self {
            template: template.into(),
            input_variables: input_variables.iter().map(|v| v.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
    input_variables: Vec<String>,
    partial_variables: HashMap<String, String>,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>, input_variables: Vec<String>) -> Self {
        Self {
            template: template.into(),
            input_variables,
            partial_variables: HashMap::new(),
        }
    }

    /// Fix a variable's value for every render.
    pub fn with_partial(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.partial_variables.insert(name.into(), value.into());
        self
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Variables a caller must pass to [`render`](Self::render).
    pub fn input_variables(&self) -> &[String] {
        &self.input_variables
    }

    /// Every placeholder name the template references, in first-seen order.
    pub fn placeholders(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for caps in PLACEHOLDER.captures_iter(&self.template) {
            let name = caps[1].to_string();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Error unless the template references every name in `required`.
    pub fn check_placeholders(&self, required: &[&str]) -> Result<(), PromptError> {
        let present = self.placeholders();
        match required.iter().find(|r| !present.iter().any(|p| p == *r)) {
            Some(missing) => Err(PromptError::MissingPlaceholder(missing.to_string())),
            None => Ok(()),
        }
    }

    /// Substitute every placeholder. Caller values shadow partial variables.
    pub fn render(&self, values: &HashMap<String, String>) -> Result<String, PromptError> {
        let lookup = |name: &str| {
            values
                .get(name)
                .or_else(|| self.partial_variables.get(name))
        };

        if let Some(missing) = self.placeholders().into_iter().find(|n| lookup(n).is_none()) {
            return Err(PromptError::MissingVariable(missing));
        }

        Ok(PLACEHOLDER
            .replace_all(&self.template, |caps: &regex::Captures<'_>| {
                lookup(&caps[1]).cloned().unwrap_or_default()
            })
            .into_owned())
    }
}

/// The default concurrent-action prompt for `tools`.
pub fn concurrent_prompt(tools: &ToolRegistry) -> PromptTemplate {
    concurrent_prompt_with(
        tools,
        PromptSection::new(DEFAULT_PREFIX, &[TODAY_VAR]),
        PromptSection::new(DEFAULT_FORMAT_INSTRUCTIONS, &[]),
        PromptSection::new(DEFAULT_SUFFIX, &[SCRATCHPAD_VAR, "input"]),
    )
}

/// Compose a prompt from custom sections, joined by blank lines.
pub fn concurrent_prompt_with(
    tools: &ToolRegistry,
    prefix: PromptSection,
    instructions: PromptSection,
    suffix: PromptSection,
) -> PromptTemplate {
    let template = [
        prefix.template.as_str(),
        instructions.template.as_str(),
        suffix.template.as_str(),
    ]
    .join("\n\n");

    let input_variables = [
        prefix.input_variables,
        instructions.input_variables,
        suffix.input_variables,
    ]
    .concat();

    let prompt = PromptTemplate::new(template, input_variables)
        .with_partial(TOOL_NAMES_VAR, tools.names())
        .with_partial(TOOL_DESCRIPTIONS_VAR, tools.descriptions());

    if let Err(e) = prompt.check_placeholders(&[TOOL_NAMES_VAR, TOOL_DESCRIPTIONS_VAR]) {
        warn!("Custom prompt is incomplete: {e}");
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn renders_inputs_and_partials() {
        let prompt = PromptTemplate::new("Hi {{name}}, tools: {{ tool_names }}", vec!["name".into()])
            .with_partial(TOOL_NAMES_VAR, "Bocha, q-geo");
        let out = prompt.render(&vars(&[("name", "Ada")])).unwrap();
        assert_eq!(out, "Hi Ada, tools: Bocha, q-geo");
    }

    #[test]
    fn missing_variable_is_an_error() {
        let prompt = PromptTemplate::new("{{a}} {{b}}", vec!["a".into(), "b".into()]);
        let err = prompt.render(&vars(&[("a", "1")])).unwrap_err();
        assert_eq!(err, PromptError::MissingVariable("b".into()));
    }

    #[test]
    fn single_braces_are_left_alone() {
        let prompt = PromptTemplate::new(r#"{"Action": "{{x}}"}"#, vec!["x".into()]);
        assert_eq!(
            prompt.render(&vars(&[("x", "Bocha")])).unwrap(),
            r#"{"Action": "Bocha"}"#
        );
    }

    #[test]
    fn substituted_values_are_not_re_expanded() {
        let prompt = PromptTemplate::new("{{input}}", vec!["input".into()]);
        assert_eq!(
            prompt.render(&vars(&[("input", "{{today}}")])).unwrap(),
            "{{today}}"
        );
    }

    #[test]
    fn default_prompt_declares_its_variables() {
        let prompt = concurrent_prompt(&ToolRegistry::new());
        assert_eq!(
            prompt.input_variables(),
            &["today".to_string(), "agent_scratchpad".into(), "input".into()]
        );
        assert!(
            prompt
                .check_placeholders(&[TOOL_NAMES_VAR, TOOL_DESCRIPTIONS_VAR])
                .is_ok()
        );
    }

    #[test]
    fn default_prompt_renders_completely() {
        let prompt = concurrent_prompt(&ToolRegistry::new());
        let out = prompt
            .render(&vars(&[
                ("today", "January 02, 2026"),
                ("agent_scratchpad", ""),
                ("input", "Will it rain in Beijing?"),
            ]))
            .unwrap();
        assert!(out.starts_with("Today is January 02, 2026."));
        assert!(out.contains("Question: Will it rain in Beijing?"));
        assert!(!out.contains("{{"));
    }

    #[test]
    fn custom_sections_missing_tool_names_are_detected() {
        let prompt = concurrent_prompt_with(
            &ToolRegistry::new(),
            PromptSection::new("{{tool_descriptions}}", &[]),
            PromptSection::new("answer in JSON", &[]),
            PromptSection::new("{{input}}", &["input"]),
        );
        assert_eq!(
            prompt.check_placeholders(&[TOOL_NAMES_VAR]),
            Err(PromptError::MissingPlaceholder(TOOL_NAMES_VAR.into()))
        );
    }
}
