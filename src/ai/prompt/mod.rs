//! Prompt construction for the manifest generator
//!
//! System instructions and schema grounding are both rendered through
//! `PromptBuilder`, so every system turn shares one layout.

use std::fmt;

/// One block of a system prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptSection {
    /// "You are an expert ..." opener
    Persona { expertise: String, task: String },
    /// Numbered goals
    Goals(Vec<String>),
    /// Free text, optionally under a `#` heading
    Text {
        heading: Option<String>,
        body: String,
    },
    /// Fenced block
    Fenced { language: String, body: String },
    /// Hard output rules
    Rules { headline: String, rules: Vec<String> },
}

impl fmt::Display for PromptSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptSection::Persona { expertise, task } => {
                write!(f, "You are an expert {} specializing in {}.", expertise, task)
            }
            PromptSection::Goals(goals) => {
                let lines: Vec<String> = goals
                    .iter()
                    .enumerate()
                    .map(|(i, goal)| format!("{}. {}", i + 1, goal))
                    .collect();
                f.write_str(&lines.join("\n"))
            }
            PromptSection::Text { heading, body } => match heading {
                Some(heading) if body.is_empty() => write!(f, "# {}", heading),
                Some(heading) => write!(f, "# {}\n\n{}", heading, body),
                None => f.write_str(body),
            },
            PromptSection::Fenced { language, body } => {
                write!(f, "```{}\n{}\n```", language, body)
            }
            PromptSection::Rules { headline, rules } => {
                write!(f, "IMPORTANT: {}", headline)?;
                for rule in rules {
                    write!(f, "\n- {}", rule)?;
                }
                Ok(())
            }
        }
    }
}

/// Ordered collection of sections, rendered blank-line separated
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    sections: Vec<PromptSection>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, section: PromptSection) -> Self {
        self.sections.push(section);
        self
    }

    pub fn persona(self, expertise: &str, task: &str) -> Self {
        self.push(PromptSection::Persona {
            expertise: expertise.to_string(),
            task: task.to_string(),
        })
    }

    pub fn goals(self, goals: &[&str]) -> Self {
        self.push(PromptSection::Goals(
            goals.iter().map(|g| g.to_string()).collect(),
        ))
    }

    pub fn text(self, body: &str) -> Self {
        self.push(PromptSection::Text {
            heading: None,
            body: body.to_string(),
        })
    }

    pub fn heading(self, heading: &str) -> Self {
        self.push(PromptSection::Text {
            heading: Some(heading.to_string()),
            body: String::new(),
        })
    }

    pub fn fenced(self, language: &str, body: &str) -> Self {
        self.push(PromptSection::Fenced {
            language: language.to_string(),
            body: body.to_string(),
        })
    }

    pub fn rules(self, headline: &str, rules: &[&str]) -> Self {
        self.push(PromptSection::Rules {
            headline: headline.to_string(),
            rules: rules.iter().map(|r| r.to_string()).collect(),
        })
    }

    pub fn build(self) -> String {
        self.sections
            .iter()
            .map(PromptSection::to_string)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Preset prompts
pub struct PromptTemplates;

impl PromptTemplates {
    /// System instructions seeding every transcript
    pub fn manifest_generator() -> PromptBuilder {
        PromptBuilder::new()
            .persona("Kubernetes engineer", "writing resource manifests")
            .goals(&[
                "Produce valid Kubernetes YAML manifests for the user's request",
                "Separate multiple resources with a line containing only ---",
                "When the user asks for changes, return the complete revised manifest",
            ])
            .rules(
                "Respond with YAML only",
                &[
                    "Do NOT add explanations or commentary",
                    "Do NOT wrap the output in Markdown code fences",
                    "Only use fields that exist in the resource schema",
                ],
            )
    }

    /// Context turn carrying live schema fragments, as `(kind, rendered json)` pairs
    pub fn schema_grounding(fragments: &[(String, String)]) -> PromptBuilder {
        fragments.iter().fold(
            PromptBuilder::new().text(
                "The target cluster serves the following resource schemas. \
                 Use them as the authority on field names and types.",
            ),
            |builder, (kind, rendered)| {
                builder
                    .heading(&format!("Schema: {}", kind))
                    .fenced("json", rendered)
            },
        )
    }
}
