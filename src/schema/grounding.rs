//! Schema grounding for the model prompt
//!
//! Picks resource kinds mentioned in operator text, looks up their live
//! schema fragments and renders them as a system turn. Failures follow the
//! configured `GroundingMode`.

use std::cmp::Reverse;
use std::collections::HashSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::resolver::{SchemaSource, find_resource_names, get_resource_schema};
use super::tree::SchemaDocument;
use crate::ai::prompt::PromptTemplates;
use crate::config::{GroundingMode, SchemaConfig};
use crate::constants::schema::{MAX_HINT_WORDS, MIN_HINT_LEN};
use crate::types::Result;

pub struct SchemaGrounding {
    source: Arc<dyn SchemaSource>,
    mode: GroundingMode,
    max_kinds: usize,
    max_fragment_chars: usize,
    /// Kinds already sent during this run
    grounded: HashSet<String>,
}

impl SchemaGrounding {
    pub fn new(source: Arc<dyn SchemaSource>, config: &SchemaConfig) -> Self {
        Self {
            source,
            mode: config.grounding,
            max_kinds: config.max_kinds,
            max_fragment_chars: config.max_fragment_chars,
            grounded: HashSet::new(),
        }
    }

    /// Render schema context for `text`, or `None` when there is nothing new to add
    ///
    /// Cancellation always propagates. Other grounding failures propagate only
    /// in `required` mode.
    pub async fn ground(&mut self, text: &str, cancel: &CancellationToken) -> Result<Option<String>> {
        if self.mode == GroundingMode::Off {
            return Ok(None);
        }

        match self.try_ground(text, cancel).await {
            Ok(context) => Ok(context),
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) if self.mode == GroundingMode::BestEffort => {
                warn!("Schema grounding skipped: {}", e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn try_ground(&mut self, text: &str, cancel: &CancellationToken) -> Result<Option<String>> {
        let hints = kind_hints(text);
        if hints.is_empty() {
            return Ok(None);
        }

        let doc = self.source.fetch_schema(cancel).await?;
        let kinds = select_kinds(&doc, &hints, &self.grounded, self.max_kinds)?;
        if kinds.is_empty() {
            debug!("No schema kinds matched hints {:?}", hints);
            return Ok(None);
        }

        let mut fragments = Vec::with_capacity(kinds.len());
        for kind in &kinds {
            let fragment = get_resource_schema(&doc, kind)?;
            fragments.push((kind.clone(), fragment.render(self.max_fragment_chars)));
        }

        debug!("Grounding with {:?}", kinds);
        self.grounded.extend(kinds);

        Ok(Some(PromptTemplates::schema_grounding(&fragments).build()))
    }
}

/// Lowercased candidates that could name a kind, longest phrases first
///
/// Runs of up to `MAX_HINT_WORDS` adjacent words are joined ("config map" ->
/// "configmap"), and simple plural forms are stripped from the end.
fn kind_hints(text: &str) -> Vec<String> {
    let words: Vec<String> = text
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_ascii_lowercase)
        .collect();

    let mut hints: Vec<String> = Vec::new();
    let mut push = |hint: String| {
        if hint.len() >= MIN_HINT_LEN && !hints.contains(&hint) {
            hints.push(hint);
        }
    };

    for width in (1..=MAX_HINT_WORDS).rev() {
        for run in words.windows(width) {
            // joined phrases only count when every word is a real word
            if width > 1 && run.iter().any(|w| w.len() < MIN_HINT_LEN) {
                continue;
            }
            let joined = run.concat();
            if let Some(stem) = singular(&joined) {
                push(stem);
            }
            push(joined);
        }
    }
    hints
}

fn singular(word: &str) -> Option<String> {
    if let Some(stem) = word.strip_suffix("ies") {
        Some(format!("{}y", stem))
    } else if let Some(stem) = word.strip_suffix("sses") {
        Some(format!("{}ss", stem))
    } else {
        word.strip_suffix('s')
            .filter(|s| !s.ends_with('s'))
            .map(str::to_string)
    }
}

/// Definition names whose last dotted segment equals a hint, one per hint
fn select_kinds(
    doc: &SchemaDocument,
    hints: &[String],
    already: &HashSet<String>,
    max_kinds: usize,
) -> Result<Vec<String>> {
    let mut selected: Vec<String> = Vec::new();

    for hint in hints {
        if selected.len() >= max_kinds {
            break;
        }

        let best = find_resource_names(doc, hint)?
            .into_iter()
            .filter(|name| short_kind(name).eq_ignore_ascii_case(hint))
            .min_by(|a, b| version_rank(a).cmp(&version_rank(b)).then_with(|| a.cmp(b)));

        if let Some(name) = best
            && !already.contains(&name)
            && !selected.contains(&name)
        {
            selected.push(name);
        }
    }
    Ok(selected)
}

fn short_kind(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

/// Stable before beta before alpha, then newer major version first
fn version_rank(name: &str) -> (u8, Reverse<u32>) {
    let version = name.rsplit('.').nth(1).unwrap_or("");
    let stability = if version.contains("alpha") {
        2
    } else if version.contains("beta") {
        1
    } else {
        0
    };
    let major = version
        .strip_prefix('v')
        .map(|rest| rest.chars().take_while(char::is_ascii_digit).collect::<String>())
        .and_then(|digits| digits.parse().ok())
        .unwrap_or(0);
    (stability, Reverse(major))
}
