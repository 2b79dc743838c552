//! Prompt templates for bridge operations.
//!
//! Templates use `{name}` placeholders filled by [`render_template`]. Literal
//! braces in a template (the reflection JSON example) are doubled.

use kore_core::types::{IdentitySnapshot, MemoryKind, MemoryRecord};

/// System context for `think`: identity plus relevant memories.
pub const CONTEXT_SYSTEM: &str = r"You are an AI assistant with persistent memory and evolving identity.

{identity}

Relevant memories:
{memories}

Use this context naturally. Don't explicitly mention your memories, just be informed by them.";

/// Instruction for `reflect`.
pub const REFLECT_SYSTEM: &str = r#"You are analyzing memories of an AI assistant to generate its identity profile.

Given the following memories, extract:
1. A concise summary of who this assistant is and what it focuses on (2-3 sentences max)
2. Key personality traits as keywords with confidence scores (0.0-1.0)
3. Relationships: who does this assistant interact with and how

Respond in this exact JSON format:
{{"summary": "...", "traits": {{"trait": score, ...}}, "relationships": {{"name": "description", ...}}}}

Be concise. Only include clear patterns, not speculation."#;

/// Identity line when nothing has been reflected yet.
pub const NO_IDENTITY: &str = "No established identity yet.";

/// Memory block when nothing relevant was found.
pub const NO_MEMORIES: &str = "No relevant memories.";

/// Reflection input when the store is empty.
pub const NO_MEMORIES_YET: &str = "No memories yet.";

/// Number of traits shown in the identity line.
pub const CONTEXT_TRAITS: usize = 5;

/// Render a template: collapse doubled braces, then replace `{key}` with
/// values. Substituted values are inserted verbatim.
#[must_use]
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let template = template.replace("{{", "{").replace("}}", "}");
    let mut out = String::with_capacity(template.len());
    let mut rest = template.as_str();
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let hit = vars
            .iter()
            .find(|(key, _)| after.strip_prefix(key).is_some_and(|tail| tail.starts_with('}')));
        match hit {
            Some((key, value)) => {
                out.push_str(value);
                rest = &after[key.len() + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Identity line for the context prompt.
#[must_use]
pub fn describe_identity(identity: Option<&IdentitySnapshot>) -> String {
    let Some(identity) = identity.filter(|i| !i.summary.is_empty()) else {
        return NO_IDENTITY.to_string();
    };
    let mut text = format!("Your identity: {}", identity.summary);
    let traits = identity.top_traits(CONTEXT_TRAITS);
    if !traits.is_empty() {
        text.push_str("\nKey traits: ");
        text.push_str(&traits.join(", "));
    }
    text
}

/// One memory as a prompt line.
#[must_use]
pub fn memory_line(record: &MemoryRecord) -> String {
    match record.kind {
        MemoryKind::Observation => format!("- {}", record.content),
        MemoryKind::Prompt { .. } => format!("- User: {}", record.content),
        MemoryKind::Response { .. } => format!("- Response: {}", record.content),
    }
}

/// Full system context for `think`. An extra system prompt, when given,
/// goes first.
#[must_use]
pub fn build_context(identity: Option<&IdentitySnapshot>, memories: &[MemoryRecord], extra_system: Option<&str>) -> String {
    let memory_text = if memories.is_empty() {
        NO_MEMORIES.to_string()
    } else {
        memories.iter().map(memory_line).collect::<Vec<_>>().join("\n")
    };
    let identity_text = describe_identity(identity);
    let context = render_template(
        CONTEXT_SYSTEM,
        &[("identity", &identity_text), ("memories", &memory_text)],
    );
    match extra_system.filter(|s| !s.is_empty()) {
        Some(extra) => format!("{extra}\n\n{context}"),
        None => context,
    }
}

/// Memories formatted as reflection input.
#[must_use]
pub fn reflection_input(memories: &[MemoryRecord]) -> String {
    if memories.is_empty() {
        return NO_MEMORIES_YET.to_string();
    }
    memories
        .iter()
        .map(|m| format!("- [{}] {}", m.kind.label(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}
