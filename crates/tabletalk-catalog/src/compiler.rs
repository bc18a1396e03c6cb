// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent graph compilation: agents + sections + intents into one
//! traversable document.
//!
//! Sections arrive sorted by `ord`, intents by `(ord, intent_id)`. The first
//! intent recognized as an introduction is split out of `intents[]` into the
//! section's `introduction[]`. Intents without a local `context` inherit the
//! section's `about`.

use tabletalk_core::types::{
    AgentRow, CompiledAgent, CompiledSection, FieldSpec, Intent, IntentRow, SectionRow,
};

/// Intent ids ending in this slot number are introduction intents by
/// convention (e.g. 3201 for section 32).
const INTRO_ID_SLOT: i64 = 1;

/// Assemble the compiled document from pre-sorted source rows.
pub fn compile(
    agent: AgentRow,
    sections: Vec<(SectionRow, Vec<IntentRow>)>,
) -> CompiledAgent {
    let sections = sections
        .into_iter()
        .map(|(section, intents)| compile_section(section, intents))
        .collect();

    CompiledAgent {
        id: agent.id,
        name: agent.name,
        about: agent.about,
        mode: agent.mode,
        sections,
    }
}

fn compile_section(section: SectionRow, rows: Vec<IntentRow>) -> CompiledSection {
    let section_about = section.about.clone();
    let mut intents: Vec<Intent> = rows
        .into_iter()
        .map(|row| compile_intent(row, &section_about))
        .collect();

    let mut introduction = Vec::new();
    if let Some(idx) = intents.iter().position(is_introduction) {
        introduction.push(intents.remove(idx));
    }

    CompiledSection {
        id: section.id,
        name: section.name,
        about: section.about,
        guidelines: section.guidelines,
        introduction,
        intents,
    }
}

fn compile_intent(row: IntentRow, section_about: &str) -> Intent {
    let context = row.context.filter(|c| !c.trim().is_empty()).or_else(|| {
        if section_about.trim().is_empty() {
            None
        } else {
            Some(section_about.to_string())
        }
    });

    Intent {
        id: row.intent_id,
        intent: row.intent,
        is_mandatory: row.is_mandatory,
        retry_limit: row.retry_limit,
        fields_to_extract: normalize_fields(row.fields_to_extract.as_deref()),
        context,
    }
}

/// Introduction heuristic: prompt mentions "introduction" (case-insensitive)
/// or the numeric id sits in the section's intro slot.
fn is_introduction(intent: &Intent) -> bool {
    intent.intent.to_lowercase().contains("introduction")
        || intent.id % 100 == INTRO_ID_SLOT
}

/// Normalize the stored `fields_to_extract` into the canonical array shape.
///
/// Legacy rows carry either a JSON array (of field objects or bare name
/// strings) or a plain comma list. Empty input normalizes to `None`.
pub fn normalize_fields(raw: Option<&str>) -> Option<Vec<FieldSpec>> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }

    let specs: Vec<FieldSpec> = if raw.starts_with('[') {
        match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(serde_json::Value::Array(items)) => items
                .into_iter()
                .filter_map(|item| match item {
                    serde_json::Value::String(name) => {
                        let trimmed = name.trim();
                        (!trimmed.is_empty()).then(|| FieldSpec::named(trimmed))
                    }
                    obj @ serde_json::Value::Object(_) => {
                        serde_json::from_value::<FieldSpec>(obj).ok()
                    }
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    } else {
        raw.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(FieldSpec::named)
            .collect()
    };

    if specs.is_empty() { None } else { Some(specs) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(id: &str, about: &str) -> SectionRow {
        SectionRow {
            id: id.to_string(),
            agent_id: "A".into(),
            name: id.to_string(),
            about: about.to_string(),
            guidelines: None,
            ord: 0,
        }
    }

    fn intent_row(intent_id: i64, prompt: &str) -> IntentRow {
        IntentRow {
            section_id: "sec".into(),
            intent_id,
            intent: prompt.to_string(),
            is_mandatory: true,
            retry_limit: 2,
            fields_to_extract: None,
            context: None,
            ord: intent_id,
        }
    }

    #[test]
    fn introduction_split_by_prompt_text() {
        let rows = vec![
            intent_row(3202, "Warm Introduction for the meal chat"),
            intent_row(3203, "Ask what the user ate"),
        ];
        let compiled = compile_section(section("sec", ""), rows);
        assert_eq!(compiled.introduction.len(), 1);
        assert_eq!(compiled.introduction[0].id, 3202);
        assert_eq!(compiled.intents.len(), 1);
        assert_eq!(compiled.intents[0].id, 3203);
    }

    #[test]
    fn introduction_split_by_id_slot() {
        let rows = vec![
            intent_row(3201, "Greet the user by name"),
            intent_row(3202, "Ask what the user ate"),
        ];
        let compiled = compile_section(section("sec", ""), rows);
        assert_eq!(compiled.introduction.len(), 1);
        assert_eq!(compiled.introduction[0].id, 3201);
    }

    #[test]
    fn no_introduction_leaves_intents_untouched() {
        let rows = vec![
            intent_row(3202, "Ask what the user ate"),
            intent_row(3203, "Ask about portion size"),
        ];
        let compiled = compile_section(section("sec", ""), rows);
        assert!(compiled.introduction.is_empty());
        assert_eq!(compiled.intents.len(), 2);
    }

    #[test]
    fn section_about_becomes_intent_context_fallback() {
        let mut with_context = intent_row(3202, "Ask meal");
        with_context.context = Some("own context".into());
        let rows = vec![with_context, intent_row(3203, "Ask portions")];
        let compiled = compile_section(section("sec", "meal logging section"), rows);
        assert_eq!(compiled.intents[0].context.as_deref(), Some("own context"));
        assert_eq!(
            compiled.intents[1].context.as_deref(),
            Some("meal logging section")
        );
    }

    #[test]
    fn normalize_fields_accepts_json_objects() {
        let raw = r#"[{"name":"mealType","description":"one of the meal types"},{"name":"foodsLogged"}]"#;
        let specs = normalize_fields(Some(raw)).unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].name, "mealType");
        assert_eq!(specs[0].description.as_deref(), Some("one of the meal types"));
        assert_eq!(specs[1].name, "foodsLogged");
    }

    #[test]
    fn normalize_fields_accepts_json_string_array() {
        let specs = normalize_fields(Some(r#"["name", "age"]"#)).unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].name, "name");
        assert_eq!(specs[1].name, "age");
    }

    #[test]
    fn normalize_fields_accepts_comma_list() {
        let specs = normalize_fields(Some("mealType, foodsLogged , totalCalories")).unwrap();
        let names: Vec<_> = specs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["mealType", "foodsLogged", "totalCalories"]);
    }

    #[test]
    fn normalize_fields_empty_is_none() {
        assert!(normalize_fields(None).is_none());
        assert!(normalize_fields(Some("")).is_none());
        assert!(normalize_fields(Some("  ")).is_none());
        assert!(normalize_fields(Some("[]")).is_none());
    }
}
