//! Single-walk form loading and validation.

use crate::spec::NodeSpec;
use crate::tree::{Choice, FormNode, FormTree, Formula, NodeId, NodeKind, QuestionKind};
use rustc_hash::FxHashMap;
use tracing::debug;
use veilform_common::{SurveyError, SurveyResult};
use veilform_parse::parse_formula;

/// Name given to a survey root that declares none.
const DEFAULT_SURVEY_NAME: &str = "__survey__";

/// Consume a parsed form tree, enforce the structural rules, and produce the
/// immutable [`FormTree`].
///
/// Fails with `FormInvalid` when: a repeat has no explicit count; a repeat
/// contains another repeat; a question type is unsupported; any bind formula
/// fails to parse or references an unimplemented function; two elements share
/// a name.
pub fn load_form(spec: &NodeSpec) -> SurveyResult<FormTree> {
    let mut builder = TreeBuilder {
        nodes: Vec::new(),
        lookup: FxHashMap::default(),
    };
    let root = builder.add_node(spec, None, true, false)?;
    let tree = FormTree {
        nodes: builder.nodes,
        root,
        default_language: spec.default_language.clone(),
        lookup: builder.lookup,
    };
    debug!(elements = tree.len(), "form loaded");
    Ok(tree)
}

struct TreeBuilder {
    nodes: Vec<FormNode>,
    lookup: FxHashMap<String, NodeId>,
}

impl TreeBuilder {
    fn add_node(
        &mut self,
        spec: &NodeSpec,
        parent: Option<NodeId>,
        is_root: bool,
        inside_repeat: bool,
    ) -> SurveyResult<NodeId> {
        let kind = classify(spec, is_root)?;

        let name = if spec.name.is_empty() {
            if is_root {
                DEFAULT_SURVEY_NAME.to_owned()
            } else {
                return Err(SurveyError::form_invalid("element is missing a name"));
            }
        } else {
            spec.name.clone()
        };

        if kind == NodeKind::Repeat {
            if spec.control.count.is_none() {
                return Err(SurveyError::form_invalid(format!(
                    "infinite repeat not allowed: {name}"
                )));
            }
            if inside_repeat {
                return Err(SurveyError::form_invalid(format!(
                    "nested repeat not allowed: {name}"
                )));
            }
        }

        let node = FormNode {
            name: name.clone(),
            kind,
            label: spec.label.clone(),
            hint: spec.hint.clone(),
            relevant: parse_bind(&name, "relevant", spec.bind.relevant.as_deref())?,
            constraint: parse_bind(&name, "constraint", spec.bind.constraint.as_deref())?,
            constraint_message: spec.bind.constraint_message.clone(),
            required: spec.bind.required.as_deref() == Some("yes"),
            calculate: parse_bind(&name, "calculate", spec.bind.calculate.as_deref())?,
            repeat_count: parse_bind(&name, "count", spec.control.count.as_deref())?,
            choices: spec
                .choices
                .iter()
                .map(|c| Choice {
                    name: c.name.clone(),
                    label: c.label.clone(),
                })
                .collect(),
            parent,
            children: Vec::new(),
        };

        let id = self.nodes.len();
        if self.lookup.insert(name.clone(), id).is_some() {
            return Err(SurveyError::form_invalid(format!(
                "duplicate element name: {name}"
            )));
        }
        self.nodes.push(node);

        let child_inside_repeat = inside_repeat || kind == NodeKind::Repeat;
        for child_spec in &spec.children {
            let child = self.add_node(child_spec, Some(id), false, child_inside_repeat)?;
            self.nodes[id].children.push(child);
        }
        Ok(id)
    }
}

fn classify(spec: &NodeSpec, is_root: bool) -> SurveyResult<NodeKind> {
    if is_root {
        return Ok(NodeKind::Root);
    }
    match spec.node_type.as_str() {
        "group" => Ok(NodeKind::Group),
        "repeat" => Ok(NodeKind::Repeat),
        "calculate" => Ok(NodeKind::Calculate),
        "note" => Ok(NodeKind::Note),
        other => match QuestionKind::from_type(other) {
            Some(kind) => Ok(NodeKind::Question(kind)),
            None => Err(SurveyError::form_invalid(format!(
                "unsupported question type: {other}"
            ))),
        },
    }
}

fn parse_bind(
    element: &str,
    field: &str,
    source: Option<&str>,
) -> SurveyResult<Option<Formula>> {
    let Some(source) = source else {
        return Ok(None);
    };
    match parse_formula(source) {
        Ok(ast) => Ok(Some(Formula {
            source: source.to_owned(),
            ast,
        })),
        Err(e) => {
            if let Some(function) = e.unsupported_function {
                Err(SurveyError::form_invalid(format!(
                    "unsupported XLSForm function: {function}"
                )))
            } else {
                Err(SurveyError::form_invalid(format!(
                    "invalid {field} formula on {element}: {e}"
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(value: serde_json::Value) -> NodeSpec {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn loads_a_linear_form() {
        let tree = load_form(&spec(json!({
            "name": "holidays",
            "type": "survey",
            "children": [
                {"name": "intro.note", "type": "note", "label": "Welcome"},
                {"name": "name", "type": "text"},
                {"name": "age", "type": "integer",
                 "bind": {"constraint": ". >= 0 and . <= 120"}},
            ]
        })))
        .unwrap();

        assert_eq!(tree.len(), 4);
        let root = tree.node(tree.root());
        assert_eq!(root.kind, NodeKind::Root);
        assert_eq!(root.children.len(), 3);
        let age = tree.node(tree.lookup("age").unwrap());
        assert_eq!(age.kind, NodeKind::Question(QuestionKind::Integer));
        assert!(age.constraint.is_some());
    }

    #[test]
    fn rejects_unsupported_question_type() {
        let err = load_form(&spec(json!({
            "name": "s", "type": "survey",
            "children": [{"name": "loc", "type": "geopoint"}]
        })))
        .unwrap_err();
        assert_eq!(
            err,
            SurveyError::form_invalid("unsupported question type: geopoint")
        );
    }

    #[test]
    fn rejects_infinite_repeat() {
        let err = load_form(&spec(json!({
            "name": "s", "type": "survey",
            "children": [{
                "name": "holiday_loop", "type": "repeat",
                "children": [{"name": "spot", "type": "text"}]
            }]
        })))
        .unwrap_err();
        assert_eq!(
            err,
            SurveyError::form_invalid("infinite repeat not allowed: holiday_loop")
        );
    }

    #[test]
    fn rejects_nested_repeat() {
        let err = load_form(&spec(json!({
            "name": "s", "type": "survey",
            "children": [{
                "name": "person_loop", "type": "repeat",
                "control": {"jr:count": "${n}"},
                "children": [{
                    "name": "pet_loop", "type": "repeat",
                    "control": {"jr:count": "${m}"},
                    "children": [{"name": "pet", "type": "text"}]
                }]
            }]
        })))
        .unwrap_err();
        assert_eq!(
            err,
            SurveyError::form_invalid("nested repeat not allowed: pet_loop")
        );
    }

    #[test]
    fn rejects_unsupported_functions_in_binds() {
        let err = load_form(&spec(json!({
            "name": "s", "type": "survey",
            "children": [{
                "name": "q", "type": "integer",
                "bind": {"relevant": "between(12, 100)"}
            }]
        })))
        .unwrap_err();
        assert_eq!(
            err,
            SurveyError::form_invalid("unsupported XLSForm function: between")
        );
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = load_form(&spec(json!({
            "name": "s", "type": "survey",
            "children": [
                {"name": "q", "type": "text"},
                {"name": "q", "type": "text"},
            ]
        })))
        .unwrap_err();
        assert_eq!(err, SurveyError::form_invalid("duplicate element name: q"));
    }

    #[test]
    fn next_sibling_walk_climbs_groups_and_stops_at_root() {
        let tree = load_form(&spec(json!({
            "name": "s", "type": "survey",
            "children": [
                {"name": "g", "type": "group", "children": [
                    {"name": "a", "type": "text"},
                    {"name": "b", "type": "text"},
                ]},
                {"name": "c", "type": "text"},
            ]
        })))
        .unwrap();
        let a = tree.lookup("a").unwrap();
        let b = tree.lookup("b").unwrap();
        let c = tree.lookup("c").unwrap();
        assert_eq!(tree.next_sibling_or_up(a), b);
        assert_eq!(tree.next_sibling_or_up(b), c);
        assert_eq!(tree.next_sibling_or_up(c), tree.root());
        assert_eq!(tree.next_sibling_or_up(tree.root()), tree.root());
    }

    #[test]
    fn repeat_exhaustion_returns_the_repeat() {
        let tree = load_form(&spec(json!({
            "name": "s", "type": "survey",
            "children": [{
                "name": "kids", "type": "repeat",
                "control": {"jr:count": "${n_kids}"},
                "children": [{"name": "kid.name", "type": "text"}]
            }]
        })))
        .unwrap();
        let kid_name = tree.lookup("kid.name").unwrap();
        let kids = tree.lookup("kids").unwrap();
        assert_eq!(tree.next_sibling_or_up(kid_name), kids);
    }
}
