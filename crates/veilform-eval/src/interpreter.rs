//! The survey interpreter: a state machine over the form tree.
//!
//! The cursor is the last entry of the session's visit history. Advancing
//! executes the current element when relevant (calculation storage, repeat
//! iteration bookkeeping), then walks pre-order until the cursor rests on a
//! relevant displayable element or the survey end. Retreating mirrors that:
//! pop a visit, revert repeat bookkeeping, continue to the previous relevant
//! displayable element or the survey start.

use crate::evaluator::Evaluator;
use crate::session::SurveySession;
use rustc_hash::FxHashSet;
use tracing::debug;
use veilform_common::{ResponseMap, ResponseValue, SurveyError, SurveyResult};
use veilform_form::{FormTree, NodeId, NodeKind, TextSpec};

/// Suffix of the auxiliary variable holding a repeat descendant's
/// per-iteration values.
pub const REPEAT_SUFFIX: &str = "::REPEATS";

/// The auxiliary variable name for a repeat descendant.
pub fn repeat_varname(element_name: &str) -> String {
    format!("{element_name}{REPEAT_SUFFIX}")
}

pub struct SurveyInterpreter<'a> {
    tree: &'a FormTree,
    session: &'a mut SurveySession,
}

impl<'a> SurveyInterpreter<'a> {
    pub fn new(tree: &'a FormTree, session: &'a mut SurveySession) -> Self {
        SurveyInterpreter { tree, session }
    }

    /* ───────────────────── cursor properties ───────────────────── */

    /// Name of the current element. A fresh session starts at the survey
    /// root.
    pub fn current_name(&mut self) -> String {
        if let Some(name) = self.session.latest_visit() {
            return name.to_owned();
        }
        let root_name = self.tree.node(self.tree.root()).name.clone();
        self.session.add_visit(root_name.clone());
        root_name
    }

    fn current_id(&mut self) -> SurveyResult<NodeId> {
        let name = self.current_name();
        self.tree.require(&name)
    }

    /// Cursor is at the root on first entry.
    pub fn survey_start(&mut self) -> bool {
        let name = self.current_name();
        let root_name = &self.tree.node(self.tree.root()).name;
        name == *root_name && self.session.count_visits(root_name) == 1
    }

    /// Cursor is back at the root after traversing the whole form.
    pub fn survey_end(&mut self) -> bool {
        let name = self.current_name();
        let root_name = &self.tree.node(self.tree.root()).name;
        name == *root_name && self.session.count_visits(root_name) > 1
    }

    /// The current element's type name (e.g. `"select one"`).
    pub fn element_type(&mut self) -> SurveyResult<&'static str> {
        Ok(self.tree.node(self.current_id()?).kind.type_name())
    }

    pub fn required(&mut self) -> SurveyResult<bool> {
        Ok(self.tree.node(self.current_id()?).required)
    }

    /// Whether the current element is of a kind shown to the respondent.
    pub fn to_show(&mut self) -> SurveyResult<bool> {
        Ok(self.tree.node(self.current_id()?).kind.is_displayable())
    }

    /// Whether the form's logic includes the current element right now.
    /// Distinct from [`Self::to_show`]: a displayable element whose
    /// `relevant` is false is neither shown nor executed.
    pub fn relevant(&mut self) -> SurveyResult<bool> {
        let id = self.current_id()?;
        let tree = self.tree;
        match &tree.node(id).relevant {
            None => Ok(true),
            Some(formula) => {
                let name = self.current_name();
                Evaluator::new(self.session, &name).eval_bool(&formula.ast)
            }
        }
    }

    pub fn label(&mut self) -> SurveyResult<String> {
        let id = self.current_id()?;
        let text = self.tree.node(id).label.clone();
        let name = self.tree.node(id).name.clone();
        self.resolve_text(text, &name)
    }

    pub fn hint(&mut self) -> SurveyResult<String> {
        let id = self.current_id()?;
        let text = self.tree.node(id).hint.clone();
        let name = self.tree.node(id).name.clone();
        self.resolve_text(text, &name)
    }

    pub fn constraint_message(&mut self) -> SurveyResult<String> {
        let id = self.current_id()?;
        let text = self.tree.node(id).constraint_message.clone();
        let name = self.tree.node(id).name.clone();
        self.resolve_text(text, &name)
    }

    /// Choice options of the current element, labels resolved, when it is a
    /// choice question.
    pub fn choices(&mut self) -> SurveyResult<Option<Vec<(String, String)>>> {
        let id = self.current_id()?;
        let node = self.tree.node(id);
        if !matches!(node.kind, NodeKind::Question(_)) || node.choices.is_empty() {
            return Ok(None);
        }
        let choices: Vec<(String, Option<TextSpec>)> = node
            .choices
            .iter()
            .map(|c| (c.name.clone(), c.label.clone()))
            .collect();
        let mut resolved = Vec::with_capacity(choices.len());
        for (name, label) in choices {
            let text = self.resolve_text(label, &name)?;
            resolved.push((name, text));
        }
        Ok(Some(resolved))
    }

    /* ───────────────────── language handling ───────────────────── */

    /// Languages the current element's label is available in.
    pub fn language_options(&mut self) -> SurveyResult<Vec<String>> {
        let id = self.current_id()?;
        Ok(self
            .tree
            .node(id)
            .label
            .as_ref()
            .map(TextSpec::languages)
            .unwrap_or_default())
    }

    /// The session language, defaulting on first use to the form's declared
    /// default (when offered here) or the first available option.
    pub fn current_language(&mut self) -> SurveyResult<String> {
        let mut language = self.session.language().to_owned();
        if language.is_empty() {
            let options = self.language_options()?;
            if !options.is_empty() {
                language = match self.tree.default_language() {
                    Some(default) if options.iter().any(|o| o == default) => default.to_owned(),
                    _ => options[0].clone(),
                };
                self.session.set_language(language.clone());
            }
        }
        Ok(language)
    }

    pub fn set_language(&mut self, language: &str) -> SurveyResult<()> {
        let options = self.language_options()?;
        if !options.iter().any(|o| o == language) {
            return Err(SurveyError::LanguageMissing {
                field: language.to_owned(),
            });
        }
        self.session.set_language(language);
        Ok(())
    }

    /* ───────────────────── values ───────────────────── */

    pub fn value(&self, element_name: &str) -> SurveyResult<ResponseValue> {
        self.session
            .retrieve_response(element_name)
            .ok_or_else(|| SurveyError::ValueMissing {
                name: element_name.to_owned(),
            })
    }

    pub fn current_value(&mut self) -> SurveyResult<ResponseValue> {
        let name = self.current_name();
        self.value(&name)
    }

    /// Store a value for the current element if it meets the constraint.
    /// Returns `false` (and keeps the prior value) when the constraint
    /// rejects it; the caller may then surface [`Self::constraint_message`].
    pub fn set_value(&mut self, new_value: ResponseValue) -> SurveyResult<bool> {
        let name = self.current_name();
        let prior = self.session.retrieve_response(&name);
        self.session.store_response(&name, Some(new_value));
        match self.constraint_met() {
            Ok(true) => Ok(true),
            Ok(false) => {
                self.session.store_response(&name, prior);
                Ok(false)
            }
            Err(e) => {
                self.session.store_response(&name, prior);
                Err(e)
            }
        }
    }

    fn constraint_met(&mut self) -> SurveyResult<bool> {
        let id = self.current_id()?;
        let tree = self.tree;
        match &tree.node(id).constraint {
            None => Ok(true),
            Some(formula) => {
                let name = self.current_name();
                Evaluator::new(self.session, &name).eval_bool(&formula.ast)
            }
        }
    }

    /* ───────────────────── navigation ───────────────────── */

    /// Move to the next relevant displayable element (or the survey end).
    pub fn advance(&mut self) -> SurveyResult<()> {
        loop {
            let relevant = self.relevant()?;
            if relevant {
                self.execute()?;
            }
            // A skipped element leaves no visit behind, so it can never leak
            // into the gathered response
            self.move_next(!relevant)?;
            if self.survey_end() {
                break;
            }
            if self.relevant()? && self.to_show()? {
                break;
            }
        }
        Ok(())
    }

    /// Move to the previous relevant displayable element (or the survey
    /// start). Forward visit history is dropped because changed answers may
    /// change the path ahead.
    pub fn retreat(&mut self) -> SurveyResult<()> {
        loop {
            if self.relevant()? {
                self.revert()?;
            }
            self.session.drop_latest_visit();
            if self.survey_start() {
                break;
            }
            if self.relevant()? && self.to_show()? {
                break;
            }
        }
        Ok(())
    }

    fn execute(&mut self) -> SurveyResult<()> {
        self.execute_calculate()?;
        self.execute_repeat()
    }

    /// Calculations take effect only in `calculate` elements so they never
    /// overwrite a respondent's own answer.
    fn execute_calculate(&mut self) -> SurveyResult<()> {
        let id = self.current_id()?;
        let tree = self.tree;
        let node = tree.node(id);
        if node.kind != NodeKind::Calculate {
            return Ok(());
        }
        let Some(formula) = &node.calculate else {
            return Ok(());
        };
        let name = self.current_name();
        let value = Evaluator::new(self.session, &name).evaluate(&formula.ast)?;
        self.set_value(value)?;
        Ok(())
    }

    /// Bind repeat descendants to the iteration the visit count says we are
    /// entering: snapshot incumbents into the previous iteration's slot of
    /// each auxiliary list, then load this iteration's stored values.
    fn execute_repeat(&mut self) -> SurveyResult<()> {
        let id = self.current_id()?;
        let tree = self.tree;
        if tree.node(id).kind != NodeKind::Repeat {
            return Ok(());
        }
        let repeat_name = tree.node(id).name.clone();
        let n = self.session.count_visits(&repeat_name);
        for child in self.shown_descendants(id) {
            let varname = tree.node(child).name.clone();
            let aux_name = repeat_varname(&varname);
            let incumbent = self
                .session
                .retrieve_response(&varname)
                .unwrap_or(ResponseValue::Empty);
            let mut aux = self.aux_list(&aux_name);
            if n >= 2 {
                let slot = n - 2;
                if slot < aux.len() {
                    aux[slot] = incumbent;
                } else {
                    aux.push(incumbent);
                }
            } else if let Some(last) = aux.last_mut() {
                // Re-entry at iteration 1: the incumbent was loaded from the
                // last slot on the way out, so this restores it in place
                *last = incumbent;
            } else {
                aux.push(incumbent);
            }
            let loaded = aux.get(n - 1).cloned().unwrap_or(ResponseValue::Empty);
            self.session
                .store_response(&aux_name, Some(ResponseValue::List(aux)));
            self.store_optional(&varname, loaded);
        }
        Ok(())
    }

    fn revert(&mut self) -> SurveyResult<()> {
        self.revert_repeat()
    }

    /// Roll repeat descendants back to the previous iteration's values.
    fn revert_repeat(&mut self) -> SurveyResult<()> {
        let id = self.current_id()?;
        let tree = self.tree;
        if tree.node(id).kind != NodeKind::Repeat {
            return Ok(());
        }
        let repeat_name = tree.node(id).name.clone();
        let n = self.session.count_visits(&repeat_name);
        for child in self.shown_descendants(id) {
            let varname = tree.node(child).name.clone();
            let aux = self.aux_list(&repeat_varname(&varname));
            let value = if n >= 2 {
                aux.get(n - 2).cloned()
            } else {
                aux.last().cloned()
            }
            .unwrap_or(ResponseValue::Empty);
            self.store_optional(&varname, value);
        }
        Ok(())
    }

    /// Drop auxiliary entries beyond the evaluated count. Needed when the
    /// respondent filled more iterations, then shrank the count by changing
    /// an earlier answer.
    fn truncate_repeat_responses(&mut self, id: NodeId, n: usize) {
        let tree = self.tree;
        for child in self.shown_descendants(id) {
            let varname = tree.node(child).name.clone();
            let aux_name = repeat_varname(&varname);
            let mut aux = self.aux_list(&aux_name);
            if aux.len() >= n && n >= 1 {
                aux.truncate(n - 1);
                self.session
                    .store_response(&aux_name, Some(ResponseValue::List(aux)));
            }
        }
    }

    fn move_next(&mut self, pop_current: bool) -> SurveyResult<()> {
        let id = self.current_id()?;
        let tree = self.tree;
        let node = tree.node(id);
        let next = if node.kind.is_section() && self.relevant()? {
            if node.kind == NodeKind::Repeat {
                let repeat_name = node.name.clone();
                let n = self.session.count_visits(&repeat_name);
                let limit = match &node.repeat_count {
                    Some(formula) => {
                        Evaluator::new(self.session, &repeat_name).eval_count(&formula.ast)?
                    }
                    // Validation guarantees a count on every repeat
                    None => 0,
                };
                if (n as i64) <= limit {
                    self.first_child_or_next(id)
                } else {
                    self.truncate_repeat_responses(id, n);
                    tree.next_sibling_or_up(id)
                }
            } else {
                self.first_child_or_next(id)
            }
        } else {
            tree.next_sibling_or_up(id)
        };
        if pop_current {
            self.session.drop_latest_visit();
        }
        let next_name = tree.node(next).name.clone();
        debug!(element = %next_name, "cursor advanced");
        self.session.add_visit(next_name);
        Ok(())
    }

    fn first_child_or_next(&self, id: NodeId) -> NodeId {
        self.tree
            .node(id)
            .children
            .first()
            .copied()
            .unwrap_or_else(|| self.tree.next_sibling_or_up(id))
    }

    /* ───────────────────── final assembly ───────────────────── */

    /// Collect the response to submit: every visited variable with a stored
    /// value, plus the auxiliary per-iteration list of every visited repeat
    /// descendant. Variables set but never visited are omitted.
    pub fn gather_survey_response(&mut self) -> ResponseMap {
        let responses = self.session.retrieve_all_responses();
        let visits: FxHashSet<String> = self.session.all_visits().into_iter().collect();

        let mut gathered = ResponseMap::new();
        for (varname, value) in &responses {
            if visits.contains(varname) {
                gathered.insert(varname.clone(), value.clone());
            }
        }
        for varname in &visits {
            let aux_name = repeat_varname(varname);
            if let Some(value) = responses.get(&aux_name) {
                gathered.insert(aux_name, value.clone());
            }
        }
        gathered
    }

    /// Clear all data in the current survey session.
    pub fn clear_session(&mut self) {
        self.session.clear();
    }

    /* ───────────────────── helpers ───────────────────── */

    fn shown_descendants(&self, id: NodeId) -> Vec<NodeId> {
        self.tree
            .descendants(id)
            .filter(|&child| child != id && self.tree.node(child).kind.is_displayable())
            .collect()
    }

    fn aux_list(&self, aux_name: &str) -> Vec<ResponseValue> {
        match self.session.retrieve_response(aux_name) {
            Some(ResponseValue::List(items)) => items,
            _ => Vec::new(),
        }
    }

    fn store_optional(&mut self, name: &str, value: ResponseValue) {
        let value = if value.is_empty() { None } else { Some(value) };
        self.session.store_response(name, value);
    }

    fn resolve_text(&mut self, text: Option<TextSpec>, field: &str) -> SurveyResult<String> {
        let Some(text) = text else {
            return Ok(String::new());
        };
        let raw = match text {
            TextSpec::Plain(s) => s,
            TextSpec::Translated(map) => {
                let language = self.current_language()?;
                map.get(&language)
                    .cloned()
                    .ok_or_else(|| SurveyError::LanguageMissing {
                        field: field.to_owned(),
                    })?
            }
        };
        self.interpolate(&raw)
    }

    /// Substitute `${var}` placeholders with the display form of stored
    /// values.
    fn interpolate(&mut self, text: &str) -> SurveyResult<String> {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                out.push_str(&rest[start..]);
                return Ok(out);
            };
            let value = self.value(&after[..end])?;
            out.push_str(&value.to_string());
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }
}
