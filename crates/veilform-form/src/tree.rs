//! The immutable form tree.
//!
//! Nodes live in an arena indexed by [`NodeId`]; parent links are plain
//! indices, so the tree has no owning back-references and traversal is
//! ordinary index arithmetic.

use crate::spec::TextSpec;
use rustc_hash::FxHashMap;
use veilform_parse::Expr;
use veilform_common::{SurveyError, SurveyResult};

pub type NodeId = usize;

/// Input kinds a respondent can answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionKind {
    Text,
    Integer,
    Decimal,
    Date,
    DateTime,
    SelectOne,
    SelectMultiple,
}

impl QuestionKind {
    pub fn from_type(node_type: &str) -> Option<Self> {
        match node_type {
            "text" => Some(QuestionKind::Text),
            "integer" => Some(QuestionKind::Integer),
            "decimal" => Some(QuestionKind::Decimal),
            "date" => Some(QuestionKind::Date),
            "datetime" => Some(QuestionKind::DateTime),
            "select one" => Some(QuestionKind::SelectOne),
            "select all that apply" => Some(QuestionKind::SelectMultiple),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            QuestionKind::Text => "text",
            QuestionKind::Integer => "integer",
            QuestionKind::Decimal => "decimal",
            QuestionKind::Date => "date",
            QuestionKind::DateTime => "datetime",
            QuestionKind::SelectOne => "select one",
            QuestionKind::SelectMultiple => "select all that apply",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    Group,
    Repeat,
    Calculate,
    Note,
    Question(QuestionKind),
}

impl NodeKind {
    /// Containers the walk descends into.
    pub fn is_section(&self) -> bool {
        matches!(self, NodeKind::Root | NodeKind::Group | NodeKind::Repeat)
    }

    /// Elements the respondent actually sees: input questions and notes.
    /// Calculates, groups, repeats, and the root are traversed silently.
    pub fn is_displayable(&self) -> bool {
        matches!(self, NodeKind::Note | NodeKind::Question(_))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            NodeKind::Root => "survey",
            NodeKind::Group => "group",
            NodeKind::Repeat => "repeat",
            NodeKind::Calculate => "calculate",
            NodeKind::Note => "note",
            NodeKind::Question(kind) => kind.type_name(),
        }
    }
}

/// A bind formula with its source text kept for diagnostics.
#[derive(Debug, Clone)]
pub struct Formula {
    pub source: String,
    pub ast: Expr,
}

#[derive(Debug, Clone)]
pub struct Choice {
    pub name: String,
    pub label: Option<TextSpec>,
}

#[derive(Debug)]
pub struct FormNode {
    pub name: String,
    pub kind: NodeKind,
    pub label: Option<TextSpec>,
    pub hint: Option<TextSpec>,
    pub relevant: Option<Formula>,
    pub constraint: Option<Formula>,
    pub constraint_message: Option<TextSpec>,
    pub required: bool,
    pub calculate: Option<Formula>,
    /// Present on every repeat (validation rejects unbounded repeats).
    pub repeat_count: Option<Formula>,
    pub choices: Vec<Choice>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

#[derive(Debug)]
pub struct FormTree {
    pub(crate) nodes: Vec<FormNode>,
    pub(crate) root: NodeId,
    pub(crate) default_language: Option<String>,
    pub(crate) lookup: FxHashMap<String, NodeId>,
}

impl FormTree {
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &FormNode {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn default_language(&self) -> Option<&str> {
        self.default_language.as_deref()
    }

    pub fn lookup(&self, name: &str) -> Option<NodeId> {
        self.lookup.get(name).copied()
    }

    /// Look up an element the caller expects to exist (e.g. a name taken
    /// from the visit history).
    pub fn require(&self, name: &str) -> SurveyResult<NodeId> {
        self.lookup(name).ok_or_else(|| SurveyError::ValueMissing {
            name: name.to_owned(),
        })
    }

    /// Pre-order walk of `id` and everything below it.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            tree: self,
            stack: vec![id],
        }
    }

    /// The immediate next sibling; on exhaustion, climb the parent chain and
    /// take the parent's next sibling. A repeat parent returns the repeat
    /// itself so the advance loop re-checks its count; the root returns
    /// itself (the terminal state).
    pub fn next_sibling_or_up(&self, id: NodeId) -> NodeId {
        let Some(parent) = self.nodes[id].parent else {
            return id;
        };
        let siblings = &self.nodes[parent].children;
        let index = siblings
            .iter()
            .position(|&child| child == id)
            .unwrap_or(siblings.len());
        if let Some(&next) = siblings.get(index + 1) {
            return next;
        }
        if self.nodes[parent].kind == NodeKind::Repeat {
            parent
        } else {
            self.next_sibling_or_up(parent)
        }
    }
}

pub struct Descendants<'a> {
    tree: &'a FormTree,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        let node = &self.tree.nodes[id];
        for &child in node.children.iter().rev() {
            self.stack.push(child);
        }
        Some(id)
    }
}
