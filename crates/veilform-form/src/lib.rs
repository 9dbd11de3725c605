//! The survey form model.
//!
//! A form arrives as an already-parsed tree ([`spec::NodeSpec`], typically
//! deserialized from XLSForm-to-JSON output). [`loader::load_form`] walks it
//! once, enforces the structural rules (explicit repeat counts, no nested
//! repeats, supported question types, resolvable functions, unique names),
//! and produces an immutable [`tree::FormTree`] the interpreter traverses.
//! [`garbling`] extracts and validates the randomized-response parameters
//! declared on sensitive questions.

pub mod garbling;
pub mod loader;
pub mod spec;
pub mod tree;

pub use garbling::{GarblingParams, GarblingScheme, parse_garbling, shock_batch};
pub use loader::load_form;
pub use spec::{BindSpec, ChoiceSpec, ControlSpec, GarblingSpec, NodeSpec, TextSpec};
pub use tree::{Choice, FormNode, FormTree, Formula, NodeId, NodeKind, QuestionKind};
