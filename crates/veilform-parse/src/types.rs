use std::fmt::{self, Display};

/// The closed set of XLSForm functions the engine implements.
///
/// Form validation rejects any other function name up front, so evaluation
/// never meets an unknown call. Source spellings may contain `:` and `-`
/// (e.g. `selected-at`, `jr:choice-name`); both normalize to `_` before
/// resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XlsFunction {
    /// `if(cond, then, else)`
    If,
    /// `selected(array, choice)`: membership test
    Selected,
    /// `selected-at(array, i)`: bounds-safe indexing, empty string when out
    /// of range
    SelectedAt,
    /// `position(..)`: how many times the current node has been visited
    Position,
}

impl XlsFunction {
    /// Resolve a source-form function name. `:` and `-` are folded to `_`
    /// before matching.
    pub fn resolve(name: &str) -> Option<Self> {
        let normalized = normalize_function_name(name);
        match normalized.as_str() {
            "if" => Some(XlsFunction::If),
            "selected" => Some(XlsFunction::Selected),
            "selected_at" => Some(XlsFunction::SelectedAt),
            "position" => Some(XlsFunction::Position),
            _ => None,
        }
    }

    /// Canonical host-side name, used in translated output.
    pub fn canonical_name(&self) -> &'static str {
        match self {
            XlsFunction::If => "if",
            XlsFunction::Selected => "selected",
            XlsFunction::SelectedAt => "selected_at",
            XlsFunction::Position => "position",
        }
    }

    /// Exact argument count after the `..` rewrite.
    pub fn arity(&self) -> usize {
        match self {
            XlsFunction::If => 3,
            XlsFunction::Selected => 2,
            XlsFunction::SelectedAt => 2,
            XlsFunction::Position => 0,
        }
    }
}

impl Display for XlsFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

/// Fold the separators XLSForm allows in function names into `_`.
pub fn normalize_function_name(name: &str) -> String {
    name.chars()
        .map(|c| if c == ':' || c == '-' { '_' } else { c })
        .collect()
}
