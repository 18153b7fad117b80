//! Term-tree decoding for query server responses.
//!
//! The server answers every query with a JSON array of solutions. Each
//! solution is a term: either a compound node serialized as
//! `{"functor": "...", "args": [...]}`, a list (JSON array), or a scalar.
//!
//! A solution that binds a variable is the compound `=(Name, Value)`. When
//! the bound value is tagged with the matrix functor, its second argument
//! holds the rows:
//!
//! ```text
//! [ {"functor": "=", "args": ["M", {"functor": "matriz", "args": [2, [[1,2],[3,4]]]}]} ]
//! ```
//!
//! Decoding never fails loudly: malformed input degrades to "no matrix"
//! plus human-readable diagnostics for the console log.

use std::fmt;

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Default functor tagging matrix payloads.
pub const MATRIX_FUNCTOR: &str = "matriz";

/// Functor of a variable binding.
pub const BINDING_FUNCTOR: &str = "=";

/// Errors raised while decoding a term tree.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    /// The response payload is not a JSON array.
    #[error("Response is not a list of solutions (got {0})")]
    NotASolutionList(&'static str),

    /// A compound term lacks a required field.
    #[error("Term is missing the '{0}' field")]
    MissingField(&'static str),

    /// A compound term field has the wrong JSON type.
    #[error("Term field '{field}' must be {expected}, got {found}")]
    WrongFieldType {
        field: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    /// The matrix term has no row argument.
    #[error("Matrix term has {0} argument(s), expected at least 2")]
    MissingRows(usize),

    /// The row argument is not a list.
    #[error("Matrix rows must be a list")]
    RowsNotList,

    /// A row is not a list of cells.
    #[error("Matrix row {0} is not a list")]
    RowNotList(usize),

    /// Rows have differing lengths.
    #[error("Matrix row {row} has {found} cells, expected {expected}")]
    NotRectangular {
        row: usize,
        expected: usize,
        found: usize,
    },
}

/// Short JSON type name for diagnostics.
fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

/// A node of the server's term tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Compound { functor: String, args: Vec<Term> },
    List(Vec<Term>),
    Number(serde_json::Number),
    Text(String),
    Bool(bool),
    Null,
}

impl Term {
    /// Decode a term from its JSON wire form.
    pub fn from_json(value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::Object(map) => {
                let functor = map
                    .get("functor")
                    .ok_or(DecodeError::MissingField("functor"))?;
                let functor = functor.as_str().ok_or(DecodeError::WrongFieldType {
                    field: "functor",
                    expected: "a string",
                    found: json_kind(functor),
                })?;

                let args = map.get("args").ok_or(DecodeError::MissingField("args"))?;
                let args = args.as_array().ok_or(DecodeError::WrongFieldType {
                    field: "args",
                    expected: "a list",
                    found: json_kind(args),
                })?;

                Ok(Term::Compound {
                    functor: functor.to_string(),
                    args: args
                        .iter()
                        .map(Term::from_json)
                        .collect::<Result<Vec<_>, _>>()?,
                })
            }
            Value::Array(items) => items
                .iter()
                .map(Term::from_json)
                .collect::<Result<Vec<_>, _>>()
                .map(Term::List),
            Value::Number(n) => Ok(Term::Number(n.clone())),
            Value::String(s) => Ok(Term::Text(s.clone())),
            Value::Bool(b) => Ok(Term::Bool(*b)),
            Value::Null => Ok(Term::Null),
        }
    }

    /// Functor name for compound terms.
    pub fn functor(&self) -> Option<&str> {
        match self {
            Term::Compound { functor, .. } => Some(functor),
            _ => None,
        }
    }

    /// Arguments of a compound term (empty for anything else).
    pub fn args(&self) -> &[Term] {
        match self {
            Term::Compound { args, .. } => args,
            _ => &[],
        }
    }

    /// View this term as a variable binding, if it is one.
    pub fn as_binding(&self) -> Option<Binding<'_>> {
        match self {
            Term::Compound { functor, args } if functor == BINDING_FUNCTOR && args.len() >= 2 => {
                let variable = match &args[0] {
                    Term::Text(name) => name.clone(),
                    other => other.to_string(),
                };
                Some(Binding {
                    variable,
                    value: &args[1],
                })
            }
            _ => None,
        }
    }
}

/// Prolog-style rendering, used for matrix cells and log output.
impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Compound { functor, args } => {
                write!(f, "{}", functor)?;
                if !args.is_empty() {
                    write!(f, "(")?;
                    write_joined(f, args)?;
                    write!(f, ")")?;
                }
                Ok(())
            }
            Term::List(items) => {
                write!(f, "[")?;
                write_joined(f, items)?;
                write!(f, "]")
            }
            Term::Number(n) => write!(f, "{}", n),
            Term::Text(s) => write!(f, "{}", s),
            Term::Bool(b) => write!(f, "{}", b),
            Term::Null => write!(f, "null"),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, terms: &[Term]) -> fmt::Result {
    for (i, term) in terms.iter().enumerate() {
        if i > 0 {
            write!(f, ",")?;
        }
        write!(f, "{}", term)?;
    }
    Ok(())
}

/// One variable binding within a solution.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding<'a> {
    pub variable: String,
    pub value: &'a Term,
}

/// A rectangular grid of display-ready cells.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Matrix {
    rows: Vec<Vec<String>>,
}

impl Matrix {
    /// Build a matrix, rejecting ragged rows.
    pub fn new(rows: Vec<Vec<String>>) -> Result<Self, DecodeError> {
        if let Some(first) = rows.first() {
            let expected = first.len();
            if let Some((row, found)) = rows
                .iter()
                .map(Vec::len)
                .enumerate()
                .find(|(_, len)| *len != expected)
            {
                return Err(DecodeError::NotRectangular {
                    row,
                    expected,
                    found,
                });
            }
        }
        Ok(Self { rows })
    }

    /// Build a matrix from the row/column argument of a matrix term.
    pub fn from_term(rows: &Term) -> Result<Self, DecodeError> {
        let Term::List(rows) = rows else {
            return Err(DecodeError::RowsNotList);
        };

        let cells = rows
            .iter()
            .enumerate()
            .map(|(i, row)| match row {
                Term::List(cells) => Ok(cells.iter().map(Term::to_string).collect()),
                _ => Err(DecodeError::RowNotList(i)),
            })
            .collect::<Result<Vec<Vec<String>>, _>>()?;

        Self::new(cells)
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Result of scanning one response for a matrix payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    /// The decoded matrix, if a solution bound one.
    pub matrix: Option<Matrix>,
    /// Variable the matrix was bound to.
    pub variable: Option<String>,
    /// Problems found while decoding, for the console log.
    pub diagnostics: Vec<String>,
    /// Variables of earlier matrix bindings replaced by a later one, in order.
    pub superseded: Vec<String>,
}

/// Scan a response for a matrix bound by any solution.
///
/// Uses the default [`MATRIX_FUNCTOR`] tag.
pub fn extract_matrix(solutions: &Value) -> Extraction {
    extract_matrix_tagged(solutions, MATRIX_FUNCTOR)
}

/// Scan a response for a matrix whose term is tagged with `tag`.
///
/// Every solution is inspected; when several bind a matrix, the last one
/// wins. Solutions that are not bindings are skipped. A response without a
/// matrix yields `matrix: None` and no diagnostics.
pub fn extract_matrix_tagged(solutions: &Value, tag: &str) -> Extraction {
    let mut extraction = Extraction::default();

    let Some(solutions) = solutions.as_array() else {
        extraction
            .diagnostics
            .push(DecodeError::NotASolutionList(json_kind(solutions)).to_string());
        return extraction;
    };

    let mut candidate: Option<(String, Result<Matrix, DecodeError>)> = None;

    for (index, solution) in solutions.iter().enumerate() {
        let term = match Term::from_json(solution) {
            Ok(term) => term,
            Err(e) => {
                extraction
                    .diagnostics
                    .push(format!("Solution {}: {}", index + 1, e));
                continue;
            }
        };

        let Some(binding) = term.as_binding() else {
            continue;
        };
        if binding.value.functor() != Some(tag) {
            continue;
        }

        let args = binding.value.args();
        let matrix = match args.get(1) {
            Some(rows) => Matrix::from_term(rows),
            None => Err(DecodeError::MissingRows(args.len())),
        };

        if let Some((previous, _)) = candidate.take() {
            debug!(
                "Matrix bound to '{}' supersedes earlier binding '{}'",
                binding.variable, previous
            );
            extraction.superseded.push(previous);
        }
        candidate = Some((binding.variable, matrix));
    }

    match candidate {
        Some((variable, Ok(matrix))) => {
            extraction.matrix = Some(matrix);
            extraction.variable = Some(variable);
        }
        Some((variable, Err(e))) => {
            extraction
                .diagnostics
                .push(format!("Matrix for variable '{}' rejected: {}", variable, e));
        }
        None => {}
    }

    extraction
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn matrix_binding(variable: &str, rows: Value) -> Value {
        json!({
            "functor": "=",
            "args": [variable, {"functor": "matriz", "args": [2, rows]}]
        })
    }

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|row| row.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_empty_response_has_no_matrix() {
        let extraction = extract_matrix(&json!([]));
        assert_eq!(extraction, Extraction::default());
    }

    #[test]
    fn test_single_binding_2x2() {
        let response = json!([matrix_binding("M", json!([[1, 2], [3, 4]]))]);
        let extraction = extract_matrix(&response);

        let matrix = extraction.matrix.expect("matrix should be decoded");
        assert_eq!(matrix.rows(), grid(&[&["1", "2"], &["3", "4"]]).as_slice());
        assert_eq!(matrix.row_count(), 2);
        assert_eq!(matrix.column_count(), 2);
        assert_eq!(extraction.variable.as_deref(), Some("M"));
        assert!(extraction.diagnostics.is_empty());
    }

    #[test]
    fn test_last_matrix_wins() {
        let response = json!([
            matrix_binding("A", json!([[1]])),
            {"functor": "=", "args": ["N", 7]},
            matrix_binding("B", json!([[5, 6], [7, 8]])),
        ]);
        let extraction = extract_matrix(&response);

        assert_eq!(extraction.variable.as_deref(), Some("B"));
        assert_eq!(extraction.superseded, vec!["A".to_string()]);
        assert_eq!(
            extraction.matrix.unwrap().rows(),
            grid(&[&["5", "6"], &["7", "8"]]).as_slice()
        );
    }

    #[test]
    fn test_non_matrix_bindings_yield_none_without_diagnostics() {
        let response = json!([
            {"functor": "=", "args": ["X", 1]},
            {"functor": "=", "args": ["Y", {"functor": "foo", "args": ["a"]}]},
            "true",
        ]);
        let extraction = extract_matrix(&response);
        assert!(extraction.matrix.is_none());
        assert!(extraction.diagnostics.is_empty());
    }

    #[test]
    fn test_non_list_response_is_diagnosed() {
        let extraction = extract_matrix(&json!({"functor": "=", "args": []}));
        assert!(extraction.matrix.is_none());
        assert_eq!(
            extraction.diagnostics,
            vec!["Response is not a list of solutions (got an object)".to_string()]
        );
    }

    #[test]
    fn test_malformed_solution_is_diagnosed_and_skipped() {
        let response = json!([
            {"functor": "="},
            matrix_binding("M", json!([[1, 2]])),
        ]);
        let extraction = extract_matrix(&response);

        assert_eq!(extraction.variable.as_deref(), Some("M"));
        assert_eq!(
            extraction.diagnostics,
            vec!["Solution 1: Term is missing the 'args' field".to_string()]
        );
    }

    #[test]
    fn test_ragged_matrix_rejected() {
        let response = json!([matrix_binding("M", json!([[1, 2], [3]]))]);
        let extraction = extract_matrix(&response);

        assert!(extraction.matrix.is_none());
        assert_eq!(extraction.diagnostics.len(), 1);
        assert!(extraction.diagnostics[0].contains("row 1 has 1 cells, expected 2"));
    }

    #[test]
    fn test_malformed_last_candidate_wins_over_valid_earlier_one() {
        let response = json!([
            matrix_binding("A", json!([[1, 2], [3, 4]])),
            matrix_binding("B", json!("not rows")),
        ]);
        let extraction = extract_matrix(&response);

        assert!(extraction.matrix.is_none());
        assert_eq!(
            extraction.diagnostics,
            vec!["Matrix for variable 'B' rejected: Matrix rows must be a list".to_string()]
        );
        assert_eq!(extraction.superseded, vec!["A".to_string()]);
    }

    #[test]
    fn test_matrix_term_missing_rows() {
        let response = json!([
            {"functor": "=", "args": ["M", {"functor": "matriz", "args": [2]}]}
        ]);
        let extraction = extract_matrix(&response);
        assert!(extraction.matrix.is_none());
        assert!(extraction.diagnostics[0].contains("expected at least 2"));
    }

    #[test]
    fn test_cells_render_in_prolog_notation() {
        let response = json!([matrix_binding(
            "M",
            json!([
                [1.5, "x", true],
                [null, {"functor": "f", "args": ["a", 2]}, [1, 2]]
            ])
        )]);
        let matrix = extract_matrix(&response).matrix.unwrap();
        assert_eq!(
            matrix.rows(),
            grid(&[&["1.5", "x", "true"], &["null", "f(a,2)", "[1,2]"]]).as_slice()
        );
    }

    #[test]
    fn test_empty_matrix_is_valid() {
        let response = json!([matrix_binding("E", json!([]))]);
        let matrix = extract_matrix(&response).matrix.unwrap();
        assert!(matrix.is_empty());
        assert_eq!(matrix.column_count(), 0);
    }

    #[test]
    fn test_custom_tag() {
        let response = json!([
            {"functor": "=", "args": ["G", {"functor": "grid", "args": [0, [["a"]]]}]}
        ]);
        assert!(extract_matrix(&response).matrix.is_none());
        let extraction = extract_matrix_tagged(&response, "grid");
        assert_eq!(extraction.matrix.unwrap().rows(), grid(&[&["a"]]).as_slice());
    }

    #[test]
    fn test_decoding_does_not_mutate_input() {
        let response = json!([matrix_binding("M", json!([[1, 2], [3, 4]]))]);
        let before = response.clone();
        let _ = extract_matrix(&response);
        assert_eq!(response, before);
    }

    #[test]
    fn test_term_from_json_errors() {
        assert_eq!(
            Term::from_json(&json!({"args": []})),
            Err(DecodeError::MissingField("functor"))
        );
        assert_eq!(
            Term::from_json(&json!({"functor": 3, "args": []})),
            Err(DecodeError::WrongFieldType {
                field: "functor",
                expected: "a string",
                found: "a number",
            })
        );
        assert_eq!(
            Term::from_json(&json!({"functor": "f", "args": "x"})),
            Err(DecodeError::WrongFieldType {
                field: "args",
                expected: "a list",
                found: "a string",
            })
        );
    }

    #[test]
    fn test_binding_with_non_string_variable() {
        let term = Term::from_json(&json!({"functor": "=", "args": [1, 2]})).unwrap();
        let binding = term.as_binding().unwrap();
        assert_eq!(binding.variable, "1");
        assert_eq!(binding.value, &Term::Number(2.into()));
    }

    #[test]
    fn test_matrix_new_rejects_ragged_rows() {
        let err = Matrix::new(grid(&[&["1"], &["2", "3"]])).unwrap_err();
        assert_eq!(
            err,
            DecodeError::NotRectangular {
                row: 1,
                expected: 1,
                found: 2,
            }
        );
    }
}
