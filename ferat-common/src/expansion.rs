//! Parser for the annotated CNF expansion of a QBF

use crate::{
    input::Input,
    literal::{Literal, Variable},
    memory::{HeapSpace, Offset, Vector},
};
use std::{cmp, io::Result};

/// The annotation record of one expansion variable.
///
/// The annotation literals live in an arena owned by the
/// [Expansion](struct.Expansion.html); use
/// [annotation()](struct.Expansion.html#method.annotation) to view them.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct MappingRecord {
    /// The QBF variable this expansion variable is a copy of.
    pub qbf_var: Variable,
    annotation_start: usize,
    annotation_end: usize,
}

/// A CNF expansion formula with its preamble fully parsed.
///
/// Clauses are not stored; they are yielded one at a time by
/// [next_clause()](#method.next_clause), driven by the byte stream.
pub struct Expansion<'a> {
    input: Input<'a>,
    /// The maximum variable declared in the DIMACS preamble.
    pub p_max_var: Variable,
    /// The clause count declared in the DIMACS preamble.
    pub p_num_clauses: u64,
    /// For each expansion clause, the 0-based index of its QBF matrix
    /// clause; absent when the input had no `c o` comment.
    pub clause_origins: Option<Vector<usize>>,
    records: Vector<MappingRecord>,
    /// Maps expansion variables to their record, direct-addressed.
    mapping_index: Vector<Option<u32>>,
    annotation_data: Vector<Literal>,
    warned_unmapped: Vector<bool>,
    num_clauses_yielded: u64,
    silent: bool,
}

/// The state of the expansion parser, reset at the start of every line.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum ParseState {
    None,
    Problem,
    Comment,
    PlainComment,
    MappingComment,
    OriginComment,
    Clause,
}

impl<'a> Expansion<'a> {
    /// Parse the preamble of an expansion stream.
    ///
    /// This consumes `p`, `c x`, `c o` and plain comment lines and stops at
    /// the first byte of the first clause. The remaining stream is consumed
    /// lazily by [next_clause()](#method.next_clause).
    pub fn parse_preamble(mut input: Input<'a>) -> Result<Expansion<'a>> {
        let mut expansion = Expansion {
            silent: input.silent(),
            p_max_var: Variable(0),
            p_num_clauses: 0,
            clause_origins: None,
            records: Vector::new(),
            mapping_index: Vector::new(),
            annotation_data: Vector::new(),
            warned_unmapped: Vector::new(),
            num_clauses_yielded: 0,
            input,
        };
        let input = &mut expansion.input;
        let mut state = ParseState::None;
        let mut parsed_problem = false;
        let mut parsed_origins = false;
        let mut origins = Vector::new();
        let mut max_var = Variable(0);
        loop {
            if state == ParseState::Clause {
                break;
            }
            if input.skip_newline_if_any() {
                state = ParseState::None;
                continue;
            }
            let ahead = match input.peek() {
                None => break,
                Some(c) => c,
            };
            match state {
                ParseState::None => {
                    state = match ahead {
                        b'c' => {
                            input.next();
                            ParseState::Comment
                        }
                        b'p' => {
                            input.next();
                            ParseState::Problem
                        }
                        _ => ParseState::Clause,
                    };
                }
                ParseState::Problem => {
                    if parsed_problem {
                        return Err(input.error("second or duplicate \"p ...\" header"));
                    }
                    let word = input.parse_word();
                    if &*word != b"cnf" {
                        return Err(input.error(format!(
                            "only the \"cnf\" option is supported, not \"{}\"",
                            String::from_utf8_lossy(&word)
                        )));
                    }
                    input.skip_horizontal_ws();
                    expansion.p_max_var = Variable(input.parse_i32()? as u32);
                    input.skip_horizontal_ws();
                    expansion.p_num_clauses = input.parse_u64()?;
                    parsed_problem = true;
                    state = ParseState::None;
                }
                ParseState::Comment => {
                    let word = input.parse_word();
                    state = match &*word {
                        b"x" => ParseState::MappingComment,
                        b"o" => ParseState::OriginComment,
                        _ => ParseState::PlainComment,
                    };
                }
                ParseState::PlainComment => {
                    while let Some(c) = input.peek() {
                        if c == b'\n' {
                            break;
                        }
                        input.next();
                    }
                    state = ParseState::None;
                }
                ParseState::MappingComment => {
                    let exp_vars = input.parse_variable_list()?;
                    let qbf_vars = input.parse_variable_list()?;
                    if exp_vars.len() != qbf_vars.len() {
                        return Err(input.error(format!(
                            "QBF variable ({}) and expansion variable lists ({}) \
                             must be of the same size",
                            qbf_vars.len(),
                            exp_vars.len()
                        )));
                    }
                    let annotation = input.parse_literal_list()?;
                    // All variables on one mapping line receive their own
                    // copy of the annotation sequence.
                    for at in 0..exp_vars.len() {
                        let exp_var = exp_vars[at];
                        max_var = cmp::max(max_var, exp_var);
                        let annotation_start = expansion.annotation_data.len();
                        for &literal in &annotation {
                            expansion.annotation_data.push(literal);
                        }
                        let record = MappingRecord {
                            qbf_var: qbf_vars[at],
                            annotation_start,
                            annotation_end: expansion.annotation_data.len(),
                        };
                        let id = expansion.records.len() as u32;
                        expansion.records.push(record);
                        if exp_var.as_offset() >= expansion.mapping_index.len() {
                            expansion.mapping_index.resize(exp_var.as_offset() + 1);
                        }
                        expansion.mapping_index[exp_var.as_offset()] = Some(id);
                    }
                    state = ParseState::None;
                }
                ParseState::OriginComment => {
                    let mut got_zero = false;
                    loop {
                        input.skip_horizontal_ws();
                        match input.peek() {
                            None | Some(b'\n') => break,
                            _ => {
                                let origin = input.parse_u64()?;
                                if origin == 0 {
                                    got_zero = true;
                                    break;
                                }
                                // The comment is 1-indexed; 0 is the sentinel.
                                origins.push(origin as usize - 1);
                            }
                        }
                    }
                    if !got_zero {
                        parse_warning!(input, "expected \"0\" delimiter before end of line");
                    }
                    parsed_origins = true;
                    state = ParseState::None;
                }
                ParseState::Clause => unreachable!(),
            }
        }
        if !parsed_problem {
            return Err(input.error("expected a \"p ...\" header but reached EOF"));
        }
        if parsed_origins {
            expansion.clause_origins = Some(origins);
        } else {
            parse_warning!(
                input,
                "No clause origin mapping comment ('c o 1 4 2 2 ... 0') found. \
                 Falling back to iterative search mode, this might be quite slow."
            );
        }
        if max_var != expansion.p_max_var {
            parse_warning!(
                input,
                "Expected maximum variable to be {}, but maximum variable is actually {} \
                 in the expansion mapping comments",
                expansion.p_max_var,
                max_var
            );
            expansion.p_max_var = cmp::max(expansion.p_max_var, max_var);
        }
        Ok(expansion)
    }

    /// Yield the next expansion clause, or `None` once the stream is used up.
    ///
    /// The caller owns the clause and is expected to discard it before
    /// requesting the next one.
    pub fn next_clause(&mut self) -> Result<Option<Vector<Literal>>> {
        while self.input.skip_newline_if_any() {}
        if self.input.peek().is_none() {
            return Ok(None);
        }
        let literals = self.input.parse_literal_list()?;
        self.num_clauses_yielded += 1;
        Ok(Some(literals))
    }

    /// The number of clauses yielded so far.
    pub fn num_clauses_yielded(&self) -> u64 {
        self.num_clauses_yielded
    }

    /// The mapping record of an expansion variable.
    ///
    /// A variable that never appeared in a `c x` comment is reported once
    /// and treated as a copy of the equally-named QBF variable with an empty
    /// annotation.
    pub fn mapping(&mut self, exp_var: Variable) -> MappingRecord {
        let id = if exp_var.as_offset() < self.mapping_index.len() {
            self.mapping_index[exp_var.as_offset()]
        } else {
            None
        };
        match id {
            Some(id) => self.records[id as usize],
            None => {
                self.warn_unmapped(exp_var);
                MappingRecord {
                    qbf_var: exp_var,
                    annotation_start: 0,
                    annotation_end: 0,
                }
            }
        }
    }

    /// The annotation literals of a mapping record.
    pub fn annotation(&self, record: MappingRecord) -> &[Literal] {
        &self.annotation_data[record.annotation_start..record.annotation_end]
    }

    /// The parser position, for warnings issued while clauses are checked.
    pub fn position(&self) -> &Input<'a> {
        &self.input
    }

    /// Warn about an unmapped expansion variable, once per variable.
    fn warn_unmapped(&mut self, exp_var: Variable) {
        if exp_var.as_offset() >= self.warned_unmapped.len() {
            self.warned_unmapped.resize(exp_var.as_offset() + 1);
        }
        if !self.warned_unmapped[exp_var.as_offset()] {
            self.warned_unmapped[exp_var.as_offset()] = true;
            warning!(
                self.silent,
                "Expansion variable {} not found in mapping comments, assuming it \
                 copies QBF variable {} with an empty annotation",
                exp_var,
                exp_var
            );
        }
    }
}

impl HeapSpace for Expansion<'_> {
    fn heap_space(&self) -> usize {
        self.clause_origins.as_ref().map_or(0, HeapSpace::heap_space)
            + self.records.heap_space()
            + self.mapping_index.heap_space()
            + self.annotation_data.heap_space()
            + self.warned_unmapped.heap_space()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preamble(formula: &str) -> Expansion {
        Expansion::parse_preamble(Input::from_str(formula)).expect("preamble should parse")
    }

    fn all_clauses(expansion: &mut Expansion) -> Vec<Vector<Literal>> {
        let mut clauses = Vec::new();
        while let Some(clause) = expansion.next_clause().unwrap() {
            clauses.push(clause);
        }
        clauses
    }

    #[test]
    fn plain_comments_have_no_semantics() {
        let mut expansion = preamble("c Nothing\nc o 1 0\np cnf 1 1\n1 0\n");
        assert_eq!(expansion.p_max_var, Variable(1));
        assert_eq!(expansion.p_num_clauses, 1);
        assert_eq!(expansion.clause_origins, Some(vector!(0usize)));
        let clauses = all_clauses(&mut expansion);
        assert_eq!(clauses, vec![vector!(Literal::new(1))]);
        assert_eq!(expansion.num_clauses_yielded(), 1);
    }

    #[test]
    fn mapping_comments_build_records() {
        let mut expansion = preamble(
            "c x 1 2 0 1 2 0 0\nc x 3 0 5 0 -1 -2 3 0\nc o 1 3 0\np cnf 3 2\n1 -2 0\n 2 -3\n",
        );
        assert_eq!(expansion.p_max_var, Variable(3));
        assert_eq!(expansion.p_num_clauses, 2);
        assert_eq!(expansion.clause_origins, Some(vector!(0usize, 2usize)));
        let record = expansion.mapping(Variable(1));
        assert_eq!(record.qbf_var, Variable(1));
        assert_eq!(expansion.annotation(record), &[]);
        let record = expansion.mapping(Variable(2));
        assert_eq!(record.qbf_var, Variable(2));
        assert_eq!(expansion.annotation(record), &[]);
        let record = expansion.mapping(Variable(3));
        assert_eq!(record.qbf_var, Variable(5));
        assert_eq!(
            expansion.annotation(record),
            &[Literal::new(-1), Literal::new(-2), Literal::new(3)]
        );
        let clauses = all_clauses(&mut expansion);
        assert_eq!(
            clauses,
            vec![
                vector!(Literal::new(1), Literal::new(-2)),
                vector!(Literal::new(2), Literal::new(-3)),
            ]
        );
    }

    #[test]
    fn annotations_are_copied_per_variable() {
        let mut expansion = preamble("c x 4 7 0 2 3 0 -1 0\np cnf 7 0\n");
        let first = expansion.mapping(Variable(4));
        let second = expansion.mapping(Variable(7));
        assert_eq!(expansion.annotation(first), &[Literal::new(-1)]);
        assert_eq!(expansion.annotation(second), &[Literal::new(-1)]);
        assert_eq!(first.qbf_var, Variable(2));
        assert_eq!(second.qbf_var, Variable(3));
    }

    #[test]
    fn missing_origin_comment_disables_origin_mode() {
        let expansion = preamble("p cnf 1 1\n1 0\n");
        assert_eq!(expansion.clause_origins, None);
    }

    #[test]
    fn unmapped_variable_defaults_to_identity() {
        let mut expansion = preamble("p cnf 1 1\n1 0\n");
        let record = expansion.mapping(Variable(1));
        assert_eq!(record.qbf_var, Variable(1));
        assert_eq!(expansion.annotation(record), &[]);
    }

    #[test]
    fn mapping_lists_must_have_equal_length() {
        assert!(
            Expansion::parse_preamble(Input::from_str("c x 1 2 0 1 0 0\np cnf 2 0\n")).is_err()
        );
    }

    #[test]
    fn missing_header_is_fatal() {
        assert!(Expansion::parse_preamble(Input::from_str("c o 1 0\n")).is_err());
        assert!(
            Expansion::parse_preamble(Input::from_str("p cnf 1 0\np cnf 1 0\n")).is_err()
        );
    }

    #[test]
    fn clauses_are_yielded_lazily() {
        let mut expansion = preamble("c o 1 2 0\np cnf 2 2\n1 0\n2 0\n");
        assert_eq!(expansion.num_clauses_yielded(), 0);
        assert_eq!(
            expansion.next_clause().unwrap(),
            Some(vector!(Literal::new(1)))
        );
        assert_eq!(expansion.num_clauses_yielded(), 1);
        assert_eq!(
            expansion.next_clause().unwrap(),
            Some(vector!(Literal::new(2)))
        );
        assert_eq!(expansion.next_clause().unwrap(), None);
        assert_eq!(expansion.num_clauses_yielded(), 2);
    }
}
