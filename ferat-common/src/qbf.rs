//! QDIMACS parser and the prefix-indexed QBF formula

use crate::{
    clause::Clause,
    clausedatabase::ClauseDatabase,
    input::Input,
    literal::Variable,
    memory::{HeapSpace, Offset, Vector},
    sorting::quicksort_by_key,
};
use ferat_macros::HeapSpace;
use std::{cmp, io::Result};

/// The kind of a quantifier block.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum QuantifierKind {
    Existential,
    Universal,
}

/// A block of the quantifier prefix.
#[derive(Debug, PartialEq, HeapSpace)]
pub struct Quantifier {
    pub kind: QuantifierKind,
    /// The 0-based position of this block in the prefix.
    pub ordering: u32,
    /// The variables bound by this block, unique across the entire prefix.
    pub variables: Vector<Variable>,
}

/// Where a variable is bound in the prefix.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Binding {
    pub ordering: u32,
    pub kind: QuantifierKind,
}

/// Maps variables to the quantifier block that binds them.
///
/// Variables are dense 32-bit identifiers, so this is a direct-addressed
/// array rather than a hash table. Unbound ("free") variables are reported
/// once per formula and treated as existentially quantified at position 0.
#[derive(Debug, PartialEq, Default, HeapSpace)]
pub struct PrefixIndex {
    bindings: Vector<Option<Binding>>,
    warned_free: Vector<bool>,
    silent: bool,
}

impl PrefixIndex {
    /// Return true if this variable is already bound in the prefix.
    pub fn is_bound(&self, variable: Variable) -> bool {
        variable.as_offset() < self.bindings.len()
            && self.bindings[variable.as_offset()].is_some()
    }
    /// Record that a quantifier block binds this variable.
    pub fn bind(&mut self, variable: Variable, ordering: u32, kind: QuantifierKind) {
        requires!(!self.is_bound(variable));
        if variable.as_offset() >= self.bindings.len() {
            self.bindings.resize(variable.as_offset() + 1);
        }
        self.bindings[variable.as_offset()] = Some(Binding { ordering, kind });
    }
    /// Look up the binding of a variable, warning once if it is free.
    pub fn lookup(&mut self, variable: Variable) -> Option<Binding> {
        let binding = if variable.as_offset() < self.bindings.len() {
            self.bindings[variable.as_offset()]
        } else {
            None
        };
        if binding.is_none() {
            self.warn_free(variable);
        }
        binding
    }
    /// The quantifier ordering used to sort clause literals; free variables
    /// sort to the very front.
    pub fn ordering_or_free(&mut self, variable: Variable) -> u32 {
        self.lookup(variable).map_or(0, |binding| binding.ordering)
    }
    /// Warn about a free variable, once per variable.
    fn warn_free(&mut self, variable: Variable) {
        if variable.as_offset() >= self.warned_free.len() {
            self.warned_free.resize(variable.as_offset() + 1);
        }
        if !self.warned_free[variable.as_offset()] {
            self.warned_free[variable.as_offset()] = true;
            warning!(
                self.silent,
                "Variable {} not found in QBF prefix, assuming existentially quantified",
                variable
            );
        }
    }
}

/// A QBF formula in prefix-matrix form.
#[derive(Debug, PartialEq)]
pub struct Qbf {
    /// The largest variable observed anywhere in the formula.
    pub max_var: Variable,
    /// The number of quantifier kind changes along the prefix.
    pub num_alternations: u32,
    /// The quantifier blocks, outermost first.
    pub prefix: Vector<Quantifier>,
    /// The matrix clauses, in input order.
    pub matrix: ClauseDatabase,
    /// Maps each bound variable to its quantifier block.
    pub index: PrefixIndex,
}

impl HeapSpace for Qbf {
    fn heap_space(&self) -> usize {
        self.prefix.heap_space() + self.matrix.heap_space() + self.index.heap_space()
    }
}

/// The state of the QDIMACS parser, reset at the start of every line.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum ParseState {
    None,
    Problem,
    Comment,
    Quantifier(QuantifierKind),
    Clause,
}

/// Parse a QBF formula from a QDIMACS stream.
///
/// Clauses keep their input literal order; call
/// [sort_matrix()](struct.Qbf.html#method.sort_matrix) before checking.
pub fn parse_qbf(input: &mut Input) -> Result<Qbf> {
    let mut qbf = Qbf {
        max_var: Variable(0),
        num_alternations: 0,
        prefix: Vector::new(),
        matrix: ClauseDatabase::new(),
        index: PrefixIndex {
            silent: input.silent(),
            ..PrefixIndex::default()
        },
    };
    let mut state = ParseState::None;
    let mut parsed_problem = false;
    let mut p_max_var = Variable(0);
    let mut p_num_clauses: u64 = 0;
    let mut num_clauses: u64 = 0;
    loop {
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
                    b'p' => {
                        input.next();
                        ParseState::Problem
                    }
                    b'c' => {
                        input.next();
                        ParseState::Comment
                    }
                    b'e' => {
                        input.next();
                        ParseState::Quantifier(QuantifierKind::Existential)
                    }
                    b'a' => {
                        input.next();
                        ParseState::Quantifier(QuantifierKind::Universal)
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
                p_max_var = Variable(input.parse_i32()? as u32);
                input.skip_horizontal_ws();
                p_num_clauses = input.parse_u64()?;
                // Some QDIMACS writers terminate the header like a clause.
                input.skip_horizontal_ws();
                match input.peek() {
                    None | Some(b'\n') => (),
                    _ => {
                        let terminator = input.parse_u64()?;
                        if terminator != 0 {
                            return Err(input
                                .error(format!("expected 0, received {}", terminator)));
                        }
                    }
                }
                parsed_problem = true;
                state = ParseState::None;
            }
            ParseState::Comment => {
                while let Some(c) = input.peek() {
                    if c == b'\n' {
                        break;
                    }
                    input.next();
                }
                state = ParseState::None;
            }
            ParseState::Quantifier(kind) => {
                let variables = input.parse_variable_list()?;
                let mut quantifier = Quantifier {
                    kind,
                    ordering: qbf.prefix.len() as u32,
                    variables: Vector::new(),
                };
                for &variable in &variables {
                    if qbf.index.is_bound(variable) {
                        parse_warning!(
                            input,
                            "Found duplicate variable {} in prefix, keeping its first appearance",
                            variable
                        );
                        continue;
                    }
                    qbf.index.bind(variable, quantifier.ordering, kind);
                    qbf.max_var = cmp::max(qbf.max_var, variable);
                    quantifier.variables.push(variable);
                }
                // A block whose variables were all duplicates binds nothing.
                if !quantifier.variables.is_empty() {
                    if !qbf.prefix.is_empty() {
                        if qbf.prefix.last().kind != kind {
                            qbf.num_alternations += 1;
                        } else {
                            parse_warning!(input, "Two quantifiers of same type in a row");
                        }
                    }
                    qbf.prefix.push(quantifier);
                }
                state = ParseState::None;
            }
            ParseState::Clause => {
                let literals = input.parse_literal_list()?;
                qbf.matrix.open_clause();
                for &literal in &literals {
                    qbf.max_var = cmp::max(qbf.max_var, literal.variable());
                    qbf.matrix.push_literal(literal);
                }
                qbf.matrix.close_clause();
                num_clauses += 1;
                state = ParseState::None;
            }
        }
    }
    if !parsed_problem {
        return Err(input.error("expected a \"p ...\" header but reached EOF"));
    }
    if num_clauses != p_num_clauses {
        parse_warning!(
            input,
            "Expected {} clause[s], but received {}",
            p_num_clauses,
            num_clauses
        );
    }
    if qbf.max_var != p_max_var {
        parse_warning!(
            input,
            "Expected maximum variable to be {}, but maximum variable is actually {} \
             in quantifiers and clauses",
            p_max_var,
            qbf.max_var
        );
        qbf.max_var = cmp::max(qbf.max_var, p_max_var);
    }
    qbf.matrix.shrink_to_fit();
    Ok(qbf)
}

impl Qbf {
    /// Sort the literals of every matrix clause by the ordering of the
    /// quantifier binding their variable, ties broken by literal value.
    ///
    /// The annotation check walks the prefix front to back and relies on
    /// this order.
    pub fn sort_matrix(&mut self) {
        let Qbf { matrix, index, .. } = self;
        let mut stack = Vector::new();
        for clause in Clause::range(0usize, matrix.number_of_clauses() as usize) {
            quicksort_by_key(&mut stack, matrix.clause_mut(clause), |literal| {
                index.ordering_or_free(literal.variable())
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::literal::Literal;

    fn parse(formula: &str) -> Qbf {
        try_parse(formula).expect("formula should parse")
    }

    fn try_parse(formula: &str) -> Result<Qbf> {
        parse_qbf(&mut Input::from_str(formula))
    }

    fn quantifier(qbf: &Qbf, at: usize) -> &Quantifier {
        &qbf.prefix[at]
    }

    #[test]
    fn empty_formula() {
        let qbf = parse("p cnf 0 0\n");
        assert_eq!(qbf.max_var, Variable(0));
        assert_eq!(qbf.prefix.len(), 0);
        assert_eq!(qbf.matrix.number_of_clauses(), 0);
    }

    #[test]
    fn single_clause() {
        let qbf = parse("p cnf 1 1\ne 1\n1 0\n");
        assert_eq!(qbf.max_var, Variable(1));
        assert_eq!(qbf.prefix.len(), 1);
        assert_eq!(qbf.matrix.number_of_clauses(), 1);
    }

    #[test]
    fn quantifier_blocks() {
        let qbf = parse("p cnf 4 0\na 1 3\ne 2 4\n");
        let first = quantifier(&qbf, 0);
        assert_eq!(first.kind, QuantifierKind::Universal);
        assert_eq!(first.ordering, 0);
        assert_eq!(first.variables, vector!(Variable(1), Variable(3)));
        let second = quantifier(&qbf, 1);
        assert_eq!(second.kind, QuantifierKind::Existential);
        assert_eq!(second.ordering, 1);
        assert_eq!(second.variables, vector!(Variable(2), Variable(4)));
        assert_eq!(qbf.num_alternations, 1);
    }

    #[test]
    fn adjacent_blocks_of_same_kind_are_kept() {
        let qbf = parse("p cnf 4 0\na 1\na 2\ne 3\na 4");
        assert_eq!(qbf.prefix.len(), 4);
        for at in 0..4 {
            assert_eq!(quantifier(&qbf, at).ordering, at as u32);
        }
        assert_eq!(quantifier(&qbf, 1).kind, QuantifierKind::Universal);
        assert_eq!(qbf.num_alternations, 2);
    }

    #[test]
    fn clauses_are_stored_in_input_order() {
        let qbf = parse("p cnf 4 2\na 1\na 2\ne 3\na 4\n1 2 0\n3 4 -1 -2 0\n");
        assert_eq!(
            qbf.matrix.clause(Clause::new(0)),
            &[Literal::new(1), Literal::new(2)]
        );
        assert_eq!(
            qbf.matrix.clause(Clause::new(1)),
            &[
                Literal::new(3),
                Literal::new(4),
                Literal::new(-1),
                Literal::new(-2)
            ]
        );
    }

    #[test]
    fn duplicate_prefix_variable_keeps_first_appearance() {
        let mut qbf = parse("p cnf 2 0\na 1\ne 1 2\n");
        assert_eq!(quantifier(&qbf, 0).variables, vector!(Variable(1)));
        assert_eq!(quantifier(&qbf, 1).variables, vector!(Variable(2)));
        assert_eq!(
            qbf.index.lookup(Variable(1)),
            Some(Binding {
                ordering: 0,
                kind: QuantifierKind::Universal
            })
        );
    }

    #[test]
    fn all_duplicate_block_is_discarded() {
        let qbf = parse("p cnf 1 0\na 1\ne 1\n");
        assert_eq!(qbf.prefix.len(), 1);
        assert_eq!(qbf.num_alternations, 0);
    }

    #[test]
    fn header_is_required() {
        assert!(try_parse("1 2 0\n").is_err());
        assert!(try_parse("p cnf 1 0\np cnf 1 0\n").is_err());
        assert!(try_parse("p dnf 1 0\n").is_err());
    }

    #[test]
    fn declared_max_var_wins_if_larger() {
        let qbf = parse("p cnf 9 1\n1 0\n");
        assert_eq!(qbf.max_var, Variable(9));
        let qbf = parse("p cnf 1 1\n7 0\n");
        assert_eq!(qbf.max_var, Variable(7));
    }

    #[test]
    fn matrix_sort_orders_by_quantifier_block() {
        let mut qbf = parse("p cnf 6 1\ne 5 6\na 3 4\ne 1 2\n1 -5 3 6 -2 0\n");
        qbf.sort_matrix();
        assert_eq!(
            qbf.matrix.clause(Clause::new(0)),
            &[
                Literal::new(-5),
                Literal::new(6),
                Literal::new(3),
                Literal::new(1),
                Literal::new(-2)
            ]
        );
    }

    #[test]
    fn free_variables_sort_to_the_front() {
        let mut qbf = parse("p cnf 3 1\ne 2\na 3\n3 2 1 0\n");
        qbf.sort_matrix();
        // Variable 1 is free and keys to position 0, like the block of 2.
        assert_eq!(
            qbf.matrix.clause(Clause::new(0)),
            &[Literal::new(2), Literal::new(1), Literal::new(3)]
        );
    }
}
