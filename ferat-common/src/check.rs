//! Per-clause checking of an expansion against its QBF

use crate::{
    clause::Clause,
    expansion::Expansion,
    literal::Literal,
    memory::Vector,
    qbf::{PrefixIndex, Qbf, Quantifier, QuantifierKind},
    sorting::quicksort_by_key,
};
use std::io::Result;

/// The ways an expansion clause can be rejected.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum FailureKind {
    /// No QBF clause produces the existential literals of this clause.
    IncorrectLiterals,
    /// A QBF clause matches, but no matching clause has admissible
    /// annotations.
    IncorrectAnnotation,
}

impl Default for FailureKind {
    fn default() -> FailureKind {
        FailureKind::IncorrectLiterals
    }
}

impl FailureKind {
    fn description(self) -> &'static str {
        match self {
            FailureKind::IncorrectLiterals => "No QBF clause matches the literals found",
            FailureKind::IncorrectAnnotation => "Annotations in expansion are incorrect",
        }
    }
}

/// One rejected expansion clause.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct Failure {
    pub kind: FailureKind,
    /// The 0-based index of the offending expansion clause.
    pub clause_index: u64,
}

/// The failures collected over one verification run, in input order.
#[derive(Debug, PartialEq, Default)]
pub struct CheckResult {
    failures: Vector<Failure>,
}

impl CheckResult {
    pub fn new() -> CheckResult {
        CheckResult::default()
    }
    fn add(&mut self, kind: FailureKind, clause_index: u64) {
        self.failures.push(Failure { kind, clause_index });
    }
    pub fn num_failures(&self) -> usize {
        self.failures.len()
    }
    /// True if every expansion clause was accepted.
    pub fn is_verified(&self) -> bool {
        self.failures.is_empty()
    }
    pub fn failures(&self) -> &[Failure] {
        &self.failures
    }
    /// Print every failure as a comment, 1-indexed like the input formats.
    pub fn print(&self) {
        let noun = if self.num_failures() == 1 {
            "inconsistency"
        } else {
            "inconsistencies"
        };
        comment!("Found {} {}:", self.num_failures(), noun);
        for (at, failure) in self.failures.iter().enumerate() {
            comment!(
                "  {:>4}. {} in expansion clause {}",
                at + 1,
                failure.kind.description(),
                failure.clause_index + 1
            );
        }
    }
}

/// Transient per-run state, allocated once and reused for every clause.
struct Checker {
    /// Universal literals whose variable occurs in the candidate QBF clause,
    /// with the polarity negated relative to that clause. Sorted.
    u_set: Vector<Literal>,
    /// Both polarities of universal literals whose variable does not occur
    /// in the candidate QBF clause. Sorted.
    v_set: Vector<Literal>,
    /// Scratch storage for the quicksort.
    sort_stack: Vector<usize>,
    result: CheckResult,
}

/// Check every clause of the expansion against the QBF.
///
/// The QBF matrix must already be sorted with
/// [sort_matrix()](../qbf/struct.Qbf.html#method.sort_matrix). Clauses are
/// checked strictly in the order the parser yields them, and failures appear
/// in the result in that order.
pub fn check_expansion(qbf: &mut Qbf, expansion: &mut Expansion) -> Result<CheckResult> {
    let mut checker = Checker {
        u_set: Vector::new(),
        v_set: Vector::new(),
        sort_stack: Vector::new(),
        result: CheckResult::new(),
    };
    let mut clause_index: u64 = 0;
    while let Some(mut exp_clause) = expansion.next_clause()? {
        quicksort_by_key(&mut checker.sort_stack, &mut exp_clause, |literal| {
            literal.encoding()
        });
        check_clause(&mut checker, qbf, expansion, &exp_clause, clause_index)?;
        clause_index += 1;
    }
    if clause_index != expansion.p_num_clauses {
        parse_warning!(
            expansion.position(),
            "Expected {} clause[s], but received {}",
            expansion.p_num_clauses,
            clause_index
        );
    }
    Ok(checker.result)
}

/// Find a QBF clause this expansion clause is a legal expansion of.
///
/// With an origin map the indicated clause is the only candidate; without
/// one the matrix is scanned in order. The first candidate that passes the
/// existential-literal test and the annotation test accepts the clause.
fn check_clause(
    checker: &mut Checker,
    qbf: &mut Qbf,
    expansion: &mut Expansion,
    exp_clause: &[Literal],
    clause_index: u64,
) -> Result<()> {
    let Qbf { matrix, prefix, index, .. } = qbf;
    if expansion.clause_origins.is_some() {
        let origins = expansion.clause_origins.as_ref().unwrap();
        let num_origins = origins.len();
        if (clause_index as usize) < num_origins {
            let matrix_index = origins[clause_index as usize];
            if matrix_index >= matrix.number_of_clauses() as usize {
                return Err(expansion.position().error(format!(
                    "origin index {} is invalid, as there are only {} clauses \
                     in the QBF matrix",
                    matrix_index + 1,
                    matrix.number_of_clauses()
                )));
            }
            let qbf_clause = matrix.clause(Clause::from_usize(matrix_index));
            let mut found_matching_clause = false;
            if existential_literal_test(qbf_clause, exp_clause, index, expansion) {
                found_matching_clause = true;
                if annotation_test(
                    qbf_clause,
                    exp_clause,
                    prefix,
                    index,
                    expansion,
                    &mut checker.u_set,
                    &mut checker.v_set,
                ) {
                    return Ok(());
                }
            }
            checker.result.add(
                if found_matching_clause {
                    FailureKind::IncorrectAnnotation
                } else {
                    FailureKind::IncorrectLiterals
                },
                clause_index,
            );
            return Ok(());
        }
        parse_warning!(
            expansion.position(),
            "Expected {} clauses in clause origin mapping comment ('c o 1 4 2 2 ... 0'), \
             but yielded {} clauses so far. Falling back to iterative search mode, \
             this might be quite slow.",
            num_origins,
            clause_index
        );
        expansion.clause_origins = None;
    }
    let mut found_matching_clause = false;
    for candidate in Clause::range(0usize, matrix.number_of_clauses() as usize) {
        let qbf_clause = matrix.clause(candidate);
        if existential_literal_test(qbf_clause, exp_clause, index, expansion) {
            found_matching_clause = true;
            if annotation_test(
                qbf_clause,
                exp_clause,
                prefix,
                index,
                expansion,
                &mut checker.u_set,
                &mut checker.v_set,
            ) {
                return Ok(());
            }
        }
    }
    checker.result.add(
        if found_matching_clause {
            FailureKind::IncorrectAnnotation
        } else {
            FailureKind::IncorrectLiterals
        },
        clause_index,
    );
    Ok(())
}

/// Test that the expansion clause's literals could have originated from the
/// given QBF clause.
///
/// Every expansion literal, translated through its mapping record, must
/// occur in the QBF clause, and the QBF clause must contain no further
/// existential (or free) literals beyond those.
fn existential_literal_test(
    qbf_clause: &[Literal],
    exp_clause: &[Literal],
    index: &mut PrefixIndex,
    expansion: &mut Expansion,
) -> bool {
    for &exp_literal in exp_clause {
        let mapping = expansion.mapping(exp_literal.variable());
        let translated = mapping.qbf_var.literal(exp_literal.sign());
        if !qbf_clause.iter().any(|&literal| literal == translated) {
            return false;
        }
    }
    let mut num_existentials = 0;
    for &literal in qbf_clause {
        match index.lookup(literal.variable()) {
            Some(binding) if binding.kind == QuantifierKind::Universal => (),
            // Free variables count as existentially quantified.
            _ => num_existentials += 1,
        }
    }
    exp_clause.len() == num_existentials
}

/// Test that the annotations of the expansion clause are admissible for the
/// given QBF clause.
///
/// Walks the prefix front to back, once per clause, maintaining two sorted
/// sets of universal literals:
///
///   - `u_set`: variables that occur in the QBF clause, stored with the
///     opposite polarity;
///   - `v_set`: variables that do not occur in the QBF clause, stored in
///     both polarities.
///
/// Each annotation must assign exactly the universals left of its variable,
/// and every assignment must come from `u_set` or `v_set`. Once an
/// annotation commits a free universal to one polarity, the opposite
/// polarity is removed from `v_set` so later literals of the same clause
/// cannot contradict it.
fn annotation_test(
    qbf_clause: &[Literal],
    exp_clause: &[Literal],
    prefix: &Vector<Quantifier>,
    index: &mut PrefixIndex,
    expansion: &mut Expansion,
    u_set: &mut Vector<Literal>,
    v_set: &mut Vector<Literal>,
) -> bool {
    u_set.clear();
    v_set.clear();
    let mut universals_seen = 0;
    let mut last_block = 0;
    for &exp_literal in exp_clause {
        let mapping = expansion.mapping(exp_literal.variable());
        let binding = match index.lookup(mapping.qbf_var) {
            Some(binding) => binding,
            None => {
                // A free variable is existentially quantified at the very
                // beginning, so its annotation must be empty.
                if !expansion.annotation(mapping).is_empty() {
                    return false;
                }
                continue;
            }
        };
        let current_block = binding.ordering as usize;
        for at in last_block..current_block {
            let quantifier = &prefix[at];
            if quantifier.kind != QuantifierKind::Universal {
                continue;
            }
            for &universal in &quantifier.variables {
                universals_seen += 1;
                match qbf_clause
                    .iter()
                    .find(|literal| literal.variable() == universal)
                {
                    Some(&occurrence) => insert_sorted(u_set, -occurrence),
                    None => {
                        insert_sorted(v_set, universal.literal(0));
                        insert_sorted(v_set, universal.literal(1));
                    }
                }
            }
        }
        let annotation = expansion.annotation(mapping);
        if annotation.len() != universals_seen {
            return false;
        }
        for &assignment in annotation {
            if v_set.binary_search(&assignment).is_err()
                && u_set.binary_search(&assignment).is_err()
            {
                return false;
            }
        }
        // The annotation fixed these universals, so conflicting polarities
        // are no longer available to later literals of this clause.
        for &assignment in annotation {
            remove_all_sorted(v_set, -assignment);
        }
        last_block = current_block;
    }
    true
}

/// Insert a literal into a sorted vector, keeping it sorted.
fn insert_sorted(set: &mut Vector<Literal>, literal: Literal) {
    let position = match set.binary_search(&literal) {
        Ok(position) => position,
        Err(position) => position,
    };
    set.insert(position, literal);
}

/// Remove every occurrence of a literal from a sorted vector.
fn remove_all_sorted(set: &mut Vector<Literal>, literal: Literal) {
    while let Ok(position) = set.binary_search(&literal) {
        set.remove(position);
    }
}
