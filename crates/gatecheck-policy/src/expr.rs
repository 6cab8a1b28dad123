//! Resolved rule expressions.

use crate::Role;

/// Index of a rule inside a [`crate::Policy`].
///
/// Rule references are stored as indices rather than names so evaluation
/// never re-looks-up strings and cycle detection works on a plain graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(pub(crate) usize);

/// Boolean expression tree for one rule. Immutable once the policy is loaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expr {
    /// `@`
    AllowAll,
    /// `!`
    DenyAll,
    /// `role:<name>`
    Role(Role),
    /// `rule:<name>`, resolved
    Rule(RuleId),
    Not(Box<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
}

impl Expr {
    /// Rules referenced directly by this expression (not transitively).
    pub fn references(&self) -> Vec<RuleId> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references(&self, out: &mut Vec<RuleId>) {
        match self {
            Expr::Rule(id) => out.push(*id),
            Expr::Not(inner) => inner.collect_references(out),
            Expr::And(terms) | Expr::Or(terms) => {
                for term in terms {
                    term.collect_references(out);
                }
            }
            Expr::AllowAll | Expr::DenyAll | Expr::Role(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn references_are_collected_in_order() {
        let expr = Expr::Or(vec![
            Expr::Rule(RuleId(2)),
            Expr::And(vec![
                Expr::Role(Role::new("admin")),
                Expr::Not(Box::new(Expr::Rule(RuleId(0)))),
            ]),
        ]);
        assert_eq!(expr.references(), vec![RuleId(2), RuleId(0)]);
    }

    #[test]
    fn leaf_expressions_have_no_references() {
        assert!(Expr::AllowAll.references().is_empty());
        assert!(Expr::Role(Role::new("member")).references().is_empty());
    }
}
