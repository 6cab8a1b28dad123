//! Loaded policies: rule table, load-time validation and evaluation.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use tracing::{debug, info};

use crate::expr::{Expr, RuleId};
use crate::parser::{self, Ast};
use crate::{PolicyError, Role};

/// Raw policy document: rule name → expression text.
pub type PolicySource = BTreeMap<String, String>;

/// A fully parsed, validated policy.
///
/// Rules live in a vector addressed by [`RuleId`]; `index` maps names to ids.
/// Every `rule:` reference is resolved and the reference graph is known to be
/// acyclic, so evaluation cannot fail except for an unknown top-level name.
///
/// Walks over the reference graph use explicit stacks, so chain length is
/// bounded by memory rather than by the thread's stack.
#[derive(Clone, Debug)]
pub struct Policy {
    names: Vec<String>,
    index: HashMap<String, RuleId>,
    rules: Vec<Expr>,
    /// Direct references of each rule, in expression order
    refs: Vec<Vec<RuleId>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

impl Policy {
    /// Parse and validate every rule in `source`.
    pub fn load(source: &PolicySource) -> Result<Self, PolicyError> {
        let names: Vec<String> = source.keys().cloned().collect();
        let index: HashMap<String, RuleId> = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), RuleId(i)))
            .collect();

        let mut rules = Vec::with_capacity(names.len());
        for (name, text) in source {
            let ast = parser::parse(text).map_err(|e| PolicyError::Parse {
                rule: name.clone(),
                position: e.position,
                message: e.message,
            })?;
            rules.push(resolve(ast, name, &index)?);
        }

        let refs = rules.iter().map(Expr::references).collect();
        let policy = Self {
            names,
            index,
            rules,
            refs,
        };
        policy.check_acyclic()?;

        info!("Loaded policy with {} rules", policy.len());
        Ok(policy)
    }

    /// Load a policy from a JSON object of `"rule": "expression"` pairs.
    pub fn from_json_str(json: &str) -> Result<Self, PolicyError> {
        let source: PolicySource = serde_json::from_str(json)?;
        Self::load(&source)
    }

    /// Load a policy file from disk.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, PolicyError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| PolicyError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json_str(&contents)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn contains(&self, rule: &str) -> bool {
        self.index.contains_key(rule)
    }

    /// Rule names in sorted order.
    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn expr(&self, rule: &str) -> Option<&Expr> {
        self.index.get(rule).map(|id| &self.rules[id.0])
    }

    /// Does `role` satisfy `rule`?
    ///
    /// An unknown rule is an error, never a denial.
    pub fn evaluate(&self, rule: &str, role: &Role) -> Result<bool, PolicyError> {
        let id = self
            .index
            .get(rule)
            .ok_or_else(|| PolicyError::RuleNotFound {
                rule: rule.to_string(),
            })?;
        let allowed = self.eval_rule(*id, role);
        debug!("Rule {} for role {}: allowed={}", rule, role, allowed);
        Ok(allowed)
    }

    /// The subset of `candidates` that `rule` authorizes, in input order.
    pub fn authorized_roles(&self, rule: &str, candidates: &[Role]) -> Result<Vec<Role>, PolicyError> {
        let mut allowed = Vec::new();
        for role in candidates {
            if self.evaluate(rule, role)? {
                allowed.push(role.clone());
            }
        }
        Ok(allowed)
    }

    /// Canonical text for a rule's expression.
    pub fn render(&self, rule: &str) -> Option<String> {
        let expr = self.expr(rule)?;
        let mut out = String::new();
        self.write_expr(expr, 0, &mut out);
        Some(out)
    }

    /// Evaluate `root` and everything it references, dependencies first.
    fn eval_rule(&self, root: RuleId, role: &Role) -> bool {
        let mut values: Vec<Option<bool>> = vec![None; self.rules.len()];
        let mut stack = vec![root];

        while let Some(&id) = stack.last() {
            if values[id.0].is_some() {
                stack.pop();
                continue;
            }
            let pending: Vec<RuleId> = self.refs[id.0]
                .iter()
                .copied()
                .filter(|r| values[r.0].is_none())
                .collect();
            if pending.is_empty() {
                values[id.0] = Some(eval_expr(&self.rules[id.0], role, &values));
                stack.pop();
            } else {
                stack.extend(pending);
            }
        }
        values[root.0] == Some(true)
    }

    fn check_acyclic(&self) -> Result<(), PolicyError> {
        let mut marks = vec![Mark::Unvisited; self.rules.len()];
        // (rule, index of the next reference to follow)
        let mut path: Vec<(RuleId, usize)> = Vec::new();

        for root in 0..self.rules.len() {
            if marks[root] != Mark::Unvisited {
                continue;
            }
            marks[root] = Mark::InProgress;
            path.push((RuleId(root), 0));

            while let Some(top) = path.last_mut() {
                let id = top.0;
                let Some(&next) = self.refs[id.0].get(top.1) else {
                    marks[id.0] = Mark::Done;
                    path.pop();
                    continue;
                };
                top.1 += 1;

                match marks[next.0] {
                    Mark::Done => {}
                    Mark::InProgress => return Err(self.cycle_error(&path, next)),
                    Mark::Unvisited => {
                        marks[next.0] = Mark::InProgress;
                        path.push((next, 0));
                    }
                }
            }
        }
        Ok(())
    }

    fn cycle_error(&self, path: &[(RuleId, usize)], back_edge: RuleId) -> PolicyError {
        let start = path
            .iter()
            .position(|(id, _)| *id == back_edge)
            .unwrap_or(0);
        let mut cycle: Vec<String> = path[start..]
            .iter()
            .map(|(id, _)| self.names[id.0].clone())
            .collect();
        cycle.push(self.names[back_edge.0].clone());
        PolicyError::CyclicRule { cycle }
    }

    // Precedence: or = 1, and = 2, not = 3. Wrap when the child binds looser
    // than its context requires.
    fn write_expr(&self, expr: &Expr, context: u8, out: &mut String) {
        match expr {
            Expr::AllowAll => out.push('@'),
            Expr::DenyAll => out.push('!'),
            Expr::Role(role) => {
                out.push_str("role:");
                out.push_str(role.as_str());
            }
            Expr::Rule(id) => {
                out.push_str("rule:");
                out.push_str(&self.names[id.0]);
            }
            Expr::Not(inner) => {
                out.push_str("not ");
                self.write_expr(inner, 3, out);
            }
            Expr::And(terms) => self.write_joined(terms, " and ", 2, context, out),
            Expr::Or(terms) => self.write_joined(terms, " or ", 1, context, out),
        }
    }

    fn write_joined(&self, terms: &[Expr], sep: &str, own: u8, context: u8, out: &mut String) {
        let wrap = own < context;
        if wrap {
            out.push('(');
        }
        for (i, term) in terms.iter().enumerate() {
            if i > 0 {
                out.push_str(sep);
            }
            self.write_expr(term, own, out);
        }
        if wrap {
            out.push(')');
        }
    }
}

/// Evaluate one rule body. Referenced rules must already be in `values`.
fn eval_expr(expr: &Expr, role: &Role, values: &[Option<bool>]) -> bool {
    match expr {
        Expr::AllowAll => true,
        Expr::DenyAll => false,
        Expr::Role(name) => name == role,
        Expr::Rule(id) => values[id.0] == Some(true),
        Expr::Not(inner) => !eval_expr(inner, role, values),
        Expr::And(terms) => terms.iter().all(|t| eval_expr(t, role, values)),
        Expr::Or(terms) => terms.iter().any(|t| eval_expr(t, role, values)),
    }
}

fn resolve(ast: Ast, rule: &str, index: &HashMap<String, RuleId>) -> Result<Expr, PolicyError> {
    Ok(match ast {
        Ast::AllowAll => Expr::AllowAll,
        Ast::DenyAll => Expr::DenyAll,
        Ast::Role(role) => Expr::Role(role),
        Ast::Rule(target) => match index.get(&target) {
            Some(id) => Expr::Rule(*id),
            None => {
                return Err(PolicyError::UndefinedReference {
                    rule: rule.to_string(),
                    target,
                })
            }
        },
        Ast::Not(inner) => Expr::Not(Box::new(resolve(*inner, rule, index)?)),
        Ast::And(terms) => Expr::And(
            terms
                .into_iter()
                .map(|t| resolve(t, rule, index))
                .collect::<Result<_, _>>()?,
        ),
        Ast::Or(terms) => Expr::Or(
            terms
                .into_iter()
                .map(|t| resolve(t, rule, index))
                .collect::<Result<_, _>>()?,
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn policy(pairs: &[(&str, &str)]) -> Result<Policy, PolicyError> {
        let source: PolicySource = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Policy::load(&source)
    }

    fn roles() -> Vec<Role> {
        ["admin", "member", "reader", "nobody"]
            .into_iter()
            .map(Role::new)
            .collect()
    }

    #[test]
    fn role_check_matches_exactly() {
        let p = policy(&[("compute:delete", "role:admin")]).unwrap();
        assert!(p.evaluate("compute:delete", &Role::new("admin")).unwrap());
        assert!(!p.evaluate("compute:delete", &Role::new("member")).unwrap());
        assert!(!p.evaluate("compute:delete", &Role::new("administrator")).unwrap());
    }

    #[test]
    fn allow_all_and_deny_all_ignore_role() {
        let p = policy(&[("open", "@"), ("closed", "!"), ("blank", "")]).unwrap();
        for role in roles() {
            assert!(p.evaluate("open", &role).unwrap());
            assert!(p.evaluate("blank", &role).unwrap());
            assert!(!p.evaluate("closed", &role).unwrap());
        }
    }

    #[test]
    fn rule_references_are_followed() {
        let p = policy(&[
            ("admin_api", "role:admin"),
            ("admin_or_member", "rule:admin_api or role:member"),
            ("compute:update", "rule:admin_or_member"),
        ])
        .unwrap();
        assert!(p.evaluate("compute:update", &Role::new("admin")).unwrap());
        assert!(p.evaluate("compute:update", &Role::new("member")).unwrap());
        assert!(!p.evaluate("compute:update", &Role::new("reader")).unwrap());
    }

    #[test]
    fn boolean_combinators() {
        let p = policy(&[
            ("both", "role:admin and role:member"),
            ("either", "role:admin or role:member"),
            ("anyone_but_reader", "not role:reader"),
            ("grouped", "not (role:admin or role:member)"),
        ])
        .unwrap();
        let admin = Role::new("admin");
        let reader = Role::new("reader");

        // a single role can never satisfy two distinct role checks
        assert!(!p.evaluate("both", &admin).unwrap());
        assert!(p.evaluate("either", &admin).unwrap());
        assert!(!p.evaluate("either", &reader).unwrap());
        assert!(p.evaluate("anyone_but_reader", &admin).unwrap());
        assert!(!p.evaluate("anyone_but_reader", &reader).unwrap());
        assert!(!p.evaluate("grouped", &admin).unwrap());
        assert!(p.evaluate("grouped", &reader).unwrap());
    }

    #[test]
    fn evaluation_is_deterministic() {
        let p = policy(&[
            ("base", "role:admin or role:member"),
            ("derived", "rule:base and not role:member"),
        ])
        .unwrap();
        for role in roles() {
            let first = p.evaluate("derived", &role).unwrap();
            for _ in 0..10 {
                assert_eq!(p.evaluate("derived", &role).unwrap(), first);
            }
        }
    }

    #[test]
    fn unknown_rule_is_an_error_not_a_denial() {
        let p = policy(&[("compute:create", "@")]).unwrap();
        let err = p
            .evaluate("compute:explode", &Role::new("admin"))
            .unwrap_err();
        assert!(matches!(err, PolicyError::RuleNotFound { rule } if rule == "compute:explode"));
    }

    #[test]
    fn two_rule_cycle_is_rejected_at_load() {
        let err = policy(&[("A", "rule:B"), ("B", "rule:A")]).unwrap_err();
        match err {
            PolicyError::CyclicRule { cycle } => {
                assert_eq!(cycle, vec!["A", "B", "A"]);
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let err = policy(&[("loop", "role:admin or rule:loop")]).unwrap_err();
        assert!(matches!(err, PolicyError::CyclicRule { cycle } if cycle == vec!["loop", "loop"]));
    }

    #[test]
    fn cycle_behind_acyclic_prefix_is_found() {
        let err = policy(&[
            ("entry", "rule:x"),
            ("x", "rule:y"),
            ("y", "role:admin and rule:z"),
            ("z", "rule:x"),
        ])
        .unwrap_err();
        match err {
            PolicyError::CyclicRule { cycle } => assert_eq!(cycle, vec!["x", "y", "z", "x"]),
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn shared_references_are_not_cycles() {
        let p = policy(&[
            ("base", "role:admin"),
            ("left", "rule:base"),
            ("right", "rule:base"),
            ("top", "rule:left and rule:right"),
        ])
        .unwrap();
        assert!(p.evaluate("top", &Role::new("admin")).unwrap());
    }

    fn chain(len: usize, tail: &str) -> PolicySource {
        let mut source: PolicySource = (0..len)
            .map(|i| (format!("r{}", i), format!("rule:r{}", i + 1)))
            .collect();
        source.insert(format!("r{}", len), tail.to_string());
        source
    }

    #[test]
    fn long_reference_chain_loads_and_evaluates() {
        let p = Policy::load(&chain(200_000, "role:admin")).unwrap();
        assert_eq!(p.len(), 200_001);
        assert!(p.evaluate("r0", &Role::new("admin")).unwrap());
        assert!(!p.evaluate("r0", &Role::new("member")).unwrap());
        assert!(p.evaluate("r199999", &Role::new("admin")).unwrap());
    }

    #[test]
    fn cycle_at_the_end_of_a_long_chain_is_found() {
        let err = Policy::load(&chain(50_000, "rule:r49990")).unwrap_err();
        match err {
            PolicyError::CyclicRule { cycle } => {
                assert_eq!(cycle.first().map(String::as_str), Some("r49990"));
                assert_eq!(cycle.last().map(String::as_str), Some("r49990"));
                assert_eq!(cycle.len(), 12);
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn negated_references_see_dependency_values() {
        let p = policy(&[
            ("admin_only", "role:admin"),
            ("not_admin", "not rule:admin_only"),
            ("either", "rule:not_admin or rule:admin_only"),
        ])
        .unwrap();
        for role in roles() {
            assert!(p.evaluate("either", &role).unwrap());
        }
        assert!(!p.evaluate("not_admin", &Role::new("admin")).unwrap());
    }

    #[test]
    fn undefined_reference_is_rejected_at_load() {
        let err = policy(&[("compute:create", "rule:missing")]).unwrap_err();
        assert!(matches!(
            err,
            PolicyError::UndefinedReference { rule, target }
                if rule == "compute:create" && target == "missing"
        ));
    }

    #[test]
    fn parse_error_names_the_rule() {
        let err = policy(&[("good", "@"), ("bad", "role:admin or")]).unwrap_err();
        match err {
            PolicyError::Parse { rule, .. } => assert_eq!(rule, "bad"),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn authorized_roles_filters_candidates() {
        let p = policy(&[("compute:create", "role:admin or role:member")]).unwrap();
        let allowed = p.authorized_roles("compute:create", &roles()).unwrap();
        assert_eq!(allowed, vec![Role::new("admin"), Role::new("member")]);
    }

    #[test]
    fn render_round_trips_through_parser() {
        let p = policy(&[
            ("base", "role:admin"),
            ("r", "not (role:a or rule:base) and (role:b or role:c)"),
        ])
        .unwrap();
        let text = p.render("r").unwrap();
        assert_eq!(text, "not (role:a or rule:base) and (role:b or role:c)");
        assert!(p.render("missing").is_none());
    }

    #[test]
    fn loads_json_document() {
        let p = Policy::from_json_str(
            r#"{
                "admin_api": "role:admin",
                "compute_extension:services": "rule:admin_api"
            }"#,
        )
        .unwrap();
        assert_eq!(p.len(), 2);
        assert!(p.contains("compute_extension:services"));
        let names: Vec<&str> = p.rule_names().collect();
        assert_eq!(names, vec!["admin_api", "compute_extension:services"]);
    }

    #[test]
    fn rejects_non_object_json() {
        let err = Policy::from_json_str(r#"["role:admin"]"#).unwrap_err();
        assert!(matches!(err, PolicyError::Json(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"compute:delete": "role:admin"}}"#).unwrap();
        let p = Policy::from_path(file.path()).unwrap();
        assert!(p.evaluate("compute:delete", &Role::new("admin")).unwrap());
    }

    #[test]
    fn missing_file_reports_path() {
        let err = Policy::from_path("/nonexistent/gatecheck/policy.json").unwrap_err();
        assert!(matches!(err, PolicyError::Read { .. }));
        assert!(err.to_string().contains("/nonexistent/gatecheck/policy.json"));
    }
}
