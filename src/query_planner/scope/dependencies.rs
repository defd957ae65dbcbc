use std::collections::{BTreeMap, VecDeque};

use crate::open_cypher_parser::ast::{
    self, CypherQuery, Direction, MatchClause, NodePattern, ReturnClause, SortOrder, Stage,
    WithClause,
};
use crate::query_planner::errors::{LoweringError, LoweringResult};
use crate::query_planner::logical_expr::ast_conversion::convert_expression;
use crate::query_planner::logical_expr::{AliasedExpr, Expr, PropertyAccess};
use crate::query_planner::variables::{InlinePredicate, VarArena, VarId, VarType};

use super::{AvailableVariables, ClauseId, ClauseKind};

/// One traversed edge of a pattern. Consecutive relationships of a path share
/// the variable of the node between them.
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    pub left: VarId,
    pub right: VarId,
    /// Named relationship variable; anonymous relationships have none.
    pub rel: Option<VarId>,
    pub labels: Vec<String>,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageRole {
    /// One comma-separated branch of a `MATCH`.
    MatchBranch { optional: bool },
    /// `WHERE` of a `MATCH` with several branches.
    MatchFilter,
    /// `WITH`
    Projection,
    /// `WITH ... WHERE`
    ProjectionFilter,
    Return,
}

/// What the select tree builder needs to know about one stage.
#[derive(Debug, Clone, PartialEq)]
pub struct ClauseInfo {
    pub clause: ClauseId,
    pub role: StageRole,
    pub where_condition: Option<Expr>,
    pub projections: Vec<Expr>,
    pub distinct: bool,
    pub order_by: Vec<(Expr, SortOrder)>,
    pub skip: Option<Expr>,
    pub limit: Option<Expr>,
}

impl ClauseInfo {
    fn new(clause: ClauseId, role: StageRole) -> Self {
        ClauseInfo {
            clause,
            role,
            where_condition: None,
            projections: vec![],
            distinct: false,
            order_by: vec![],
            skip: None,
            limit: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VarDependencies {
    clauses: Vec<ClauseInfo>,
    used_variables: BTreeMap<ClauseId, Vec<VarId>>,
    reachable_variables: BTreeMap<ClauseId, AvailableVariables>,
    relationships: BTreeMap<ClauseId, Vec<Relationship>>,
    label_checks: BTreeMap<ClauseId, Vec<(VarId, Vec<String>)>>,
    return_exprs: Vec<Expr>,
}

impl VarDependencies {
    /// Stages in query order.
    pub fn clauses(&self) -> &[ClauseInfo] {
        &self.clauses
    }

    pub fn clause_info(&self, clause: ClauseId) -> Option<&ClauseInfo> {
        self.clauses.iter().find(|c| c.clause == clause)
    }

    pub fn used_variables(&self, clause: ClauseId) -> &[VarId] {
        self.used_variables
            .get(&clause)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn reachable_variables(&self, clause: ClauseId) -> Option<&AvailableVariables> {
        self.reachable_variables.get(&clause)
    }

    pub fn relationships(&self, clause: ClauseId) -> &[Relationship] {
        self.relationships
            .get(&clause)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn all_relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.relationships.values().flatten()
    }

    /// Labels an `OPTIONAL MATCH` puts on nodes bound by earlier clauses.
    /// They restrict the optional pattern only, never the earlier binding.
    pub fn label_checks(&self, clause: ClauseId) -> &[(VarId, Vec<String>)] {
        self.label_checks
            .get(&clause)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn return_exprs(&self) -> &[Expr] {
        &self.return_exprs
    }

    /// Used variables of `clause` plus everything reachable from them over the
    /// relationships of strictly earlier clauses.
    pub fn used_and_indirect_used_vars(&self, clause: ClauseId) -> Vec<VarId> {
        let mut result = self.used_variables(clause).to_vec();
        let edges: Vec<(VarId, VarId)> = self
            .relationships
            .range(..clause)
            .flat_map(|(_, rels)| rels.iter().map(|r| (r.left, r.right)))
            .collect();

        let mut queue: VecDeque<VarId> = result.iter().copied().collect();
        while let Some(current) = queue.pop_front() {
            for (left, right) in &edges {
                let other = if *left == current {
                    *right
                } else if *right == current {
                    *left
                } else {
                    continue;
                };
                if !result.contains(&other) {
                    result.push(other);
                    queue.push_back(other);
                }
            }
        }
        result
    }

    fn record(
        &mut self,
        info: ClauseInfo,
        used: Vec<VarId>,
        reachable: AvailableVariables,
        relationships: Vec<Relationship>,
    ) {
        let clause = info.clause;
        self.used_variables.insert(clause, used);
        self.reachable_variables.insert(clause, reachable);
        if !relationships.is_empty() {
            self.relationships.insert(clause, relationships);
        }
        self.clauses.push(info);
    }
}

/// Walks the stages of `query`, creating its variables in `vars`.
pub fn analyze_dependencies(
    query: &CypherQuery<'_>,
    vars: &mut VarArena,
) -> LoweringResult<VarDependencies> {
    let mut analyzer = DependencyAnalyzer {
        vars,
        scope: AvailableVariables::new(),
        deps: VarDependencies::default(),
        returned: false,
    };

    for stage in &query.stages {
        if analyzer.returned {
            return Err(LoweringError::invalid("RETURN must be the last clause"));
        }
        match stage {
            Stage::Match(m) => analyzer.analyze_match(m)?,
            Stage::With(w) => analyzer.analyze_with(w)?,
            Stage::Return(r) => analyzer.analyze_return(r)?,
        }
    }

    if !analyzer.returned {
        return Err(LoweringError::invalid("query must end with RETURN"));
    }
    log::debug!(
        "dependency analysis: {} stages, {} variables",
        analyzer.deps.clauses.len(),
        analyzer.vars.len()
    );
    Ok(analyzer.deps)
}

fn lookup(scope: &AvailableVariables, name: &str) -> LoweringResult<VarId> {
    scope
        .get(name)
        .ok_or_else(|| LoweringError::UndefinedVariable(name.to_string()))
}

fn push_unique(list: &mut Vec<VarId>, id: VarId) {
    if !list.contains(&id) {
        list.push(id);
    }
}

fn to_strings(labels: &[&str]) -> Vec<String> {
    labels.iter().map(|l| l.to_string()).collect()
}

/// What binding one comma-separated pattern produced.
#[derive(Default)]
struct PatternBindings {
    used: Vec<VarId>,
    /// Nodes the pattern created.
    introduced: Vec<VarId>,
    /// Inline properties of nodes an `OPTIONAL MATCH` reuses.
    conditions: Vec<Expr>,
    label_checks: Vec<(VarId, Vec<String>)>,
}

struct DependencyAnalyzer<'v> {
    vars: &'v mut VarArena,
    scope: AvailableVariables,
    deps: VarDependencies,
    returned: bool,
}

impl DependencyAnalyzer<'_> {
    fn convert(&self, expr: &ast::Expression<'_>, scope: &AvailableVariables) -> LoweringResult<Expr> {
        convert_expression(expr, &mut |name| lookup(scope, name))
    }

    fn analyze_match(&mut self, m: &MatchClause<'_>) -> LoweringResult<()> {
        if m.optional && m.path_patterns.len() > 1 && m.where_clause.is_some() {
            return Err(LoweringError::invalid(
                "WHERE on an OPTIONAL MATCH with several patterns is not supported",
            ));
        }

        let mut branches = Vec::with_capacity(m.path_patterns.len());
        for path in &m.path_patterns {
            let clause = ClauseId::new(path.position, ClauseKind::Match);
            let reachable = self.scope.clone();
            let mut bindings = PatternBindings::default();
            let mut relationships = vec![];

            let mut left = self.bind_node(&path.start, m.optional, &mut bindings)?;
            let mut total_hops = 0;
            for connected in &path.chain {
                let rel = &connected.relationship;
                let hops = match rel.variable_length {
                    None => 1,
                    Some(spec) => match spec.fixed_length() {
                        Some(k) if k > 0 => k,
                        _ => {
                            return Err(LoweringError::invalid(
                                "variable-length relationships need a fixed, non-zero hop count",
                            ))
                        }
                    },
                };
                if hops > 1 && rel.name.is_some() {
                    return Err(LoweringError::invalid(format!(
                        "relationship variable `{}` cannot bind a {}-hop pattern",
                        rel.name.unwrap_or_default(),
                        hops
                    )));
                }

                let labels = to_strings(&rel.labels);
                let rel_var = match rel.name {
                    Some(name) => {
                        if self.scope.get(name).is_some() {
                            return Err(LoweringError::invalid(format!(
                                "relationship variable `{}` is already bound",
                                name
                            )));
                        }
                        let id = self.vars.add_relationship(
                            name,
                            rel.position,
                            labels.clone(),
                            rel.direction,
                        );
                        self.scope = self.scope.extended(name, id);
                        push_unique(&mut bindings.used, id);
                        Some(id)
                    }
                    None => None,
                };

                let mut hop_left = left;
                for i in 1..hops {
                    let mid = self.vars.add_intermediate_node(rel.position, i);
                    relationships.push(Relationship {
                        left: hop_left,
                        right: mid,
                        rel: None,
                        labels: labels.clone(),
                        direction: rel.direction,
                    });
                    push_unique(&mut bindings.used, mid);
                    hop_left = mid;
                }

                let right = self.bind_node(&connected.node, m.optional, &mut bindings)?;
                relationships.push(Relationship {
                    left: hop_left,
                    right,
                    rel: rel_var,
                    labels,
                    direction: rel.direction,
                });
                total_hops += hops;
                left = right;
            }

            if let Some(name) = path.path_variable {
                if self.scope.get(name).is_some() {
                    return Err(LoweringError::invalid(format!(
                        "path variable `{}` is already bound",
                        name
                    )));
                }
                let id = self.vars.add_path(name, path.position, Some(total_hops));
                self.scope = self.scope.extended(name, id);
                push_unique(&mut bindings.used, id);
            }

            let mut info = ClauseInfo::new(
                clause,
                StageRole::MatchBranch {
                    optional: m.optional,
                },
            );
            info.where_condition = Expr::and_all(bindings.conditions);
            for v in info.where_condition.iter().flat_map(Expr::variables) {
                push_unique(&mut bindings.used, v);
            }
            if !bindings.label_checks.is_empty() {
                self.deps.label_checks.insert(clause, bindings.label_checks);
            }
            branches.push((info, bindings.used, reachable, relationships));
        }

        if let Some(where_clause) = &m.where_clause {
            let condition = self.convert(&where_clause.conditions, &self.scope)?;
            if branches.len() == 1 {
                if let Some((info, used, _, _)) = branches.first_mut() {
                    for v in condition.variables() {
                        push_unique(used, v);
                    }
                    info.where_condition = Some(Expr::conjoin(info.where_condition.take(), condition));
                }
            } else {
                for (info, used, reachable, relationships) in branches.drain(..) {
                    self.deps.record(info, used, reachable, relationships);
                }
                let clause = ClauseId::new(where_clause.position, ClauseKind::Match);
                let mut info = ClauseInfo::new(clause, StageRole::MatchFilter);
                let used = condition.variables();
                info.where_condition = Some(condition);
                self.deps.record(info, used, self.scope.clone(), vec![]);
            }
        }

        for (info, used, reachable, relationships) in branches {
            self.deps.record(info, used, reachable, relationships);
        }
        Ok(())
    }

    fn bind_node(
        &mut self,
        node: &NodePattern<'_>,
        optional: bool,
        bindings: &mut PatternBindings,
    ) -> LoweringResult<VarId> {
        let labels = to_strings(&node.labels);
        let existing = node.name.and_then(|name| self.scope.get(name));
        let id = match existing {
            Some(existing) => {
                if self.vars.var_type(existing) != VarType::Node {
                    return Err(LoweringError::invalid(format!(
                        "`{}` is not a node",
                        node.name.unwrap_or_default()
                    )));
                }
                existing
            }
            None => {
                let id = self.vars.add_node(node.name, node.position, labels.clone());
                if let Some(name) = node.name {
                    self.scope = self.scope.extended(name, id);
                }
                bindings.introduced.push(id);
                id
            }
        };

        let mut predicates = Vec::with_capacity(node.properties.len());
        for kv in &node.properties {
            predicates.push(InlinePredicate {
                key: kv.key.to_string(),
                value: self.convert(&kv.value, &self.scope)?,
            });
        }

        let bound_earlier = existing.is_some() && !bindings.introduced.contains(&id);
        if optional && bound_earlier {
            // the earlier clause owns the node: restrict only this pattern
            let known = self.vars.get(id)?.labels().to_vec();
            let extra: Vec<String> = labels.into_iter().filter(|l| !known.contains(l)).collect();
            if !extra.is_empty() {
                bindings.label_checks.push((id, extra));
            }
            bindings.conditions.extend(predicates.into_iter().map(|predicate| {
                Expr::eq(
                    Expr::PropertyAccess(PropertyAccess {
                        base: Box::new(Expr::Variable(id)),
                        key: predicate.key,
                    }),
                    predicate.value,
                )
            }));
        } else {
            if existing.is_some() {
                self.vars.add_labels(id, &labels)?;
            }
            self.vars.add_predicates(id, predicates)?;
        }
        push_unique(&mut bindings.used, id);
        Ok(id)
    }

    fn analyze_with(&mut self, w: &WithClause<'_>) -> LoweringResult<()> {
        let clause = ClauseId::new(w.position, ClauseKind::With);
        let pre = self.scope.clone();
        let mut used = vec![];
        let mut info = ClauseInfo::new(clause, StageRole::Projection);
        let mut bindings: Vec<(String, VarId)> = vec![];

        for item in &w.items {
            let expr = self.convert(&item.expression, &pre)?;
            for v in expr.variables() {
                push_unique(&mut used, v);
            }
            let bare = match (&item.expression, &expr) {
                (ast::Expression::Variable(name), Expr::Variable(id))
                    if item.alias.is_none_or(|alias| alias == *name) =>
                {
                    Some((name.to_string(), *id))
                }
                _ => None,
            };
            let (name, id) = match (bare, item.alias) {
                (Some(binding), _) => binding,
                (None, Some(alias)) => {
                    let id = self.vars.add_alias(alias, item.position, expr, clause);
                    push_unique(&mut used, id);
                    (alias.to_string(), id)
                }
                (None, None) => {
                    return Err(LoweringError::invalid(format!(
                        "expression `{}` in WITH must be aliased",
                        item.text
                    )))
                }
            };
            if bindings.iter().any(|(n, _)| *n == name) {
                return Err(LoweringError::invalid(format!(
                    "`{}` is projected more than once",
                    name
                )));
            }
            info.projections.push(Expr::Variable(id));
            bindings.push((name, id));
        }

        let order_scope = bindings
            .iter()
            .fold(pre.clone(), |scope, (name, id)| scope.extended(name, *id));
        for item in &w.order_by {
            let key = self.convert(&item.expression, &order_scope)?;
            for v in key.variables() {
                push_unique(&mut used, v);
            }
            info.order_by.push((key, item.order));
        }
        info.distinct = w.distinct;
        info.skip = self.convert_paging(w.skip.as_ref())?;
        info.limit = self.convert_paging(w.limit.as_ref())?;

        self.scope = AvailableVariables::replaced(bindings);
        self.deps.record(info, used, pre, vec![]);

        if let Some(where_clause) = &w.where_clause {
            let filter = ClauseId::new(where_clause.position, ClauseKind::With);
            let condition = self.convert(&where_clause.conditions, &self.scope)?;
            let mut info = ClauseInfo::new(filter, StageRole::ProjectionFilter);
            let used = condition.variables();
            info.where_condition = Some(condition);
            self.deps.record(info, used, self.scope.clone(), vec![]);
        }
        Ok(())
    }

    fn analyze_return(&mut self, r: &ReturnClause<'_>) -> LoweringResult<()> {
        let clause = ClauseId::new(r.position, ClauseKind::Return);
        let pre = self.scope.clone();
        let mut used = vec![];
        let mut info = ClauseInfo::new(clause, StageRole::Return);
        let mut scope = pre.clone();

        for item in &r.items {
            let expr = self.convert(&item.expression, &pre)?;
            for v in expr.variables() {
                push_unique(&mut used, v);
            }
            let projection = match (item.alias, &item.expression, expr) {
                (None, ast::Expression::Variable(_), Expr::Variable(id)) => Expr::Variable(id),
                (Some(alias), ast::Expression::Variable(name), Expr::Variable(id))
                    if alias == *name =>
                {
                    Expr::Variable(id)
                }
                (Some(alias), _, expr) => {
                    let id = self.vars.add_alias(alias, item.position, expr, clause);
                    push_unique(&mut used, id);
                    scope = scope.extended(alias, id);
                    Expr::Variable(id)
                }
                (None, _, expr) => Expr::Aliased(AliasedExpr {
                    name: item.text.to_string(),
                    expr: Box::new(expr),
                }),
            };
            info.projections.push(projection);
        }

        for item in &r.order_by {
            let key = self.convert(&item.expression, &scope)?;
            for v in key.variables() {
                push_unique(&mut used, v);
            }
            info.order_by.push((key, item.order));
        }
        info.distinct = r.distinct;
        info.skip = self.convert_paging(r.skip.as_ref())?;
        info.limit = self.convert_paging(r.limit.as_ref())?;

        self.deps.return_exprs = info.projections.clone();
        self.scope = scope;
        self.deps.record(info, used, pre, vec![]);
        self.returned = true;
        Ok(())
    }

    // SKIP and LIMIT cannot see any variable.
    fn convert_paging(&self, expr: Option<&ast::Expression<'_>>) -> LoweringResult<Option<Expr>> {
        expr.map(|e| self.convert(e, &AvailableVariables::new()))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::open_cypher_parser::parse_query;

    fn analyze(query: &str) -> LoweringResult<(VarDependencies, VarArena)> {
        let ast = parse_query(query).map_err(LoweringError::from)?;
        let mut vars = VarArena::new();
        let deps = analyze_dependencies(&ast, &mut vars)?;
        Ok((deps, vars))
    }

    fn match_clauses(deps: &VarDependencies) -> Vec<ClauseId> {
        deps.clauses()
            .iter()
            .filter(|c| matches!(c.role, StageRole::MatchBranch { .. }))
            .map(|c| c.clause)
            .collect()
    }

    #[test]
    fn test_indirect_dependency_closure() {
        let (deps, _) =
            analyze("MATCH (a)--(b) MATCH (b)--(c) MATCH (a)--(d) RETURN 42").unwrap();
        let third = match_clauses(&deps)[2];
        assert_eq!(deps.used_and_indirect_used_vars(third).len(), 4);

        let (deps, _) =
            analyze("MATCH (a)--(b) MATCH (e)--(f) MATCH (a)--(d) RETURN 42").unwrap();
        let third = match_clauses(&deps)[2];
        assert_eq!(deps.used_and_indirect_used_vars(third).len(), 3);
    }

    #[test]
    fn test_shared_node_uses_one_var() {
        let (deps, vars) = analyze("MATCH (a:Person)-[:KNOWS]->(b)<-[:KNOWS]-(a) RETURN b").unwrap();
        let clause = match_clauses(&deps)[0];
        let rels = deps.relationships(clause);
        assert_eq!(rels.len(), 2);
        assert_eq!(rels[0].right, rels[1].left);
        assert_eq!(rels[0].left, rels[1].right);
        assert_eq!(deps.used_variables(clause).len(), 2);
        assert_eq!(vars.unique_name(rels[0].left), "a_6");
    }

    #[test]
    fn test_with_replaces_scope_and_return_extends() {
        let err = analyze("MATCH (a)--(b) WITH a RETURN b").unwrap_err();
        assert_eq!(err, LoweringError::UndefinedVariable("b".to_string()));

        let (deps, _) = analyze("MATCH (a) RETURN a.name AS n ORDER BY n").unwrap();
        let ret = deps.clauses().last().unwrap();
        assert_eq!(ret.role, StageRole::Return);
        assert_eq!(ret.order_by.len(), 1);
        assert_eq!(deps.return_exprs().len(), 1);
    }

    #[test]
    fn test_where_placement() {
        let (deps, _) = analyze("MATCH (a), (b) WHERE a.x = b.x RETURN a").unwrap();
        let roles: Vec<_> = deps.clauses().iter().map(|c| c.role).collect();
        assert_eq!(
            roles,
            vec![
                StageRole::MatchBranch { optional: false },
                StageRole::MatchBranch { optional: false },
                StageRole::MatchFilter,
                StageRole::Return
            ]
        );

        let (deps, _) = analyze("MATCH (a)-->(b) WHERE a.x = 1 RETURN a").unwrap();
        assert!(deps.clauses()[0].where_condition.is_some());

        let (deps, _) = analyze("MATCH (a) WITH a WHERE a.x = 1 RETURN a").unwrap();
        assert_eq!(deps.clauses()[2].role, StageRole::ProjectionFilter);
    }

    #[test]
    fn test_fixed_length_expands_into_hops() {
        let (deps, vars) = analyze("MATCH p = (a)-[:KNOWS*3]->(b) RETURN length(p)").unwrap();
        let clause = match_clauses(&deps)[0];
        let rels = deps.relationships(clause);
        assert_eq!(rels.len(), 3);
        assert_eq!(vars.unique_name(rels[0].right), "_anon13_1");
        let path = deps
            .used_variables(clause)
            .iter()
            .copied()
            .find(|v| vars.var_type(*v) == VarType::Path)
            .unwrap();
        assert!(matches!(
            vars.get(path).unwrap().kind,
            crate::query_planner::variables::VarKind::Path {
                fixed_length: Some(3)
            }
        ));
    }

    #[test]
    fn test_rejected_shapes() {
        for query in [
            "MATCH (a)-[:KNOWS*1..3]->(b) RETURN a",
            "MATCH (a)-[r:KNOWS*2]->(b) RETURN a",
            "MATCH (a) WITH a.name RETURN a",
            "MATCH (a) RETURN a MATCH (b) RETURN b",
            "MATCH (a)",
            "OPTIONAL MATCH (a), (b) WHERE a.x = b.x RETURN a",
        ] {
            assert!(
                matches!(analyze(query), Err(LoweringError::InvalidExpression(_))),
                "{} should be rejected",
                query
            );
        }
    }

    #[test]
    fn test_optional_match_restricts_bound_nodes_locally() {
        let (deps, vars) =
            analyze("MATCH (a:Person) OPTIONAL MATCH (a:Employee {name: 'Ann'})-->(b) RETURN b")
                .unwrap();
        let clauses = match_clauses(&deps);
        let a = deps.used_variables(clauses[0])[0];
        assert!(vars.predicates(a).is_empty());
        assert_eq!(vars.get(a).unwrap().labels(), &["Person"]);

        let optional = deps.clause_info(clauses[1]).unwrap();
        assert!(optional.where_condition.is_some());
        assert_eq!(
            deps.label_checks(clauses[1]),
            &[(a, vec!["Employee".to_string()])]
        );
    }

    #[test]
    fn test_later_match_merges_into_bound_node() {
        let (deps, vars) = analyze("MATCH (a) MATCH (a:Person {name: 'x'}) RETURN a").unwrap();
        let clauses = match_clauses(&deps);
        let a = deps.used_variables(clauses[0])[0];
        assert_eq!(vars.get(a).unwrap().labels(), &["Person"]);
        assert_eq!(vars.predicates(a).len(), 1);
        assert!(deps.label_checks(clauses[1]).is_empty());
        assert!(deps.clause_info(clauses[1]).unwrap().where_condition.is_none());
    }

    #[test]
    fn test_inline_properties_become_predicates() {
        let (_, vars) = analyze("MATCH (a {name: 'Alice'}) RETURN a").unwrap();
        let a = vars.ids().next().unwrap();
        assert_eq!(vars.predicates(a).len(), 1);
        assert_eq!(vars.predicates(a)[0].key, "name");
    }
}
