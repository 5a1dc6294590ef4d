//! Scope Analysis Module
//!
//! Builds the nested scope tree of a parsed query and extracts the table and
//! column references each scope makes. Physical table references are separated
//! from Common Table Expressions, derived tables and table functions, which are
//! query-local and never have to exist in the live schema.
//!
//! Scopes live in an arena (`ScopeTree`) and refer to each other by index. The
//! tree is built once per validation call and dropped with it.

use crate::dialects;
use crate::error::Result;
use crate::schema::ValidatorOptions;
use serde::Serialize;
use sqlparser::ast::{
    Expr, ObjectName, OneOrManyWithParens, Query, Select, SelectItem, SetExpr, Statement,
    TableFactor, TableWithJoins, Visit, Visitor,
};
use std::collections::HashMap;
use std::ops::ControlFlow;
use tracing::trace;

/// Index of a scope inside its `ScopeTree`
pub type ScopeId = usize;

/// Type of scope in a SQL query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScopeType {
    /// Root scope of a statement
    Root,
    /// Subquery scope (e.g., WHERE x IN (SELECT ...))
    Subquery,
    /// Derived table scope (e.g., FROM (SELECT ...) AS t)
    DerivedTable,
    /// Common Table Expression scope
    Cte,
    /// One branch of a UNION/INTERSECT/EXCEPT
    SetOperation,
}

/// What a named source in a scope resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    /// A physical table, as written (possibly qualified)
    Table(Vec<String>),
    /// A CTE visible from this scope
    Cte(String),
    /// A subquery in FROM; its columns are unknown to the validator
    Derived(Option<ScopeId>),
    /// A table-valued function, UNNEST, LATERAL VIEW and the like
    Function,
}

/// Clause of a query a column reference was written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Clause {
    /// Select list, DISTINCT ON and TOP
    Projection,
    /// Join conditions, table function arguments, lateral views
    From,
    /// WHERE, PREWHERE and CONNECT BY
    Where,
    GroupBy,
    Having,
    Qualify,
    /// ORDER BY and SORT BY
    OrderBy,
    /// LIMIT, OFFSET, FETCH and LIMIT BY
    Limit,
    /// VALUES, window definitions, DML statements and anything else
    Other,
}

impl Clause {
    /// Whether an unqualified name here may stand for a projection alias
    pub fn accepts_projection_alias(self) -> bool {
        matches!(self, Clause::GroupBy | Clause::Having | Clause::OrderBy)
    }
}

/// A named source (table, CTE, derived table, function) in a scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    /// Name the source is addressed by: its alias, else its base name
    pub name: String,
    /// Explicit alias, if one was written
    pub alias: Option<String>,
    pub kind: SourceKind,
}

impl SourceInfo {
    /// Whether the source must exist in the live schema
    pub fn is_physical(&self) -> bool {
        matches!(self.kind, SourceKind::Table(_))
    }

    /// Name components of a physical source
    pub fn table_parts(&self) -> Option<&[String]> {
        match &self.kind {
            SourceKind::Table(parts) => Some(parts),
            _ => None,
        }
    }
}

/// A physical table mention
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    /// Name components as written, e.g. `["public", "users"]`
    pub parts: Vec<String>,
    pub scope: ScopeId,
    /// Walk order, which follows the query text
    pub position: usize,
}

/// A column reference found in a scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    /// The table/alias qualifier components (empty if unqualified)
    pub qualifier: Vec<String>,
    /// The column name
    pub name: String,
    pub scope: ScopeId,
    pub clause: Clause,
    pub position: usize,
}

impl ColumnRef {
    pub fn is_qualified(&self) -> bool {
        !self.qualifier.is_empty()
    }
}

/// Represents a scope in a SQL query
///
/// A scope is the context of a SELECT statement and its sources.
/// Scopes nest (subqueries, CTEs, derived tables) and form a tree.
#[derive(Debug, Clone)]
pub struct Scope {
    pub id: ScopeId,

    /// Type of this scope relative to its parent
    pub scope_type: ScopeType,

    pub parent: Option<ScopeId>,

    /// Child scopes in walk order
    pub children: Vec<ScopeId>,

    /// Sources in FROM/JOIN order
    pub sources: Vec<SourceInfo>,

    /// CTEs defined by this scope's WITH clause
    pub cte_names: Vec<String>,

    /// Output aliases from the projection (`SELECT a AS b`)
    pub projection_aliases: Vec<String>,

    /// Whether this scope may reference sources of enclosing scopes
    /// (true for subqueries and LATERAL derived tables, inherited by children)
    pub can_be_correlated: bool,

    /// Whether the projection contains `*` or `t.*`
    pub has_wildcard: bool,
}

impl Scope {
    fn new(id: ScopeId, scope_type: ScopeType, parent: Option<ScopeId>) -> Self {
        Self {
            id,
            scope_type,
            parent,
            children: Vec::new(),
            sources: Vec::new(),
            cte_names: Vec::new(),
            projection_aliases: Vec::new(),
            can_be_correlated: scope_type == ScopeType::Subquery,
            has_wildcard: false,
        }
    }

    pub fn is_root(&self) -> bool {
        self.scope_type == ScopeType::Root
    }

    pub fn is_subquery(&self) -> bool {
        self.scope_type == ScopeType::Subquery
    }

    pub fn is_derived_table(&self) -> bool {
        self.scope_type == ScopeType::DerivedTable
    }

    pub fn is_cte(&self) -> bool {
        self.scope_type == ScopeType::Cte
    }

    pub fn is_union(&self) -> bool {
        self.scope_type == ScopeType::SetOperation
    }

    /// Physical sources of this scope
    pub fn physical_sources(&self) -> impl Iterator<Item = &SourceInfo> {
        self.sources.iter().filter(|s| s.is_physical())
    }

    /// Folded source name -> source. Earlier sources win on duplicates.
    pub fn alias_map(&self, options: &ValidatorOptions) -> HashMap<String, &SourceInfo> {
        let mut map = HashMap::new();
        for source in &self.sources {
            map.entry(options.fold(&source.name)).or_insert(source);
        }
        map
    }

    /// Find the source a column qualifier refers to.
    ///
    /// A single-part qualifier matches aliases first, then table and CTE names.
    /// A multi-part qualifier (`public.users.id`) matches physical tables whose
    /// trailing name components agree.
    pub fn find_source(&self, qualifier: &[String], options: &ValidatorOptions) -> Option<&SourceInfo> {
        match qualifier {
            [] => None,
            [single] => {
                let wanted = options.fold(single);
                self.sources
                    .iter()
                    .find(|s| s.alias.as_deref().is_some_and(|a| options.fold(a) == wanted))
                    .or_else(|| {
                        self.sources.iter().find(|s| match &s.kind {
                            SourceKind::Table(parts) => parts
                                .last()
                                .is_some_and(|p| options.fold(p) == wanted),
                            SourceKind::Cte(name) => options.fold(name) == wanted,
                            _ => s.alias.is_none() && options.fold(&s.name) == wanted,
                        })
                    })
            }
            multi => self.sources.iter().find(|s| match &s.kind {
                SourceKind::Table(parts) if parts.len() >= multi.len() => parts
                    [parts.len() - multi.len()..]
                    .iter()
                    .zip(multi)
                    .all(|(a, b)| options.fold(a) == options.fold(b)),
                _ => false,
            }),
        }
    }
}

/// Arena of scopes for every statement of one query text
#[derive(Debug, Clone, Default)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
    tables: Vec<TableRef>,
    columns: Vec<ColumnRef>,
}

impl ScopeTree {
    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id]
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// One root per statement
    pub fn roots(&self) -> impl Iterator<Item = &Scope> {
        self.scopes.iter().filter(|s| s.parent.is_none())
    }

    /// Physical table references in walk order (not deduplicated)
    pub fn tables(&self) -> &[TableRef] {
        &self.tables
    }

    /// Column references in walk order
    pub fn columns(&self) -> &[ColumnRef] {
        &self.columns
    }

    /// Traverse all scopes (depth-first pre-order from each root)
    pub fn traverse(&self) -> Vec<&Scope> {
        let mut result = Vec::with_capacity(self.scopes.len());
        let mut stack: Vec<ScopeId> = self.roots().map(|s| s.id).collect();
        stack.reverse();
        while let Some(id) = stack.pop() {
            let scope = &self.scopes[id];
            result.push(scope);
            stack.extend(scope.children.iter().rev());
        }
        result
    }

    /// Scopes whose sources a reference in `id` can see: the scope itself, then
    /// its parents for as long as the current scope can be correlated.
    pub fn resolution_chain(&self, id: ScopeId) -> Vec<&Scope> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(scope_id) = current {
            let scope = &self.scopes[scope_id];
            chain.push(scope);
            current = if scope.can_be_correlated { scope.parent } else { None };
        }
        chain
    }

    /// Resolve a qualifier against the resolution chain of `id`
    pub fn find_source(
        &self,
        id: ScopeId,
        qualifier: &[String],
        options: &ValidatorOptions,
    ) -> Option<&SourceInfo> {
        self.resolution_chain(id)
            .into_iter()
            .find_map(|scope| scope.find_source(qualifier, options))
    }
}

/// Parse `sql` and build its scope tree.
pub fn scopes(sql: &str, dialect: Option<&str>, options: &ValidatorOptions) -> Result<ScopeTree> {
    let statements = dialects::parse(sql, dialect)?;
    Ok(build_scope(&statements, options))
}

/// Build the scope tree for already parsed statements.
pub fn build_scope(statements: &[Statement], options: &ValidatorOptions) -> ScopeTree {
    let mut builder = ScopeBuilder {
        options,
        tree: ScopeTree::default(),
        visible_ctes: Vec::new(),
        position: 0,
    };
    for statement in statements {
        builder.walk_statement(statement);
    }
    trace!(
        scopes = builder.tree.scopes.len(),
        tables = builder.tree.tables.len(),
        columns = builder.tree.columns.len(),
        "built scope tree"
    );
    builder.tree
}

struct ScopeBuilder<'a> {
    options: &'a ValidatorOptions,
    tree: ScopeTree,
    /// Folded names of CTEs visible at the current walk position
    visible_ctes: Vec<String>,
    position: usize,
}

impl ScopeBuilder<'_> {
    fn branch(&mut self, parent: Option<ScopeId>, scope_type: ScopeType) -> ScopeId {
        let id = self.tree.scopes.len();
        let mut scope = Scope::new(id, scope_type, parent);
        if let Some(parent) = parent {
            scope.can_be_correlated |= self.tree.scopes[parent].can_be_correlated;
            self.tree.scopes[parent].children.push(id);
        }
        self.tree.scopes.push(scope);
        id
    }

    fn next_position(&mut self) -> usize {
        let position = self.position;
        self.position += 1;
        position
    }

    fn is_visible_cte(&self, name: &str) -> bool {
        let folded = self.options.fold(name);
        self.visible_ctes.iter().any(|cte| *cte == folded)
    }

    fn walk_statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Query(query) => {
                let root = self.branch(None, ScopeType::Root);
                self.walk_query(query, root);
            }
            // The created object is not a reference; only its definition is.
            Statement::CreateView { query, .. } => {
                let root = self.branch(None, ScopeType::Root);
                self.walk_query(query, root);
            }
            Statement::CreateTable(create) => {
                let root = self.branch(None, ScopeType::Root);
                if let Some(query) = &create.query {
                    self.walk_query(query, root);
                }
            }
            other => {
                let root = self.branch(None, ScopeType::Root);
                self.collect(other, root, CollectMode::Statement, Clause::Other);
            }
        }
    }

    fn walk_query(&mut self, query: &Query, scope: ScopeId) {
        let cte_mark = self.visible_ctes.len();

        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                let name = cte.alias.name.value.clone();
                let folded = self.options.fold(&name);
                if with.recursive {
                    self.visible_ctes.push(folded.clone());
                }
                let cte_scope = self.branch(Some(scope), ScopeType::Cte);
                self.walk_query(&cte.query, cte_scope);
                if !with.recursive {
                    self.visible_ctes.push(folded);
                }
                self.tree.scopes[scope].cte_names.push(name);
            }
        }

        self.walk_set_expr(&query.body, scope);

        // ORDER BY and LIMIT on a set operation name output columns, not source columns
        let mode = if matches!(query.body.as_ref(), SetExpr::Select(_)) {
            CollectMode::Expressions
        } else {
            CollectMode::SubqueriesOnly
        };
        if let Some(order_by) = &query.order_by {
            self.collect(order_by, scope, mode, Clause::OrderBy);
        }
        self.collect(&query.limit_by, scope, mode, Clause::Limit);
        if let Some(limit) = &query.limit {
            self.collect(limit, scope, mode, Clause::Limit);
        }
        if let Some(offset) = &query.offset {
            self.collect(offset, scope, mode, Clause::Limit);
        }
        if let Some(fetch) = &query.fetch {
            self.collect(fetch, scope, mode, Clause::Limit);
        }

        self.visible_ctes.truncate(cte_mark);
    }

    fn walk_set_expr(&mut self, body: &SetExpr, scope: ScopeId) {
        match body {
            SetExpr::Select(select) => self.walk_select(select, scope),
            SetExpr::Query(query) => self.walk_query(query, scope),
            SetExpr::SetOperation { left, right, .. } => {
                for side in [left, right] {
                    let branch = self.branch(Some(scope), ScopeType::SetOperation);
                    self.walk_set_expr(side, branch);
                }
            }
            SetExpr::Values(values) => {
                self.collect(values, scope, CollectMode::Expressions, Clause::Other)
            }
            SetExpr::Insert(statement) | SetExpr::Update(statement) => {
                self.collect(statement, scope, CollectMode::Statement, Clause::Other)
            }
            SetExpr::Table(table) => {
                if let Some(table_name) = &table.table_name {
                    let mut parts = Vec::with_capacity(2);
                    if let Some(schema_name) = &table.schema_name {
                        parts.push(schema_name.clone());
                    }
                    parts.push(table_name.clone());
                    self.add_table_source(parts, None, scope);
                }
            }
            #[allow(unreachable_patterns)]
            _ => {}
        }
    }

    fn walk_select(&mut self, select: &Select, scope: ScopeId) {
        let exprs = CollectMode::Expressions;

        self.collect(&select.top, scope, exprs, Clause::Projection);
        self.collect(&select.distinct, scope, exprs, Clause::Projection);
        for item in &select.projection {
            match item {
                SelectItem::UnnamedExpr(expr) => {
                    self.collect(expr, scope, exprs, Clause::Projection)
                }
                SelectItem::ExprWithAlias { expr, alias } => {
                    self.collect(expr, scope, exprs, Clause::Projection);
                    self.tree.scopes[scope]
                        .projection_aliases
                        .push(alias.value.clone());
                }
                SelectItem::Wildcard(..) | SelectItem::QualifiedWildcard(..) => {
                    self.tree.scopes[scope].has_wildcard = true;
                }
            }
        }

        for table in &select.from {
            self.walk_table_with_joins(table, scope);
        }

        for view in &select.lateral_views {
            self.collect(&view.lateral_view, scope, exprs, Clause::From);
            let name = view
                .lateral_view_name
                .0
                .last()
                .map(|i| i.value.clone())
                .unwrap_or_default();
            self.add_source(scope, name, None, SourceKind::Function);
        }

        if let Some(prewhere) = &select.prewhere {
            self.collect(prewhere, scope, exprs, Clause::Where);
        }
        if let Some(selection) = &select.selection {
            self.collect(selection, scope, exprs, Clause::Where);
        }
        self.collect(&select.connect_by, scope, exprs, Clause::Where);
        self.collect(&select.group_by, scope, exprs, Clause::GroupBy);
        self.collect(&select.cluster_by, scope, exprs, Clause::Other);
        self.collect(&select.distribute_by, scope, exprs, Clause::Other);
        self.collect(&select.sort_by, scope, exprs, Clause::OrderBy);
        if let Some(having) = &select.having {
            self.collect(having, scope, exprs, Clause::Having);
        }
        self.collect(&select.named_window, scope, exprs, Clause::Other);
        if let Some(qualify) = &select.qualify {
            self.collect(qualify, scope, exprs, Clause::Qualify);
        }
    }

    fn walk_table_with_joins(&mut self, table: &TableWithJoins, scope: ScopeId) {
        self.walk_table_factor(&table.relation, scope);
        for join in &table.joins {
            self.walk_table_factor(&join.relation, scope);
            self.collect(&join.join_operator, scope, CollectMode::Expressions, Clause::From);
        }
    }

    fn walk_table_factor(&mut self, factor: &TableFactor, scope: ScopeId) {
        match factor {
            TableFactor::Table {
                name, alias, args, ..
            } => {
                let alias = alias.as_ref().map(|a| a.name.value.clone());
                if args.is_some() {
                    // `FROM generate_series(1, 10) AS g` parses as a table with arguments
                    self.collect(args, scope, CollectMode::Expressions, Clause::From);
                    let name = alias.clone().unwrap_or_else(|| last_part(name));
                    self.add_source(scope, name, alias, SourceKind::Function);
                } else {
                    self.add_table_source(object_name_parts(name), alias, scope);
                }
            }
            TableFactor::Derived {
                lateral,
                subquery,
                alias,
            } => {
                let derived = self.branch(Some(scope), ScopeType::DerivedTable);
                if *lateral {
                    self.tree.scopes[derived].can_be_correlated = true;
                }
                self.walk_query(subquery, derived);
                let alias = alias.as_ref().map(|a| a.name.value.clone());
                let name = alias.clone().unwrap_or_default();
                self.add_source(scope, name, alias, SourceKind::Derived(Some(derived)));
            }
            TableFactor::NestedJoin {
                table_with_joins,
                alias,
            } => {
                self.walk_table_with_joins(table_with_joins, scope);
                if let Some(alias) = alias {
                    let alias = alias.name.value.clone();
                    self.add_source(scope, alias.clone(), Some(alias), SourceKind::Derived(None));
                }
            }
            TableFactor::Pivot { table, alias, .. } | TableFactor::Unpivot { table, alias, .. } => {
                self.walk_table_factor(table, scope);
                if let Some(alias) = alias {
                    let alias = alias.name.value.clone();
                    self.add_source(scope, alias.clone(), Some(alias), SourceKind::Function);
                }
            }
            other => {
                self.collect(other, scope, CollectMode::Expressions, Clause::From);
                let alias = table_factor_alias(other);
                let name = alias.clone().unwrap_or_default();
                self.add_source(scope, name, alias, SourceKind::Function);
            }
        }
    }

    /// Register a table source, deciding between a visible CTE and a physical table.
    fn add_table_source(&mut self, parts: Vec<String>, alias: Option<String>, scope: ScopeId) {
        let base = parts.last().cloned().unwrap_or_default();
        let name = alias.clone().unwrap_or_else(|| base.clone());

        if parts.len() == 1 && self.is_visible_cte(&base) {
            self.add_source(scope, name, alias, SourceKind::Cte(base));
            return;
        }

        let position = self.next_position();
        self.tree.tables.push(TableRef {
            parts: parts.clone(),
            scope,
            position,
        });
        self.add_source(scope, name, alias, SourceKind::Table(parts));
    }

    fn add_source(&mut self, scope: ScopeId, name: String, alias: Option<String>, kind: SourceKind) {
        self.tree.scopes[scope]
            .sources
            .push(SourceInfo { name, alias, kind });
    }

    /// Visit `node` without crossing into nested queries, then walk each nested
    /// query as a child subquery scope.
    fn collect<V: Visit>(&mut self, node: &V, scope: ScopeId, mode: CollectMode, clause: Clause) {
        let mut collector = Collector::new(mode, self.options);
        let _ = node.visit(&mut collector);

        for found in collector.found {
            match found {
                Found::Column { qualifier, name } => {
                    let position = self.next_position();
                    self.tree.columns.push(ColumnRef {
                        qualifier,
                        name,
                        scope,
                        clause,
                        position,
                    });
                }
                Found::Subquery(query) => {
                    let child = self.branch(Some(scope), ScopeType::Subquery);
                    self.walk_query(&query, child);
                }
                Found::Relation { parts, alias } => self.add_table_source(parts, alias, scope),
                Found::Opaque { alias } => {
                    let name = alias.clone().unwrap_or_default();
                    self.add_source(scope, name, alias, SourceKind::Function);
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CollectMode {
    /// Columns and nested queries
    Expressions,
    /// Nested queries only
    SubqueriesOnly,
    /// Columns, nested queries and table sources (DML and other statements)
    Statement,
}

enum Found {
    Column {
        qualifier: Vec<String>,
        name: String,
    },
    Subquery(Box<Query>),
    Relation {
        parts: Vec<String>,
        alias: Option<String>,
    },
    Opaque {
        alias: Option<String>,
    },
}

/// Collects references at the current scope level. Everything below a nested
/// `Query` is skipped here; the nested query is cloned out and walked on its own.
struct Collector<'a> {
    mode: CollectMode,
    options: &'a ValidatorOptions,
    /// Nesting depth of queries below the visited node
    depth: usize,
    /// The next relation visit belongs to a table factor already recorded
    factor_relation_pending: bool,
    lambda_params: Vec<Vec<String>>,
    found: Vec<Found>,
}

impl<'a> Collector<'a> {
    fn new(mode: CollectMode, options: &'a ValidatorOptions) -> Self {
        Self {
            mode,
            options,
            depth: 0,
            factor_relation_pending: false,
            lambda_params: Vec::new(),
            found: Vec::new(),
        }
    }

    fn records_columns(&self) -> bool {
        self.depth == 0 && self.mode != CollectMode::SubqueriesOnly
    }

    fn records_sources(&self) -> bool {
        self.depth == 0 && self.mode == CollectMode::Statement
    }

    fn is_lambda_param(&self, name: &str) -> bool {
        let folded = self.options.fold(name);
        self.lambda_params
            .iter()
            .flatten()
            .any(|p| self.options.fold(p) == folded)
    }

    fn push_column(&mut self, mut parts: Vec<String>) {
        let Some(first) = parts.first() else {
            return;
        };
        if first.starts_with('@') || self.is_lambda_param(first) {
            return;
        }
        if let Some(name) = parts.pop() {
            self.found.push(Found::Column {
                qualifier: parts,
                name,
            });
        }
    }
}

impl Visitor for Collector<'_> {
    type Break = ();

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<Self::Break> {
        if self.depth == 0 {
            self.found.push(Found::Subquery(Box::new(query.clone())));
        }
        self.depth += 1;
        ControlFlow::Continue(())
    }

    fn post_visit_query(&mut self, _query: &Query) -> ControlFlow<Self::Break> {
        self.depth = self.depth.saturating_sub(1);
        ControlFlow::Continue(())
    }

    fn pre_visit_table_factor(&mut self, factor: &TableFactor) -> ControlFlow<Self::Break> {
        if !self.records_sources() {
            return ControlFlow::Continue(());
        }
        match factor {
            TableFactor::Table {
                name,
                alias,
                args: None,
                ..
            } => {
                self.found.push(Found::Relation {
                    parts: object_name_parts(name),
                    alias: alias.as_ref().map(|a| a.name.value.clone()),
                });
                self.factor_relation_pending = true;
            }
            TableFactor::Table { alias, .. } => {
                self.found.push(Found::Opaque {
                    alias: alias.as_ref().map(|a| a.name.value.clone()),
                });
                self.factor_relation_pending = true;
            }
            // The subquery itself is picked up by `pre_visit_query`
            other => self.found.push(Found::Opaque {
                alias: table_factor_alias(other),
            }),
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_relation(&mut self, relation: &ObjectName) -> ControlFlow<Self::Break> {
        if std::mem::take(&mut self.factor_relation_pending) || !self.records_sources() {
            return ControlFlow::Continue(());
        }
        // INSERT INTO targets and other bare relations
        self.found.push(Found::Relation {
            parts: object_name_parts(relation),
            alias: None,
        });
        ControlFlow::Continue(())
    }

    fn pre_visit_expr(&mut self, expr: &Expr) -> ControlFlow<Self::Break> {
        if self.depth > 0 {
            return ControlFlow::Continue(());
        }
        match expr {
            Expr::Identifier(ident) if self.records_columns() => {
                self.push_column(vec![ident.value.clone()]);
            }
            Expr::CompoundIdentifier(idents) if self.records_columns() => {
                self.push_column(idents.iter().map(|i| i.value.clone()).collect());
            }
            Expr::Lambda(lambda) => {
                let params = match &lambda.params {
                    OneOrManyWithParens::One(param) => vec![param.value.clone()],
                    OneOrManyWithParens::Many(params) => {
                        params.iter().map(|p| p.value.clone()).collect()
                    }
                };
                self.lambda_params.push(params);
            }
            _ => {}
        }
        ControlFlow::Continue(())
    }

    fn post_visit_expr(&mut self, expr: &Expr) -> ControlFlow<Self::Break> {
        if self.depth == 0 && matches!(expr, Expr::Lambda(_)) {
            self.lambda_params.pop();
        }
        ControlFlow::Continue(())
    }
}

fn object_name_parts(name: &ObjectName) -> Vec<String> {
    name.0.iter().map(|ident| ident.value.clone()).collect()
}

fn last_part(name: &ObjectName) -> String {
    name.0.last().map(|i| i.value.clone()).unwrap_or_default()
}

fn table_factor_alias(factor: &TableFactor) -> Option<String> {
    let alias = match factor {
        TableFactor::Table { alias, .. }
        | TableFactor::Derived { alias, .. }
        | TableFactor::TableFunction { alias, .. }
        | TableFactor::Function { alias, .. }
        | TableFactor::UNNEST { alias, .. }
        | TableFactor::JsonTable { alias, .. }
        | TableFactor::NestedJoin { alias, .. }
        | TableFactor::Pivot { alias, .. }
        | TableFactor::Unpivot { alias, .. }
        | TableFactor::MatchRecognize { alias, .. } => alias.as_ref(),
        #[allow(unreachable_patterns)]
        _ => None,
    };
    alias.map(|a| a.name.value.clone())
}
