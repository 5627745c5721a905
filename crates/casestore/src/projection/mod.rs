//! Sparse-field projection.
//!
//! Each entity declares its fields once, in a static [`Projection`] table:
//! a field name, how it contributes a SELECT column, and a scan function that
//! copies the column into the destination struct. [`Projection::build_columns`]
//! turns a client field mask into SELECT columns (plus joins) and a
//! [`ScanPlan`] whose steps are index-aligned with those columns.
//!
//! The same table serves Create/Update/Delete/List: the root alias in
//! [`ProjectionCtx`] is either the base table alias or the mutation CTE.
//!
//! ```ignore
//! static PRIORITY: LazyLock<Projection<Priority>> = LazyLock::new(|| {
//!     Projection::<Priority>::builder()
//!         .required(&["id"])
//!         .defaults(&["id", "name", "color"])
//!         .column("id", "id", |p, row, i| { p.id = scan::get(row, i)?; Ok(()) })
//!         .column("name", "name", |p, row, i| { p.name = scan::get(row, i)?; Ok(()) })
//!         .build()
//! });
//! ```

mod lookup;
pub mod scan;

pub use lookup::{Lookup, parse_record};

use crate::error::{StoreError, StoreResult};
use crate::filter::JoinResolver;
use crate::qb::{Expr, SelectQb};
use crate::sql_text::qualify;
use std::collections::HashMap;
use tokio_postgres::Row;

/// Copies column `idx` of `row` into the destination.
pub type ScanFn<T> = fn(&mut T, &Row, usize) -> StoreResult<()>;

/// Per-query context handed to column builders.
#[derive(Debug, Clone, Copy)]
pub struct ProjectionCtx<'a> {
    /// Alias of the root relation (table alias or CTE name).
    pub alias: &'a str,
    /// Calling user, for computed per-user columns.
    pub user_id: i64,
}

impl<'a> ProjectionCtx<'a> {
    pub fn new(alias: &'a str, user_id: i64) -> Self {
        Self { alias, user_id }
    }

    /// `alias.column`
    pub fn col(&self, column: &str) -> String {
        qualify(self.alias, column)
    }
}

/// LEFT JOIN used by a lookup field.
#[derive(Debug, Clone, Copy)]
pub struct LookupJoin {
    /// Joined table, e.g. `directory.wbt_user`
    pub table: &'static str,
    /// Alias for the joined table, unique within the entity
    pub alias: &'static str,
    /// Foreign-key column on the root relation
    pub fk: &'static str,
    /// Display column on the joined table
    pub name: &'static str,
}

impl LookupJoin {
    fn join(&self, key: &str, qb: &mut SelectQb, root_alias: &str) -> String {
        let on = format!("{}.id = {}", self.alias, qualify(root_alias, self.fk));
        qb.left_join_once(key, self.table, self.alias, &on)
    }
}

/// How a field contributes its SELECT column.
#[derive(Clone, Copy)]
pub enum ColumnKind {
    /// `alias.column`
    Direct(&'static str),
    /// Scalar expression computed from the context.
    Computed(fn(&ProjectionCtx<'_>) -> Expr),
    /// `ROW(id, name)::text` through a LEFT JOIN, decoded into [`Lookup`].
    Lookup(LookupJoin),
    /// Correlated `json_agg(...)` subquery for one-to-many children.
    Children(fn(&ProjectionCtx<'_>) -> String),
}

/// One declared field.
pub struct Field<T> {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub scan: ScanFn<T>,
}

/// Static field table of one entity.
pub struct Projection<T> {
    fields: Vec<Field<T>>,
    index: HashMap<&'static str, usize>,
    required: Vec<&'static str>,
    defaults: Vec<&'static str>,
}

impl<T> Projection<T> {
    pub fn builder() -> ProjectionBuilder<T> {
        ProjectionBuilder {
            fields: Vec::new(),
            required: Vec::new(),
            defaults: Vec::new(),
        }
    }

    /// Declared field names, in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|f| f.name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn required(&self) -> &[&'static str] {
        &self.required
    }

    pub fn defaults(&self) -> &[&'static str] {
        &self.defaults
    }

    /// Normalize a client field mask.
    ///
    /// Empty masks fall back to the defaults, duplicates are dropped keeping
    /// the first occurrence, and required fields are moved to the front.
    pub fn normalize(&self, fields: &[String]) -> Vec<String> {
        let requested: Vec<&str> = if fields.is_empty() {
            self.defaults.clone()
        } else {
            fields.iter().map(|f| f.trim()).filter(|f| !f.is_empty()).collect()
        };

        let mut out: Vec<String> = Vec::with_capacity(requested.len() + self.required.len());
        for name in &self.required {
            push_unique(&mut out, name);
        }
        for name in requested {
            push_unique(&mut out, name);
        }
        out
    }

    /// Add the columns for `fields` to `qb` and return the aligned scan plan.
    ///
    /// `fields` is normalized first. An unknown field name is an error, as is a
    /// mask that resolves to no columns.
    pub fn build_columns(
        &self,
        mut qb: SelectQb,
        ctx: &ProjectionCtx<'_>,
        fields: &[String],
    ) -> StoreResult<(SelectQb, ScanPlan<T>)> {
        let names = self.normalize(fields);
        let mut steps = Vec::with_capacity(names.len());
        let mut projected = Vec::with_capacity(names.len());

        for name in &names {
            let field = self.field(name)?;
            let idx = qb.column_count();
            let column = self.column_expr(field, &mut qb, ctx);
            qb.push_column(column);
            steps.push((idx, field.scan));
            projected.push(field.name);
        }

        if steps.is_empty() {
            return Err(StoreError::invalid_argument(
                "store.projection.empty",
                "no fields to select",
            ));
        }

        Ok((
            qb,
            ScanPlan {
                steps,
                fields: projected,
            },
        ))
    }

    /// Join resolver for lookup fields: `created_by.name` joins the user table
    /// under the lookup's alias.
    pub fn joins<'a>(&'a self, root_alias: &'a str) -> LookupJoins<'a, T> {
        LookupJoins {
            projection: self,
            root_alias,
        }
    }

    /// Join of lookup field `name`, if `name` is a lookup.
    pub fn lookup_join(&self, name: &str) -> Option<LookupJoin> {
        match self.index.get(name).map(|&i| &self.fields[i].kind) {
            Some(ColumnKind::Lookup(join)) => Some(*join),
            _ => None,
        }
    }

    fn field(&self, name: &str) -> StoreResult<&Field<T>> {
        self.index
            .get(name)
            .map(|&i| &self.fields[i])
            .ok_or_else(|| {
                StoreError::invalid_argument(
                    "store.projection.unknown_field",
                    format!("unknown field: {name}"),
                )
            })
    }

    fn column_expr(&self, field: &Field<T>, qb: &mut SelectQb, ctx: &ProjectionCtx<'_>) -> Expr {
        match field.kind {
            ColumnKind::Direct(column) => Expr::raw(ctx.col(column)),
            ColumnKind::Computed(build) => build(ctx),
            ColumnKind::Lookup(join) => {
                let alias = join.join(field.name, qb, ctx.alias);
                Expr::raw(format!(
                    "CASE WHEN {alias}.id IS NULL THEN NULL ELSE ROW({alias}.id, {alias}.{})::text END",
                    join.name
                ))
            }
            ColumnKind::Children(build) => Expr::raw(format!("({})", build(ctx))),
        }
    }
}

fn push_unique(out: &mut Vec<String>, name: &str) {
    if !out.iter().any(|f| f == name) {
        out.push(name.to_string());
    }
}

/// Fluent construction of a [`Projection`].
#[must_use]
pub struct ProjectionBuilder<T> {
    fields: Vec<Field<T>>,
    required: Vec<&'static str>,
    defaults: Vec<&'static str>,
}

impl<T> ProjectionBuilder<T> {
    /// Fields always selected, whatever the mask says.
    pub fn required(mut self, names: &[&'static str]) -> Self {
        self.required = names.to_vec();
        self
    }

    /// Fields selected when the mask is empty.
    pub fn defaults(mut self, names: &[&'static str]) -> Self {
        self.defaults = names.to_vec();
        self
    }

    pub fn field(mut self, name: &'static str, kind: ColumnKind, scan: ScanFn<T>) -> Self {
        self.fields.push(Field { name, kind, scan });
        self
    }

    pub fn column(self, name: &'static str, column: &'static str, scan: ScanFn<T>) -> Self {
        self.field(name, ColumnKind::Direct(column), scan)
    }

    pub fn computed(
        self,
        name: &'static str,
        build: fn(&ProjectionCtx<'_>) -> Expr,
        scan: ScanFn<T>,
    ) -> Self {
        self.field(name, ColumnKind::Computed(build), scan)
    }

    pub fn lookup(self, name: &'static str, join: LookupJoin, scan: ScanFn<T>) -> Self {
        self.field(name, ColumnKind::Lookup(join), scan)
    }

    pub fn children(
        self,
        name: &'static str,
        build: fn(&ProjectionCtx<'_>) -> String,
        scan: ScanFn<T>,
    ) -> Self {
        self.field(name, ColumnKind::Children(build), scan)
    }

    /// Finish the table.
    ///
    /// # Panics
    /// On duplicate field names, or required/default names that are not
    /// declared. Tables are static and built once at startup.
    pub fn build(self) -> Projection<T> {
        let mut index = HashMap::with_capacity(self.fields.len());
        for (i, field) in self.fields.iter().enumerate() {
            if index.insert(field.name, i).is_some() {
                panic!("projection field '{}' declared twice", field.name);
            }
        }
        for name in self.required.iter().chain(&self.defaults) {
            if !index.contains_key(name) {
                panic!("projection references undeclared field '{name}'");
            }
        }
        Projection {
            fields: self.fields,
            index,
            required: self.required,
            defaults: self.defaults,
        }
    }
}

/// [`JoinResolver`] over the lookup fields of a projection.
pub struct LookupJoins<'a, T> {
    projection: &'a Projection<T>,
    root_alias: &'a str,
}

impl<T> JoinResolver for LookupJoins<'_, T> {
    fn resolve_join(&self, fk: &str, qb: &mut SelectQb) -> StoreResult<String> {
        match self.projection.index.get(fk).map(|&i| &self.projection.fields[i]) {
            Some(Field {
                kind: ColumnKind::Lookup(join),
                ..
            }) => Ok(join.join(fk, qb, self.root_alias)),
            _ => Err(StoreError::invalid_argument(
                "store.filter.join",
                format!("no join defined for '{fk}'"),
            )),
        }
    }
}

/// Scan steps aligned with the SELECT columns added by
/// [`Projection::build_columns`].
pub struct ScanPlan<T> {
    steps: Vec<(usize, ScanFn<T>)>,
    fields: Vec<&'static str>,
}

impl<T> ScanPlan<T> {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Projected field names, in column order.
    pub fn fields(&self) -> &[&'static str] {
        &self.fields
    }

    /// Whether `name` is part of the projection.
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains(&name)
    }

    /// Run every step against `row` into `dest`.
    pub fn scan_into(&self, dest: &mut T, row: &Row) -> StoreResult<()> {
        for (idx, scan) in &self.steps {
            scan(dest, row, *idx)?;
        }
        Ok(())
    }

    /// Scan `row` into a fresh value; unprojected fields keep their defaults.
    pub fn scan(&self, row: &Row) -> StoreResult<T>
    where
        T: Default,
    {
        let mut dest = T::default();
        self.scan_into(&mut dest, row)?;
        Ok(dest)
    }

    pub fn scan_all(&self, rows: &[Row]) -> StoreResult<Vec<T>>
    where
        T: Default,
    {
        rows.iter().map(|row| self.scan(row)).collect()
    }
}
