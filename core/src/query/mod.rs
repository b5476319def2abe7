//! The lazy, immutable query object.
//!
//! Every chaining call validates its input against the record type and returns
//! a new [`QuerySet`] whose clause set extends the receiver's; the receiver is
//! left untouched and keeps its own result cache. Nothing is executed until a
//! terminal (`iterate`, `get`, `count`, `exists`, `first`, `aggregate`,
//! `stream`) is called.

mod stream;

pub use stream::RecordStream;

use std::ops::{Bound, RangeBounds};
use std::sync::{Arc, Mutex, PoisonError};

use compact_str::CompactString;
use quarry_types::Value;

use crate::clause::{Annotation, ClauseSet, LoadMode, OrderKey, RelationHint, Window};
use crate::compiler::{Compiler, SelectPlan};
use crate::error::{QueryError, Result};
use crate::executor::{run, run_stream};
use crate::expr::{BindContext, Expr, FieldPath, Func, PATH_SEPARATOR, bind_expr};
use crate::record::Record;
use crate::relation::{RelationTree, load_batches};
use crate::schema::{RecordType, require};
use crate::session::Session;
use crate::sql::CompiledStatement;

/// Lazily evaluated, immutable query over one record type.
///
/// ```ignore
/// let orders = session
///     .query("order")?
///     .filter(lookup("total__gte", 100))?
///     .follow_relation("customer", LoadMode::Batch)?
///     .order_by(["-total"])?;
///
/// for order in orders.iterate()?.iter() {
///     println!("{} {:?}", order.pk().unwrap(), order.one("customer"));
/// }
/// ```
pub struct QuerySet {
    session: Session,
    record_type: CompactString,
    clauses: ClauseSet,
    /// Materialized rows; the lock also serializes the first evaluation.
    cache: Mutex<Option<Arc<[Record]>>>,
}

impl QuerySet {
    pub(crate) fn new(session: Session, record_type: CompactString) -> Self {
        Self::with_clauses(session, record_type, ClauseSet::default())
    }

    fn with_clauses(session: Session, record_type: CompactString, clauses: ClauseSet) -> Self {
        Self {
            session,
            record_type,
            clauses,
            cache: Mutex::new(None),
        }
    }

    /// A new query over the same record type with `clauses` and an empty cache.
    fn derive(&self, clauses: ClauseSet) -> Self {
        Self::with_clauses(self.session.clone(), self.record_type.clone(), clauses)
    }

    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    pub fn clauses(&self) -> &ClauseSet {
        &self.clauses
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Whether this instance holds materialized results.
    pub fn is_evaluated(&self) -> bool {
        self.lock_cache().is_some()
    }

    fn record(&self) -> Result<&RecordType> {
        require(self.session.schema(), &self.record_type)
    }

    fn bind(&self, expr: &Expr) -> Result<Expr> {
        let ctx = BindContext {
            record: self.record()?,
            annotations: self.clauses.annotation_names(),
        };
        bind_expr(&ctx, expr)
    }

    /// Checks that `path` names a field, annotation or relation path.
    fn check_path(&self, path: &FieldPath) -> Result<()> {
        self.bind(&Expr::column(path.clone())).map(drop)
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, Option<Arc<[Record]>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Chaining
    // =========================================================================

    /// Keeps rows matching `predicate`; successive calls are ANDed.
    pub fn filter(&self, predicate: Expr) -> Result<Self> {
        let predicate = self.bind(&predicate)?;
        let mut clauses = self.clauses.clone();
        clauses.filters = clauses.filters.push(predicate);
        Ok(self.derive(clauses))
    }

    /// Drops rows matching `predicate`; successive calls are ANDed.
    pub fn exclude(&self, predicate: Expr) -> Result<Self> {
        let predicate = self.bind(&predicate)?;
        let mut clauses = self.clauses.clone();
        clauses.excludes = clauses.excludes.push(predicate);
        Ok(self.derive(clauses))
    }

    /// Replaces the ordering. A leading `-` sorts descending.
    pub fn order_by<I, K>(&self, keys: I) -> Result<Self>
    where
        I: IntoIterator<Item = K>,
        K: Into<OrderKey>,
    {
        let keys: Vec<OrderKey> = keys.into_iter().map(Into::into).collect();
        for key in &keys {
            self.check_path(&key.path)?;
        }
        let mut clauses = self.clauses.clone();
        clauses.ordering = keys.into();
        Ok(self.derive(clauses))
    }

    /// Replaces the result window with at most `limit` rows after skipping `offset`.
    pub fn limit_offset(&self, limit: u64, offset: u64) -> Self {
        let mut clauses = self.clauses.clone();
        clauses.window = Window::new(Some(limit), offset);
        self.derive(clauses)
    }

    /// Narrows the current window to `range`, relative to its first row.
    pub fn slice(&self, range: impl RangeBounds<u64>) -> Self {
        let start = match range.start_bound() {
            Bound::Included(&n) => n,
            Bound::Excluded(&n) => n.saturating_add(1),
            Bound::Unbounded => 0,
        };
        let end = match range.end_bound() {
            Bound::Included(&n) => Some(n.saturating_add(1)),
            Bound::Excluded(&n) => Some(n),
            Bound::Unbounded => None,
        };
        let mut clauses = self.clauses.clone();
        clauses.window = clauses.window.slice(start, end);
        self.derive(clauses)
    }

    /// Adds a computed value to every record under `name`.
    pub fn annotate(&self, name: &str, expr: Expr) -> Result<Self> {
        let record = self.record()?;
        if name.is_empty() || name.contains(PATH_SEPARATOR) {
            return Err(QueryError::invalid_query(
                &self.record_type,
                format!("`{name}` is not a usable annotation name"),
            ));
        }
        if record.has_field(name) || self.clauses.annotation(name).is_some() {
            return Err(QueryError::AnnotationCollision {
                name: name.into(),
                record_type: self.record_type.clone(),
            });
        }
        let expr = self.bind(&expr)?;
        let mut clauses = self.clauses.clone();
        clauses.annotations = clauses.annotations.push(Annotation {
            name: name.into(),
            expr,
        });
        Ok(self.derive(clauses))
    }

    /// Loads the relation at `path` with every record.
    ///
    /// Intermediate hops of a nested path are followed with the same mode.
    pub fn follow_relation(&self, path: &str, mode: LoadMode) -> Result<Self> {
        let hint = RelationHint {
            path: FieldPath::parse(path),
            mode,
        };
        let relations = self.clauses.relations.push(hint);

        let mut clauses = self.clauses.clone();
        clauses.relations = relations;
        RelationTree::build(self.session.schema(), self.record()?, &clauses.relation_hints())?;
        Ok(self.derive(clauses))
    }

    /// Groups rows by `keys`; records then carry the keys followed by annotations.
    pub fn group_by<I, P>(&self, keys: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<FieldPath>,
    {
        let keys: Vec<FieldPath> = keys.into_iter().map(Into::into).collect();
        for key in &keys {
            self.check_path(key)?;
        }
        let mut clauses = self.clauses.clone();
        clauses.group_by = keys.into();
        Ok(self.derive(clauses))
    }

    pub fn distinct(&self) -> Self {
        let mut clauses = self.clauses.clone();
        clauses.distinct = true;
        self.derive(clauses)
    }

    /// Same clauses, fresh cache.
    pub fn all(&self) -> Self {
        self.derive(self.clauses.clone())
    }

    /// A query that matches nothing and never executes.
    pub fn none(&self) -> Self {
        let mut clauses = self.clauses.clone();
        clauses.empty = true;
        self.derive(clauses)
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// The row-fetching statement this query would run.
    pub fn compile(&self) -> Result<CompiledStatement> {
        self.compiler()?.compile(&self.clauses)
    }

    /// The counting statement `count()` would run.
    pub fn compile_count(&self) -> Result<CompiledStatement> {
        self.compiler()?.compile_count(&self.clauses)
    }

    fn compiler(&self) -> Result<Compiler<'_>> {
        self.session.compiler(&self.record_type)
    }

    // =========================================================================
    // Terminals
    // =========================================================================

    /// Materialized records, executing on first use and cached afterwards.
    pub fn iterate(&self) -> Result<Arc<[Record]>> {
        let mut cache = self.lock_cache();
        if let Some(records) = cache.as_ref() {
            crate::quarry_trace_cache!("hit", self.record_type);
            return Ok(Arc::clone(records));
        }
        crate::quarry_trace_cache!("miss", self.record_type);

        let records: Arc<[Record]> = self.evaluate(&self.clauses)?.into();
        *cache = Some(Arc::clone(&records));
        Ok(records)
    }

    /// The single record this query matches.
    pub fn get(&self) -> Result<Record> {
        let cached = self.lock_cache().clone();
        let records = match cached {
            Some(records) => records.to_vec(),
            None => {
                let mut clauses = self.clauses.clone();
                if clauses.window.limit.is_none() {
                    clauses.window = clauses
                        .window
                        .slice(0, Some(self.session.options().max_get_results));
                }
                self.evaluate(&clauses)?
            }
        };

        let mut records = records.into_iter();
        match (records.next(), records.len()) {
            (Some(record), 0) => Ok(record),
            (None, _) => Err(QueryError::NotFound {
                record_type: self.record_type.clone(),
                predicate: self.clauses.predicate().to_string(),
            }),
            (Some(_), rest) => Err(QueryError::MultipleResults {
                record_type: self.record_type.clone(),
                predicate: self.clauses.predicate().to_string(),
                count: rest + 1,
            }),
        }
    }

    /// Number of matching records; answered from the cache when evaluated.
    pub fn count(&self) -> Result<usize> {
        if let Some(records) = self.lock_cache().as_ref() {
            crate::quarry_trace_cache!("hit", self.record_type);
            return Ok(records.len());
        }
        if self.clauses.is_trivially_empty() {
            return Ok(0);
        }

        let statement = self.compile_count()?;
        let rows = run(self.session.executor(), &statement)?;
        let raw = rows
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next())
            .unwrap_or(Value::Integer(0));
        match raw {
            Value::Integer(n) if n >= 0 => Ok(n as usize),
            raw => Err(QueryError::Materialization {
                record_type: self.record_type.clone(),
                field: "count".into(),
                raw,
            }),
        }
    }

    /// Whether at least one record matches.
    pub fn exists(&self) -> Result<bool> {
        if let Some(records) = self.lock_cache().as_ref() {
            return Ok(!records.is_empty());
        }
        if self.clauses.is_trivially_empty() {
            return Ok(false);
        }

        let statement = self.compiler()?.compile_exists(&self.clauses)?;
        Ok(!run(self.session.executor(), &statement)?.is_empty())
    }

    /// The first record, ordering by primary key when no ordering is set.
    pub fn first(&self) -> Result<Option<Record>> {
        if let Some(records) = self.lock_cache().as_ref() {
            return Ok(records.first().cloned());
        }

        let mut clauses = self.clauses.clone();
        if clauses.ordering.is_empty() && !clauses.is_grouped() {
            clauses.ordering = Arc::from([OrderKey::asc(FieldPath::parse("pk"))]);
        }
        clauses.window = clauses.window.slice(0, Some(1));
        Ok(self.evaluate(&clauses)?.into_iter().next())
    }

    /// Computes named aggregates over the matching rows as one record.
    pub fn aggregate<I, N>(&self, aggregates: I) -> Result<Record>
    where
        I: IntoIterator<Item = (N, Expr)>,
        N: Into<CompactString>,
    {
        let mut bound: Vec<Annotation> = Vec::new();
        for (name, expr) in aggregates {
            let name = name.into();
            if bound.iter().any(|a| a.name == name) {
                return Err(QueryError::AnnotationCollision {
                    name,
                    record_type: self.record_type.clone(),
                });
            }
            let expr = self.bind(&expr)?;
            bound.push(Annotation { name, expr });
        }

        let plan = self.compiler()?.plan_aggregate(&self.clauses, &bound)?;
        let row = match self.clauses.empty {
            true => None,
            false => run(self.session.executor(), &plan.statement)?.into_iter().next(),
        };
        let row = row.unwrap_or_else(|| bound.iter().map(empty_aggregate).collect());
        Ok(plan.projection.read(row)?.0)
    }

    /// Single-pass record stream; never cached, re-executes on every call.
    pub fn stream(&self) -> Result<RecordStream> {
        let compiler = self.compiler()?;
        let SelectPlan {
            statement,
            projection,
            relations,
        } = compiler.plan(&self.clauses)?;

        let rows = match self.clauses.is_trivially_empty() {
            true => None,
            false => Some(run_stream(self.session.executor(), &statement)?),
        };
        Ok(RecordStream::new(
            self.session.clone(),
            self.record_type.clone(),
            projection,
            relations,
            rows,
        ))
    }

    /// Compiles, executes and materializes `clauses` with their relations.
    fn evaluate(&self, clauses: &ClauseSet) -> Result<Vec<Record>> {
        let compiler = self.compiler()?;
        let plan = compiler.plan(clauses)?;
        if clauses.is_trivially_empty() {
            return Ok(Vec::new());
        }

        let executor = self.session.executor();
        let mut records = run(executor, &plan.statement)?
            .into_iter()
            .map(|row| plan.projection.read(row).map(|(record, _)| record))
            .collect::<Result<Vec<_>>>()?;
        load_batches(&compiler, &plan.relations, executor, &mut records)?;
        Ok(records)
    }
}

/// Value an aggregate takes over zero rows.
fn empty_aggregate(annotation: &Annotation) -> Value {
    match &annotation.expr {
        Expr::Computed {
            func: Func::Count | Func::CountDistinct,
            ..
        } => Value::Integer(0),
        _ => Value::Null,
    }
}

impl Clone for QuerySet {
    /// Clones the clauses; the cache is never shared.
    fn clone(&self) -> Self {
        self.all()
    }
}

impl core::fmt::Debug for QuerySet {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("QuerySet")
            .field("record_type", &self.record_type)
            .field("clauses", &self.clauses)
            .field("evaluated", &self.is_evaluated())
            .finish()
    }
}
