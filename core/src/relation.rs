//! Relation following: the hint tree and the batch loader.
//!
//! Hints are expanded into a tree of relation nodes, one per distinct path,
//! parents first. Join nodes are folded into the statement of their nearest
//! batch ancestor (or the base statement); each batch node issues exactly one
//! follow-up statement.

use compact_str::CompactString;
use hashbrown::{HashMap, HashSet};
use quarry_types::Value;

use crate::clause::{LoadMode, RelationHint};
use crate::compiler::Compiler;
use crate::error::{QueryError, Result};
use crate::executor::{Executor, run};
use crate::expr::FieldPath;
use crate::record::{Record, Related};
use crate::schema::{RecordType, RelationInfo, SchemaDescriptor, require};

// =============================================================================
// Tree
// =============================================================================

#[derive(Debug, Clone)]
pub(crate) struct RelationNode {
    pub path: FieldPath,
    /// Relation field name on the parent record.
    pub name: CompactString,
    pub parent: Option<usize>,
    pub mode: LoadMode,
    /// Record type declaring the relation.
    pub source: CompactString,
    pub info: RelationInfo,
    /// Statement that selects this node: the batch node itself, or the
    /// statement of its parent for join nodes. `None` is the base statement.
    pub statement: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct RelationTree {
    nodes: Vec<RelationNode>,
}

impl RelationTree {
    /// Expands relation hints into nodes.
    ///
    /// Intermediate hops take the mode of the hint that introduced them; a
    /// later hint naming an existing path replaces its mode.
    pub fn build(
        schema: &dyn SchemaDescriptor,
        root: &RecordType,
        hints: &[RelationHint],
    ) -> Result<Self> {
        let mut nodes: Vec<RelationNode> = Vec::new();

        for hint in hints {
            let mut parent: Option<usize> = None;
            for depth in 1..=hint.path.len() {
                let prefix = hint.path.prefix(depth);
                if let Some(existing) = nodes.iter().position(|n| n.path == prefix) {
                    if depth == hint.path.len() {
                        nodes[existing].mode = hint.mode;
                    }
                    parent = Some(existing);
                    continue;
                }

                let source = match parent {
                    Some(p) => require(schema, nodes[p].info.target())?,
                    None => root,
                };
                let name = prefix.segments()[depth - 1].clone();
                let info = source
                    .field_named(&name)
                    .and_then(|f| f.relation())
                    .ok_or_else(|| QueryError::field_reference(hint.path.to_compact(), root.name()))?;

                nodes.push(RelationNode {
                    path: prefix,
                    name,
                    parent,
                    mode: hint.mode,
                    source: source.name().into(),
                    info: info.clone(),
                    statement: None,
                });
                parent = Some(nodes.len() - 1);
            }
        }

        for i in 0..nodes.len() {
            let node = &nodes[i];
            if node.mode == LoadMode::Join && !node.info.multiplicity().is_single() {
                return Err(QueryError::invalid_query(
                    root.name(),
                    format!(
                        "`{}` is multi-valued and cannot be followed with a join; use batch mode",
                        node.path
                    ),
                ));
            }
            let statement = match (node.mode, node.parent) {
                (LoadMode::Batch, _) => Some(i),
                (LoadMode::Join, None) => None,
                (LoadMode::Join, Some(p)) => nodes[p].statement,
            };
            nodes[i].statement = statement;
        }

        Ok(Self { nodes })
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, index: usize) -> &RelationNode {
        &self.nodes[index]
    }

    #[cfg(test)]
    pub fn nodes(&self) -> &[RelationNode] {
        &self.nodes
    }

    /// Batch nodes in resolution order (parents before children).
    pub fn batch_nodes(&self) -> impl Iterator<Item = usize> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.mode == LoadMode::Batch)
            .map(|(i, _)| i)
    }

    /// Join nodes folded into `statement`, parents first.
    pub fn joined_in(&self, statement: Option<usize>) -> impl Iterator<Item = usize> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(move |(_, n)| n.mode == LoadMode::Join && n.statement == statement)
            .map(|(i, _)| i)
    }

    /// Path of `index` relative to the root record of `statement`.
    pub fn relative_path(&self, index: usize, statement: Option<usize>) -> FieldPath {
        let path = &self.nodes[index].path;
        let skip = statement.map_or(0, |s| self.nodes[s].path.len());
        FieldPath::from_segments(path.segments()[skip..].iter().cloned())
    }

    pub fn has_batches(&self) -> bool {
        self.nodes.iter().any(|n| n.mode == LoadMode::Batch)
    }
}

// =============================================================================
// Batch loader
// =============================================================================

/// Resolves every batch node for `records`, attaching the results in place.
///
/// Issues one statement per batch node, none when a node has no keys.
pub(crate) fn load_batches(
    compiler: &Compiler<'_>,
    tree: &RelationTree,
    executor: &dyn Executor,
    records: &mut [Record],
) -> Result<()> {
    for index in tree.batch_nodes() {
        let node = tree.node(index);
        let holders = &node.path.segments()[..node.path.len() - 1];
        let local = node.info.local_field();

        let mut keys = Vec::new();
        let mut seen = HashSet::new();
        visit(records, holders, &mut |record| {
            if let Some(key) = record.get(local)
                && !key.is_null()
                && seen.insert(key.clone())
            {
                keys.push(key.clone());
            }
        });
        crate::quarry_trace_batch!(node.path, keys.len());

        let mut by_key: HashMap<Value, Vec<Record>> = HashMap::new();
        if !keys.is_empty() {
            let plan = compiler.plan_batch(tree, index, &keys)?;
            let remote = node.info.remote_field();
            for row in run(executor, &plan.statement)? {
                let (record, key) = plan.projection.read(row)?;
                let key = key.or_else(|| record.get(remote).cloned());
                if let Some(key) = key {
                    by_key.entry(key).or_default().push(record);
                }
            }
        }

        let single = node.info.multiplicity().is_single();
        visit_mut(records, holders, &mut |record| {
            let matches = record.get(local).and_then(|key| by_key.get(key));
            let related = if single {
                Related::One(matches.and_then(|m| m.first()).cloned().map(Box::new))
            } else {
                Related::Many(matches.cloned().unwrap_or_default())
            };
            record.set_related(&node.name, related);
        });
    }
    Ok(())
}

fn visit(records: &[Record], path: &[CompactString], f: &mut dyn FnMut(&Record)) {
    let Some((head, rest)) = path.split_first() else {
        records.iter().for_each(f);
        return;
    };
    for record in records {
        match record.related(head) {
            Some(Related::One(Some(child))) => visit(core::slice::from_ref(&**child), rest, f),
            Some(Related::Many(children)) => visit(children, rest, f),
            _ => {}
        }
    }
}

fn visit_mut(records: &mut [Record], path: &[CompactString], f: &mut dyn FnMut(&mut Record)) {
    let Some((head, rest)) = path.split_first() else {
        records.iter_mut().for_each(f);
        return;
    };
    for record in records {
        match record.related_mut(head) {
            Some(Related::One(Some(child))) => {
                visit_mut(core::slice::from_mut(&mut **child), rest, f)
            }
            Some(Related::Many(children)) => visit_mut(children, rest, f),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;
    use quarry_types::FieldType;

    fn schema() -> Schema {
        Schema::builder()
            .record(
                RecordType::new("country")
                    .field("id", FieldType::Integer)
                    .primary_key("id"),
            )
            .record(
                RecordType::new("customer")
                    .field("id", FieldType::Integer)
                    .field("country_id", FieldType::Integer)
                    .primary_key("id")
                    .relation("country", RelationInfo::many_to_one("country", "country_id"))
                    .relation("orders", RelationInfo::one_to_many("order", "customer_id")),
            )
            .record(
                RecordType::new("order")
                    .field("id", FieldType::Integer)
                    .field("customer_id", FieldType::Integer)
                    .primary_key("id")
                    .relation("customer", RelationInfo::many_to_one("customer", "customer_id")),
            )
            .build()
            .unwrap()
    }

    fn hint(path: &str, mode: LoadMode) -> RelationHint {
        RelationHint {
            path: FieldPath::parse(path),
            mode,
        }
    }

    #[test]
    fn test_nested_hint_creates_intermediate_nodes() {
        let schema = schema();
        let order = schema.record_type("order").unwrap();
        let tree = RelationTree::build(
            &schema,
            order,
            &[hint("customer__country", LoadMode::Batch)],
        )
        .unwrap();

        assert_eq!(tree.nodes().len(), 2);
        assert_eq!(tree.node(0).path, FieldPath::parse("customer"));
        assert_eq!(tree.node(0).mode, LoadMode::Batch);
        assert_eq!(tree.node(1).parent, Some(0));
        assert_eq!(tree.batch_nodes().count(), 2);
    }

    #[test]
    fn test_join_under_batch_is_folded() {
        let schema = schema();
        let order = schema.record_type("order").unwrap();
        let tree = RelationTree::build(
            &schema,
            order,
            &[
                hint("customer", LoadMode::Batch),
                hint("customer__country", LoadMode::Join),
            ],
        )
        .unwrap();

        assert_eq!(tree.node(1).statement, Some(0));
        assert_eq!(tree.joined_in(Some(0)).collect::<Vec<_>>(), [1]);
        assert_eq!(tree.joined_in(None).count(), 0);
        assert_eq!(tree.relative_path(1, Some(0)), FieldPath::parse("country"));
    }

    #[test]
    fn test_join_on_multi_valued_relation_is_rejected() {
        let schema = schema();
        let customer = schema.record_type("customer").unwrap();
        let err =
            RelationTree::build(&schema, customer, &[hint("orders", LoadMode::Join)]).unwrap_err();
        assert!(matches!(err, QueryError::InvalidQuery { .. }));
    }

    #[test]
    fn test_unknown_relation_is_a_field_reference_error() {
        let schema = schema();
        let order = schema.record_type("order").unwrap();
        let err =
            RelationTree::build(&schema, order, &[hint("customer_id", LoadMode::Join)]).unwrap_err();
        assert!(matches!(err, QueryError::FieldReference { .. }));
    }
}
