use compact_str::CompactString;

use crate::error::Result;
use crate::executor::RowStream;
use crate::materialize::Projection;
use crate::record::Record;
use crate::relation::{RelationTree, load_batches};
use crate::session::Session;

/// Lazily materialized records of one statement execution.
///
/// Rows are read as the iterator advances. With batch relations, base rows
/// are read in chunks of `stream_chunk_size` and each chunk issues one
/// follow-up statement per batch path. The first error ends the stream.
pub struct RecordStream {
    session: Session,
    record_type: CompactString,
    projection: Projection,
    relations: RelationTree,
    rows: Option<RowStream>,
    buffer: std::vec::IntoIter<Record>,
}

impl RecordStream {
    pub(crate) fn new(
        session: Session,
        record_type: CompactString,
        projection: Projection,
        relations: RelationTree,
        rows: Option<RowStream>,
    ) -> Self {
        Self {
            session,
            record_type,
            projection,
            relations,
            rows,
            buffer: Vec::new().into_iter(),
        }
    }

    /// Reads the next chunk into the buffer; `false` once the rows are exhausted.
    fn fill(&mut self) -> Result<bool> {
        let Some(rows) = self.rows.as_mut() else {
            return Ok(false);
        };
        let batched = self.relations.has_batches();
        let chunk = match batched {
            true => self.session.options().stream_chunk_size.max(1),
            false => 1,
        };

        let mut records = Vec::with_capacity(chunk);
        for row in rows.by_ref().take(chunk) {
            let (record, _) = self.projection.read(row?)?;
            records.push(record);
        }
        if records.is_empty() {
            self.rows = None;
            return Ok(false);
        }

        if batched {
            let compiler = self.session.compiler(&self.record_type)?;
            load_batches(
                &compiler,
                &self.relations,
                self.session.executor(),
                &mut records,
            )?;
        }
        self.buffer = records.into_iter();
        Ok(true)
    }
}

impl Iterator for RecordStream {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.buffer.next() {
                return Some(Ok(record));
            }
            match self.fill() {
                Ok(true) => continue,
                Ok(false) => return None,
                Err(err) => {
                    self.rows = None;
                    return Some(Err(err));
                }
            }
        }
    }
}

impl core::fmt::Debug for RecordStream {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RecordStream")
            .field("record_type", &self.record_type)
            .field("buffered", &self.buffer.len())
            .field("exhausted", &self.rows.is_none())
            .finish()
    }
}
