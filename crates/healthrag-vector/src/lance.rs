//! Embedded LanceDB table holding passages and their embeddings.
//!
//! One table per collection. Rows are keyed by `id`; writes go through
//! `merge_insert` so re-ingesting a passage overwrites it. Search uses cosine
//! distance and reports `1 - distance` as the similarity.
use arrow_array::cast::AsArray;
use arrow_array::types::Float32Type;
use arrow_array::{FixedSizeListArray, RecordBatch, RecordBatchIterator, StringArray};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::table::Table;
use lancedb::{connect, Connection, DistanceType};
use std::sync::Arc;
use tracing::{debug, info};

use healthrag_core::traits::VectorIndex;
use healthrag_core::types::{Candidate, Document, Meta};
use healthrag_core::{Cause, Error, Result};

use crate::schema::{build_arrow_schema, DISTANCE, ID, METADATA, TEXT};
use crate::check_upsert;

const WRITE_BATCH: usize = 1000;

/// Only failures of the storage layer itself are worth retrying. Bad input,
/// schema or width mismatches and missing tables fail the same way every time.
fn lance_cause(e: &lancedb::Error) -> Cause {
	use lancedb::Error as E;
	match e {
		E::Timeout { .. } | E::Runtime { .. } | E::ObjectStore { .. } => Cause::Transient,
		E::Lance { source } => {
			let msg = source.to_string();
			if msg.starts_with("LanceError(IO)") || msg.contains("commit conflict") || msg.contains("concurrent writers") {
				Cause::Transient
			} else {
				Cause::Permanent
			}
		}
		_ => Cause::Permanent,
	}
}

fn lance_err(e: lancedb::Error) -> Error {
	Error::retrieval(lance_cause(&e), format!("lancedb: {e}"))
}

pub struct LanceIndex { db: Connection, table_name: String, dim: usize }

impl LanceIndex {
	pub async fn open(uri: &str, table_name: &str, dim: usize) -> Result<Self> {
		let db = connect(uri).execute().await.map_err(lance_err)?;
		info!(uri, table = table_name, dim, "opened lancedb");
		Ok(Self { db, table_name: table_name.to_string(), dim })
	}

	async fn table_exists(&self) -> Result<bool> {
		let names = self.db.table_names().execute().await.map_err(lance_err)?;
		Ok(names.contains(&self.table_name))
	}

	async fn existing_table(&self) -> Result<Option<Table>> {
		if !self.table_exists().await? { return Ok(None); }
		let t = self.db.open_table(&self.table_name).execute().await.map_err(lance_err)?;
		Ok(Some(t))
	}

	fn docs_to_record_batch(&self, docs: &[Document], vectors: &[Vec<f32>]) -> Result<RecordBatch> {
		let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
		let texts: Vec<&str> = docs.iter().map(|d| d.text.as_str()).collect();
		let mut metadata = Vec::with_capacity(docs.len());
		for d in docs {
			let json = serde_json::to_string(&d.metadata)
				.map_err(|e| Error::retrieval(Cause::Permanent, format!("metadata for {}: {e}", d.id)))?;
			metadata.push(json);
		}
		let rows = vectors.iter().map(|v| Some(v.iter().map(|&x| Some(x)).collect::<Vec<_>>()));
		let record_batch = RecordBatch::try_new(build_arrow_schema(self.dim), vec![
			Arc::new(StringArray::from(ids)),
			Arc::new(StringArray::from(texts)),
			Arc::new(StringArray::from(metadata)),
			Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(rows, self.dim as i32)),
		]).map_err(|e| Error::retrieval(Cause::Permanent, format!("record batch: {e}")))?;
		Ok(record_batch)
	}

	async fn write_batch(&self, docs: &[Document], vectors: &[Vec<f32>]) -> Result<()> {
		let record_batch = self.docs_to_record_batch(docs, vectors)?;
		let schema = record_batch.schema();
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(record_batch)].into_iter(), schema));
		match self.existing_table().await? {
			Some(t) => {
				let mut mi = t.merge_insert(&[ID]);
				mi.when_matched_update_all(None).when_not_matched_insert_all();
				let _ = mi.execute(reader).await.map_err(lance_err)?;
			}
			None => {
				self.db.create_table(&self.table_name, reader).execute().await.map_err(lance_err)?;
			}
		}
		Ok(())
	}
}

fn decode_batch(batch: &RecordBatch, out: &mut Vec<Candidate>) {
	let ids = batch.column_by_name(ID).and_then(|c| c.as_string_opt::<i32>());
	let texts = batch.column_by_name(TEXT).and_then(|c| c.as_string_opt::<i32>());
	let metas = batch.column_by_name(METADATA).and_then(|c| c.as_string_opt::<i32>());
	let distances = batch.column_by_name(DISTANCE).and_then(|c| c.as_primitive_opt::<Float32Type>());
	for i in 0..batch.num_rows() {
		let id = ids.map(|a: &StringArray| a.value(i).to_string()).unwrap_or_default();
		let text = texts.map(|a: &StringArray| a.value(i).to_string()).unwrap_or_default();
		let metadata: Meta = metas
			.and_then(|a: &StringArray| serde_json::from_str(a.value(i)).ok())
			.unwrap_or_default();
		let distance = distances.map(|a| a.value(i)).unwrap_or(1.0);
		out.push(Candidate { document: Document { id, text, metadata }, similarity_score: 1.0 - distance });
	}
}

#[async_trait]
impl VectorIndex for LanceIndex {
	async fn upsert(&self, documents: &[Document], embeddings: &[Vec<f32>]) -> Result<()> {
		check_upsert(documents, embeddings, self.dim)?;
		for (docs, vectors) in documents.chunks(WRITE_BATCH).zip(embeddings.chunks(WRITE_BATCH)) {
			self.write_batch(docs, vectors).await?;
		}
		debug!(table = %self.table_name, count = documents.len(), "upserted into lancedb");
		Ok(())
	}

	async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<Candidate>> {
		if k == 0 { return Ok(Vec::new()); }
		if embedding.len() != self.dim {
			return Err(Error::retrieval(Cause::Permanent, format!("query vector has dim {}, index expects {}", embedding.len(), self.dim)));
		}
		let Some(table) = self.existing_table().await? else {
			debug!(table = %self.table_name, "table missing; empty result");
			return Ok(Vec::new());
		};
		let stream = table
			.query()
			.nearest_to(embedding)
			.map_err(lance_err)?
			.distance_type(DistanceType::Cosine)
			.limit(k)
			.execute()
			.await
			.map_err(lance_err)?;
		let batches: Vec<RecordBatch> = stream.try_collect().await.map_err(lance_err)?;
		let mut out = Vec::with_capacity(k);
		for batch in &batches { decode_batch(batch, &mut out); }
		out.truncate(k);
		Ok(out)
	}

	async fn reset(&self) -> Result<()> {
		if self.table_exists().await? {
			self.db.drop_table(&self.table_name, &[]).await.map_err(lance_err)?;
		}
		self.db
			.create_empty_table(&self.table_name, build_arrow_schema(self.dim))
			.execute()
			.await
			.map_err(lance_err)?;
		info!(table = %self.table_name, "reset lancedb table");
		Ok(())
	}

	async fn count(&self) -> Result<usize> {
		match self.existing_table().await? {
			Some(t) => t.count_rows(None).await.map_err(lance_err),
			None => Ok(0),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn input_and_schema_errors_are_permanent() {
		let e = lancedb::Error::InvalidInput { message: "No vector column found to match with the query vector dimension: 8".into() };
		assert_eq!(lance_cause(&e), Cause::Permanent);
		let e = lancedb::Error::Schema { message: "field mismatch".into() };
		assert_eq!(lance_cause(&e), Cause::Permanent);
	}

	#[test]
	fn timeouts_are_transient() {
		let e = lancedb::Error::Timeout { message: "query took too long".into() };
		assert_eq!(lance_cause(&e), Cause::Transient);
		assert!(lance_err(lancedb::Error::Runtime { message: "worker gone".into() }).is_transient());
	}
}
