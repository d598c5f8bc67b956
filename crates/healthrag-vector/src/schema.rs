//! Arrow schema of the passage table.
use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

pub const ID: &str = "id";
pub const TEXT: &str = "text";
pub const METADATA: &str = "metadata_json";
pub const VECTOR: &str = "vector";
pub const DISTANCE: &str = "_distance";

pub fn build_arrow_schema(dim: usize) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new(ID, DataType::Utf8, false),
		Field::new(TEXT, DataType::Utf8, false),
		Field::new(METADATA, DataType::Utf8, false),
		Field::new(VECTOR, DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim as i32), true),
	]))
}
