//! In-memory tabular copy of a CSV file, and its Parquet rendering for upload.

use arrow_array::RecordBatch;
use arrow_csv::reader::Format;
use arrow_csv::ReaderBuilder;
use arrow_schema::SchemaRef;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::{WriterProperties, WriterVersion};
use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use crate::warehouse::WarehouseError;

const BATCH_SIZE: usize = 8192;

/// Whole file held as Arrow batches under one inferred schema.
#[derive(Debug, Clone)]
pub struct InMemoryTable {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

impl InMemoryTable {
    /// Read a CSV file with a header row. The schema is inferred from every
    /// row, then the file is read fully into memory.
    pub fn read_csv(path: &Path) -> Result<Self, WarehouseError> {
        let mut file = File::open(path).map_err(|e| {
            WarehouseError::Data(format!("Could not open {}: {}", path.display(), e))
        })?;

        let (schema, _) = Format::default()
            .with_header(true)
            .infer_schema(BufReader::new(&mut file), None)?;
        if schema.fields().is_empty() {
            return Err(WarehouseError::Data(format!(
                "{} has no header row",
                path.display()
            )));
        }
        let schema = Arc::new(schema);

        file.seek(SeekFrom::Start(0))?;
        let reader = ReaderBuilder::new(schema.clone())
            .with_header(true)
            .with_batch_size(BATCH_SIZE)
            .build(BufReader::new(file))?;

        let batches = reader.collect::<Result<Vec<_>, _>>()?;
        Ok(Self { schema, batches })
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(|b| b.num_rows()).sum()
    }

    /// Write the table as a single Parquet file. Returns bytes written.
    pub fn write_parquet(&self, path: &Path) -> Result<u64, WarehouseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let props = WriterProperties::builder()
            .set_writer_version(WriterVersion::PARQUET_1_0)
            .set_compression(Compression::SNAPPY)
            .build();

        let file = File::create(path)?;
        let mut writer = ArrowWriter::try_new(file, self.schema.clone(), Some(props))?;
        for batch in &self.batches {
            writer.write(batch)?;
        }
        writer.close()?;

        Ok(std::fs::metadata(path)?.len())
    }
}
