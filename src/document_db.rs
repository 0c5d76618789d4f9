use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use crate::{analytics::SearchRecord, backend::Document, error::Result};

/// Document id -> JSON-encoded [`Document`].
const DOCUMENTS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("documents");
/// Document id -> JSON-encoded chunk texts.
const CHUNKS: TableDefinition<&str, &[u8]> = TableDefinition::new("chunks");
/// Sequence number -> JSON-encoded [`SearchRecord`].
const SEARCHES: TableDefinition<u64, &[u8]> = TableDefinition::new("searches");

pub struct DocumentDb {
    db: Database,
}

impl DocumentDb {
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path)?;

        let txn = db.begin_write()?;
        txn.open_table(DOCUMENTS)?;
        txn.open_table(CHUNKS)?;
        txn.open_table(SEARCHES)?;
        txn.commit()?;

        Ok(Self { db })
    }

    // -- Documents --

    /// Store a document together with its chunks, replacing any previous
    /// version under the same id.
    pub fn put_document(
        &self,
        document: &Document,
        chunks: &[String],
    ) -> Result<bool> {
        let doc_bytes = serde_json::to_vec(document)?;
        let chunk_bytes = serde_json::to_vec(chunks)?;

        let txn = self.db.begin_write()?;
        let replaced = {
            let mut documents = txn.open_table(DOCUMENTS)?;
            let replaced = documents
                .insert(document.id.as_str(), doc_bytes.as_slice())?
                .is_some();
            let mut table = txn.open_table(CHUNKS)?;
            table.insert(document.id.as_str(), chunk_bytes.as_slice())?;
            replaced
        };
        txn.commit()?;
        Ok(replaced)
    }

    /// Overwrite the document record, leaving its chunks alone.
    pub fn update_document(&self, document: &Document) -> Result<()> {
        let bytes = serde_json::to_vec(document)?;
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(DOCUMENTS)?;
            table.insert(document.id.as_str(), bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(DOCUMENTS)?;
        match table.get(id)? {
            Some(v) => Ok(Some(serde_json::from_slice(v.value())?)),
            None => Ok(None),
        }
    }

    pub fn contains_document(&self, id: &str) -> Result<bool> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(DOCUMENTS)?;
        Ok(table.get(id)?.is_some())
    }

    /// Ids starting with `prefix`, in key order.
    pub fn ids_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(DOCUMENTS)?;
        let mut result = Vec::new();
        for entry in table.range(prefix..)? {
            let (k, _v) = entry?;
            let key = k.value();
            if !key.starts_with(prefix) {
                break;
            }
            result.push(key.to_string());
        }
        Ok(result)
    }

    /// Remove a document and its chunks, returning the removed document.
    pub fn remove_document(&self, id: &str) -> Result<Option<Document>> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut documents = txn.open_table(DOCUMENTS)?;
            let removed = documents.remove(id)?.map(|v| v.value().to_vec());
            let mut chunks = txn.open_table(CHUNKS)?;
            chunks.remove(id)?;
            removed
        };
        txn.commit()?;
        removed
            .map(|bytes| serde_json::from_slice(&bytes))
            .transpose()
            .map_err(Into::into)
    }

    pub fn list_documents(&self) -> Result<Vec<Document>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(DOCUMENTS)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (_k, v) = entry?;
            result.push(serde_json::from_slice(v.value())?);
        }
        Ok(result)
    }

    pub fn document_count(&self) -> Result<usize> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(DOCUMENTS)?;
        let mut count = 0;
        for entry in table.iter()? {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    // -- Chunks --

    pub fn get_chunks(&self, id: &str) -> Result<Vec<String>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(CHUNKS)?;
        match table.get(id)? {
            Some(v) => Ok(serde_json::from_slice(v.value())?),
            None => Ok(Vec::new()),
        }
    }

    /// Every stored `(document id, chunks)` pair in a single read
    /// transaction.
    pub fn all_chunks(&self) -> Result<Vec<(String, Vec<String>)>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(CHUNKS)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (k, v) = entry?;
            result.push((
                k.value().to_string(),
                serde_json::from_slice(v.value())?,
            ));
        }
        Ok(result)
    }

    // -- Searches --

    /// Append a search record, returning its sequence number.
    pub fn record_search(&self, record: &SearchRecord) -> Result<u64> {
        let bytes = serde_json::to_vec(record)?;
        let txn = self.db.begin_write()?;
        let key = {
            let mut table = txn.open_table(SEARCHES)?;
            let key = match table.last()? {
                Some((k, _v)) => k.value() + 1,
                None => 1,
            };
            table.insert(key, bytes.as_slice())?;
            key
        };
        txn.commit()?;
        Ok(key)
    }

    /// All search records, oldest first.
    pub fn list_searches(&self) -> Result<Vec<(u64, SearchRecord)>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SEARCHES)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (k, v) = entry?;
            result.push((k.value(), serde_json::from_slice(v.value())?));
        }
        Ok(result)
    }

    /// Remove multiple search records in a single transaction.
    pub fn remove_searches(&self, keys: &[u64]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SEARCHES)?;
            for &key in keys {
                table.remove(key)?;
            }
        }
        txn.commit()?;
        Ok(())
    }
}

impl std::fmt::Debug for DocumentDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentDb").finish_non_exhaustive()
    }
}
