//! Persistence of finished audits. The remote list store is an external
//! collaborator reachable through the [`HistoryStore`] trait; the engine
//! ships a JSON-file-backed local store used as the offline fallback.

use crate::error::{AuditError, Result};
use crate::report::AuditReport;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// One persisted audit run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: String,
    /// RFC 3339 creation timestamp.
    pub created: String,
    pub report: AuditReport,
}

impl AuditRecord {
    pub fn new(report: AuditReport) -> Self {
        let now = chrono::Utc::now();
        AuditRecord {
            id: format!("audit-{}", now.format("%Y%m%d%H%M%S%3f")),
            created: now.to_rfc3339(),
            report,
        }
    }
}

/// list/get/delete surface shared by the remote store client and the local
/// fallback.
pub trait HistoryStore {
    fn save(&mut self, record: &AuditRecord) -> Result<()>;
    fn list(&self) -> Result<Vec<AuditRecord>>;
    fn get(&self, id: &str) -> Result<AuditRecord>;
    fn delete(&mut self, id: &str) -> Result<()>;
}

/// Local fallback store: a single JSON file holding all records.
pub struct FileHistoryStore {
    path: PathBuf,
}

impl FileHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileHistoryStore { path: path.into() }
    }

    fn load(&self) -> Result<Vec<AuditRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    fn persist(&self, records: &[AuditRecord]) -> Result<()> {
        fs::write(&self.path, serde_json::to_string_pretty(records)?)?;
        Ok(())
    }
}

impl HistoryStore for FileHistoryStore {
    fn save(&mut self, record: &AuditRecord) -> Result<()> {
        let mut records = self.load()?;
        records.retain(|r| r.id != record.id);
        records.push(record.clone());
        self.persist(&records)
    }

    fn list(&self) -> Result<Vec<AuditRecord>> {
        self.load()
    }

    fn get(&self, id: &str) -> Result<AuditRecord> {
        self.load()?
            .into_iter()
            .find(|r| r.id == id)
            .ok_or_else(|| AuditError::RecordNotFound(id.to_string()))
    }

    fn delete(&mut self, id: &str) -> Result<()> {
        let mut records = self.load()?;
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Err(AuditError::RecordNotFound(id.to_string()));
        }
        self.persist(&records)
    }
}

/// Saves to the primary store, falling back to the local one when the remote
/// backend is unreachable. A store failure never surfaces as an audit error.
pub fn save_with_fallback(
    primary: &mut dyn HistoryStore,
    fallback: &mut dyn HistoryStore,
    record: &AuditRecord,
) -> Result<()> {
    match primary.save(record) {
        Ok(()) => Ok(()),
        Err(err) => {
            warn!("Primary history store unavailable ({}), using local fallback", err);
            fallback.save(record)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::AuditContext;
    use crate::report::{AuditReport, ReportMetadata};

    fn empty_report() -> AuditReport {
        let context = AuditContext::from_contracts(&[]);
        AuditReport {
            sections: crate::rules::audit_contracts(&[], &context),
            context,
            metadata: ReportMetadata::new("Maria Silva", &[], &context),
        }
    }

    fn record_with_id(id: &str) -> AuditRecord {
        let mut record = AuditRecord::new(empty_report());
        record.id = id.to_string();
        record
    }

    #[test]
    fn test_file_store_save_list_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileHistoryStore::new(dir.path().join("history.json"));

        store.save(&record_with_id("audit-1")).unwrap();
        store.save(&record_with_id("audit-2")).unwrap();

        assert_eq!(store.list().unwrap().len(), 2);
        assert_eq!(store.get("audit-1").unwrap().id, "audit-1");

        store.delete("audit-1").unwrap();
        assert_eq!(store.list().unwrap().len(), 1);
        assert!(matches!(store.get("audit-1"), Err(AuditError::RecordNotFound(_))));
        assert!(matches!(store.delete("missing"), Err(AuditError::RecordNotFound(_))));
    }

    #[test]
    fn test_save_overwrites_same_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileHistoryStore::new(dir.path().join("history.json"));
        store.save(&record_with_id("audit-1")).unwrap();
        store.save(&record_with_id("audit-1")).unwrap();
        assert_eq!(store.list().unwrap().len(), 1);
    }

    struct FailingStore;

    impl HistoryStore for FailingStore {
        fn save(&mut self, _record: &AuditRecord) -> Result<()> {
            Err(AuditError::ExternalStore("ligação recusada".to_string()))
        }
        fn list(&self) -> Result<Vec<AuditRecord>> {
            Err(AuditError::ExternalStore("ligação recusada".to_string()))
        }
        fn get(&self, id: &str) -> Result<AuditRecord> {
            Err(AuditError::RecordNotFound(id.to_string()))
        }
        fn delete(&mut self, _id: &str) -> Result<()> {
            Err(AuditError::ExternalStore("ligação recusada".to_string()))
        }
    }

    #[test]
    fn test_fallback_on_remote_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut primary = FailingStore;
        let mut fallback = FileHistoryStore::new(dir.path().join("history.json"));

        save_with_fallback(&mut primary, &mut fallback, &record_with_id("audit-1")).unwrap();
        assert_eq!(fallback.list().unwrap().len(), 1);
    }
}
