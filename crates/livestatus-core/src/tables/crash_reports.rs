//! The `crashreports` table, one row per `<component>/<uuid>/` directory.
//!
//! Besides `id` and `component` every file of a report can be fetched as
//! a blob column named `file:<name>`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::debug;

use super::{Context, RowSink, Scope, Table, find_column, primary_key_not_found};
use crate::auth::User;
use crate::column::{Column, ColumnCatalog, ColumnOffsets, Row};
use crate::error::RequestError;

/// Prefix of the dynamic file columns.
const FILE_COLUMN_PREFIX: &str = "file:";

static UUID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("constant UUID pattern compiles")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrashReport {
    pub id: String,
    pub component: String,
}

impl CrashReport {
    fn dir(&self, root: &Path) -> PathBuf {
        root.join(&self.component).join(&self.id)
    }
}

pub struct CrashReportsTable {
    root: Option<PathBuf>,
    catalog: ColumnCatalog,
}

impl CrashReportsTable {
    pub fn new(ctx: &Arc<Context>) -> Self {
        let offsets = ColumnOffsets::new();
        let mut catalog = ColumnCatalog::new();
        catalog.add(Column::string("id", "The ID of a crash report", &offsets, |r: &CrashReport| r.id.clone()));
        catalog.add(Column::string("component", "The component that crashed (gui, agent, check, etc.)", &offsets, |r: &CrashReport| {
            r.component.clone()
        }));
        Self {
            root: ctx.settings.crash_reports_path.clone(),
            catalog,
        }
    }

    /// Every report below the root, sorted by component and id.
    fn reports(&self) -> Vec<CrashReport> {
        let Some(root) = &self.root else {
            return Vec::new();
        };
        let components = match fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("cannot read crash reports in {}: {}", root.display(), e);
                return Vec::new();
            }
        };
        let mut reports = Vec::new();
        for component in components.flatten().filter(|e| e.path().is_dir()) {
            let Ok(ids) = fs::read_dir(component.path()) else {
                continue;
            };
            for id in ids.flatten().filter(|e| e.path().is_dir()) {
                let id = id.file_name().to_string_lossy().into_owned();
                if UUID.is_match(&id) {
                    reports.push(CrashReport {
                        id,
                        component: component.file_name().to_string_lossy().into_owned(),
                    });
                }
            }
        }
        reports.sort_by(|a, b| (&a.component, &a.id).cmp(&(&b.component, &b.id)));
        reports
    }

    fn file_column(&self, column_name: &str, file: &str) -> Result<Arc<Column>, RequestError> {
        if file.is_empty() || file.contains('/') || file == ".." {
            return Err(RequestError::bad_request(format!("invalid file name in column '{column_name}'")));
        }
        let root = self.root.clone().unwrap_or_default();
        let file = file.to_string();
        Ok(Arc::new(Column::blob(
            column_name,
            "A file of the crash report",
            &ColumnOffsets::new(),
            move |r: &CrashReport| fs::read(r.dir(&root).join(&file)).ok(),
        )))
    }
}

impl Table for CrashReportsTable {
    fn name(&self) -> &'static str {
        "crashreports"
    }

    fn name_prefix(&self) -> &'static str {
        "crashreport_"
    }

    fn catalog(&self) -> &ColumnCatalog {
        &self.catalog
    }

    fn column(&self, name: &str) -> Result<Arc<Column>, RequestError> {
        match name.strip_prefix(FILE_COLUMN_PREFIX) {
            Some(file) => self.file_column(name, file),
            None => find_column(&self.catalog, self.name(), self.name_prefix(), name),
        }
    }

    fn answer_query(&self, _scope: &Scope<'_>, sink: RowSink<'_>) -> Result<(), RequestError> {
        for report in self.reports() {
            if !sink(Row::new(&report)) {
                break;
            }
        }
        Ok(())
    }

    fn with_row(
        &self,
        key: &str,
        _user: &User,
        check: &mut dyn for<'r> FnMut(Row<'r>) -> bool,
    ) -> Result<bool, RequestError> {
        match self.reports().into_iter().find(|r| r.id == key) {
            Some(report) => Ok(check(Row::new(&report))),
            None => Err(primary_key_not_found(self.name(), key)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::Value;
    use crate::config::Settings;
    use crate::tables::testing::{context_with, rows};

    const ID: &str = "0d4ecb3c-86b8-11e9-9a0e-001617122312";

    fn table(root: &Path) -> CrashReportsTable {
        let report = root.join("gui").join(ID);
        fs::create_dir_all(&report).unwrap();
        fs::write(report.join("crash.info"), "{\"crash_type\": \"gui\"}").unwrap();
        fs::create_dir_all(root.join("gui").join("not-a-uuid")).unwrap();
        CrashReportsTable::new(&context_with(Settings {
            crash_reports_path: Some(root.to_path_buf()),
            ..Settings::default()
        }))
    }

    #[test]
    fn test_lists_valid_reports() {
        let dir = tempfile::tempdir().unwrap();
        let table = table(dir.path());
        assert_eq!(
            rows(&table, &User::NoAuth, &["component", "id"]),
            vec![vec![Value::from("gui"), Value::from(ID)]]
        );
    }

    #[test]
    fn test_uuid_pattern() {
        assert!(UUID.is_match(ID));
        assert!(UUID.is_match(&ID.to_uppercase()));
        assert!(!UUID.is_match("not-a-uuid"));
        assert!(!UUID.is_match(&format!("{ID}x")));
    }

    #[test]
    fn test_file_columns() {
        let dir = tempfile::tempdir().unwrap();
        let table = table(dir.path());
        assert_eq!(
            rows(&table, &User::NoAuth, &["file:crash.info", "file:missing"]),
            vec![vec![Value::Blob(b"{\"crash_type\": \"gui\"}".to_vec()), Value::Null]]
        );
        assert!(table.column("file:../secret").is_err());
    }

    #[test]
    fn test_missing_root() {
        let table = CrashReportsTable::new(&context_with(Settings::default()));
        assert!(rows(&table, &User::NoAuth, &["id"]).is_empty());
        assert!(table.with_row(ID, &User::NoAuth, &mut |_| true).is_err());
    }
}
