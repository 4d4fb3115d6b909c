use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::ReportRow;
use crate::errors::{MetricsError, Result};
use crate::squads::Squad;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Worksheet {
    Sprint,
    Backlog,
    ProjectShare,
}

impl Worksheet {
    pub fn title(&self) -> &'static str {
        match self {
            Worksheet::Sprint => "sprint",
            Worksheet::Backlog => "backlog",
            Worksheet::ProjectShare => "project_share",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub title: String,
    pub rows: Vec<Vec<Value>>,
}

impl Workbook {
    #[cfg(test)]
    pub fn sheet(&self, title: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|sheet| sheet.title == title)
    }

    /// Adds a sheet, replacing one with the same title in place.
    pub fn put_sheet(&mut self, sheet: Sheet) {
        match self.sheets.iter_mut().find(|s| s.title == sheet.title) {
            Some(existing) => *existing = sheet,
            None => self.sheets.push(sheet),
        }
    }

    fn to_xlsx(&self) -> Result<rust_xlsxwriter::Workbook> {
        let mut book = rust_xlsxwriter::Workbook::new();
        for sheet in &self.sheets {
            let worksheet = book.add_worksheet();
            worksheet.set_name(sheet.title.as_str())?;
            for (r, row) in sheet.rows.iter().enumerate() {
                let r = r as u32;
                for (c, value) in row.iter().enumerate() {
                    let c = c as u16;
                    match value {
                        Value::Null => {}
                        Value::Bool(flag) => {
                            worksheet.write_boolean(r, c, *flag)?;
                        }
                        Value::Number(number) => {
                            worksheet.write_number(r, c, number.as_f64().unwrap_or_default())?;
                        }
                        Value::String(text) => {
                            worksheet.write_string(r, c, text.as_str())?;
                        }
                        other => {
                            let text = other.to_string();
                            worksheet.write_string(r, c, text.as_str())?;
                        }
                    }
                }
            }
        }
        Ok(book)
    }
}

/// Collects report sheets per squad and saves them as one `.xlsx` workbook
/// per squad.
pub struct WorkbookWriter {
    dir: PathBuf,
    books: BTreeMap<Squad, Workbook>,
}

impl WorkbookWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            books: BTreeMap::new(),
        }
    }

    pub fn path_for(&self, squad: Squad) -> PathBuf {
        self.dir.join(squad.workbook_name())
    }

    #[cfg(test)]
    pub fn workbook(&self, squad: Squad) -> Option<&Workbook> {
        self.books.get(&squad)
    }

    /// Removes every workbook from a previous run.
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_dir_all(&self.dir) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(MetricsError::Report(format!(
                "failed to clear {}: {}",
                self.dir.display(),
                err
            ))),
        }
    }

    /// Adds `rows` as a sheet of the squad's workbook, replacing a sheet with
    /// the same title. The header is taken from the first row's columns.
    pub fn write_sheet(&mut self, squad: Squad, title: &str, rows: &[ReportRow]) {
        let mut data = Vec::with_capacity(rows.len() + 1);
        if let Some(first) = rows.first() {
            data.push(first.keys().map(|key| Value::from(key.as_str())).collect());
        }
        for row in rows {
            data.push(row.values().cloned().collect());
        }

        self.books.entry(squad).or_default().put_sheet(Sheet {
            title: title.to_string(),
            rows: data,
        });
    }

    /// Writes every collected workbook. Returns the saved paths.
    pub fn save(&self) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(&self.dir)?;
        let mut saved = Vec::with_capacity(self.books.len());
        for (squad, workbook) in &self.books {
            let path = self.path_for(*squad);
            workbook
                .to_xlsx()?
                .save(&path)
                .map_err(|e| MetricsError::Report(format!("failed to write {}: {}", path.display(), e)))?;
            saved.push(path);
        }
        Ok(saved)
    }
}
