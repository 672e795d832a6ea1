//! SQL extraction behind one strategy-selected `extract` contract (§4.5).
//!
//! Each `sql_wrapping_type` variant is a Rust enum arm rather than a trait
//! object — the three extraction strategies (plus the two MyBatis-CCS config
//! values, which only change *batching* downstream, not extraction) are a
//! closed set known at compile time, so static dispatch and exhaustiveness
//! checking buy more than dynamic dispatch would.

mod jdbc;
mod jpa;

use ca_common::model::{ClassInfo, SqlExtractionOutput};
use ca_config::SqlWrappingType;
use ca_error::DegradationLog;
use ca_xml_mapper::XmlMapperParser;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlWrappingStrategy {
    MyBatis,
    Jdbc,
    Jpa,
}

impl SqlWrappingStrategy {
    /// `mybatis_ccs`/`mybatis_ccs_batch` select a MyBatis-family batching
    /// strategy downstream (§4.8) but extract SQL exactly like plain
    /// `mybatis` — there's no separate extraction behavior to model.
    pub fn from_config(value: SqlWrappingType) -> Self {
        match value {
            SqlWrappingType::MyBatis | SqlWrappingType::MyBatisCcs | SqlWrappingType::MyBatisCcsBatch => {
                SqlWrappingStrategy::MyBatis
            }
            SqlWrappingType::Jdbc => SqlWrappingStrategy::Jdbc,
            SqlWrappingType::Jpa => SqlWrappingStrategy::Jpa,
        }
    }

    /// Extracts one file's `SqlQuery`s. `classes` is the file's parsed Java
    /// model (empty for `.xml` files); `xml_parser` is only consulted by the
    /// MyBatis strategy against XML source.
    pub fn extract(
        &self,
        file: &Path,
        source: &str,
        classes: &[ClassInfo],
        xml_parser: &XmlMapperParser,
        log: &mut DegradationLog,
    ) -> SqlExtractionOutput {
        let is_xml = file
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("xml"))
            .unwrap_or(false);

        match self {
            SqlWrappingStrategy::MyBatis if is_xml => xml_parser.parse(file, source, log),
            // A MyBatis Mapper *interface* declares methods but the SQL body
            // lives in the paired XML; nothing to yield from the Java side.
            SqlWrappingStrategy::MyBatis => empty(file),
            SqlWrappingStrategy::Jdbc if is_xml => empty(file),
            SqlWrappingStrategy::Jdbc => jdbc::extract(file, source, classes),
            SqlWrappingStrategy::Jpa if is_xml => empty(file),
            SqlWrappingStrategy::Jpa => jpa::extract(file, classes),
        }
    }
}

fn empty(file: &Path) -> SqlExtractionOutput {
    SqlExtractionOutput {
        file: file.to_path_buf(),
        sql_queries: Vec::new(),
    }
}
