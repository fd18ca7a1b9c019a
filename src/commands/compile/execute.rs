use std::error::Error;

use serde::Serialize;

use super::CompileCmd;
use crate::commands::{read_descriptor, Execute};
use crate::dialect::Dialect;
use crate::query::descriptor::is_write_descriptor;
use crate::query::{Query, Statement};
use crate::value::Value;

/// Result of the compile command
#[derive(Debug, Clone, Serialize)]
pub struct CompileResult {
    pub dialect: String,
    pub sql: String,
    pub params: Vec<Value>,
}

impl CompileResult {
    pub fn from_descriptor(dialect: Dialect, descriptor: &serde_json::Value) -> Result<Self, Box<dyn Error>> {
        let compiled = if is_write_descriptor(descriptor) {
            Statement::from_descriptor(descriptor)?.compile(&dialect)?
        } else {
            Query::from_descriptor(descriptor)?.compile(&dialect)?
        };
        Ok(Self {
            dialect: dialect.to_string(),
            sql: compiled.sql,
            params: compiled.params,
        })
    }
}

impl Execute for CompileCmd {
    type Output = CompileResult;

    fn execute(self, _db_url: Option<&str>) -> Result<Self::Output, Box<dyn Error>> {
        let descriptor = read_descriptor(self.file.as_deref())?;
        CompileResult::from_descriptor(self.dialect, &descriptor)
    }
}
