//! Output formatting for compile command results.

use super::execute::CompileResult;
use crate::output::{display_value, Outputable};

impl Outputable for CompileResult {
    fn to_text(&self) -> String {
        if self.params.is_empty() {
            return self.sql.clone();
        }
        let params: Vec<String> = self.params.iter().map(display_value).collect();
        format!("{}\n-- params: {}", self.sql, params.join(", "))
    }
}
