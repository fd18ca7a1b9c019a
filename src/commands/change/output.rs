//! Output formatting for change command results.

use super::execute::ChangeResult;
use crate::output::Outputable;

impl Outputable for ChangeResult {
    fn to_text(&self) -> String {
        let verb = match self.statement {
            "insert" => "inserted into",
            _ => "updated in",
        };
        let mut text = format!("{} row(s) {} {}", self.affected, verb, self.table);
        if let Some(id) = &self.insert_id {
            text.push_str(&format!("\nid: {}", id));
        }
        text
    }
}
