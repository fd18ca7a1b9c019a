//! Output formatting for query command results.

use super::execute::QueryResult;
use crate::output::{display_value, Outputable};

impl Outputable for QueryResult {
    fn to_text(&self) -> String {
        if self.rows.is_empty() {
            return "No rows.".to_string();
        }

        let mut lines = Vec::with_capacity(self.rows.len() + 3);
        lines.push(self.columns.join("\t"));
        for row in &self.rows {
            let cells: Vec<String> = row.values().iter().map(display_value).collect();
            lines.push(cells.join("\t"));
        }
        lines.push(String::new());
        lines.push(format!("{} row(s)", self.row_count));
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Row, Value};
    use rstest::{fixture, rstest};

    #[fixture]
    fn empty_result() -> QueryResult {
        QueryResult::default()
    }

    #[fixture]
    fn two_rows() -> QueryResult {
        QueryResult::from_rows(vec![
            Row::new().with("id", 1).with("name", "ada"),
            Row::new().with("id", 2).with("name", Value::Null),
        ])
    }

    crate::output_text_test! {
        test_name: test_text_empty,
        fixture: empty_result,
        fixture_type: QueryResult,
        expected: "No rows.",
    }

    crate::output_text_test! {
        test_name: test_text_rows,
        fixture: two_rows,
        fixture_type: QueryResult,
        expected: "id\tname\n1\t'ada'\n2\tNULL\n\n2 row(s)",
    }

    crate::output_json_test! {
        test_name: test_json_rows,
        fixture: two_rows,
        fixture_type: QueryResult,
        assertions: {
            "row_count": 2,
            "columns": serde_json::json!(["id", "name"]),
            "rows": serde_json::json!([{"id": 1, "name": "ada"}, {"id": 2, "name": null}]),
        },
    }
}
