//! CLI parsing tests for query command using the test DSL.

#[cfg(test)]
mod tests {
    use crate::cli::Args;
    use clap::Parser;
    use rstest::rstest;
    use std::path::PathBuf;

    crate::cli_option_test! {
        command: "query",
        variant: Query,
        test_name: test_with_file,
        args: ["query.json"],
        field: file,
        expected: Some(PathBuf::from("query.json")),
    }

    crate::cli_option_test! {
        command: "query",
        variant: Query,
        test_name: test_stdin_marker,
        args: ["-"],
        field: file,
        expected: Some(PathBuf::from("-")),
    }

    crate::cli_error_test! {
        command: "query",
        test_name: test_extra_positional_rejected,
        args: ["a.json", "b.json"],
    }
}
