//! CLI parsing tests for compile command using the test DSL.

#[cfg(test)]
mod tests {
    use crate::cli::Args;
    use crate::dialect::Dialect;
    use clap::Parser;
    use rstest::rstest;
    use std::path::PathBuf;

    crate::cli_required_arg_test! {
        command: "compile",
        test_name: test_requires_dialect,
        required_arg: "--dialect",
    }

    crate::cli_option_test! {
        command: "compile",
        variant: Compile,
        test_name: test_with_dialect,
        args: ["--dialect", "postgres"],
        field: dialect,
        expected: Dialect::postgres(),
    }

    crate::cli_option_test! {
        command: "compile",
        variant: Compile,
        test_name: test_dialect_alias,
        args: ["-D", "PostgreSQL"],
        field: dialect,
        expected: Dialect::postgres(),
    }

    crate::cli_option_test! {
        command: "compile",
        variant: Compile,
        test_name: test_with_file,
        args: ["--dialect", "mysql", "query.json"],
        field: file,
        expected: Some(PathBuf::from("query.json")),
    }

    crate::cli_error_test! {
        command: "compile",
        test_name: test_unknown_dialect_rejected,
        args: ["--dialect", "oracle"],
    }
}
