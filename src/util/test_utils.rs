use crate::{
    arena::DEFAULT_CAPACITY,
    parser,
    token::Spanned,
    type_checker::Checker,
    util::{
        fmt::{tree, Context, Show},
        intern::Interner,
    },
};

pub fn format_error<E>(i: &Interner<str>, e: &Spanned<E>) -> String
where
    Spanned<E>: Show,
{
    let ctx = Context { ident_interner: i };
    format!("{:#}", e.display(&ctx))
}

/// Each variant contains the input.
pub enum Test {
    ParserProgram(&'static str),
    ParserExpr(&'static str),
    CheckerProgram(&'static str),
}

pub enum Assertion {
    TreeOk(&'static str),
    ExpectedError(&'static str),
}

/// Runs the stages up to the one under test, returning the printed tree (empty
/// on failure) and the formatted error, if any.
#[track_caller]
pub fn run_pipeline(test: Test) -> (String, Option<String>) {
    let tokens_buf = &mut Vec::with_capacity(1024);
    let interner = &mut Interner::with_capacity(128);

    match test {
        Test::ParserProgram(input) => {
            match parser::parse_program(input, tokens_buf, interner, DEFAULT_CAPACITY) {
                Ok(prog) => (tree::print_program_string(interner, &prog), None),
                Err(error) => (String::new(), Some(format_error(interner, &error))),
            }
        }
        Test::ParserExpr(input) => {
            match parser::parse_expr(input, tokens_buf, interner, DEFAULT_CAPACITY) {
                Ok((expr, nodes)) => (tree::print_expr_string(interner, &nodes, expr), None),
                Err(error) => (String::new(), Some(format_error(interner, &error))),
            }
        }
        Test::CheckerProgram(input) => {
            let mut prog =
                match parser::parse_program(input, tokens_buf, interner, DEFAULT_CAPACITY) {
                    Ok(prog) => prog,
                    Err(error) => return (String::new(), Some(format_error(interner, &error))),
                };
            let error = Checker::with_capacity(64)
                .check(&mut prog)
                .err()
                .map(|error| format_error(interner, &error));
            (tree::print_program_string(interner, &prog), error)
        }
    }
}

#[track_caller]
pub fn run_assertion(
    assertion: Assertion,
    formatted_actual_tree: &str,
    formatted_actual_error: Option<&str>,
) {
    match assertion {
        Assertion::TreeOk(expected_tree) => {
            ::pretty_assertions::assert_eq!(formatted_actual_error, None);
            ::pretty_assertions::assert_eq!(formatted_actual_tree.trim(), expected_tree.trim());
        }
        Assertion::ExpectedError(expected_error) => {
            ::pretty_assertions::assert_eq!(formatted_actual_error, Some(expected_error));
        }
    }
}

macro_rules! tree_tests {
    (
        use $test_kind:ident;

        $(
            fn $test_name:ident() {
                let $source_kind:ident = $source:expr;
                $($assertions_tt:tt)*
            }
        )*
    ) => {
        $(
            #[test]
            fn $test_name() {
                let test: crate::util::test_utils::Test =
                    tree_tests!(@@get_test($test_kind, $source_kind), $source);
                let (formatted_actual_tree, formatted_actual_error) =
                    crate::util::test_utils::run_pipeline(test);
                let ctx = (&formatted_actual_tree, formatted_actual_error.as_deref());
                tree_tests!(@@expand_assertions, ctx, [$($assertions_tt)*]);
            }
        )*
    };

    (@@expand_assertions, $ctx:expr, []) => {};
    (@@expand_assertions, $ctx:expr, [
        let $assertion:ident = $assertion_expected:expr;
        $($rest_assertions_tt:tt)*
    ]) => {
        crate::util::test_utils::run_assertion(
            tree_tests!(@@assertion, $assertion, $assertion_expected),
            $ctx.0,
            $ctx.1,
        );
        tree_tests!(@@expand_assertions, $ctx, [$($rest_assertions_tt)*]);
    };

    (@@assertion, tree_ok, $expected:expr) => {
        crate::util::test_utils::Assertion::TreeOk(::indoc::indoc! { $expected })
    };
    (@@assertion, expected_error, $expected:expr) => {
        crate::util::test_utils::Assertion::ExpectedError($expected)
    };

    (@@get_test(parser, program), $source:expr) => {
        crate::util::test_utils::Test::ParserProgram($source)
    };
    (@@get_test(parser, expr), $source:expr) => {
        crate::util::test_utils::Test::ParserExpr($source)
    };
    (@@get_test(checker, program), $source:expr) => {
        crate::util::test_utils::Test::CheckerProgram($source)
    };
}
pub(crate) use tree_tests;
