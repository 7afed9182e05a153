//! FrameMacros AST - parser and AST types

pub mod ast;
pub mod parser;
mod to_ir;

pub use ast::*;
pub use parser::{parse_arguments, parse_call, parse_expr, ParseError};
pub use to_ir::UnknownKind;

#[cfg(test)]
mod tests {
    use super::*;
    use framemacros_ir::TransformKind;

    #[test]
    fn test_parse_and_lower_kind() {
        let call = parse_call("@combine(:m = mean(:x))").unwrap();
        assert_eq!(call.transform_kind().unwrap(), TransformKind::Combine);
    }
}
