use dyngen::emitter::{Dialect, EmitError, SourceWriter};
use proptest::prelude::*;
use proptest::test_runner::Config as ProptestConfig;

#[derive(Debug, Clone)]
enum Op {
    Open,
    Close,
    Line(String),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Open),
        Just(Op::Close),
        "[a-z]{1,8};".prop_map(Op::Line),
    ]
}

fn arb_dialect() -> impl Strategy<Value = Dialect> {
    prop_oneof![Just(Dialect::Rust), Just(Dialect::Wat)]
}

fn emit_guarded(writer: &mut SourceWriter, lines: &[String], depth: usize) {
    if depth == 0 {
        for line in lines {
            writer.write_line(line);
        }
        return;
    }
    let mut guard = writer.scoped_block(Some("fn nested()"));
    guard.write_line("let _ = 0;");
    emit_guarded(&mut guard, lines, depth - 1);
}

fn emit_explicit(writer: &mut SourceWriter, lines: &[String], depth: usize) {
    if depth == 0 {
        for line in lines {
            writer.write_line(line);
        }
        return;
    }
    writer.write_line("fn nested()");
    writer.start_block();
    writer.write_line("let _ = 0;");
    emit_explicit(writer, lines, depth - 1);
    writer.finish_block(None).unwrap();
}

proptest! {
    #![proptest_config(ProptestConfig {
        failure_persistence: None,
        .. ProptestConfig::default()
    })]

    #[test]
    fn rendering_succeeds_iff_blocks_balance(
        ops in prop::collection::vec(arb_op(), 0..40),
        dialect in arb_dialect(),
    ) {
        let mut writer = SourceWriter::for_dialect(dialect);
        let mut depth = 0usize;

        for op in &ops {
            match op {
                Op::Open => {
                    writer.start_block();
                    depth += 1;
                }
                Op::Close => {
                    let before = writer.rendered_text().ok();
                    let result = writer.finish_block(None);
                    if depth == 0 {
                        prop_assert_eq!(result, Err(EmitError::CloseWithoutOpen));
                        prop_assert_eq!(writer.rendered_text().ok(), before);
                    } else {
                        prop_assert!(result.is_ok());
                        depth -= 1;
                    }
                }
                Op::Line(text) => writer.write_line(text),
            }
            prop_assert_eq!(writer.indentation_level(), depth);
        }

        match writer.rendered_text() {
            Ok(_) => prop_assert_eq!(depth, 0),
            Err(EmitError::UnclosedBlocks(labels)) => prop_assert_eq!(labels.len(), depth),
            Err(other) => prop_assert!(false, "unexpected error {:?}", other),
        }
    }

    #[test]
    fn guards_match_explicit_pairs(
        lines in prop::collection::vec("[a-z]{1,6};", 0..6),
        depth in 0usize..5,
        dialect in arb_dialect(),
    ) {
        let mut guarded = SourceWriter::for_dialect(dialect);
        emit_guarded(&mut guarded, &lines, depth);

        let mut explicit = SourceWriter::for_dialect(dialect);
        emit_explicit(&mut explicit, &lines, depth);

        prop_assert_eq!(guarded.into_text().unwrap(), explicit.into_text().unwrap());
    }
}
