//! Property-based tests for the chunker.
//!
//! Random C-like sources (structured lines mixed with comments, literals and
//! stray braces) must always satisfy:
//! 1. Round-trip: primary contents concatenate back to the input
//! 2. Budget: chunks fit the budget unless flagged `oversized`
//! 3. Overlap: repeated text is the byte-identical tail of the previous chunk

use context_scope_chunker::{ChunkKind, Chunker, ChunkerConfig, CodeChunk, SizeUnit, SourceFile};
use proptest::prelude::*;

// -- Source Generation Strategies --

/// One line of C-like code, structural or not
fn line_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("namespace outer {\n".to_string()),
        Just("class Widget : public Base {\n".to_string()),
        Just("struct Point {\n".to_string()),
        Just("template<typename T>\n".to_string()),
        Just("void run(int n) {\n".to_string()),
        Just("if (a < b && c > d) {\n".to_string()),
        Just("auto f = [](int x) { return x; };\n".to_string()),
        Just("}\n".to_string()),
        Just("};\n".to_string()),
        Just("    int x = 1;\n".to_string()),
        Just("// } comment with a brace {\n".to_string()),
        Just("/* block { comment */\n".to_string()),
        Just("const char* s = \"{ not code }\";\n".to_string()),
        Just("char c = '}';\n".to_string()),
        Just("#define OPEN {\n".to_string()),
        Just("\n".to_string()),
        prop::string::string_regex("[a-z{}();\"'/* \t<>=:#é]{0,60}\n").expect("valid regex"),
    ]
}

fn source_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(line_strategy(), 0..80).prop_map(|lines| lines.concat())
}

fn chunker(max_chunk_size: usize, overlap_size: usize) -> Chunker {
    Chunker::new(ChunkerConfig {
        max_chunk_size,
        overlap_size,
        ..ChunkerConfig::default()
    })
    .unwrap()
}

fn check_invariants(text: &str, chunks: &[CodeChunk], budget: usize) -> Result<(), TestCaseError> {
    let rebuilt: String = chunks.iter().map(CodeChunk::primary_content).collect();
    prop_assert_eq!(&rebuilt, text);

    let mut expected_primary = 0;
    for (idx, chunk) in chunks.iter().enumerate() {
        prop_assert_eq!(chunk.primary_start_byte, expected_primary);
        prop_assert_eq!(&text[chunk.start_byte..chunk.end_byte], chunk.content.as_str());
        prop_assert!(chunk.metadata.size <= budget || chunk.is_oversized());
        prop_assert!(chunk.start_line <= chunk.end_line);

        if chunk.start_byte < chunk.primary_start_byte {
            prop_assert_eq!(chunk.metadata.kind, ChunkKind::Fragment);
            let previous = &chunks[idx - 1];
            prop_assert_eq!(previous.end_byte, chunk.primary_start_byte);
            prop_assert!(previous.content.ends_with(chunk.overlap_content()));
            prop_assert!(SizeUnit::Characters.measure(chunk.overlap_content()) * 2 < budget);
        }
        expected_primary = chunk.end_byte;
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn chunks_round_trip_within_budget(
        text in source_strategy(),
        budget in 24usize..400,
        overlap in 0usize..4,
    ) {
        let chunks = chunker(budget, overlap).chunk_str(&text, Some("generated.cpp"));
        check_invariants(&text, &chunks, budget)?;
        prop_assert_eq!(chunks.is_empty(), text.is_empty());
    }

    #[test]
    fn any_text_round_trips(text in "\\PC{0,300}", budget in 24usize..200) {
        for path in ["any.cpp", "any.rs", "any.py", "any.unknown"] {
            let chunks = chunker(budget, 2).chunk_str(&text, Some(path));
            check_invariants(&text, &chunks, budget)?;
        }
    }

    #[test]
    fn batch_matches_single_file_results(
        texts in prop::collection::vec(source_strategy(), 1..6),
    ) {
        let chunker = chunker(120, 1);
        let files: Vec<SourceFile> = texts
            .iter()
            .enumerate()
            .map(|(i, text)| SourceFile::new(format!("f{i}.cpp"), text.clone()))
            .collect();
        let outcomes = chunker.chunk_batch(&files);
        for (file, outcome) in files.iter().zip(outcomes) {
            prop_assert_eq!(outcome.chunks, chunker.chunk(file));
        }
    }
}
