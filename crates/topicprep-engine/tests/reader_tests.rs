use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use topicprep_core::{AlignmentDefect, Error, HierarchyViolation, SubdocumentEntry};
use topicprep_engine::{
    parse_line, AssignmentReader, ReassemblyTables, StateLayout, StateReader, TopicHierarchy, WithTokenIndex,
};
use topicprep_text::Vocabulary;

type MemReader = AssignmentReader<Cursor<Vec<u8>>, Cursor<Vec<u8>>>;

/// Two documents, two subdocuments each:
/// doc 0 = "alpha beta gamma alpha", doc 1 = "delta beta".
fn subdocuments() -> Vec<(SubdocumentEntry, Vec<(&'static str, usize)>)> {
    let entry = |name: &str, doc_index, offset_base, token_count| SubdocumentEntry {
        name: name.to_string(),
        doc_index,
        offset_base,
        token_count,
    };
    vec![
        (entry("d0_a", 0, 0, 2), vec![("alpha", 0), ("beta", 6)]),
        (entry("d0_b", 0, 11, 2), vec![("gamma", 11), ("alpha", 17)]),
        (entry("d1_a", 1, 0, 1), vec![("delta", 0)]),
        (entry("d1_b", 1, 6, 1), vec![("beta", 6)]),
    ]
}

fn vocabulary() -> Vocabulary {
    let mut vocabulary = Vocabulary::new();
    for word in ["alpha", "beta", "gamma", "delta"] {
        vocabulary.encode(word, word);
    }
    vocabulary
}

fn reader_over(table: Vec<(SubdocumentEntry, Vec<(&'static str, usize)>)>, state: &str, layout: StateLayout) -> MemReader {
    let mut offsets = String::new();
    let mut entries = Vec::new();
    for (entry, tokens) in table {
        offsets.push_str(&serde_json::to_string(&tokens).unwrap());
        offsets.push('\n');
        entries.push(entry);
    }
    let tables = ReassemblyTables { subdocuments: entries, vocabulary: Arc::new(vocabulary()) };
    let records = StateReader::new(Cursor::new(state.as_bytes().to_vec()), layout, Path::new("test.outputstate"));
    AssignmentReader::new(records, Cursor::new(offsets.into_bytes()), Path::new("token_offsets.jsonl"), tables)
}

fn flat(state: &str) -> MemReader { reader_over(subdocuments(), state, StateLayout::Flat) }

const HEADER: &str = "#doc source pos typeindex type topic\n#alpha : 0.1 0.1\n";

const FULL_STATE: &str = "0 d0_a 0 0 0 4\n0 d0_a 1 1 1 2\n1 d0_b 0 2 2 4\n1 d0_b 1 0 0 1\n2 d1_a 0 3 3 0\n3 d1_b 0 1 1 2\n";

#[test]
fn reassembles_every_token_in_engine_order() {
    let state = format!("{HEADER}{FULL_STATE}");
    let got: Vec<_> = flat(&state).collect::<Result<_, _>>().expect("clean state");

    let summary: Vec<(usize, usize, &str, u32)> =
        got.iter().map(|a| (a.doc_index, a.offset, a.token.as_str(), a.topics[0])).collect();
    assert_eq!(
        summary,
        [(0, 0, "alpha", 4), (0, 6, "beta", 2), (0, 11, "gamma", 4), (0, 17, "alpha", 1), (1, 0, "delta", 0), (1, 6, "beta", 2)]
    );
    assert!(got.iter().all(|a| a.token == a.abstraction));
}

#[test]
fn token_index_restarts_per_document() {
    let indexed: Vec<_> = flat(FULL_STATE).with_token_index().collect::<Result<_, _>>().unwrap();
    let positions: Vec<(usize, usize)> = indexed.iter().map(|i| (i.assignment.doc_index, i.token_index)).collect();
    assert_eq!(positions, [(0, 0), (0, 1), (0, 2), (0, 3), (1, 0), (1, 1)]);
}

#[test]
fn skipping_a_subdocument_with_tokens_is_fatal() {
    let state = "0 d0_a 0 0 0 4\n0 d0_a 1 1 1 2\n1 d0_b 0 2 2 4\n1 d0_b 1 0 0 1\n3 d1_b 0 1 1 2\n";
    let mut reader = flat(state);
    for _ in 0..4 {
        reader.next().unwrap().expect("first four lines are valid");
    }
    match reader.next() {
        Some(Err(Error::Alignment(AlignmentDefect::SkippedSubdocument { line, found, skipped, name, token_count }))) => {
            assert_eq!((line, found, skipped, token_count), (5, 3, 2, 1));
            assert_eq!(name, "d1_a");
        }
        other => panic!("expected skipped subdocument, got {other:?}"),
    }
    assert!(reader.next().is_none(), "reader stops after a defect");
}

#[test]
fn subdocuments_without_tokens_may_be_passed_over() {
    let mut table = subdocuments();
    table[2].0.token_count = 0;
    table[2].1.clear();
    let state = "0 d0_a 0 0 0 4\n0 d0_a 1 1 1 2\n1 d0_b 0 2 2 4\n1 d0_b 1 0 0 1\n3 d1_b 0 1 1 2\n";
    let got: Vec<_> = reader_over(table, state, StateLayout::Flat).collect::<Result<_, _>>().unwrap();
    assert_eq!(got.len(), 5);
    assert_eq!((got[4].doc_index, got[4].offset), (1, 6));
}

#[test]
fn sequence_going_backwards_is_fatal() {
    let state = "0 d0_a 0 0 0 4\n0 d0_a 1 1 1 2\n1 d0_b 0 2 2 4\n1 d0_b 1 0 0 1\n0 d0_a 0 0 0 4\n";
    let err = flat(state).find_map(Result::err).unwrap();
    assert!(matches!(
        err,
        Error::Alignment(AlignmentDefect::OutOfOrderSubdocument { line: 5, previous: 1, found: 0, .. })
    ));
}

#[test]
fn leaving_a_subdocument_early_is_fatal() {
    let err = flat("0 d0_a 0 0 0 4\n1 d0_b 0 2 2 4\n").find_map(Result::err).unwrap();
    assert!(matches!(
        err,
        Error::Alignment(AlignmentDefect::TruncatedSubdocument { sequence: 0, consumed: 1, expected: 2, .. })
    ));

    let err = flat("0 d0_a 0 0 0 4\n0 d0_a 1 1 1 2\n").find_map(Result::err).unwrap();
    assert!(matches!(
        err,
        Error::Alignment(AlignmentDefect::TruncatedSubdocument { sequence: 1, consumed: 0, expected: 2, .. })
    ));
}

#[test]
fn record_level_mismatches_carry_coordinates() {
    let cases: [(&str, fn(&Error) -> bool); 6] = [
        ("0 d0_x 0 0 0 4\n", |e| {
            matches!(e, Error::Alignment(AlignmentDefect::SubdocumentNameMismatch { line: 1, sequence: 0, .. }))
        }),
        ("0 d0_a 1 1 1 4\n", |e| {
            matches!(e, Error::Alignment(AlignmentDefect::TokenPositionMismatch { expected: 0, found: 1, .. }))
        }),
        ("0 d0_a 0 0 1 4\n", |e| {
            matches!(e, Error::Alignment(AlignmentDefect::AbstractionMismatch { position: 0, .. }))
        }),
        ("0 d0_a 0 0 9 4\n", |e| matches!(e, Error::Alignment(AlignmentDefect::UnknownVocabularyId { id: 9, known: 4, .. }))),
        ("7 d9 0 0 0 4\n", |e| matches!(e, Error::Alignment(AlignmentDefect::UnknownSubdocument { sequence: 7, known: 4, .. }))),
        ("0 d0_a 0 0 0 4\n0 d0_a 1 1 1 2\n0 d0_a 2 1 1 2\n", |e| {
            matches!(e, Error::Alignment(AlignmentDefect::ExtraToken { position: 2, token_count: 2, .. }))
        }),
    ];
    for (state, check) in cases {
        let err = flat(state).find_map(Result::err).unwrap();
        assert!(check(&err), "state {state:?} gave {err}");
    }
}

#[test]
fn offset_index_must_agree_with_table() {
    let mut table = subdocuments();
    table[0].1.pop();
    let err = reader_over(table, "0 d0_a 0 0 0 4\n", StateLayout::Flat).find_map(Result::err).unwrap();
    assert!(matches!(
        err,
        Error::Alignment(AlignmentDefect::IndexLengthMismatch { expected: 2, found: 1, .. })
    ));
}

#[test]
fn unparsable_lines_are_malformed_records() {
    let err = flat("#comment\n0 d0_a zero 0 0 4\n").find_map(Result::err).unwrap();
    match err {
        Error::MalformedRecord { line, reason, .. } => {
            assert_eq!(line, 2);
            assert!(reason.contains("token position"), "{reason}");
        }
        other => panic!("expected malformed record, got {other}"),
    }
}

#[test]
fn parse_line_layouts() {
    let path = Path::new("state");
    assert_eq!(parse_line(StateLayout::Flat, 1, "#doc source pos", path).unwrap(), None);
    assert_eq!(parse_line(StateLayout::Flat, 2, "   ", path).unwrap(), None);

    let record = parse_line(StateLayout::Flat, 3, "2 doc 5 17 4 9", path).unwrap().unwrap();
    assert_eq!((record.sequence, record.position, record.type_index, record.word_id), (2, 5, 17, 4));
    assert_eq!(record.topics, [9]);

    assert!(matches!(
        parse_line(StateLayout::Flat, 4, "2 doc 5 17 4 9 1", path),
        Err(Error::MalformedRecord { line: 4, .. })
    ));

    let record = parse_line(StateLayout::Hierarchical, 5, "0 doc 0 3 3 0 4 11", path).unwrap().unwrap();
    assert_eq!(record.topics, [11, 4, 0], "leaf first");
    assert!(parse_line(StateLayout::Hierarchical, 6, "0 doc 0 3 3", path).is_err());
}

#[test]
fn hierarchical_paths_build_parent_child_edges() {
    let state = "0 d0_a 0 0 0 0 1 5\n0 d0_a 1 1 1 0 1 6\n1 d0_b 0 2 2 0 2 7\n1 d0_b 1 0 0 0 1 5\n\
                 2 d1_a 0 3 3 0 2 7\n3 d1_b 0 1 1 0 1 6\n";
    let mut reader = reader_over(subdocuments(), state, StateLayout::Hierarchical);
    let got: Vec<_> = reader.by_ref().collect::<Result<_, _>>().unwrap();
    assert_eq!(got[0].topics, [5, 1, 0]);
    assert_eq!(got[0].leaf_topic(), Some(5));

    let hierarchy = reader.into_hierarchy().expect("hierarchical layout");
    let edges: Vec<_> = hierarchy.edges().collect();
    assert_eq!(edges, [(0, 1), (0, 2), (1, 5), (1, 6), (2, 7)]);
    assert_eq!(hierarchy.children_of(1).collect::<Vec<_>>(), [5, 6]);
}

#[test]
fn reversed_path_is_a_hierarchy_violation() {
    // Leaf-first paths [2,1,0] then [0,1,2]; the file lists them root first.
    let state = "0 d0_a 0 0 0 0 1 2\n0 d0_a 1 1 1 2 1 0\n";
    let mut reader = reader_over(subdocuments(), state, StateLayout::Hierarchical);
    assert_eq!(reader.next().unwrap().unwrap().topics, [2, 1, 0]);
    match reader.next() {
        Some(Err(Error::Hierarchy(HierarchyViolation::ReverseEdge { parent, child, path }))) => {
            assert_eq!((parent, child), (1, 0));
            assert_eq!(path, [0, 1, 2]);
        }
        other => panic!("expected reverse edge, got {other:?}"),
    }
}

#[test]
fn hierarchy_rejects_self_edges_and_longer_cycles() {
    let mut hierarchy = TopicHierarchy::new();
    hierarchy.add_path(&[1, 0]).unwrap();
    hierarchy.add_path(&[2, 1]).unwrap();
    hierarchy.add_path(&[2, 1, 0]).unwrap();
    assert_eq!(hierarchy.len(), 2);

    assert!(matches!(hierarchy.add_path(&[0, 2]), Err(HierarchyViolation::Cycle { parent: 2, child: 0, .. })));
    assert!(matches!(hierarchy.add_path(&[3, 3]), Err(HierarchyViolation::SelfEdge { topic: 3, .. })));
    assert!(hierarchy.contains(0, 1));
    assert!(!hierarchy.contains(1, 0));
}
