// Integration tests for tokenizing and parsing complete CIF inputs.

use ciffile::{
    read_str, CaseNormalization, ParseErrorKind, ReadOptions, TokenKind, Tokenizer, Variant,
};

#[test]
fn test_minimal_cif1_file() {
    let options = ReadOptions::new().variant(Variant::Cif1);
    let mut file = read_str("data_t\n_x 'hello'\n", &options).expect("minimal file parses");
    assert!(file.parse_errors().is_empty());

    let block = file.first_block().unwrap();
    assert_eq!(block.code(), "t");
    assert_eq!(block.categories().len(), 1);

    let category = block.category_mut("x").unwrap();
    assert_eq!(category.item_names(), vec!["x"]);
    let table = category.table();
    assert_eq!(table.height(), 1);
    assert_eq!(
        table.column("x").unwrap().get(0),
        Some(&ciffile::Cell::Str("hello".to_string()))
    );
}

#[test]
fn test_parse_simple_mmcif() {
    let cif = r#"
# Simple mmCIF file for testing
data_simple
_struct.title          'Test Structure'
_cell.length_a         10.5
_cell.length_b         20.25
"#;
    let mut file = read_str(cif, &ReadOptions::default()).expect("simple file parses");
    let block = file.first_block().unwrap();
    assert_eq!(block.code(), "simple");
    assert_eq!(block.categories().len(), 2);
    assert_eq!(block.category("struct").unwrap().height(), 1);
    assert_eq!(block.category("cell").unwrap().item_names().len(), 2);
}

#[test]
fn test_parse_loop_structure() {
    let cif = r#"
data_atoms
loop_
_atom_site.label
_atom_site.type_symbol
_atom_site.fract_x
C1   C   0.1234
N1   N   0.2345
O1   O   0.3456
"#;
    let mut file = read_str(cif, &ReadOptions::default()).expect("loop parses");
    let atoms = file
        .first_block()
        .unwrap()
        .category_mut("atom_site")
        .unwrap();
    assert_eq!(atoms.table().height(), 3);
    assert_eq!(
        atoms.item_names(),
        vec!["label", "type_symbol", "fract_x"]
    );
    let labels = atoms.table().column("label").unwrap();
    assert_eq!(labels.get(2), Some(&ciffile::Cell::Str("O1".to_string())));
}

#[test]
fn test_loop_shape_value_count() {
    // Loop shape: rows x columns must equal the number of consumed values.
    let cif = "data_s\nloop_\n_a.x _a.y _a.z\n1 2 3 4 5 6\n";
    let file = read_str(cif, &ReadOptions::default()).unwrap();
    let rows = file.rows();
    assert_eq!(rows.len(), 3);
    let total: usize = rows.iter().map(|row| row.values.len()).sum();
    assert_eq!(total, 6);
    assert!(rows.iter().all(|row| row.values.len() == 2));
}

#[test]
fn test_duplicate_block_code_continues_parsing() {
    let cif = "data_x\n_a.b 1\ndata_x\n_a.c 2\n";
    // Severity 1 stays below the default raise level of 2.
    let file = read_str(cif, &ReadOptions::default()).expect("duplicate block is recoverable");
    assert_eq!(file.parse_errors().len(), 1);

    let error = &file.parse_errors()[0];
    assert_eq!(error.kind, ParseErrorKind::BlockCodeDuplicate);
    let prior = error.prior.expect("duplicate carries the prior occurrence");
    assert_eq!(prior.token_idx, 0);
    assert!(prior.end > prior.start);
    // Both declarations contributed rows.
    assert_eq!(file.rows().len(), 2);
}

#[test]
fn test_empty_block_code_raises_at_default_level() {
    let err = read_str("data_\n_a.b 1\n", &ReadOptions::default()).unwrap_err();
    let errors = err.parse_errors();
    assert_eq!(errors[0].kind, ParseErrorKind::BlockCodeEmpty);
}

#[test]
fn test_empty_save_is_frame_terminator() {
    let cif = "data_d\nsave_def\n_category.id def\nsave_\n";
    let file = read_str(cif, &ReadOptions::default()).expect("frame terminator is not an error");
    assert!(file.parse_errors().is_empty());
    assert_eq!(file.rows()[0].frame_code.as_deref(), Some("def"));
}

#[test]
fn test_reserved_tokens_rejected() {
    for input in ["data_d\nstop_\n_a.b 1\n", "data_d\nglobal_\n_a.b 1\n"] {
        let err = read_str(input, &ReadOptions::default()).unwrap_err();
        assert_eq!(err.parse_errors()[0].kind, ParseErrorKind::TokenReserved);
    }
}

#[test]
fn test_text_field_value() {
    let cif = "data_d\n_exptl.details\n;first line   \n  second line\n;\n";
    let mut file = read_str(cif, &ReadOptions::default()).unwrap();
    let details = file
        .first_block()
        .unwrap()
        .category_mut("exptl")
        .unwrap()
        .table()
        .column("details")
        .unwrap()
        .get(0)
        .cloned();
    // Trailing whitespace per line is elided, leading whitespace kept.
    assert_eq!(
        details,
        Some(ciffile::Cell::Str("first line\n  second line".to_string()))
    );
}

#[test]
fn test_tokenizer_totality_over_messy_input() {
    // Every byte is whitespace or covered by exactly one token span.
    let input = "data_d # c\n_x 'a b' \"c d\"\n;t\n;\nloop_ _a.b 1 2\n$ref [v] bad'\n";
    let mut covered = vec![false; input.len()];
    for token in Tokenizer::new(input) {
        for slot in covered.iter_mut().take(token.end).skip(token.start) {
            assert!(!*slot, "overlapping spans at {}..{}", token.start, token.end);
            *slot = true;
        }
    }
    for (idx, byte) in input.bytes().enumerate() {
        assert!(
            covered[idx] || byte.is_ascii_whitespace(),
            "byte {idx} ({byte:#x}) not covered"
        );
    }
}

#[test]
fn test_quoted_values_with_embedded_quotes() {
    let tokens: Vec<_> = Tokenizer::new("'a dog's life' \"he said \"hi\"\"\n").collect();
    assert_eq!(tokens[0].kind, TokenKind::ValueQuoted);
    assert_eq!(tokens[0].text, "a dog's life");
    assert_eq!(tokens[1].kind, TokenKind::ValueDoubleQuoted);
    assert_eq!(tokens[1].text, "he said \"hi\"");
}

#[test]
fn test_case_insensitive_structural_keywords() {
    let cif = "DATA_Test\nLOOP_\n_a.x\n1\nSAVE_f\n_b.y 2\nSAVE_\n";
    let file = read_str(cif, &ReadOptions::default()).expect("keywords are case-insensitive");
    assert_eq!(file.block_codes(), vec!["test"]);
    assert_eq!(file.rows()[1].frame_code.as_deref(), Some("f"));
}

#[test]
fn test_case_normalization_none_keeps_names() {
    let options = ReadOptions::new().case_normalization(CaseNormalization::None);
    let file = read_str("data_Test\n_Cat.Kw v\n", &options).unwrap();
    assert_eq!(file.rows()[0].block_code, "Test");
    assert_eq!(file.rows()[0].category, "Cat");
    assert_eq!(file.rows()[0].keyword, "Kw");
}

#[test]
fn test_data_names_unique_per_scope() {
    // The same data name may recur in different frames and blocks.
    let cif = "data_d\nsave_a\n_item.name x\nsave_\nsave_b\n_item.name y\nsave_\n_item.name z\n";
    let file = read_str(cif, &ReadOptions::default()).unwrap();
    assert!(file.parse_errors().is_empty());

    // Within one frame it is a duplicate (severity 3: ambiguous).
    let cif = "data_d\nsave_a\n_item.name x\n_item.name y\nsave_\n";
    let err = read_str(cif, &ReadOptions::default()).unwrap_err();
    assert_eq!(
        err.parse_errors()[0].kind,
        ParseErrorKind::DataNameDuplicate
    );
    assert_eq!(err.parse_errors()[0].severity(), 3);
}

#[test]
fn test_error_byte_spans_point_at_tokens() {
    let input = "data_x\n_a.b 1\ndata_x\n_a.c 2\n";
    let file = read_str(input, &ReadOptions::default()).unwrap();
    let error = &file.parse_errors()[0];
    assert_eq!(&input[error.start..error.end], "data_x");
    assert_eq!(error.token_idx, 3);
}

#[test]
fn test_multiple_blocks_and_order() {
    let cif = "data_z\n_a.b 1\ndata_m\n_a.b 2\ndata_a\n_a.b 3\n";
    let file = read_str(cif, &ReadOptions::default()).unwrap();
    assert_eq!(file.block_codes(), vec!["z", "m", "a"]);
}
