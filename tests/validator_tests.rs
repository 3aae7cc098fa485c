// Integration tests for DDL2 dictionary loading and validation.

use ciffile::{
    load_dictionary, read_str, Cell, Ddl2Validator, Dtype, FindingKind, ReadOptions,
    ValidatorOptions,
};

const DICT: &str = r#"
data_test_dict
_dictionary.title      test_dict
_dictionary.version    0.1
_datablock.description
; A small dictionary assembled for integration testing.
;
loop_
_item_type_list.code
_item_type_list.primitive_code
_item_type_list.construct
_item_type_list.detail
code    char   '[][_,.;:"&<>()/\{}'`~!@#$%A-Za-z0-9*|+-]*'                'code strings'
ucode   uchar  '[][_,.;:"&<>()/\{}'`~!@#$%A-Za-z0-9*|+-]*'                'case-insensitive codes'
line    char   '[][ \t_(),.;:"&<>/\{}'`~!@#$%?+=*A-Za-z0-9|^-]*'          'a single line of text'
float   numb   '-?(([0-9]+)[.]?|([0-9]*[.][0-9]+))([(][0-9]+[)])?([eE][+-]?[0-9]+)?' 'floating-point numbers'
int     numb   '-?([0-9]+)[+-]?'                                          'integers'
yyyy-mm-dd char '[0-9]?[0-9]([0-9][0-9])?(-[0-9]?[0-9](-[0-9]?[0-9])?)?(:[0-9]?[0-9](:[0-9]?[0-9])?)?' 'dates'
loop_
_category_group_list.id
_category_group_list.parent_id
_category_group_list.description
inclusive_group   .                'All categories.'
measurement_group inclusive_group  'Measurement categories.'

save_cell
  _category.id             cell
  _category.description    'Unit cell parameters.'
  _category.mandatory_code no
  loop_
  _category_group.id
  inclusive_group
  measurement_group
  loop_
  _category_key.name
  '_cell.entry_id'
save_

save_exptl
  _category.id             exptl
  _category.description    'Experimental conditions.'
  _category.mandatory_code yes
save_

save_a
  _category.id             a
  _category.description    'Measured lengths.'
  _category.mandatory_code no
save_

save_flags
  _category.id             flags
  _category.description    'Boolean-like flags.'
  _category.mandatory_code no
save_

save__cell.entry_id
  _item.name           '_cell.entry_id'
  _item.category_id    cell
  _item.mandatory_code yes
  _item_type.code      code
save_

save__cell.length_a
  _item.name           '_cell.length_a'
  _item.category_id    cell
  _item.mandatory_code no
  _item_type.code      float
  loop_
  _item_range.minimum
  _item_range.maximum
  0.0
  1.0
  _item_units.code     angstroms
save_

save__cell.setting
  _item.name           '_cell.setting'
  _item.category_id    cell
  _item.mandatory_code no
  _item_type.code      ucode
  loop_
  _item_enumeration.value
  triclinic
  monoclinic
save_

save__exptl.method
  _item.name           '_exptl.method'
  _item.category_id    exptl
  _item.mandatory_code yes
  _item_type.code      line
  _item_default.value  'x-ray diffraction'
save_

save__exptl.details
  _item.name           '_exptl.details'
  _item.category_id    exptl
  _item.mandatory_code no
  _item_type.code      line
save_

save__exptl.date
  _item.name           '_exptl.date'
  _item.category_id    exptl
  _item.mandatory_code no
  _item_type.code      yyyy-mm-dd
save_

save__a.len
  _item.name           '_a.len'
  _item.category_id    a
  _item.mandatory_code no
  _item_type.code      float
save_

save__a.len_esd_digits
  _item.name           '_a.len_esd_digits'
  _item.category_id    a
  _item.mandatory_code no
  _item_type.code      int
save_

save__flags.used
  _item.name           '_flags.used'
  _item.category_id    flags
  _item.mandatory_code no
  _item_type.code      ucode
  loop_
  _item_enumeration.value
  YES
  NO
save_
"#;

fn validator() -> Ddl2Validator {
    let file = read_str(DICT, &ReadOptions::default()).expect("dictionary parses");
    let dict = load_dictionary(&file).expect("dictionary compiles");
    Ddl2Validator::new(dict, ValidatorOptions::default()).expect("constructs compile")
}

fn floats(column: &ciffile::Column) -> Vec<Option<f64>> {
    column
        .cells()
        .iter()
        .map(|cell| match cell {
            Cell::Float(v) => Some(*v),
            _ => None,
        })
        .collect()
}

#[test]
fn test_dictionary_metadata_and_indices() {
    let v = validator();
    let dict = v.dictionary();
    assert_eq!(dict.title.as_deref(), Some("test_dict"));
    assert_eq!(
        dict.description.as_deref(),
        Some("A small dictionary assembled for integration testing.")
    );
    assert_eq!(dict.mandatory_categories, vec!["exptl"]);
    assert_eq!(
        dict.get_category("exptl").unwrap().mandatory_items,
        vec!["exptl.method"]
    );
    assert_eq!(
        dict.get_item("_cell.length_a").unwrap().range,
        Some(vec![(Some(0.0), Some(1.0))])
    );
}

#[test]
fn test_esd_extraction_scenario() {
    let v = validator();
    let cif = "data_s\nloop_\n_a.len _a.len_esd_digits\n1.234(5) .\n2.0 7\n";
    let mut file = read_str(cif, &ReadOptions::default()).unwrap();
    let report = v.validate_file(&mut file, true, true).unwrap();

    // The raw ESD column agrees with the extracted digits: no mismatch.
    assert!(report.of_kind(FindingKind::AuxiliaryMismatch).is_empty());

    let category = file.first_block().unwrap().category_mut("a").unwrap();
    let table = category.table();
    let len = table.column("len").unwrap();
    assert_eq!(len.dtype, Dtype::Float);
    assert_eq!(floats(len), vec![Some(1.234), Some(2.0)]);
    let esd = table.column("len_esd_digits").unwrap();
    assert_eq!(esd.dtype, Dtype::Int);
    assert_eq!(esd.cells(), &[Cell::Int(5), Cell::Int(7)]);
}

#[test]
fn test_esd_mismatch_is_recorded() {
    let v = validator();
    // The raw column contradicts the digits extracted from 1.234(5).
    let cif = "data_s\nloop_\n_a.len _a.len_esd_digits\n1.234(5) 9\n";
    let mut file = read_str(cif, &ReadOptions::default()).unwrap();
    let report = v.validate_file(&mut file, false, false).unwrap();

    let mismatches = report.of_kind(FindingKind::AuxiliaryMismatch);
    assert_eq!(mismatches.len(), 1);
    assert_eq!(mismatches[0].column.as_deref(), Some("len_esd_digits"));
    assert_eq!(mismatches[0].rows.as_deref(), Some(&[0][..]));

    // The column cast from the raw input wins the merge.
    let category = file.first_block().unwrap().category_mut("a").unwrap();
    assert_eq!(
        category.table().column("len_esd_digits").unwrap().cells(),
        &[Cell::Int(9)]
    );
}

#[test]
fn test_enum_conversion_to_bool() {
    let v = validator();
    let cif = "data_s\nloop_\n_flags.used\nYES\nNO\nYES\n";
    let mut file = read_str(cif, &ReadOptions::default()).unwrap();
    let report = v.validate_file(&mut file, false, false).unwrap();
    assert!(report.of_kind(FindingKind::EnumViolation).is_empty());

    let category = file.first_block().unwrap().category_mut("flags").unwrap();
    let used = category.table().column("used").unwrap();
    assert_eq!(used.dtype, Dtype::Bool);
    assert_eq!(
        used.cells(),
        &[Cell::Bool(true), Cell::Bool(false), Cell::Bool(true)]
    );
}

#[test]
fn test_enum_violation_blocks_conversion() {
    let v = validator();
    let cif = "data_s\n_cell.entry_id e1\n_cell.setting hexagonal\n";
    let mut file = read_str(cif, &ReadOptions::default()).unwrap();
    let report = v.validate_file(&mut file, false, false).unwrap();

    let violations = report.of_kind(FindingKind::EnumViolation);
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].item.as_deref(), Some("setting"));
    assert_eq!(violations[0].rows.as_deref(), Some(&[0][..]));

    // The violating column stays a plain string column.
    let category = file.first_block().unwrap().category_mut("cell").unwrap();
    assert_eq!(category.table().column("setting").unwrap().dtype, Dtype::Str);
}

#[test]
fn test_enum_conversion_to_categorical() {
    let v = validator();
    let cif = "data_s\n_cell.entry_id e1\n_cell.setting Triclinic\n";
    let mut file = read_str(cif, &ReadOptions::default()).unwrap();
    let report = v.validate_file(&mut file, false, false).unwrap();
    assert!(report.of_kind(FindingKind::EnumViolation).is_empty());

    let category = file.first_block().unwrap().category_mut("cell").unwrap();
    let setting = category.table().column("setting").unwrap();
    // The case-insensitive item was lowercased before the enum check.
    assert_eq!(setting.cells(), &[Cell::Str("triclinic".to_string())]);
    match &setting.dtype {
        Dtype::Enum(categories) => {
            assert_eq!(categories, &vec!["monoclinic".to_string(), "triclinic".to_string()]);
        }
        other => panic!("expected enum dtype, got {other:?}"),
    }
}

#[test]
fn test_range_violation_exclusive_bounds() {
    let v = validator();
    let cif = "data_s\n_cell.entry_id e1\n_cell.length_a 1.0\n";
    let mut file = read_str(cif, &ReadOptions::default()).unwrap();
    let report = v.validate_file(&mut file, false, false).unwrap();

    let violations = report.of_kind(FindingKind::RangeViolation);
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].item.as_deref(), Some("length_a"));
    assert_eq!(violations[0].rows.as_deref(), Some(&[0][..]));

    // A value inside the open interval passes.
    let cif = "data_s\n_cell.entry_id e1\n_cell.length_a 0.5\n";
    let mut file = read_str(cif, &ReadOptions::default()).unwrap();
    let report = v.validate_file(&mut file, false, false).unwrap();
    assert!(report.of_kind(FindingKind::RangeViolation).is_empty());
}

#[test]
fn test_missing_value_and_default_substitution() {
    let v = validator();
    let cif = "data_s\n_exptl.method ?\n_exptl.details ?\n";
    let mut file = read_str(cif, &ReadOptions::default()).unwrap();
    let report = v.validate_file(&mut file, false, false).unwrap();

    // `?` on an item with a default is silently substituted; without a
    // default it is recorded and nulled.
    let missing = report.of_kind(FindingKind::MissingValue);
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].item.as_deref(), Some("details"));

    let category = file.first_block().unwrap().category_mut("exptl").unwrap();
    assert_eq!(
        category.table().column("method").unwrap().cells(),
        &[Cell::Str("x-ray diffraction".to_string())]
    );
    assert_eq!(
        category.table().column("details").unwrap().cells(),
        &[Cell::Null]
    );
}

#[test]
fn test_inapplicable_markers_by_type() {
    let v = validator();
    let cif = "data_s\n_exptl.method ok\n_exptl.details .\n_cell.entry_id e1\n_cell.length_a .\n";
    let mut file = read_str(cif, &ReadOptions::default()).unwrap();
    v.validate_file(&mut file, false, false).unwrap();

    let block = file.first_block().unwrap();
    // `.` on a string becomes the empty string, on a float NaN.
    let exptl = block.category_mut("exptl").unwrap();
    assert_eq!(
        exptl.table().column("details").unwrap().cells(),
        &[Cell::Str(String::new())]
    );
    let cell = block.category_mut("cell").unwrap();
    match cell.table().column("length_a").unwrap().get(0) {
        Some(Cell::Float(v)) => assert!(v.is_nan()),
        other => panic!("expected NaN float, got {other:?}"),
    }
}

#[test]
fn test_category_level_findings() {
    let v = validator();
    // No exptl category (mandatory), cell lacks its mandatory entry_id,
    // an unknown category and an unknown item appear.
    let cif = "data_s\n_cell.length_a 0.5\n_cell.zzz 1\n_mystery.x 1\n";
    let mut file = read_str(cif, &ReadOptions::default()).unwrap();
    let report = v.validate_file(&mut file, true, true).unwrap();

    let missing_cat = report.of_kind(FindingKind::MissingCategory);
    assert_eq!(missing_cat.len(), 1);
    assert_eq!(missing_cat[0].category.as_deref(), Some("exptl"));
    assert_eq!(missing_cat[0].block.as_deref(), Some("s"));

    let missing_item = report.of_kind(FindingKind::MissingItem);
    assert_eq!(missing_item.len(), 1);
    assert_eq!(missing_item[0].item.as_deref(), Some("cell.entry_id"));

    let undefined_cat = report.of_kind(FindingKind::UndefinedCategory);
    assert_eq!(undefined_cat.len(), 1);
    assert_eq!(undefined_cat[0].category.as_deref(), Some("mystery"));

    // Both the unknown keyword in a known category and the column of the
    // unknown category are reported.
    let undefined_item = report.of_kind(FindingKind::UndefinedItem);
    let items: Vec<_> = undefined_item
        .iter()
        .filter_map(|finding| finding.item.as_deref())
        .collect();
    assert_eq!(items, vec!["zzz", "x"]);
}

#[test]
fn test_regex_violation() {
    let v = validator();
    let cif = "data_s\n_cell.entry_id e1\n_cell.length_a abc\n";
    let mut file = read_str(cif, &ReadOptions::default()).unwrap();
    let report = v.validate_file(&mut file, false, false).unwrap();

    let violations = report.of_kind(FindingKind::RegexViolation);
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].item.as_deref(), Some("length_a"));
}

#[test]
fn test_date_casting() {
    let v = validator();
    let cif = "data_s\n_exptl.method ok\n_exptl.date 2023-05-07\n";
    let mut file = read_str(cif, &ReadOptions::default()).unwrap();
    v.validate_file(&mut file, false, false).unwrap();

    let category = file.first_block().unwrap().category_mut("exptl").unwrap();
    let date = category.table().column("date").unwrap();
    assert_eq!(date.dtype, Dtype::Date);
    assert_eq!(
        date.get(0),
        Some(&Cell::Date(
            chrono::NaiveDate::from_ymd_opt(2023, 5, 7).unwrap()
        ))
    );
}

#[test]
fn test_category_and_item_info_attached() {
    let v = validator();
    let cif = "data_s\n_cell.entry_id e1\n_cell.length_a 0.5\n";
    let mut file = read_str(cif, &ReadOptions::default()).unwrap();
    v.validate_file(&mut file, true, true).unwrap();

    let category = file.first_block().unwrap().category_mut("cell").unwrap();
    let info = category.info.as_ref().expect("category info attached");
    assert_eq!(info.description.as_deref(), Some("Unit cell parameters."));
    assert_eq!(info.keys, vec!["cell.entry_id"]);
    assert!(info.groups.contains_key("measurement_group"));
    assert_eq!(
        info.groups["measurement_group"].parent_id.as_deref(),
        Some("inclusive_group")
    );

    let item = &category.item_info["length_a"];
    assert_eq!(item.type_code.as_deref(), Some("float"));
    assert_eq!(item.units.as_deref(), Some("angstroms"));
    assert!(!item.mandatory);
    let entry = &category.item_info["entry_id"];
    assert!(entry.mandatory);
}

#[test]
fn test_validator_idempotence() {
    let v = validator();
    let cif = "data_clean\n\
               _exptl.method 'x-ray diffraction'\n\
               _exptl.details 'none'\n\
               _exptl.date 2023-05-07\n\
               _cell.entry_id c1\n\
               _cell.length_a 0.5\n\
               _cell.setting triclinic\n\
               _flags.used YES\n";
    let mut file = read_str(cif, &ReadOptions::default()).unwrap();

    let first = v.validate_file(&mut file, true, true).unwrap();
    assert!(first.is_empty(), "{:?}", first.findings());
    let snapshot: Vec<_> = {
        let block = file.first_block().unwrap();
        block
            .categories_mut()
            .iter_mut()
            .map(|category| category.table().clone())
            .collect()
    };

    let second = v.validate_file(&mut file, true, true).unwrap();
    assert_eq!(first, second);
    let after: Vec<_> = {
        let block = file.first_block().unwrap();
        block
            .categories_mut()
            .iter_mut()
            .map(|category| category.table().clone())
            .collect()
    };
    assert_eq!(snapshot, after);
}

#[test]
fn test_report_serializes_to_json() {
    let v = validator();
    let cif = "data_s\n_cell.length_a 1.0\n_cell.entry_id e1\n";
    let mut file = read_str(cif, &ReadOptions::default()).unwrap();
    let report = v.validate_file(&mut file, false, false).unwrap();
    let json = report.to_json().unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    let entries = parsed.as_array().unwrap();
    assert!(entries
        .iter()
        .any(|entry| entry["type"] == "range_violation"));
}

#[test]
fn test_strict_int_cast_is_a_hard_error() {
    let v = validator();
    let cif = "data_s\nloop_\n_a.len_esd_digits\nnot-a-number\n";
    let mut file = read_str(cif, &ReadOptions::default()).unwrap();
    let err = v.validate_file(&mut file, false, false).unwrap_err();
    assert!(matches!(err, ciffile::CastError::IntCast { .. }));
}
