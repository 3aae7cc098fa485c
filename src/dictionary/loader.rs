//! DDL2 dictionary compilation.
//!
//! Compiles a parsed dictionary file (mmCIF with save frames) into
//! [`DictionaryData`]. Frames without a dot in their code define
//! categories; frames with a dot define items. Block-level categories
//! carry the dictionary metadata, the category-group list, the item-type
//! list, and sub-category descriptions.

use std::collections::BTreeMap;

use crate::structure::{Category, CifFile, FilePart, GroupInfo};

use super::types::{
    normalize_construct, CategoryDef, DictionaryData, ItemDef, ItemTypeDef, Primitive,
};
use super::DictionaryError;

/// Compile a parsed DDL2 dictionary file.
pub fn load_dictionary(file: &CifFile) -> Result<DictionaryData, DictionaryError> {
    let block_count = file.block_count();
    if block_count != 1 {
        return Err(DictionaryError::NotSingleBlock { count: block_count });
    }

    let mut data_part = file.part(FilePart::Data);
    let mut cat_part = file.part(FilePart::DictCat);
    let mut key_part = file.part(FilePart::DictKey);
    if cat_part.rows().is_empty() {
        return Err(DictionaryError::MissingDefinitions {
            what: "category definition frames",
        });
    }
    if key_part.rows().is_empty() {
        return Err(DictionaryError::MissingDefinitions {
            what: "item definition frames",
        });
    }

    let mut dict = DictionaryData::default();
    load_block_level(&mut data_part, &mut dict);
    load_categories(&mut cat_part, &mut dict);
    load_items(&mut key_part, &mut dict)?;
    derive_indices(&mut dict);
    Ok(dict)
}

fn load_block_level(part: &mut CifFile, dict: &mut DictionaryData) {
    let Some(block) = part.first_block() else {
        return;
    };

    if let Some(category) = block.category_mut("dictionary") {
        dict.title = first_string(category, "title");
        dict.version = first_string(category, "version");
    }
    if let Some(category) = block.category_mut("datablock") {
        dict.description = first_string(category, "description")
            .map(|s| normalize_whitespace(&s));
    }

    if let Some(category) = block.category_mut("category_group_list") {
        for row in 0..category.table().height() {
            let Some(id) = cell_string(category, "id", row) else {
                continue;
            };
            let description = cell_string(category, "description", row)
                .map(|s| normalize_whitespace(&s));
            let parent_id =
                cell_string(category, "parent_id", row).filter(|parent| parent != ".");
            // Some dictionaries carry duplicate group definitions; the
            // first one wins.
            dict.category_groups.entry(id).or_insert(GroupInfo {
                description,
                parent_id,
            });
        }
    }

    if let Some(category) = block.category_mut("item_type_list") {
        for row in 0..category.table().height() {
            let Some(code) = cell_string(category, "code", row) else {
                continue;
            };
            let Some(construct) = cell_string(category, "construct", row) else {
                continue;
            };
            let primitive = cell_string(category, "primitive_code", row)
                .map(|code| Primitive::parse(&code))
                .unwrap_or_default();
            let detail =
                cell_string(category, "detail", row).map(|s| normalize_whitespace(&s));
            dict.item_types.entry(code).or_insert(ItemTypeDef {
                primitive,
                regex: normalize_construct(&construct),
                detail,
            });
        }
    }

    if let Some(category) = block.category_mut("sub_category") {
        for row in 0..category.table().height() {
            let Some(id) = cell_string(category, "id", row) else {
                continue;
            };
            let description = cell_string(category, "description", row)
                .map(|s| normalize_whitespace(&s))
                .unwrap_or_default();
            dict.sub_categories.entry(id).or_insert(description);
        }
    }
}

fn load_categories(part: &mut CifFile, dict: &mut DictionaryData) {
    for block in part.blocks() {
        for frame in block.frames_mut() {
            let frame_code = frame.code().to_lowercase();

            let mut def = CategoryDef::default();
            let mut id = frame_code.clone();
            if let Some(category) = frame.category_mut("category") {
                if let Some(cat_id) = first_string(category, "id") {
                    id = cat_id.to_lowercase();
                }
                def.description =
                    first_string(category, "description").map(|s| normalize_whitespace(&s));
                def.mandatory = first_string(category, "mandatory_code")
                    .map(|code| code.eq_ignore_ascii_case("yes"))
                    .unwrap_or(false);
            }
            if let Some(category) = frame.category_mut("category_group") {
                def.group_ids = column_strings(category, "id");
            }
            if let Some(category) = frame.category_mut("category_key") {
                def.keys = column_strings(category, "name")
                    .into_iter()
                    .map(|name| name.trim_start_matches('_').to_lowercase())
                    .collect();
            }
            dict.categories.insert(id, def);
        }
    }
}

fn load_items(part: &mut CifFile, dict: &mut DictionaryData) -> Result<(), DictionaryError> {
    for block in part.blocks() {
        for frame in block.frames_mut() {
            let frame_code = frame.code().to_lowercase();
            let frame_category = frame.code_category().to_lowercase();

            let Some(item_cat) = frame.category_mut("item") else {
                continue;
            };
            let names = column_strings(item_cat, "name");
            if names.is_empty() {
                continue;
            }
            let mut category_ids = column_strings(item_cat, "category_id");
            if category_ids.is_empty() {
                if names.len() == 1 {
                    category_ids = vec![frame_category.clone()];
                } else {
                    // Several items without explicit categories: the frame
                    // code cannot disambiguate them.
                    continue;
                }
            }
            let mandatory_codes = column_strings(item_cat, "mandatory_code");

            let type_code = frame
                .category_mut("item_type")
                .and_then(|category| first_string(category, "code"));
            let Some(type_code) = type_code else {
                // An item without a type cannot be validated; leave it out.
                continue;
            };
            let type_def = dict.item_types.get(&type_code).ok_or_else(|| {
                DictionaryError::UndefinedTypeCode {
                    item: frame_code.clone(),
                    code: type_code.clone(),
                }
            })?;
            let type_primitive = type_def.primitive;
            let type_regex = type_def.regex.clone();

            let description = frame
                .category_mut("item_description")
                .and_then(|category| first_string(category, "description"))
                .map(|s| normalize_whitespace(&s));
            let default = frame
                .category_mut("item_default")
                .and_then(|category| first_string(category, "value"));
            let enumeration = frame
                .category_mut("item_enumeration")
                .map(read_enumeration)
                .filter(|set| !set.is_empty());
            let sub_categories = frame
                .category_mut("item_sub_category")
                .map(|category| column_strings(category, "id"))
                .unwrap_or_default();
            let range = frame.category_mut("item_range").map(read_ranges);
            let range = range.filter(|ranges| !ranges.is_empty());
            let units = frame
                .category_mut("item_units")
                .and_then(|category| first_string(category, "code"));

            let mut first_name: Option<String> = None;
            for (idx, raw_name) in names.iter().enumerate() {
                let name = raw_name.trim_start_matches('_').to_lowercase();
                let category = category_ids
                    .get(idx)
                    .or(category_ids.first())
                    .map(|id| id.to_lowercase())
                    .unwrap_or_else(|| frame_category.clone());
                let keyword = match name.split_once('.') {
                    Some((_, keyword)) => keyword.to_string(),
                    None => name.clone(),
                };
                let mandatory = mandatory_codes
                    .get(idx)
                    .map(|code| code.eq_ignore_ascii_case("yes"))
                    .unwrap_or(false);

                if first_name.is_none() {
                    first_name = Some(name.clone());
                }
                dict.items.insert(
                    name.clone(),
                    ItemDef {
                        name,
                        category,
                        keyword,
                        mandatory,
                        description: description.clone(),
                        default: default.clone(),
                        enumeration: enumeration.clone(),
                        sub_categories: sub_categories.clone(),
                        type_code: type_code.clone(),
                        type_primitive,
                        type_regex: type_regex.clone(),
                        range: range.clone(),
                        units: units.clone(),
                    },
                );
            }

            if let (Some(canonical), Some(alias_cat)) =
                (first_name, frame.category_mut("item_aliases"))
            {
                for alias in column_strings(alias_cat, "alias_name") {
                    let alias = alias.trim_start_matches('_').to_lowercase();
                    dict.aliases.insert(alias, canonical.clone());
                }
            }
        }
    }
    Ok(())
}

fn derive_indices(dict: &mut DictionaryData) {
    for (name, item) in &dict.items {
        if item.mandatory {
            if let Some(category) = dict.categories.get_mut(&item.category) {
                category.mandatory_items.push(name.clone());
            }
        }
    }
    dict.mandatory_categories = dict
        .categories
        .iter()
        .filter(|(_, def)| def.mandatory)
        .map(|(id, _)| id.clone())
        .collect();
}

fn read_enumeration(category: &mut Category) -> BTreeMap<String, Option<String>> {
    let values = column_strings(category, "value");
    let height = category.table().height();
    let mut details: Vec<Option<String>> = Vec::with_capacity(height);
    for row in 0..height {
        details.push(
            cell_string(category, "detail", row)
                .filter(|detail| detail != ".")
                .map(|s| normalize_whitespace(&s)),
        );
    }
    values
        .into_iter()
        .enumerate()
        .map(|(idx, value)| (value, details.get(idx).cloned().flatten()))
        .collect()
}

fn read_ranges(category: &mut Category) -> Vec<(Option<f64>, Option<f64>)> {
    let height = category.table().height();
    let mut ranges = Vec::with_capacity(height);
    for row in 0..height {
        let bound = |raw: Option<String>| -> Option<f64> {
            raw.filter(|value| value != ".")
                .and_then(|value| value.parse::<f64>().ok())
        };
        let minimum = bound(cell_string(category, "minimum", row));
        let maximum = bound(cell_string(category, "maximum", row));
        if minimum.is_none() && maximum.is_none() {
            continue;
        }
        ranges.push((minimum, maximum));
    }
    ranges
}

fn cell_string(category: &mut Category, column: &str, row: usize) -> Option<String> {
    category
        .table()
        .column(column)?
        .get(row)?
        .as_str()
        .map(str::to_string)
}

fn first_string(category: &mut Category, column: &str) -> Option<String> {
    cell_string(category, column, 0)
}

fn column_strings(category: &mut Category, column: &str) -> Vec<String> {
    let table = category.table();
    let Some(col) = table.column(column) else {
        return Vec::new();
    };
    col.cells()
        .iter()
        .filter_map(|cell| cell.as_str().map(str::to_string))
        .collect()
}

/// Collapse internal whitespace runs (text-field descriptions arrive with
/// layout newlines and indentation).
pub(crate) fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{read_str, ReadOptions};

    const DICT: &str = r#"
data_test_dict
_dictionary.title      test_dict
_dictionary.version    1.0
loop_
_item_type_list.code
_item_type_list.primitive_code
_item_type_list.construct
_item_type_list.detail
code  char  '[][_,.;:"&<>()/\{}'`~!@#$%A-Za-z0-9*|+-]*' 'code strings'
float numb  '-?(([0-9]+)[.]?|([0-9]*[.][0-9]+))([(][0-9]+[)])?([eE][+-]?[0-9]+)?' 'fp numbers'
loop_
_category_group_list.id
_category_group_list.parent_id
_category_group_list.description
inclusive_group . 'all categories'
cell_group inclusive_group 'cell categories'

save_cell
  _category.id            cell
  _category.description   'Unit cell parameters.'
  _category.mandatory_code yes
  loop_
  _category_group.id
  inclusive_group cell_group
  loop_
  _category_key.name  '_cell.entry_id'
save_

save__cell.length_a
  _item.name           '_cell.length_a'
  _item.category_id    cell
  _item.mandatory_code yes
  _item_description.description
;   Length of the a axis.
;
  _item_type.code      float
  _item_range.minimum  0.0
  _item_range.maximum  .
  _item_units.code     angstroms
  loop_
  _item_aliases.alias_name '_cell_length_a'
save_

save__cell.setting
  _item.name           '_cell.setting'
  _item.category_id    cell
  _item.mandatory_code no
  _item_type.code      code
  loop_
  _item_enumeration.value
  _item_enumeration.detail
  triclinic  .
  monoclinic 'one unique axis'
save_
"#;

    fn load() -> DictionaryData {
        let file = read_str(DICT, &ReadOptions::default()).unwrap();
        load_dictionary(&file).unwrap()
    }

    #[test]
    fn test_metadata() {
        let dict = load();
        assert_eq!(dict.title.as_deref(), Some("test_dict"));
        assert_eq!(dict.version.as_deref(), Some("1.0"));
    }

    #[test]
    fn test_item_types() {
        let dict = load();
        assert_eq!(dict.item_types.len(), 2);
        assert_eq!(dict.item_types["float"].primitive, Primitive::Numb);
        // The POSIX `[][` class arrives normalized.
        assert!(dict.item_types["code"].regex.starts_with(r"[\]\["));
    }

    #[test]
    fn test_category_definition() {
        let dict = load();
        let cell = dict.get_category("CELL").unwrap();
        assert!(cell.mandatory);
        assert_eq!(cell.group_ids, vec!["inclusive_group", "cell_group"]);
        assert_eq!(cell.keys, vec!["cell.entry_id"]);
        assert_eq!(cell.mandatory_items, vec!["cell.length_a"]);
        assert_eq!(dict.mandatory_categories, vec!["cell"]);
    }

    #[test]
    fn test_item_definition() {
        let dict = load();
        let item = dict.get_item("_cell.length_a").unwrap();
        assert!(item.mandatory);
        assert_eq!(item.type_code, "float");
        assert_eq!(item.type_primitive, Primitive::Numb);
        assert_eq!(item.range, Some(vec![(Some(0.0), None)]));
        assert_eq!(item.units.as_deref(), Some("angstroms"));
        assert_eq!(item.description.as_deref(), Some("Length of the a axis."));
    }

    #[test]
    fn test_alias_resolution() {
        let dict = load();
        assert!(dict.get_item("_cell_length_a").is_some());
        assert_eq!(dict.resolve_name("_cell_length_a"), "cell.length_a");
    }

    #[test]
    fn test_enumeration_details() {
        let dict = load();
        let setting = dict.get_item("_cell.setting").unwrap();
        let enumeration = setting.enumeration.as_ref().unwrap();
        assert_eq!(enumeration.len(), 2);
        assert_eq!(enumeration["triclinic"], None);
        assert_eq!(
            enumeration["monoclinic"].as_deref(),
            Some("one unique axis")
        );
    }

    #[test]
    fn test_requires_single_block() {
        let file = read_str(
            "data_a\nsave_x\n_category.id x\nsave_\ndata_b\n_y.z 1\n",
            &ReadOptions::default(),
        )
        .unwrap();
        assert!(matches!(
            load_dictionary(&file),
            Err(DictionaryError::NotSingleBlock { count: 2 })
        ));
    }
}
