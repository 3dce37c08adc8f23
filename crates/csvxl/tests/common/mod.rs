#![allow(dead_code)]

use std::path::Path;

use csvxl::model::{CellRef, CellValue, Worksheet};
use csvxl::Package;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Person {
    pub id: Option<i32>,
    pub name: String,
    pub age: i32,
    pub empty: String,
}

pub const HEADERS: [&str; 4] = ["Id", "Name", "Age", "Empty"];

pub fn people() -> Vec<Person> {
    vec![
        Person {
            id: None,
            name: "Bill".into(),
            age: 40,
            empty: String::new(),
        },
        Person {
            id: Some(5),
            name: "Ben".into(),
            age: 30,
            empty: String::new(),
        },
        Person {
            id: None,
            name: "Weed".into(),
            age: 40,
            empty: String::new(),
        },
    ]
}

/// Lay out `HEADERS` and `people()` with the header at (`start_row`, `start_col`), 0-based.
pub fn fill_people(sheet: &mut Worksheet, start_row: u32, start_col: u32) {
    for (i, header) in HEADERS.iter().enumerate() {
        sheet.set_value(CellRef::new(start_row, start_col + i as u32), *header);
    }
    for (r, person) in people().iter().enumerate() {
        let row = start_row + 1 + r as u32;
        if let Some(id) = person.id {
            sheet.set_value(CellRef::new(row, start_col), f64::from(id));
        }
        sheet.set_value(CellRef::new(row, start_col + 1), person.name.as_str());
        sheet.set_value(CellRef::new(row, start_col + 2), f64::from(person.age));
        sheet.set_value(CellRef::new(row, start_col + 3), person.empty.as_str());
    }
}

/// Create `path` with a sheet called `sheet_name` holding the people table.
pub fn write_people_file(path: &Path, sheet_name: &str, start_row: u32, start_col: u32) {
    let mut package = Package::get_or_create(path, sheet_name).expect("create package");
    let id = package.get_or_add_worksheet(sheet_name).expect("sheet");
    fill_people(
        package.workbook_mut().sheet_mut(id).expect("sheet exists"),
        start_row,
        start_col,
    );
    package.save().expect("save package");
}

/// Read back the people table written by a writer test.
pub fn read_people(sheet: &Worksheet, start_row: u32, start_col: u32) -> Vec<Vec<CellValue>> {
    (start_row..=start_row + 3)
        .map(|row| {
            (start_col..start_col + 4)
                .map(|col| sheet.value(CellRef::new(row, col)))
                .collect()
        })
        .collect()
}
