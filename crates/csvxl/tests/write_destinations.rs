mod common;

use std::io::Cursor;
use std::path::Path;

use common::{people, read_people, Person, HEADERS};
use csvxl::model::{CellValue, Range};
use csvxl::{Configuration, Error, ExcelParser, ExcelWriter, Package, RecordWriter, Writer};
use pretty_assertions::assert_eq;

fn text(value: &str) -> CellValue {
    CellValue::String(value.to_string())
}

/// The grid every writer test expects: headers, then people as text.
fn expected_grid() -> Vec<Vec<CellValue>> {
    let mut grid = vec![HEADERS.iter().map(|h| text(h)).collect::<Vec<_>>()];
    for person in people() {
        grid.push(vec![
            person.id.map_or(CellValue::Empty, |id| text(&id.to_string())),
            text(&person.name),
            text(&person.age.to_string()),
            text(&person.empty),
        ]);
    }
    grid
}

fn write_people<W: Writer>(writer: W) -> W {
    let mut records = RecordWriter::new(writer);
    records.serialize_all(&people()).expect("serialize people");
    records.finish().expect("flush")
}

fn parse_people(path: &Path, sheet: Option<&str>, row_offset: u32, column_offset: u32) -> Vec<Person> {
    let mut parser = ExcelParser::from_path(path, sheet, Configuration::default()).unwrap();
    parser.set_row_offset(row_offset);
    parser.set_column_offset(column_offset);
    parser
        .records()
        .deserialize()
        .collect::<Result<_, Error>>()
        .unwrap()
}

#[test]
fn write_to_stream() {
    let mut bytes = Vec::new();
    let writer = ExcelWriter::from_writer(&mut bytes, None, Configuration::default()).unwrap();
    write_people(writer).close().unwrap();

    let package = Package::from_reader(Cursor::new(bytes)).unwrap();
    assert_eq!(package.workbook().sheet_names(), vec!["Export"]);
    let sheet = package.workbook().sheet_by_name("Export").unwrap();
    let grid = read_people(sheet, 0, 0);
    // Id, Name and Age survive the file format unchanged.
    for (row, expected) in grid.iter().zip(expected_grid()) {
        assert_eq!(&row[..3], &expected[..3]);
    }
}

#[test]
fn write_to_stream_with_sheet_name() {
    let mut bytes = Vec::new();
    let writer = ExcelWriter::from_writer(&mut bytes, Some("People"), Configuration::default()).unwrap();
    write_people(writer).close().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stream.xlsx");
    std::fs::write(&path, &bytes).unwrap();
    assert_eq!(parse_people(&path, Some("People"), 0, 0), people());
}

#[test]
fn write_to_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("write_by_path.xlsx");

    let writer = ExcelWriter::from_path(&path, None, Configuration::default()).unwrap();
    write_people(writer).close().unwrap();

    assert!(path.exists());
    assert_eq!(parse_people(&path, None, 0, 0), people());
}

#[test]
fn write_to_path_and_sheet_name_keeps_other_sheets() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("write_by_path_and_sheet.xlsx");
    {
        let mut package = Package::get_or_create(&path, "Existing").unwrap();
        let id = package.get_or_add_worksheet("Existing").unwrap();
        package
            .workbook_mut()
            .sheet_mut(id)
            .unwrap()
            .set_value_a1("A1", "keep me")
            .unwrap();
        package.save().unwrap();
    }

    let writer = ExcelWriter::from_path(&path, Some("People"), Configuration::default()).unwrap();
    write_people(writer).close().unwrap();

    let package = Package::open(&path).unwrap();
    assert_eq!(package.workbook().sheet_names(), vec!["Existing", "People"]);
    assert_eq!(
        package.workbook().sheet_by_name("Existing").unwrap().value_a1("A1").unwrap(),
        text("keep me")
    );
    assert_eq!(parse_people(&path, Some("People"), 0, 0), people());
}

#[test]
fn write_to_package() {
    let mut package = Package::new();
    {
        let writer = ExcelWriter::from_package(&mut package, Some("People"), Configuration::default()).unwrap();
        write_people(writer).close().unwrap();
    }
    let sheet = package.workbook().sheet_by_name("People").unwrap();
    assert_eq!(read_people(sheet, 0, 0), expected_grid());
}

#[test]
fn write_to_worksheet() {
    let mut package = Package::new();
    let id = package.get_or_add_worksheet("People").unwrap();
    {
        let writer = ExcelWriter::from_worksheet(&mut package, id, Configuration::default()).unwrap();
        write_people(writer).close().unwrap();
    }
    assert_eq!(package.workbook().sheet_names(), vec!["People"]);
    assert_eq!(read_people(package.workbook().sheet(id).unwrap(), 0, 0), expected_grid());
}

#[test]
fn write_to_range() {
    let mut package = Package::new();
    let id = package.get_or_add_worksheet("People").unwrap();
    {
        let range = Range::from_a1("E4:H7").unwrap();
        let writer = ExcelWriter::from_range(&mut package, id, range, Configuration::default()).unwrap();
        write_people(writer).close().unwrap();
    }
    let sheet = package.workbook().sheet(id).unwrap();
    assert_eq!(read_people(sheet, 3, 4), expected_grid());
    assert_eq!(sheet.value_a1("A1").unwrap(), CellValue::Empty);
}

#[test]
fn write_with_offsets() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("write_with_offsets.xlsx");
    {
        let mut writer = ExcelWriter::from_path(&path, None, Configuration::default()).unwrap();
        writer.set_row_offset(5);
        writer.set_column_offset(5);
        write_people(writer).close().unwrap();
    }

    let package = Package::open(&path).unwrap();
    let sheet = package.workbook().sheet_by_name("Export").unwrap();
    assert_eq!(sheet.value_a1("F6").unwrap(), text("Id"));
    assert_eq!(sheet.value_a1("G7").unwrap(), text("Bill"));
    assert_eq!(parse_people(&path, None, 5, 5), people());
}

#[test]
fn headers_can_be_disabled() {
    let mut package = Package::new();
    {
        let config = Configuration {
            has_header_record: false,
            ..Configuration::default()
        };
        let writer = ExcelWriter::from_package(&mut package, None, config).unwrap();
        let mut records = writer.records();
        records.serialize_all(&people()).unwrap();
        records.finish().unwrap().close().unwrap();
    }
    let sheet = package.workbook().sheet_by_name("Export").unwrap();
    assert_eq!(sheet.value_a1("B1").unwrap(), text("Bill"));
    assert_eq!(sheet.value_a1("B3").unwrap(), text("Weed"));
}

#[test]
fn dropping_the_writer_saves_the_package() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dropped.xlsx");
    {
        let mut writer = ExcelWriter::from_path(&path, None, Configuration::default()).unwrap();
        writer.write_record([Some("only")]).unwrap();
    }
    let package = Package::open(&path).unwrap();
    assert_eq!(
        package.workbook().sheet_by_name("Export").unwrap().value_a1("A1").unwrap(),
        text("only")
    );
}
