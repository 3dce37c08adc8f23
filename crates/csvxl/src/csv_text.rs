//! [`Parser`] and [`Writer`] over delimited text, so record consumers can switch
//! between CSV files and spreadsheets without changes.

use std::io::{Read, Write};

use csv::StringRecord;

use crate::sanitize::sanitize_for_injection;
use crate::{Configuration, Parser, Record, Result, Writer};

/// Reads records from CSV text. Every field is present (`Some`), possibly empty.
pub struct CsvParser<R> {
    reader: csv::Reader<R>,
    record: StringRecord,
    row: usize,
    field_count: usize,
}

impl<R: Read> CsvParser<R> {
    pub fn new(reader: R, config: &Configuration) -> Result<Self> {
        config.validate()?;
        let reader = csv::ReaderBuilder::new()
            .delimiter(config.delimiter)
            // Header handling lives in `RecordReader`.
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);
        Ok(Self {
            reader,
            record: StringRecord::new(),
            row: 1,
            field_count: 0,
        })
    }
}

impl<R: Read> Parser for CsvParser<R> {
    fn read(&mut self) -> Result<Option<Record>> {
        if !self.reader.read_record(&mut self.record)? {
            return Ok(None);
        }
        self.row += 1;
        self.field_count = self.record.len();
        Ok(Some(self.record.iter().map(|f| Some(f.to_string())).collect()))
    }

    fn row(&self) -> usize {
        self.row
    }

    /// Width of the last record read.
    fn field_count(&self) -> usize {
        self.field_count
    }
}

/// Writes records as CSV text. Absent fields are written as empty strings.
pub struct CsvWriter<W: Write> {
    writer: csv::Writer<W>,
    current: Vec<String>,
    config: Configuration,
}

impl<W: Write> CsvWriter<W> {
    pub fn new(writer: W, config: &Configuration) -> Result<Self> {
        config.validate()?;
        let writer = csv::WriterBuilder::new()
            .delimiter(config.delimiter)
            .has_headers(false)
            .flexible(true)
            .from_writer(writer);
        Ok(Self {
            writer,
            current: Vec::new(),
            config: config.clone(),
        })
    }

    /// Write any pending record, flush, and return the inner writer.
    pub fn into_inner(mut self) -> Result<W> {
        if !self.current.is_empty() {
            self.next_record()?;
        }
        self.writer
            .into_inner()
            .map_err(|err| err.into_error().into())
    }
}

impl<W: Write> Writer for CsvWriter<W> {
    fn write_field(&mut self, field: Option<&str>) -> Result<()> {
        let field = field.unwrap_or_default();
        let field = if self.config.sanitize_for_injection {
            sanitize_for_injection(field, &self.config).into_owned()
        } else {
            field.to_string()
        };
        self.current.push(field);
        Ok(())
    }

    fn next_record(&mut self) -> Result<()> {
        self.writer.write_record(&self.current)?;
        self.current.clear();
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RecordReader, RecordWriter};
    use pretty_assertions::assert_eq;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Item {
        sku: String,
        qty: Option<u32>,
    }

    #[test]
    fn parses_flexible_records() {
        let text = "a,b\n1\n";
        let mut parser = CsvParser::new(text.as_bytes(), &Configuration::default()).unwrap();
        assert_eq!(parser.row(), 1);
        assert_eq!(
            parser.read().unwrap(),
            Some(vec![Some("a".to_string()), Some("b".to_string())])
        );
        assert_eq!(parser.read().unwrap(), Some(vec![Some("1".to_string())]));
        assert_eq!(parser.field_count(), 1);
        assert_eq!(parser.read().unwrap(), None);
        assert_eq!(parser.row(), 3);
    }

    #[test]
    fn typed_round_trip_through_text() {
        let config = Configuration {
            delimiter: b';',
            ..Configuration::default()
        };
        let items = vec![
            Item {
                sku: "A-1".into(),
                qty: Some(3),
            },
            Item {
                sku: "B-2".into(),
                qty: None,
            },
        ];

        let mut writer = RecordWriter::new(CsvWriter::new(Vec::new(), &config).unwrap());
        writer.serialize_all(&items).unwrap();
        let bytes = writer.finish().unwrap().into_inner().unwrap();
        assert_eq!(String::from_utf8(bytes.clone()).unwrap(), "sku;qty\nA-1;3\nB-2;\n");

        let mut reader = RecordReader::new(CsvParser::new(bytes.as_slice(), &config).unwrap());
        let back: Vec<Item> = reader.deserialize().collect::<Result<_>>().unwrap();
        assert_eq!(back, items);
    }

    #[test]
    fn sanitizes_text_fields_when_enabled() {
        let config = Configuration {
            sanitize_for_injection: true,
            ..Configuration::default()
        };
        let mut writer = CsvWriter::new(Vec::new(), &config).unwrap();
        writer.write_record([Some("=1+1"), Some("ok")]).unwrap();
        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert_eq!(text, "'=1+1,ok\n");
    }
}
