use std::marker::PhantomData;

use csv::StringRecord;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::{Error, Result};

/// A single field. `None` is an absent value (an empty cell), distinct from `""`.
pub type Field = Option<String>;

/// An ordered list of fields.
pub type Record = Vec<Field>;

/// A source of records.
pub trait Parser {
    /// Read the next record, or `None` at the end of the data.
    fn read(&mut self) -> Result<Option<Record>>;

    /// 1-based number of the next record to be read.
    fn row(&self) -> usize;

    /// Number of fields per record.
    fn field_count(&self) -> usize;
}

/// A sink of records, written one field at a time.
pub trait Writer {
    fn write_field(&mut self, field: Option<&str>) -> Result<()>;

    /// End the current record.
    fn next_record(&mut self) -> Result<()>;

    fn flush(&mut self) -> Result<()>;

    /// Write every field of `fields`, then end the record.
    fn write_record<I, F>(&mut self, fields: I) -> Result<()>
    where
        Self: Sized,
        I: IntoIterator<Item = Option<F>>,
        F: AsRef<str>,
    {
        for field in fields {
            self.write_field(field.as_ref().map(AsRef::as_ref))?;
        }
        self.next_record()
    }
}

impl<P: Parser + ?Sized> Parser for &mut P {
    fn read(&mut self) -> Result<Option<Record>> {
        (**self).read()
    }

    fn row(&self) -> usize {
        (**self).row()
    }

    fn field_count(&self) -> usize {
        (**self).field_count()
    }
}

impl<W: Writer + ?Sized> Writer for &mut W {
    fn write_field(&mut self, field: Option<&str>) -> Result<()> {
        (**self).write_field(field)
    }

    fn next_record(&mut self) -> Result<()> {
        (**self).next_record()
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

/// Reads typed records from a [`Parser`], mapping fields by header name.
pub struct RecordReader<P> {
    parser: P,
    has_headers: bool,
    headers: Option<StringRecord>,
    headers_read: bool,
}

impl<P: Parser> RecordReader<P> {
    /// A reader that treats the first record as the header row.
    pub fn new(parser: P) -> Self {
        Self {
            parser,
            has_headers: true,
            headers: None,
            headers_read: false,
        }
    }

    /// Whether the first record is a header row. Without headers, records are
    /// deserialized by position.
    pub fn has_headers(mut self, yes: bool) -> Self {
        self.has_headers = yes;
        self
    }

    pub fn parser(&self) -> &P {
        &self.parser
    }

    pub fn parser_mut(&mut self) -> &mut P {
        &mut self.parser
    }

    pub fn into_inner(self) -> P {
        self.parser
    }

    /// The header row, read on first use. `None` when headers are disabled or
    /// the source is empty.
    pub fn headers(&mut self) -> Result<Option<&StringRecord>> {
        self.ensure_headers()?;
        Ok(self.headers.as_ref())
    }

    /// The next data record, without deserializing it.
    pub fn read_record(&mut self) -> Result<Option<Record>> {
        self.ensure_headers()?;
        self.parser.read()
    }

    /// Deserialize the next data record.
    pub fn read<T: DeserializeOwned>(&mut self) -> Result<Option<T>> {
        self.ensure_headers()?;
        let Some(record) = self.parser.read()? else {
            return Ok(None);
        };
        let row = self.parser.row().saturating_sub(1);

        // Absent fields read as "" so `Option<T>` fields become `None`.
        let mut fields: StringRecord = record
            .iter()
            .map(|f| f.as_deref().unwrap_or_default())
            .collect();
        if let Some(headers) = &self.headers {
            while fields.len() < headers.len() {
                fields.push_field("");
            }
        }

        fields
            .deserialize(self.headers.as_ref())
            .map(Some)
            .map_err(|err| Error::Deserialize {
                row,
                message: err.to_string(),
            })
    }

    /// Iterate over the remaining records deserialized as `T`.
    pub fn deserialize<T: DeserializeOwned>(&mut self) -> DeserializeRecords<'_, P, T> {
        DeserializeRecords {
            reader: self,
            _marker: PhantomData,
        }
    }

    fn ensure_headers(&mut self) -> Result<()> {
        if !self.has_headers || self.headers_read {
            return Ok(());
        }
        self.headers_read = true;
        self.headers = self.parser.read()?.map(|record| {
            record
                .iter()
                .map(|f| f.as_deref().unwrap_or_default())
                .collect()
        });
        Ok(())
    }
}

/// Iterator returned by [`RecordReader::deserialize`].
pub struct DeserializeRecords<'r, P, T> {
    reader: &'r mut RecordReader<P>,
    _marker: PhantomData<fn() -> T>,
}

impl<P: Parser, T: DeserializeOwned> Iterator for DeserializeRecords<'_, P, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.read().transpose()
    }
}

/// Writes `Serialize` values to a [`Writer`], one record per value.
///
/// Structs and maps are flattened in field order; their field names form the
/// header row. Fields must be scalars.
pub struct RecordWriter<W> {
    writer: W,
    has_headers: bool,
    header_written: bool,
}

impl<W: Writer> RecordWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            has_headers: true,
            header_written: false,
        }
    }

    /// Whether a header row is written before the first record.
    pub fn has_headers(mut self, yes: bool) -> Self {
        self.has_headers = yes;
        self
    }

    pub fn writer_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Write `names` as the header row. Later calls to [`RecordWriter::serialize`]
    /// do not write another one.
    pub fn write_header<S: AsRef<str>>(&mut self, names: &[S]) -> Result<()> {
        self.header_written = true;
        self.writer
            .write_record(names.iter().map(|name| Some(name.as_ref())))
    }

    pub fn write_record(&mut self, record: &[Field]) -> Result<()> {
        self.writer.write_record(record.iter().map(Option::as_deref))
    }

    pub fn serialize<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        let (names, fields) = flatten(serde_json::to_value(value)?)?;
        if self.has_headers && !self.header_written {
            if let Some(names) = names {
                self.write_header(names.as_slice())?;
            }
            self.header_written = true;
        }
        self.writer.write_record(fields)
    }

    pub fn serialize_all<'v, T, I>(&mut self, values: I) -> Result<()>
    where
        T: Serialize + 'v,
        I: IntoIterator<Item = &'v T>,
    {
        for value in values {
            self.serialize(value)?;
        }
        Ok(())
    }

    /// Flush and return the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Split a serialized value into optional field names and fields.
fn flatten(value: Value) -> Result<(Option<Vec<String>>, Record)> {
    match value {
        Value::Object(map) => {
            let mut names = Vec::with_capacity(map.len());
            let mut fields = Vec::with_capacity(map.len());
            for (name, value) in map {
                fields.push(scalar(&name, value)?);
                names.push(name);
            }
            Ok((Some(names), fields))
        }
        Value::Array(items) => {
            let fields = items
                .into_iter()
                .enumerate()
                .map(|(i, value)| scalar(&i.to_string(), value))
                .collect::<Result<_>>()?;
            Ok((None, fields))
        }
        other => Ok((None, vec![scalar("0", other)?])),
    }
}

fn scalar(name: &str, value: Value) -> Result<Field> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(b.to_string())),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::String(s) => Ok(Some(s)),
        Value::Array(_) | Value::Object(_) => Err(Error::UnsupportedValue {
            field: name.to_string(),
            reason: "nested values cannot be stored in a single field",
        }),
    }
}
