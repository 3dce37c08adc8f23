//! Read and write worksheet ranges as CSV-style records.
//!
//! [`ExcelParser`] turns worksheet rows into records and [`ExcelWriter`] turns
//! records back into worksheet rows. Both speak the same [`Parser`] / [`Writer`]
//! traits as the plain-text [`CsvParser`] / [`CsvWriter`], so [`RecordReader`]
//! and [`RecordWriter`] can map typed values onto either.
//!
//! ```no_run
//! use csvxl::{Configuration, ExcelParser};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Person {
//!     name: String,
//!     age: u32,
//! }
//!
//! let parser = ExcelParser::from_path("people.xlsx", None, Configuration::default())?;
//! for person in parser.records().deserialize::<Person>() {
//!     let person = person?;
//!     println!("{} is {}", person.name, person.age);
//! }
//! # Ok::<(), csvxl::Error>(())
//! ```

mod config;
mod csv_text;
mod error;
mod parser;
mod record;
mod sanitize;
mod writer;

pub use config::Configuration;
pub use csv_text::{CsvParser, CsvWriter};
pub use error::{Error, Result};
pub use parser::ExcelParser;
pub use record::{DeserializeRecords, Field, Parser, Record, RecordReader, RecordWriter, Writer};
pub use sanitize::{sanitize_for_injection, strip_control_characters};
pub use writer::ExcelWriter;

pub use csvxl_model as model;
pub use csvxl_xlsx::Package;
