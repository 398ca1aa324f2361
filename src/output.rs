use std::io::{self, Write};

use serde::Serialize;

use crate::app::{CompareReport, IndexReport, MergeReport, QualityReport};

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_compare(report: &CompareReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_indices(report: &IndexReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_check(report: &QualityReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_merge(report: &MergeReport) -> io::Result<()> {
        Self::print_json(report)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}
