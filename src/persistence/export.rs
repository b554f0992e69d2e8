//! Flat CSV export of a location's full lead set
//!
//! Header is the schema column list; absent values are empty cells.

use std::io::{self, Write};

use crate::lead::{LEAD_COLUMNS, StoredLead};

fn needs_quotes(field: &str) -> bool {
    field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
}

fn write_row<W: Write, S: AsRef<str>>(w: &mut W, row: &[S]) -> io::Result<()> {
    for (i, cell) in row.iter().enumerate() {
        if i > 0 {
            w.write_all(b",")?;
        }
        let cell = cell.as_ref();
        if needs_quotes(cell) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            w.write_all(cell.as_bytes())?;
        }
    }
    w.write_all(b"\n")
}

/// Write the export to any writer.
pub fn write_csv<W: Write>(mut w: W, leads: &[StoredLead]) -> io::Result<()> {
    write_row(&mut w, &LEAD_COLUMNS)?;
    for stored in leads {
        let row: Vec<String> = LEAD_COLUMNS
            .iter()
            .map(|col| {
                stored
                    .lead
                    .get(col)
                    .map(ToString::to_string)
                    .unwrap_or_default()
            })
            .collect();
        write_row(&mut w, &row)?;
    }
    w.flush()
}

/// Render the export in memory.
pub fn render_csv(leads: &[StoredLead]) -> io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(256 * (leads.len() + 1));
    write_csv(&mut buf, leads)?;
    Ok(buf)
}
