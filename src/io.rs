//! Line-oriented `x,y` text for point sources, centroid sources and output sinks.
//!
//! One point per line, two comma-separated numbers. Blank lines are skipped;
//! any other line that does not parse is reported with its 1-based line number.

use std::io::{BufRead, Write};

use crate::cluster::{Centroid, CentroidTable, Point};
use crate::error::{Error, Result};

fn at_line(line: usize, source: Error) -> Error {
    Error::AtLine {
        line,
        source: Box::new(source),
    }
}

/// Parses a single `x,y` line.
pub fn parse_point(line: &str) -> Result<Point> {
    line.parse()
}

/// Parses every non-blank line of `text`, lazily.
pub fn parse_lines(text: &str) -> impl Iterator<Item = Result<Point>> + '_ {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| parse_point(line).map_err(|e| at_line(i + 1, e)))
}

/// Reads all points from `reader`.
pub fn read_points<R: BufRead>(reader: R) -> Result<Vec<Point>> {
    let mut points = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        points.push(parse_point(&line).map_err(|e| at_line(i + 1, e))?);
    }
    Ok(points)
}

/// Reads a centroid table from `reader`, keeping line order as table order.
///
/// Fails with [`Error::EmptyCentroidTable`] when no centroid is found.
pub fn read_centroid_table<R: BufRead>(reader: R) -> Result<CentroidTable> {
    let table = CentroidTable::new(read_points(reader)?);
    if table.is_empty() {
        return Err(Error::EmptyCentroidTable);
    }
    Ok(table)
}

/// Writes one `x,y` line per centroid, in the order given.
pub fn write_centroids<W: Write>(mut writer: W, centroids: &[Centroid]) -> Result<()> {
    for centroid in centroids {
        writeln!(writer, "{}", centroid)?;
    }
    writer.flush()?;
    Ok(())
}
