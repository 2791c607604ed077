use std::fmt::Display;
use std::io::{Read, Write};

use gridsweep_core::{
    AggregatedRow, Dimensionality, Field, GridSweepError, Result, RunIdentity, Variant,
};
use serde::{Deserialize, Serialize};

const COLUMNS: [Field; 11] = [
    Field::NodeCount,
    Field::TileIndex,
    Field::RatioIndex,
    Field::TileStart,
    Field::TileCurrent,
    Field::DomainX,
    Field::DomainY,
    Field::Variant,
    Field::Dimensionality,
    Field::GridX,
    Field::GridY,
];

const TIME_COLUMN: &str = "time";

fn header_columns() -> Vec<&'static str> {
    let mut columns: Vec<&str> = COLUMNS.iter().map(Field::label).collect();
    columns.push(TIME_COLUMN);
    columns
}

pub fn header() -> String {
    header_columns().join(",")
}

/// One table line. Field names match the header columns.
#[derive(Debug, Serialize, Deserialize)]
struct TableRow {
    node: u32,
    tileidx: Option<u32>,
    ratioidx: Option<u32>,
    tilestart: Option<u64>,
    tilecurrent: Option<u64>,
    domainx: u64,
    domainy: u64,
    c_o: String,
    dim: String,
    partx: u32,
    party: u32,
    time: f64,
}

impl TableRow {
    fn from_row(row: &AggregatedRow) -> Self {
        let id = &row.identity;
        Self {
            node: id.node_count,
            tileidx: id.tile_index,
            ratioidx: id.ratio_index,
            tilestart: id.tile_start,
            tilecurrent: id.tile_current,
            domainx: id.domain_x,
            domainy: id.domain_y,
            c_o: id.variant.tag().to_string(),
            dim: id.dimensionality.digit().to_string(),
            partx: id.grid_x,
            party: id.grid_y,
            time: row.representative_time,
        }
    }

    fn into_row(self) -> std::result::Result<AggregatedRow, String> {
        let variant = Variant::from_tag(&self.c_o)
            .ok_or_else(|| format!("unknown variant '{}'", self.c_o))?;
        let dimensionality = Dimensionality::from_digit(&self.dim)
            .ok_or_else(|| format!("unknown dimensionality '{}'", self.dim))?;

        Ok(AggregatedRow {
            identity: RunIdentity {
                node_count: self.node,
                tile_index: self.tileidx,
                ratio_index: self.ratioidx,
                tile_start: self.tilestart,
                tile_current: self.tilecurrent,
                domain_x: self.domainx,
                domain_y: self.domainy,
                variant,
                dimensionality,
                grid_x: self.partx,
                grid_y: self.party,
            },
            representative_time: self.time,
            sample_count: 0,
        })
    }
}

/// Writes rows as a comma-delimited table; absent fields are empty cells.
pub fn write_aggregate_table<W: Write>(writer: &mut W, rows: &[AggregatedRow]) -> Result<()> {
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv_writer.write_record(header_columns()).map_err(table_error)?;
    for row in rows {
        csv_writer
            .serialize(TableRow::from_row(row))
            .map_err(table_error)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Reads a table written by [`write_aggregate_table`].
///
/// Sample counts are not stored and come back as 0.
pub fn read_aggregate_table<R: Read>(reader: R) -> Result<Vec<AggregatedRow>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(reader);

    let expected = header_columns();
    let headers = csv_reader.headers().map_err(table_error)?.clone();
    if !headers.iter().eq(expected.iter().copied()) {
        return Err(invalid_line(
            1,
            format!("expected header '{}'", expected.join(",")),
        ));
    }

    let mut rows = Vec::new();
    for result in csv_reader.records() {
        let record = result.map_err(table_error)?;
        let line = record.position().map_or(0, |p| p.line());
        let row: TableRow = record
            .deserialize(Some(&headers))
            .map_err(|e| invalid_line(line, e))?;
        rows.push(row.into_row().map_err(|msg| invalid_line(line, msg))?);
    }
    Ok(rows)
}

fn invalid_line(line: u64, message: impl Display) -> GridSweepError {
    GridSweepError::InvalidArgument(format!("line {}: {}", line, message))
}

fn table_error(e: csv::Error) -> GridSweepError {
    let line = e.position().map(|p| p.line());
    let message = e.to_string();
    match (e.into_kind(), line) {
        (csv::ErrorKind::Io(io), _) => GridSweepError::Io(io),
        (_, Some(line)) => invalid_line(line, message),
        (_, None) => GridSweepError::InvalidArgument(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<AggregatedRow> {
        vec![
            AggregatedRow {
                identity: RunIdentity {
                    node_count: 2,
                    tile_index: Some(0),
                    ratio_index: Some(3),
                    tile_start: Some(1_000_000),
                    tile_current: Some(2_000_000),
                    domain_x: 707,
                    domain_y: 5657,
                    variant: Variant::Optimized,
                    dimensionality: Dimensionality::TwoD,
                    grid_x: 1,
                    grid_y: 8,
                },
                representative_time: 0.0291,
                sample_count: 20,
            },
            AggregatedRow {
                identity: RunIdentity {
                    node_count: 8,
                    tile_index: None,
                    ratio_index: None,
                    tile_start: None,
                    tile_current: None,
                    domain_x: 32,
                    domain_y: 8,
                    variant: Variant::Baseline,
                    dimensionality: Dimensionality::OneD,
                    grid_x: 8,
                    grid_y: 4,
                },
                representative_time: 1.5,
                sample_count: 19,
            },
        ]
    }

    #[test]
    fn test_write_format() {
        let mut out = Vec::new();
        write_aggregate_table(&mut out, &rows()).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "node,tileidx,ratioidx,tilestart,tilecurrent,domainx,domainy,c_o,dim,partx,party,time",
                "2,0,3,1000000,2000000,707,5657,o,2,1,8,0.0291",
                "8,,,,,32,8,c,1,8,4,1.5",
            ]
        );
    }

    #[test]
    fn test_read_back_drops_sample_count() {
        let mut out = Vec::new();
        write_aggregate_table(&mut out, &rows()).unwrap();
        let read = read_aggregate_table(out.as_slice()).unwrap();

        let expected: Vec<AggregatedRow> = rows()
            .into_iter()
            .map(|r| AggregatedRow { sample_count: 0, ..r })
            .collect();
        assert_eq!(read, expected);
    }

    #[test]
    fn test_bad_rows_report_line() {
        let text = format!("{}\n2,0,3,1,2,7,5,o,2,1,8,0.5\n\n2,0,3,1,2,7,5,x,2,1,8,0.5\n", header());
        let err = read_aggregate_table(text.as_bytes()).unwrap_err();
        match err {
            GridSweepError::InvalidArgument(msg) => assert!(msg.starts_with("line 4:"), "{}", msg),
            other => panic!("unexpected error {:?}", other),
        }

        assert!(read_aggregate_table("node,time\n".as_bytes()).is_err());
        let short = format!("{}\n1,2,3\n", header());
        assert!(read_aggregate_table(short.as_bytes()).is_err());
    }

    #[test]
    fn test_cells_follow_csv_rules() {
        let text = format!("{}\n\"2\",,,,,32,8,\"c\",1,4,2,0.25\n", header());
        let rows = read_aggregate_table(text.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].identity.node_count, 2);
        assert_eq!(rows[0].identity.tile_index, None);
        assert_eq!(rows[0].identity.variant, Variant::Baseline);

        let bad_number = format!("{}\n2,0,3,1,2,7,5,o,2,1,8,0.5\nabc,0,3,1,2,7,5,o,2,1,8,0.5\n", header());
        match read_aggregate_table(bad_number.as_bytes()).unwrap_err() {
            GridSweepError::InvalidArgument(msg) => assert!(msg.starts_with("line 3:"), "{}", msg),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_empty_table() {
        let mut out = Vec::new();
        write_aggregate_table(&mut out, &[]).unwrap();
        assert_eq!(String::from_utf8(out.clone()).unwrap().trim_end(), header());
        assert!(read_aggregate_table(out.as_slice()).unwrap().is_empty());
        assert!(read_aggregate_table("".as_bytes()).is_err());
    }
}
