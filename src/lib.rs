use log::{debug, warn};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
pub mod chart;
pub mod error;
pub mod plot;

pub use error::{ParseError, TableError};

pub const VERSION: Option<&str> = option_env!("CARGO_PKG_VERSION");

pub const FIELD_TIME: &str = "frame.time_relative";
pub const FIELD_SEQ: &str = "tcp.seq";
pub const FIELD_ACK: &str = "tcp.ack";
pub const FIELD_LEN: &str = "tcp.len";
pub const FIELD_BYTES_IN_FLIGHT: &str = "tcp.analysis.bytes_in_flight";

/// tshark fields understood by the plots, in their canonical spelling
pub const EXPECTED_FIELDS: [&str; 5] = [
    FIELD_TIME,
    FIELD_SEQ,
    FIELD_ACK,
    FIELD_LEN,
    FIELD_BYTES_IN_FLIGHT,
];

/// minimum number of valid rows a chart needs before it is drawn
pub const MIN_SAMPLES: usize = 10;

/// A column coerced to numbers, `None` marks a missing value.
pub type NumericColumn = Vec<Option<f64>>;

/// The table exported by tshark, kept as raw text cells.
/// Columns are aligned by row index and keep the capture order.
#[derive(Debug, Clone, PartialEq)]
pub struct PacketTable {
    names: Vec<String>,
    columns: Vec<Vec<String>>,
    rows: usize,
}

impl PacketTable {
    /// Read the csv export at the given path.
    pub fn from_csv<P: AsRef<Path>>(fin: P) -> Result<PacketTable, TableError> {
        let fin = fin.as_ref();
        if !fin.exists() {
            return Err(TableError::NotFound(fin.to_path_buf()));
        }
        let file = std::fs::File::open(fin).map_err(|e| TableError::Read {
            path: fin.to_path_buf(),
            source: ParseError::Io(e),
        })?;
        PacketTable::from_reader(file).map_err(|source| TableError::Read {
            path: fin.to_path_buf(),
            source,
        })
    }

    /// Parse a comma separated, double quoted table with a header row.
    /// Whitespace around the fields is dropped, short rows are padded with
    /// empty cells and repeated header names get a `.1`, `.2`, ... suffix.
    pub fn from_reader<R: Read>(rdr: R) -> Result<PacketTable, ParseError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b',')
            .quote(b'"')
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(rdr);
        let headers = reader.headers()?.clone();
        if headers.is_empty() {
            return Err(ParseError::NoColumns);
        }
        let names = dedup_headers(headers.iter());
        let mut columns: Vec<Vec<String>> = vec![Vec::new(); names.len()];
        let mut rows = 0;
        for result in reader.records() {
            let record = result?;
            if record.len() > names.len() {
                return Err(ParseError::TooManyFields {
                    line: record.position().map(|p| p.line()).unwrap_or_default(),
                    expected: names.len(),
                    found: record.len(),
                });
            }
            for (i, column) in columns.iter_mut().enumerate() {
                column.push(record.get(i).unwrap_or("").to_string());
            }
            rows += 1;
        }
        debug!("loaded {} rows and {} columns", rows, names.len());
        Ok(PacketTable {
            names,
            columns,
            rows,
        })
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn column(&self, name: &str) -> Option<&[String]> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| &self.columns[i][..])
    }

    /// the named column coerced with `to_numeric`, if present
    pub fn numeric(&self, name: &str) -> Option<NumericColumn> {
        self.column(name)
            .map(|cells| cells.iter().map(|c| to_numeric(c)).collect())
    }

    /// Rename the columns matching the expected fields, ignoring case,
    /// to their canonical spelling. An exact match wins; otherwise, when
    /// several headers differ only by case, the last one is taken and the
    /// ambiguity is reported.
    pub fn normalize_columns(&mut self) {
        let mut lowercase: HashMap<String, usize> = HashMap::new();
        for (i, name) in self.names.iter().enumerate() {
            lowercase.insert(name.to_lowercase(), i);
        }
        let mut renames: Vec<(usize, &str)> = Vec::new();
        for &expected in EXPECTED_FIELDS.iter() {
            let chosen = match self.names.iter().position(|n| n == expected) {
                Some(i) => Some(i),
                None => lowercase.get(expected).copied(),
            };
            let chosen = match chosen {
                Some(i) => i,
                None => continue,
            };
            let competing: Vec<&str> = self
                .names
                .iter()
                .filter(|n| n.to_lowercase() == expected)
                .map(|n| n.as_str())
                .collect();
            if competing.len() > 1 {
                warn!(
                    "columns {:?} all match {} ignoring case, using {}",
                    competing, expected, self.names[chosen]
                );
            }
            if self.names[chosen] != expected {
                debug!("renaming column {} to {}", self.names[chosen], expected);
                renames.push((chosen, expected));
            }
        }
        for (i, expected) in renames {
            self.names[i] = expected.to_string();
        }
    }
}

fn dedup_headers<'a>(headers: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for h in headers {
        let mut name = h.to_string();
        let mut n = 0;
        while names.contains(&name) {
            n += 1;
            name = format!("{}.{}", h, n);
        }
        names.push(name);
    }
    names
}

/// Parse a cell as a finite number; anything else is missing.
pub fn to_numeric(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// true for the rows where every given column has a value
pub fn valid_mask(columns: &[&[Option<f64>]]) -> Vec<bool> {
    let rows = columns.iter().map(|c| c.len()).max().unwrap_or(0);
    (0..rows)
        .map(|i| {
            columns
                .iter()
                .all(|c| c.get(i).map_or(false, |v| v.is_some()))
        })
        .collect()
}

/// keeps the values of the masked rows, in row order
pub fn select<T: Copy>(column: &[T], mask: &[bool]) -> Vec<T> {
    column
        .iter()
        .zip(mask.iter())
        .filter(|(_, keep)| **keep)
        .map(|(&v, _)| v)
        .collect()
}

/// offsets the values so that the first one is zero
pub fn relative_to_first(values: &[f64]) -> Vec<f64> {
    match values.first() {
        Some(&base) => values.iter().map(|v| v - base).collect(),
        None => Vec::new(),
    }
}

/// smallest and largest value of the slice, None when it is empty
pub fn min_and_max<T: PartialOrd + Copy>(s: &[T]) -> Option<(T, T)> {
    let (&first, rest) = s.split_first()?;
    Some(rest.iter().fold((first, first), |(min, max), &v| {
        (
            if v < min { v } else { min },
            if v > max { v } else { max },
        )
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(text: &str) -> PacketTable {
        PacketTable::from_reader(text.as_bytes()).unwrap()
    }

    #[test]
    fn numeric_coercion() {
        assert_eq!(to_numeric("42"), Some(42.));
        assert_eq!(to_numeric("0.000125"), Some(0.000125));
        assert_eq!(to_numeric("1.5e3"), Some(1500.));
        assert_eq!(to_numeric(" 7 "), Some(7.));
        assert_eq!(to_numeric("-3"), Some(-3.));
        assert_eq!(to_numeric(""), None);
        assert_eq!(to_numeric("   "), None);
        assert_eq!(to_numeric("NaN"), None);
        assert_eq!(to_numeric("inf"), None);
        assert_eq!(to_numeric("abc"), None);
        assert_eq!(to_numeric("1,2"), None);
    }

    #[test]
    fn mask_requires_every_column() {
        let t = vec![Some(0.), Some(0.1), None, Some(0.3)];
        let s = vec![Some(1.), None, Some(3.), Some(4.)];
        assert_eq!(valid_mask(&[&t[..], &s[..]]), vec![true, false, false, true]);
        assert_eq!(select(&s, &valid_mask(&[&t[..], &s[..]])), vec![Some(1.), Some(4.)]);
    }

    #[test]
    fn relative_starts_at_zero() {
        assert_eq!(relative_to_first(&[1000., 1040., 1080.]), vec![0., 40., 80.]);
        assert!(relative_to_first(&[]).is_empty());
    }

    #[test]
    fn loads_quoted_and_spaced_cells() {
        let t = table("frame.time_relative, tcp.seq\n\"0.5\", 1\n 0.75 ,\"2\"\n");
        assert_eq!(t.len(), 2);
        assert_eq!(t.column_names(), &["frame.time_relative", "tcp.seq"]);
        assert_eq!(t.numeric(FIELD_TIME), Some(vec![Some(0.5), Some(0.75)]));
        assert_eq!(t.numeric(FIELD_SEQ), Some(vec![Some(1.), Some(2.)]));
    }

    #[test]
    fn short_rows_are_padded() {
        let t = table("a,b,c\n1,2\n4,5,6\n");
        assert_eq!(t.column("c").unwrap(), &["", "6"]);
        assert_eq!(t.numeric("c"), Some(vec![None, Some(6.)]));
    }

    #[test]
    fn long_rows_are_rejected() {
        let err = PacketTable::from_reader("a,b\n1,2\n1,2,3\n".as_bytes()).unwrap_err();
        match err {
            ParseError::TooManyFields {
                line,
                expected,
                found,
            } => {
                assert_eq!(line, 3);
                assert_eq!(expected, 2);
                assert_eq!(found, 3);
            }
            other => panic!("unexpected error {}", other),
        }
    }

    #[test]
    fn empty_input_has_no_columns() {
        let err = PacketTable::from_reader("".as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::NoColumns));
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let bytes: &[u8] = b"a,b\n1,\xff\xfe\n";
        assert!(matches!(
            PacketTable::from_reader(bytes),
            Err(ParseError::Csv(_))
        ));
    }

    #[test]
    fn repeated_headers_get_suffix() {
        let t = table("a,a,a.1,a\n1,2,3,4\n");
        assert_eq!(t.column_names(), &["a", "a.1", "a.1.1", "a.2"]);
    }

    #[test]
    fn normalize_is_case_insensitive() {
        let mut t = table("Frame.Time_Relative,TCP.SEQ,other\n0,1,x\n");
        t.normalize_columns();
        assert_eq!(t.column_names(), &[FIELD_TIME, FIELD_SEQ, "other"]);
        let before = t.clone();
        t.normalize_columns();
        assert_eq!(t, before);
    }

    #[test]
    fn normalize_leaves_missing_fields_absent() {
        let mut t = table("tcp.seq\n1\n");
        t.normalize_columns();
        assert!(t.has_column(FIELD_SEQ));
        assert!(!t.has_column(FIELD_TIME));
        assert!(!t.has_column(FIELD_BYTES_IN_FLIGHT));
    }

    #[test]
    fn normalize_collision_prefers_exact_then_last() {
        let mut exact = table("TCP.SEQ,tcp.seq\n1,2\n");
        exact.normalize_columns();
        assert_eq!(exact.column(FIELD_SEQ).unwrap(), &["2"]);

        let mut last = table("TCP.SEQ,Tcp.Seq\n1,2\n");
        last.normalize_columns();
        assert_eq!(last.column_names(), &["TCP.SEQ", FIELD_SEQ]);
        assert_eq!(last.column(FIELD_SEQ).unwrap(), &["2"]);
    }

    #[test]
    fn min_and_max_of_slice() {
        assert_eq!(min_and_max(&[3., -1., 7.]), Some((-1., 7.)));
        assert_eq!(min_and_max::<f64>(&[]), None);
    }
}
