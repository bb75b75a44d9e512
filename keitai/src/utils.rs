use std::io::Write;

use csv_core::ReadFieldResult;

pub trait FromU32 {
    fn from_u32(src: u32) -> Self;
}

#[cfg(any(target_pointer_width = "32", target_pointer_width = "64"))]
impl FromU32 for usize {
    #[inline(always)]
    fn from_u32(src: u32) -> Self {
        // Since the pointer width is guaranteed to be 32 or 64,
        // the following process always succeeds.
        unsafe { Self::try_from(src).unwrap_unchecked() }
    }
}

/// Writes `data` as a single CSV cell, quoting it if necessary.
pub fn quote_csv_cell<W>(mut wtr: W, mut data: &[u8]) -> std::io::Result<()>
where
    W: Write,
{
    let mut output = [0; 4096];
    let mut writer = csv_core::Writer::new();
    loop {
        let (result, nin, nout) = writer.field(data, &mut output);
        wtr.write_all(&output[..nout])?;
        if result == csv_core::WriteResult::InputEmpty {
            break;
        }
        data = &data[nin..];
    }
    let (result, nout) = writer.finish(&mut output);
    debug_assert_eq!(result, csv_core::WriteResult::InputEmpty);
    wtr.write_all(&output[..nout])?;
    Ok(())
}

/// Splits a CSV row into unquoted cells.
pub fn parse_csv_row(row: &str) -> Vec<String> {
    let mut cells = vec![];
    let mut rdr = csv_core::Reader::new();
    let mut bytes = row.as_bytes();
    let mut output = vec![0; row.len().max(1)];
    let mut cell = vec![];
    loop {
        let (result, nin, nout) = rdr.read_field(bytes, &mut output);
        cell.extend_from_slice(&output[..nout]);
        bytes = &bytes[nin..];
        let end = match result {
            ReadFieldResult::InputEmpty => true,
            ReadFieldResult::OutputFull => continue,
            ReadFieldResult::Field { .. } => false,
            ReadFieldResult::End => break,
        };
        // Unquoting never splits a multibyte character.
        cells.push(String::from_utf8_lossy(&cell).into_owned());
        cell.clear();
        if end {
            break;
        }
    }
    cells
}

/// Formats cells as a CSV row.
pub fn join_csv_row<'a, I>(cells: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut buf = vec![];
    for (i, cell) in cells.into_iter().enumerate() {
        if i != 0 {
            buf.push(b',');
        }
        // Writing into a Vec never fails.
        let _ = quote_csv_cell(&mut buf, cell.as_bytes());
    }
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_csv_row() {
        assert_eq!(
            &["名詞", "トスカーナ"],
            parse_csv_row("名詞,トスカーナ").as_slice()
        );
    }

    #[test]
    fn test_parse_csv_row_with_quote() {
        assert_eq!(
            &["名詞", "1,2-ジクロロエタン"],
            parse_csv_row("名詞,\"1,2-ジクロロエタン\"").as_slice()
        );
    }

    #[test]
    fn test_parse_csv_row_trailing_empty() {
        assert_eq!(&["a", "b", ""], parse_csv_row("a,b,").as_slice());
    }

    #[test]
    fn test_join_csv_row() {
        assert_eq!(
            "名詞,\"1,2-ジクロロエタン\"",
            join_csv_row(["名詞", "1,2-ジクロロエタン"])
        );
    }
}
