use std::io::{prelude::*, BufReader, Read};

use crate::dictionary::ConnectionMatrix;
use crate::errors::{KeitaiError, Result};

impl ConnectionMatrix {
    /// Creates a new instance from `matrix.def`.
    ///
    /// Pairs not listed in the file are disallowed.
    /// Note that the reader is buffered automatically, so you should not
    /// wrap `rdr` in a buffered reader like `io::BufReader`.
    ///
    /// # Errors
    ///
    /// [`KeitaiError::MalformedMatrix`] is returned when a line is malformed
    /// or an id is out of the range declared in the header.
    pub fn from_reader<R>(rdr: R) -> Result<Self>
    where
        R: Read,
    {
        let reader = BufReader::new(rdr);
        let mut lines = reader.lines();

        let header = lines
            .next()
            .ok_or_else(|| KeitaiError::malformed_matrix(1, "The header is missing."))??;
        let (num_right, num_left) = Self::parse_header(&header)?;
        let mut matrix = Self::new(num_right, num_left);

        for (i, line) in lines.enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let lineno = i + 2;
            let (right_id, left_id, conn_cost) = Self::parse_body(line, lineno)?;
            if !matrix.contains(right_id, left_id) {
                return Err(KeitaiError::malformed_matrix(
                    lineno,
                    "left/right_id must be within num_left/right.",
                ));
            }
            matrix.set_cost(right_id, left_id, conn_cost);
        }
        Ok(matrix)
    }

    fn parse_header(line: &str) -> Result<(usize, usize)> {
        let cols: Vec<_> = line.split_whitespace().collect();
        if cols.len() != 2 {
            let msg = format!(
                "The header must consists of two integers separated by spaces, {line}"
            );
            return Err(KeitaiError::malformed_matrix(1, msg));
        }
        let parse = |col: &str| {
            col.parse::<u16>().map_err(|e| {
                KeitaiError::malformed_matrix(1, format!("{e}: {line}"))
            })
        };
        let num_right = parse(cols[0])?;
        let num_left = parse(cols[1])?;
        if num_right == 0 || num_left == 0 {
            return Err(KeitaiError::malformed_matrix(
                1,
                "num_right/left must be positive to hold BOS/EOS.",
            ));
        }
        Ok((usize::from(num_right), usize::from(num_left)))
    }

    fn parse_body(line: &str, lineno: usize) -> Result<(u16, u16, i16)> {
        let cols: Vec<_> = line.split_whitespace().collect();
        if cols.len() != 3 {
            let msg = format!(
                "A row other than the header must consists of three integers separated by spaces, {line}"
            );
            return Err(KeitaiError::malformed_matrix(lineno, msg));
        }
        let to_err = |e: std::num::ParseIntError| {
            KeitaiError::malformed_matrix(lineno, format!("{e}: {line}"))
        };
        Ok((
            cols[0].parse().map_err(to_err)?,
            cols[1].parse().map_err(to_err)?,
            cols[2].parse().map_err(to_err)?,
        ))
    }
}
