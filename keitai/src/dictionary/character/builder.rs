use std::io::{prelude::*, BufReader, Read};
use std::ops::Range;

use hashbrown::HashMap;

use crate::dictionary::character::{CharInfo, CharProperty, DEFAULT_CATEGORY, MAX_CATEGORIES};
use crate::errors::{KeitaiError, Result};

/// Code points covered by the lookup table.
const TABLE_SIZE: usize = 1 << 16;

/// A meaningful line of `char.def`.
enum CharDefLine<'a> {
    Category {
        name: &'a str,
        invoke: bool,
        group: bool,
        length: u16,
    },
    Range {
        range: Range<usize>,
        // The first one is the base category.
        categories: Vec<&'a str>,
    },
}

fn parse_flag(col: &str, name: &str, lineno: usize) -> Result<bool> {
    match col {
        "0" => Ok(false),
        "1" => Ok(true),
        _ => Err(KeitaiError::invalid_format(
            "char.def",
            format!("{name} must be 1 or 0 at line {lineno}"),
        )),
    }
}

fn parse_code_point(hex: &str, line: &str, lineno: usize) -> Result<usize> {
    let digits = hex.strip_prefix("0x").unwrap_or(hex);
    usize::from_str_radix(digits, 16).map_err(|e| {
        KeitaiError::invalid_format("char.def", format!("{e} at line {lineno}: {line}"))
    })
}

impl<'a> CharDefLine<'a> {
    /// Parses a line stripped of its comment, or returns `None` for a blank one.
    fn parse(line: &'a str, lineno: usize) -> Result<Option<Self>> {
        let body = line.split_once('#').map_or(line, |(body, _)| body);
        let cols: Vec<_> = body.split_whitespace().collect();
        let Some(&first) = cols.first() else {
            return Ok(None);
        };

        if first.starts_with("0x") {
            if cols.len() < 2 {
                let msg = format!("A character range needs a category at line {lineno}: {line}");
                return Err(KeitaiError::invalid_format("char.def", msg));
            }
            let (start, end) = match first.split_once("..") {
                Some((s, e)) => (
                    parse_code_point(s, line, lineno)?,
                    parse_code_point(e, line, lineno)? + 1,
                ),
                None => {
                    let c = parse_code_point(first, line, lineno)?;
                    (c, c + 1)
                }
            };
            if start >= end {
                let msg = format!("A character range is reversed at line {lineno}: {line}");
                return Err(KeitaiError::invalid_format("char.def", msg));
            }
            if end > TABLE_SIZE {
                let msg = format!("A character range exceeds 0xFFFF at line {lineno}: {line}");
                return Err(KeitaiError::invalid_format("char.def", msg));
            }
            return Ok(Some(Self::Range {
                range: start..end,
                categories: cols[1..].to_vec(),
            }));
        }

        if cols.len() != 4 {
            let msg = format!(
                "A category must be `NAME INVOKE GROUP LENGTH` at line {lineno}: {line}"
            );
            return Err(KeitaiError::invalid_format("char.def", msg));
        }
        Ok(Some(Self::Category {
            name: first,
            invoke: parse_flag(cols[1], "INVOKE", lineno)?,
            group: parse_flag(cols[2], "GROUP", lineno)?,
            length: cols[3].parse()?,
        }))
    }
}

impl CharProperty {
    /// Creates a new instance from `char.def`.
    ///
    /// Characters not covered by any range belong to `DEFAULT`.
    ///
    /// # Arguments
    ///
    ///  - `rdr`: A reader of the file.
    ///
    /// # Errors
    ///
    /// [`KeitaiError`] is returned when the format is invalid,
    /// including an undefined category or a missing `DEFAULT` category.
    pub fn from_reader<R>(rdr: R) -> Result<Self>
    where
        R: Read,
    {
        let lines = BufReader::new(rdr).lines().collect::<std::io::Result<Vec<_>>>()?;

        // Category names are ordered by definition with DEFAULT first.
        let mut categories = vec![DEFAULT_CATEGORY.to_string()];
        let mut infos: Vec<Option<CharInfo>> = vec![None];
        let mut ranges = vec![];
        for (i, line) in lines.iter().enumerate() {
            match CharDefLine::parse(line, i + 1)? {
                None => {}
                Some(CharDefLine::Category {
                    name,
                    invoke,
                    group,
                    length,
                }) => {
                    let cate_id = match categories.iter().position(|c| c == name) {
                        Some(id) => id,
                        None => {
                            categories.push(name.to_string());
                            infos.push(None);
                            categories.len() - 1
                        }
                    };
                    if cate_id >= MAX_CATEGORIES {
                        let msg = format!("At most {MAX_CATEGORIES} categories can be defined");
                        return Err(KeitaiError::invalid_format("char.def", msg));
                    }
                    let cinfo = CharInfo::new(0, u32::try_from(cate_id)?, invoke, group, length)
                        .ok_or_else(|| {
                            KeitaiError::invalid_format(
                                "char.def",
                                format!("LENGTH must be less than 16 at line {}", i + 1),
                            )
                        })?;
                    infos[cate_id] = Some(cinfo);
                }
                Some(CharDefLine::Range { range, categories: names }) => ranges.push((range, names)),
            }
        }

        let (chr2inf, default_info) = {
            let cate_ids: HashMap<&str, usize> = categories
                .iter()
                .enumerate()
                .map(|(id, name)| (name.as_str(), id))
                .collect();
            let resolve = |names: &[&str]| -> Result<CharInfo> {
                let mut cate_idset = 0;
                let mut base = None;
                for &name in names {
                    let cinfo = cate_ids.get(name).and_then(|&id| infos[id]).ok_or_else(|| {
                        KeitaiError::invalid_format("char.def", format!("Undefined category: {name}"))
                    })?;
                    cate_idset |= 1 << cinfo.base_id();
                    base.get_or_insert(cinfo);
                }
                let mut base = base.ok_or_else(|| {
                    KeitaiError::invalid_format("char.def", "A range must have a category.")
                })?;
                base.reset_cate_idset(cate_idset);
                Ok(base)
            };

            let default_info = resolve(&[DEFAULT_CATEGORY])?;
            let mut chr2inf = vec![default_info; TABLE_SIZE];
            for (range, names) in &ranges {
                chr2inf[range.clone()].fill(resolve(names.as_slice())?);
            }
            (chr2inf, default_info)
        };

        Ok(Self {
            chr2inf,
            default_info,
            categories,
        })
    }
}
