//! Line-level translation from binary listings to assembly text.
//!
//! Every input line produces exactly one output line. Lines that fail to
//! decode are replaced by a `#` comment saying why, so the output stays
//! aligned with the input.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use Result;
use decode;

/// Marker that starts a comment, both in input listings and in diagnostics.
pub const COMMENT: char = '#';

/// Drop any trailing comment and surrounding whitespace.
pub fn clean_line(line: &str) -> &str {
    let code = match line.find(COMMENT) {
        Some(i) => &line[..i],
        None => line,
    };
    code.trim()
}

/// Translate one raw input line.
///
/// Blank and comment-only lines come back empty.
pub fn translate_line(line: &str) -> String {
    let word = clean_line(line);
    if word.is_empty() {
        return String::new();
    }

    match decode::decode_str(word) {
        Ok(inst) => {
            debug!("{} -> {}", word, inst);
            inst.to_string()
        }
        Err(e) => {
            debug!("{}: {}", word, e);
            format!("{} {}", COMMENT, e)
        }
    }
}

pub fn is_diagnostic(line: &str) -> bool {
    line.starts_with(COMMENT)
}

/// Read every line from `input` and translate it.
///
/// Only I/O failures are returned as errors.
pub fn translate_lines<R: BufRead>(input: R) -> Result<Vec<String>> {
    let mut out = vec![];
    for line in input.lines() {
        out.push(translate_line(&line?));
    }
    Ok(out)
}

/// Write `lines` separated by newlines, without a trailing newline.
pub fn write_lines<W: Write>(output: &mut W, lines: &[String]) -> Result<()> {
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            output.write_all(b"\n")?;
        }
        output.write_all(line.as_bytes())?;
    }
    output.flush()?;
    Ok(())
}

/// Translate all of `input` into `output`, returning the number of lines.
///
/// Nothing is written unless the whole input was read successfully.
pub fn translate<R: BufRead, W: Write>(input: R, output: &mut W) -> Result<usize> {
    let lines = translate_lines(input)?;
    write_lines(output, &lines)?;
    Ok(lines.len())
}

/// Translate the listing at `input` into a new file at `output`.
///
/// The output file is only created once the whole input has been read, so a
/// missing or unreadable input leaves `output` untouched.
pub fn translate_file<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output: Q) -> Result<Vec<String>> {
    info!("reading {}", input.as_ref().display());
    let lines = translate_lines(BufReader::new(File::open(input)?))?;

    let bad = lines.iter().filter(|l| is_diagnostic(l)).count();
    info!("decoded {} lines ({} diagnostics)", lines.len(), bad);

    let mut writer = BufWriter::new(File::create(&output)?);
    write_lines(&mut writer, &lines)?;
    info!("wrote {}", output.as_ref().display());
    Ok(lines)
}
