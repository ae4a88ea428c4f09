use crate::ld::GenotypeList;
use crate::utils::Result;
use std::io::BufRead;

/// Streams genotypes from a GL String file.
///
/// Each line is either `ID<TAB>GLSTRING` or a bare GL String, in which case
/// the line number becomes the id. Blank lines and `#` comments are skipped.
/// A malformed line yields an error for that line only.
pub struct GlStringRecords<R> {
    reader: R,
    line: String,
    line_number: usize,
    done: bool,
}

impl<R: BufRead> GlStringRecords<R> {
    pub fn new(reader: R) -> Self {
        GlStringRecords {
            reader,
            line: String::new(),
            line_number: 0,
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for GlStringRecords<R> {
    type Item = Result<GenotypeList>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            self.line.clear();
            match self.reader.read_line(&mut self.line) {
                Ok(0) => self.done = true,
                Ok(_) => {
                    self.line_number += 1;
                    let trimmed = self.line.trim();
                    if trimmed.is_empty() || trimmed.starts_with('#') {
                        continue;
                    }
                    let (id, gl_string) = match trimmed.split_once('\t') {
                        Some((id, gl_string)) => (id.trim().to_string(), gl_string),
                        None => (self.line_number.to_string(), trimmed),
                    };
                    return Some(
                        GenotypeList::parse(id, gl_string).map_err(|e| {
                            format!("Error at GL String line {}: {}", self.line_number, e)
                        }),
                    );
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(format!(
                        "Error reading GL String line {}: {}",
                        self.line_number + 1,
                        e
                    )));
                }
            }
        }
        None
    }
}
