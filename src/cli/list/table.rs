use std::fmt::{self, Write};

/// A column-aligned listing whose header cells are single words, so the
/// output can be processed with `awk`.
pub(crate) struct Table {
    header: &'static [&'static str],
    rows: Vec<Vec<String>>,
    print_header: bool,
}

impl Table {
    pub(crate) fn new(header: &'static [&'static str]) -> Table {
        debug_assert!(header
            .iter()
            .all(|cell| !cell.contains(char::is_whitespace)));

        Table {
            header,
            rows: Vec::new(),
            print_header: true,
        }
    }

    pub(crate) fn print_header(&mut self, print_header: bool) {
        self.print_header = print_header;
    }

    /// Appends a row. Missing cells are left blank and extra cells dropped.
    pub(crate) fn add_row(&mut self, mut row: Vec<String>) {
        row.resize(self.header.len(), String::new());

        self.rows.push(row);
    }

    fn column_widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.header.iter().map(|cell| cell.len()).collect();

        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        widths
    }
}

fn write_row<'c, I>(f: &mut fmt::Formatter<'_>, widths: &[usize], cells: I) -> fmt::Result
where
    I: ExactSizeIterator<Item = &'c str>,
{
    let last = cells.len().saturating_sub(1);

    for (i, cell) in cells.enumerate() {
        if i == last {
            // No trailing padding
            f.write_str(cell)?;
        } else {
            write!(f, "{:<width$}  ", cell, width = widths[i])?;
        }
    }

    f.write_char('\n')
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let widths = self.column_widths();

        if self.print_header {
            write_row(f, &widths, self.header.iter().copied())?;
        }

        for row in &self.rows {
            write_row(f, &widths, row.iter().map(String::as_str))?;
        }

        Ok(())
    }
}

pub(crate) trait IntoTable: Into<Table> + Sized {
    fn into_table(self) -> Table {
        self.into()
    }
}

impl<T> IntoTable for T where T: Into<Table> + Sized {}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Table {
        let mut tab = Table::new(&["MODEL", "PROVIDER"]);

        tab.add_row(vec!["gpt2".to_string(), "hf-inference".to_string()]);
        tab.add_row(vec![
            "black-forest-labs/FLUX.1-dev".to_string(),
            "fal-ai".to_string(),
        ]);

        tab
    }

    #[test]
    fn columns_are_aligned() {
        assert_eq!(
            table().to_string(),
            "MODEL                         PROVIDER\n\
             gpt2                          hf-inference\n\
             black-forest-labs/FLUX.1-dev  fal-ai\n"
        );
    }

    #[test]
    fn header_can_be_omitted() {
        let mut tab = table();
        tab.print_header(false);

        assert_eq!(tab.to_string().lines().count(), 2);
        assert!(tab.to_string().starts_with("gpt2"));
    }

    #[test]
    fn short_rows_are_padded() {
        let mut tab = Table::new(&["A", "B", "C"]);
        tab.add_row(vec!["1".to_string()]);

        assert_eq!(tab.to_string(), "A  B  C\n1     \n");
    }
}
