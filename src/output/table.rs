#![forbid(unsafe_code)]

use std::io;

/// Column-aligned text table with a CSV fallback.
#[derive(Debug, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn row(&mut self, cols: impl IntoIterator<Item = impl Into<String>>) {
        self.rows.push(cols.into_iter().map(Into::into).collect());
    }

    pub fn print(&self) -> io::Result<()> {
        let mut out = io::stdout().lock();
        self.write_to(&mut out)
    }

    pub fn print_csv(&self) -> io::Result<()> {
        self.write_csv(io::stdout().lock())
    }

    pub fn write_csv(&self, out: impl io::Write) -> io::Result<()> {
        let mut wtr = csv::Writer::from_writer(out);
        wtr.write_record(&self.headers)?;
        for row in &self.rows {
            wtr.write_record(row)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn write_to(&self, mut out: impl io::Write) -> io::Result<()> {
        let widths = self.widths();
        writeln!(&mut out, "{}", format_row(&self.headers, &widths))?;
        for row in &self.rows {
            writeln!(&mut out, "{}", format_row(row, &widths))?;
        }
        Ok(())
    }

    fn widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| visible_width(h)).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                if i >= widths.len() {
                    widths.push(0);
                }
                widths[i] = widths[i].max(visible_width(cell));
            }
        }
        widths
    }
}

fn visible_width(s: &str) -> usize {
    // One column per char; wide glyphs are rare in task titles.
    s.chars().count()
}

fn format_row(row: &[String], widths: &[usize]) -> String {
    let mut out = String::new();
    for (i, cell) in row.iter().enumerate() {
        if i > 0 {
            out.push_str("  ");
        }
        out.push_str(cell);
        // No trailing padding on the last column.
        if i + 1 < row.len() {
            let w = widths.get(i).copied().unwrap_or(0);
            let pad = w.saturating_sub(visible_width(cell));
            out.extend(std::iter::repeat_n(' ', pad));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_are_aligned() {
        let mut t = Table::new(["ID", "TITLE", "DUE"]);
        t.row(["a1", "short", "2025-01-01"]);
        t.row(["b2", "a longer title", "2025-01-02"]);
        let mut buf = Vec::new();
        t.write_to(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "ID  TITLE           DUE");
        assert_eq!(lines[1], "a1  short           2025-01-01");
        assert_eq!(lines[2], "b2  a longer title  2025-01-02");
    }

    #[test]
    fn csv_quotes_commas() {
        let mut t = Table::new(["id", "title"]);
        t.row(["a", "milk, eggs"]);
        let mut buf = Vec::new();
        t.write_csv(&mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "id,title\na,\"milk, eggs\"\n");
    }
}
