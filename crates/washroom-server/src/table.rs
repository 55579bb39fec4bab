//! Plain-text table renderer for console listings.

use colored::Colorize;

/// Spaces between columns
const COLUMN_GAP: usize = 2;

/// Column-aligned table with centered cells
#[derive(Debug, Clone)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Create a table with the given column headers
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row; missing cells render empty, extra cells are dropped
    pub fn add_row<I, S>(&mut self, cells: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut row: Vec<String> = cells.into_iter().map(Into::into).collect();
        row.resize(self.headers.len(), String::new());
        self.rows.push(row);
    }

    /// Stable sort of the rows by one column
    pub fn sort_by_column(&mut self, column: usize) {
        if column < self.headers.len() {
            self.rows.sort_by(|a, b| a[column].cmp(&b[column]));
        }
    }

    /// Number of data rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the table has no data rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn widths(&self) -> Vec<usize> {
        self.headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                self.rows
                    .iter()
                    .map(|row| row[i].chars().count())
                    .chain(std::iter::once(header.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect()
    }

    /// Render to text, coloring the header when `color` is set
    pub fn render(&self, color: bool) -> String {
        let widths = self.widths();
        let gap = " ".repeat(COLUMN_GAP);

        let header = join_cells(&self.headers, &widths, &gap);
        let header = if color {
            header.bold().cyan().to_string()
        } else {
            header
        };

        let total = widths.iter().sum::<usize>() + COLUMN_GAP * widths.len().saturating_sub(1);
        let mut out = format!("{}\n{}\n", header, "-".repeat(total));
        for row in &self.rows {
            out.push_str(&join_cells(row, &widths, &gap));
            out.push('\n');
        }
        out
    }
}

fn join_cells(cells: &[String], widths: &[usize], gap: &str) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{:^width$}", cell, width = *width))
        .collect::<Vec<_>>()
        .join(gap)
        .trim_end()
        .to_string()
}
