//! Geometry for the file browser body: grid cells and mouse hit testing

use ratatui::layout::Rect;

/// Width of one grid cell including its gap
pub const CELL_WIDTH: u16 = 24;

/// Where the browser entries were last drawn, for mapping clicks back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitArea {
    /// One entry per line starting at `offset`
    List { inner: Rect, offset: usize },
    Grid(GridLayout),
}

impl HitArea {
    /// Display index under a terminal cell
    pub fn index_at(&self, x: u16, y: u16, len: usize) -> Option<usize> {
        match self {
            HitArea::List { inner, offset } => {
                if !contains(inner, x, y) {
                    return None;
                }
                let index = offset + (y - inner.y) as usize;
                (index < len).then_some(index)
            }
            HitArea::Grid(grid) => grid.index_at(x, y, len),
        }
    }
}

fn contains(rect: &Rect, x: u16, y: u16) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GridLayout {
    pub inner: Rect,
    pub columns: usize,
    /// First visible row
    pub first_row: usize,
}

impl GridLayout {
    /// Lay out `inner`, scrolling from `first_row` just enough to keep the
    /// cursor's row on screen
    pub fn new(inner: Rect, cursor: usize, first_row: usize) -> Self {
        let columns = (inner.width / CELL_WIDTH).max(1) as usize;
        let rows = (inner.height as usize).max(1);
        let cursor_row = cursor / columns;

        let first_row = if cursor_row < first_row {
            cursor_row
        } else if cursor_row >= first_row + rows {
            cursor_row + 1 - rows
        } else {
            first_row
        };

        Self {
            inner,
            columns,
            first_row,
        }
    }

    pub fn visible_rows(&self) -> usize {
        self.inner.height as usize
    }

    /// Display indices drawn on each visible line
    pub fn rows(&self, len: usize) -> Vec<std::ops::Range<usize>> {
        (self.first_row..self.first_row + self.visible_rows())
            .map(|row| row * self.columns)
            .take_while(|&start| start < len)
            .map(|start| start..(start + self.columns).min(len))
            .collect()
    }

    pub fn index_at(&self, x: u16, y: u16, len: usize) -> Option<usize> {
        if !contains(&self.inner, x, y) {
            return None;
        }
        let column = ((x - self.inner.x) / CELL_WIDTH) as usize;
        if column >= self.columns {
            return None;
        }
        let row = self.first_row + (y - self.inner.y) as usize;
        let index = row * self.columns + column;
        (index < len).then_some(index)
    }
}
