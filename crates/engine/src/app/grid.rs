use thiserror::Error;

/// Fixed-shape row-major cell storage.
///
/// Cell (x, y) lives at index `y * width + x`; (0, 0) is the top-left cell.
/// The shape never changes after construction. Coordinates are signed so callers
/// can probe neighbours without underflow; anything outside `[0, width) x [0, height)`
/// reads as `None` and ignores writes.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid<T> {
    width: u32,
    height: u32,
    cells: Vec<T>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("cell count mismatch: expected {expected}, got {actual}")]
    CellCountMismatch { expected: usize, actual: usize },
}

impl<T> Grid<T> {
    pub fn new(width: u32, height: u32, cells: Vec<T>) -> Result<Self, GridError> {
        let expected = width as usize * height as usize;
        let actual = cells.len();
        if expected != actual {
            return Err(GridError::CellCountMismatch { expected, actual });
        }
        Ok(Self {
            width,
            height,
            cells,
        })
    }

    pub fn from_fn(width: u32, height: u32, mut fill: impl FnMut(u32, u32) -> T) -> Self {
        let mut cells = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                cells.push(fill(x, y));
            }
        }
        Self {
            width,
            height,
            cells,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn index_of(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    pub fn get(&self, x: i64, y: i64) -> Option<&T> {
        self.index_of(x, y).and_then(|index| self.cells.get(index))
    }

    pub fn get_mut(&mut self, x: i64, y: i64) -> Option<&mut T> {
        let index = self.index_of(x, y)?;
        self.cells.get_mut(index)
    }

    /// Returns `false` and leaves the grid untouched when out of bounds.
    pub fn set(&mut self, x: i64, y: i64, value: T) -> bool {
        match self.get_mut(x, y) {
            Some(cell) => {
                *cell = value;
                true
            }
            None => false,
        }
    }

    pub fn cells(&self) -> &[T] {
        &self.cells
    }

    /// Iterates `(x, y, &mut cell)` in row-major order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (u32, u32, &mut T)> {
        let width = self.width.max(1);
        self.cells.iter_mut().enumerate().map(move |(index, cell)| {
            let index = index as u32;
            (index % width, index / width, cell)
        })
    }
}
