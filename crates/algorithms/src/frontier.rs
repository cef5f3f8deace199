//! Frontier work list and per-cell mark state
//!
//! Every propagation in this crate follows the same shape: seed a frontier
//! from a full grid scan, then drain it. The queue is strictly FIFO so that
//! unit-step wavefronts grow in expanding rings.

use flowgrid_core::raster::{diagonal_neighbours, orthogonal_neighbours};
use flowgrid_core::{Cell, Error, Result};

/// Fixed-capacity circular FIFO of cells.
///
/// The ring holds one slot more than the requested capacity so a full
/// queue can be told apart from an empty one.
#[derive(Debug, Clone)]
pub struct FrontierQueue {
    ring: Vec<Cell>,
    head: usize,
    tail: usize,
}

impl FrontierQueue {
    /// Queue able to hold `capacity` cells at once
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: vec![Cell::default(); capacity + 1],
            head: 0,
            tail: 0,
        }
    }

    /// Queue able to hold every cell of a `rows` x `cols` grid
    pub fn for_grid(rows: usize, cols: usize) -> Self {
        Self::new(rows * cols)
    }

    pub fn capacity(&self) -> usize {
        self.ring.len() - 1
    }

    pub fn len(&self) -> usize {
        (self.tail + self.ring.len() - self.head) % self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    /// Append a cell, failing with [`Error::QueueOverflow`] when full
    pub fn push_back(&mut self, cell: Cell) -> Result<()> {
        let next = (self.tail + 1) % self.ring.len();
        if next == self.head {
            return Err(Error::QueueOverflow {
                capacity: self.capacity(),
            });
        }
        self.ring[self.tail] = cell;
        self.tail = next;
        Ok(())
    }

    /// Remove the oldest cell
    pub fn pop_head(&mut self) -> Option<Cell> {
        if self.is_empty() {
            return None;
        }
        let cell = self.ring[self.head];
        self.head = (self.head + 1) % self.ring.len();
        Some(cell)
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
    }
}

/// Propagation state of a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Mark {
    #[default]
    Todo = 0,
    /// Queued on the frontier
    Border = 1,
    /// Relaxed
    Done = 2,
}

/// One [`Mark`] per cell, row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkGrid {
    marks: Vec<Mark>,
    cols: usize,
}

impl MarkGrid {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            marks: vec![Mark::Todo; rows * cols],
            cols,
        }
    }

    #[inline]
    pub fn get(&self, cell: Cell) -> Mark {
        self.marks[cell.index(self.cols)]
    }

    #[inline]
    pub fn set(&mut self, cell: Cell, mark: Mark) {
        self.marks[cell.index(self.cols)] = mark;
    }

    /// Reset every cell to [`Mark::Todo`]
    pub fn reset(&mut self) {
        self.marks.fill(Mark::Todo);
    }

    pub fn all_todo(&self) -> bool {
        self.marks.iter().all(|&m| m == Mark::Todo)
    }

    pub fn as_slice(&self) -> &[Mark] {
        &self.marks
    }
}

/// Label-correcting wavefront over the D8 neighbourhood.
///
/// Holds the queue and marks of a single propagation; the distance field
/// and payloads live with the caller and are updated from the relax callback.
#[derive(Debug)]
pub(crate) struct Wavefront {
    rows: usize,
    cols: usize,
    pub(crate) marks: MarkGrid,
    pub(crate) queue: FrontierQueue,
}

impl Wavefront {
    pub(crate) fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            marks: MarkGrid::new(rows, cols),
            queue: FrontierQueue::for_grid(rows, cols),
        }
    }

    pub(crate) fn seed(&mut self, cell: Cell) -> Result<()> {
        self.marks.set(cell, Mark::Border);
        self.queue.push_back(cell)
    }

    /// Drain the frontier.
    ///
    /// `relax(from, to, step)` is called for every neighbour of a dequeued
    /// cell, orthogonal neighbours first (step 1) then diagonal ones
    /// (step sqrt 2), and returns whether `to` improved. Improved cells that
    /// are not already queued are appended to the frontier. When `touched`
    /// is given, cells leaving [`Mark::Todo`] for the first time are recorded.
    pub(crate) fn drain<F>(&mut self, mut relax: F, mut touched: Option<&mut Vec<Cell>>) -> Result<()>
    where
        F: FnMut(Cell, Cell, f32) -> bool,
    {
        let (rows, cols) = (self.rows, self.cols);
        while let Some(cell) = self.queue.pop_head() {
            debug_assert_eq!(self.marks.get(cell), Mark::Border);
            self.marks.set(cell, Mark::Done);

            for n in orthogonal_neighbours(cell, rows, cols) {
                if relax(cell, n, 1.0) {
                    self.enqueue(n, touched.as_deref_mut())?;
                }
            }
            for n in diagonal_neighbours(cell, rows, cols) {
                if relax(cell, n, std::f32::consts::SQRT_2) {
                    self.enqueue(n, touched.as_deref_mut())?;
                }
            }
        }
        Ok(())
    }

    fn enqueue(&mut self, cell: Cell, touched: Option<&mut Vec<Cell>>) -> Result<()> {
        let mark = self.marks.get(cell);
        if mark != Mark::Border {
            if let (Mark::Todo, Some(touched)) = (mark, touched) {
                touched.push(cell);
            }
            self.marks.set(cell, Mark::Border);
            self.queue.push_back(cell)?;
        }
        Ok(())
    }
}
