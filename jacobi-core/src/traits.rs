use bytemuck::{Pod, Zeroable};
use std::fmt::Debug;

/// Generic trait representing a matrix, host or device resident.
pub trait Matrix: Debug {
    /// The underlying numeric type of the matrix elements.
    type Value: Copy + Debug + Default + Pod + Zeroable;

    /// Returns the dimensions of the matrix as (rows, columns).
    fn dims(&self) -> (usize, usize);

    fn rows(&self) -> usize {
        self.dims().0
    }

    fn cols(&self) -> usize {
        self.dims().1
    }

    fn is_square(&self) -> bool {
        let (rows, cols) = self.dims();
        rows == cols
    }
}

/// Generic trait representing a vector, host or device resident.
pub trait Vector: Debug {
    type Value: Copy + Debug + Default + Pod + Zeroable;

    /// Returns the number of elements in the vector.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
