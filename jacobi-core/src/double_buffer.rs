//! Ping-pong storage for iterative kernels.
//!
//! Two equally sized slots and an index naming the current one. A kernel reads
//! [`DoubleBuffer::current`] and writes [`DoubleBuffer::next`]; [`DoubleBuffer::swap`]
//! flips the index, so advancing an iteration never copies data.

#[derive(Debug)]
pub struct DoubleBuffer<T> {
    slots: [T; 2],
    current: usize,
}

impl<T> DoubleBuffer<T> {
    /// Creates a double buffer whose current slot is `current`.
    pub fn new(current: T, next: T) -> Self {
        Self {
            slots: [current, next],
            current: 0,
        }
    }

    /// Index (0 or 1) of the slot currently holding the newest state.
    pub fn parity(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> &T {
        &self.slots[self.current]
    }

    pub fn next(&self) -> &T {
        &self.slots[1 - self.current]
    }

    /// Read view of the current slot together with write access to the next one.
    pub fn split_mut(&mut self) -> (&T, &mut T) {
        let [first, second] = &mut self.slots;
        if self.current == 0 {
            (&*first, second)
        } else {
            (&*second, first)
        }
    }

    /// Both slots in storage order, independent of which one is current.
    pub fn slots(&self) -> &[T; 2] {
        &self.slots
    }

    /// Makes the next slot current.
    pub fn swap(&mut self) {
        self.current = 1 - self.current;
    }

    /// Consumes the buffer and returns the current slot.
    pub fn into_current(self) -> T {
        let [first, second] = self.slots;
        if self.current == 0 {
            first
        } else {
            second
        }
    }
}

#[cfg(test)]
mod tests {
    use super::DoubleBuffer;

    #[test]
    fn test_swap_flips_roles_without_copying() {
        let mut buffers = DoubleBuffer::new(vec![1.0f32, 2.0], vec![0.0f32, 0.0]);
        let current_ptr = buffers.current().as_ptr();
        let next_ptr = buffers.next().as_ptr();

        buffers.swap();
        assert_eq!(buffers.parity(), 1);
        assert_eq!(buffers.current().as_ptr(), next_ptr);
        assert_eq!(buffers.next().as_ptr(), current_ptr);

        buffers.swap();
        assert_eq!(buffers.parity(), 0);
        assert_eq!(buffers.current(), &vec![1.0, 2.0]);
    }

    #[test]
    fn test_split_mut_writes_next_slot() {
        let mut buffers = DoubleBuffer::new(vec![1.0f32; 3], vec![0.0f32; 3]);
        {
            let (current, next) = buffers.split_mut();
            for (out, value) in next.iter_mut().zip(current) {
                *out = value * 2.0;
            }
        }
        buffers.swap();
        {
            let (current, next) = buffers.split_mut();
            assert_eq!(current, &vec![2.0; 3]);
            next[0] = 7.0;
        }
        assert_eq!(buffers.slots()[0][0], 7.0);
        assert_eq!(buffers.into_current(), vec![2.0; 3]);
    }
}
