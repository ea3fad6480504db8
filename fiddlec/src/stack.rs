use std::fmt::{Debug, Display, Write};

use crate::error::{FiddleError, Result};

/// A fixed-capacity stack. `index` counts the live elements and doubles as
/// the next free slot. Popping decrements `index` but leaves the element in
/// place, so the most recently popped value stays readable at `data[index]`
/// until something overwrites it; `last_popped` depends on this.
pub struct Stack<T, const N: usize> {
    data: Vec<T>,
    index: usize,
}

impl<T, const N: usize> Stack<T, N>
where
    T: Clone + Default,
{
    pub fn new() -> Self {
        Stack {
            data: vec![T::default(); N],
            index: 0,
        }
    }

    pub fn push(&mut self, value: T) -> Result<()> {
        if self.index == N {
            return FiddleError::runtime_err("stack overflow");
        }
        self.data[self.index] = value;
        self.index += 1;
        Ok(())
    }

    pub fn pop(&mut self) -> Result<T> {
        if self.index == 0 {
            return FiddleError::runtime_err("stack underflow");
        }
        self.index -= 1;
        Ok(self.data[self.index].clone())
    }

    /// The element most recently popped and not yet overwritten.
    pub fn last_popped(&self) -> &T {
        &self.data[self.index]
    }

    /// Peek below the top: distance 0 is the top element.
    pub fn peek(&self, distance: usize) -> &T {
        debug_assert!(distance < self.index);
        &self.data[self.index - distance - 1]
    }

    pub fn read(&self, index: usize) -> &T {
        debug_assert!(index < self.index);
        &self.data[index]
    }

    pub fn write(&mut self, index: usize, value: T) {
        debug_assert!(index < self.index);
        self.data[index] = value;
    }

    /// Pop values until the stack has the given length.
    /// e.g. stack: 0,1,2,3 -> truncate(2) -> stack: 0,1
    pub fn truncate(&mut self, length: usize) {
        debug_assert!(length <= self.index);
        self.index = length;
    }

    /// Raise the stack pointer to `length` without writing, reserving slots
    /// for a frame's locals. The reserved slots keep whatever they held.
    pub fn grow(&mut self, length: usize) -> Result<()> {
        if length > N {
            return FiddleError::runtime_err("stack overflow");
        }
        debug_assert!(length >= self.index);
        self.index = length;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.index
    }
}

impl<T, const N: usize> Debug for Stack<T, N>
where
    T: Clone + Default + Display,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for index in 0..self.index {
            f.write_str(&format!("[ {} ]", self.read(index)))?;
        }
        f.write_char('\n')?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_is_lifo() {
        const MAX: usize = 100;
        let mut stack = Stack::<usize, MAX>::new();
        for i in 0..MAX {
            stack.push(i).unwrap();
            assert_eq!(stack.peek(0), &i);
        }
        for i in (0..MAX).rev() {
            assert_eq!(stack.pop().unwrap(), i);
            assert_eq!(stack.last_popped(), &i);
        }
    }

    #[test]
    fn overflow_and_underflow_are_deterministic_errors() {
        let mut stack = Stack::<usize, 2>::new();
        assert!(stack.pop().is_err());
        stack.push(1).unwrap();
        stack.push(2).unwrap();
        assert!(stack.push(3).is_err());
        // The failed push must not corrupt the stack.
        assert_eq!(stack.pop().unwrap(), 2);
        assert_eq!(stack.pop().unwrap(), 1);
        assert!(stack.pop().is_err());
    }

    #[test]
    fn grow_reserves_slots_up_to_capacity() {
        let mut stack = Stack::<usize, 4>::new();
        stack.push(7).unwrap();
        stack.grow(3).unwrap();
        assert_eq!(stack.len(), 3);
        stack.write(1, 8);
        assert_eq!(stack.read(1), &8);
        assert!(stack.grow(5).is_err());
    }

    #[test]
    fn last_popped_survives_until_overwritten() {
        let mut stack = Stack::<usize, 4>::new();
        stack.push(1).unwrap();
        stack.push(2).unwrap();
        stack.pop().unwrap();
        assert_eq!(stack.last_popped(), &2);
        stack.push(3).unwrap();
        stack.pop().unwrap();
        assert_eq!(stack.last_popped(), &3);
    }
}
