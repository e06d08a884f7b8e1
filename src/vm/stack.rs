//! VM call stack
//!
//! A generic LIFO container. The VM uses it to record the chain of
//! instruction calls currently executing, including frames pushed by
//! nested branch programs.

/// Provides stack operations for the virtual machine
#[derive(Debug, Clone)]
pub struct CallStack<T> {
    /// Frames, bottom first
    items: Vec<T>,
}

impl<T> Default for CallStack<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Clone> CallStack<T> {
    /// Create a new empty stack
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a frame onto the stack
    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    /// Pop the top frame, or `None` when the stack is empty
    pub fn pop(&mut self) -> Option<T> {
        self.items.pop()
    }

    /// Return the top frame without popping it
    pub fn peek(&self) -> Option<&T> {
        self.items.last()
    }

    /// Check if the stack is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Get the number of frames
    pub fn size(&self) -> usize {
        self.items.len()
    }

    /// Clear the stack
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Copy of all frames, bottom to top
    pub fn get_all(&self) -> Vec<T> {
        self.items.clone()
    }
}
