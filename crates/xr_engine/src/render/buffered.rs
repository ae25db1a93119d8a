//! Double-buffered frame data
//!
//! Submission fills the back buffer and publishes it; rendering reads the
//! most recently published front buffer. Both sides run on the render thread.

/// Two copies of `T`: one being written, one being read
#[derive(Debug, Default)]
pub struct BufferedData<T> {
    buffers: [T; 2],
    front: usize,
    published: bool,
}

impl<T: Default> BufferedData<T> {
    /// Create with two default buffers
    pub fn new() -> Self {
        Self {
            buffers: [T::default(), T::default()],
            front: 0,
            published: false,
        }
    }
}

impl<T> BufferedData<T> {
    /// Buffer being prepared for the next frame
    pub fn write_buffer(&mut self) -> &mut T {
        &mut self.buffers[1 - self.front]
    }

    /// Make the write buffer the read buffer
    pub fn publish(&mut self) {
        self.front = 1 - self.front;
        self.published = true;
    }

    /// Last published buffer, `None` before the first publish
    pub fn read_buffer(&self) -> Option<&T> {
        self.published.then(|| &self.buffers[self.front])
    }

    /// Mutable access to the last published buffer
    pub fn read_buffer_mut(&mut self) -> Option<&mut T> {
        if self.published {
            Some(&mut self.buffers[self.front])
        } else {
            None
        }
    }
}
