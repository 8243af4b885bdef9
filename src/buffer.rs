//! Stereo audio buffer shared by voices, the filter and the output stage

/// Planar two-channel buffer of `f32` frames
#[derive(Debug, Clone, Default)]
pub struct StereoBuffer {
    left: Vec<f32>,
    right: Vec<f32>,
}

impl StereoBuffer {
    /// Create a silent buffer holding `frames` frames
    pub fn new(frames: usize) -> Self {
        Self {
            left: vec![0.0; frames],
            right: vec![0.0; frames],
        }
    }

    /// Create a buffer with room for `capacity` frames but no frames in use
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            left: Vec::with_capacity(capacity),
            right: Vec::with_capacity(capacity),
        }
    }

    /// Number of frames
    pub fn len(&self) -> usize {
        self.left.len()
    }

    /// Check if the buffer holds no frames
    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    /// Change the number of frames in use.
    ///
    /// Does not allocate as long as `frames` stays within the capacity the
    /// buffer was created with.
    pub fn resize(&mut self, frames: usize) {
        self.left.resize(frames, 0.0);
        self.right.resize(frames, 0.0);
    }

    /// Zero every frame
    pub fn clear(&mut self) {
        self.left.fill(0.0);
        self.right.fill(0.0);
    }

    /// Mix a frame into the buffer (adds, never overwrites)
    #[inline]
    pub fn add(&mut self, frame: usize, left: f32, right: f32) {
        if let (Some(l), Some(r)) = (self.left.get_mut(frame), self.right.get_mut(frame)) {
            *l += left;
            *r += right;
        }
    }

    /// Read one frame as `(left, right)`
    #[inline]
    pub fn frame(&self, frame: usize) -> (f32, f32) {
        (
            self.left.get(frame).copied().unwrap_or(0.0),
            self.right.get(frame).copied().unwrap_or(0.0),
        )
    }

    pub fn left(&self) -> &[f32] {
        &self.left
    }

    pub fn right(&self) -> &[f32] {
        &self.right
    }

    /// Both channels, mutably
    pub fn channels_mut(&mut self) -> [&mut [f32]; 2] {
        [&mut self.left, &mut self.right]
    }

    /// Multiply every frame by `gain`
    pub fn apply_gain(&mut self, gain: f32) {
        for sample in self.left.iter_mut().chain(self.right.iter_mut()) {
            *sample *= gain;
        }
    }

    /// Largest absolute sample value across both channels
    pub fn peak(&self) -> f32 {
        self.left
            .iter()
            .chain(self.right.iter())
            .fold(0.0f32, |acc, &s| acc.max(s.abs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_add_sums() {
        let mut buffer = StereoBuffer::new(4);
        buffer.add(1, 0.25, -0.5);
        buffer.add(1, 0.25, -0.5);

        assert_eq!(buffer.frame(1), (0.5, -1.0));
        assert_eq!(buffer.frame(0), (0.0, 0.0));
    }

    #[test]
    fn test_buffer_add_out_of_range_is_ignored() {
        let mut buffer = StereoBuffer::new(2);
        buffer.add(5, 1.0, 1.0);
        assert_eq!(buffer.peak(), 0.0);
    }

    #[test]
    fn test_buffer_gain_and_peak() {
        let mut buffer = StereoBuffer::new(3);
        buffer.add(0, 1.0, -2.0);
        buffer.apply_gain(0.5);

        assert_eq!(buffer.frame(0), (0.5, -1.0));
        assert_eq!(buffer.peak(), 1.0);
    }

    #[test]
    fn test_buffer_resize_within_capacity() {
        let mut buffer = StereoBuffer::with_capacity(64);
        assert!(buffer.is_empty());

        buffer.resize(32);
        assert_eq!(buffer.len(), 32);
        assert_eq!(buffer.left().len(), 32);
        assert_eq!(buffer.right().len(), 32);
    }
}
