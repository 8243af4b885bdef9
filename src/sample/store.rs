//! Sample store
//!
//! Holds every loaded sample and answers which one plays a given note.

use std::path::Path;

use tracing::{debug, warn};

use super::decoder::{DecodedAudio, Decoder};
use super::Sample;

/// Loaded samples, in load order
#[derive(Debug, Default)]
pub struct SampleStore {
    samples: Vec<Sample>,
    next_id: u64,
}

impl SampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append decoded audio as a new sample and return its index
    pub fn load_sample(&mut self, audio: DecodedAudio, root_note: u8) -> usize {
        self.next_id += 1;
        self.samples.push(Sample::new(self.next_id, audio, root_note));
        self.samples.len() - 1
    }

    /// Decode a file and append it.
    ///
    /// A decode failure is logged and leaves the store unchanged.
    pub fn load_file(&mut self, decoder: &dyn Decoder, path: &Path, root_note: u8) -> Option<usize> {
        let audio = match decoder.decode(path) {
            Ok(audio) => audio,
            Err(e) => {
                warn!("skipping sample {:?}: {}", path, e);
                return None;
            }
        };

        let index = self.load_sample(audio, root_note);
        let sample = &mut self.samples[index];
        sample.name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        sample.source_path = Some(path.to_path_buf());

        debug!(
            "loaded sample '{}' ({} frames, {} ch, {} Hz, root {})",
            sample.name,
            sample.frame_count(),
            sample.channel_count(),
            sample.sample_rate(),
            sample.root_note
        );
        Some(index)
    }

    /// Remove every sample
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Index of the sample that plays `note`.
    ///
    /// First sample whose range contains the note, else the first sample.
    pub fn index_for_note(&self, note: u8) -> Option<usize> {
        if self.samples.is_empty() {
            return None;
        }
        Some(
            self.samples
                .iter()
                .position(|s| s.note_range.contains(note))
                .unwrap_or(0),
        )
    }

    /// Sample that plays `note`, if any sample is loaded
    pub fn sample_for_note(&self, note: u8) -> Option<&Sample> {
        self.index_for_note(note).map(|index| &self.samples[index])
    }

    pub fn get(&self, index: usize) -> Option<&Sample> {
        self.samples.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Sample> {
        self.samples.get_mut(index)
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Metadata access for control surfaces (loop points, note ranges)
    pub fn samples_mut(&mut self) -> &mut [Sample] {
        &mut self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{DecodeError, NoteRange};

    struct FailingDecoder;

    impl Decoder for FailingDecoder {
        fn decode(&self, _path: &Path) -> Result<DecodedAudio, DecodeError> {
            Err(DecodeError::NoChannels)
        }
    }

    struct SilenceDecoder;

    impl Decoder for SilenceDecoder {
        fn decode(&self, _path: &Path) -> Result<DecodedAudio, DecodeError> {
            Ok(DecodedAudio::mono(vec![0.0; 64], 44100))
        }
    }

    fn mono(frames: usize) -> DecodedAudio {
        DecodedAudio::mono(vec![0.0; frames], 44100)
    }

    #[test]
    fn test_empty_store_has_no_sample() {
        let store = SampleStore::new();
        assert!(store.sample_for_note(60).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_first_matching_range_wins() {
        let mut store = SampleStore::new();
        let low = store.load_sample(mono(10), 48);
        let high = store.load_sample(mono(10), 72);
        let overlap = store.load_sample(mono(10), 60);

        store.samples_mut()[low].note_range = NoteRange::new(0, 59);
        store.samples_mut()[high].note_range = NoteRange::new(60, 127);
        store.samples_mut()[overlap].note_range = NoteRange::new(55, 65);

        assert_eq!(store.index_for_note(40), Some(low));
        assert_eq!(store.index_for_note(59), Some(low));
        assert_eq!(store.index_for_note(60), Some(high));
        assert_eq!(store.sample_for_note(100).map(|s| s.root_note), Some(72));
    }

    #[test]
    fn test_falls_back_to_first_sample() {
        let mut store = SampleStore::new();
        store.load_sample(mono(10), 36);
        store.load_sample(mono(10), 84);
        store.samples_mut()[0].note_range = NoteRange::new(0, 10);
        store.samples_mut()[1].note_range = NoteRange::new(20, 30);

        assert_eq!(store.index_for_note(64), Some(0));
    }

    #[test]
    fn test_failed_decode_leaves_store_unchanged() {
        let mut store = SampleStore::new();
        store.load_sample(mono(10), 60);

        let result = store.load_file(&FailingDecoder, Path::new("broken.wav"), 60);
        assert!(result.is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_load_file_records_name_and_path() {
        let mut store = SampleStore::new();
        let index = store
            .load_file(&SilenceDecoder, Path::new("/kits/piano_c4.wav"), 60)
            .unwrap();

        let sample = store.get(index).unwrap();
        assert_eq!(sample.name, "piano_c4");
        assert_eq!(sample.source_path.as_deref(), Some(Path::new("/kits/piano_c4.wav")));
        assert_eq!(sample.frame_count(), 64);
    }

    #[test]
    fn test_ids_are_never_reused() {
        let mut store = SampleStore::new();
        store.load_sample(mono(4), 60);
        let first = store.get(0).unwrap().id();

        store.clear();
        store.load_sample(mono(4), 60);
        assert_ne!(store.get(0).unwrap().id(), first);
    }
}
