use super::hit::Hit;

/// An Event is the set of hits that fell within the coincidence window of each other.
///
/// Hits are stored as parallel detector id / energy sequences in arrival order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Event {
    detector_ids: Vec<usize>,
    energies: Vec<f64>,
}

impl Event {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an event directly from its parallel sequences
    pub fn from_parts(detector_ids: Vec<usize>, energies: Vec<f64>) -> Self {
        debug_assert_eq!(detector_ids.len(), energies.len());
        Self {
            detector_ids,
            energies,
        }
    }

    pub fn push_hit(&mut self, hit: &Hit) {
        self.detector_ids.push(hit.detector_id);
        self.energies.push(hit.energy);
    }

    /// Number of hits in the event
    pub fn multiplicity(&self) -> usize {
        self.detector_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detector_ids.is_empty()
    }

    pub fn detector_ids(&self) -> &[usize] {
        &self.detector_ids
    }

    pub fn energies(&self) -> &[f64] {
        &self.energies
    }

    /// Iterate over (detector id, energy) pairs
    pub fn hits(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.detector_ids
            .iter()
            .copied()
            .zip(self.energies.iter().copied())
    }

    pub fn clear(&mut self) {
        self.detector_ids.clear();
        self.energies.clear();
    }
}
