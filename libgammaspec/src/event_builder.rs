use super::event::Event;
use super::hit::Hit;

/// EventBuilder takes Hits and composes them into Events.
///
/// Hits are expected in ascending timestamp order. A hit arriving more than
/// `coincidence_window` after the previous one closes the event being built.
#[derive(Debug)]
pub struct EventBuilder {
    coincidence_window: i64,
    last_timestamp: Option<i64>,
    current_event: Event,
    n_out_of_order: u64,
}

impl EventBuilder {
    /// Create a new EventBuilder.
    ///
    /// Requires the coincidence window in timestamp units
    pub fn new(coincidence_window: i64) -> Self {
        EventBuilder {
            coincidence_window,
            last_timestamp: None,
            current_event: Event::new(),
            n_out_of_order: 0,
        }
    }

    /// Add a hit to the event.
    ///
    /// If the gap to the previous hit exceeds the coincidence window, this is taken as
    /// indication that the event being built is complete, and a new event is started for the
    /// hit given. Returns an `Option<Event>`. If the Option is None, the event being built is
    /// not complete. If the Option is Some, the event being built was completed, and a new
    /// event was started for the hit that was passed in.
    pub fn append_hit(&mut self, hit: &Hit) -> Option<Event> {
        let mut completed = None;
        if let Some(last) = self.last_timestamp {
            let gap = hit.timestamp.saturating_sub(last);
            if gap < 0 {
                self.n_out_of_order += 1;
            }
            if gap > self.coincidence_window {
                completed = Some(std::mem::take(&mut self.current_event));
            }
        }
        // The first hit ever never closes an event, so an empty event is never emitted

        self.current_event.push_hit(hit);
        self.last_timestamp = Some(hit.timestamp);
        completed
    }

    /// Takes any remaining hits and flushes them to an event.
    ///
    /// Used at the end of the hit stream.
    /// Returns None if there were no hits left over.
    pub fn flush_final_event(&mut self) -> Option<Event> {
        if self.current_event.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.current_event))
        }
    }

    /// Number of hits which arrived with a timestamp earlier than their predecessor
    pub fn get_out_of_order_count(&self) -> u64 {
        self.n_out_of_order
    }
}
