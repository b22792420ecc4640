use hdf5::types::VarLenUnicode;
use hdf5::{Dataset, File, Group};
use ndarray::{s, ArrayView1};
use std::path::Path;
use std::str::FromStr;

use super::error::EventTableError;
use super::event::Event;

const EVENTS_NAME: &str = "events";
const MULTIPLICITY_NAME: &str = "multiplicity";
const DETECTOR_ID_NAME: &str = "detector_id";
const ENERGY_NAME: &str = "energy";

/// This is the version of the event table format
const FORMAT_VERSION: &str = "1.0";
/// Chunk size of the extendable datasets, also the number of events buffered before a write
const CHUNK_SIZE: usize = 65_536;

/// Writes built Events to the event table (HDF5).
///
/// Hits are stored flat, in event order, alongside a per-event multiplicity dataset
/// ```text
/// events - n_events, n_hits, coincidence_window, version, created
/// |---- multiplicity(dset)
/// |---- detector_id(dset)
/// |---- energy(dset)
/// ```
/// Events are buffered and appended a chunk at a time. The attributes are only written
/// by `close`, which must be called once all events are written.
#[derive(Debug)]
pub struct EventTableWriter {
    _file_handle: File,
    events_group: Group,
    multiplicity: Dataset,
    detector_id: Dataset,
    energy: Dataset,
    mult_buffer: Vec<u32>,
    id_buffer: Vec<u32>,
    energy_buffer: Vec<f64>,
    n_events: usize,
    n_hits: usize,
}

impl EventTableWriter {
    /// Create the writer, opening (truncating) a file at path and creating the datasets
    pub fn new(path: &Path, coincidence_window: i64) -> Result<Self, EventTableError> {
        let file_handle = File::create(path)?;
        let version = format!("{}:{}", env!("CARGO_PKG_NAME"), FORMAT_VERSION);

        let events_group = file_handle.create_group(EVENTS_NAME)?;
        events_group.new_attr::<u64>().create("n_events")?;
        events_group.new_attr::<u64>().create("n_hits")?;
        events_group
            .new_attr::<i64>()
            .create("coincidence_window")?
            .write_scalar(&coincidence_window)?;
        events_group
            .new_attr::<i64>()
            .create("created")?
            .write_scalar(&time::OffsetDateTime::now_utc().unix_timestamp())?;
        events_group
            .new_attr::<VarLenUnicode>()
            .create("version")?
            .write_scalar(&VarLenUnicode::from_str(&version).unwrap_or_default())?;

        let multiplicity = create_extendable_dataset::<u32>(&events_group, MULTIPLICITY_NAME)?;
        let detector_id = create_extendable_dataset::<u32>(&events_group, DETECTOR_ID_NAME)?;
        let energy = create_extendable_dataset::<f64>(&events_group, ENERGY_NAME)?;

        Ok(Self {
            _file_handle: file_handle,
            events_group,
            multiplicity,
            detector_id,
            energy,
            mult_buffer: Vec::with_capacity(CHUNK_SIZE),
            id_buffer: Vec::with_capacity(CHUNK_SIZE),
            energy_buffer: Vec::with_capacity(CHUNK_SIZE),
            n_events: 0,
            n_hits: 0,
        })
    }

    /// Write an event. The write is atomic from the point of view of the event: either all of
    /// its hits are buffered with it or none are.
    pub fn write_event(&mut self, event: &Event) -> Result<(), EventTableError> {
        self.mult_buffer.push(event.multiplicity() as u32);
        for (id, energy) in event.hits() {
            self.id_buffer.push(id as u32);
            self.energy_buffer.push(energy);
        }
        if self.mult_buffer.len() >= CHUNK_SIZE {
            self.flush()?;
        }
        Ok(())
    }

    /// Number of events written (or buffered) so far
    pub fn get_event_count(&self) -> usize {
        self.n_events + self.mult_buffer.len()
    }

    /// Flush the buffers, write meta information on the table, and consume the writer
    pub fn close(mut self) -> Result<(), EventTableError> {
        self.flush()?;
        self.events_group
            .attr("n_events")?
            .write_scalar(&(self.n_events as u64))?;
        self.events_group
            .attr("n_hits")?
            .write_scalar(&(self.n_hits as u64))?;
        spdlog::info!(
            "{} events with {} hits written to the event table.",
            self.n_events,
            self.n_hits
        );
        Ok(())
    }

    fn flush(&mut self) -> Result<(), EventTableError> {
        append_slice(&self.multiplicity, self.n_events, &self.mult_buffer)?;
        append_slice(&self.detector_id, self.n_hits, &self.id_buffer)?;
        append_slice(&self.energy, self.n_hits, &self.energy_buffer)?;
        self.n_events += self.mult_buffer.len();
        self.n_hits += self.id_buffer.len();
        self.mult_buffer.clear();
        self.id_buffer.clear();
        self.energy_buffer.clear();
        Ok(())
    }
}

/// Reads Events back out of the event table.
///
/// The table is loaded into memory on open and validated (the multiplicities must account
/// for every stored hit). Events are then handed out in their original order.
#[derive(Debug)]
pub struct EventTableReader {
    multiplicity: Vec<u32>,
    detector_id: Vec<u32>,
    energy: Vec<f64>,
    coincidence_window: i64,
}

impl EventTableReader {
    pub fn open(path: &Path) -> Result<Self, EventTableError> {
        if !path.exists() {
            return Err(EventTableError::BadFilePath(path.to_path_buf()));
        }
        let file = File::open(path)?;
        let events_group = file.group(EVENTS_NAME)?;
        let multiplicity = events_group.dataset(MULTIPLICITY_NAME)?.read_raw::<u32>()?;
        let detector_id = events_group.dataset(DETECTOR_ID_NAME)?.read_raw::<u32>()?;
        let energy = events_group.dataset(ENERGY_NAME)?.read_raw::<f64>()?;
        let coincidence_window = events_group
            .attr("coincidence_window")?
            .read_scalar::<i64>()?;

        if detector_id.len() != energy.len() {
            return Err(EventTableError::ColumnLengthMismatch(
                detector_id.len(),
                energy.len(),
            ));
        }
        let total: u64 = multiplicity.iter().map(|m| *m as u64).sum();
        if total != detector_id.len() as u64 {
            return Err(EventTableError::HitCountMismatch(
                total,
                detector_id.len() as u64,
            ));
        }

        Ok(Self {
            multiplicity,
            detector_id,
            energy,
            coincidence_window,
        })
    }

    pub fn get_event_count(&self) -> usize {
        self.multiplicity.len()
    }

    pub fn get_hit_count(&self) -> usize {
        self.detector_id.len()
    }

    /// The coincidence window the table was built with
    pub fn get_coincidence_window(&self) -> i64 {
        self.coincidence_window
    }

    /// Iterate over the events in the order they were written
    pub fn events(&self) -> EventIter<'_> {
        EventIter {
            table: self,
            event_index: 0,
            hit_offset: 0,
        }
    }
}

/// Iterator over the events of an EventTableReader
#[derive(Debug)]
pub struct EventIter<'a> {
    table: &'a EventTableReader,
    event_index: usize,
    hit_offset: usize,
}

impl Iterator for EventIter<'_> {
    type Item = Event;

    fn next(&mut self) -> Option<Self::Item> {
        let mult = *self.table.multiplicity.get(self.event_index)? as usize;
        let range = self.hit_offset..(self.hit_offset + mult);
        let event = Event::from_parts(
            self.table.detector_id[range.clone()]
                .iter()
                .map(|id| *id as usize)
                .collect(),
            self.table.energy[range].to_vec(),
        );
        self.event_index += 1;
        self.hit_offset += mult;
        Some(event)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.table.multiplicity.len() - self.event_index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for EventIter<'_> {}

fn create_extendable_dataset<T: hdf5::H5Type>(
    group: &Group,
    name: &str,
) -> Result<Dataset, EventTableError> {
    Ok(group
        .new_dataset::<T>()
        .shape((0..,))
        .chunk((CHUNK_SIZE,))
        .create(name)?)
}

fn append_slice<T: hdf5::H5Type>(
    dataset: &Dataset,
    offset: usize,
    data: &[T],
) -> Result<(), EventTableError> {
    if data.is_empty() {
        return Ok(());
    }
    let new_len = offset + data.len();
    dataset.resize((new_len,))?;
    dataset.write_slice(ArrayView1::from(data), s![offset..new_len])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_event_table_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.h5");

        let events = vec![
            Event::from_parts(vec![0, 0], vec![1000.0, 2000.0]),
            Event::from_parts(vec![1], vec![500.0]),
            Event::from_parts(vec![46, 3, 12], vec![1.5, 19999.9, -4.0]),
        ];

        let mut writer = EventTableWriter::new(&path, 1000).unwrap();
        for event in events.iter() {
            writer.write_event(event).unwrap();
        }
        assert_eq!(writer.get_event_count(), 3);
        writer.close().unwrap();

        let reader = EventTableReader::open(&path).unwrap();
        assert_eq!(reader.get_event_count(), 3);
        assert_eq!(reader.get_hit_count(), 6);
        assert_eq!(reader.get_coincidence_window(), 1000);
        let read_back: Vec<Event> = reader.events().collect();
        assert_eq!(read_back, events);
    }

    #[test]
    fn test_roundtrip_across_chunks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.h5");
        let n_events = CHUNK_SIZE + 17;

        let mut writer = EventTableWriter::new(&path, 1000).unwrap();
        for i in 0..n_events {
            let mult = i % 3 + 1;
            let event = Event::from_parts(vec![i % 47; mult], vec![i as f64; mult]);
            writer.write_event(&event).unwrap();
        }
        writer.close().unwrap();

        let reader = EventTableReader::open(&path).unwrap();
        assert_eq!(reader.get_event_count(), n_events);
        for (i, event) in reader.events().enumerate() {
            assert_eq!(event.multiplicity(), i % 3 + 1);
            assert!(event.detector_ids().iter().all(|id| *id == i % 47));
            assert!(event.energies().iter().all(|e| *e == i as f64));
        }
    }

    #[test]
    fn test_empty_table() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.h5");
        EventTableWriter::new(&path, 1000).unwrap().close().unwrap();
        let reader = EventTableReader::open(&path).unwrap();
        assert_eq!(reader.get_event_count(), 0);
        assert_eq!(reader.events().count(), 0);
    }

    #[test]
    fn test_missing_table() {
        let dir = tempdir().unwrap();
        let result = EventTableReader::open(&dir.path().join("nope.h5"));
        assert!(matches!(result, Err(EventTableError::BadFilePath(_))));
    }
}
