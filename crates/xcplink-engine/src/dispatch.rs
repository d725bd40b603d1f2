use std::fmt::Write as _;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use bytes::Bytes;
use tracing::{debug, trace};
use xcplink_frame::{classify, Category, Frame, FrameError};

/// A received DAQ packet.
#[derive(Debug, Clone)]
pub struct SampleRecord {
    /// The packet, ODT number first.
    pub payload: Bytes,
    /// Sender counter from the header (0 on headerless links).
    pub counter: u16,
    /// Declared length.
    pub length: usize,
    /// Reception instant, present when `CREATE_DAQ_TIMESTAMPS` is set.
    pub timestamp: Option<Instant>,
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct DispatchSettings {
    pub verify_frame_size: bool,
    pub timestamps: bool,
    pub hexdump: bool,
}

/// Receiving ends of the four category queues.
pub(crate) struct Queues {
    pub responses: Receiver<Bytes>,
    pub events: Receiver<Frame>,
    pub service_requests: Receiver<Frame>,
    pub samples: Receiver<SampleRecord>,
}

/// Classifies inbound packets and appends them to their category queue.
///
/// Cloned into the listener thread or into a driver receive callback; every
/// clone feeds the same queues.
#[derive(Clone)]
pub struct Dispatcher {
    responses: Sender<Bytes>,
    events: Sender<Frame>,
    service_requests: Sender<Frame>,
    samples: Sender<SampleRecord>,
    settings: DispatchSettings,
    received_counter: Arc<AtomicU16>,
    first_sample: Arc<OnceLock<Instant>>,
}

impl Dispatcher {
    pub(crate) fn new(settings: DispatchSettings) -> (Self, Queues) {
        let (responses, responses_rx) = mpsc::channel();
        let (events, events_rx) = mpsc::channel();
        let (service_requests, service_requests_rx) = mpsc::channel();
        let (samples, samples_rx) = mpsc::channel();

        let dispatcher = Self {
            responses,
            events,
            service_requests,
            samples,
            settings,
            received_counter: Arc::new(AtomicU16::new(0)),
            first_sample: Arc::new(OnceLock::new()),
        };
        let queues = Queues {
            responses: responses_rx,
            events: events_rx,
            service_requests: service_requests_rx,
            samples: samples_rx,
        };
        (dispatcher, queues)
    }

    /// Route one inbound packet to its queue.
    ///
    /// `length` is the length the sender declared. On links that verify
    /// frame sizes a mismatch with `payload.len()` rejects the packet.
    pub fn process_response(
        &self,
        payload: Bytes,
        length: usize,
        counter: u16,
    ) -> Result<Category, FrameError> {
        self.received_counter.store(counter, Ordering::Release);

        if self.settings.verify_frame_size && payload.len() != length {
            return Err(FrameError::FrameSize {
                declared: length,
                actual: payload.len(),
            });
        }

        let pid = *payload.first().ok_or(FrameError::Empty)?;
        let category = classify(pid);

        if category != Category::Sample && self.settings.hexdump {
            debug!("<- L{length} C{counter} {}", hexdump(&payload));
        }

        let delivered = match category {
            Category::Response => self.responses.send(payload).is_ok(),
            Category::Event => self.events.send(frame(payload, length, counter)).is_ok(),
            Category::ServiceRequest => self
                .service_requests
                .send(frame(payload, length, counter))
                .is_ok(),
            Category::Sample => {
                let now = Instant::now();
                self.first_sample.get_or_init(|| now);
                let record = SampleRecord {
                    payload,
                    counter,
                    length,
                    timestamp: self.settings.timestamps.then_some(now),
                };
                self.samples.send(record).is_ok()
            }
        };

        if !delivered {
            trace!(category = category.name(), "queue closed, packet dropped");
        }
        Ok(category)
    }

    /// Route a decoded frame.
    pub fn process_frame(&self, frame: Frame) -> Result<Category, FrameError> {
        self.process_response(frame.payload, frame.length, frame.counter)
    }

    /// Counter of the most recent inbound frame.
    pub fn received_counter(&self) -> u16 {
        self.received_counter.load(Ordering::Acquire)
    }

    /// Instant the first DAQ sample arrived.
    pub fn first_sample_at(&self) -> Option<Instant> {
        self.first_sample.get().copied()
    }

    pub(crate) fn hexdump_enabled(&self) -> bool {
        self.settings.hexdump
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("settings", &self.settings)
            .field("received_counter", &self.received_counter())
            .finish_non_exhaustive()
    }
}

fn frame(payload: Bytes, length: usize, counter: u16) -> Frame {
    Frame {
        length,
        counter,
        payload,
    }
}

/// Space separated upper-case hex, as in `FF 00 10`.
pub(crate) fn hexdump(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{byte:02X}");
    }
    out
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn dispatcher(verify: bool, timestamps: bool) -> (Dispatcher, Queues) {
        Dispatcher::new(DispatchSettings {
            verify_frame_size: verify,
            timestamps,
            hexdump: false,
        })
    }

    #[test]
    fn packets_land_in_their_category_queue() {
        let (dispatcher, queues) = dispatcher(false, false);

        let packets: [&[u8]; 5] = [
            &[0xFF, 0x01],
            &[0xFE, 0x20],
            &[0xFD, 0x05],
            &[0xFC, 0x00],
            &[0x03, 0xAA],
        ];
        for packet in packets {
            dispatcher
                .process_response(Bytes::copy_from_slice(packet), packet.len(), 1)
                .unwrap();
        }

        assert_eq!(queues.responses.try_recv().unwrap().as_ref(), &[0xFF, 0x01]);
        assert_eq!(queues.responses.try_recv().unwrap().as_ref(), &[0xFE, 0x20]);
        assert!(queues.responses.try_recv().is_err());
        assert_eq!(queues.events.try_recv().unwrap().payload.as_ref(), &[0xFD, 0x05]);
        assert_eq!(
            queues.service_requests.try_recv().unwrap().payload.as_ref(),
            &[0xFC, 0x00]
        );
        let sample = queues.samples.try_recv().unwrap();
        assert_eq!(sample.payload.as_ref(), &[0x03, 0xAA]);
        assert_eq!(sample.counter, 1);
        assert!(sample.timestamp.is_none());
    }

    #[test]
    fn size_mismatch_rejected_when_verifying() {
        let (dispatcher, queues) = dispatcher(true, false);

        let err = dispatcher
            .process_response(Bytes::from_static(&[0xFF, 0x00]), 3, 7)
            .unwrap_err();
        assert!(matches!(err, FrameError::FrameSize { declared: 3, actual: 2 }));
        assert!(queues.responses.try_recv().is_err());
        assert_eq!(dispatcher.received_counter(), 7);
    }

    #[test]
    fn size_mismatch_ignored_on_streams() {
        let (dispatcher, queues) = dispatcher(false, false);
        dispatcher
            .process_response(Bytes::from_static(&[0xFF, 0x00]), 3, 0)
            .unwrap();
        assert!(queues.responses.try_recv().is_ok());
    }

    #[test]
    fn empty_packet_rejected() {
        let (dispatcher, _queues) = dispatcher(false, false);
        let err = dispatcher.process_response(Bytes::new(), 0, 0).unwrap_err();
        assert!(matches!(err, FrameError::Empty));
    }

    #[test]
    fn sample_timestamps_and_first_sample() {
        let (dispatcher, queues) = dispatcher(false, true);
        assert!(dispatcher.first_sample_at().is_none());

        dispatcher
            .process_response(Bytes::from_static(&[0x00, 0x01]), 2, 0)
            .unwrap();
        let first = dispatcher.first_sample_at().unwrap();
        std::thread::sleep(Duration::from_millis(2));
        dispatcher
            .process_response(Bytes::from_static(&[0x01, 0x02]), 2, 1)
            .unwrap();

        assert_eq!(dispatcher.first_sample_at(), Some(first));
        let a = queues.samples.try_recv().unwrap();
        let b = queues.samples.try_recv().unwrap();
        assert!(a.timestamp.unwrap() <= b.timestamp.unwrap());
    }

    #[test]
    fn closed_queues_do_not_fail_dispatch() {
        let (dispatcher, queues) = dispatcher(false, false);
        drop(queues);
        let category = dispatcher
            .process_response(Bytes::from_static(&[0xFD]), 1, 0)
            .unwrap();
        assert_eq!(category, Category::Event);
    }

    #[test]
    fn hexdump_format() {
        assert_eq!(hexdump(&[0xFF, 0x00, 0x1A]), "FF 00 1A");
        assert_eq!(hexdump(&[]), "");
    }
}
