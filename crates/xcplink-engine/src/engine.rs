use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use tracing::{debug, info, warn};
use xcplink_config::{Configuration, CREATE_DAQ_TIMESTAMPS, LOGLEVEL};
use xcplink_frame::pid::is_error;
use xcplink_frame::{Command, Frame, FrameError, RequestBuilder, SYNCH};

use crate::dispatch::{hexdump, DispatchSettings, Dispatcher, Queues, SampleRecord};
use crate::error::{EngineError, Result};
use crate::link::Link;
use crate::listener::ListenerHandle;
use crate::timing::RequestTiming;

/// Default wait for the response to a request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Default wait for a complete block transfer.
pub const DEFAULT_BLOCK_RECEIVE_TIMEOUT: Duration = Duration::from_secs(1);

/// Engine timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// How long [`FrameTransport::request`] waits for a response.
    pub request_timeout: Duration,
    /// How long [`FrameTransport::block_receive`] waits for all fragments.
    pub block_receive_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            block_receive_timeout: DEFAULT_BLOCK_RECEIVE_TIMEOUT,
        }
    }
}

/// One master session over a link.
///
/// Outbound requests are framed and sent by the caller's thread. Inbound
/// packets are classified by the listener thread (or by the link's own
/// receive callback) into four queues: responses, events, service requests
/// and DAQ samples. `request` pairs each command with the next response.
pub struct FrameTransport {
    link: Box<dyn Link>,
    builder: RequestBuilder,
    dispatcher: Dispatcher,
    queues: Option<Queues>,
    listener: Option<ListenerHandle>,
    config: EngineConfig,
    timing: RequestTiming,
    closed: bool,
}

impl FrameTransport {
    /// Create a transport with default timeouts.
    pub fn new(link: Box<dyn Link>, config: &Configuration) -> Result<Self> {
        Self::with_engine_config(link, config, EngineConfig::default())
    }

    /// Create a transport with explicit timeouts.
    pub fn with_engine_config(
        mut link: Box<dyn Link>,
        config: &Configuration,
        engine_config: EngineConfig,
    ) -> Result<Self> {
        let settings = DispatchSettings {
            verify_frame_size: link.verifies_frame_size(),
            timestamps: config.get_bool(CREATE_DAQ_TIMESTAMPS).unwrap_or(false),
            hexdump: config
                .get_str(LOGLEVEL)
                .map(|level| level.eq_ignore_ascii_case("DEBUG"))
                .unwrap_or(false),
        };
        let (dispatcher, queues) = Dispatcher::new(settings);
        link.attach(dispatcher.clone())?;

        debug!(
            link = link.name(),
            verify_frame_size = settings.verify_frame_size,
            timestamps = settings.timestamps,
            "transport created"
        );

        Ok(Self {
            builder: RequestBuilder::new(link.framing()),
            link,
            dispatcher,
            queues: Some(queues),
            listener: None,
            config: engine_config,
            timing: RequestTiming::default(),
            closed: false,
        })
    }

    /// Start the listener (if the link wants one) and bring the link up.
    pub fn connect(&mut self) -> Result<()> {
        if self.closed {
            return Err(EngineError::Shutdown);
        }

        if self.link.uses_default_listener() && self.listener.is_none() {
            let inbound = self.link.inbound()?;
            let listener = ListenerHandle::spawn(inbound, self.dispatcher.clone())
                .map_err(xcplink_transport::TransportError::Io)?;
            self.listener = Some(listener);
        }

        self.link.connect()?;
        info!(link = self.link.name(), "transport connected");
        Ok(())
    }

    /// Send a command and wait for its response.
    ///
    /// Returns the response without its PID byte. A negative response fails
    /// with [`EngineError::Protocol`] unless the command is `SYNCH`, whose
    /// negative answer is the expected one.
    pub fn request(&mut self, command: Command, args: &[u8]) -> Result<Bytes> {
        let started = Instant::now();
        self.send_request(command, args)?;

        let timeout = self.config.request_timeout;
        let response = recv_response(&self.queues()?.responses, timeout)?;

        let elapsed = started.elapsed();
        self.timing.record(elapsed);
        debug!(%command, ?elapsed, "response received");

        check_response(command, response)
    }

    /// Send one command of a block transfer without waiting for a response.
    ///
    /// A response already queued (from an earlier block request) is taken
    /// first: a negative one fails here, anything else is discarded.
    pub fn block_request(&mut self, command: Command, args: &[u8]) -> Result<()> {
        if let Ok(pending) = self.queues()?.responses.try_recv() {
            check_response(command, pending.clone())?;
            debug!(%command, bytes = pending.len(), "discarding queued response");
        }

        self.send_request(command, args)
    }

    /// Collect block response fragments until `total_length` payload bytes arrived.
    ///
    /// Each fragment contributes its bytes after the PID. Bytes past
    /// `total_length` (fill bytes of a padded last fragment) are cut off. The
    /// timeout counts from the start of the call.
    pub fn block_receive(&mut self, total_length: usize) -> Result<Bytes> {
        let timeout = self.config.block_receive_timeout;
        let deadline = Instant::now() + timeout;
        let responses = &self.queues()?.responses;

        let mut block = BytesMut::with_capacity(total_length);
        while block.len() < total_length {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(EngineError::Timeout(timeout));
            }
            let fragment = recv_response(responses, remaining).map_err(|err| match err {
                EngineError::Timeout(_) => EngineError::Timeout(timeout),
                other => other,
            })?;
            block.extend_from_slice(fragment.get(1..).unwrap_or_default());
        }
        block.truncate(total_length);

        debug!(bytes = block.len(), "block received");
        Ok(block.freeze())
    }

    /// Next event packet, waiting up to `timeout`.
    pub fn poll_event(&self, timeout: Duration) -> Option<Frame> {
        poll(&self.queues.as_ref()?.events, timeout)
    }

    /// Next service request packet, waiting up to `timeout`.
    pub fn poll_service_request(&self, timeout: Duration) -> Option<Frame> {
        poll(&self.queues.as_ref()?.service_requests, timeout)
    }

    /// Next DAQ sample, waiting up to `timeout`.
    pub fn poll_sample(&self, timeout: Duration) -> Option<SampleRecord> {
        poll(&self.queues.as_ref()?.samples, timeout)
    }

    /// Stop the listener and close the link.
    ///
    /// Safe to call more than once; later calls do nothing.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if let Some(listener) = self.listener.take() {
            listener.stop();
        }
        self.queues = None;

        let result = self.link.close_connection();
        info!(link = self.link.name(), "transport closed");
        result
    }

    /// Counter the next outgoing frame will carry.
    pub fn send_counter(&self) -> u16 {
        self.builder.counter()
    }

    /// Counter of the most recent inbound frame.
    pub fn received_counter(&self) -> u16 {
        self.dispatcher.received_counter()
    }

    /// When the first DAQ sample arrived.
    pub fn first_sample_at(&self) -> Option<Instant> {
        self.dispatcher.first_sample_at()
    }

    /// Timestamp resolution of the link in nanoseconds.
    pub fn timestamp_resolution(&self) -> Option<u64> {
        self.link.timestamp_resolution()
    }

    /// Round-trip statistics of completed requests.
    pub fn timing(&self) -> &RequestTiming {
        &self.timing
    }

    pub fn engine_config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn link_name(&self) -> &'static str {
        self.link.name()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// The dispatcher feeding this transport's queues.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    fn queues(&self) -> Result<&Queues> {
        self.queues.as_ref().ok_or(EngineError::Shutdown)
    }

    fn send_request(&mut self, command: Command, args: &[u8]) -> Result<()> {
        if self.closed {
            return Err(EngineError::Shutdown);
        }

        let frame = self.builder.build(command, args)?;
        debug!(%command, args = args.len(), "request");
        if self.dispatcher.hexdump_enabled() {
            debug!("-> {}", hexdump(&frame));
        }
        self.link.send(&frame)
    }
}

impl Drop for FrameTransport {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(error = %err, "closing transport on drop failed");
        }
    }
}

impl std::fmt::Debug for FrameTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameTransport")
            .field("link", &self.link.name())
            .field("send_counter", &self.builder.counter())
            .field("config", &self.config)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

fn recv_response(responses: &Receiver<Bytes>, timeout: Duration) -> Result<Bytes> {
    match responses.recv_timeout(timeout) {
        Ok(response) => Ok(response),
        Err(RecvTimeoutError::Timeout) => Err(EngineError::Timeout(timeout)),
        Err(RecvTimeoutError::Disconnected) => Err(EngineError::Shutdown),
    }
}

fn check_response(command: Command, response: Bytes) -> Result<Bytes> {
    if response.is_empty() {
        return Err(FrameError::Empty.into());
    }
    if is_error(&response) && command != SYNCH {
        let code = *response.get(1).ok_or(FrameError::Truncated {
            len: response.len(),
            need: 2,
        })?;
        return Err(EngineError::Protocol { code });
    }
    Ok(response.slice(1..))
}

fn poll<T>(queue: &Receiver<T>, timeout: Duration) -> Option<T> {
    if timeout.is_zero() {
        queue.try_recv().ok()
    } else {
        queue.recv_timeout(timeout).ok()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc::{self, Sender, TryRecvError};
    use std::sync::{Arc, Mutex};

    use serde_json::json;
    use xcplink_config::ParameterMap;
    use xcplink_frame::command::{CONNECT, DOWNLOAD_NEXT, GET_STATUS, UPLOAD};
    use xcplink_frame::{ByteOrder, Framing};

    use super::*;
    use crate::link::Inbound;

    type Responder = Box<dyn FnMut(&[u8]) -> Vec<Vec<u8>> + Send>;

    struct MockLink {
        sent: Arc<Mutex<Vec<Vec<u8>>>>,
        closes: Arc<AtomicUsize>,
        replies: Sender<Frame>,
        inbound: Option<mpsc::Receiver<Frame>>,
        responder: Responder,
    }

    struct MockInbound(mpsc::Receiver<Frame>);

    impl Inbound for MockInbound {
        fn poll(&mut self) -> std::result::Result<Option<Frame>, FrameError> {
            match self.0.try_recv() {
                Ok(frame) => Ok(Some(frame)),
                Err(TryRecvError::Empty) => Ok(None),
                Err(TryRecvError::Disconnected) => Err(FrameError::ConnectionClosed),
            }
        }
    }

    impl Link for MockLink {
        fn name(&self) -> &'static str {
            "mock"
        }

        fn framing(&self) -> Framing {
            Framing::LengthPrefixed(ByteOrder::Little)
        }

        fn verifies_frame_size(&self) -> bool {
            true
        }

        fn inbound(&mut self) -> Result<Box<dyn Inbound>> {
            let rx = self.inbound.take().ok_or(EngineError::Shutdown)?;
            Ok(Box::new(MockInbound(rx)))
        }

        fn connect(&mut self) -> Result<()> {
            Ok(())
        }

        fn send(&mut self, frame: &[u8]) -> Result<()> {
            self.sent.lock().unwrap().push(frame.to_vec());
            for (i, reply) in (self.responder)(frame).into_iter().enumerate() {
                let _ = self.replies.send(Frame::new(i as u16, reply));
            }
            Ok(())
        }

        fn close_connection(&mut self) -> Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Harness {
        transport: FrameTransport,
        sent: Arc<Mutex<Vec<Vec<u8>>>>,
        closes: Arc<AtomicUsize>,
    }

    fn harness_with(
        options: serde_json::Value,
        engine_config: EngineConfig,
        responder: impl FnMut(&[u8]) -> Vec<Vec<u8>> + Send + 'static,
    ) -> Harness {
        let (replies, inbound) = mpsc::channel();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let closes = Arc::new(AtomicUsize::new(0));
        let link = MockLink {
            sent: Arc::clone(&sent),
            closes: Arc::clone(&closes),
            replies,
            inbound: Some(inbound),
            responder: Box::new(responder),
        };
        let config = Configuration::new(&ParameterMap::base(), &options).unwrap();
        let mut transport =
            FrameTransport::with_engine_config(Box::new(link), &config, engine_config).unwrap();
        transport.connect().unwrap();
        Harness {
            transport,
            sent,
            closes,
        }
    }

    fn harness(responder: impl FnMut(&[u8]) -> Vec<Vec<u8>> + Send + 'static) -> Harness {
        let fast = EngineConfig {
            request_timeout: Duration::from_millis(200),
            block_receive_timeout: Duration::from_millis(200),
        };
        harness_with(json!({}), fast, responder)
    }

    #[test]
    fn request_returns_payload_without_pid() {
        let mut h = harness(|_| vec![vec![0xFF, 0x10, 0x20]]);

        let response = h.transport.request(CONNECT, &[0x00]).unwrap();

        assert_eq!(response.as_ref(), &[0x10, 0x20]);
        assert_eq!(h.transport.send_counter(), 1);
        assert_eq!(h.sent.lock().unwrap()[0], vec![0x02, 0x00, 0x00, 0x00, 0xFF, 0x00]);
        assert_eq!(h.transport.timing().count(), 1);
    }

    #[test]
    fn negative_response_is_protocol_error() {
        let mut h = harness(|_| vec![vec![0xFE, 0x20]]);

        let err = h.transport.request(GET_STATUS, &[]).unwrap_err();
        assert!(matches!(err, EngineError::Protocol { code: 0x20 }));
        assert!(err.to_string().contains("ERR_CMD_UNKNOWN"));
    }

    #[test]
    fn synch_negative_response_is_returned() {
        let mut h = harness(|_| vec![vec![0xFE, 0x00]]);

        let response = h.transport.request(SYNCH, &[]).unwrap();
        assert_eq!(response.as_ref(), &[0x00]);
    }

    #[test]
    fn request_times_out_without_response() {
        let mut h = harness(|_| Vec::new());

        let err = h.transport.request(GET_STATUS, &[]).unwrap_err();
        assert!(matches!(err, EngineError::Timeout(t) if t == Duration::from_millis(200)));
        assert_eq!(h.transport.send_counter(), 1);
        assert_eq!(h.transport.timing().count(), 0);
        assert!(h.transport.queues().unwrap().responses.try_recv().is_err());
    }

    #[test]
    fn default_timeouts() {
        let config = EngineConfig::default();
        assert_eq!(config.request_timeout, Duration::from_secs(2));
        assert_eq!(config.block_receive_timeout, Duration::from_secs(1));
    }

    #[test]
    fn block_receive_joins_fragments() {
        let mut h = harness(|frame| {
            if frame[4] == UPLOAD.code() as u8 {
                vec![vec![0xFF, 1, 2, 3], vec![0xFF, 4, 5], vec![0xFF, 6]]
            } else {
                Vec::new()
            }
        });

        h.transport.block_request(UPLOAD, &[6]).unwrap();
        let block = h.transport.block_receive(6).unwrap();
        assert_eq!(block.as_ref(), &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn block_receive_drops_fill_bytes_of_last_fragment() {
        let mut h = harness(|_| vec![vec![0xFF, 1, 2, 3], vec![0xFF, 4, 0, 0, 0]]);

        h.transport.block_request(UPLOAD, &[4]).unwrap();
        let block = h.transport.block_receive(4).unwrap();
        assert_eq!(block.as_ref(), &[1, 2, 3, 4]);
    }

    #[test]
    fn block_receive_times_out_when_short() {
        let mut h = harness(|_| vec![vec![0xFF, 1]]);

        h.transport.block_request(UPLOAD, &[4]).unwrap();
        let err = h.transport.block_receive(4).unwrap_err();
        assert!(matches!(err, EngineError::Timeout(_)));
    }

    #[test]
    fn block_request_reports_pending_negative_response() {
        let mut h = harness(|_| vec![vec![0xFE, 0x29]]);

        h.transport.block_request(DOWNLOAD_NEXT, &[2, 0xAA, 0xBB]).unwrap();
        wait_for_listener();

        let err = h.transport.block_request(DOWNLOAD_NEXT, &[]).unwrap_err();
        assert!(matches!(err, EngineError::Protocol { code: 0x29 }));
        assert_eq!(h.sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn block_request_discards_pending_positive_response() {
        let mut h = harness(|_| vec![vec![0xFF]]);

        h.transport.block_request(DOWNLOAD_NEXT, &[1, 0xAA]).unwrap();
        wait_for_listener();
        h.transport.block_request(DOWNLOAD_NEXT, &[1, 0xBB]).unwrap();

        assert_eq!(h.sent.lock().unwrap().len(), 2);
    }

    #[test]
    fn side_channels_are_polled_separately() {
        let mut h = harness_with(
            json!({"CREATE_DAQ_TIMESTAMPS": true}),
            EngineConfig::default(),
            |_| {
                vec![
                    vec![0xFD, 0x01],
                    vec![0xFC, 0x00, 0x01],
                    vec![0x05, 0x09],
                    vec![0xFF],
                ]
            },
        );

        h.transport.request(GET_STATUS, &[]).unwrap();

        let event = h.transport.poll_event(Duration::from_secs(1)).unwrap();
        assert_eq!(event.payload.as_ref(), &[0xFD, 0x01]);
        let serv = h.transport.poll_service_request(Duration::from_secs(1)).unwrap();
        assert_eq!(serv.payload.as_ref(), &[0xFC, 0x00, 0x01]);
        let sample = h.transport.poll_sample(Duration::from_secs(1)).unwrap();
        assert_eq!(sample.payload.as_ref(), &[0x05, 0x09]);
        assert!(sample.timestamp.is_some());
        assert!(h.transport.first_sample_at().is_some());
        assert_eq!(h.transport.received_counter(), 3);

        assert!(h.transport.poll_event(Duration::ZERO).is_none());
    }

    #[test]
    fn close_is_idempotent() {
        let mut h = harness(|_| vec![vec![0xFF]]);

        h.transport.close().unwrap();
        h.transport.close().unwrap();
        drop(h.transport);

        assert_eq!(h.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn closed_transport_rejects_use() {
        let mut h = harness(|_| vec![vec![0xFF]]);
        h.transport.close().unwrap();

        assert!(matches!(
            h.transport.request(CONNECT, &[0]),
            Err(EngineError::Shutdown)
        ));
        assert!(matches!(
            h.transport.block_receive(1),
            Err(EngineError::Shutdown)
        ));
        assert!(matches!(h.transport.connect(), Err(EngineError::Shutdown)));
        assert!(h.transport.poll_event(Duration::from_millis(1)).is_none());
        assert!(h.transport.poll_sample(Duration::ZERO).is_none());
        assert!(h.transport.is_closed());
    }

    #[test]
    fn close_without_connect() {
        let (replies, inbound) = mpsc::channel();
        let closes = Arc::new(AtomicUsize::new(0));
        let link = MockLink {
            sent: Arc::new(Mutex::new(Vec::new())),
            closes: Arc::clone(&closes),
            replies,
            inbound: Some(inbound),
            responder: Box::new(|_| Vec::new()),
        };
        let config = Configuration::new(&ParameterMap::base(), &json!({})).unwrap();
        let mut transport = FrameTransport::new(Box::new(link), &config).unwrap();

        transport.close().unwrap();
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[derive(Default)]
    struct CallbackLink {
        dispatcher: Option<Dispatcher>,
        closes: Arc<AtomicUsize>,
    }

    impl Link for CallbackLink {
        fn name(&self) -> &'static str {
            "callback"
        }

        fn framing(&self) -> Framing {
            Framing::Headerless
        }

        fn verifies_frame_size(&self) -> bool {
            true
        }

        fn uses_default_listener(&self) -> bool {
            false
        }

        fn attach(&mut self, dispatcher: Dispatcher) -> Result<()> {
            self.dispatcher = Some(dispatcher);
            Ok(())
        }

        fn inbound(&mut self) -> Result<Box<dyn Inbound>> {
            Err(EngineError::Shutdown)
        }

        fn connect(&mut self) -> Result<()> {
            Ok(())
        }

        fn send(&mut self, frame: &[u8]) -> Result<()> {
            let dispatcher = self.dispatcher.as_ref().ok_or(EngineError::Shutdown)?;
            let mut reply = vec![0xFF];
            reply.extend_from_slice(frame);
            let len = reply.len();
            dispatcher.process_response(Bytes::from(reply), len, 0)?;
            Ok(())
        }

        fn close_connection(&mut self) -> Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn callback_links_need_no_listener() {
        let config = Configuration::new(&ParameterMap::base(), &json!({})).unwrap();
        let mut transport =
            FrameTransport::new(Box::new(CallbackLink::default()), &config).unwrap();
        transport.connect().unwrap();

        let response = transport.request(CONNECT, &[0x00]).unwrap();
        assert_eq!(response.as_ref(), &[0xFF, 0x00]);
        assert_eq!(transport.send_counter(), 1);
    }

    #[test]
    fn close_twice_after_connect_without_listener() {
        let closes = Arc::new(AtomicUsize::new(0));
        let link = CallbackLink {
            dispatcher: None,
            closes: Arc::clone(&closes),
        };
        let config = Configuration::new(&ParameterMap::base(), &json!({})).unwrap();
        let mut transport = FrameTransport::new(Box::new(link), &config).unwrap();
        transport.connect().unwrap();
        assert!(transport.listener.is_none());

        assert!(transport.close().is_ok());
        assert!(transport.close().is_ok());
        drop(transport);

        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    fn wait_for_listener() {
        std::thread::sleep(Duration::from_millis(50));
    }
}
