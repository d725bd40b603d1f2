use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use xcplink_can::{create_transport, register_transport, DriverRegistry, VirtualBus, VirtualDriver};
use xcplink_engine::{EngineError, TransportRegistry};
use xcplink_frame::command::{CONNECT, DOWNLOAD, GET_STATUS, SYNCH, UPLOAD};

fn drivers_on(bus: &VirtualBus) -> DriverRegistry {
    let mut drivers = DriverRegistry::new();
    let bus = bus.clone();
    drivers.register("virtual", move || Ok(Arc::new(VirtualDriver::new(bus.clone()))));
    drivers
}

fn options(extra: Value) -> Value {
    let mut raw = json!({
        "CAN_DRIVER": "virtual",
        "CAN_ID_MASTER": 0x7E0,
        "CAN_ID_SLAVE": 0x7E1,
    });
    if let (Some(raw), Some(extra)) = (raw.as_object_mut(), extra.as_object()) {
        raw.extend(extra.clone());
    }
    raw
}

#[test]
fn request_over_listener_with_padding() {
    let bus = VirtualBus::new();
    bus.set_responder(|frame| match frame.data[0] {
        0xFF => vec![vec![0xFF, 0x15, 0xC0, 0x08, 0x08, 0x00, 0x01, 0x01]],
        _ => vec![vec![0xFF]],
    });

    let mut transport =
        create_transport(&options(json!({ "MAX_DLC_REQUIRED": true })), &drivers_on(&bus))
            .expect("transport should be created");
    transport.connect().expect("transport should connect");

    let response = transport
        .request(CONNECT, &[0x00])
        .expect("CONNECT should succeed");
    assert_eq!(response.as_ref(), &[0x15, 0xC0, 0x08, 0x08, 0x00, 0x01, 0x01]);

    let sent = bus.transmitted();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].data.as_ref(), &[0xFF, 0x00, 0, 0, 0, 0, 0, 0]);
    assert_eq!(sent[0].identifier.id(), 0x7E0);

    assert_eq!(transport.link_name(), "can");
    assert_eq!(transport.timestamp_resolution(), Some(1_000));
    assert_eq!(transport.received_counter(), 0);
    transport.close().expect("close should succeed");
}

#[test]
fn callback_mode_delivers_without_listener() {
    let bus = VirtualBus::new();
    bus.set_responder(|frame| vec![vec![0xFF, frame.data.len() as u8]]);

    let mut transport = create_transport(
        &options(json!({ "CAN_USE_DEFAULT_LISTENER": false })),
        &drivers_on(&bus),
    )
    .expect("transport should be created");
    transport.connect().expect("transport should connect");

    let response = transport
        .request(GET_STATUS, &[])
        .expect("GET_STATUS should succeed");
    assert_eq!(response.as_ref(), &[0x01]);

    bus.inject(vec![0xFD, 0x01]).expect("event should be injected");
    let event = transport
        .poll_event(Duration::ZERO)
        .expect("event should already be queued");
    assert_eq!(event.payload.as_ref(), &[0xFD, 0x01]);
    assert_eq!(bus.pending(), 0);
}

#[test]
fn oversized_frame_is_rejected_before_transmit() {
    let bus = VirtualBus::new();
    let mut transport =
        create_transport(&options(json!({})), &drivers_on(&bus)).expect("transport");
    transport.connect().expect("connect");

    let err = transport.request(DOWNLOAD, &[0u8; 64]).unwrap_err();
    assert!(matches!(err, EngineError::Backend(_)));
    assert!(err.to_string().contains("65"));
    assert!(bus.transmitted().is_empty());
}

#[test]
fn negative_response_and_synch() {
    let bus = VirtualBus::new();
    bus.set_responder(|_| vec![vec![0xFE, 0x00]]);
    let mut transport =
        create_transport(&options(json!({})), &drivers_on(&bus)).expect("transport");
    transport.connect().expect("connect");

    let err = transport.request(GET_STATUS, &[]).unwrap_err();
    assert!(matches!(err, EngineError::Protocol { code: 0x00 }));

    let response = transport.request(SYNCH, &[]).expect("SYNCH answer is expected");
    assert_eq!(response.as_ref(), &[0x00]);
}

#[test]
fn block_upload_in_fragments() {
    let bus = VirtualBus::new();
    bus.set_responder(|_| {
        vec![
            vec![0xFF, 1, 2, 3, 4, 5, 6, 7],
            vec![0xFF, 8, 9, 10, 11, 12, 13, 14],
            vec![0xFF, 15, 16],
        ]
    });
    let mut transport =
        create_transport(&options(json!({})), &drivers_on(&bus)).expect("transport");
    transport.connect().expect("connect");

    transport.block_request(UPLOAD, &[16]).expect("block request");
    let block = transport.block_receive(16).expect("block should arrive");
    assert_eq!(block.as_ref(), (1..=16).collect::<Vec<u8>>().as_slice());
}

#[test]
fn can_transport_through_registries() {
    let (drivers, report) = DriverRegistry::builtin();
    assert!(report.is_clean());

    let mut transports = TransportRegistry::builtin();
    register_transport(&mut transports, Arc::new(drivers));
    assert_eq!(transports.names(), vec!["can".to_string(), "eth".to_string()]);

    let mut transport = transports
        .create("CAN", &options(json!({ "VIRTUAL_ACK": true })))
        .expect("transport should be created");
    transport.connect().expect("connect");

    let response = transport.request(CONNECT, &[0x00]).expect("acknowledged");
    assert!(response.is_empty());
    assert_eq!(transport.timing().count(), 1);

    let err = transports
        .create("can", &options(json!({ "CAN_DRIVER": "pcan" })))
        .unwrap_err();
    assert!(matches!(err, EngineError::Backend(_)));
    assert!(err.to_string().contains("pcan"));
}
