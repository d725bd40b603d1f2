use std::io::{Read, Write};
use std::net::{TcpListener, UdpSocket};
use std::thread;
use std::time::Duration;

use serde_json::json;
use xcplink_engine::{EngineError, TransportRegistry};
use xcplink_frame::command::{DOWNLOAD_MAX, GET_STATUS, SET_MTA};

#[test]
fn tcp_request_round_trip() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
    let port = listener.local_addr().expect("local addr").port();

    let slave = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("slave should accept");

        let mut request = [0u8; 9];
        stream.read_exact(&mut request).expect("request should arrive");
        assert_eq!(request, [0x05, 0x00, 0x00, 0x00, 0xEE, 0xCA, 0xFE, 0xBA, 0xBE]);

        // An event, then the positive response split across two writes.
        stream
            .write_all(&[0x02, 0x00, 0x00, 0x00, 0xFD, 0x07])
            .expect("event should be written");
        stream.write_all(&[0x01, 0x00]).expect("partial header");
        thread::sleep(Duration::from_millis(20));
        stream.write_all(&[0x01, 0x00, 0xFF]).expect("rest of response");

        let mut second = [0u8; 5];
        stream.read_exact(&mut second).expect("second request");
        assert_eq!(second, [0x01, 0x00, 0x01, 0x00, 0xFD]);
        stream
            .write_all(&[0x02, 0x00, 0x02, 0x00, 0xFE, 0x24])
            .expect("negative response");

        let mut rest = Vec::new();
        let _ = stream.read_to_end(&mut rest);
    });

    let registry = TransportRegistry::builtin();
    let mut transport = registry
        .create("eth", &json!({"HOST": "127.0.0.1", "PORT": port, "TCP_NODELAY": true}))
        .expect("transport should connect");
    transport.connect().expect("listener should start");

    let response = transport
        .request(DOWNLOAD_MAX, &[0xCA, 0xFE, 0xBA, 0xBE])
        .expect("request should succeed");
    assert!(response.is_empty());
    assert_eq!(transport.send_counter(), 1);
    assert_eq!(transport.received_counter(), 1);

    let event = transport
        .poll_event(Duration::from_secs(1))
        .expect("event should be queued");
    assert_eq!(event.payload.as_ref(), &[0xFD, 0x07]);

    let err = transport.request(GET_STATUS, &[]).unwrap_err();
    assert!(matches!(err, EngineError::Protocol { code: 0x24 }));

    transport.close().expect("close should succeed");
    transport.close().expect("second close is a no-op");
    slave.join().expect("slave thread should finish");
}

#[test]
fn udp_size_mismatch_is_dropped() {
    let slave = UdpSocket::bind("127.0.0.1:0").expect("slave should bind");
    let port = slave.local_addr().expect("local addr").port();

    let slave_thread = thread::spawn(move || {
        let mut buf = [0u8; 64];
        let (n, master) = slave.recv_from(&mut buf).expect("request should arrive");
        assert_eq!(&buf[..n], &[0x05, 0x00, 0x00, 0x00, 0xF6, 0x00, 0x00, 0x00, 0x10]);

        // Declares 5 bytes but carries 2: rejected by the size check.
        slave
            .send_to(&[0x05, 0x00, 0x00, 0x00, 0xFF, 0x01], master)
            .expect("bad datagram");
        slave
            .send_to(&[0x02, 0x00, 0x01, 0x00, 0xFF, 0x02], master)
            .expect("good datagram");
    });

    let mut transport = TransportRegistry::builtin()
        .create(
            "ETH",
            &json!({"HOST": "127.0.0.1", "PORT": port, "PROTOCOL": "UDP"}),
        )
        .expect("transport should connect");
    transport.connect().expect("listener should start");

    let response = transport
        .request(SET_MTA, &[0x00, 0x00, 0x00, 0x10])
        .expect("request should succeed");
    assert_eq!(response.as_ref(), &[0x02]);
    assert_eq!(transport.received_counter(), 1);

    slave_thread.join().expect("slave thread should finish");
}

#[test]
fn connect_refused_is_transport_error() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
        listener.local_addr().expect("local addr").port()
    };

    let err = TransportRegistry::builtin()
        .create("eth", &json!({"HOST": "127.0.0.1", "PORT": port}))
        .unwrap_err();
    assert!(matches!(err, EngineError::Transport(_)));
}
