//! Request/response engine driven through the in-memory transport

use lwserial_core::config::ConnectionConfig;
use lwserial_core::protocol::{
    encode_frame, CommandFilter, Connection, ProtocolError, Request, WaitStatus, ANY_COMMAND,
    REQUEST_RETRIES,
};
use lwserial_core::transport::{MockTransport, TransportError};
use pretty_assertions::assert_eq;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn frame(command_id: u8, data: &[u8]) -> Vec<u8> {
    encode_frame(command_id, false, data).unwrap()
}

#[test]
fn test_retry_exhaustion() {
    init_tracing();
    let mut conn = Connection::new(MockTransport::new());
    conn.request_mut().set_read(44);

    let result = conn.send_request_get_response();
    assert!(matches!(
        result,
        Err(ProtocolError::RetriesExceeded { attempts: 4 })
    ));

    let mock = conn.transport();
    assert_eq!(mock.send_calls(), REQUEST_RETRIES as usize);
    assert!(mock.sent().iter().all(|sent| sent == Request::read(44).as_bytes()));

    let counters = conn.counters();
    assert_eq!(counters.tx_frames, 4);
    assert_eq!(counters.retries, 3);
    assert_eq!(counters.rx_bytes, 0);
}

#[test]
fn test_retry_budget_from_config() {
    let config = ConnectionConfig {
        request_retries: 2,
        response_timeout_ms: 100,
        ..ConnectionConfig::default()
    };
    let mut conn = Connection::with_config(MockTransport::new(), &config).unwrap();
    conn.request_mut().set_read(2);

    assert!(matches!(
        conn.send_request_get_response(),
        Err(ProtocolError::RetriesExceeded { attempts: 2 })
    ));
    assert_eq!(conn.transport().send_calls(), 2);
    assert_eq!(conn.transport().now(), 200);
}

#[test]
fn test_fatal_receive_short_circuits() {
    init_tracing();
    let mut conn = Connection::new(MockTransport::new().fail_receive_from(1));
    conn.request_mut().set_read(44);

    let result = conn.send_request_get_response();
    assert!(matches!(
        result,
        Err(ProtocolError::TransportFatal(TransportError::LinkLost))
    ));
    assert_eq!(conn.transport().send_calls(), 1);
    assert_eq!(conn.transport().receive_calls(), 1);
}

#[test]
fn test_fatal_send_short_circuits() {
    let mut conn = Connection::new(MockTransport::new().fail_sends());
    conn.request_mut().set_read(44);

    let err = conn.send_request_get_response().unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(conn.transport().send_calls(), 1);
    assert_eq!(conn.transport().receive_calls(), 0);
}

#[test]
fn test_fatal_receive_after_retries_started() {
    // Attempt one times out after 21 receives, attempt two hits the failure
    let mut conn = Connection::new(MockTransport::new().fail_receive_from(22));
    conn.request_mut().set_read(44);

    assert!(matches!(
        conn.send_request_get_response(),
        Err(ProtocolError::TransportFatal(_))
    ));
    assert_eq!(conn.transport().send_calls(), 2);
}

#[test]
fn test_response_completes_exchange() {
    let reply = frame(44, &[0x10, 0x27, 0, 0]);
    let mock = MockTransport::new().with_responder(move |_| reply.clone());
    let mut conn = Connection::new(mock);

    let response = conn
        .execute(|request| {
            request.set_read(44);
            Ok(())
        })
        .unwrap();
    assert_eq!(response.command_id(), Some(44));
    assert_eq!(response.read_u32(0).unwrap(), 10000);

    let counters = conn.counters();
    assert_eq!(counters.tx_frames, 1);
    assert_eq!(counters.rx_frames, 1);
    assert_eq!(counters.rx_bytes, 10);
    assert_eq!(counters.retries, 0);
}

#[test]
fn test_response_on_second_attempt() {
    let reply = frame(3, b"SN0001");
    let mut calls = 0;
    let mock = MockTransport::new().with_responder(move |_| {
        calls += 1;
        if calls < 2 {
            Vec::new()
        } else {
            reply.clone()
        }
    });
    let mut conn = Connection::new(mock);
    conn.request_mut().set_read(3);

    conn.send_request_get_response().unwrap();
    assert_eq!(conn.transport().send_calls(), 2);
    assert_eq!(conn.counters().retries, 1);
    assert_eq!(conn.response().payload(), b"SN0001");
}

#[test]
fn test_corrupt_response_is_retried() {
    let good = frame(55, &[0xC4, 0x09, 0, 0]);
    let mut bad = good.clone();
    bad[5] ^= 0x01;

    let mut calls = 0;
    let mock = MockTransport::new().with_responder(move |_| {
        calls += 1;
        if calls == 1 {
            bad.clone()
        } else {
            good.clone()
        }
    });
    let mut conn = Connection::new(mock);
    conn.request_mut().set_read(55);

    conn.send_request_get_response().unwrap();
    assert_eq!(conn.response().read_i32(0).unwrap(), 2500);
    assert_eq!(conn.counters().rejected_frames, 1);
    assert_eq!(conn.transport().send_calls(), 2);
}

#[test]
fn test_unrelated_frames_are_skipped() {
    let mut mock = MockTransport::new();
    mock.push_inbound(&frame(45, &[1]));
    mock.push_inbound(&frame(44, &[2]));
    mock.push_inbound(&frame(45, &[3]));
    let mut conn = Connection::new(mock);

    assert_eq!(conn.wait_for_response(44u8, 1000).unwrap(), WaitStatus::Ready);
    assert_eq!(conn.response().command_id(), Some(44));
    assert_eq!(conn.response().payload(), &[2]);

    // The trailing frame is still buffered for the next wait
    assert_eq!(
        conn.wait_for_response(ANY_COMMAND, 1000).unwrap(),
        WaitStatus::Ready
    );
    assert_eq!(conn.response().command_id(), Some(45));
    assert_eq!(conn.response().payload(), &[3]);
    assert_eq!(conn.counters().rx_frames, 3);
}

#[test]
fn test_wait_returns_first_match() {
    let mut mock = MockTransport::new();
    mock.push_inbound(&frame(45, &[1]));
    mock.push_inbound(&frame(44, &[2]));
    mock.push_inbound(&frame(45, &[3]));
    let mut conn = Connection::new(mock);

    assert_eq!(conn.wait_for_response(45u8, 1000).unwrap(), WaitStatus::Ready);
    assert_eq!(conn.response().payload(), &[1]);
    assert_eq!(conn.transport().pending_inbound(), 14);

    assert_eq!(conn.wait_for_response(45u8, 1000).unwrap(), WaitStatus::Ready);
    assert_eq!(conn.response().payload(), &[3]);
    assert_eq!(conn.transport().pending_inbound(), 0);
}

#[test]
fn test_streamed_frames_interleaved_with_response() {
    let mut mock = MockTransport::new();
    mock.push_inbound(&frame(44, &[0; 4]));
    let reply = frame(74, &[20, 0, 0, 0]);
    let mock = mock.with_responder(move |_| reply.clone());
    let mut conn = Connection::new(mock);
    conn.request_mut().set_read(74);

    conn.send_request_get_response().unwrap();
    assert_eq!(conn.response().command_id(), Some(74));
    assert_eq!(conn.response().read_u32(0).unwrap(), 20);
    assert_eq!(conn.transport().send_calls(), 1);
}

#[test]
fn test_non_blocking_poll() {
    let mut conn = Connection::new(MockTransport::new());
    assert_eq!(
        conn.wait_for_response(CommandFilter::Any, 0).unwrap(),
        WaitStatus::Again
    );

    let bytes = frame(44, &[7, 0, 0, 0]);
    let (head, tail) = bytes.split_at(5);

    conn.transport_mut().push_inbound(head);
    assert_eq!(
        conn.wait_for_response(CommandFilter::Any, 0).unwrap(),
        WaitStatus::Again
    );
    assert_eq!(conn.transport().pending_inbound(), 0);

    conn.transport_mut().push_inbound(tail);
    assert_eq!(
        conn.wait_for_response(CommandFilter::Any, 0).unwrap(),
        WaitStatus::Ready
    );
    assert_eq!(conn.response().read_i32(0).unwrap(), 7);

    // Polling never consumes virtual time
    assert_eq!(conn.transport().now(), 0);
}

#[test]
fn test_non_blocking_poll_skips_other_commands() {
    let mut conn = Connection::new(MockTransport::new());
    conn.transport_mut().push_inbound(&frame(45, &[]));

    assert_eq!(conn.wait_for_response(44u8, 0).unwrap(), WaitStatus::Again);
    assert_eq!(conn.counters().rx_frames, 1);
}

#[test]
fn test_timeout_across_clock_wrap() {
    let start = u32::MAX - 100;
    let mut conn = Connection::new(MockTransport::new().with_start_time(start));

    assert!(matches!(
        conn.wait_for_response(44u8, 1000),
        Err(ProtocolError::Timeout)
    ));
    assert_eq!(conn.transport().now(), start.wrapping_add(1000));
}

#[test]
fn test_exchange_across_clock_wrap() {
    let reply = frame(2, &[3, 2, 1, 0]);
    let mut calls = 0;
    let mock = MockTransport::new()
        .with_start_time(u32::MAX - 500)
        .with_responder(move |_| {
            calls += 1;
            if calls < 3 {
                Vec::new()
            } else {
                reply.clone()
            }
        });
    let mut conn = Connection::new(mock);
    conn.request_mut().set_read(2);

    conn.send_request_get_response().unwrap();
    assert_eq!(conn.transport().send_calls(), 3);
    assert_eq!(conn.response().read_u32(0).unwrap(), 0x0001_0203);
}

#[test]
fn test_sleep_passes_through() {
    let mut conn = Connection::new(MockTransport::new());
    conn.sleep_ms(25);
    assert_eq!(conn.transport().slept_ms(), 25);
    assert_eq!(conn.transport().now(), 25);
}

#[test]
fn test_build_error_skips_io() {
    let mut conn = Connection::new(MockTransport::new());
    let result = conn.execute(|request| request.set_write_string(0, "a string that is too long"));

    assert!(matches!(result, Err(ProtocolError::InvalidParameter(_))));
    assert_eq!(conn.transport().send_calls(), 0);
}
