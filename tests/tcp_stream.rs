use std::{
    io::BufReader,
    net::{TcpListener, TcpStream},
    sync::mpsc,
    thread,
    time::{Duration, Instant},
};

use pan_tilt_tracker::{
    externals::position_stream::{
        client::{ClientState, PositionStreamClient, StreamSettings},
        endpoint::Endpoint,
        services::TcpConnector,
        wire::{read_frame, write_frame, ClientInfo, Frame, ServerInfo},
    },
    models::position_sample::PositionSample,
};

fn sample(mid_line_cross: i32) -> PositionSample {
    PositionSample {
        in_focus: true,
        mid_offset: mid_line_cross - 320,
        degrees: 90f64,
        mid_line_cross,
        width: 640,
        middle_inc: 20,
    }
}

fn connector() -> TcpConnector {
    TcpConnector {
        connect_timeout: Duration::from_millis(500),
        register_timeout: Duration::from_secs(2),
        poll_timeout: Duration::from_millis(50),
    }
}

fn settings(port: u16) -> StreamSettings {
    StreamSettings {
        endpoint: Endpoint::new("127.0.0.1", port),
        client_name: "bench".to_string(),
        retry_delay: Duration::from_millis(50),
    }
}

/// Accept one client, answer its registration and subscription, and hand
/// the stream back for the caller to write positions into.
fn accept_session(listener: &TcpListener) -> (TcpStream, ClientInfo) {
    let (stream, _) = listener.accept().expect("Failed to accept");
    let mut reader = BufReader::new(stream.try_clone().expect("Failed to clone stream"));
    let mut writer = stream;
    let mut buffer = vec![];

    let client = match read_frame(&mut reader, &mut buffer).expect("Failed to read") {
        Some(Frame::RegisterClient(client)) => client,
        other => panic!("Expected registration, got {:?}", other),
    };
    write_frame(
        &mut writer,
        &Frame::Registered(ServerInfo {
            info: "test server".to_string(),
        }),
    )
    .expect("Failed to answer registration");

    match read_frame(&mut reader, &mut buffer).expect("Failed to read") {
        Some(Frame::Subscribe(subscriber)) => assert_eq!(subscriber, client),
        other => panic!("Expected subscription, got {:?}", other),
    }
    (writer, client)
}

#[test]
fn test_streams_and_reregisters_after_server_drops() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind");
    let port = listener.local_addr().expect("No address").port();
    let (consumed_tx, consumed_rx) = mpsc::channel::<()>();

    let server = thread::spawn(move || {
        let mut clients = vec![];

        let (mut stream, client) = accept_session(&listener);
        write_frame(&mut stream, &Frame::Position(sample(250))).expect("Failed to send");
        clients.push(client);
        consumed_rx.recv().expect("Test hung up");
        drop(stream);

        let (mut stream, client) = accept_session(&listener);
        write_frame(&mut stream, &Frame::Position(sample(400))).expect("Failed to send");
        clients.push(client);
        consumed_rx.recv().expect("Test hung up");
        clients
    });

    let client = PositionStreamClient::new(settings(port));
    client.start(connector()).expect("Failed to start");

    assert_eq!(client.get_latest(), Some(sample(250)));
    assert_eq!(client.state(), ClientState::Streaming);
    consumed_tx.send(()).expect("Server hung up");

    assert_eq!(client.get_latest(), Some(sample(400)));
    consumed_tx.send(()).expect("Server hung up");

    let clients = server.join().expect("Server panicked");
    assert_eq!(clients.len(), 2);
    assert!(clients.iter().all(|c| c.info == "bench client"));

    client.close();
    client.join().expect("Client panicked");
}

#[test]
fn test_keeps_retrying_until_server_appears() {
    let port = {
        let probe = TcpListener::bind("127.0.0.1:0").expect("Failed to bind");
        probe.local_addr().expect("No address").port()
    };

    let client = PositionStreamClient::new(settings(port));
    client.start(connector()).expect("Failed to start");
    thread::sleep(Duration::from_millis(200));
    assert!(client.connection_attempts() >= 2);
    assert_eq!(client.state(), ClientState::Connecting);

    let listener = TcpListener::bind(("127.0.0.1", port)).expect("Failed to rebind");
    let server = thread::spawn(move || {
        let (mut stream, _) = accept_session(&listener);
        write_frame(&mut stream, &Frame::Position(sample(310))).expect("Failed to send");
        stream
    });

    assert_eq!(client.get_latest(), Some(sample(310)));
    let _stream = server.join().expect("Server panicked");

    client.close();
    client.join().expect("Client panicked");
}

#[test]
fn test_close_interrupts_idle_stream() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind");
    let port = listener.local_addr().expect("No address").port();
    let (done_tx, done_rx) = mpsc::channel::<()>();

    let server = thread::spawn(move || {
        let (_stream, _) = accept_session(&listener);
        let _ = done_rx.recv_timeout(Duration::from_secs(10));
    });

    let client = PositionStreamClient::new(settings(port));
    client.start(connector()).expect("Failed to start");

    let deadline = Instant::now() + Duration::from_secs(5);
    while client.state() != ClientState::Streaming && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(client.state(), ClientState::Streaming);

    let closing = Instant::now();
    client.close();
    client.join().expect("Client panicked");
    assert!(closing.elapsed() < Duration::from_secs(2));
    assert_eq!(client.get_latest(), None);

    done_tx.send(()).expect("Server hung up");
    server.join().expect("Server panicked");
}
