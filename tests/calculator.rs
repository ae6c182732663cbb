use std::io::{Read, Write};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use bytes::BytesMut;

use calc_rpc::calculator::{
    Calculator, CalculatorError, CalculatorServer, Client, DivideByZeroError, ServerState,
};
use calc_rpc::net::{Encoding, Frame, FRAME_MAX_LEN, FRAME_VERSION};
use calc_rpc::{ClientConfig, Endpoint, Error, Server, ServerConfig, Transport};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn local_config(encoding: Encoding) -> ServerConfig {
    ServerConfig {
        transport: Transport::Tcp(Endpoint::new("127.0.0.1", 0)),
        encoding,
    }
}

fn client_config<H: Server>(server: &CalculatorServer<H>) -> ClientConfig {
    let addr = server.local_addr().expect("server is running");
    ClientConfig {
        transport: Transport::Tcp(Endpoint::new(addr.ip().to_string(), addr.port())),
        encoding: server.config().encoding,
        timeout: Some(Duration::from_secs(5)),
    }
}

fn run_scenario(config: ClientConfig) {
    Client::scoped(config, |client| {
        assert_eq!(client.add(1, 2)?, 3);
        assert_eq!(client.subtract(2, 1)?, 1);
        assert_eq!(client.multiply(2, 3)?, 6);
        assert_eq!(client.divide(4, 2)?, 2);
        match client.divide(4, 0) {
            Err(CalculatorError::DivideByZero(DivideByZeroError)) => {}
            other => panic!("expected a divide by zero fault, got {other:?}"),
        }
        // the fault does not break the connection
        assert_eq!(client.divide(-9, 2)?, -4);
        assert!(client.is_open());
        Ok(())
    })
    .unwrap();
}

#[test]
fn scenario_over_one_connection() {
    init_logger();
    let mut server = CalculatorServer::with_config(local_config(Encoding::Bincode));
    server.start().unwrap();
    assert_eq!(server.state(), ServerState::Running);

    run_scenario(client_config(&server));

    server.stop();
    server.join().unwrap();
    assert_eq!(server.state(), ServerState::Stopped);
}

#[test]
fn scenario_over_json() {
    init_logger();
    let mut server = CalculatorServer::with_config(local_config(Encoding::Json));
    server.start().unwrap();
    run_scenario(client_config(&server));
    server.stop();
    server.join().unwrap();
}

#[cfg(unix)]
#[test]
fn scenario_over_unix_socket() {
    init_logger();
    let path = std::env::temp_dir().join(format!("calc_rpc_test_{}.sock", std::process::id()));
    let config = ServerConfig {
        transport: Transport::Unix(path.clone()),
        encoding: Encoding::Bincode,
    };
    let mut server = CalculatorServer::with_config(config.clone());
    server.start().unwrap();
    assert!(server.local_addr().is_none());

    run_scenario(ClientConfig::for_server(&config));

    server.stop();
    server.join().unwrap();
    drop(server);
    assert!(!path.exists());
}

#[test]
fn start_stop_join_without_connections() {
    init_logger();
    let mut server = CalculatorServer::with_config(local_config(Encoding::Bincode));
    let now = Instant::now();
    server.start().unwrap();
    server.stop();
    server.join().unwrap();
    assert!(now.elapsed() < Duration::from_secs(5));

    // both are idempotent
    server.stop();
    server.join().unwrap();
    assert_eq!(server.state(), ServerState::Stopped);
    assert!(server.local_addr().is_none());
}

#[test]
fn join_and_stop_before_start_are_noops() {
    let mut server = CalculatorServer::with_config(local_config(Encoding::Bincode));
    assert_eq!(server.state(), ServerState::Stopped);
    server.join().unwrap();
    server.stop();
    assert_eq!(server.state(), ServerState::Stopped);
}

#[test]
fn start_twice_keeps_the_first_listener() {
    init_logger();
    let mut server = CalculatorServer::with_config(local_config(Encoding::Bincode));
    server.start().unwrap();
    let addr = server.local_addr();
    server.start().unwrap();
    assert_eq!(server.local_addr(), addr);
}

#[test]
fn restart_after_stop() {
    init_logger();
    let mut server = CalculatorServer::with_config(local_config(Encoding::Bincode));
    server.start().unwrap();
    server.stop();
    server.join().unwrap();

    server.start().unwrap();
    assert!(server.is_running());
    let mut client = Client::connect(client_config(&server)).unwrap();
    assert_eq!(client.add(20, 22).unwrap(), 42);
}

#[test]
fn endpoint_in_use_is_a_bind_error() {
    init_logger();
    let mut first = CalculatorServer::with_config(local_config(Encoding::Bincode));
    first.start().unwrap();
    let port = first.local_addr().unwrap().port();

    let mut second = CalculatorServer::with_config(ServerConfig {
        transport: Transport::Tcp(Endpoint::new("127.0.0.1", port)),
        ..ServerConfig::default()
    });
    match second.start() {
        Err(Error::Bind(e)) => assert_eq!(e.kind(), std::io::ErrorKind::AddrInUse),
        other => panic!("expected a bind error, got {other:?}"),
    }
    assert_eq!(second.state(), ServerState::Stopped);

    // every connection still lands on the first server
    for _ in 0..4 {
        let mut client = Client::connect(client_config(&first)).unwrap();
        assert_eq!(client.add(2, 2).unwrap(), 4);
    }
}

#[cfg(unix)]
#[test]
fn unix_socket_in_use_is_a_bind_error() {
    init_logger();
    let path = std::env::temp_dir().join(format!("calc_rpc_busy_{}.sock", std::process::id()));
    let config = ServerConfig {
        transport: Transport::Unix(path.clone()),
        encoding: Encoding::Bincode,
    };
    let mut first = CalculatorServer::with_config(config.clone());
    first.start().unwrap();

    let mut second = CalculatorServer::with_config(config.clone());
    assert!(matches!(second.start(), Err(Error::Bind(_))));
    drop(second);

    // the failed server left the socket file of the first one alone
    assert!(path.exists());
    let mut client = Client::connect(ClientConfig::for_server(&config)).unwrap();
    assert_eq!(client.subtract(5, 3).unwrap(), 2);
}

#[cfg(unix)]
#[test]
fn stale_unix_socket_file_is_replaced() {
    init_logger();
    let path = std::env::temp_dir().join(format!("calc_rpc_stale_{}.sock", std::process::id()));
    // a socket file whose listener is gone
    drop(std::os::unix::net::UnixListener::bind(&path).unwrap());
    assert!(path.exists());

    let config = ServerConfig {
        transport: Transport::Unix(path.clone()),
        encoding: Encoding::Bincode,
    };
    let mut server = CalculatorServer::with_config(config.clone());
    server.start().unwrap();
    let mut client = Client::connect(ClientConfig::for_server(&config)).unwrap();
    assert_eq!(client.multiply(4, 5).unwrap(), 20);
}

#[test]
fn stop_keeps_accepted_connections() {
    init_logger();
    let mut server = CalculatorServer::with_config(local_config(Encoding::Bincode));
    server.start().unwrap();
    let config = client_config(&server);

    let mut client = Client::connect(config.clone()).unwrap();
    assert_eq!(client.add(1, 1).unwrap(), 2);

    server.stop();
    server.join().unwrap();

    // the accepted connection is still served, new ones are refused
    assert_eq!(client.multiply(3, 3).unwrap(), 9);
    assert!(matches!(Client::connect(config), Err(Error::Connection(_))));
}

#[test]
fn mismatched_encoding_is_reported_and_closes_the_client() {
    init_logger();
    let mut server = CalculatorServer::with_config(local_config(Encoding::Bincode));
    server.start().unwrap();
    let config = ClientConfig {
        encoding: Encoding::Json,
        ..client_config(&server)
    };

    let mut client = Client::connect(config).unwrap();
    match client.add(1, 2) {
        Err(CalculatorError::Rpc(Error::ServerDecode(_))) => {}
        other => panic!("expected a server decode error, got {other:?}"),
    }
    assert!(!client.is_open());
    assert!(matches!(
        client.add(1, 2),
        Err(CalculatorError::Rpc(Error::NotConnected))
    ));
}

fn send_raw(addr: SocketAddr, bytes: &[u8]) -> Vec<u8> {
    let mut stream = std::net::TcpStream::connect(addr).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    stream.write_all(bytes).unwrap();
    // the server hangs up on a frame it can't read
    let mut rsp = Vec::new();
    stream.read_to_end(&mut rsp).unwrap();
    rsp
}

#[test]
fn malformed_frames_only_end_their_own_connection() {
    init_logger();
    let mut server = CalculatorServer::with_config(local_config(Encoding::Bincode));
    server.start().unwrap();
    let config = client_config(&server);
    let addr = server.local_addr().unwrap();

    let mut client = Client::connect(config.clone()).unwrap();
    assert_eq!(client.add(1, 2).unwrap(), 3);

    // unknown version, rejected on its first byte
    assert!(send_raw(addr, &[9]).is_empty());

    // length over the limit
    let mut too_long = vec![FRAME_VERSION];
    too_long.extend_from_slice(&0u64.to_be_bytes());
    too_long.extend_from_slice(&(FRAME_MAX_LEN + 1).to_be_bytes());
    assert!(send_raw(addr, &too_long).is_empty());

    // undecodable payload gets a fault frame before the hang up
    let mut garbage = vec![FRAME_VERSION];
    garbage.extend_from_slice(&7u64.to_be_bytes());
    garbage.extend_from_slice(&3u64.to_be_bytes());
    garbage.extend_from_slice(&[0xff; 3]);
    let rsp = send_raw(addr, &garbage);
    let frame = Frame::decode_from(&mut rsp.as_slice(), &mut BytesMut::new()).unwrap();
    assert_eq!(frame.id, 7);
    assert!(matches!(frame.decode_rsp(), Err(Error::ServerDecode(_))));

    // the accept loop and the other connections carry on
    assert!(server.is_running());
    assert_eq!(client.multiply(2, 3).unwrap(), 6);
    let mut fresh = Client::connect(config).unwrap();
    assert_eq!(fresh.add(1, 2).unwrap(), 3);
}

#[test]
fn client_reopens_after_close() {
    init_logger();
    let mut server = CalculatorServer::with_config(local_config(Encoding::Bincode));
    server.start().unwrap();

    let mut client = Client::connect(client_config(&server)).unwrap();
    client.close();
    assert!(!client.is_open());
    client.open().unwrap();
    assert_eq!(client.subtract(10, 4).unwrap(), 6);
}

#[test]
fn scoped_body_error_propagates() {
    init_logger();
    let mut server = CalculatorServer::with_config(local_config(Encoding::Bincode));
    server.start().unwrap();

    let ret: Result<i64, _> = Client::scoped(client_config(&server), |client| {
        let q = client.divide(1, 0)?;
        Ok(q + 1)
    });
    assert!(matches!(ret, Err(CalculatorError::DivideByZero(_))));
}

#[test]
fn connections_are_served_concurrently() {
    init_logger();
    let mut server = CalculatorServer::with_config(local_config(Encoding::Bincode));
    server.start().unwrap();
    let config = client_config(&server);

    let workers: Vec<_> = (0..8i64)
        .map(|i| {
            let config = config.clone();
            std::thread::spawn(move || {
                let mut client = Client::connect(config).unwrap();
                for j in 0..50i64 {
                    assert_eq!(client.add(i, j).unwrap(), i + j);
                    assert_eq!(client.multiply(i, j).unwrap(), i * j);
                }
            })
        })
        .collect();

    for w in workers {
        w.join().unwrap();
    }
}

/// panics on multiply
#[derive(calc_rpc::Server)]
#[service(calc_rpc::calculator::Calculator)]
struct PanickyHandler;

impl Calculator for PanickyHandler {
    fn add(&self, a: i64, b: i64) -> i64 {
        a + b
    }

    fn subtract(&self, a: i64, b: i64) -> i64 {
        a - b
    }

    fn multiply(&self, _a: i64, _b: i64) -> i64 {
        panic!("multiply is broken")
    }

    fn divide(&self, a: i64, b: i64) -> Result<i64, DivideByZeroError> {
        a.checked_div(b).ok_or(DivideByZeroError)
    }
}

#[test]
fn handler_panic_is_a_status_error() {
    init_logger();
    let mut server = CalculatorServer::new(local_config(Encoding::Bincode), PanickyHandler);
    server.start().unwrap();

    let mut client = Client::connect(client_config(&server)).unwrap();
    match client.multiply(2, 3) {
        Err(CalculatorError::Rpc(Error::Status(msg))) => assert!(msg.contains("multiply")),
        other => panic!("expected a status error, got {other:?}"),
    }
    // the connection survives the panic
    assert!(client.is_open());
    assert_eq!(client.add(2, 3).unwrap(), 5);
}
