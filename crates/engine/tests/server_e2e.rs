//! End-to-end tests driving a live server through the wire protocol.

use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream};
use std::thread::JoinHandle;
use std::time::Duration;

use graphpipe_engine::{Server, ServerConfig, ServerHandle};

fn start_server(idle_timeout: Duration) -> (ServerHandle, SocketAddr, JoinHandle<()>) {
    let server = Server::bind(ServerConfig {
        port: 0,
        workers: 4,
        idle_timeout,
        queue_capacity: 8,
        metrics_output: None,
    })
    .expect("bind ephemeral port");
    let addr = server.local_addr();
    let handle = server.handle();
    let join = std::thread::spawn(move || server.run().expect("server run"));
    (handle, addr, join)
}

struct Client {
    reader: BufReader<TcpStream>,
}

impl Client {
    fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).expect("connect");
        stream
            .set_read_timeout(Some(Duration::from_secs(10)))
            .expect("read timeout");
        Self {
            reader: BufReader::new(stream),
        }
    }

    fn send(&mut self, text: &str) {
        self.reader
            .get_mut()
            .write_all(text.as_bytes())
            .expect("send");
    }

    /// Reads one framed response, up to and including its END line.
    fn read_response(&mut self) -> String {
        let mut response = String::new();
        loop {
            let mut line = String::new();
            let n = self.reader.read_line(&mut line).expect("read line");
            if n == 0 {
                return response; // EOF
            }
            response.push_str(&line);
            if line == "END\n" || line == "END" {
                return response;
            }
        }
    }

    fn roundtrip(&mut self, request: &str) -> String {
        self.send(request);
        self.read_response()
    }

    fn at_eof(&mut self) -> bool {
        let mut line = String::new();
        self.reader.read_line(&mut line).expect("read line") == 0
    }
}

fn stop(handle: ServerHandle, join: JoinHandle<()>) {
    handle.shutdown();
    join.join().expect("server thread");
}

#[test]
fn all_on_a_directed_triangle_reports_four_fixed_lines() {
    let (handle, addr, join) = start_server(Duration::from_secs(300));
    let mut client = Client::connect(addr);

    let reply = client.roundtrip(
        "ALG ALL\nDIRECTED 1\nRANDOM 0\nV 3\nE 3\nEDGE 0 1 1\nEDGE 1 2 1\nEDGE 0 2 1\nPARAM SRC 0\nPARAM SINK 2\nEND\n",
    );
    assert_eq!(
        reply,
        "OK\n\
         RESULT MAX_FLOW=RESULT 2\n\
         RESULT SCC_COUNT=RESULT 3\n\
         RESULT MST_WEIGHT=Error: cannot run MST on directed graph\n\
         RESULT CLIQUES=Error: cannot run CLIQUES on directed graph\n\
         END\n"
    );
    stop(handle, join);
}

#[test]
fn single_max_flow() {
    let (handle, addr, join) = start_server(Duration::from_secs(300));
    let mut client = Client::connect(addr);

    let reply = client.roundtrip(
        "ALG MAX_FLOW\nDIRECTED 1\nV 2\nE 1\nEDGE 0 1 5\nPARAM SRC 0\nPARAM SINK 1\nEND\n",
    );
    assert_eq!(reply, "OK\nRESULT 5\nEND\n");
    stop(handle, join);
}

#[test]
fn cliques_of_size_three_in_k4() {
    let (handle, addr, join) = start_server(Duration::from_secs(300));
    let mut client = Client::connect(addr);

    let reply = client.roundtrip(
        "ALG CLIQUES\nDIRECTED 0\nV 4\nE 6\n\
         EDGE 0 1 1\nEDGE 0 2 1\nEDGE 0 3 1\nEDGE 1 2 1\nEDGE 1 3 1\nEDGE 2 3 1\n\
         PARAM K 3\nEND\n",
    );
    assert_eq!(reply, "OK\nRESULT 4\nEND\n");
    stop(handle, join);
}

#[test]
fn mst_weight_of_a_triangle() {
    let (handle, addr, join) = start_server(Duration::from_secs(300));
    let mut client = Client::connect(addr);

    let reply = client
        .roundtrip("ALG MST\nDIRECTED 0\nV 3\nEDGE 0 1 1\nEDGE 1 2 2\nEDGE 0 2 5\nEND\n");
    assert_eq!(reply, "OK\nRESULT 3\nEND\n");
    stop(handle, join);
}

#[test]
fn missing_v_is_rejected_and_the_connection_survives() {
    let (handle, addr, join) = start_server(Duration::from_secs(300));
    let mut client = Client::connect(addr);

    let reply = client.roundtrip("ALG MST\nV 0\nEND\n");
    assert_eq!(reply, "ERR\nMissing/invalid V\nEND\n");

    // Same connection still serves requests.
    let reply = client.roundtrip("ALG MST\nDIRECTED 0\nV 2\nEDGE 0 1 4\nEND\n");
    assert_eq!(reply, "OK\nRESULT 4\nEND\n");
    stop(handle, join);
}

#[test]
fn exit_gets_bye_and_a_clean_close() {
    let (handle, addr, join) = start_server(Duration::from_secs(300));
    let mut client = Client::connect(addr);

    let reply = client.roundtrip("EXIT\n");
    assert_eq!(reply, "OK\nBYE\nEND\n");
    assert!(client.at_eof());
    stop(handle, join);
}

#[test]
fn unknown_directive_aborts_only_that_request() {
    let (handle, addr, join) = start_server(Duration::from_secs(300));
    let mut client = Client::connect(addr);

    let reply = client.roundtrip("ALG MST\nFROBNICATE 7\nV 2\nEND\n");
    assert_eq!(reply, "ERR\nError: Unknown directive: FROBNICATE 7\nEND\n");

    let reply = client.roundtrip("ALG MST\nDIRECTED 0\nV 2\nEDGE 0 1 4\nEND\n");
    assert_eq!(reply, "OK\nRESULT 4\nEND\n");
    stop(handle, join);
}

#[test]
fn unsupported_algorithm_keeps_the_connection_open() {
    let (handle, addr, join) = start_server(Duration::from_secs(300));
    let mut client = Client::connect(addr);

    let reply = client.roundtrip("ALG DIJKSTRA\nV 2\nEND\n");
    assert_eq!(reply, "ERR\nUnsupported algorithm\nEND\n");

    let reply = client.roundtrip("ALG SCC\nDIRECTED 1\nV 2\nEND\n");
    assert_eq!(reply, "OK\nRESULT 2\nEND\n");
    stop(handle, join);
}

#[test]
fn preview_round_trips_the_graph() {
    let (handle, addr, join) = start_server(Duration::from_secs(300));
    let mut client = Client::connect(addr);

    let reply =
        client.roundtrip("ALG PREVIEW\nDIRECTED 0\nV 3\nEDGE 0 1 2\nEDGE 1 2 3\nEND\n");
    assert_eq!(reply, "OK\nGRAPH 3 2\nEDGE 0 1 2\nEDGE 1 2 3\nEND\n");
    stop(handle, join);
}

#[test]
fn random_generation_is_deterministic_per_seed() {
    let (handle, addr, join) = start_server(Duration::from_secs(300));
    let mut client = Client::connect(addr);

    let request = "ALG PREVIEW\nDIRECTED 0\nRANDOM 1\nV 8\nE 10\nSEED 5\nWMIN 1\nWMAX 9\nEND\n";
    let first = client.roundtrip(request);
    let second = client.roundtrip(request);
    assert_eq!(first, second);
    assert!(first.starts_with("OK\nGRAPH 8 10\n"));

    let other_seed = client
        .roundtrip("ALG PREVIEW\nDIRECTED 0\nRANDOM 1\nV 8\nE 10\nSEED 6\nWMIN 1\nWMAX 9\nEND\n");
    assert_ne!(first, other_seed);
    stop(handle, join);
}

#[test]
fn requests_on_one_connection_are_served_in_order() {
    let (handle, addr, join) = start_server(Duration::from_secs(300));
    let mut client = Client::connect(addr);

    for weight in 1..=5 {
        let reply = client.roundtrip(&format!(
            "ALG MST\nDIRECTED 0\nV 2\nEDGE 0 1 {weight}\nEND\n"
        ));
        assert_eq!(reply, format!("OK\nRESULT {weight}\nEND\n"));
    }
    stop(handle, join);
}

#[test]
fn concurrent_clients_each_get_their_own_reply() {
    let (handle, addr, join) = start_server(Duration::from_secs(300));

    let clients: Vec<_> = (1..=4_i64)
        .map(|cap| {
            std::thread::spawn(move || {
                let mut client = Client::connect(addr);
                let reply = client.roundtrip(&format!(
                    "ALG MAX_FLOW\nDIRECTED 1\nV 2\nEDGE 0 1 {cap}\nPARAM SRC 0\nPARAM SINK 1\nEND\n"
                ));
                assert_eq!(reply, format!("OK\nRESULT {cap}\nEND\n"));
            })
        })
        .collect();
    for c in clients {
        c.join().expect("client thread");
    }
    stop(handle, join);
}

#[test]
fn shutdown_request_stops_the_server() {
    let (_handle, addr, join) = start_server(Duration::from_secs(300));
    let mut client = Client::connect(addr);

    let reply = client.roundtrip("SHUTDOWN\nEND\n");
    assert_eq!(reply, "OK\nSERVER_SHUTTING_DOWN\nEND\n");
    join.join().expect("server thread exits after SHUTDOWN");
}

#[test]
fn external_shutdown_unblocks_an_idle_connection() {
    let (handle, addr, join) = start_server(Duration::from_secs(300));
    // A connected client that never sends anything must not keep the
    // server from shutting down.
    let client = TcpStream::connect(addr).expect("connect");
    std::thread::sleep(Duration::from_millis(100));

    handle.shutdown();
    join.join().expect("server thread exits despite idle client");
    drop(client);
}

#[test]
fn idle_timeout_shuts_the_server_down() {
    let (_handle, _addr, join) = start_server(Duration::from_secs(1));
    // Tick (1s) + debounce (200ms) + margin: the run thread should come
    // back on its own.
    join.join().expect("server thread exits after idle timeout");
}
