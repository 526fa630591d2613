use std::io::{self, Read};

use graphpipe_graph::{Graph, Params};

/// Upper bound on V, guarding against pathological memory/CPU usage.
pub(crate) const V_SAFE_MAX: i64 = 20_000;

/// Upper bound on a single request's size on the wire.
pub(crate) const MAX_REQUEST_BYTES: usize = 16 * 1024 * 1024;

/// A request line the parser rejected. The `Display` form is the exact text
/// sent back to the client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub(crate) enum ProtocolError {
    #[error("Error: Unknown directive: {0}")]
    UnknownDirective(String),
    #[error("Error: invalid {directive} value: {line}")]
    InvalidValue {
        directive: &'static str,
        line: String,
    },
}

/// An explicit `EDGE u v [w]` line, unvalidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EdgeSpec {
    pub(crate) u: i64,
    pub(crate) v: i64,
    pub(crate) w: i64,
}

/// A parsed request, before semantic validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Request {
    pub(crate) alg: Option<String>,
    pub(crate) directed: bool,
    pub(crate) vertices: Option<i64>,
    pub(crate) edges_declared: Option<i64>,
    pub(crate) random: bool,
    pub(crate) seed: i64,
    pub(crate) wmin: i64,
    pub(crate) wmax: i64,
    pub(crate) edges: Vec<EdgeSpec>,
    pub(crate) params: Params,
}

impl Default for Request {
    fn default() -> Self {
        Self {
            alg: None,
            directed: false,
            vertices: None,
            edges_declared: None,
            random: false,
            seed: 42,
            wmin: 1,
            wmax: 1,
            edges: Vec::new(),
            params: Params::default(),
        }
    }
}

/// Parses a buffered request up to its `END` line.
///
/// Blank lines are ignored, trailing `\r` is tolerated, and any unrecognized
/// directive aborts the request. Semantic checks (V range, edge bounds, ALG
/// name) are the handler's job.
pub(crate) fn parse_request(buf: &str) -> Result<Request, ProtocolError> {
    let mut req = Request::default();
    for raw in buf.lines() {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        if line == "END" {
            break;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some((&directive, rest)) = tokens.split_first() else {
            continue; // blank line
        };
        match directive {
            "ALG" => parse_alg(rest, line, &mut req)?,
            "DIRECTED" => req.directed = parse_one_int("DIRECTED", rest, line)? != 0,
            "V" => req.vertices = Some(parse_one_int("V", rest, line)?),
            "E" => req.edges_declared = Some(parse_one_int("E", rest, line)?),
            "RANDOM" => req.random = parse_one_int("RANDOM", rest, line)? != 0,
            "SEED" => req.seed = parse_one_int("SEED", rest, line)?,
            "WMIN" => req.wmin = parse_one_int("WMIN", rest, line)?,
            "WMAX" => req.wmax = parse_one_int("WMAX", rest, line)?,
            "EDGE" => req.edges.push(parse_edge(rest, line)?),
            "PARAM" => parse_param(rest, line, &mut req)?,
            _ => return Err(ProtocolError::UnknownDirective(line.to_string())),
        }
    }
    Ok(req)
}

fn parse_int(directive: &'static str, token: &str, line: &str) -> Result<i64, ProtocolError> {
    token.parse().map_err(|_| ProtocolError::InvalidValue {
        directive,
        line: line.to_string(),
    })
}

fn parse_one_int(directive: &'static str, rest: &[&str], line: &str) -> Result<i64, ProtocolError> {
    match *rest {
        [token] => parse_int(directive, token, line),
        _ => Err(ProtocolError::InvalidValue {
            directive,
            line: line.to_string(),
        }),
    }
}

// `ALG <name>`, optionally with trailing `DIRECTED <0|1>` tokens kept for
// backward compatibility with older clients.
fn parse_alg(rest: &[&str], line: &str, req: &mut Request) -> Result<(), ProtocolError> {
    match *rest {
        [name] => {
            req.alg = Some(name.to_string());
            Ok(())
        }
        [name, "DIRECTED", value] => {
            req.alg = Some(name.to_string());
            req.directed = parse_int("DIRECTED", value, line)? != 0;
            Ok(())
        }
        _ => Err(ProtocolError::InvalidValue {
            directive: "ALG",
            line: line.to_string(),
        }),
    }
}

fn parse_edge(rest: &[&str], line: &str) -> Result<EdgeSpec, ProtocolError> {
    let (u, v, w) = match *rest {
        [u, v] => (u, v, "1"),
        [u, v, w] => (u, v, w),
        _ => {
            return Err(ProtocolError::InvalidValue {
                directive: "EDGE",
                line: line.to_string(),
            });
        }
    };
    Ok(EdgeSpec {
        u: parse_int("EDGE", u, line)?,
        v: parse_int("EDGE", v, line)?,
        w: parse_int("EDGE", w, line)?,
    })
}

// `PARAM SRC|SINK|K <value>`. Negative values are treated as absent;
// unrecognized keys are ignored.
fn parse_param(rest: &[&str], line: &str, req: &mut Request) -> Result<(), ProtocolError> {
    let [key, value] = *rest else {
        return Err(ProtocolError::InvalidValue {
            directive: "PARAM",
            line: line.to_string(),
        });
    };
    let value = parse_int("PARAM", value, line)?;
    if value < 0 {
        return Ok(());
    }
    match key {
        "SRC" => req.params.src = Some(value as usize),
        "SINK" => req.params.sink = Some(value as usize),
        "K" => req.params.k = Some(value as usize),
        _ => {}
    }
    Ok(())
}

/// Outcome of reading one request's bytes off the wire.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ReadOutcome {
    /// A complete (or EOF-truncated but non-empty) request buffer.
    Request(String),
    /// The peer closed before sending anything.
    Eof,
    /// The request exceeded [`MAX_REQUEST_BYTES`] without terminating.
    TooLarge,
}

/// Accumulates bytes until a request terminator appears in the stream:
/// `\nEND\n`, a terminal `\nEND`, `\nEXIT\n`, or the exact prefix `EXIT\n`.
/// EOF with a non-empty buffer yields the buffer as-is.
pub(crate) fn read_request<R: Read>(reader: &mut R) -> io::Result<ReadOutcome> {
    let mut buf: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = match reader.read(&mut chunk) {
            Ok(0) => {
                return Ok(if buf.is_empty() {
                    ReadOutcome::Eof
                } else {
                    ReadOutcome::Request(into_string(buf))
                });
            }
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        // Only the freshly extended tail (plus terminator overlap) needs
        // rescanning.
        let scan_from = buf.len().saturating_sub(6);
        buf.extend_from_slice(&chunk[..n]);
        if buf.len() > MAX_REQUEST_BYTES {
            return Ok(ReadOutcome::TooLarge);
        }
        if is_terminated(&buf, scan_from) {
            return Ok(ReadOutcome::Request(into_string(buf)));
        }
    }
}

fn is_terminated(buf: &[u8], scan_from: usize) -> bool {
    let tail = &buf[scan_from..];
    contains(tail, b"\nEND\n")
        || contains(tail, b"\nEXIT\n")
        || buf.ends_with(b"\nEND")
        || buf.starts_with(b"EXIT\n")
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.len() >= needle.len() && haystack.windows(needle.len()).any(|w| w == needle)
}

fn into_string(buf: Vec<u8>) -> String {
    String::from_utf8_lossy(&buf).into_owned()
}

/// Frames a response: `OK`/`ERR`, the body with a guaranteed trailing
/// newline, then `END`.
pub(crate) fn format_response(body: &str, ok: bool) -> String {
    let mut out = String::with_capacity(body.len() + 9);
    out.push_str(if ok { "OK\n" } else { "ERR\n" });
    out.push_str(body);
    if !body.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("END\n");
    out
}

/// Serializes a graph for PREVIEW replies: a `GRAPH V E` header followed by
/// one `EDGE u v w` line per edge (undirected pairs once).
pub(crate) fn serialize_graph(graph: &Graph) -> String {
    let edges = graph.edges();
    let mut out = format!("GRAPH {} {}\n", graph.vertex_count(), edges.len());
    for (u, v, w) in edges {
        out.push_str(&format!("EDGE {u} {v} {w}\n"));
    }
    out
}
