//! Interactive front-end for the graphpipe server: prompts for random-graph
//! parameters, previews the generated graph, then runs all four algorithms
//! on it.

use std::fmt::Write as _;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context;
use clap::Parser;

const DEFAULT_PORT: u16 = 9090;

#[derive(Debug, Clone, Parser)]
#[command(name = "graphpipe-client", version, about = "Interactive graphpipe client")]
struct Cli {
    /// Server port (positive; defaults to 9090 otherwise).
    port: Option<u16>,

    /// Server host.
    #[arg(long, env = "GRAPHPIPE_HOST", default_value = "127.0.0.1")]
    host: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let port = cli.port.filter(|p| *p > 0).unwrap_or(DEFAULT_PORT);

    let stream = TcpStream::connect((cli.host.as_str(), port))
        .with_context(|| format!("connect to {}:{port}", cli.host))?;
    println!("Connected to {}:{port}", cli.host);

    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    run_session(stream, &mut input)
}

fn run_session(mut stream: TcpStream, input: &mut impl BufRead) -> anyhow::Result<()> {
    loop {
        println_rule();
        let mode = prompt_int(input, "Choose: 1) ALL algorithms  0) Exit\n> ", 0, 1)?;
        if mode == 0 {
            stream.write_all(b"EXIT\n")?;
            println!("{}", read_response(&mut stream)?);
            return Ok(());
        }

        let spec = prompt_graph_spec(input)?;

        // Preview first so the user can see the generated graph; the same
        // seed makes the follow-up ALL request deterministic.
        stream.write_all(spec.request("PREVIEW").as_bytes())?;
        println_rule();
        println!("{}", read_response(&mut stream)?);

        let run_all = prompt_int(input, "Run ALL algorithms on this graph? 1=yes 0=no: ", 0, 1)?;
        if run_all != 1 {
            continue;
        }

        stream.write_all(spec.request("ALL").as_bytes())?;
        println_rule();
        println!("{}", read_response(&mut stream)?);
    }
}

struct GraphSpec {
    directed: i64,
    vertices: i64,
    edges: i64,
    seed: i64,
    wmin: i64,
    wmax: i64,
    src: i64,
    sink: i64,
    k: i64,
}

impl GraphSpec {
    fn request(&self, alg: &str) -> String {
        let mut req = String::new();
        let _ = writeln!(req, "ALG {alg}");
        let _ = writeln!(req, "DIRECTED {}", self.directed);
        let _ = writeln!(req, "RANDOM 1");
        let _ = writeln!(req, "V {}", self.vertices);
        let _ = writeln!(req, "E {}", self.edges);
        let _ = writeln!(req, "SEED {}", self.seed);
        let _ = writeln!(req, "WMIN {}", self.wmin);
        let _ = writeln!(req, "WMAX {}", self.wmax);
        if self.src >= 0 {
            let _ = writeln!(req, "PARAM SRC {}", self.src);
        }
        if self.sink >= 0 {
            let _ = writeln!(req, "PARAM SINK {}", self.sink);
        }
        if self.k >= 0 {
            let _ = writeln!(req, "PARAM K {}", self.k);
        }
        req.push_str("END\n");
        req
    }
}

fn prompt_graph_spec(input: &mut impl BufRead) -> anyhow::Result<GraphSpec> {
    let directed = prompt_int(input, "Directed? 1=yes 0=no: ", 0, 1)?;
    let vertices = prompt_int(input, "V (>=2): ", 2, 20_000)?;
    let max_edges = if directed == 1 {
        vertices * (vertices - 1)
    } else {
        vertices * (vertices - 1) / 2
    };
    let edges = prompt_int(input, &format!("E (0..{max_edges}): "), 0, max_edges)?;
    let wmin = prompt_int(input, "Min edge weight (>=1): ", 1, 1_000_000_000)?;
    let wmax = prompt_int(input, "Max edge weight (>=Min): ", wmin, 1_000_000_000)?;
    let src = prompt_int(input, "SRC (for max flow, -1=skip): ", -1, vertices - 1)?;
    let sink = if src >= 0 {
        loop {
            let sink = prompt_int(input, "SINK (!=SRC): ", 0, vertices - 1)?;
            if sink != src {
                break sink;
            }
            println!("SINK must differ");
        }
    } else {
        -1
    };
    let k = prompt_int(input, "K for cliques (-1=skip, >=2 otherwise): ", -1, vertices)?;

    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(42);

    Ok(GraphSpec {
        directed,
        vertices,
        edges,
        seed,
        wmin,
        wmax,
        src,
        sink,
        k,
    })
}

/// Prompts until the user enters an integer within `[min, max]`.
fn prompt_int(input: &mut impl BufRead, msg: &str, min: i64, max: i64) -> anyhow::Result<i64> {
    loop {
        print!("{msg}");
        std::io::stdout().flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            anyhow::bail!("stdin closed");
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match trimmed.parse::<i64>() {
            Ok(value) if (min..=max).contains(&value) => return Ok(value),
            Ok(_) => println!("Out of range"),
            Err(_) => println!("Invalid number"),
        }
    }
}

/// Reads one framed response, up to and including its END line.
fn read_response(stream: &mut TcpStream) -> anyhow::Result<String> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut response = String::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Ok(response);
        }
        response.push_str(&line);
        if line == "END\n" || line == "END" {
            return Ok(response);
        }
    }
}

fn println_rule() {
    println!("----------------------------------------");
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::{GraphSpec, prompt_int};

    #[test]
    fn prompt_reprompts_until_valid() {
        let mut input = Cursor::new(b"abc\n99\n\n3\n".to_vec());
        assert_eq!(prompt_int(&mut input, "> ", 0, 5).unwrap(), 3);
    }

    #[test]
    fn request_includes_only_supplied_params() {
        let spec = GraphSpec {
            directed: 1,
            vertices: 4,
            edges: 5,
            seed: 7,
            wmin: 1,
            wmax: 9,
            src: 0,
            sink: 3,
            k: -1,
        };
        let req = spec.request("ALL");
        assert!(req.starts_with("ALG ALL\nDIRECTED 1\nRANDOM 1\nV 4\nE 5\nSEED 7\n"));
        assert!(req.contains("PARAM SRC 0\n"));
        assert!(req.contains("PARAM SINK 3\n"));
        assert!(!req.contains("PARAM K"));
        assert!(req.ends_with("END\n"));
    }
}
