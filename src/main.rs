fn main() {
    if let Err(err) = driftgraph::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
