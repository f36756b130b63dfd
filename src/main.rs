fn main() {
    if let Err(err) = ragline::cli::main() {
        eprintln!("❌ {err}");
        std::process::exit(1);
    }
}
