fn main() {
    if let Err(err) = snapmon::run() {
        eprintln!("error: {err:#}");
        std::process::exit(snapmon::exit::exit_code(&err));
    }
}
